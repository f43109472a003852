//! Solver session lifecycle.
//!
//! Wraps an external [`SolverEngine`] behind load / upload / solve / read back
//! / dispose operations. Engine loading is asynchronous and split into a
//! ticketed begin/complete pair so a host can drive the load future on
//! whatever executor it has; disposing the session invalidates tickets that
//! are still in flight.

use marionette_ipc::{EngineStatus, SessionId, SolverFault, SolverRequest, SolverResponse};
use tracing::{debug, error, info, warn};

use crate::error::{DeformError, DeformResult};

/// A numerical engine speaking the solver request/response contract.
pub trait SolverEngine: Send + Sync {
    fn handle(&mut self, request: SolverRequest) -> Result<SolverResponse, SolverFault>;
}

/// Produces a ready engine. Called at most once per successful session.
#[allow(async_fn_in_trait)]
pub trait EngineLoader {
    type Engine: SolverEngine + 'static;

    async fn load(&self) -> Result<Self::Engine, SolverFault>;
}

/// Proof that an engine load was started. Consumed by
/// [`SolverSession::complete_init`].
#[derive(Debug)]
#[must_use]
pub struct InitTicket {
    epoch: u64,
}

/// Result of completing an engine load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The engine is installed and ready
    Ready,
    /// Another load is already in flight
    Pending,
    /// The session was disposed while loading; the result was dropped
    Discarded,
}

/// Owned facade over the external solver engine.
pub struct SolverSession {
    engine: Option<Box<dyn SolverEngine>>,
    session: Option<SessionId>,
    status: EngineStatus,
    load_error: Option<String>,
    epoch: u64,
}

impl Default for SolverSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SolverSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverSession")
            .field("session", &self.session)
            .field("status", &self.status)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl SolverSession {
    pub fn new() -> Self {
        Self {
            engine: None,
            session: None,
            status: EngineStatus::Unloaded,
            load_error: None,
            epoch: 0,
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == EngineStatus::Ready
    }

    /// Whether a mesh is uploaded.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Start an engine load. `Ok(None)` when the engine is already ready or a
    /// load is in flight. A previous load failure is sticky.
    pub fn begin_init(&mut self) -> DeformResult<Option<InitTicket>> {
        match self.status {
            EngineStatus::Ready | EngineStatus::Loading => Ok(None),
            EngineStatus::Failed => Err(self.load_failure()),
            EngineStatus::Unloaded => {
                self.status = EngineStatus::Loading;
                debug!("Solver engine load started (epoch {})", self.epoch);
                Ok(Some(InitTicket { epoch: self.epoch }))
            }
        }
    }

    /// Finish a load started by [`Self::begin_init`].
    pub fn complete_init<E: SolverEngine + 'static>(
        &mut self,
        ticket: InitTicket,
        result: Result<E, SolverFault>,
    ) -> DeformResult<InitOutcome> {
        if ticket.epoch != self.epoch || self.status != EngineStatus::Loading {
            warn!("Discarding stale solver engine load (epoch {})", ticket.epoch);
            return Ok(InitOutcome::Discarded);
        }

        match result {
            Ok(engine) => {
                self.engine = Some(Box::new(engine));
                self.status = EngineStatus::Ready;
                info!("Solver engine ready");
                Ok(InitOutcome::Ready)
            }
            Err(fault) => {
                error!("Solver engine failed to load: {}", fault);
                self.status = EngineStatus::Failed;
                self.load_error = Some(fault.to_string());
                Err(self.load_failure())
            }
        }
    }

    /// Load the engine with `loader`. Idempotent once ready.
    pub async fn init<L: EngineLoader>(&mut self, loader: &L) -> DeformResult<InitOutcome> {
        let Some(ticket) = self.begin_init()? else {
            return Ok(match self.status {
                EngineStatus::Ready => InitOutcome::Ready,
                _ => InitOutcome::Pending,
            });
        };
        let result = loader.load().await;
        self.complete_init(ticket, result)
    }

    /// Upload a mesh, replacing any previous session.
    pub fn load_mesh(&mut self, vertices: &[f32], faces: &[u32]) -> DeformResult<SessionId> {
        self.ensure_engine()?;
        self.release_session();

        let response = self.request(SolverRequest::LoadMesh {
            vertices: vertices.to_vec(),
            faces: faces.to_vec(),
        })?;
        match response {
            SolverResponse::SessionCreated { session } => {
                self.session = Some(session);
                info!(
                    "Solver session {} created ({} vertices, {} faces)",
                    session,
                    vertices.len() / 3,
                    faces.len() / 3
                );
                Ok(session)
            }
            other => Err(unexpected("LoadMesh", &other)),
        }
    }

    /// Upload constraint indices and their local-space targets (3 floats per
    /// index).
    pub fn set_handles(&mut self, indices: &[u32], positions: &[f32]) -> DeformResult<()> {
        self.ensure_session()?;
        let response = self.request(SolverRequest::SetHandles {
            indices: indices.to_vec(),
            positions: positions.to_vec(),
        })?;
        expect_ack("SetHandles", response)
    }

    /// Run a fixed number of solver iterations.
    pub fn solve(&mut self, max_iterations: u32) -> DeformResult<()> {
        self.ensure_session()?;
        let response = self.request(SolverRequest::Solve { max_iterations })?;
        expect_ack("Solve", response)
    }

    /// Latest solved local vertex buffer, if the engine has one.
    pub fn vertices(&mut self) -> DeformResult<Option<Vec<f32>>> {
        if self.session.is_none() {
            return Ok(None);
        }
        match self.request(SolverRequest::GetVertices)? {
            SolverResponse::Vertices(buffer) => Ok(buffer),
            other => Err(unexpected("GetVertices", &other)),
        }
    }

    /// Release the mesh session and invalidate in-flight loads. Safe to call
    /// repeatedly. A loaded engine is kept for the next mesh.
    pub fn dispose(&mut self) {
        self.release_session();
        self.epoch += 1;
        if self.status == EngineStatus::Loading {
            self.status = EngineStatus::Unloaded;
        }
    }

    fn release_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(engine) = self.engine.as_mut() {
            if let Err(fault) = engine.handle(SolverRequest::Dispose) {
                warn!("Solver session {} dispose failed: {}", session, fault);
            }
        }
        debug!("Solver session {} released", session);
    }

    fn ensure_engine(&self) -> DeformResult<()> {
        match self.status {
            EngineStatus::Ready => Ok(()),
            EngineStatus::Failed => Err(self.load_failure()),
            EngineStatus::Unloaded | EngineStatus::Loading => Err(DeformError::NotInitialized),
        }
    }

    fn ensure_session(&self) -> DeformResult<()> {
        self.ensure_engine()?;
        if self.session.is_none() {
            return Err(DeformError::NoSession);
        }
        Ok(())
    }

    fn request(&mut self, request: SolverRequest) -> DeformResult<SolverResponse> {
        let op = request.op_name();
        let engine = self.engine.as_mut().ok_or(DeformError::NotInitialized)?;
        engine.handle(request).map_err(|fault| {
            debug!("Solver {} failed: {}", op, fault);
            match fault {
                SolverFault::NoSession => DeformError::NoSession,
                SolverFault::InvalidMesh(reason) => DeformError::InvalidMesh(reason),
                other => DeformError::Engine(other),
            }
        })
    }

    fn load_failure(&self) -> DeformError {
        DeformError::EngineLoadFailure(
            self.load_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        )
    }
}

impl Drop for SolverSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn expect_ack(op: &str, response: SolverResponse) -> DeformResult<()> {
    match response {
        SolverResponse::Ack => Ok(()),
        other => Err(unexpected(op, &other)),
    }
}

fn unexpected(op: &str, response: &SolverResponse) -> DeformError {
    DeformError::Engine(SolverFault::UnexpectedResponse(format!(
        "{} answered with {:?}",
        op, response
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingLoader, RecordingLoader};

    const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let loader = RecordingLoader::new(None);
        let mut session = SolverSession::new();
        assert_eq!(session.status(), EngineStatus::Unloaded);

        assert_eq!(session.init(&loader).await.unwrap(), InitOutcome::Ready);
        assert_eq!(session.init(&loader).await.unwrap(), InitOutcome::Ready);
        assert_eq!(loader.loads(), 1);
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn test_load_failure_is_sticky() {
        let mut session = SolverSession::new();
        let err = session.init(&FailingLoader).await.unwrap_err();
        assert!(matches!(err, DeformError::EngineLoadFailure(_)));
        assert!(err.is_fatal());
        assert_eq!(session.status(), EngineStatus::Failed);

        // No retry
        assert!(matches!(
            session.begin_init(),
            Err(DeformError::EngineLoadFailure(_))
        ));
        assert!(matches!(
            session.load_mesh(&TRIANGLE, &[0, 1, 2]),
            Err(DeformError::EngineLoadFailure(_))
        ));
    }

    #[test]
    fn test_operations_before_init() {
        let mut session = SolverSession::new();
        assert_eq!(
            session.load_mesh(&TRIANGLE, &[0, 1, 2]),
            Err(DeformError::NotInitialized)
        );
        assert_eq!(session.solve(10), Err(DeformError::NotInitialized));
        assert_eq!(session.vertices(), Ok(None));
    }

    #[tokio::test]
    async fn test_operations_without_mesh() {
        let mut session = SolverSession::new();
        session.init(&RecordingLoader::new(None)).await.unwrap();

        assert_eq!(session.set_handles(&[0], &[0.0; 3]), Err(DeformError::NoSession));
        assert_eq!(session.solve(10), Err(DeformError::NoSession));
    }

    #[tokio::test]
    async fn test_load_mesh_replaces_session() {
        let loader = RecordingLoader::new(None);
        let mut session = SolverSession::new();
        session.init(&loader).await.unwrap();

        let first = session.load_mesh(&TRIANGLE, &[0, 1, 2]).unwrap();
        let second = session.load_mesh(&TRIANGLE, &[0, 1, 2]).unwrap();
        assert_ne!(first, second);

        let ops: Vec<_> = loader.requests().iter().map(|r| r.op_name()).collect();
        assert_eq!(ops, vec!["loadMesh", "dispose", "loadMesh"]);
    }

    #[tokio::test]
    async fn test_dispose_is_safe_and_releases() {
        let loader = RecordingLoader::new(None);
        let mut session = SolverSession::new();
        session.dispose();

        session.init(&loader).await.unwrap();
        session.load_mesh(&TRIANGLE, &[0, 1, 2]).unwrap();
        session.dispose();
        session.dispose();

        assert!(!session.has_session());
        assert!(session.is_ready());
        assert_eq!(session.solve(1), Err(DeformError::NoSession));
        let disposes = loader
            .requests()
            .iter()
            .filter(|r| matches!(r, SolverRequest::Dispose))
            .count();
        assert_eq!(disposes, 1);
    }

    #[tokio::test]
    async fn test_dispose_discards_in_flight_load() {
        let loader = RecordingLoader::new(None);
        let mut session = SolverSession::new();

        let ticket = session.begin_init().unwrap().unwrap();
        assert_eq!(session.status(), EngineStatus::Loading);
        assert!(session.begin_init().unwrap().is_none());

        session.dispose();
        let engine = loader.load().await;
        assert_eq!(
            session.complete_init(ticket, engine).unwrap(),
            InitOutcome::Discarded
        );
        assert_eq!(session.status(), EngineStatus::Unloaded);
        assert_eq!(
            session.load_mesh(&TRIANGLE, &[0, 1, 2]),
            Err(DeformError::NotInitialized)
        );

        // A fresh load still works
        assert_eq!(session.init(&loader).await.unwrap(), InitOutcome::Ready);
    }

    #[tokio::test]
    async fn test_drop_disposes_session() {
        let loader = RecordingLoader::new(None);
        {
            let mut session = SolverSession::new();
            session.init(&loader).await.unwrap();
            session.load_mesh(&TRIANGLE, &[0, 1, 2]).unwrap();
        }
        assert!(matches!(
            loader.requests().last(),
            Some(SolverRequest::Dispose)
        ));
    }

    #[tokio::test]
    async fn test_vertices_passthrough() {
        let loader = RecordingLoader::new(Some(TRIANGLE.to_vec()));
        let mut session = SolverSession::new();
        session.init(&loader).await.unwrap();
        session.load_mesh(&TRIANGLE, &[0, 1, 2]).unwrap();

        assert_eq!(session.vertices().unwrap(), Some(TRIANGLE.to_vec()));
    }
}
