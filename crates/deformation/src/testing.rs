//! Test doubles for the solver contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use marionette_ipc::{SessionId, SolverFault, SolverRequest, SolverResponse};

use crate::session::{EngineLoader, SolverEngine};

pub type RequestLog = Arc<Mutex<Vec<SolverRequest>>>;

/// Records every request and answers with a canned vertex buffer.
pub struct RecordingEngine {
    log: RequestLog,
    result: Option<Vec<f32>>,
    sessions: SessionId,
    max_vertices: Option<usize>,
}

impl SolverEngine for RecordingEngine {
    fn handle(&mut self, request: SolverRequest) -> Result<SolverResponse, SolverFault> {
        self.log.lock().unwrap().push(request.clone());
        match request {
            SolverRequest::LoadMesh { vertices, .. } => {
                if self.max_vertices.is_some_and(|max| vertices.len() / 3 > max) {
                    return Err(SolverFault::InvalidMesh("too many vertices".to_string()));
                }
                self.sessions += 1;
                Ok(SolverResponse::SessionCreated {
                    session: self.sessions,
                })
            }
            SolverRequest::GetVertices => Ok(SolverResponse::Vertices(self.result.clone())),
            _ => Ok(SolverResponse::Ack),
        }
    }
}

/// Hands out [`RecordingEngine`]s sharing one request log.
pub struct RecordingLoader {
    log: RequestLog,
    result: Option<Vec<f32>>,
    loads: AtomicUsize,
    max_vertices: Option<usize>,
}

impl RecordingLoader {
    pub fn new(result: Option<Vec<f32>>) -> Self {
        Self {
            log: Arc::default(),
            result,
            loads: AtomicUsize::new(0),
            max_vertices: None,
        }
    }

    /// Engines answer `LoadMesh` with a fault above `max` vertices.
    pub fn with_vertex_limit(mut self, max: usize) -> Self {
        self.max_vertices = Some(max);
        self
    }

    pub fn requests(&self) -> Vec<SolverRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Requests other than mesh upload and teardown.
    pub fn solve_requests(&self) -> Vec<SolverRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !matches!(r, SolverRequest::LoadMesh { .. } | SolverRequest::Dispose))
            .collect()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EngineLoader for RecordingLoader {
    type Engine = RecordingEngine;

    async fn load(&self) -> Result<Self::Engine, SolverFault> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingEngine {
            log: self.log.clone(),
            result: self.result.clone(),
            sessions: 0,
            max_vertices: self.max_vertices,
        })
    }
}

/// Loader whose engine never comes up.
pub struct FailingLoader;

impl EngineLoader for FailingLoader {
    type Engine = RecordingEngine;

    async fn load(&self) -> Result<Self::Engine, SolverFault> {
        Err(SolverFault::LoadFailed("module not found".to_string()))
    }
}
