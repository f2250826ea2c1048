//! Blocking facade over [`Session`]
//!
//! Owns a current-thread tokio runtime and drives one call at a time on it.
//! Must not be used from inside another async runtime.

use std::sync::Arc;

use schema::{Record, Registry};
use serde_json::Value as JsonValue;
use tokio::runtime::{Builder, Runtime};

use crate::challenge::ChallengeSolver;
use crate::config::SessionConfig;
use crate::cookies::Cookies;
use crate::error::Result;
use crate::request::Request;
use crate::session::Session;

pub struct BlockingSession {
    session: Session,
    runtime: Runtime,
}

impl BlockingSession {
    pub fn new(config: SessionConfig, registry: Arc<Registry>) -> Result<Self> {
        Self::from_session(Session::new(config, registry)?)
    }

    pub fn with_solver(
        config: SessionConfig,
        registry: Arc<Registry>,
        solver: Arc<dyn ChallengeSolver>,
    ) -> Result<Self> {
        Self::from_session(Session::with_solver(config, registry, solver)?)
    }

    fn from_session(session: Session) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(common::Error::from)?;
        Ok(Self { session, runtime })
    }

    pub fn send(&self, request: Request) -> Result<JsonValue> {
        self.runtime.block_on(self.session.send(request))
    }

    pub fn call(&self, request: Request, schema: &str) -> Result<Record> {
        self.runtime.block_on(self.session.call(request, schema))
    }

    pub fn cookies(&self) -> Cookies {
        self.runtime.block_on(self.session.cookies())
    }

    /// The async session underneath, sharing jar and token cache.
    pub fn session(&self) -> &Session {
        &self.session
    }
}
