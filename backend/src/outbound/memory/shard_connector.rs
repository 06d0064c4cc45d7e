//! In-process transport driver recording what each session saw.
//!
//! Statements are not parsed beyond the isolation command: running
//! [`SET_SESSION_CONTEXT_SQL`] stores `session_context.<name> = value` on
//! the session, so tests can assert the exact isolation value a caller's
//! connection carries.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{DriverError, ShardConnection, ShardConnector};
use crate::domain::{Credentials, SET_SESSION_CONTEXT_SQL, ShardLocation};

/// What one opened session received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSession {
    pub location: ShardLocation,
    pub user: String,
    pub statements: Vec<String>,
    pub variables: BTreeMap<String, String>,
    /// Whether the connection is still held by someone.
    pub open: bool,
}

#[derive(Default)]
struct ConnectorState {
    sessions: Vec<RecordedSession>,
    fail_open: Option<DriverError>,
    fail_statements: Option<DriverError>,
    statement_latency: Option<Duration>,
}

/// Driver handing out recording connections.
#[derive(Clone, Default)]
pub struct InMemoryShardConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl InMemoryShardConnector {
    /// Connector with no sessions and no injected failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent `open` with `error`, or stop failing.
    pub fn set_open_failure(&self, error: Option<DriverError>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_open = error;
        }
    }

    /// Fail every subsequent statement with `error`, or stop failing.
    pub fn set_statement_failure(&self, error: Option<DriverError>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_statements = error;
        }
    }

    /// Delay every subsequent statement by `latency`.
    pub fn set_statement_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.statement_latency = latency;
        }
    }

    /// Snapshot of every session opened so far, in opening order.
    pub fn sessions(&self) -> Vec<RecordedSession> {
        self.state
            .lock()
            .map(|state| state.sessions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ShardConnector for InMemoryShardConnector {
    async fn open(
        &self,
        location: &ShardLocation,
        credentials: &Credentials,
    ) -> Result<Box<dyn ShardConnection>, DriverError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DriverError::connection("connector state poisoned"))?;
        if let Some(error) = state.fail_open.clone() {
            return Err(error);
        }
        state.sessions.push(RecordedSession {
            location: location.clone(),
            user: credentials.user().to_owned(),
            statements: Vec::new(),
            variables: BTreeMap::new(),
            open: true,
        });
        Ok(Box::new(InMemoryShardConnection {
            index: state.sessions.len() - 1,
            location: location.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

/// Connection writing into its [`RecordedSession`].
pub struct InMemoryShardConnection {
    index: usize,
    location: ShardLocation,
    state: Arc<Mutex<ConnectorState>>,
}

impl Drop for InMemoryShardConnection {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(session) = state.sessions.get_mut(self.index) {
            session.open = false;
        }
    }
}

#[async_trait]
impl ShardConnection for InMemoryShardConnection {
    fn location(&self) -> &ShardLocation {
        &self.location
    }

    async fn execute(&mut self, statement: &str, params: &[String]) -> Result<u64, DriverError> {
        let latency = self
            .state
            .lock()
            .map_err(|_| DriverError::connection("connector state poisoned"))?
            .statement_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| DriverError::connection("connector state poisoned"))?;
        if let Some(error) = state.fail_statements.clone() {
            return Err(error);
        }
        let session = state
            .sessions
            .get_mut(self.index)
            .ok_or_else(|| DriverError::connection("session closed"))?;
        session.statements.push(statement.to_owned());
        if statement == SET_SESSION_CONTEXT_SQL {
            let [name, value] = params else {
                return Err(DriverError::execution(format!(
                    "set_config expects 2 parameters, got {}",
                    params.len()
                )));
            };
            session
                .variables
                .insert(format!("session_context.{name}"), value.clone());
        }
        Ok(1)
    }
}
