//! In-memory driver for unit testing.
//!
//! [`MockDriver`] implements [`Driver`] without touching the network. Every
//! opened session gets a numeric id, every statement is recorded, and faults
//! can be injected at runtime so pool behavior under failure can be tested
//! deterministically.
//!
//! ## Example
//!
//! ```rust,ignore
//! use connmgr_testing::mock_driver::{MockDriver, MockResponse};
//!
//! let driver = MockDriver::builder()
//!     .with_response("SELECT 1", MockResponse::scalar_int(1))
//!     .build();
//!
//! // Make the next two executions of "SELECT 1" lose the session.
//! driver.lose_connectivity_on("SELECT 1", 2);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use connmgr_driver::{ConnectionConfig, Driver, DriverError, QueryResult, RawConnection, Value};
use parking_lot::Mutex;

/// Scripted outcome for a statement.
#[derive(Clone)]
pub enum MockResponse {
    /// Return a result.
    Result(QueryResult),

    /// Fail with the given driver error.
    Error(DriverError),

    /// Compute the response from the statement and parameters.
    Custom(Arc<dyn Fn(&str, &[Value]) -> MockResponse + Send + Sync>),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result(r) => f.debug_tuple("Result").field(r).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// Create a scalar integer response.
    pub fn scalar_int(value: i64) -> Self {
        Self::Result(QueryResult::scalar("value", value))
    }

    /// Create an empty response.
    pub fn empty() -> Self {
        Self::Result(QueryResult::default())
    }

    /// Create a rows-affected response.
    pub fn affected(count: u64) -> Self {
        Self::Result(QueryResult::affected(count))
    }

    /// Create a server error response.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error(DriverError::server(code, message))
    }

    fn resolve(&self, statement: &str, params: &[Value]) -> Result<QueryResult, DriverError> {
        match self {
            Self::Result(r) => Ok(r.clone()),
            Self::Error(e) => Err(e.clone()),
            Self::Custom(f) => f(statement, params).resolve(statement, params),
        }
    }
}

/// A statement as seen by the mock driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    /// Session that executed the statement.
    pub session: u64,
    /// Statement text.
    pub statement: String,
    /// Bound parameters.
    pub params: Vec<Value>,
}

/// Builder for [`MockDriver`].
pub struct MockDriverBuilder {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    open_delay: Option<Duration>,
}

impl MockDriverBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: MockResponse::empty(),
            open_delay: None,
        }
    }

    /// Add a response for a specific statement.
    pub fn with_response(mut self, statement: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(statement.into(), response);
        self
    }

    /// Set the response for statements without a scripted one.
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Delay every open by `delay` (uses tokio time, so it follows a paused clock).
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Build the driver.
    pub fn build(self) -> MockDriver {
        MockDriver {
            state: Arc::new(MockState {
                responses: Mutex::new(self.responses),
                default_response: self.default_response,
                open_delay: Mutex::new(self.open_delay),
                ..MockState::default()
            }),
        }
    }
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct MockState {
    responses: Mutex<HashMap<String, MockResponse>>,
    default_response: MockResponse,
    open_delay: Mutex<Option<Duration>>,
    execute_delay: Mutex<Option<Duration>>,
    ping_delay: Mutex<Option<Duration>>,
    statements: Mutex<Vec<RecordedStatement>>,
    configs: Mutex<Vec<ConnectionConfig>>,
    /// Statement text -> remaining executions that lose the session.
    lost_on: Mutex<HashMap<String, u32>>,
    /// Sessions that have been severed and fail every call.
    severed: Mutex<Vec<u64>>,
    next_session: AtomicU64,
    open_attempts: AtomicU64,
    opens: AtomicU64,
    closes: AtomicU64,
    pings: AtomicU64,
    fail_opens: AtomicU32,
    fail_pings: AtomicU32,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::empty()
    }
}

/// An in-memory [`Driver`].
///
/// Cloning a `MockDriver` shares its state, so a test can keep a handle for
/// assertions and fault injection while the pool owns another.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    /// Create a new builder for the mock driver.
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// Create a driver that answers every statement with an empty result.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Add or replace a scripted response.
    pub fn set_response(&self, statement: impl Into<String>, response: MockResponse) {
        self.state.responses.lock().insert(statement.into(), response);
    }

    /// Make the next `count` opens fail with [`DriverError::Connect`].
    pub fn fail_next_opens(&self, count: u32) {
        self.state.fail_opens.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` pings report a dead session.
    pub fn fail_next_pings(&self, count: u32) {
        self.state.fail_pings.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` executions of `statement` lose their session.
    pub fn lose_connectivity_on(&self, statement: impl Into<String>, count: u32) {
        self.state.lost_on.lock().insert(statement.into(), count);
    }

    /// Sever every session that is currently open.
    ///
    /// Severed sessions fail every execute with
    /// [`DriverError::ConnectionLost`] and every ping; sessions opened
    /// afterwards are unaffected.
    pub fn sever_open_sessions(&self) {
        let newest = self.state.next_session.load(Ordering::SeqCst);
        let mut severed = self.state.severed.lock();
        severed.extend(1..=newest);
        severed.sort_unstable();
        severed.dedup();
    }

    /// Change the delay applied to opens.
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        *self.state.open_delay.lock() = delay;
    }

    /// Delay every execute by `delay`, after the statement is recorded.
    pub fn set_execute_delay(&self, delay: Option<Duration>) {
        *self.state.execute_delay.lock() = delay;
    }

    /// Delay every ping by `delay`, or stop delaying with `None`.
    pub fn set_ping_delay(&self, delay: Option<Duration>) {
        *self.state.ping_delay.lock() = delay;
    }

    /// Number of open attempts, successful or not.
    pub fn open_attempts(&self) -> u64 {
        self.state.open_attempts.load(Ordering::SeqCst)
    }

    /// Number of sessions successfully opened.
    pub fn opens(&self) -> u64 {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Number of sessions closed.
    pub fn closes(&self) -> u64 {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Number of pings received.
    pub fn pings(&self) -> u64 {
        self.state.pings.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn live_sessions(&self) -> u64 {
        self.opens().saturating_sub(self.closes())
    }

    /// Every statement executed so far, in order.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.state.statements.lock().clone()
    }

    /// Statements executed on one session, in order.
    pub fn statements_for(&self, session: u64) -> Vec<String> {
        self.state
            .statements
            .lock()
            .iter()
            .filter(|s| s.session == session)
            .map(|s| s.statement.clone())
            .collect()
    }

    /// How many times `statement` was executed across all sessions.
    pub fn execution_count(&self, statement: &str) -> usize {
        self.state
            .statements
            .lock()
            .iter()
            .filter(|s| s.statement == statement)
            .count()
    }

    /// Configuration passed to the most recent open attempt.
    pub fn last_config(&self) -> Option<ConnectionConfig> {
        self.state.configs.lock().last().cloned()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("opens", &self.opens())
            .field("closes", &self.closes())
            .finish()
    }
}

/// Consume one unit of a countdown, returning true if one was available.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>, DriverError> {
        self.state.open_attempts.fetch_add(1, Ordering::SeqCst);
        self.state.configs.lock().push(config.clone());

        let delay = *self.state.open_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if take_one(&self.state.fail_opens) {
            return Err(DriverError::Connect(format!(
                "connection refused by {}",
                config.endpoint()
            )));
        }

        let session = self.state.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session, "mock session opened");

        Ok(Box::new(MockConnection {
            session,
            state: Arc::clone(&self.state),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// One mock session.
pub struct MockConnection {
    session: u64,
    state: Arc<MockState>,
}

impl MockConnection {
    fn is_severed(&self) -> bool {
        self.state.severed.lock().binary_search(&self.session).is_ok()
    }
}

#[async_trait::async_trait]
impl RawConnection for MockConnection {
    async fn ping(&mut self) -> bool {
        self.state.pings.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.ping_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        !(self.is_severed() || take_one(&self.state.fail_pings))
    }

    async fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult, DriverError> {
        self.state.statements.lock().push(RecordedStatement {
            session: self.session,
            statement: statement.to_string(),
            params: params.to_vec(),
        });

        let delay = *self.state.execute_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_severed() {
            return Err(DriverError::server(2006, "server has gone away"));
        }

        let lost = {
            let mut lost_on = self.state.lost_on.lock();
            match lost_on.get_mut(statement) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if lost {
            return Err(DriverError::server(2013, "lost connection during query"));
        }

        let response = self
            .state
            .responses
            .lock()
            .get(statement)
            .cloned()
            .unwrap_or_else(|| self.state.default_response.clone());
        response.resolve(statement, params)
    }

    async fn close(self: Box<Self>) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session = self.session, "mock session closed");
    }
}
