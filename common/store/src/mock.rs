use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::connection::{ConnectionState, StoreConnection};
use crate::error::CloseError;

/// In-memory [`StoreConnection`] for tests.
///
/// The state can be changed at any time with [`MockConnection::set_state`].
/// Clones share the same state and counters, so a test can keep one clone to
/// drive and inspect the connection while the code under test owns another.
#[derive(Clone)]
pub struct MockConnection {
    inner: Arc<MockInner>,
}

struct MockInner {
    name: String,
    state: Mutex<ConnectionState>,
    close_result: Result<(), CloseError>,
    close_delay: Duration,
    close_calls: AtomicUsize,
    state_reads: AtomicUsize,
}

impl MockConnection {
    pub fn new(name: &str, state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(MockInner {
                name: name.to_owned(),
                state: Mutex::new(state),
                close_result: Ok(()),
                close_delay: Duration::ZERO,
                close_calls: AtomicUsize::new(0),
                state_reads: AtomicUsize::new(0),
            }),
        }
    }

    pub fn ready(name: &str) -> Self {
        Self::new(name, ConnectionState::Ready)
    }

    /// Make `close()` fail as if the store rejected the termination.
    /// Must be called before the connection is cloned.
    pub fn failing_close(self, reason: &str) -> Self {
        self.rebuild(|inner| inner.close_result = Err(CloseError::Rejected(reason.to_owned())))
    }

    /// Make `close()` take `delay` before settling.
    /// Must be called before the connection is cloned.
    pub fn with_close_delay(self, delay: Duration) -> Self {
        self.rebuild(|inner| inner.close_delay = delay)
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    /// Number of `state()` reads, to check whether a probe looked at this connection.
    pub fn state_reads(&self) -> usize {
        self.inner.state_reads.load(Ordering::SeqCst)
    }

    fn current_state(&self) -> ConnectionState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn rebuild(self, configure: impl FnOnce(&mut MockInner)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(_) => panic!("MockConnection must be configured before it is cloned"),
        };
        configure(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl StoreConnection for MockConnection {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn state(&self) -> ConnectionState {
        self.inner.state_reads.fetch_add(1, Ordering::SeqCst);
        self.current_state()
    }

    async fn close(&self) -> Result<(), CloseError> {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.inner.close_delay.is_zero() {
            tokio::time::sleep(self.inner.close_delay).await;
        }
        if self.inner.close_result.is_ok() {
            self.set_state(ConnectionState::Closed);
        }
        self.inner.close_result.clone()
    }
}
