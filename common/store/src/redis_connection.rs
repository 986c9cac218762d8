use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, ErrorKind, RedisError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionState, StoreConnection};
use crate::error::CloseError;

// a healthy store answers a PING in a few ms, anything slower is a broken connection
const PING_TIMEOUT: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RedisOptions {
    /// How often a ready connection is verified with a PING.
    pub ping_interval: Duration,
    /// Delay between two connection attempts.
    pub retry_delay: Duration,
    /// Consecutive failed attempts before giving up and turning `errored`.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(1),
            retry_delay: Duration::from_millis(500),
            max_retries: Some(10),
        }
    }
}

/// Redis connection with its own reconnection loop.
///
/// A supervisor task owns the connection: it connects, verifies the store with
/// a PING, keeps pinging on `ping_interval` and reconnects when a ping fails.
/// Every transition is published on a watch channel, so `state()` is a plain read.
pub struct RedisConnection {
    name: String,
    state: Arc<watch::Sender<ConnectionState>>,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RedisConnection {
    /// Open a client for `uri` and spawn its supervisor. Returns as soon as the
    /// task is spawned, the connection starts in `connecting`.
    /// Must be called from within a tokio runtime.
    pub fn connect(
        name: impl Into<String>,
        uri: &str,
        options: RedisOptions,
    ) -> Result<Self, RedisError> {
        let client = Client::open(uri)?;
        let name = name.into();
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);
        let connection = Arc::new(Mutex::new(None));
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            name: name.clone(),
            client,
            options,
            state: state.clone(),
            connection: connection.clone(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(supervisor.run());

        Ok(Self {
            name,
            state,
            connection,
            cancel,
            supervisor: Mutex::new(Some(handle)),
        })
    }
}

#[async_trait]
impl StoreConnection for RedisConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    async fn close(&self) -> Result<(), CloseError> {
        // held until the state is closed, a concurrent close waits for this one
        let mut slot = self.supervisor.lock().await;
        let Some(supervisor) = slot.take() else {
            debug!(store = %self.name, "store connection already closed");
            return Ok(());
        };

        self.cancel.cancel();
        if let Err(err) = supervisor.await {
            warn!(store = %self.name, "store supervisor exited abnormally: {err}");
        }

        let connection = self.connection.lock().await.take();
        let result = match connection {
            Some(mut conn) => {
                let reply: Result<(), RedisError> =
                    redis::cmd("QUIT").query_async(&mut conn).await;
                reply.map_err(|err| CloseError::Rejected(err.to_string()))
            }
            None => Ok(()),
        };
        self.state.send_replace(ConnectionState::Closed);
        drop(slot);
        result
    }
}

impl Drop for RedisConnection {
    fn drop(&mut self) {
        // stops reconnecting, the socket goes away with the supervisor
        self.cancel.cancel();
    }
}

struct Supervisor {
    name: String,
    client: Client,
    options: RedisOptions,
    state: Arc<watch::Sender<ConnectionState>>,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            self.state.send_replace(if failures == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            });

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => return,
                attempt = self.establish() => attempt,
            };

            match attempt {
                Ok(conn) => {
                    failures = 0;
                    *self.connection.lock().await = Some(conn.clone());
                    self.state.send_replace(ConnectionState::Ready);
                    info!(store = %self.name, "store connection ready");

                    match self.watch(conn).await {
                        None => return,
                        Some(err) => {
                            warn!(store = %self.name, "store connection lost: {err}");
                            *self.connection.lock().await = None;
                        }
                    }
                }
                Err(err) => {
                    warn!(store = %self.name, attempt = failures + 1, "store connection attempt failed: {err}");
                }
            }

            failures = failures.saturating_add(1);
            if let Some(max_retries) = self.options.max_retries {
                if failures > max_retries {
                    self.state.send_replace(ConnectionState::Errored);
                    error!(store = %self.name, failures, "giving up on store connection");
                    return;
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.options.retry_delay) => {}
            }
        }
    }

    async fn establish(&self) -> Result<MultiplexedConnection, RedisError> {
        let mut conn = timeout(CONNECT_TIMEOUT, self.client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| RedisError::from((ErrorKind::IoError, "connection timed out")))??;
        self.state.send_replace(ConnectionState::Connect);
        ping(&mut conn).await?;
        Ok(conn)
    }

    /// Ping until the connection breaks or the supervisor is cancelled.
    /// Returns the error that broke the connection, `None` on cancellation.
    async fn watch(&self, mut conn: MultiplexedConnection) -> Option<RedisError> {
        let period = self.options.ping_interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = interval.tick() => {
                    if let Err(err) = ping(&mut conn).await {
                        return Some(err);
                    }
                }
            }
        }
    }
}

async fn ping(conn: &mut MultiplexedConnection) -> Result<(), RedisError> {
    let reply: Result<String, RedisError> =
        timeout(PING_TIMEOUT, redis::cmd("PING").query_async(conn))
            .await
            .map_err(|_| RedisError::from((ErrorKind::IoError, "ping timed out")))?;
    reply.map(drop)
}
