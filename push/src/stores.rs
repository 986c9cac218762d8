use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use health::{ErrorSink, HealthAggregator, ProbePolicy, StoreProbe};
use lifecycle::ShutdownCoordinator;
use store::{RedisConnection, RedisOptions, StoreConnection};
use tracing::info;

use crate::config::{Config, StoreUris};
use crate::error::ServerError;

pub const INGRESS: &str = "ingress";
pub const RATE_LIMIT: &str = "rate limit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTopology {
    /// The ingress store also holds the rate-limit counters.
    Single,
    /// Separate ingress and rate-limit stores.
    Dual,
}

impl fmt::Display for StoreTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTopology::Single => f.write_str("single-store"),
            StoreTopology::Dual => f.write_str("dual-store"),
        }
    }
}

#[derive(Clone)]
struct StoreGroup {
    name: &'static str,
    policy: ProbePolicy,
    connections: Vec<Arc<dyn StoreConnection>>,
}

impl StoreGroup {
    fn probe(&self) -> StoreProbe {
        StoreProbe::new(self.name, self.policy, self.connections.clone())
    }
}

/// The store connections of the process, built once at startup.
///
/// Both the readiness check and the shutdown coordinator are derived from it:
/// the aggregator only reads connection states, the coordinator is the only
/// one closing them.
#[derive(Clone)]
pub struct Stores {
    ingress: StoreGroup,
    rate_limit: Option<StoreGroup>,
}

impl Stores {
    pub fn single(ingress: Vec<Arc<dyn StoreConnection>>, policy: ProbePolicy) -> Self {
        Self {
            ingress: StoreGroup {
                name: INGRESS,
                policy,
                connections: ingress,
            },
            rate_limit: None,
        }
    }

    pub fn dual(
        ingress: Vec<Arc<dyn StoreConnection>>,
        ingress_policy: ProbePolicy,
        rate_limit: Vec<Arc<dyn StoreConnection>>,
        rate_limit_policy: ProbePolicy,
    ) -> Self {
        let mut stores = Self::single(ingress, ingress_policy);
        stores.rate_limit = Some(StoreGroup {
            name: RATE_LIMIT,
            policy: rate_limit_policy,
            connections: rate_limit,
        });
        stores
    }

    /// Open the redis connections described by the configuration. Connections
    /// come up in the background, they are not ready when this returns.
    pub fn connect(config: &Config) -> Result<Self, ServerError> {
        let options = config.redis_options();
        let ingress = connect_group(INGRESS, &config.redis_uri_ingress, &options)?;

        // on error the ingress connections are dropped, which stops their supervisors
        let stores = match &config.redis_uri_rate_limit {
            None => Self::single(ingress, config.ingress_probe_policy),
            Some(uris) => Self::dual(
                ingress,
                config.ingress_probe_policy,
                connect_group(RATE_LIMIT, uris, &options)?,
                config.rate_limit_probe_policy,
            ),
        };

        info!(
            topology = %stores.topology(),
            connections = stores.connections().len(),
            "store connections opened"
        );
        Ok(stores)
    }

    pub fn topology(&self) -> StoreTopology {
        match self.rate_limit {
            None => StoreTopology::Single,
            Some(_) => StoreTopology::Dual,
        }
    }

    /// Every connection, ingress first.
    pub fn connections(&self) -> Vec<Arc<dyn StoreConnection>> {
        self.groups()
            .flat_map(|group| group.connections.iter().cloned())
            .collect()
    }

    /// Readiness check over every store: ingress first, then rate limit.
    pub fn health_aggregator(&self, sink: Arc<dyn ErrorSink>) -> HealthAggregator {
        self.groups()
            .fold(HealthAggregator::new("readiness", sink), |aggregator, group| {
                aggregator.with_probe(group.probe())
            })
    }

    pub fn shutdown_coordinator(&self, close_timeout: Option<Duration>) -> ShutdownCoordinator {
        ShutdownCoordinator::new("push")
            .with_connections(self.connections())
            .with_close_timeout(close_timeout)
    }

    fn groups(&self) -> impl Iterator<Item = &StoreGroup> {
        std::iter::once(&self.ingress).chain(self.rate_limit.as_ref())
    }
}

fn connect_group(
    store: &'static str,
    uris: &StoreUris,
    options: &RedisOptions,
) -> Result<Vec<Arc<dyn StoreConnection>>, ServerError> {
    let nodes = uris.len();
    uris.iter()
        .enumerate()
        .map(|(index, uri)| {
            let name = match nodes {
                1 => store.to_owned(),
                _ => format!("{store} node {}", index + 1),
            };
            let connection = RedisConnection::connect(name, uri, options.clone()).map_err(
                |source| ServerError::Store {
                    store: store.to_owned(),
                    source,
                },
            )?;
            let connection: Arc<dyn StoreConnection> = Arc::new(connection);
            Ok(connection)
        })
        .collect()
}
