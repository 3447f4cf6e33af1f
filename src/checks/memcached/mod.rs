mod client;
mod config;
pub mod stats;

pub use client::{Client, Collected, Command, FetchError, RawStats, fetch};
pub use config::{Address, DEFAULT_PORT, InstanceConfig, Options};

use std::time::Duration;

use event::{ServiceCheckStatus, Tags};
use stats::{Classified, Group};

use crate::aggregator::Aggregator;
use crate::config::ConfigError;

type Classify = fn(&RawStats) -> Vec<Classified>;

pub const NAMESPACE: &str = "memcache";
pub const SERVICE_CHECK: &str = "memcache.can_connect";

/// `memcache.<stat>`, `memcache.<group>.<stat>`, with `_rate` appended for
/// rates.
pub fn metric_name(classified: &Classified) -> String {
    let suffix = match classified.kind {
        event::MetricKind::Gauge => "",
        event::MetricKind::Rate => "_rate",
    };

    match classified.group.prefix() {
        Some(prefix) => format!("{NAMESPACE}.{prefix}.{}{suffix}", classified.stat),
        None => format!("{NAMESPACE}.{}{suffix}", classified.stat),
    }
}

/// A validated memcached instance, ready to run.
#[derive(Clone, Debug)]
pub struct Memcached {
    address: Address,
    tags: Tags,
    service_check_tags: Tags,
    options: Options,
    timeout: Duration,
}

impl Memcached {
    pub fn new(config: &InstanceConfig) -> Result<Self, ConfigError> {
        let address = config.address()?;
        let timeout = config.timeout()?;

        let mut tags = address.metric_tags();
        tags.extend(config.tags.iter().cloned());
        let service_check_tags = address.service_check_tags();

        Ok(Self {
            address,
            tags,
            service_check_tags,
            options: config.options,
            timeout,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Run one cycle: fetch, classify and submit, then report whether the
    /// server could be reached.
    ///
    /// A fetch failure submits no metric at all, only a CRITICAL service
    /// check, and is returned so the host can log it.
    pub async fn run(&self, aggregator: &mut dyn Aggregator) -> Result<(), FetchError> {
        let result = match tokio::time::timeout(
            self.timeout,
            fetch(&self.address, self.options.items, self.options.slabs),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                addr: self.address.to_string(),
                secs: self.timeout.as_secs(),
            }),
        };

        match result {
            Ok(collected) => {
                self.emit(collected, aggregator);
                aggregator.submit_service_check(
                    SERVICE_CHECK,
                    ServiceCheckStatus::Ok,
                    &self.service_check_tags,
                    "",
                );

                Ok(())
            }

            Err(err) => {
                aggregator.submit_service_check(
                    SERVICE_CHECK,
                    ServiceCheckStatus::Critical,
                    &self.service_check_tags,
                    &err.to_string(),
                );

                Err(err)
            }
        }
    }

    fn emit(&self, collected: Collected, aggregator: &mut dyn Aggregator) {
        let Collected {
            general,
            items,
            slabs,
        } = collected;

        let mut classified = stats::classify_general(&general);

        let optional: [(Group, _, Classify); 2] = [
            (Group::Items, items, stats::classify_items),
            (Group::Slabs, slabs, stats::classify_slabs),
        ];
        for (group, result, classify) in optional {
            match result {
                None => {}
                Some(Ok(raw)) => classified.extend(classify(&raw)),
                Some(Err(err)) => {
                    warn!(
                        message = "Fetch optional memcached stats failed",
                        addr = %self.address,
                        ?group,
                        %err
                    );
                }
            }
        }

        for c in &classified {
            let name = metric_name(c);
            match &c.slab {
                Some(slab) => {
                    let tags = self.tags.with_pair("slab", slab);
                    aggregator.submit_metric(c.kind, &name, c.value, &tags);
                }
                None => aggregator.submit_metric(c.kind, &name, c.value, &self.tags),
            }
        }

        debug!(
            message = "Memcached stats submitted",
            addr = %self.address,
            metrics = classified.len()
        );
    }
}
