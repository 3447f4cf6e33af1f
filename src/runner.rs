use chrono::Utc;
use futures::future::join_all;

use crate::aggregator::Batch;
use crate::checks::memcached::{FetchError, Memcached};
use crate::config::{CheckConfig, ConfigError};
use crate::recorder::Recorder;

/// Drives every configured instance, one cycle at a time.
#[derive(Debug)]
pub struct Runner {
    checks: Vec<Memcached>,
}

impl Runner {
    /// Every instance is validated before anything touches the network, one
    /// bad instance rejects the whole configuration.
    pub fn new(config: &CheckConfig) -> Result<Self, ConfigError> {
        if config.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }

        if config.interval().is_zero() {
            return Err(ConfigError::Zero("min_collection_interval"));
        }

        let checks = config
            .instances
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                Memcached::new(instance).map_err(|err| ConfigError::instance(index, err))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { checks })
    }

    pub fn checks(&self) -> &[Memcached] {
        &self.checks
    }

    /// Run all instances concurrently and hand their submissions to the
    /// recorder. Failed instances have already reported a CRITICAL service
    /// check, their errors are returned for the caller to inspect.
    pub async fn run_once(&self, recorder: &mut Recorder) -> Vec<FetchError> {
        let results = join_all(self.checks.iter().map(|check| async move {
            let mut batch = Batch::default();
            let result = check.run(&mut batch).await;
            (batch, result)
        }))
        .await;

        let now = Utc::now();
        let mut errors = vec![];
        for ((batch, result), check) in results.into_iter().zip(&self.checks) {
            recorder.ingest(batch, now);

            if let Err(err) = result {
                warn!(
                    message = "Collect memcached stats failed",
                    addr = %check.address(),
                    %err,
                );

                errors.push(err);
            }
        }

        errors
    }
}
