use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use event::{ByteSizeOf, Metric, MetricKind, ServiceCheck, Tags};

use crate::aggregator::Batch;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct SeriesKey {
    name: String,
    tags: Tags,
}

impl ByteSizeOf for SeriesKey {
    fn allocated_bytes(&self) -> usize {
        self.name.allocated_bytes() + self.tags.allocated_bytes()
    }
}

#[derive(Clone, Copy, Debug)]
struct Sample {
    value: f64,
    timestamp: DateTime<Utc>,
}

/// What a [`Recorder`] has to report since the previous flush.
#[derive(Debug, Default)]
pub struct Flushed {
    pub metrics: Vec<Metric>,
    pub service_checks: Vec<ServiceCheck>,
}

/// A minimal host side metric pipeline.
///
/// Gauges pass through. Rates are submitted as raw counters, so the previous
/// sample of every series is kept and the per second derivative is reported
/// from the second sample on. A counter going backwards means the server
/// restarted, that sample only becomes the new baseline.
#[derive(Debug, Default)]
pub struct Recorder {
    previous: HashMap<SeriesKey, Sample>,
    expire_after: Option<Duration>,

    metrics: Vec<Metric>,
    service_checks: Vec<ServiceCheck>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous sample of series not seen for `duration`.
    pub fn expire_after(mut self, duration: Duration) -> Self {
        self.expire_after = Some(duration);
        self
    }

    pub fn ingest(&mut self, batch: Batch, now: DateTime<Utc>) {
        let Batch {
            metrics,
            service_checks,
        } = batch;

        for metric in metrics {
            match metric.kind {
                MetricKind::Gauge => self.metrics.push(metric.with_timestamp(now)),
                MetricKind::Rate => {
                    if let Some(rate) = self.derive(metric, now) {
                        self.metrics.push(rate);
                    }
                }
            }
        }

        self.service_checks.extend(
            service_checks
                .into_iter()
                .map(|sc| sc.with_timestamp(now)),
        );

        self.expire(now);
    }

    fn derive(&mut self, metric: Metric, now: DateTime<Utc>) -> Option<Metric> {
        let Metric {
            name, value, tags, ..
        } = metric;

        let key = SeriesKey {
            name: name.clone(),
            tags: tags.clone(),
        };
        let prev = self.previous.insert(
            key,
            Sample {
                value,
                timestamp: now,
            },
        )?;

        let elapsed = (now - prev.timestamp).num_nanoseconds()? as f64 / 1_000_000_000.0;
        if elapsed <= 0.0 {
            return None;
        }

        if value < prev.value {
            debug!(message = "Counter went backwards, reset baseline", %name);
            return None;
        }

        Some(
            Metric::rate_with_tags(name, (value - prev.value) / elapsed, tags).with_timestamp(now),
        )
    }

    fn expire(&mut self, now: DateTime<Utc>) {
        let Some(expire_after) = self.expire_after else {
            return;
        };

        let Ok(expire_after) = chrono::Duration::from_std(expire_after) else {
            return;
        };

        self.previous
            .retain(|_, sample| now - sample.timestamp <= expire_after);
    }

    /// Drain everything collected since the last flush.
    pub fn flush(&mut self) -> Flushed {
        Flushed {
            metrics: std::mem::take(&mut self.metrics),
            service_checks: std::mem::take(&mut self.service_checks),
        }
    }

    /// Number of rate series with a previous sample.
    pub fn series(&self) -> usize {
        self.previous.len()
    }
}

impl ByteSizeOf for Recorder {
    fn allocated_bytes(&self) -> usize {
        self.previous
            .keys()
            .fold(0, |acc, key| acc + key.size_of() + size_of::<Sample>())
            + self.metrics.allocated_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use chrono::TimeZone;
    use event::{ServiceCheckStatus, tags};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn batch(cmd_get: f64) -> Batch {
        let tags = tags!("url" => "localhost:11211");
        let mut batch = Batch::default();
        batch.submit_gauge("memcache.curr_items", 3.0, &tags);
        batch.submit_rate("memcache.cmd_get_rate", cmd_get, &tags);
        batch.submit_service_check(
            "memcache.can_connect",
            ServiceCheckStatus::Ok,
            &tags!("host" => "localhost", "port" => "11211"),
            "",
        );
        batch
    }

    #[test]
    fn first_sample_is_baseline() {
        let mut recorder = Recorder::new();
        recorder.ingest(batch(100.0), at(0));

        let flushed = recorder.flush();
        assert_eq!(flushed.metrics.len(), 1);
        assert_eq!(flushed.metrics[0].name, "memcache.curr_items");
        assert_eq!(flushed.metrics[0].timestamp, Some(at(0)));
        assert_eq!(flushed.service_checks.len(), 1);
        assert_eq!(recorder.series(), 1);

        let flushed = recorder.flush();
        assert!(flushed.metrics.is_empty());
        assert!(flushed.service_checks.is_empty());
    }

    #[test]
    fn per_second_rate() {
        let mut recorder = Recorder::new();
        recorder.ingest(batch(100.0), at(0));
        recorder.ingest(batch(130.0), at(15));

        let flushed = recorder.flush();
        let rates = flushed
            .metrics
            .iter()
            .filter(|m| m.kind == MetricKind::Rate)
            .collect::<Vec<_>>();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].name, "memcache.cmd_get_rate");
        assert_eq!(rates[0].value, 2.0);
        assert_eq!(rates[0].tags, tags!("url" => "localhost:11211"));
        assert_eq!(rates[0].timestamp, Some(at(15)));
    }

    #[test]
    fn counter_reset() {
        let mut recorder = Recorder::new();
        recorder.ingest(batch(100.0), at(0));
        recorder.ingest(batch(5.0), at(10));
        recorder.ingest(batch(25.0), at(20));

        let rates = recorder
            .flush()
            .metrics
            .into_iter()
            .filter(|m| m.kind == MetricKind::Rate)
            .map(|m| m.value)
            .collect::<Vec<_>>();

        assert_eq!(rates, vec![2.0]);
    }

    #[test]
    fn same_timestamp() {
        let mut recorder = Recorder::new();
        recorder.ingest(batch(100.0), at(0));
        recorder.ingest(batch(200.0), at(0));

        assert!(
            recorder
                .flush()
                .metrics
                .iter()
                .all(|m| m.kind == MetricKind::Gauge)
        );
    }

    #[test]
    fn series_are_independent() {
        let mut recorder = Recorder::new();
        let mut first = Batch::default();
        first.submit_rate("memcache.cmd_get_rate", 10.0, &tags!("slab" => "1"));
        first.submit_rate("memcache.cmd_get_rate", 10.0, &tags!("slab" => "2"));
        recorder.ingest(first, at(0));

        let mut second = Batch::default();
        second.submit_rate("memcache.cmd_get_rate", 20.0, &tags!("slab" => "1"));
        second.submit_rate("memcache.cmd_get_rate", 40.0, &tags!("slab" => "2"));
        recorder.ingest(second, at(10));

        let mut rates = recorder
            .flush()
            .metrics
            .into_iter()
            .map(|m| (m.tags.get("slab").unwrap().to_string(), m.value))
            .collect::<Vec<_>>();
        rates.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(rates, vec![("1".to_string(), 1.0), ("2".to_string(), 3.0)]);
    }

    #[test]
    fn bounded_state() {
        let mut recorder = Recorder::new();
        recorder.ingest(batch(0.0), at(0));
        recorder.flush();
        let baseline = recorder.allocated_bytes();

        for i in 1..=50 {
            recorder.ingest(batch(i as f64), at(i * 15));
            recorder.flush();
        }

        assert_eq!(recorder.series(), 1);
        assert_eq!(recorder.allocated_bytes(), baseline);
    }

    #[test]
    fn expire_stale_series() {
        let mut recorder = Recorder::new().expire_after(Duration::from_secs(60));

        let mut first = Batch::default();
        first.submit_rate("memcache.slabs.cmd_set_rate", 1.0, &tags!("slab" => "7"));
        recorder.ingest(first, at(0));
        assert_eq!(recorder.series(), 1);

        recorder.ingest(batch(1.0), at(30));
        assert_eq!(recorder.series(), 2);

        recorder.ingest(batch(2.0), at(90));
        assert_eq!(recorder.series(), 1);
    }
}
