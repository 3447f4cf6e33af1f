use event::{Metric, MetricKind, ServiceCheck, ServiceCheckStatus, Tags};

/// The submission interface a check talks to.
///
/// The host decides what happens with submissions, a check only describes
/// what it observed during one run.
pub trait Aggregator: Send {
    fn submit_metric(&mut self, kind: MetricKind, name: &str, value: f64, tags: &Tags);

    fn submit_service_check(
        &mut self,
        name: &str,
        status: ServiceCheckStatus,
        tags: &Tags,
        message: &str,
    );

    /// Send Gauge metric
    fn submit_gauge(&mut self, name: &str, value: f64, tags: &Tags) {
        self.submit_metric(MetricKind::Gauge, name, value, tags)
    }

    /// Send Rate metric, `value` is the raw counter
    fn submit_rate(&mut self, name: &str, value: f64, tags: &Tags) {
        self.submit_metric(MetricKind::Rate, name, value, tags)
    }
}

/// Buffers the submissions of a single instance run.
#[derive(Debug, Default)]
pub struct Batch {
    pub metrics: Vec<Metric>,
    pub service_checks: Vec<ServiceCheck>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.service_checks.is_empty()
    }
}

impl Aggregator for Batch {
    fn submit_metric(&mut self, kind: MetricKind, name: &str, value: f64, tags: &Tags) {
        self.metrics.push(Metric::new(name, kind, value, tags.clone()));
    }

    fn submit_service_check(
        &mut self,
        name: &str,
        status: ServiceCheckStatus,
        tags: &Tags,
        message: &str,
    ) {
        self.service_checks
            .push(ServiceCheck::new(name, status, tags.clone(), message));
    }
}
