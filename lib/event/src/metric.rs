use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ByteSizeOf, Tags};

/// How the host pipeline should treat the submitted value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Latest value wins.
    Gauge,
    /// A raw monotonic counter, the pipeline reports its per-second derivative.
    Rate,
}

#[derive(Clone, Debug, Deserialize, PartialEq, PartialOrd, Serialize)]
pub struct Metric {
    pub name: String,

    pub kind: MetricKind,

    pub value: f64,

    pub tags: Tags,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ByteSizeOf for Metric {
    fn allocated_bytes(&self) -> usize {
        self.name.allocated_bytes() + self.tags.allocated_bytes()
    }
}

impl Metric {
    pub fn new<N, V>(name: N, kind: MetricKind, value: V, tags: Tags) -> Metric
    where
        N: Into<String>,
        V: Into<f64>,
    {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            tags,
            timestamp: None,
        }
    }

    pub fn gauge<N, V>(name: N, value: V) -> Metric
    where
        N: Into<String>,
        V: Into<f64>,
    {
        Self::new(name, MetricKind::Gauge, value, Tags::default())
    }

    pub fn gauge_with_tags<N, V>(name: N, value: V, tags: Tags) -> Metric
    where
        N: Into<String>,
        V: Into<f64>,
    {
        Self::new(name, MetricKind::Gauge, value, tags)
    }

    pub fn rate<N, V>(name: N, value: V) -> Metric
    where
        N: Into<String>,
        V: Into<f64>,
    {
        Self::new(name, MetricKind::Rate, value, Tags::default())
    }

    pub fn rate_with_tags<N, V>(name: N, value: V, tags: Tags) -> Metric
    where
        N: Into<String>,
        V: Into<f64>,
    {
        Self::new(name, MetricKind::Rate, value, tags)
    }

    #[inline]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[inline]
    pub fn insert_tag(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.tags.insert_pair(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn test_gauge() {
        let m = Metric::gauge("name", 1);
        assert_eq!(m.name, "name");
        assert_eq!(m.kind, MetricKind::Gauge);
        assert_eq!(m.value, 1.0);
        assert!(m.tags.is_empty());
    }

    #[test]
    fn test_rate_with_tags() {
        let mut m = Metric::rate_with_tags("memcache.cmd_get_rate", 3.5, tags!("slab" => "1"));
        m.insert_tag("url", "localhost:11211");

        assert_eq!(m.kind, MetricKind::Rate);
        assert_eq!(m.tags.get("slab"), Some("1"));
        assert_eq!(m.tags.get("url"), Some("localhost:11211"));
    }

    #[test]
    fn serialize() {
        let m = Metric::gauge_with_tags("memcache.bytes", 10, tags!("url" => "unix:/tmp/mc.sock"));
        let text = serde_json::to_string(&m).unwrap();
        assert_eq!(
            text,
            r#"{"name":"memcache.bytes","kind":"gauge","value":10.0,"tags":["url:unix:/tmp/mc.sock"]}"#
        );
    }
}
