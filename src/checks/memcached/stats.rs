//! Classification of raw memcached stats.
//!
//! Every stat name is looked up in fixed tables, nothing is inferred from the
//! shape of a value. Names that are in no table are dropped, memcached adds
//! and removes stats between versions and build options.

use event::MetricKind;

use super::client::RawStats;

pub const GAUGES: &[&str] = &[
    "total_items",
    "curr_items",
    "limit_maxbytes",
    "uptime",
    "bytes",
    "curr_connections",
    "connection_structures",
    "threads",
    "pointer_size",
];

/// Derived from other stats, once per cycle.
pub const COMPUTED_GAUGES: &[&str] = &["get_hit_percent", "fill_percent", "avg_item_size"];

pub const RATES: &[&str] = &[
    "rusage_user",
    "rusage_system",
    "cmd_get",
    "cmd_set",
    "cmd_flush",
    "get_hits",
    "get_misses",
    "delete_misses",
    "delete_hits",
    "evictions",
    "bytes_read",
    "bytes_written",
    "cas_misses",
    "cas_hits",
    "cas_badval",
    "total_connections",
    "listen_disabled_num",
];

pub const ITEMS_RATES: &[&str] = &[
    "evicted",
    "evicted_nonzero",
    "expired_unfetched",
    "evicted_unfetched",
    "outofmemory",
    "tailrepairs",
    "reclaimed",
    "crawler_reclaimed",
    "lrutail_reflocked",
];

pub const ITEMS_GAUGES: &[&str] = &["number", "age", "evicted_time"];

pub const SLABS_RATES: &[&str] = &[
    "get_hits",
    "cmd_set",
    "delete_hits",
    "incr_hits",
    "decr_hits",
    "cas_hits",
    "cas_badval",
    "touch_hits",
    "used_chunks",
];

pub const SLABS_GAUGES: &[&str] = &[
    "chunk_size",
    "chunks_per_page",
    "total_pages",
    "total_chunks",
    "used_chunks",
    "free_chunks",
    "free_chunks_end",
    "mem_requested",
];

/// Reported across all slab classes, so they carry no slab tag.
pub const SLABS_AGGREGATES: &[&str] = &["active_slabs", "total_malloced"];

/// Which command a stat came from, decides the metric name prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Group {
    General,
    Items,
    Slabs,
}

impl Group {
    pub const fn prefix(&self) -> Option<&'static str> {
        match self {
            Group::General => None,
            Group::Items => Some("items"),
            Group::Slabs => Some("slabs"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classified {
    pub group: Group,
    pub stat: &'static str,
    pub kind: MetricKind,
    pub value: f64,
    pub slab: Option<String>,
}

impl Classified {
    fn new(group: Group, stat: &'static str, kind: MetricKind, value: f64) -> Self {
        Self {
            group,
            stat,
            kind,
            value,
            slab: None,
        }
    }

    fn with_slab(mut self, slab: &str) -> Self {
        self.slab = Some(slab.to_string());
        self
    }
}

fn lookup(table: &[&'static str], name: &str) -> Option<&'static str> {
    table.iter().find(|stat| **stat == name).copied()
}

/// Numeric conversion of a raw value, `None` means skip it this cycle.
fn parse_value(name: &str, raw: &str) -> Option<f64> {
    // Older servers report rusage as `seconds:microseconds`.
    let value = match raw.split_once(':') {
        Some((secs, micros)) if name.starts_with("rusage_") => {
            let secs = secs.parse::<u64>().ok()?;
            let micros = micros.parse::<u64>().ok()?;
            secs as f64 + micros as f64 / 1_000_000.0
        }
        _ => raw.parse::<f64>().ok()?,
    };

    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Like [`parse_value`], but logs what gets skipped.
fn parse_or_skip(key: &str, name: &str, raw: &str) -> Option<f64> {
    let value = parse_value(name, raw);
    if value.is_none() {
        debug!(message = "Skip unparsable memcached stat", key, raw);
    }

    value
}

fn value_of(stats: &RawStats, name: &str) -> Option<f64> {
    let raw = stats.get(name)?;
    parse_or_skip(name, name, raw)
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Classify the reply of `stats`, the computed gauges included.
pub fn classify_general(stats: &RawStats) -> Vec<Classified> {
    let mut classified = Vec::with_capacity(GAUGES.len() + RATES.len() + COMPUTED_GAUGES.len());

    for name in stats.keys() {
        let (stat, kind) = if let Some(stat) = lookup(GAUGES, name) {
            (stat, MetricKind::Gauge)
        } else if let Some(stat) = lookup(RATES, name) {
            (stat, MetricKind::Rate)
        } else {
            continue;
        };

        if let Some(value) = value_of(stats, name) {
            classified.push(Classified::new(Group::General, stat, kind, value));
        }
    }

    let hits = value_of(stats, "get_hits");
    let misses = value_of(stats, "get_misses");
    if let (Some(hits), Some(misses)) = (hits, misses) {
        classified.push(Classified::new(
            Group::General,
            "get_hit_percent",
            MetricKind::Gauge,
            percent(hits, hits + misses),
        ));
    }

    let bytes = value_of(stats, "bytes");
    if let (Some(bytes), Some(limit)) = (bytes, value_of(stats, "limit_maxbytes")) {
        classified.push(Classified::new(
            Group::General,
            "fill_percent",
            MetricKind::Gauge,
            percent(bytes, limit),
        ));
    }

    if let (Some(bytes), Some(items)) = (bytes, value_of(stats, "curr_items")) {
        let avg = if items == 0.0 { 0.0 } else { bytes / items };
        classified.push(Classified::new(
            Group::General,
            "avg_item_size",
            MetricKind::Gauge,
            avg,
        ));
    }

    classified
}

/// Classify the reply of `stats items`, keys look like `items:<slab>:<stat>`.
pub fn classify_items(stats: &RawStats) -> Vec<Classified> {
    let mut classified = Vec::new();

    for (key, raw) in stats {
        let Some((slab, name)) = key
            .strip_prefix("items:")
            .and_then(|rest| rest.split_once(':'))
        else {
            continue;
        };

        if slab.is_empty() {
            continue;
        }

        let (stat, kind) = if let Some(stat) = lookup(ITEMS_GAUGES, name) {
            (stat, MetricKind::Gauge)
        } else if let Some(stat) = lookup(ITEMS_RATES, name) {
            (stat, MetricKind::Rate)
        } else {
            continue;
        };

        if let Some(value) = parse_or_skip(key, name, raw) {
            classified.push(Classified::new(Group::Items, stat, kind, value).with_slab(slab));
        }
    }

    classified
}

/// Classify the reply of `stats slabs`, keys look like `<slab>:<stat>`
/// except for the cross slab aggregates.
pub fn classify_slabs(stats: &RawStats) -> Vec<Classified> {
    let mut classified = Vec::new();

    for (key, raw) in stats {
        match key.split_once(':') {
            None => {
                let Some(stat) = lookup(SLABS_AGGREGATES, key) else {
                    continue;
                };

                if let Some(value) = parse_or_skip(key, key, raw) {
                    classified.push(Classified::new(
                        Group::Slabs,
                        stat,
                        MetricKind::Gauge,
                        value,
                    ));
                }
            }

            Some((slab, name)) => {
                if slab.is_empty() {
                    continue;
                }

                let gauge = lookup(SLABS_GAUGES, name);
                let rate = lookup(SLABS_RATES, name);
                if gauge.is_none() && rate.is_none() {
                    continue;
                }

                let Some(value) = parse_or_skip(key, name, raw) else {
                    continue;
                };

                // used_chunks is both a gauge and a rate
                if let Some(stat) = gauge {
                    classified.push(
                        Classified::new(Group::Slabs, stat, MetricKind::Gauge, value)
                            .with_slab(slab),
                    );
                }

                if let Some(stat) = rate {
                    classified.push(
                        Classified::new(Group::Slabs, stat, MetricKind::Rate, value)
                            .with_slab(slab),
                    );
                }
            }
        }
    }

    classified
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawStats {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn find<'a>(classified: &'a [Classified], stat: &str, kind: MetricKind) -> Option<&'a Classified> {
        classified.iter().find(|c| c.stat == stat && c.kind == kind)
    }

    fn fixture(name: &str) -> RawStats {
        let path = format!("tests/fixtures/memcached/{name}.txt");
        let data = std::fs::read_to_string(path).unwrap();

        data.lines()
            .filter_map(|line| {
                let rest = line.strip_prefix("STAT ")?;
                let (k, v) = rest.split_once(' ')?;
                Some((k.to_string(), v.trim().to_string()))
            })
            .collect()
    }

    #[test]
    fn hit_percent() {
        let classified = classify_general(&raw(&[("get_hits", "10"), ("get_misses", "0")]));
        let hit = find(&classified, "get_hit_percent", MetricKind::Gauge).unwrap();
        assert_eq!(hit.value, 100.0);

        let classified = classify_general(&raw(&[("get_hits", "0"), ("get_misses", "0")]));
        let hit = find(&classified, "get_hit_percent", MetricKind::Gauge).unwrap();
        assert_eq!(hit.value, 0.0);

        let classified = classify_general(&raw(&[("get_hits", "1"), ("get_misses", "3")]));
        let hit = find(&classified, "get_hit_percent", MetricKind::Gauge).unwrap();
        assert_eq!(hit.value, 25.0);
    }

    #[test]
    fn fill_percent_and_avg_item_size() {
        let classified = classify_general(&raw(&[
            ("bytes", "512"),
            ("limit_maxbytes", "1024"),
            ("curr_items", "4"),
        ]));

        assert_eq!(find(&classified, "fill_percent", MetricKind::Gauge).unwrap().value, 50.0);
        assert_eq!(find(&classified, "avg_item_size", MetricKind::Gauge).unwrap().value, 128.0);

        let classified = classify_general(&raw(&[
            ("bytes", "0"),
            ("limit_maxbytes", "0"),
            ("curr_items", "0"),
        ]));

        assert_eq!(find(&classified, "fill_percent", MetricKind::Gauge).unwrap().value, 0.0);
        assert_eq!(find(&classified, "avg_item_size", MetricKind::Gauge).unwrap().value, 0.0);
    }

    #[test]
    fn computed_need_inputs() {
        let classified = classify_general(&raw(&[
            ("get_hits", "5"),
            ("bytes", "oops"),
            ("limit_maxbytes", "1024"),
            ("curr_items", "4"),
        ]));

        for stat in COMPUTED_GAUGES {
            assert!(find(&classified, stat, MetricKind::Gauge).is_none(), "{stat}");
        }
        assert!(find(&classified, "get_hits", MetricKind::Rate).is_some());
    }

    #[test]
    fn unknown_and_malformed_are_dropped() {
        let classified = classify_general(&raw(&[
            ("version", "1.6.12"),
            ("pid", "1"),
            ("curr_items", "not-a-number"),
            ("uptime", "NaN"),
            ("threads", "4"),
        ]));

        assert_eq!(
            classified,
            vec![Classified::new(Group::General, "threads", MetricKind::Gauge, 4.0)]
        );
    }

    #[test]
    fn rusage_formats() {
        let classified = classify_general(&raw(&[
            ("rusage_user", "0.012154"),
            ("rusage_system", "1:500000"),
        ]));

        assert_eq!(find(&classified, "rusage_user", MetricKind::Rate).unwrap().value, 0.012154);
        assert_eq!(find(&classified, "rusage_system", MetricKind::Rate).unwrap().value, 1.5);
    }

    #[test]
    fn general_fixture() {
        let classified = classify_general(&fixture("stats"));

        let mut gauges = classified
            .iter()
            .filter(|c| c.kind == MetricKind::Gauge)
            .map(|c| c.stat)
            .collect::<Vec<_>>();
        gauges.sort_unstable();
        let mut want = GAUGES.iter().chain(COMPUTED_GAUGES).copied().collect::<Vec<_>>();
        want.sort_unstable();
        assert_eq!(gauges, want);

        let mut rates = classified
            .iter()
            .filter(|c| c.kind == MetricKind::Rate)
            .map(|c| c.stat)
            .collect::<Vec<_>>();
        rates.sort_unstable();
        let mut want = RATES.to_vec();
        want.sort_unstable();
        assert_eq!(rates, want);

        assert!(classified.iter().all(|c| c.slab.is_none()));
        assert_eq!(find(&classified, "get_hit_percent", MetricKind::Gauge).unwrap().value, 80.0);
        assert_eq!(find(&classified, "avg_item_size", MetricKind::Gauge).unwrap().value, 64.0);
    }

    #[test]
    fn items_fixture() {
        let classified = classify_items(&fixture("items"));

        assert_eq!(classified.len(), ITEMS_GAUGES.len() + ITEMS_RATES.len());
        assert!(classified.iter().all(|c| c.slab.as_deref() == Some("1")));
        assert!(classified.iter().all(|c| c.group == Group::Items));
        for stat in ITEMS_GAUGES {
            assert!(find(&classified, stat, MetricKind::Gauge).is_some(), "{stat}");
        }
        for stat in ITEMS_RATES {
            assert!(find(&classified, stat, MetricKind::Rate).is_some(), "{stat}");
        }

        assert_eq!(find(&classified, "number", MetricKind::Gauge).unwrap().value, 100.0);
    }

    #[test]
    fn slabs_fixture() {
        let classified = classify_slabs(&fixture("slabs"));

        assert_eq!(
            classified.len(),
            SLABS_GAUGES.len() + SLABS_RATES.len() + SLABS_AGGREGATES.len()
        );

        for stat in SLABS_AGGREGATES {
            let c = find(&classified, stat, MetricKind::Gauge).unwrap();
            assert_eq!(c.slab, None);
        }
        for stat in SLABS_GAUGES {
            let c = find(&classified, stat, MetricKind::Gauge).unwrap();
            assert_eq!(c.slab.as_deref(), Some("1"));
        }
        for stat in SLABS_RATES {
            let c = find(&classified, stat, MetricKind::Rate).unwrap();
            assert_eq!(c.slab.as_deref(), Some("1"));
        }

        assert_eq!(
            find(&classified, "total_malloced", MetricKind::Gauge).unwrap().value,
            1048576.0
        );
    }

    #[test]
    fn malformed_slab_and_item_values() {
        let classified = classify_slabs(&raw(&[
            ("1:chunk_size", "96"),
            ("1:used_chunks", "\u{FFFD}"),
            ("total_malloced", "lots"),
        ]));
        assert_eq!(
            classified,
            vec![Classified::new(Group::Slabs, "chunk_size", MetricKind::Gauge, 96.0).with_slab("1")]
        );

        let classified = classify_items(&raw(&[
            ("items:1:number", "3"),
            ("items:1:age", "-"),
            ("items:1:evicted", "inf"),
        ]));
        assert_eq!(
            classified,
            vec![Classified::new(Group::Items, "number", MetricKind::Gauge, 3.0).with_slab("1")]
        );
    }

    #[test]
    fn multiple_slab_classes() {
        let classified = classify_slabs(&raw(&[
            ("1:chunk_size", "96"),
            ("5:chunk_size", "240"),
            ("items:1:number", "3"),
            ("active_slabs", "2"),
        ]));

        let mut slabs = classified
            .iter()
            .filter_map(|c| c.slab.as_deref())
            .collect::<Vec<_>>();
        slabs.sort_unstable();
        assert_eq!(slabs, vec!["1", "5"]);
        assert_eq!(classified.len(), 3);
    }
}
