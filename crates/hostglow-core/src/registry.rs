//! The concurrent metric registry.
//!
//! A single writer (the sampling pipeline) upserts values each cycle while
//! HTTP handlers take snapshots concurrently. Keys order deterministically
//! (name, then label pairs), so a snapshot is already in exposition order.

use std::collections::BTreeMap;
use std::sync::RwLock;

/// Identity of one time series: metric name plus sorted label pairs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey {
    pub name: String,
    pub labels: Vec<(String, String)>,
}

impl MetricKey {
    /// Builds a key, sorting labels so equal label sets compare equal
    /// regardless of insertion order.
    pub fn new(name: impl Into<String>, mut labels: Vec<(String, String)>) -> Self {
        labels.sort();
        Self {
            name: name.into(),
            labels,
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
        }
    }
}

/// How the stored value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Raw gauge reading.
    Gauge,
    /// Per-second rate derived from a counter.
    Rate,
}

/// One stored time series value.
#[derive(Debug, Clone)]
pub struct MetricValue {
    pub key: MetricKey,
    pub kind: MetricKind,
    pub value: f64,
    pub help: &'static str,
    /// Wall-clock seconds of the cycle that last wrote this value.
    pub last_updated: f64,
}

/// Registry shared between the sampling pipeline and HTTP handlers.
///
/// Upserts replace whole values per key, so a concurrent snapshot sees each
/// key's value from either the current or the previous cycle, never a blend
/// of fields. `upsert_batch` writes a full cycle under one lock.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    inner: RwLock<BTreeMap<MetricKey, MetricValue>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, value: MetricValue) {
        self.inner.write().unwrap().insert(value.key.clone(), value);
    }

    pub fn upsert_batch(&self, values: Vec<MetricValue>) {
        let mut map = self.inner.write().unwrap();
        for value in values {
            map.insert(value.key.clone(), value);
        }
    }

    /// Returns all values in key order.
    pub fn snapshot(&self) -> Vec<MetricValue> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn gauge(name: &str, labels: Vec<(String, String)>, value: f64) -> MetricValue {
        MetricValue {
            key: MetricKey::new(name, labels),
            kind: MetricKind::Gauge,
            value,
            help: "test gauge",
            last_updated: 0.0,
        }
    }

    #[test]
    fn label_order_does_not_affect_identity() {
        let a = MetricKey::new(
            "m",
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
            ],
        );
        let b = MetricKey::new(
            "m",
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn upsert_replaces_value() {
        let reg = MetricRegistry::new();
        reg.upsert(gauge("hostglow_uptime_seconds", vec![], 10.0));
        reg.upsert(gauge("hostglow_uptime_seconds", vec![], 20.0));

        let snap = reg.snapshot();
        assert_eq!(snap.len(), 1);
        assert!((snap[0].value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_is_key_ordered() {
        let reg = MetricRegistry::new();
        reg.upsert(gauge("z_metric", vec![], 1.0));
        reg.upsert(gauge(
            "a_metric",
            vec![("interface".to_string(), "lo".to_string())],
            2.0,
        ));
        reg.upsert(gauge(
            "a_metric",
            vec![("interface".to_string(), "eth0".to_string())],
            3.0,
        ));

        let names: Vec<(String, Vec<(String, String)>)> = reg
            .snapshot()
            .into_iter()
            .map(|v| (v.key.name, v.key.labels))
            .collect();
        assert_eq!(names[0].0, "a_metric");
        assert_eq!(names[0].1[0].1, "eth0");
        assert_eq!(names[1].1[0].1, "lo");
        assert_eq!(names[2].0, "z_metric");
    }

    #[test]
    fn concurrent_upserts_and_snapshots() {
        let reg = Arc::new(MetricRegistry::new());
        let writer = {
            let reg = Arc::clone(&reg);
            std::thread::spawn(move || {
                for i in 0..1000u32 {
                    reg.upsert_batch(vec![
                        gauge("m1", vec![], f64::from(i)),
                        gauge("m2", vec![], f64::from(i)),
                    ]);
                }
            })
        };

        for _ in 0..1000 {
            let snap = reg.snapshot();
            if snap.len() == 2 {
                // Both keys were written under one lock in the same batch.
                assert!((snap[0].value - snap[1].value).abs() < 1e-9);
            }
        }
        writer.join().unwrap();
        assert_eq!(reg.len(), 2);
    }
}
