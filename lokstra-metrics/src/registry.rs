//! The metrics service (spec §4.L): a process-wide mapping of metric name
//! to a counter/gauge/histogram vector, each keyed by a label-key schema
//! that is fixed the first time that name is observed.
//!
//! Grounded on `r2e-prometheus`: one `prometheus::Registry` backs every
//! vector, and `/metrics` is served by text-encoding it (`r2e-prometheus`'s
//! `handler.rs`). Unlike the teacher - which only ever registers the one
//! fixed HTTP-request histogram it ships - this registry is generic: any
//! caller can declare a new counter/gauge/histogram name, and the first
//! call's label set becomes that name's permanent schema.

use dashmap::DashMap;
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

enum Vector {
    Counter(IntCounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec),
}

struct Entry {
    vector: Vector,
    /// Sorted label key schema, fixed at first observation (spec §4.L:
    /// "subsequent calls with a different key set must fail").
    label_keys: Vec<String>,
}

/// Counts of registered metrics by kind, returned by [`MetricsRegistry::summary`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub counters: usize,
    pub gauges: usize,
    pub histograms: usize,
}

/// The process-wide metric vector registry. Cheap to clone - every field
/// is an `Arc`-backed concurrent map, following the same pattern as
/// `lokstra_registry::ServiceRegistry` (spec §9, tests construct a fresh
/// instance rather than rely on a true global `static`).
#[derive(Clone)]
pub struct MetricsRegistry {
    prometheus: Registry,
    entries: Arc<DashMap<String, Entry>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        MetricsRegistry {
            prometheus: Registry::new(),
            entries: Arc::new(DashMap::new()),
        }
    }

    fn sorted_keys(labels: &[(&str, &str)]) -> Vec<String> {
        let mut keys: Vec<String> = labels.iter().map(|(k, _)| k.to_string()).collect();
        keys.sort();
        keys
    }

    fn values_in_schema<'a>(labels: &'a [(&str, &str)], schema: &[String]) -> Option<Vec<&'a str>> {
        schema
            .iter()
            .map(|key| labels.iter().find(|(k, _)| *k == key).map(|(_, v)| *v))
            .collect()
    }

    pub fn inc_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.inc_counter_by(name, 1, labels)
    }

    pub fn inc_counter_by(&self, name: &str, amount: u64, labels: &[(&str, &str)]) {
        let keys = Self::sorted_keys(labels);
        let mut entry = self.entries.entry(name.to_string()).or_insert_with(|| {
            let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
            let vec = IntCounterVec::new(Opts::new(name, format!("{name} counter")), &key_refs)
                .expect("valid counter metric name/labels");
            self.prometheus
                .register(Box::new(vec.clone()))
                .expect("counter registered exactly once per name");
            Entry {
                vector: Vector::Counter(vec),
                label_keys: keys.clone(),
            }
        });

        let Vector::Counter(vec) = &entry.vector else {
            tracing::warn!(metric = name, "inc_counter called on a non-counter metric name; dropped");
            return;
        };
        let Some(values) = Self::values_in_schema(labels, &entry.label_keys) else {
            tracing::warn!(metric = name, "inc_counter label keys do not match the schema fixed at first observation; dropped");
            return;
        };
        vec.with_label_values(&values).inc_by(amount);
    }

    pub fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let keys = Self::sorted_keys(labels);
        let mut entry = self.entries.entry(name.to_string()).or_insert_with(|| {
            let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
            let vec = GaugeVec::new(Opts::new(name, format!("{name} gauge")), &key_refs)
                .expect("valid gauge metric name/labels");
            self.prometheus
                .register(Box::new(vec.clone()))
                .expect("gauge registered exactly once per name");
            Entry {
                vector: Vector::Gauge(vec),
                label_keys: keys.clone(),
            }
        });

        let Vector::Gauge(vec) = &entry.vector else {
            tracing::warn!(metric = name, "set_gauge called on a non-gauge metric name; dropped");
            return;
        };
        let Some(values) = Self::values_in_schema(labels, &entry.label_keys) else {
            tracing::warn!(metric = name, "set_gauge label keys do not match the schema fixed at first observation; dropped");
            return;
        };
        vec.with_label_values(&values).set(value);
    }

    pub fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let keys = Self::sorted_keys(labels);
        let mut entry = self.entries.entry(name.to_string()).or_insert_with(|| {
            let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
            let vec = HistogramVec::new(HistogramOpts::new(name, format!("{name} histogram")), &key_refs)
                .expect("valid histogram metric name/labels");
            self.prometheus
                .register(Box::new(vec.clone()))
                .expect("histogram registered exactly once per name");
            Entry {
                vector: Vector::Histogram(vec),
                label_keys: keys.clone(),
            }
        });

        let Vector::Histogram(vec) = &entry.vector else {
            tracing::warn!(metric = name, "observe_histogram called on a non-histogram metric name; dropped");
            return;
        };
        let Some(values) = Self::values_in_schema(labels, &entry.label_keys) else {
            tracing::warn!(metric = name, "observe_histogram label keys do not match the schema fixed at first observation; dropped");
            return;
        };
        vec.with_label_values(&values).observe(value);
    }

    /// Render every registered vector in Prometheus text exposition format
    /// (spec §4.L `GetHTTPHandler`).
    pub fn encode(&self) -> String {
        let families = self.prometheus.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .expect("prometheus text encoding never fails for gathered families");
        String::from_utf8(buf).expect("prometheus text encoder always emits valid utf-8")
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for entry in self.entries.iter() {
            match entry.vector {
                Vector::Counter(_) => s.counters += 1,
                Vector::Gauge(_) => s.gauges += 1,
                Vector::Histogram(_) => s.histograms += 1,
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_increments_and_survives_repeated_labels() {
        let reg = MetricsRegistry::new();
        reg.inc_counter("requests_total", &[("method", "GET"), ("status", "200")]);
        reg.inc_counter("requests_total", &[("status", "200"), ("method", "GET")]);
        let body = reg.encode();
        assert!(body.contains("requests_total"));
        assert!(body.contains(r#"method="GET""#));
    }

    #[test]
    fn mismatched_label_schema_is_dropped_not_panicked() {
        let reg = MetricsRegistry::new();
        reg.inc_counter("requests_total", &[("method", "GET")]);
        // Different key set for the same name: must be logged and dropped,
        // never panic and never silently create a second schema.
        reg.inc_counter("requests_total", &[("method", "GET"), ("extra", "x")]);
        assert_eq!(reg.summary().counters, 1);
    }

    #[test]
    fn gauge_and_histogram_are_independent_kinds() {
        let reg = MetricsRegistry::new();
        reg.set_gauge("queue_depth", 3.0, &[("queue", "default")]);
        reg.observe_histogram("request_duration_seconds", 0.25, &[("route", "/x")]);
        let summary = reg.summary();
        assert_eq!(summary.gauges, 1);
        assert_eq!(summary.histograms, 1);
        assert_eq!(summary.counters, 0);
    }

    #[test]
    fn wrong_kind_for_an_existing_name_is_dropped() {
        let reg = MetricsRegistry::new();
        reg.inc_counter("thing", &[]);
        reg.set_gauge("thing", 1.0, &[]);
        let summary = reg.summary();
        assert_eq!(summary.counters, 1);
        assert_eq!(summary.gauges, 0);
    }
}
