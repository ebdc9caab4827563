//! Metric families — labeled gauges, counters, and histograms.
//!
//! Each family owns a map from label values to a cell. Cells are
//! guarded by a `std::sync::Mutex`; critical sections never block on
//! I/O, so the plain mutex is sufficient at expected cardinalities.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Default histogram buckets (seconds), matching the Prometheus
/// client defaults.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Anything that can render itself in the text exposition format.
pub trait Collector: Send + Sync {
    fn render(&self, out: &mut String);
}

/// A gauge family with a fixed label set.
pub struct GaugeVec {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    values: Mutex<BTreeMap<Vec<String>, f64>>,
}

impl GaugeVec {
    pub(crate) fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    /// Set the gauge for the given label values.
    pub fn set(&self, label_values: &[&str], value: f64) {
        let key = self.key(label_values);
        self.values.lock().unwrap().insert(key, value);
    }

    /// Drop the series for the given label values.
    pub fn remove(&self, label_values: &[&str]) {
        let key = self.key(label_values);
        self.values.lock().unwrap().remove(&key);
    }

    /// Current value for the given label values, if the series exists.
    pub fn get(&self, label_values: &[&str]) -> Option<f64> {
        let key = self.key(label_values);
        self.values.lock().unwrap().get(&key).copied()
    }

    fn key(&self, label_values: &[&str]) -> Vec<String> {
        assert_eq!(
            label_values.len(),
            self.labels.len(),
            "metric {}: expected {} label values",
            self.name,
            self.labels.len()
        );
        label_values.iter().map(|v| v.to_string()).collect()
    }
}

impl Collector for GaugeVec {
    fn render(&self, out: &mut String) {
        preamble(out, self.name, self.help, "gauge");
        for (key, value) in self.values.lock().unwrap().iter() {
            out.push_str(self.name);
            render_labels(out, self.labels, key);
            out.push(' ');
            push_value(out, *value);
            out.push('\n');
        }
    }
}

/// A counter family with a fixed label set.
pub struct CounterVec {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    values: Mutex<BTreeMap<Vec<String>, f64>>,
}

impl CounterVec {
    pub(crate) fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            values: Mutex::new(BTreeMap::new()),
        }
    }

    /// Increment the counter for the given label values by one.
    pub fn inc(&self, label_values: &[&str]) {
        self.add(label_values, 1.0);
    }

    /// Add `delta` to the counter for the given label values.
    pub fn add(&self, label_values: &[&str], delta: f64) {
        let key = self.key(label_values);
        *self.values.lock().unwrap().entry(key).or_insert(0.0) += delta;
    }

    /// Current count for the given label values (0 if never incremented).
    pub fn get(&self, label_values: &[&str]) -> f64 {
        let key = self.key(label_values);
        self.values.lock().unwrap().get(&key).copied().unwrap_or(0.0)
    }

    fn key(&self, label_values: &[&str]) -> Vec<String> {
        assert_eq!(
            label_values.len(),
            self.labels.len(),
            "metric {}: expected {} label values",
            self.name,
            self.labels.len()
        );
        label_values.iter().map(|v| v.to_string()).collect()
    }
}

impl Collector for CounterVec {
    fn render(&self, out: &mut String) {
        preamble(out, self.name, self.help, "counter");
        for (key, value) in self.values.lock().unwrap().iter() {
            out.push_str(self.name);
            render_labels(out, self.labels, key);
            out.push(' ');
            push_value(out, *value);
            out.push('\n');
        }
    }
}

struct HistogramCell {
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
}

/// A histogram family with a fixed label set and fixed buckets.
pub struct HistogramVec {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    buckets: Vec<f64>,
    cells: Mutex<BTreeMap<Vec<String>, HistogramCell>>,
}

impl HistogramVec {
    pub(crate) fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
        buckets: &[f64],
    ) -> Self {
        Self {
            name,
            help,
            labels,
            buckets: buckets.to_vec(),
            cells: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record one observation for the given label values.
    pub fn observe(&self, label_values: &[&str], value: f64) {
        assert_eq!(
            label_values.len(),
            self.labels.len(),
            "metric {}: expected {} label values",
            self.name,
            self.labels.len()
        );
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();

        let mut cells = self.cells.lock().unwrap();
        let cell = cells.entry(key).or_insert_with(|| HistogramCell {
            bucket_counts: vec![0; self.buckets.len()],
            sum: 0.0,
            count: 0,
        });
        for (i, upper) in self.buckets.iter().enumerate() {
            if value <= *upper {
                cell.bucket_counts[i] += 1;
            }
        }
        cell.sum += value;
        cell.count += 1;
    }

    /// Total observation count for the given label values.
    pub fn count(&self, label_values: &[&str]) -> u64 {
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.cells
            .lock()
            .unwrap()
            .get(&key)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

impl Collector for HistogramVec {
    fn render(&self, out: &mut String) {
        preamble(out, self.name, self.help, "histogram");
        for (key, cell) in self.cells.lock().unwrap().iter() {
            for (i, upper) in self.buckets.iter().enumerate() {
                out.push_str(self.name);
                out.push_str("_bucket");
                render_labels_with(out, self.labels, key, Some(("le", &format_le(*upper))));
                out.push(' ');
                out.push_str(&cell.bucket_counts[i].to_string());
                out.push('\n');
            }
            out.push_str(self.name);
            out.push_str("_bucket");
            render_labels_with(out, self.labels, key, Some(("le", "+Inf")));
            out.push(' ');
            out.push_str(&cell.count.to_string());
            out.push('\n');

            out.push_str(self.name);
            out.push_str("_sum");
            render_labels(out, self.labels, key);
            out.push(' ');
            push_value(out, cell.sum);
            out.push('\n');

            out.push_str(self.name);
            out.push_str("_count");
            render_labels(out, self.labels, key);
            out.push(' ');
            out.push_str(&cell.count.to_string());
            out.push('\n');
        }
    }
}

/// A gauge whose value is computed by a callback at render time.
pub struct GaugeFn {
    name: &'static str,
    help: &'static str,
    callback: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl GaugeFn {
    pub(crate) fn new(
        name: &'static str,
        help: &'static str,
        callback: Box<dyn Fn() -> f64 + Send + Sync>,
    ) -> Self {
        Self {
            name,
            help,
            callback,
        }
    }
}

impl Collector for GaugeFn {
    fn render(&self, out: &mut String) {
        preamble(out, self.name, self.help, "gauge");
        out.push_str(self.name);
        out.push(' ');
        push_value(out, (self.callback)());
        out.push('\n');
    }
}

fn preamble(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str("# HELP ");
    out.push_str(name);
    out.push(' ');
    out.push_str(help);
    out.push('\n');
    out.push_str("# TYPE ");
    out.push_str(name);
    out.push(' ');
    out.push_str(kind);
    out.push('\n');
}

fn render_labels(out: &mut String, names: &[&str], values: &[String]) {
    render_labels_with(out, names, values, None);
}

fn render_labels_with(
    out: &mut String,
    names: &[&str],
    values: &[String],
    extra: Option<(&str, &str)>,
) {
    if names.is_empty() && extra.is_none() {
        return;
    }
    out.push('{');
    let mut first = true;
    for (name, value) in names.iter().zip(values) {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_label(value));
        out.push('"');
    }
    if let Some((name, value)) = extra {
        if !first {
            out.push(',');
        }
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_label(value));
        out.push('"');
    }
    out.push('}');
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_le(upper: f64) -> String {
    // Trailing-zero-free representation keeps bucket labels stable.
    format!("{upper}")
}

fn push_value(out: &mut String, value: f64) {
    out.push_str(&format!("{value}"));
}
