//! Collector registry and text exposition.

use std::sync::{Arc, Mutex};

use crate::family::{Collector, CounterVec, GaugeFn, GaugeVec, HistogramVec, DEFAULT_BUCKETS};

/// A set of collectors rendered together.
///
/// Families register in construction order and render in that order.
#[derive(Default)]
pub struct Registry {
    collectors: Mutex<Vec<Arc<dyn Collector>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a labeled gauge family.
    pub fn gauge_vec(
        &self,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Arc<GaugeVec> {
        let family = Arc::new(GaugeVec::new(name, help, labels));
        self.register(family.clone());
        family
    }

    /// Register a labeled counter family.
    pub fn counter_vec(
        &self,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Arc<CounterVec> {
        let family = Arc::new(CounterVec::new(name, help, labels));
        self.register(family.clone());
        family
    }

    /// Register a labeled histogram family with the default buckets.
    pub fn histogram_vec(
        &self,
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Arc<HistogramVec> {
        let family = Arc::new(HistogramVec::new(name, help, labels, &DEFAULT_BUCKETS));
        self.register(family.clone());
        family
    }

    /// Register a gauge whose value is read from a callback at render
    /// time.
    pub fn gauge_fn(
        &self,
        name: &'static str,
        help: &'static str,
        callback: impl Fn() -> f64 + Send + Sync + 'static,
    ) {
        self.register(Arc::new(GaugeFn::new(name, help, Box::new(callback))));
    }

    fn register(&self, collector: Arc<dyn Collector>) {
        self.collectors.lock().unwrap().push(collector);
    }

    /// Render every registered collector in the Prometheus text
    /// exposition format.
    pub fn render(&self) -> String {
        let collectors = self.collectors.lock().unwrap();
        let mut out = String::new();
        for collector in collectors.iter() {
            collector.render(&mut out);
        }
        out
    }
}
