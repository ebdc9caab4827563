//! Query instrumentation.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use scout_metrics::HistogramVec;

pub(crate) static QUERY_DURATION: LazyLock<Arc<HistogramVec>> = LazyLock::new(|| {
    scout_metrics::global().histogram_vec(
        "query_duration_seconds",
        "Duration of time-series queries by querier and outcome.",
        &["name", "kind", "status"],
    )
});

/// Records one query observation when dropped.
pub(crate) struct QueryTimer<'a> {
    name: &'a str,
    kind: &'a str,
    status: &'a str,
    started: Instant,
}

impl<'a> QueryTimer<'a> {
    pub(crate) fn start(name: &'a str, kind: &'a str) -> Self {
        Self {
            name,
            kind,
            status: "failed",
            started: Instant::now(),
        }
    }

    pub(crate) fn finish(mut self, status: &'a str) {
        self.status = status;
    }
}

impl Drop for QueryTimer<'_> {
    fn drop(&mut self) {
        QUERY_DURATION.observe(
            &[self.name, self.kind, self.status],
            self.started.elapsed().as_secs_f64(),
        );
    }
}
