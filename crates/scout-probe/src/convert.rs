//! Typed conversion from query samples.
//!
//! Every query yields a numeric and a textual rendition of its sample;
//! the probe's result type picks which one it consumes.

use chrono::{DateTime, Utc};

/// A probe result type constructible from a query sample.
pub trait FromSample: Send + Sync + Sized + 'static {
    fn from_sample(value: f64, text: &str) -> Self;
}

impl FromSample for bool {
    fn from_sample(value: f64, _text: &str) -> Self {
        value != 0.0
    }
}

impl FromSample for f64 {
    fn from_sample(value: f64, _text: &str) -> Self {
        value
    }
}

impl FromSample for String {
    fn from_sample(_value: f64, text: &str) -> Self {
        text.to_string()
    }
}

impl FromSample for DateTime<Utc> {
    fn from_sample(value: f64, _text: &str) -> Self {
        // The numeric is unix seconds, possibly fractional.
        DateTime::from_timestamp_millis((value * 1000.0) as i64).unwrap_or_default()
    }
}
