//! Prometheus metrics for the feed client

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge_vec, Encoder, IntCounterVec, IntGaugeVec,
    TextEncoder,
};

use idsfeed_schema::Classification;

const LABEL_FEED: &str = "feed";
const LABEL_CLASSIFICATION: &str = "classification";

/// Validated records per classification
static RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "idsfeed_records_total",
        "Validated connection records received from the classifier",
        &[LABEL_FEED, LABEL_CLASSIFICATION]
    )
    .expect("Failed to register records_total metric")
});

static DROPPED_RECORDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "idsfeed_dropped_records_total",
        "Malformed records dropped by the validator",
        &[LABEL_FEED]
    )
    .expect("Failed to register dropped_records_total metric")
});

static RECONNECTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "idsfeed_reconnects_total",
        "Reconnect attempts after the initial connection attempt",
        &[LABEL_FEED]
    )
    .expect("Failed to register reconnects_total metric")
});

/// 1 = connected, 0 otherwise
static CONNECTED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "idsfeed_connected",
        "Classifier connection status (1=connected, 0=not connected)",
        &[LABEL_FEED]
    )
    .expect("Failed to register connected metric")
});

static BUFFER_EVENTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "idsfeed_buffer_events",
        "Events currently held in the live window",
        &[LABEL_FEED]
    )
    .expect("Failed to register buffer_events metric")
});

/// Handle for recording metrics for one feed
#[derive(Clone)]
pub struct FeedMetrics {
    feed: String,
}

impl FeedMetrics {
    pub fn new(feed: impl Into<String>) -> Self {
        Self { feed: feed.into() }
    }

    pub fn inc_record(&self, classification: Classification) {
        RECORDS_TOTAL
            .with_label_values(&[self.feed.as_str(), classification.as_str()])
            .inc();
    }

    pub fn inc_dropped(&self) {
        DROPPED_RECORDS_TOTAL
            .with_label_values(&[self.feed.as_str()])
            .inc();
    }

    pub fn inc_reconnect(&self) {
        RECONNECTS_TOTAL.with_label_values(&[self.feed.as_str()]).inc();
    }

    pub fn set_connected(&self, connected: bool) {
        CONNECTED
            .with_label_values(&[self.feed.as_str()])
            .set(i64::from(connected));
    }

    pub fn set_buffer_len(&self, len: usize) {
        BUFFER_EVENTS
            .with_label_values(&[self.feed.as_str()])
            .set(len as i64);
    }
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_metrics_recording() {
        let metrics = FeedMetrics::new("metrics-test");
        metrics.inc_record(Classification::Anomaly);
        metrics.inc_record(Classification::Anomaly);
        metrics.inc_dropped();
        metrics.inc_reconnect();
        metrics.set_connected(true);
        metrics.set_buffer_len(42);

        assert_eq!(
            RECORDS_TOTAL
                .with_label_values(&["metrics-test", "anomaly"])
                .get(),
            2
        );
        assert_eq!(CONNECTED.with_label_values(&["metrics-test"]).get(), 1);
        assert_eq!(BUFFER_EVENTS.with_label_values(&["metrics-test"]).get(), 42);
    }

    #[test]
    fn test_encode_metrics() {
        FeedMetrics::new("encode-test").inc_dropped();
        let output = encode_metrics().unwrap();
        assert!(output.contains("idsfeed_dropped_records_total"));
    }
}
