//! Validated connection event types
//!
//! Field names serialize in the same snake_case shape the classifier emits,
//! so a snapshot can be handed back to a web frontend unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifier verdict for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Normal,
    Anomaly,
}

impl Classification {
    /// Map a wire value to a verdict. Anything unrecognised is an anomaly.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Self::Normal,
            _ => Self::Anomaly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Anomaly => "anomaly",
        }
    }

    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::Anomaly)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who the classifier thinks generated the traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficSource {
    Human,
    Bot,
    Ai,
    Unknown,
}

impl TrafficSource {
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "human" => Self::Human,
            "bot" => Self::Bot,
            "ai" => Self::Ai,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Bot => "bot",
            Self::Ai => "ai",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrafficSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified connection that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
    /// Lowercase
    pub protocol: String,
    /// Lowercase
    pub service: String,
    #[serde(rename = "duration")]
    pub duration_seconds: f64,
    pub src_bytes: u64,
    pub dst_bytes: u64,
    pub classification: Classification,
    pub traffic_source: TrafficSource,
    /// Always within [0, 1]
    pub traffic_source_confidence: f64,
}

impl ConnectionEvent {
    /// `src_ip:src_port -> dst_ip:dst_port`
    pub fn endpoints(&self) -> String {
        format!(
            "{}:{} -> {}:{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port
        )
    }

    pub fn total_bytes(&self) -> u64 {
        self.src_bytes.saturating_add(self.dst_bytes)
    }
}
