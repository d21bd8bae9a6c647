//! Boundary validation for classifier records
//!
//! Converts a loosely typed JSON record into a [`ConnectionEvent`]. Structural
//! fields (endpoints, sizes, timing) are required and must have the right
//! shape; classifier verdict fields are advisory and get coerced to a safe
//! value instead of rejecting the record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ValidationError;
use crate::event::{Classification, ConnectionEvent, TrafficSource};

/// Confidence used when the classifier sends nothing usable
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Epoch values at or above this are treated as milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Naive timestamp layouts accepted after RFC 3339 fails (interpreted as UTC)
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Non-finite literals some producers emit that are not valid JSON
const NON_FINITE_LITERALS: &[&str] = &["-Infinity", "Infinity", "NaN"];

/// Record validator with a shared dropped-record counter.
///
/// Cloning shares the counter.
#[derive(Debug, Clone)]
pub struct Validator {
    default_confidence: f64,
    dropped: Arc<AtomicU64>,
}

impl Validator {
    /// `default_confidence` outside [0, 1] falls back to [`DEFAULT_CONFIDENCE`].
    pub fn new(default_confidence: f64) -> Self {
        let default_confidence = if is_unit_interval(default_confidence) {
            default_confidence
        } else {
            DEFAULT_CONFIDENCE
        };
        Self {
            default_confidence,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn default_confidence(&self) -> f64 {
        self.default_confidence
    }

    /// Number of records rejected so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Handle to the dropped-record counter for health reporting
    pub fn dropped_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Validate an already decoded record.
    pub fn validate(&self, raw: &Value) -> Result<ConnectionEvent, ValidationError> {
        normalize(raw, self.default_confidence).inspect_err(|_| self.record_drop())
    }

    /// Decode and validate one wire frame.
    ///
    /// Bare `NaN`/`Infinity` tokens are read as `null` so that a single
    /// non-finite confidence does not cost the whole record.
    pub fn validate_text(&self, text: &str) -> Result<ConnectionEvent, ValidationError> {
        let raw = match serde_json::from_str::<Value>(text) {
            Ok(raw) => raw,
            Err(e) => match replace_non_finite_literals(text)
                .and_then(|clean| serde_json::from_str::<Value>(&clean).ok())
            {
                Some(raw) => raw,
                None => {
                    self.record_drop();
                    return Err(ValidationError::InvalidJson(e.to_string()));
                }
            },
        };
        self.validate(&raw)
    }

    /// Validate an undecoded frame payload. Invalid UTF-8 is a malformed
    /// record; it is never repaired.
    pub fn validate_slice(&self, payload: &[u8]) -> Result<ConnectionEvent, ValidationError> {
        match std::str::from_utf8(payload) {
            Ok(text) => self.validate_text(text),
            Err(e) => {
                self.record_drop();
                Err(ValidationError::InvalidJson(e.to_string()))
            }
        }
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE)
    }
}

/// Pure conversion from a raw record. Does not touch any counter.
pub fn normalize(raw: &Value, default_confidence: f64) -> Result<ConnectionEvent, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    Ok(ConnectionEvent {
        id: id_field(obj)?,
        timestamp: timestamp_field(obj)?,
        src_ip: text_field(obj, "src_ip")?,
        src_port: port_field(obj, "src_port")?,
        dst_ip: text_field(obj, "dst_ip")?,
        dst_port: port_field(obj, "dst_port")?,
        protocol: text_field(obj, "protocol")?.to_ascii_lowercase(),
        service: text_field(obj, "service")?.to_ascii_lowercase(),
        duration_seconds: duration_field(obj)?,
        src_bytes: count_field(obj, "src_bytes")?,
        dst_bytes: count_field(obj, "dst_bytes")?,
        classification: present(obj, "classification")
            .and_then(Value::as_str)
            .map(Classification::from_wire)
            .unwrap_or(Classification::Anomaly),
        traffic_source: present(obj, "traffic_source")
            .and_then(Value::as_str)
            .map(TrafficSource::from_wire)
            .unwrap_or(TrafficSource::Unknown),
        traffic_source_confidence: present(obj, "traffic_source_confidence")
            .and_then(as_number)
            .filter(|c| is_unit_interval(*c))
            .unwrap_or(default_confidence),
    })
}

fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Field lookup where JSON `null` counts as absent
fn present<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    present(obj, field).ok_or(ValidationError::MissingField(field))
}

/// Numbers and numeric strings. `"NaN"` parses to NaN.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn id_field(obj: &Map<String, Value>) -> Result<String, ValidationError> {
    match required(obj, "id")? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ValidationError::invalid("id", format!("unexpected value {}", other))),
    }
}

fn text_field(obj: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match required(obj, field)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::String(_) => Err(ValidationError::invalid(field, "empty string")),
        other => Err(ValidationError::invalid(field, format!("expected string, got {}", other))),
    }
}

/// Non-negative integer. Integral floats such as `512.0` are accepted.
fn unsigned_field(obj: &Map<String, Value>, field: &'static str) -> Result<u64, ValidationError> {
    let value = required(obj, field)?;
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    if let Value::String(s) = value {
        return s
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::invalid(field, format!("not an unsigned integer: {:?}", s)));
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
            Ok(f as u64)
        }
        _ => Err(ValidationError::invalid(
            field,
            format!("not an unsigned integer: {}", value),
        )),
    }
}

fn port_field(obj: &Map<String, Value>, field: &'static str) -> Result<u16, ValidationError> {
    let port = unsigned_field(obj, field)?;
    u16::try_from(port).map_err(|_| ValidationError::invalid(field, format!("out of range: {}", port)))
}

fn count_field(obj: &Map<String, Value>, field: &'static str) -> Result<u64, ValidationError> {
    unsigned_field(obj, field)
}

fn duration_field(obj: &Map<String, Value>) -> Result<f64, ValidationError> {
    let value = required(obj, "duration")?;
    match as_number(value) {
        Some(d) if d.is_finite() && d >= 0.0 => Ok(d),
        Some(d) => Err(ValidationError::invalid("duration", format!("must be non-negative, got {}", d))),
        None => Err(ValidationError::invalid("duration", format!("not a number: {}", value))),
    }
}

fn timestamp_field(obj: &Map<String, Value>) -> Result<DateTime<Utc>, ValidationError> {
    match required(obj, "timestamp")? {
        Value::String(s) => parse_timestamp_str(s.trim())
            .ok_or_else(|| ValidationError::invalid("timestamp", format!("unrecognised format: {:?}", s))),
        Value::Number(n) => n
            .as_f64()
            .and_then(epoch_to_datetime)
            .ok_or_else(|| ValidationError::invalid("timestamp", format!("bad epoch value: {}", n))),
        other => Err(ValidationError::invalid(
            "timestamp",
            format!("expected string or number, got {}", other),
        )),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(ts) = NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(ts.and_utc());
    }
    s.parse::<f64>().ok().and_then(epoch_to_datetime)
}

fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    if epoch >= EPOCH_MILLIS_THRESHOLD {
        return DateTime::from_timestamp_millis(epoch as i64);
    }
    let secs = epoch.trunc();
    let nanos = ((epoch - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Rewrite bare non-finite literals outside of strings to `null`.
/// Returns `None` when the text contains none.
fn replace_non_finite_literals(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut in_string = false;
    let mut escaped = false;
    let mut changed = false;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(literal) = NON_FINITE_LITERALS.iter().find(|l| rest.starts_with(**l)) {
            out.push_str("null");
            rest = &rest[literal.len()..];
            changed = true;
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }

    changed.then_some(out)
}
