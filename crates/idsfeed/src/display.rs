//! Console tail of the live feed

use std::sync::Mutex;

use idsfeed_lib::{ConnectionState, FeedSubscriber};
use idsfeed_schema::ConnectionEvent;

/// One console line per event, e.g.
/// `[08:00:00] ANOMALY  87.3% bot     10.0.0.1:443 -> 10.0.0.2:22 TCP ssh 3.50s 1200↑ 4800↓`
pub fn format_event(event: &ConnectionEvent) -> String {
    format!(
        "[{}] {:<7} {:>5.1}% {:<7} {} {} {} {:.2}s {}↑ {}↓",
        event.timestamp.format("%H:%M:%S"),
        event.classification.as_str().to_ascii_uppercase(),
        event.traffic_source_confidence * 100.0,
        event.traffic_source.as_str(),
        event.endpoints(),
        event.protocol.to_ascii_uppercase(),
        event.service,
        event.duration_seconds,
        event.src_bytes,
        event.dst_bytes,
    )
}

pub fn format_state(state: &ConnectionState) -> String {
    format!("-- feed {} --", state)
}

/// Shown once per connection while the window is still empty
pub const WAITING_LINE: &str = "Waiting for network traffic...";

#[derive(Default)]
struct TailCursor {
    last_state: Option<ConnectionState>,
    last_id: Option<String>,
}

/// Prints state changes and every event not printed before.
///
/// Writes go through a sink so tests can capture them.
pub struct ConsoleTail<W: Fn(String) + Send + Sync + 'static> {
    cursor: Mutex<TailCursor>,
    write: W,
}

impl ConsoleTail<fn(String)> {
    pub fn stdout() -> Self {
        fn print_line(line: String) {
            println!("{}", line);
        }
        Self::with_writer(print_line)
    }
}

impl<W: Fn(String) + Send + Sync + 'static> ConsoleTail<W> {
    pub fn with_writer(write: W) -> Self {
        Self {
            cursor: Mutex::new(TailCursor::default()),
            write,
        }
    }
}

/// Events in `events` (oldest first) that arrived after `last_id`.
/// If `last_id` was evicted everything in the window is new.
fn unseen<'a>(events: &'a [ConnectionEvent], last_id: Option<&str>) -> &'a [ConnectionEvent] {
    match last_id.and_then(|id| events.iter().rposition(|e| e.id == id)) {
        Some(pos) => &events[pos + 1..],
        None => events,
    }
}

impl<W: Fn(String) + Send + Sync + 'static> FeedSubscriber for ConsoleTail<W> {
    fn on_update(&self, state: &ConnectionState, events: &[ConnectionEvent]) {
        let mut cursor = self
            .cursor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if cursor.last_state.as_ref() != Some(state) {
            (self.write)(format_state(state));
            cursor.last_state = Some(state.clone());
            if state.is_connected() && events.is_empty() {
                (self.write)(WAITING_LINE.to_string());
            }
        }

        let fresh = unseen(events, cursor.last_id.as_deref());
        for event in fresh {
            (self.write)(format_event(event));
        }
        if let Some(last) = fresh.last() {
            cursor.last_id = Some(last.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use idsfeed_schema::{Classification, TrafficSource};
    use std::sync::Arc;

    fn event(id: &str) -> ConnectionEvent {
        ConnectionEvent {
            id: id.to_string(),
            timestamp: DateTime::from_timestamp(3_723, 0).unwrap(),
            src_ip: "10.0.0.1".to_string(),
            src_port: 443,
            dst_ip: "10.0.0.2".to_string(),
            dst_port: 22,
            protocol: "tcp".to_string(),
            service: "ssh".to_string(),
            duration_seconds: 3.5,
            src_bytes: 1200,
            dst_bytes: 4800,
            classification: Classification::Anomaly,
            traffic_source: TrafficSource::Bot,
            traffic_source_confidence: 0.873,
        }
    }

    fn capture() -> (ConsoleTail<impl Fn(String) + Send + Sync + 'static>, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let tail = ConsoleTail::with_writer(move |line| sink.lock().unwrap().push(line));
        (tail, lines)
    }

    #[test]
    fn test_format_event() {
        assert_eq!(
            format_event(&event("a")),
            "[01:02:03] ANOMALY  87.3% bot     10.0.0.1:443 -> 10.0.0.2:22 TCP ssh 3.50s 1200↑ 4800↓"
        );
    }

    #[test]
    fn test_format_state() {
        assert_eq!(format_state(&ConnectionState::Connected), "-- feed connected --");
    }

    #[test]
    fn test_unseen() {
        let events = vec![event("a"), event("b"), event("c")];
        assert_eq!(unseen(&events, None).len(), 3);
        assert_eq!(unseen(&events, Some("b")).len(), 1);
        assert!(unseen(&events, Some("c")).is_empty());
        assert_eq!(unseen(&events, Some("gone")).len(), 3);
    }

    #[test]
    fn test_tail_prints_only_new_events_and_state_changes() {
        let (tail, lines) = capture();

        tail.on_update(&ConnectionState::Connecting, &[]);
        tail.on_update(&ConnectionState::Connected, &[]);
        tail.on_update(&ConnectionState::Connected, &[event("a")]);
        tail.on_update(&ConnectionState::Connected, &[event("a"), event("b")]);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "-- feed connecting --");
        assert_eq!(lines[1], "-- feed connected --");
        assert_eq!(lines[2], WAITING_LINE);
        assert!(lines[3].contains("ANOMALY"));
        assert!(lines[4].contains("10.0.0.1:443 -> 10.0.0.2:22"));
    }

    #[test]
    fn test_waiting_line_only_for_empty_window() {
        let (tail, lines) = capture();

        tail.on_update(&ConnectionState::Connected, &[]);
        tail.on_update(&ConnectionState::Connected, &[]);
        tail.on_update(&ConnectionState::Disconnected, &[]);
        tail.on_update(&ConnectionState::Connected, &[event("a")]);

        let lines = lines.lock().unwrap();
        let waiting = lines.iter().filter(|l| l.as_str() == WAITING_LINE).count();
        assert_eq!(waiting, 1);
        assert_eq!(lines[1], WAITING_LINE);
        assert_eq!(lines.len(), 5);
    }
}
