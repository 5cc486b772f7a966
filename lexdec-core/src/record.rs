use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::stimulus::KeyId;

/// A resolved key press together with the listener's activation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub key: KeyId,
    pub activated_ns: u64,
    pub resolved_ns: u64,
}

impl InputEvent {
    pub fn latency(&self) -> Duration {
        Duration::from_nanos(self.latency_ns())
    }

    pub fn latency_ns(&self) -> u64 {
        self.resolved_ns.saturating_sub(self.activated_ns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedValue {
    pub key: String,
    pub value: String,
}

/// A timed response captured by an input step with latency logging enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub input: String,
    pub key: String,
    pub latency_ns: u64,
}

impl ResponseEntry {
    pub fn latency_ms(&self) -> f64 {
        self.latency_ns as f64 / 1_000_000.0
    }
}

/// A timestamped display or timer transition, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEvent {
    Shown { element: String, at_ns: u64 },
    Hidden { element: String, at_ns: u64 },
    TimerStarted { at_ns: u64, duration_ns: u64 },
    /// `overshoot_ns` is how late the timer was released.
    TimerFired { at_ns: u64, overshoot_ns: u64 },
}

/// Sealed output of one completed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub group: String,
    /// Index in execution order within the session.
    pub position: usize,
    pub label: String,
    pub started_ns: u64,
    pub finished_ns: u64,
    pub values: Vec<LoggedValue>,
    pub responses: Vec<ResponseEntry>,
    pub events: Vec<TimelineEvent>,
}

impl TrialRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.key == key)
            .map(|v| v.value.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.key.as_str())
    }

    pub fn response(&self, input: &str) -> Option<&ResponseEntry> {
        self.responses.iter().find(|r| r.input == input)
    }

    /// Time from the first show of `element` to its hide.
    pub fn shown_for(&self, element: &str) -> Option<Duration> {
        let shown = self.events.iter().find_map(|e| match e {
            TimelineEvent::Shown { element: id, at_ns } if id == element => Some(*at_ns),
            _ => None,
        })?;
        let hidden = self.events.iter().find_map(|e| match e {
            TimelineEvent::Hidden { element: id, at_ns } if id == element && *at_ns >= shown => {
                Some(*at_ns)
            }
            _ => None,
        })?;
        Some(Duration::from_nanos(hidden - shown))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.finished_ns.saturating_sub(self.started_ns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(events: Vec<TimelineEvent>) -> TrialRecord {
        TrialRecord {
            group: "test".into(),
            position: 0,
            label: "test-0".into(),
            started_ns: 0,
            finished_ns: 0,
            values: Vec::new(),
            responses: Vec::new(),
            events,
        }
    }

    #[test]
    fn shown_for_spans_show_to_hide() {
        let record = record(vec![
            TimelineEvent::Shown { element: "prime".into(), at_ns: 10 },
            TimelineEvent::TimerStarted { at_ns: 10, duration_ns: 42_000_000 },
            TimelineEvent::TimerFired { at_ns: 42_000_110, overshoot_ns: 100 },
            TimelineEvent::Hidden { element: "prime".into(), at_ns: 42_000_110 },
        ]);
        assert_eq!(record.shown_for("prime"), Some(Duration::from_nanos(42_000_100)));
        assert_eq!(record.shown_for("target"), None);
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let event = TimelineEvent::TimerFired { at_ns: 5, overshoot_ns: 1 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"timer_fired","at_ns":5,"overshoot_ns":1}"#);
    }
}
