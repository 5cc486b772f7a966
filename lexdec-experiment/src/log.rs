use lexdec_core::TrialRecord;
use serde::Serialize;

/// Append-only store of completed trial records, in execution order.
#[derive(Debug, Default)]
pub struct ResultLog {
    records: Vec<TrialRecord>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    /// An owned snapshot of every record so far. Callers can serialize,
    /// transmit or drop it without affecting the log.
    pub fn export_all(&self) -> Vec<TrialRecord> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reaction-time summary for one named input across a set of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub responses: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    /// Returns `None` when no record carries a response for `input`.
    pub fn of(records: &[TrialRecord], input: &str) -> Option<Self> {
        let times: Vec<f64> = records
            .iter()
            .filter_map(|r| r.response(input))
            .map(|r| r.latency_ms())
            .collect();
        if times.is_empty() {
            return None;
        }
        Some(Self {
            responses: times.len(),
            mean_ms: times.iter().sum::<f64>() / times.len() as f64,
            min_ms: times.iter().copied().fold(f64::INFINITY, f64::min),
            max_ms: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}
