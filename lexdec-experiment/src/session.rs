use lexdec_core::TrialRecord;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::log::ResultLog;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 6;

/// What the result transport receives: the participant and their records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExport {
    pub participant_id: String,
    pub records: Vec<TrialRecord>,
}

/// One participant's run. Holds the participant id, fixed at start, and the
/// result log.
#[derive(Debug)]
pub struct Session {
    participant_id: String,
    log: ResultLog,
}

impl Session {
    pub fn start<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_participant_id(&participant_id(rng))
    }

    pub fn with_participant_id(id: &str) -> Self {
        info!(participant = id, "session started");
        Self {
            participant_id: id.to_owned(),
            log: ResultLog::new(),
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn record(&mut self, record: TrialRecord) {
        self.log.append(record);
    }

    pub fn trial_count(&self) -> usize {
        self.log.len()
    }

    pub fn export(&self) -> SessionExport {
        SessionExport {
            participant_id: self.participant_id.clone(),
            records: self.log.export_all(),
        }
    }

    /// Ends the session and hands back its final export.
    pub fn finish(self) -> SessionExport {
        info!(
            participant = %self.participant_id,
            trials = self.log.len(),
            "session finished"
        );
        self.export()
    }
}

/// Six random lower-case base-36 characters.
pub fn participant_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
