use std::path::PathBuf;

use lexdec_core::{ConfigError, KeyId, KeySet};
use serde::{Deserialize, Serialize};

/// Timing, keys and output settings for the lexical-decision session.
///
/// Every field has a default, so a JSON file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Forward mask duration.
    pub mask_ms: u64,
    pub prime_ms: u64,
    pub backward_mask_ms: u64,
    pub mask_pattern: String,
    pub practice_prime: String,
    pub practice_target: String,
    /// Pressed when the target is a word.
    pub word_key: String,
    /// Pressed when the target is not a word.
    pub nonword_key: String,
    /// Leaves the instruction screens.
    pub advance_key: String,
    /// Activates the button on the final screen.
    pub confirm_key: String,
    pub send_attempts: usize,
    pub results_path: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            mask_ms: 500,
            prime_ms: 42,
            backward_mask_ms: 100,
            mask_pattern: "#######".to_owned(),
            practice_prime: "flower".to_owned(),
            practice_target: "FLOWER".to_owned(),
            word_key: "J".to_owned(),
            nonword_key: "F".to_owned(),
            advance_key: "SPACE".to_owned(),
            confirm_key: "ENTER".to_owned(),
            send_attempts: 3,
            results_path: PathBuf::from("experiment_results.json"),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn word_key(&self) -> Result<KeyId, ConfigError> {
        parse_key(&self.word_key)
    }

    pub fn nonword_key(&self) -> Result<KeyId, ConfigError> {
        parse_key(&self.nonword_key)
    }

    /// The two decision keys, non-word key first.
    pub fn response_keys(&self) -> Result<KeySet, ConfigError> {
        Ok(KeySet::new([self.nonword_key()?, self.word_key()?]))
    }

    pub fn advance_keys(&self) -> Result<KeySet, ConfigError> {
        Ok(KeySet::new([parse_key(&self.advance_key)?]))
    }

    pub fn confirm_keys(&self) -> Result<KeySet, ConfigError> {
        Ok(KeySet::new([parse_key(&self.confirm_key)?]))
    }
}

/// Keys with a multi-letter name that an input source can report.
const NAMED_KEYS: [&str; 2] = ["SPACE", "ENTER"];

/// Accepts a single character or one of [`NAMED_KEYS`], in any case.
fn parse_key(name: &str) -> Result<KeyId, ConfigError> {
    let key = KeyId::new(name);
    let single = key.as_str().chars().count() == 1;
    if single || NAMED_KEYS.contains(&key.as_str()) {
        Ok(key)
    } else {
        Err(ConfigError::InvalidKey(name.to_owned()))
    }
}
