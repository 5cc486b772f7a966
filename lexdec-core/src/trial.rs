use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stimulus::{Element, ElementId, KeySet};

/// Where a logged value or element content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Literal(String),
    /// A named field of the trial's stimulus row.
    Field(String),
}

impl ValueSource {
    pub fn literal(value: &str) -> Self {
        Self::Literal(value.to_owned())
    }

    pub fn field(name: &str) -> Self {
        Self::Field(name.to_owned())
    }
}

impl From<&str> for ValueSource {
    fn from(value: &str) -> Self {
        Self::literal(value)
    }
}

impl From<String> for ValueSource {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

/// One row of the stimulus table: named string fields such as `prime`,
/// `target`, `condition`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusRow(BTreeMap<String, String>);

impl StimulusRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.0.insert(field.to_owned(), value.to_owned());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StimulusRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A single timeline instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    ShowElement(Element),
    StartTimer(Duration),
    /// Suspends until one of `keys` is pressed. `name` labels the response
    /// entry written when `log_latency` is set.
    AwaitInput {
        name: String,
        keys: KeySet,
        log_latency: bool,
    },
    RemoveElement(ElementId),
    LogValue { key: String, value: ValueSource },
}

/// An immutable, validated list of steps for one trial.
///
/// Only [`TrialBuilder::build`] creates these, so every definition has passed
/// the element, key and field checks.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialDefinition {
    label: String,
    row: Option<StimulusRow>,
    steps: Vec<Step>,
}

impl TrialDefinition {
    pub fn builder(label: &str) -> TrialBuilder {
        TrialBuilder {
            label: label.to_owned(),
            row: None,
            steps: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Keys written by the `LogValue` steps, in step order.
    pub fn log_keys(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::LogValue { key, .. } => Some(key.as_str()),
            _ => None,
        })
    }

    pub fn resolve<'a>(&'a self, source: &'a ValueSource) -> Result<&'a str, ConfigError> {
        match source {
            ValueSource::Literal(value) => Ok(value.as_str()),
            ValueSource::Field(field) => self
                .row
                .as_ref()
                .and_then(|row| row.get(field))
                .ok_or_else(|| ConfigError::MissingField {
                    trial: self.label.clone(),
                    field: field.clone(),
                }),
        }
    }
}

/// Composes a [`TrialDefinition`] step by step.
#[derive(Debug, Clone)]
pub struct TrialBuilder {
    label: String,
    row: Option<StimulusRow>,
    steps: Vec<Step>,
}

impl TrialBuilder {
    pub fn row(mut self, row: StimulusRow) -> Self {
        self.row = Some(row);
        self
    }

    pub fn show(mut self, element: Element) -> Self {
        self.steps.push(Step::ShowElement(element));
        self
    }

    pub fn show_text(self, id: &str, content: impl Into<ValueSource>) -> Self {
        self.show(Element::text(id, content))
    }

    pub fn show_mask(self, id: &str, pattern: &str) -> Self {
        self.show(Element::mask(id, pattern))
    }

    pub fn show_button(self, id: &str, label: &str) -> Self {
        self.show(Element::button(id, label))
    }

    pub fn timer(mut self, duration_ms: u64) -> Self {
        self.steps
            .push(Step::StartTimer(Duration::from_millis(duration_ms)));
        self
    }

    /// Shows `element` for exactly `duration_ms`, then removes it.
    pub fn flash(self, element: Element, duration_ms: u64) -> Self {
        let id = element.id.clone();
        self.show(element).timer(duration_ms).remove(id.as_str())
    }

    pub fn await_input(mut self, name: &str, keys: KeySet, log_latency: bool) -> Self {
        self.steps.push(Step::AwaitInput {
            name: name.to_owned(),
            keys,
            log_latency,
        });
        self
    }

    pub fn remove(mut self, id: &str) -> Self {
        self.steps.push(Step::RemoveElement(ElementId::new(id)));
        self
    }

    pub fn log(mut self, key: &str, value: impl Into<ValueSource>) -> Self {
        self.steps.push(Step::LogValue {
            key: key.to_owned(),
            value: value.into(),
        });
        self
    }

    pub fn build(self) -> Result<TrialDefinition, ConfigError> {
        let definition = TrialDefinition {
            label: self.label,
            row: self.row,
            steps: self.steps,
        };
        validate(&definition)?;
        Ok(definition)
    }
}

/// Walks the steps tracking which elements are on screen.
fn validate(definition: &TrialDefinition) -> Result<(), ConfigError> {
    let trial = definition.label();
    let mut shown: Vec<&ElementId> = Vec::new();
    let mut log_keys: Vec<&str> = Vec::new();

    for (index, step) in definition.steps().iter().enumerate() {
        match step {
            Step::ShowElement(element) => {
                if shown.contains(&&element.id) {
                    return Err(ConfigError::ElementAlreadyShown {
                        trial: trial.to_owned(),
                        step: index,
                        element: element.id.to_string(),
                    });
                }
                definition.resolve(&element.content)?;
                shown.push(&element.id);
            }
            Step::RemoveElement(id) => match shown.iter().position(|s| *s == id) {
                Some(pos) => {
                    shown.remove(pos);
                }
                None => {
                    return Err(ConfigError::ElementNotShown {
                        trial: trial.to_owned(),
                        step: index,
                        element: id.to_string(),
                    });
                }
            },
            Step::AwaitInput { name, keys, .. } => {
                if keys.is_empty() {
                    return Err(ConfigError::EmptyKeySet {
                        trial: trial.to_owned(),
                        step: index,
                        input: name.clone(),
                    });
                }
            }
            Step::LogValue { key, value } => {
                if log_keys.contains(&key.as_str()) {
                    return Err(ConfigError::DuplicateLogKey {
                        trial: trial.to_owned(),
                        key: key.clone(),
                    });
                }
                definition.resolve(value)?;
                log_keys.push(key);
            }
            Step::StartTimer(_) => {}
        }
    }
    Ok(())
}
