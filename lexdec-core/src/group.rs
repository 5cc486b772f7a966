use crate::trial::TrialDefinition;

/// How a group's trials are ordered when the session is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupOrder {
    /// Declaration order, identical on every run.
    #[default]
    Fixed,
    /// A uniform random permutation, drawn independently per run.
    Randomized,
}

impl GroupOrder {
    pub fn is_randomized(&self) -> bool {
        matches!(self, GroupOrder::Randomized)
    }
}

/// A named, ordered set of trial definitions ("welcome", "test", ...).
#[derive(Debug, Clone, PartialEq)]
pub struct TrialGroup {
    name: String,
    trials: Vec<TrialDefinition>,
}

impl TrialGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            trials: Vec::new(),
        }
    }

    pub fn with_trial(mut self, trial: TrialDefinition) -> Self {
        self.trials.push(trial);
        self
    }

    pub fn push(&mut self, trial: TrialDefinition) {
        self.trials.push(trial);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trials(&self) -> &[TrialDefinition] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

impl Extend<TrialDefinition> for TrialGroup {
    fn extend<I: IntoIterator<Item = TrialDefinition>>(&mut self, iter: I) {
        self.trials.extend(iter);
    }
}
