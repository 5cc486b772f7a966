use thiserror::Error;

/// A malformed experiment definition. The session cannot start until it is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A step removes an element that is not on screen at that point.
    #[error("trial `{trial}` step {step}: element `{element}` is not shown")]
    ElementNotShown {
        trial: String,
        step: usize,
        element: String,
    },

    /// A step shows an element whose id is already on screen.
    #[error("trial `{trial}` step {step}: element `{element}` is already shown")]
    ElementAlreadyShown {
        trial: String,
        step: usize,
        element: String,
    },

    /// An input step with nothing to wait for.
    #[error("trial `{trial}` step {step}: input `{input}` has no allowed keys")]
    EmptyKeySet {
        trial: String,
        step: usize,
        input: String,
    },

    /// The same log key is written twice in one trial.
    #[error("trial `{trial}`: log key `{key}` is declared more than once")]
    DuplicateLogKey { trial: String, key: String },

    /// A value source names a row field the trial's row does not carry.
    #[error("trial `{trial}`: stimulus row has no field `{field}`")]
    MissingField { trial: String, field: String },

    #[error("trial group `{0}` is registered twice")]
    DuplicateGroup(String),

    #[error("sequence references unknown trial group `{0}`")]
    UnknownGroup(String),

    #[error("unrecognized key name `{0}`")]
    InvalidKey(String),
}
