pub mod error;
pub mod group;
pub mod record;
pub mod stimulus;
pub mod trial;

pub use error::ConfigError;
pub use group::{GroupOrder, TrialGroup};
pub use record::{InputEvent, LoggedValue, ResponseEntry, TimelineEvent, TrialRecord};
pub use stimulus::{Element, ElementId, ElementKind, KeyId, KeySet};
pub use trial::{Step, StimulusRow, TrialBuilder, TrialDefinition, ValueSource};
