pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod log;
pub mod script;
pub mod sequencer;
pub mod session;
pub mod timeline;
pub mod transport;

pub use config::ExperimentConfig;
pub use display::{DisplayEvent, RecordingDisplay, StimulusDisplay};
pub use error::{ExperimentError, TransportError};
pub use input::{InputListener, InputSignal, InputSource, ScriptedInput, await_input};
pub use log::{LatencySummary, ResultLog};
pub use sequencer::{PlannedItem, SequenceEntry, SessionSummary, TrialSequencer};
pub use session::{Session, SessionExport};
pub use timeline::{Rig, ScheduledTrial, TimelineStatus, TrialTimeline, run, run_trial};
pub use transport::{MemoryTransport, ResultTransport, send_with_retry};
