use lexdec_core::{ConfigError, Element, StimulusRow, TrialDefinition, TrialGroup, ValueSource};

use crate::config::ExperimentConfig;
use crate::sequencer::{SequenceEntry, TrialSequencer};

pub const WELCOME: &str = "welcome";
pub const PRACTICE: &str = "practice";
pub const TEST: &str = "test";
pub const FINAL: &str = "final";

/// Name of the input whose latency is logged on test trials.
pub const ANSWER_INPUT: &str = "answerTarget";

/// Row fields copied into every test record, as (log key, row field).
pub const LOGGED_FIELDS: [(&str, &str); 6] = [
    ("Group", "group"),
    ("Condition", "condition"),
    ("Expected", "expected"),
    ("PrimeType", "primetype"),
    ("PrimeWord", "prime"),
    ("TargetWord", "target"),
];

/// welcome, practice, the test trials in random order, result submission, final.
pub fn build_sequencer(
    config: &ExperimentConfig,
    stimuli: &[StimulusRow],
) -> Result<TrialSequencer, ConfigError> {
    let mut test = TrialGroup::new(TEST);
    for (index, row) in stimuli.iter().enumerate() {
        test.push(test_trial(config, index, row)?);
    }

    Ok(TrialSequencer::new()
        .with_group(TrialGroup::new(WELCOME).with_trial(welcome(config)?))?
        .with_group(TrialGroup::new(PRACTICE).with_trial(practice(config)?))?
        .with_group(test)?
        .with_group(TrialGroup::new(FINAL).with_trial(final_screen(config)?))?
        .then(SequenceEntry::fixed(WELCOME))
        .then(SequenceEntry::fixed(PRACTICE))
        .then(SequenceEntry::randomized(TEST))
        .then(SequenceEntry::SendResults)
        .then(SequenceEntry::fixed(FINAL))
        .with_send_attempts(config.send_attempts))
}

pub fn welcome(config: &ExperimentConfig) -> Result<TrialDefinition, ConfigError> {
    let lines = [
        "Welcome!".to_owned(),
        "In this experiment you are asked to decide whether the letter strings \
         (appearing at the center of the screen) form real English words."
            .to_owned(),
        format!(
            "To do this, press {} if what you see is a word, or {} if it is not a word.",
            config.word_key()?,
            config.nonword_key()?
        ),
        "You should do this as quickly and accurately as possible.".to_owned(),
        format!(
            "When you are ready, press {} to do a practice run.",
            config.advance_key.to_uppercase()
        ),
    ];

    let mut builder = TrialDefinition::builder(WELCOME);
    for (i, line) in lines.iter().enumerate() {
        builder = builder.show_text(&format!("line{i}"), line.as_str());
    }
    builder = builder.await_input("start", config.advance_keys()?, false);
    for i in 0..lines.len() {
        builder = builder.remove(&format!("line{i}"));
    }
    builder.build()
}

pub fn practice(config: &ExperimentConfig) -> Result<TrialDefinition, ConfigError> {
    TrialDefinition::builder(PRACTICE)
        .show_text("label", "practice")
        .flash(Element::mask("mask", &config.mask_pattern), config.mask_ms)
        .flash(
            Element::text("prime", config.practice_prime.as_str()),
            config.prime_ms,
        )
        .show_text("target", config.practice_target.as_str())
        .await_input(ANSWER_INPUT, config.response_keys()?, false)
        .remove("target")
        .show_text(
            "continue",
            format!(
                "Press {} to start the main experiment",
                config.advance_key.to_uppercase()
            ),
        )
        .await_input("continue", config.advance_keys()?, false)
        .remove("continue")
        .remove("label")
        .build()
}

pub fn test_trial(
    config: &ExperimentConfig,
    index: usize,
    row: &StimulusRow,
) -> Result<TrialDefinition, ConfigError> {
    let mut builder = TrialDefinition::builder(&format!("{TEST}-{index}"))
        .row(row.clone())
        .flash(Element::mask("mask1", &config.mask_pattern), config.mask_ms)
        .flash(
            Element::text("prime", ValueSource::field("prime")),
            config.prime_ms,
        )
        .flash(
            Element::mask("mask2", &config.mask_pattern),
            config.backward_mask_ms,
        )
        .show_text("target", ValueSource::field("target"))
        .await_input(ANSWER_INPUT, config.response_keys()?, true)
        .remove("target");
    for (key, field) in LOGGED_FIELDS {
        builder = builder.log(key, ValueSource::field(field));
    }
    builder.build()
}

pub fn final_screen(config: &ExperimentConfig) -> Result<TrialDefinition, ConfigError> {
    TrialDefinition::builder(FINAL)
        .show_text("thanks", "The experiment is over. Thank you for participating!")
        .show_text("close-hint", "You can now close this window.")
        .show_button(
            "close",
            &format!("Close ({})", config.confirm_key.to_uppercase()),
        )
        .await_input("close", config.confirm_keys()?, false)
        .build()
}
