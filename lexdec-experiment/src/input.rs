use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use lexdec_core::{InputEvent, KeyId, KeySet};
use lexdec_timing::{ManualTimer, Timer};
use tracing::trace;

use crate::error::ExperimentError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSignal {
    Key { key: KeyId, at_ns: u64 },
    /// The participant or operator ended the session.
    Terminate,
}

/// A blocking source of key presses, timestamped on the session clock.
pub trait InputSource {
    fn next_signal(&mut self) -> io::Result<InputSignal>;

    /// Drops presses buffered before the current listener was activated.
    fn discard_pending(&mut self) -> io::Result<()>;
}

impl<I: InputSource + ?Sized> InputSource for &mut I {
    fn next_signal(&mut self) -> io::Result<InputSignal> {
        (**self).next_signal()
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        (**self).discard_pending()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputListener {
    name: String,
    keys: KeySet,
    log_latency: bool,
    activated_ns: u64,
}

impl InputListener {
    pub fn activate(name: &str, keys: KeySet, log_latency: bool, now_ns: u64) -> Self {
        trace!(input = name, keys = %keys, at_ns = now_ns, "listener activated");
        Self {
            name: name.to_owned(),
            keys,
            log_latency,
            activated_ns: now_ns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn logs_latency(&self) -> bool {
        self.log_latency
    }

    pub fn activated_ns(&self) -> u64 {
        self.activated_ns
    }

    /// Returns the resolved event if `key` is allowed and was pressed after
    /// activation, `None` otherwise.
    pub fn offer(&self, key: &KeyId, at_ns: u64) -> Option<InputEvent> {
        if at_ns < self.activated_ns {
            trace!(input = %self.name, key = %key, "ignoring press from before activation");
            return None;
        }
        if !self.keys.contains(key) {
            trace!(input = %self.name, key = %key, "ignoring key outside allowed set");
            return None;
        }
        Some(InputEvent {
            key: key.clone(),
            activated_ns: self.activated_ns,
            resolved_ns: at_ns,
        })
    }
}

/// Blocks on `source` until `listener` resolves. `Ok(None)` means the session
/// was terminated first.
pub fn await_input<I: InputSource + ?Sized>(
    listener: &InputListener,
    source: &mut I,
) -> Result<Option<InputEvent>, ExperimentError> {
    source.discard_pending().map_err(ExperimentError::Input)?;
    loop {
        match source.next_signal().map_err(ExperimentError::Input)? {
            InputSignal::Key { key, at_ns } => {
                if let Some(event) = listener.offer(&key, at_ns) {
                    return Ok(Some(event));
                }
            }
            InputSignal::Terminate => return Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
enum ScriptedSignal {
    Key { after: Duration, key: KeyId },
    Terminate,
}

/// Replays a fixed sequence of presses against a [`ManualTimer`].
///
/// Each press advances the shared clock by its delay before it is reported,
/// so delays are relative to the previous press (or to the moment the
/// timeline started waiting). An exhausted script reports `Terminate`.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    timer: ManualTimer,
    script: VecDeque<ScriptedSignal>,
    buffered: VecDeque<KeyId>,
}

impl ScriptedInput {
    pub fn new(timer: ManualTimer) -> Self {
        Self {
            timer,
            script: VecDeque::new(),
            buffered: VecDeque::new(),
        }
    }

    pub fn press(mut self, key: &str, after_ms: u64) -> Self {
        self.script.push_back(ScriptedSignal::Key {
            after: Duration::from_millis(after_ms),
            key: KeyId::new(key),
        });
        self
    }

    pub fn terminate(mut self) -> Self {
        self.script.push_back(ScriptedSignal::Terminate);
        self
    }

    /// A press already waiting in the source's buffer, as if typed ahead.
    pub fn buffer(mut self, key: &str) -> Self {
        self.buffered.push_back(KeyId::new(key));
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl InputSource for ScriptedInput {
    fn next_signal(&mut self) -> io::Result<InputSignal> {
        if let Some(key) = self.buffered.pop_front() {
            return Ok(InputSignal::Key {
                key,
                at_ns: self.timer.now(),
            });
        }
        match self.script.pop_front() {
            Some(ScriptedSignal::Key { after, key }) => {
                self.timer.advance(after);
                Ok(InputSignal::Key {
                    key,
                    at_ns: self.timer.now(),
                })
            }
            Some(ScriptedSignal::Terminate) | None => Ok(InputSignal::Terminate),
        }
    }

    fn discard_pending(&mut self) -> io::Result<()> {
        self.buffered.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn listener(keys: &str, now_ns: u64) -> InputListener {
        InputListener::activate("answer", KeySet::from_chars(keys), true, now_ns)
    }

    #[test]
    fn resolves_on_first_allowed_key() {
        let timer = ManualTimer::new();
        timer.set(1_000);
        let l = listener("FJ", timer.now());
        let mut input = ScriptedInput::new(timer.clone())
            .press("X", 50)
            .press("J", 150)
            .press("F", 10);

        let event = await_input(&l, &mut input).unwrap().unwrap();
        assert_eq!(event.key, KeyId::new("J"));
        assert_eq!(event.activated_ns, 1_000);
        assert_eq!(event.latency(), Duration::from_millis(200));
        assert_eq!(input.remaining(), 1);
    }

    #[test]
    fn presses_before_activation_are_ignored() {
        let l = listener("F", 5_000);
        assert_eq!(l.offer(&KeyId::new("F"), 4_999), None);
        assert!(l.offer(&KeyId::new("F"), 5_000).is_some());
    }

    #[test]
    fn buffered_presses_are_discarded_on_activation() {
        let timer = ManualTimer::new();
        let l = listener("J", timer.now());
        let mut input = ScriptedInput::new(timer.clone())
            .buffer("J")
            .press("J", 300);

        let event = await_input(&l, &mut input).unwrap().unwrap();
        assert_eq!(event.latency_ns(), 300_000_000);
    }

    #[test]
    fn termination_resolves_to_none() {
        let timer = ManualTimer::new();
        let l = listener("FJ", 0);
        let mut input = ScriptedInput::new(timer).press("Q", 10).terminate();
        assert_eq!(await_input(&l, &mut input).unwrap(), None);
    }

    fn non_matching_key() -> impl Strategy<Value = String> {
        "[A-EG-IK-Z0-9]"
    }

    proptest! {
        #[test]
        fn never_resolves_outside_allowed_keys(
            noise in prop::collection::vec((non_matching_key(), 0u64..500), 0..20),
            last_delay in 0u64..2_000,
            word in prop::bool::ANY,
        ) {
            let timer = ManualTimer::new();
            let l = listener("FJ", timer.now());
            let mut input = ScriptedInput::new(timer.clone());
            let mut expected_ms = 0;
            for (key, delay) in &noise {
                input = input.press(key, *delay);
                expected_ms += delay;
            }
            let answer = if word { "J" } else { "F" };
            input = input.press(answer, last_delay);
            expected_ms += last_delay;

            let event = await_input(&l, &mut input).unwrap().unwrap();
            prop_assert_eq!(&event.key, &KeyId::new(answer));
            prop_assert_eq!(event.latency(), Duration::from_millis(expected_ms));
            prop_assert_eq!(input.remaining(), 0);
        }
    }
}
