use std::time::Duration;

use lexdec_core::{
    ConfigError, ElementId, InputEvent, KeyId, LoggedValue, ResponseEntry, Step, TimelineEvent,
    TrialDefinition, TrialRecord,
};
use lexdec_timing::{Timer, sleep_until};
use tracing::{debug, info, warn};

use crate::display::StimulusDisplay;
use crate::error::ExperimentError;
use crate::input::{InputListener, InputSource, await_input};

/// The devices one session runs on: a clock, a key press source and a screen.
#[derive(Debug)]
pub struct Rig<T, I, D> {
    pub timer: T,
    pub input: I,
    pub display: D,
}

impl<T, I, D> Rig<T, I, D> {
    pub fn new(timer: T, input: I, display: D) -> Self {
        Self {
            timer,
            input,
            display,
        }
    }
}

/// A trial definition placed in the session's execution order.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledTrial<'a> {
    pub group: &'a str,
    pub position: usize,
    pub definition: &'a TrialDefinition,
}

impl<'a> ScheduledTrial<'a> {
    /// A trial run on its own, outside any sequence.
    pub fn standalone(definition: &'a TrialDefinition) -> Self {
        Self {
            group: definition.label(),
            position: 0,
            definition,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimelineStatus {
    /// Waiting on a timer; nothing happens before `deadline_ns`.
    Sleeping { deadline_ns: u64 },
    AwaitingInput,
    Complete(TrialRecord),
}

#[derive(Debug, Clone)]
struct TimerInstance {
    started_ns: u64,
    deadline_ns: u64,
}

#[derive(Debug, Clone)]
enum Pending {
    Timer(TimerInstance),
    Input(InputListener),
}

/// Executes one trial's steps strictly in order.
///
/// `poll` runs every synchronous step it can and stops at the first timer
/// that has not elapsed or input listener that has not resolved. Event-loop
/// drivers poll once per tick and feed presses through `offer_input`;
/// [`run_trial`] is the blocking driver.
#[derive(Debug)]
pub struct TrialTimeline<'a> {
    trial: ScheduledTrial<'a>,
    cursor: usize,
    shown: Vec<ElementId>,
    pending: Option<Pending>,
    values: Vec<LoggedValue>,
    responses: Vec<ResponseEntry>,
    events: Vec<TimelineEvent>,
    started_ns: Option<u64>,
    finished: bool,
}

impl<'a> TrialTimeline<'a> {
    pub fn new(trial: ScheduledTrial<'a>) -> Self {
        Self {
            trial,
            cursor: 0,
            shown: Vec::new(),
            pending: None,
            values: Vec::new(),
            responses: Vec::new(),
            events: Vec::new(),
            started_ns: None,
            finished: false,
        }
    }

    pub fn label(&self) -> &str {
        self.trial.definition.label()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The active listener, if the timeline is waiting for input.
    pub fn listener(&self) -> Option<&InputListener> {
        match &self.pending {
            Some(Pending::Input(listener)) => Some(listener),
            _ => None,
        }
    }

    /// Advances through every step that can run at the timer's current time.
    pub fn poll<T, D>(
        &mut self,
        timer: &mut T,
        display: &mut D,
    ) -> Result<TimelineStatus, ExperimentError>
    where
        T: Timer<Timestamp = u64>,
        D: StimulusDisplay + ?Sized,
    {
        if self.finished {
            return Err(ExperimentError::TimelineFinished(self.label().to_owned()));
        }

        let now = timer.now();
        if self.started_ns.is_none() {
            self.started_ns = Some(now);
            info!(
                group = self.trial.group,
                position = self.trial.position,
                trial = self.label(),
                at_ns = now,
                "trial started"
            );
        }

        match &self.pending {
            Some(Pending::Timer(t)) => {
                if now < t.deadline_ns {
                    return Ok(TimelineStatus::Sleeping {
                        deadline_ns: t.deadline_ns,
                    });
                }
                let overshoot = Duration::from_nanos(now - t.deadline_ns);
                timer.record_overshoot(overshoot);
                self.events.push(TimelineEvent::TimerFired {
                    at_ns: now,
                    overshoot_ns: now - t.deadline_ns,
                });
                debug!(
                    trial = self.label(),
                    waited_ns = now - t.started_ns,
                    overshoot_ns = overshoot.as_nanos() as u64,
                    "timer fired"
                );
                self.pending = None;
            }
            Some(Pending::Input(_)) => return Ok(TimelineStatus::AwaitingInput),
            None => {}
        }

        let definition = self.trial.definition;
        while let Some(step) = definition.steps().get(self.cursor) {
            let index = self.cursor;
            self.cursor += 1;
            match step {
                Step::ShowElement(element) => {
                    if self.shown.contains(&element.id) {
                        return Err(ConfigError::ElementAlreadyShown {
                            trial: definition.label().to_owned(),
                            step: index,
                            element: element.id.to_string(),
                        }
                        .into());
                    }
                    let content = definition.resolve(&element.content)?;
                    display
                        .show(element, content)
                        .map_err(ExperimentError::Display)?;
                    self.shown.push(element.id.clone());
                    self.events.push(TimelineEvent::Shown {
                        element: element.id.to_string(),
                        at_ns: timer.now(),
                    });
                    debug!(trial = definition.label(), element = %element.id, "shown");
                }
                Step::RemoveElement(id) => {
                    let Some(pos) = self.shown.iter().position(|s| s == id) else {
                        return Err(ConfigError::ElementNotShown {
                            trial: definition.label().to_owned(),
                            step: index,
                            element: id.to_string(),
                        }
                        .into());
                    };
                    self.shown.remove(pos);
                    display.hide(id).map_err(ExperimentError::Display)?;
                    self.events.push(TimelineEvent::Hidden {
                        element: id.to_string(),
                        at_ns: timer.now(),
                    });
                    debug!(trial = definition.label(), element = %id, "removed");
                }
                Step::StartTimer(duration) => {
                    let started_ns = timer.now();
                    let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
                    let deadline_ns = started_ns.saturating_add(duration_ns);
                    self.events.push(TimelineEvent::TimerStarted {
                        at_ns: started_ns,
                        duration_ns,
                    });
                    self.pending = Some(Pending::Timer(TimerInstance {
                        started_ns,
                        deadline_ns,
                    }));
                    debug!(
                        trial = definition.label(),
                        duration_ms = duration.as_millis() as u64,
                        "timer started"
                    );
                    return Ok(TimelineStatus::Sleeping { deadline_ns });
                }
                Step::AwaitInput {
                    name,
                    keys,
                    log_latency,
                } => {
                    let listener =
                        InputListener::activate(name, keys.clone(), *log_latency, timer.now());
                    self.pending = Some(Pending::Input(listener));
                    return Ok(TimelineStatus::AwaitingInput);
                }
                Step::LogValue { key, value } => {
                    let value = definition.resolve(value)?;
                    self.values.push(LoggedValue {
                        key: key.clone(),
                        value: value.to_owned(),
                    });
                }
            }
        }

        let finished_ns = timer.now();
        for id in self.teardown(display) {
            self.events.push(TimelineEvent::Hidden {
                element: id.to_string(),
                at_ns: finished_ns,
            });
        }
        self.finished = true;
        let record = TrialRecord {
            group: self.trial.group.to_owned(),
            position: self.trial.position,
            label: definition.label().to_owned(),
            started_ns: self.started_ns.unwrap_or(finished_ns),
            finished_ns,
            values: std::mem::take(&mut self.values),
            responses: std::mem::take(&mut self.responses),
            events: std::mem::take(&mut self.events),
        };
        info!(
            group = self.trial.group,
            position = self.trial.position,
            trial = definition.label(),
            duration_ms = record.duration().as_millis() as u64,
            "trial completed"
        );
        Ok(TimelineStatus::Complete(record))
    }

    /// Feeds a key press to the active listener. Returns true if it resolved
    /// the listener; filtered presses and presses while no listener is active
    /// return false and change nothing.
    pub fn offer_input(&mut self, key: &KeyId, at_ns: u64) -> bool {
        let event = match &self.pending {
            Some(Pending::Input(listener)) => listener.offer(key, at_ns),
            _ => None,
        };
        match event {
            Some(event) => self.resolve_input(event),
            None => false,
        }
    }

    /// Completes the pending input step with an already matched event.
    pub fn resolve_input(&mut self, event: InputEvent) -> bool {
        let Some(Pending::Input(listener)) = self.pending.take() else {
            return false;
        };
        debug!(
            trial = self.label(),
            input = listener.name(),
            key = %event.key,
            latency_ns = event.latency_ns(),
            "input resolved"
        );
        if listener.logs_latency() {
            self.responses.push(ResponseEntry {
                input: listener.name().to_owned(),
                key: event.key.to_string(),
                latency_ns: event.latency_ns(),
            });
        }
        true
    }

    /// Stops the trial: releases any timer or listener, clears the screen and
    /// discards everything logged so far.
    pub fn abort<D: StimulusDisplay + ?Sized>(&mut self, display: &mut D) {
        if self.finished {
            return;
        }
        self.pending = None;
        self.teardown(display);
        self.values.clear();
        self.responses.clear();
        self.events.clear();
        self.finished = true;
        warn!(trial = self.label(), step = self.cursor, "trial aborted");
    }

    /// Hides everything still on screen and returns the hidden ids.
    fn teardown<D: StimulusDisplay + ?Sized>(&mut self, display: &mut D) -> Vec<ElementId> {
        let shown = std::mem::take(&mut self.shown);
        for id in &shown {
            if let Err(e) = display.hide(id) {
                warn!(element = %id, error = %e, "failed to hide element");
            }
        }
        shown
    }
}

/// Runs one trial to completion, sleeping through timers and blocking on
/// input. On any error the trial is aborted and nothing is returned.
pub fn run_trial<T, I, D>(
    trial: ScheduledTrial<'_>,
    rig: &mut Rig<T, I, D>,
) -> Result<TrialRecord, ExperimentError>
where
    T: Timer<Timestamp = u64>,
    I: InputSource,
    D: StimulusDisplay,
{
    let mut timeline = TrialTimeline::new(trial);
    loop {
        let status = match timeline.poll(&mut rig.timer, &mut rig.display) {
            Ok(status) => status,
            Err(e) => {
                timeline.abort(&mut rig.display);
                return Err(e);
            }
        };
        match status {
            TimelineStatus::Sleeping { deadline_ns } => sleep_until(&rig.timer, deadline_ns),
            TimelineStatus::AwaitingInput => {
                let outcome = match timeline.listener() {
                    Some(listener) => await_input(listener, &mut rig.input),
                    None => continue,
                };
                match outcome {
                    Ok(Some(event)) => {
                        timeline.resolve_input(event);
                    }
                    Ok(None) => {
                        timeline.abort(&mut rig.display);
                        return Err(ExperimentError::Aborted {
                            trial: timeline.label().to_owned(),
                        });
                    }
                    Err(e) => {
                        timeline.abort(&mut rig.display);
                        return Err(e);
                    }
                }
            }
            TimelineStatus::Complete(record) => return Ok(record),
        }
    }
}

/// Runs a single definition outside any sequence.
pub fn run<T, I, D>(
    definition: &TrialDefinition,
    rig: &mut Rig<T, I, D>,
) -> Result<TrialRecord, ExperimentError>
where
    T: Timer<Timestamp = u64>,
    I: InputSource,
    D: StimulusDisplay,
{
    run_trial(ScheduledTrial::standalone(definition), rig)
}
