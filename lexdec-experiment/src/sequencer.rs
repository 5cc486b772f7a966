use lexdec_core::{ConfigError, GroupOrder, TrialGroup};
use lexdec_timing::Timer;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{error, info};

use crate::display::StimulusDisplay;
use crate::error::ExperimentError;
use crate::input::InputSource;
use crate::session::Session;
use crate::timeline::{Rig, ScheduledTrial, run_trial};
use crate::transport::{ResultTransport, send_with_retry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceEntry {
    Group { name: String, order: GroupOrder },
    /// Hand the results gathered so far to the transport.
    SendResults,
}

impl SequenceEntry {
    pub fn fixed(name: &str) -> Self {
        Self::Group {
            name: name.to_owned(),
            order: GroupOrder::Fixed,
        }
    }

    pub fn randomized(name: &str) -> Self {
        Self::Group {
            name: name.to_owned(),
            order: GroupOrder::Randomized,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PlannedItem<'a> {
    Trial(ScheduledTrial<'a>),
    SendResults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub trials_run: usize,
    /// `None` if the sequence has no send point, otherwise whether the last
    /// send succeeded.
    pub results_sent: Option<bool>,
}

#[derive(Debug)]
pub struct TrialSequencer {
    groups: Vec<TrialGroup>,
    sequence: Vec<SequenceEntry>,
    send_attempts: usize,
}

impl Default for TrialSequencer {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            sequence: Vec::new(),
            send_attempts: 1,
        }
    }
}

impl TrialSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, group: TrialGroup) -> Result<(), ConfigError> {
        if self.group(group.name()).is_some() {
            return Err(ConfigError::DuplicateGroup(group.name().to_owned()));
        }
        self.groups.push(group);
        Ok(())
    }

    pub fn with_group(mut self, group: TrialGroup) -> Result<Self, ConfigError> {
        self.register(group)?;
        Ok(self)
    }

    pub fn then(mut self, entry: SequenceEntry) -> Self {
        self.sequence.push(entry);
        self
    }

    pub fn with_send_attempts(mut self, attempts: usize) -> Self {
        self.send_attempts = attempts.max(1);
        self
    }

    pub fn group(&self, name: &str) -> Option<&TrialGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn sequence(&self) -> &[SequenceEntry] {
        &self.sequence
    }

    /// Expands the sequence into execution order. Randomized groups are
    /// shuffled independently on every call.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<PlannedItem<'_>>, ConfigError> {
        let mut plan = Vec::new();
        let mut position = 0;
        for entry in &self.sequence {
            let (name, order) = match entry {
                SequenceEntry::Group { name, order } => (name, order),
                SequenceEntry::SendResults => {
                    plan.push(PlannedItem::SendResults);
                    continue;
                }
            };
            let group = self
                .group(name)
                .ok_or_else(|| ConfigError::UnknownGroup(name.clone()))?;
            let mut trials: Vec<_> = group.trials().iter().collect();
            if order.is_randomized() {
                trials.shuffle(rng);
            }
            for definition in trials {
                plan.push(PlannedItem::Trial(ScheduledTrial {
                    group: group.name(),
                    position,
                    definition,
                }));
                position += 1;
            }
        }
        Ok(plan)
    }

    /// Runs every planned trial in order, appending each record to the
    /// session. A failing trial aborts the run; a failing send does not.
    pub fn run<R, T, I, D, X>(
        &self,
        session: &mut Session,
        rng: &mut R,
        rig: &mut Rig<T, I, D>,
        transport: &mut X,
    ) -> Result<SessionSummary, ExperimentError>
    where
        R: Rng + ?Sized,
        T: Timer<Timestamp = u64>,
        I: InputSource,
        D: StimulusDisplay,
        X: ResultTransport + ?Sized,
    {
        let plan = self.plan(rng)?;
        let total = plan
            .iter()
            .filter(|item| matches!(item, PlannedItem::Trial(_)))
            .count();
        info!(participant = session.participant_id(), trials = total, "sequence planned");

        let mut summary = SessionSummary::default();
        for item in plan {
            match item {
                PlannedItem::Trial(trial) => {
                    let record = run_trial(trial, rig)?;
                    session.record(record);
                    summary.trials_run += 1;
                }
                PlannedItem::SendResults => {
                    let export = session.export();
                    let sent = match send_with_retry(transport, &export, self.send_attempts) {
                        Ok(()) => {
                            info!(records = export.records.len(), "results sent");
                            true
                        }
                        Err(e) => {
                            error!(
                                attempts = self.send_attempts,
                                error = %e,
                                "giving up on sending results"
                            );
                            false
                        }
                    };
                    summary.results_sent = Some(sent);
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::RecordingDisplay;
    use crate::input::ScriptedInput;
    use crate::transport::MemoryTransport;
    use lexdec_core::{KeySet, TrialDefinition};
    use lexdec_timing::ManualTimer;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn logging_trial(label: &str) -> TrialDefinition {
        TrialDefinition::builder(label)
            .log("Trial", label)
            .build()
            .unwrap()
    }

    fn group(name: &str, labels: &[&str]) -> TrialGroup {
        let mut group = TrialGroup::new(name);
        group.extend(labels.iter().map(|l| logging_trial(l)));
        group
    }

    fn planned_labels<'a>(plan: &[PlannedItem<'a>]) -> Vec<&'a str> {
        plan.iter()
            .filter_map(|item| match item {
                PlannedItem::Trial(t) => Some(t.definition.label()),
                PlannedItem::SendResults => None,
            })
            .collect()
    }

    #[test]
    fn duplicate_group_names_are_rejected() {
        let err = TrialSequencer::new()
            .with_group(group("test", &["a"]))
            .unwrap()
            .with_group(group("test", &["b"]))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateGroup("test".into()));
    }

    #[test]
    fn unknown_group_fails_before_any_trial() {
        let sequencer = TrialSequencer::new()
            .with_group(group("welcome", &["w"]))
            .unwrap()
            .then(SequenceEntry::fixed("welcome"))
            .then(SequenceEntry::randomized("missing"));
        let mut rng = StdRng::seed_from_u64(0);
        let mut session = Session::with_participant_id("p1");
        let timer = ManualTimer::new();
        let mut rig = Rig::new(timer.clone(), ScriptedInput::new(timer), RecordingDisplay::new());

        let err = sequencer
            .run(&mut session, &mut rng, &mut rig, &mut MemoryTransport::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::Config(ConfigError::UnknownGroup(ref g)) if g == "missing"
        ));
        assert_eq!(session.trial_count(), 0);
    }

    #[test]
    fn fixed_groups_keep_declaration_order() {
        let sequencer = TrialSequencer::new()
            .with_group(group("a", &["a1", "a2", "a3"]))
            .unwrap()
            .then(SequenceEntry::fixed("a"));
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = sequencer.plan(&mut rng).unwrap();
            assert_eq!(planned_labels(&plan), vec!["a1", "a2", "a3"]);
        }
    }

    #[test]
    fn positions_follow_execution_order() {
        let sequencer = TrialSequencer::new()
            .with_group(group("w", &["w"]))
            .unwrap()
            .with_group(group("t", &["t1", "t2"]))
            .unwrap()
            .then(SequenceEntry::fixed("w"))
            .then(SequenceEntry::SendResults)
            .then(SequenceEntry::randomized("t"));
        let mut rng = StdRng::seed_from_u64(3);
        let plan = sequencer.plan(&mut rng).unwrap();
        assert_eq!(plan.len(), 4);
        assert!(matches!(plan[1], PlannedItem::SendResults));
        let positions: Vec<usize> = plan
            .iter()
            .filter_map(|item| match item {
                PlannedItem::Trial(t) => Some(t.position),
                PlannedItem::SendResults => None,
            })
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn shuffle_reaches_every_permutation() {
        let sequencer = TrialSequencer::new()
            .with_group(group("t", &["t1", "t2", "t3"]))
            .unwrap()
            .then(SequenceEntry::randomized("t"));
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashMap::new();
        for _ in 0..6_000 {
            let plan = sequencer.plan(&mut rng).unwrap();
            *seen.entry(planned_labels(&plan).join(",")).or_insert(0usize) += 1;
        }
        assert_eq!(seen.len(), 6);
        // Each of the 6 orders is expected 1000 times.
        assert!(seen.values().all(|&n| (800..=1200).contains(&n)), "{seen:?}");
    }

    #[test]
    fn failed_send_does_not_stop_the_session() {
        let sequencer = TrialSequencer::new()
            .with_group(group("test", &["t1"]))
            .unwrap()
            .with_group(group("final", &["f"]))
            .unwrap()
            .then(SequenceEntry::fixed("test"))
            .then(SequenceEntry::SendResults)
            .then(SequenceEntry::fixed("final"))
            .with_send_attempts(2);
        let mut rng = StdRng::seed_from_u64(0);
        let mut session = Session::with_participant_id("p1");
        let timer = ManualTimer::new();
        let mut rig = Rig::new(timer.clone(), ScriptedInput::new(timer), RecordingDisplay::new());
        let mut transport = MemoryTransport::failing(2);

        let summary = sequencer
            .run(&mut session, &mut rng, &mut rig, &mut transport)
            .unwrap();
        assert_eq!(summary.trials_run, 2);
        assert_eq!(summary.results_sent, Some(false));
        assert_eq!(session.export().records.len(), 2);
    }

    #[test]
    fn aborted_trial_leaves_no_record() {
        let waiting = TrialDefinition::builder("wait")
            .log("Before", "x")
            .await_input("answer", KeySet::from_chars("J"), true)
            .build()
            .unwrap();
        let sequencer = TrialSequencer::new()
            .with_group(group("first", &["one"]))
            .unwrap()
            .with_group(TrialGroup::new("second").with_trial(waiting))
            .unwrap()
            .then(SequenceEntry::fixed("first"))
            .then(SequenceEntry::fixed("second"));
        let mut rng = StdRng::seed_from_u64(0);
        let mut session = Session::with_participant_id("p1");
        let timer = ManualTimer::new();
        let input = ScriptedInput::new(timer.clone()).terminate();
        let mut rig = Rig::new(timer, input, RecordingDisplay::new());

        let err = sequencer
            .run(&mut session, &mut rng, &mut rig, &mut MemoryTransport::new())
            .unwrap_err();
        assert!(matches!(err, ExperimentError::Aborted { .. }));
        let records = session.export().records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "one");
    }

    proptest! {
        #[test]
        fn randomized_group_is_a_permutation(n in 0usize..30, seed in any::<u64>()) {
            let labels: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();
            let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
            let sequencer = TrialSequencer::new()
                .with_group(group("before", &["b"]))
                .unwrap()
                .with_group(group("test", &refs))
                .unwrap()
                .with_group(group("after", &["a"]))
                .unwrap()
                .then(SequenceEntry::fixed("before"))
                .then(SequenceEntry::randomized("test"))
                .then(SequenceEntry::fixed("after"));
            let mut rng = StdRng::seed_from_u64(seed);

            let plan = sequencer.plan(&mut rng).unwrap();
            let order = planned_labels(&plan);
            prop_assert_eq!(order.len(), n + 2);
            prop_assert_eq!(order[0], "b");
            prop_assert_eq!(order[n + 1], "a");
            let mut middle: Vec<&str> = order[1..=n].to_vec();
            middle.sort_unstable();
            let mut expected = refs.clone();
            expected.sort_unstable();
            prop_assert_eq!(middle, expected);
        }
    }
}
