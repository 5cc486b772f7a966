use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossterm::terminal;
use lexdec_core::StimulusRow;
use lexdec_experiment::script::{self, ANSWER_INPUT};
use lexdec_experiment::{
    ExperimentConfig, ExperimentError, LatencySummary, ResultTransport, Rig, Session,
    SessionExport, SessionSummary,
};
use lexdec_timing::{CalibrationStats, HighPrecisionTimer, Timer};
use tracing::{error, warn};

use crate::terminal::{TerminalDisplay, TerminalGuard, TerminalInput};
use crate::transport::JsonFileTransport;

pub struct App {
    config: ExperimentConfig,
    stimuli: Vec<StimulusRow>,
}

/// How a session ended, printed once the terminal is restored.
#[derive(Debug)]
pub struct Report {
    pub participant_id: String,
    pub trials_run: usize,
    pub aborted_in: Option<String>,
    pub results_path: Option<PathBuf>,
    pub latency: Option<LatencySummary>,
    pub timing: CalibrationStats,
}

impl App {
    pub fn new(config: ExperimentConfig, stimuli: Vec<StimulusRow>) -> Self {
        Self { config, stimuli }
    }

    pub fn load(stimuli: &Path, config: Option<&Path>, output: Option<&Path>) -> Result<Self> {
        let mut config = match config {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                ExperimentConfig::from_json(&json)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => ExperimentConfig::default(),
        };
        if let Some(output) = output {
            config.results_path = output.to_owned();
        }
        let stimuli = load_stimuli(stimuli)?;
        Ok(Self::new(config, stimuli))
    }

    pub fn run(self) -> Result<Report> {
        let sequencer = script::build_sequencer(&self.config, &self.stimuli)
            .context("invalid experiment definition")?;
        let mut rng = rand::rng();
        let mut session = Session::start(&mut rng);
        let mut transport = JsonFileTransport::new(&self.config.results_path);

        let timer = HighPrecisionTimer::new();
        let (cols, rows) = terminal::size().context("querying terminal size")?;
        let guard = TerminalGuard::enter().context("preparing terminal")?;
        let mut rig = Rig::new(
            timer.clone(),
            TerminalInput::new(timer),
            TerminalDisplay::new(io::stdout(), cols, rows),
        );
        let outcome = sequencer.run(&mut session, &mut rng, &mut rig, &mut transport);
        drop(guard);

        let timing = rig.timer.calibration_stats();
        let export = session.finish();
        let aborted_in = settle(outcome, &export, &mut transport)?;

        Ok(Report {
            aborted_in,
            results_path: (transport.sends() > 0).then(|| transport.path().to_owned()),
            ..Report::from_export(&export, timing)
        })
    }
}

/// Saves completed records the sequence never got to send, then reports how
/// the session ended: `Some(trial)` if the participant terminated it.
fn settle(
    outcome: Result<SessionSummary, ExperimentError>,
    export: &SessionExport,
    transport: &mut JsonFileTransport,
) -> Result<Option<String>> {
    let ended = match outcome {
        Ok(_) => Ok(None),
        Err(ExperimentError::Aborted { trial }) => {
            warn!(trial = %trial, "session terminated by participant");
            Ok(Some(trial))
        }
        Err(e) => Err(e),
    };

    if transport.sends() == 0 && !export.records.is_empty() {
        if let Err(e) = transport.send(export) {
            error!(error = %e, "could not save results");
        }
    }

    ended.context("experiment failed")
}

fn load_stimuli(path: &Path) -> Result<Vec<StimulusRow>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading stimuli {}", path.display()))?;
    parse_stimuli(&json).with_context(|| format!("parsing stimuli {}", path.display()))
}

fn parse_stimuli(json: &str) -> Result<Vec<StimulusRow>> {
    let rows: Vec<StimulusRow> = serde_json::from_str(json)?;
    anyhow::ensure!(!rows.is_empty(), "stimulus table is empty");
    Ok(rows)
}

impl Report {
    pub fn from_export(export: &SessionExport, timing: CalibrationStats) -> Self {
        Self {
            participant_id: export.participant_id.clone(),
            trials_run: export.records.len(),
            aborted_in: None,
            results_path: None,
            latency: LatencySummary::of(&export.records, ANSWER_INPUT),
            timing,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Participant {}", self.participant_id)?;
        match &self.aborted_in {
            Some(trial) => writeln!(
                f,
                "Session terminated during {trial} after {} trials",
                self.trials_run
            )?,
            None => writeln!(f, "Trials: {}", self.trials_run)?,
        }
        if let Some(latency) = &self.latency {
            writeln!(
                f,
                "Reaction times: mean {:.3} ms, min {:.3} ms, max {:.3} ms ({} responses)",
                latency.mean_ms, latency.min_ms, latency.max_ms, latency.responses
            )?;
        }
        writeln!(
            f,
            "Timer overshoot: mean {:.3} ms, jitter {:.3} ms, max {:.3} ms over {} waits",
            self.timing.average_overshoot_ns / 1_000_000.0,
            self.timing.jitter_ns / 1_000_000.0,
            self.timing.max_overshoot_ns / 1_000_000.0,
            self.timing.samples
        )?;
        match &self.results_path {
            Some(path) => write!(f, "Results saved to {}", path.display()),
            None => write!(f, "No results were saved"),
        }
    }
}
