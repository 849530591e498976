//! Real-time driver.
//!
//! One thread owns the [`Coach`]. Commands arrive over a channel and are
//! answered with a snapshot; ticks come from a `crossbeam_channel::tick`
//! stream that is dropped and re-armed whenever the running flag or the phase
//! changes, and replaced by `never()` while nothing needs ticking.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use thiserror::Error;

use crate::breath_patterns::BreathPattern;
use crate::coach::{Coach, CoachError, CoachSnapshot};
use crate::config::ConfigPatch;
use crate::phase_machine::Phase;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("runtime thread is not running")]
    Disconnected,
    #[error("runtime thread panicked")]
    Panicked,
    #[error(transparent)]
    Coach(#[from] CoachError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Toggle,
    Reset,
    UpdateConfig(ConfigPatch),
    ApplyPattern(String),
    AddPattern(BreathPattern),
    RemovePattern(String),
    StartResonance {
        minutes_per_preset: Option<f64>,
        skip_rating: Option<bool>,
    },
    RateResonance(u8),
    NextResonance,
    CancelResonance,
    ApplyResonance,
    ExitResonance,
    Snapshot,
}

enum Message {
    Call(Command, Sender<Result<CoachSnapshot, CoachError>>),
    Shutdown,
}

pub struct Runtime {
    tx: Sender<Message>,
    worker: Option<thread::JoinHandle<Coach>>,
}

impl Runtime {
    pub fn spawn(coach: Coach, tick: Duration) -> Self {
        let (tx, rx) = unbounded();
        let worker = thread::Builder::new()
            .name("breathwork-runtime".into())
            .spawn(move || run(coach, rx, tick));
        match worker {
            Ok(handle) => Self {
                tx,
                worker: Some(handle),
            },
            Err(e) => {
                log::warn!("failed to spawn runtime thread: {}", e);
                Self { tx, worker: None }
            }
        }
    }

    /// Tick at the coach's configured granularity.
    pub fn spawn_default(coach: Coach) -> Self {
        let tick = Duration::from_millis(coach.tick_ms());
        Self::spawn(coach, tick)
    }

    pub fn call(&self, command: Command) -> Result<CoachSnapshot, RuntimeError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Message::Call(command, reply_tx))
            .map_err(|_| RuntimeError::Disconnected)?;
        let result = reply_rx.recv().map_err(|_| RuntimeError::Disconnected)?;
        Ok(result?)
    }

    pub fn snapshot(&self) -> Result<CoachSnapshot, RuntimeError> {
        self.call(Command::Snapshot)
    }

    /// Stop the thread, silence all audio and hand the coach back.
    pub fn shutdown(mut self) -> Result<Coach, RuntimeError> {
        let _ = self.tx.send(Message::Shutdown);
        let worker = self.worker.take().ok_or(RuntimeError::Disconnected)?;
        worker.join().map_err(|_| RuntimeError::Panicked)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(Message::Shutdown);
            let _ = worker.join();
        }
    }
}

fn arm(coach: &Coach, tick: Duration) -> Receiver<Instant> {
    if coach.needs_ticking() {
        crossbeam_channel::tick(tick)
    } else {
        never()
    }
}

fn timing_key(coach: &Coach) -> (bool, Phase) {
    (coach.state().is_running, coach.state().phase)
}

fn dispatch(coach: &mut Coach, command: Command) -> Result<(), CoachError> {
    match command {
        Command::Start => coach.start(),
        Command::Toggle => coach.toggle(),
        Command::Reset => {
            coach.reset();
            Ok(())
        }
        Command::UpdateConfig(patch) => coach.update_config(&patch),
        Command::ApplyPattern(id) => coach.apply_pattern(&id).map(|_| ()),
        Command::AddPattern(pattern) => coach.add_custom_pattern(pattern),
        Command::RemovePattern(id) => coach.remove_custom_pattern(&id).map(|_| ()),
        Command::StartResonance {
            minutes_per_preset,
            skip_rating,
        } => coach.start_resonance(minutes_per_preset, skip_rating),
        Command::RateResonance(rating) => coach.rate_resonance(rating),
        Command::NextResonance => coach.next_resonance(),
        Command::CancelResonance => {
            coach.cancel_resonance();
            Ok(())
        }
        Command::ApplyResonance => coach.apply_resonance().map(|_| ()),
        Command::ExitResonance => {
            coach.exit_resonance();
            Ok(())
        }
        Command::Snapshot => Ok(()),
    }
}

fn run(mut coach: Coach, rx: Receiver<Message>, tick: Duration) -> Coach {
    let mut ticker = arm(&coach, tick);
    loop {
        let before = timing_key(&coach);
        select! {
            recv(rx) -> msg => match msg {
                Ok(Message::Call(command, reply)) => {
                    let result = dispatch(&mut coach, command).map(|_| coach.snapshot());
                    let _ = reply.send(result);
                }
                Ok(Message::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => {
                coach.tick();
            },
        }
        if timing_key(&coach) != before {
            ticker = arm(&coach, tick);
        }
    }
    coach.reset();
    log::debug!("runtime stopped");
    coach
}
