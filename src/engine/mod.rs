use crate::diagnostics::{Diagnostics, Verbosity};
use crate::error::{Error, Outcome, Result};
use crate::model::EngineState;
use std::fmt;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub type EngineEventCallback = Box<dyn FnMut(EngineState, &str) + Send>;

pub type SharedEngine = Arc<Mutex<dyn Engine>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub state: EngineState,
    pub note: String,
}

pub fn event_channel() -> (EngineEventCallback, Receiver<EngineEvent>) {
    let (tx, rx) = mpsc::channel();
    let callback: EngineEventCallback = Box::new(move |state, note| {
        let _ = tx.send(EngineEvent {
            state,
            note: note.to_string(),
        });
    });
    (callback, rx)
}

pub fn shared<E: Engine + 'static>(engine: E) -> Arc<Mutex<E>> {
    Arc::new(Mutex::new(engine))
}

pub(crate) fn lock(engine: &SharedEngine) -> MutexGuard<'_, dyn Engine + 'static> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct EngineMachine {
    name: String,
    state: EngineState,
    callback: Option<EngineEventCallback>,
    diagnostics: Diagnostics,
}

impl fmt::Debug for EngineMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineMachine")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl EngineMachine {
    pub fn new(
        name: impl Into<String>,
        callback: Option<EngineEventCallback>,
        diagnostics: Diagnostics,
    ) -> Self {
        let mut machine = Self {
            name: name.into(),
            state: EngineState::Created,
            callback,
            diagnostics,
        };
        machine.post_event(EngineState::Created, "Previous state: none");
        machine
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    // Nothing leaves Released.
    pub fn transition(&mut self, state: EngineState) {
        if self.state.is_terminal() {
            self.diagnostics.error(
                &self.name,
                &format!("Player was released. Ignoring transition to {state}."),
            );
            return;
        }

        let previous = self.state;
        self.state = state;
        self.post_event(state, &format!("Previous state: {previous}"));
    }

    pub fn play(&mut self) -> Result<Outcome> {
        if !self.state.can_play() {
            return self
                .diagnostics
                .refuse(&self.name, Error::illegal_transition("play", self.state));
        }
        self.transition(EngineState::Playing);
        Ok(Outcome::Applied)
    }

    pub fn pause(&mut self) -> Result<Outcome> {
        if !self.state.can_pause() {
            return self
                .diagnostics
                .refuse(&self.name, Error::illegal_transition("pause", self.state));
        }
        self.transition(EngineState::Paused);
        Ok(Outcome::Applied)
    }

    pub fn stop(&mut self) -> Result<Outcome> {
        if self.state.is_terminal() {
            return self
                .diagnostics
                .refuse(&self.name, Error::illegal_transition("stop", self.state));
        }
        self.transition(EngineState::Stopped);
        Ok(Outcome::Applied)
    }

    pub fn release(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(EngineState::Released);
        self.callback = None;
    }

    pub fn notify_if_prepared(&mut self) {
        if self.state == EngineState::Preparing {
            self.transition(EngineState::Prepared);
        } else {
            self.diagnostics.error(
                &self.name,
                &format!(
                    "State was: {}. The track could not have just finished preparing.",
                    self.state
                ),
            );
        }
    }

    pub fn notify_if_track_ended(&mut self) {
        if self.state == EngineState::Playing {
            self.transition(EngineState::TrackEnded);
        } else {
            self.diagnostics.error(
                &self.name,
                &format!("State was: {}. The track could not have ended.", self.state),
            );
        }
    }

    fn post_event(&mut self, state: EngineState, note: &str) {
        match self.callback.as_mut() {
            Some(callback) => callback(state, note),
            None => self
                .diagnostics
                .warn(&self.name, "Player event callback was not set."),
        }

        if matches!(
            self.diagnostics.verbosity(),
            Verbosity::Full | Verbosity::Basic | Verbosity::Engine
        ) {
            self.diagnostics
                .info(&self.name, &format!("Event: {state}    Info: {note}"));
        }
    }
}

pub trait Engine: Send {
    fn machine(&self) -> &EngineMachine;

    fn machine_mut(&mut self) -> &mut EngineMachine;

    /// Loads `locator` for playback. Must move to `Preparing` before any
    /// asynchronous work and eventually call [`Engine::notify_if_prepared`].
    fn prepare(&mut self, locator: &str) -> Result<()>;

    /// Pre-buffers `locator`. Must never call [`Engine::notify_if_prepared`].
    fn just_prepare(&mut self, locator: &str) -> Result<()>;

    fn seek_to(&mut self, time_ms: u64) -> Result<()>;

    fn current_time_ms(&self) -> u64;

    fn duration_ms(&self) -> Option<u64>;

    fn name(&self) -> &str {
        self.machine().name()
    }

    fn state(&self) -> EngineState {
        self.machine().state()
    }

    fn play(&mut self) -> Result<Outcome> {
        self.machine_mut().play()
    }

    fn pause(&mut self) -> Result<Outcome> {
        self.machine_mut().pause()
    }

    fn stop(&mut self) -> Result<Outcome> {
        self.machine_mut().stop()
    }

    fn release(&mut self) {
        self.machine_mut().release();
    }

    fn notify_if_prepared(&mut self) {
        self.machine_mut().notify_if_prepared();
    }

    fn notify_if_track_ended(&mut self) {
        self.machine_mut().notify_if_track_ended();
    }
}

#[derive(Debug)]
pub struct NullEngine {
    machine: EngineMachine,
    locator: Option<String>,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
}

impl NullEngine {
    pub fn new(callback: Option<EngineEventCallback>, diagnostics: Diagnostics) -> Self {
        Self::named("NullEngine", callback, diagnostics)
    }

    pub fn named(
        name: impl Into<String>,
        callback: Option<EngineEventCallback>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            machine: EngineMachine::new(name, callback, diagnostics),
            locator: None,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.track_duration = Some(Duration::from_millis(duration_ms));
        self
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.machine.state() == EngineState::Playing && self.current_position() >= duration
    }

    pub fn finish_track(&mut self) {
        if let Some(duration) = self.track_duration {
            self.position_offset = duration;
        }
        self.started_at = None;
        self.notify_if_track_ended();
    }

    fn load(&mut self, locator: &str) {
        self.locator = Some(locator.to_string());
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if let Some(started_at) = self.started_at {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Engine for NullEngine {
    fn machine(&self) -> &EngineMachine {
        &self.machine
    }

    fn machine_mut(&mut self) -> &mut EngineMachine {
        &mut self.machine
    }

    fn prepare(&mut self, locator: &str) -> Result<()> {
        self.load(locator);
        self.machine.transition(EngineState::Preparing);
        self.notify_if_prepared();
        Ok(())
    }

    fn just_prepare(&mut self, locator: &str) -> Result<()> {
        self.load(locator);
        self.machine.transition(EngineState::Preparing);
        self.machine.transition(EngineState::Paused);
        Ok(())
    }

    fn seek_to(&mut self, time_ms: u64) -> Result<()> {
        if self.locator.is_none() {
            return Err(Error::engine("no active track"));
        }

        let position = Duration::from_millis(time_ms);
        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.machine.state() == EngineState::Playing {
            Some(Instant::now())
        } else {
            None
        };
        Ok(())
    }

    fn current_time_ms(&self) -> u64 {
        u64::try_from(self.current_position().as_millis()).unwrap_or(u64::MAX)
    }

    fn duration_ms(&self) -> Option<u64> {
        self.track_duration
            .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    fn play(&mut self) -> Result<Outcome> {
        let outcome = self.machine.play()?;
        if outcome.applied() && self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(outcome)
    }

    fn pause(&mut self) -> Result<Outcome> {
        let position = self.current_position();
        let outcome = self.machine.pause()?;
        if outcome.applied() {
            self.position_offset = position;
            self.started_at = None;
        }
        Ok(outcome)
    }

    fn stop(&mut self) -> Result<Outcome> {
        let outcome = self.machine.stop()?;
        if outcome.applied() {
            self.started_at = None;
            self.position_offset = Duration::ZERO;
        }
        Ok(outcome)
    }

    fn release(&mut self) {
        self.machine.release();
        self.locator = None;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
    }
}
