use crate::diagnostics::Diagnostics;
use crate::engine::{self, Engine, SharedEngine};
use crate::error::{Error, Outcome, Result};
use crate::model::{EngineState, Track};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

const COMPONENT: &str = "EngineRegistry";

struct Binding {
    pattern: String,
    matcher: Regex,
    engine: SharedEngine,
}

pub struct EngineRegistry {
    bindings: Vec<Binding>,
    active: Option<SharedEngine>,
    diagnostics: Diagnostics,
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("patterns", &self.patterns())
            .field("active", &self.active.is_some())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl EngineRegistry {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            bindings: Vec::new(),
            active: None,
            diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .map(|binding| binding.pattern.as_str())
            .collect()
    }

    // Patterns are keyed by their exact text.
    pub fn register_player(&mut self, pattern: &str, engine: SharedEngine) -> Result<()> {
        if self.bindings.iter().any(|binding| binding.pattern == pattern) {
            return self
                .diagnostics
                .enforce(COMPONENT, Error::DuplicatePattern(pattern.to_string()));
        }

        let matcher = match Regex::new(pattern) {
            Ok(matcher) => matcher,
            Err(source) => {
                return self.diagnostics.enforce(
                    COMPONENT,
                    Error::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    },
                );
            }
        };

        self.log(&format!("Registered to play tracks with locator: {pattern}"));
        self.bindings.push(Binding {
            pattern: pattern.to_string(),
            matcher,
            engine,
        });
        Ok(())
    }

    pub fn unregister_player(&mut self, pattern: &str) -> Result<()> {
        let Some(position) = self
            .bindings
            .iter()
            .position(|binding| binding.pattern == pattern)
        else {
            return self
                .diagnostics
                .enforce(COMPONENT, Error::UnknownPattern(pattern.to_string()));
        };

        let binding = &self.bindings[position];
        {
            let mut engine = engine::lock(&binding.engine);
            self.log(&format!(
                "Player unregistered. Pattern: {pattern}    Name: {}",
                engine.name()
            ));
            engine.release();
        }

        let binding = self.bindings.remove(position);
        if self
            .active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, &binding.engine))
        {
            self.active = None;
        }
        Ok(())
    }

    pub fn remove_all_players(&mut self) {
        self.log("All players removed.");

        for binding in &self.bindings {
            engine::lock(&binding.engine).release();
        }
        self.bindings.clear();
        self.active = None;
    }

    /// First binding, in registration order, whose pattern occurs anywhere in
    /// `locator`. Doesn't change the active engine.
    pub fn find_player(&self, locator: &str) -> Option<SharedEngine> {
        self.bindings
            .iter()
            .find(|binding| binding.matcher.is_match(locator))
            .map(|binding| Arc::clone(&binding.engine))
    }

    pub fn update_player(&mut self, track: &Track) -> Result<Outcome> {
        let Some(engine) = self.find_player(&track.locator) else {
            return self
                .diagnostics
                .refuse(COMPONENT, Error::NoPlayerFound(track.locator.clone()));
        };

        let name = engine::lock(&engine).name().to_string();
        self.active = Some(engine);
        self.log(&format!("Current player is now: {name}"));
        Ok(Outcome::Applied)
    }

    pub fn current_player(&self) -> Option<SharedEngine> {
        self.active.clone()
    }

    pub fn active_state(&self) -> Option<EngineState> {
        self.active
            .as_ref()
            .map(|active| engine::lock(active).state())
    }

    pub fn active_position_ms(&self) -> Option<u64> {
        self.active
            .as_ref()
            .map(|active| engine::lock(active).current_time_ms())
    }

    pub fn prepare(&self, locator: &str) -> Result<Outcome> {
        self.forward(|engine| engine.prepare(locator).map(|()| Outcome::Applied))
    }

    pub fn just_prepare(&self, locator: &str) -> Result<Outcome> {
        self.forward(|engine| engine.just_prepare(locator).map(|()| Outcome::Applied))
    }

    pub fn play(&self) -> Result<Outcome> {
        self.forward(|engine| engine.play())
    }

    pub fn pause(&self) -> Result<Outcome> {
        self.forward(|engine| engine.pause())
    }

    pub fn stop(&self) -> Result<Outcome> {
        self.forward(|engine| engine.stop())
    }

    pub fn seek_to(&self, time_ms: u64) -> Result<Outcome> {
        self.forward(|engine| engine.seek_to(time_ms).map(|()| Outcome::Applied))
    }

    fn forward(
        &self,
        command: impl FnOnce(&mut (dyn Engine + 'static)) -> Result<Outcome>,
    ) -> Result<Outcome> {
        match &self.active {
            Some(active) => command(&mut *engine::lock(active)),
            None => self.diagnostics.refuse(COMPONENT, Error::NoCurrentPlayer),
        }
    }

    fn log(&self, message: &str) {
        if self.diagnostics.engine_tier() {
            self.diagnostics.info(COMPONENT, message);
        }
    }
}
