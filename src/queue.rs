use crate::config::QueueConfig;
use crate::diagnostics::{DiagnosticSink, Diagnostics, TracingSink, Verbosity};
use crate::engine::SharedEngine;
use crate::error::{Error, Outcome, Result};
use crate::model::{EngineState, Loop, MediaType, QueueState, Track};
use crate::registry::EngineRegistry;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

const COMPONENT: &str = "QueueController";

pub trait QueueEventListener: Send {
    fn on_state_changed(&mut self, state: QueueState);
    fn on_media_type_changed(&mut self, media_type: MediaType);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    StateChanged(QueueState),
    MediaTypeChanged(MediaType),
}

impl QueueEventListener for Sender<QueueEvent> {
    fn on_state_changed(&mut self, state: QueueState) {
        let _ = self.send(QueueEvent::StateChanged(state));
    }

    fn on_media_type_changed(&mut self, media_type: MediaType) {
        let _ = self.send(QueueEvent::MediaTypeChanged(media_type));
    }
}

pub struct QueueController {
    original: Vec<Track>,
    // Working list: positions into `original`.
    order: Vec<usize>,
    index: usize,
    current: Option<usize>,
    shuffling: bool,
    loop_mode: Loop,
    state: QueueState,
    media_type: MediaType,
    reset_on_previous: bool,
    min_delay_ms: u64,
    listener: Option<Box<dyn QueueEventListener>>,
    registry: EngineRegistry,
    diagnostics: Diagnostics,
    shuffle_rng: SmallRng,
}

impl fmt::Debug for QueueController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueController")
            .field("len", &self.original.len())
            .field("index", &self.index)
            .field("current", &self.current)
            .field("shuffling", &self.shuffling)
            .field("loop_mode", &self.loop_mode)
            .field("state", &self.state)
            .field("listener", &self.listener.is_some())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl QueueController {
    pub fn new(config: &QueueConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    pub fn with_sink(config: &QueueConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let diagnostics = Diagnostics::new(sink, config.verbosity, config.error_policy);
        let shuffle_rng = match config.shuffle_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::try_from_rng(&mut rand::rngs::SysRng).expect("unexpected failure from SysRng"),
        };

        Self {
            original: Vec::new(),
            order: Vec::new(),
            index: 0,
            current: None,
            shuffling: false,
            loop_mode: config.loop_mode,
            state: QueueState::Created,
            media_type: MediaType::Default,
            reset_on_previous: config.reset_on_previous,
            min_delay_ms: config.min_delay_ms,
            listener: None,
            registry: EngineRegistry::new(diagnostics.clone()),
            diagnostics,
            shuffle_rng,
        }
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn loop_mode(&self) -> Loop {
        self.loop_mode
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn is_shuffling(&self) -> bool {
        self.shuffling
    }

    pub fn previous_behavior(&self) -> (bool, u64) {
        (self.reset_on_previous, self.min_delay_ms)
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn current_player(&self) -> Option<SharedEngine> {
        self.registry.current_player()
    }

    pub fn get_current(&self) -> Option<&Track> {
        self.current.and_then(|slot| self.original.get(slot))
    }

    pub fn working_list(&self) -> Vec<&Track> {
        self.order.iter().map(|slot| &self.original[*slot]).collect()
    }

    pub fn original_list(&self) -> &[Track] {
        &self.original
    }

    pub fn add_player(&mut self, pattern: &str, engine: SharedEngine) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.registry.register_player(pattern, engine)
    }

    pub fn remove_player(&mut self, pattern: &str) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.registry.unregister_player(pattern)
    }

    pub fn set_listener(&mut self, listener: impl QueueEventListener + 'static) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.listener = Some(Box::new(listener));
        Ok(())
    }

    pub fn set_track_list(&mut self, tracks: Vec<Track>) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        if let Some(first) = tracks.first()
            && self.registry.update_player(first)?.skipped()
        {
            return Ok(());
        }

        self.order = (0..tracks.len()).collect();
        self.original = tracks;
        self.shuffling = false;
        self.index = 0;
        self.current = (!self.original.is_empty()).then_some(0);
        if let Some(media_type) = self.original.first().map(|track| track.media_type) {
            self.set_media_type(media_type);
        }

        self.set_state(QueueState::NotEmpty);
        Ok(())
    }

    pub fn set_index(&mut self, index: usize) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        if index >= self.original.len() {
            return self.reject(Error::InvalidIndex {
                index,
                len: self.original.len(),
            });
        }
        let Some(position) = self.order.iter().position(|slot| *slot == index) else {
            return self.reject(Error::InvalidQueueState {
                index,
                len: self.order.len(),
            });
        };

        if self.switch_to(position)?.skipped() {
            return Ok(());
        }
        self.launch()?;

        self.log_index("SetIndex");
        Ok(())
    }

    pub fn next(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }

        let target = match self.loop_mode {
            Loop::Single => self.index,
            Loop::None | Loop::List => self.following(),
        };
        if self.switch_to(target)?.skipped() {
            return Ok(());
        }
        if self.loop_mode != Loop::Single {
            self.log_index("INCREMENT");
        }

        // End of the list without looping: rewind, but don't play.
        if self.loop_mode == Loop::None && target == 0 {
            self.set_state(QueueState::PlaybackEnded);
            return Ok(());
        }
        self.launch()?;
        Ok(())
    }

    /// Restarts the current track instead of moving back once it has played
    /// for `min_delay_ms`, when reset-on-previous is on.
    pub fn previous(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        let Some(position_ms) = self.registry.active_position_ms() else {
            return self.reject(Error::NoCurrentPlayer);
        };

        if position_ms >= self.min_delay_ms && self.reset_on_previous {
            return self.seek_to(0);
        }

        // Moving backwards always wraps, even without looping.
        let target = match self.loop_mode {
            Loop::Single => self.index,
            Loop::None | Loop::List => self.preceding(),
        };
        if self.switch_to(target)?.skipped() {
            return Ok(());
        }
        if self.loop_mode != Loop::Single {
            self.log_index("DECREMENT");
        }
        self.launch()?;
        Ok(())
    }

    /// With `reset`, playback restarts from the new head of the list. Without
    /// it the current track keeps playing and moves to the head.
    pub fn set_shuffling(&mut self, shuffle: bool, reset: bool) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }

        self.log_lists();

        if !shuffle {
            self.order = (0..self.original.len()).collect();
            self.shuffling = false;
            if let Some(slot) = self.current {
                self.index = slot;
            }
            self.log_lists();
            return Ok(());
        }

        let mut order = self.order.clone();
        order.shuffle(&mut self.shuffle_rng);

        if reset {
            if self.check_playable(&order, 0)?.skipped() {
                return Ok(());
            }
            self.order = order;
            self.shuffling = true;
            self.log_lists();
            if self.select(0)?.skipped() {
                return Ok(());
            }
            self.launch()?;
            return Ok(());
        }

        if let Some(slot) = self.current
            && let Some(position) = order.iter().position(|entry| *entry == slot)
        {
            let slot = order.remove(position);
            order.insert(0, slot);
        }
        self.order = order;
        self.shuffling = true;
        self.index = 0;
        self.log_lists();
        Ok(())
    }

    pub fn set_looping(&mut self, loop_mode: Loop) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.loop_mode = loop_mode;
        Ok(())
    }

    pub fn set_previous_behavior(&mut self, reset_on_previous: bool, min_delay_ms: u64) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.reset_on_previous = reset_on_previous;
        self.min_delay_ms = min_delay_ms;
        Ok(())
    }

    pub fn prepare(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        let Some(locator) = self.get_current().map(|track| track.locator.clone()) else {
            return self.reject(Error::InvalidQueueState {
                index: self.index,
                len: self.order.len(),
            });
        };

        if self.registry.just_prepare(&locator)?.skipped() {
            return Ok(());
        }
        self.set_state(QueueState::Starting);

        if self.listener.is_none() && self.diagnostics.verbosity() != Verbosity::Engine {
            self.diagnostics
                .warn(COMPONENT, "The queue event listener has not been set.");
        }

        self.log_playback("PREPARE");
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.launch()?;
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        let Some(engine_state) = self.registry.active_state() else {
            return self.reject(Error::NoCurrentPlayer);
        };

        if matches!(engine_state, EngineState::Created | EngineState::Stopped) {
            return self.start();
        }

        if self.registry.play()?.skipped() {
            return Ok(());
        }
        self.set_state(QueueState::Playing);
        self.log_playback("PLAY");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        if self.registry.pause()?.skipped() {
            return Ok(());
        }
        self.set_state(QueueState::Paused);
        self.log_playback("PAUSE");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.halt()?;
        Ok(())
    }

    pub fn seek_to(&mut self, time_ms: u64) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        if self.registry.seek_to(time_ms)?.skipped() {
            return Ok(());
        }
        self.log_playback("SEEKING");
        Ok(())
    }

    pub fn release(&mut self) -> Result<()> {
        if self.is_released() {
            return self.reject(Error::Released);
        }
        self.registry.remove_all_players();
        self.set_state(QueueState::Released);
        self.diagnostics.info(COMPONENT, "Queue released.");
        Ok(())
    }

    pub fn handle_engine_event(&mut self, engine_state: EngineState) -> Result<()> {
        if self.is_released() {
            self.diagnostics.verbose(
                COMPONENT,
                &format!("Ignoring {engine_state} event after release."),
            );
            return Ok(());
        }

        match engine_state {
            EngineState::Prepared if self.state == QueueState::Starting => self.play(),
            EngineState::Playing if self.state == QueueState::Starting => {
                self.set_state(QueueState::Playing);
                Ok(())
            }
            EngineState::TrackEnded => self.next(),
            _ => Ok(()),
        }
    }

    fn following(&self) -> usize {
        if self.index + 1 >= self.order.len() {
            0
        } else {
            self.index + 1
        }
    }

    fn preceding(&self) -> usize {
        if self.index == 0 {
            self.order.len().saturating_sub(1)
        } else {
            self.index - 1
        }
    }

    // Checked before anything is stopped, so a refused move leaves the queue
    // and the active engine as they were.
    fn check_playable(&self, order: &[usize], position: usize) -> Result<Outcome> {
        let Some(slot) = order.get(position).copied() else {
            return self.refuse(Error::InvalidQueueState {
                index: position,
                len: order.len(),
            });
        };
        let locator = &self.original[slot].locator;
        if self.registry.find_player(locator).is_none() {
            return self.refuse(Error::NoPlayerFound(locator.clone()));
        }
        Ok(Outcome::Applied)
    }

    fn switch_to(&mut self, position: usize) -> Result<Outcome> {
        if self.check_playable(&self.order, position)?.skipped() {
            return Ok(Outcome::Skipped);
        }
        if self.halt()?.skipped() {
            return Ok(Outcome::Skipped);
        }
        self.select(position)
    }

    fn select(&mut self, position: usize) -> Result<Outcome> {
        if self.check_playable(&self.order, position)?.skipped() {
            return Ok(Outcome::Skipped);
        }
        let slot = self.order[position];
        if self.registry.update_player(&self.original[slot])?.skipped() {
            return Ok(Outcome::Skipped);
        }

        self.index = position;
        self.current = Some(slot);
        let media_type = self.original[slot].media_type;
        self.set_media_type(media_type);
        Ok(Outcome::Applied)
    }

    fn halt(&mut self) -> Result<Outcome> {
        if self.registry.stop()?.skipped() {
            return Ok(Outcome::Skipped);
        }
        self.set_state(QueueState::Stopped);
        self.log_playback("STOP");
        Ok(Outcome::Applied)
    }

    fn launch(&mut self) -> Result<Outcome> {
        let Some(locator) = self.get_current().map(|track| track.locator.clone()) else {
            return self.refuse(Error::InvalidQueueState {
                index: self.index,
                len: self.order.len(),
            });
        };

        if self.registry.prepare(&locator)?.skipped() {
            return Ok(Outcome::Skipped);
        }
        self.set_state(QueueState::Starting);
        self.log_playback("START");
        Ok(Outcome::Applied)
    }

    fn set_state(&mut self, state: QueueState) {
        self.state = state;

        if self.diagnostics.queue_tier() {
            self.diagnostics
                .verbose(COMPONENT, &format!("Queue state changed to: {state}"));
        }

        match self.listener.as_mut() {
            Some(listener) => listener.on_state_changed(state),
            None => self
                .diagnostics
                .warn(COMPONENT, "Queue event listener was not set."),
        }
    }

    fn set_media_type(&mut self, media_type: MediaType) {
        if self.media_type == media_type {
            return;
        }
        self.media_type = media_type;

        if self.diagnostics.queue_tier() {
            self.diagnostics.verbose(
                COMPONENT,
                &format!("Current media type changed to: {media_type}"),
            );
        }

        match self.listener.as_mut() {
            Some(listener) => listener.on_media_type_changed(media_type),
            None => self
                .diagnostics
                .warn(COMPONENT, "Queue event listener was not set."),
        }
    }

    fn is_released(&self) -> bool {
        self.state.is_terminal()
    }

    fn reject(&self, err: Error) -> Result<()> {
        self.diagnostics.enforce(COMPONENT, err)
    }

    fn refuse(&self, err: Error) -> Result<Outcome> {
        self.diagnostics.refuse(COMPONENT, err)
    }

    fn log_index(&self, prefix: &str) {
        if matches!(
            self.diagnostics.verbosity(),
            Verbosity::None | Verbosity::Engine
        ) {
            return;
        }
        let title = self.get_current().map_or("", |track| track.title.as_str());
        self.diagnostics.info(
            COMPONENT,
            &format!("{prefix}  ::  Index: {}    Track: {title}", self.index),
        );
    }

    fn log_playback(&self, event: &str) {
        let Some(track) = self.get_current() else {
            return;
        };

        let message = match self.diagnostics.verbosity() {
            Verbosity::None | Verbosity::Engine => return,
            Verbosity::Basic => format!("{event}  ::  Track: {}", track.title),
            Verbosity::Queue | Verbosity::Full => format!(
                "{event}  ::  Track: {}    Artist: {}    Locator: {}    Artwork: {}    State: {}    Index: {}",
                track.title,
                track.artist,
                track.locator,
                track.artwork.as_deref().unwrap_or("none"),
                self.state,
                self.index
            ),
        };
        self.diagnostics.verbose(COMPONENT, &message);
    }

    fn log_lists(&self) {
        if self.diagnostics.verbosity() != Verbosity::Full {
            return;
        }
        let titles = |tracks: Vec<&Track>| {
            tracks
                .iter()
                .map(|track| track.title.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.diagnostics.info(
            COMPONENT,
            &format!("Working: [{}]", titles(self.working_list())),
        );
        self.diagnostics.info(
            COMPONENT,
            &format!("Original: [{}]", titles(self.original.iter().collect())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, Severity};
    use crate::engine::{Engine, NullEngine, shared};
    use crate::error::ErrorPolicy;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use std::sync::Mutex;
    use std::sync::mpsc;

    fn songs(count: usize) -> Vec<Track> {
        (0..count)
            .map(|n| {
                Track::new(
                    format!("song_{n}"),
                    "artist",
                    format!("file:///music/song_{n}.mp3"),
                )
            })
            .collect()
    }

    fn controller_with(
        policy: ErrorPolicy,
        verbosity: Verbosity,
    ) -> (QueueController, Arc<MemorySink>, Arc<Mutex<NullEngine>>) {
        let sink = Arc::new(MemorySink::new());
        let config = QueueConfig {
            error_policy: policy,
            verbosity,
            shuffle_seed: Some(42),
            ..QueueConfig::default()
        };
        let mut queue = QueueController::with_sink(&config, sink.clone());
        let engine = shared(NullEngine::named(
            "local",
            None,
            queue.diagnostics().clone(),
        ));
        queue
            .add_player("^file://", engine.clone())
            .expect("register");
        (queue, sink, engine)
    }

    fn controller() -> (QueueController, Arc<MemorySink>, Arc<Mutex<NullEngine>>) {
        controller_with(ErrorPolicy::Raise, Verbosity::Full)
    }

    fn engine_state(engine: &Arc<Mutex<NullEngine>>) -> EngineState {
        engine.lock().expect("lock").state()
    }

    fn titles(queue: &QueueController) -> Vec<String> {
        queue
            .working_list()
            .iter()
            .map(|track| track.title.clone())
            .collect()
    }

    fn assert_current_matches_index(queue: &QueueController) {
        let working = queue.working_list();
        assert!(queue.index() < working.len());
        assert_eq!(queue.get_current(), Some(working[queue.index()]));
    }

    #[test]
    fn construction_starts_in_created() {
        let (queue, _, _) = controller();
        assert_eq!(queue.state(), QueueState::Created);
        assert!(queue.get_current().is_none());
        assert_eq!(queue.previous_behavior(), (true, 2000));
    }

    #[test]
    fn set_track_list_resolves_first_track() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(3)).expect("tracks");

        assert_eq!(queue.state(), QueueState::NotEmpty);
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.get_current().map(|t| t.title.as_str()), Some("song_0"));
        assert_eq!(engine_state(&engine), EngineState::Created);
        assert!(queue.current_player().is_some());
    }

    #[test]
    fn empty_track_list_is_accepted_but_cannot_start() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(Vec::new()).expect("empty list");
        assert_eq!(queue.state(), QueueState::NotEmpty);

        let err = queue.start().expect_err("nothing to start");
        assert!(matches!(err, Error::InvalidQueueState { index: 0, len: 0 }));
    }

    #[test]
    fn unmatched_locator_raises_no_player_found() {
        let (mut queue, _, _) = controller();
        let err = queue
            .set_track_list(vec![Track::new("radio", "dj", "http://radio/stream")])
            .expect_err("no engine");
        assert!(matches!(err, Error::NoPlayerFound(_)));
        assert!(queue.is_empty());
        assert_eq!(queue.state(), QueueState::Created);
    }

    #[test]
    fn next_without_loop_ends_playback_after_last_track() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(3)).expect("tracks");

        queue.next().expect("next");
        queue.next().expect("next");
        assert_eq!(queue.index(), 2);
        assert_eq!(queue.get_current().map(|t| t.title.as_str()), Some("song_2"));

        queue.next().expect("next");
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.state(), QueueState::PlaybackEnded);
        assert_eq!(queue.get_current().map(|t| t.title.as_str()), Some("song_0"));
        assert_eq!(engine_state(&engine), EngineState::Stopped);
    }

    #[test]
    fn next_with_list_loop_wraps_and_starts() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(2)).expect("tracks");
        queue.set_looping(Loop::List).expect("loop");

        queue.next().expect("next");
        queue.next().expect("wrap");
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Prepared);
    }

    #[test]
    fn next_with_single_loop_restarts_same_track() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(3)).expect("tracks");
        queue.set_looping(Loop::Single).expect("loop");

        queue.next().expect("next");
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(
            engine.lock().expect("lock").locator(),
            Some("file:///music/song_0.mp3")
        );
    }

    #[test]
    fn previous_early_in_track_wraps_to_last() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(3)).expect("tracks");
        queue.start().expect("start");
        queue.play().expect("play");

        queue.previous().expect("previous");
        assert_eq!(queue.index(), 2);
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(
            engine.lock().expect("lock").locator(),
            Some("file:///music/song_2.mp3")
        );
    }

    #[test]
    fn previous_late_in_track_rewinds_in_place() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(3)).expect("tracks");
        queue.set_index(1).expect("index");
        queue.play().expect("play");
        queue.seek_to(5_000).expect("seek");

        queue.previous().expect("previous");
        assert_eq!(queue.index(), 1);
        assert_eq!(queue.state(), QueueState::Playing);
        assert_eq!(engine_state(&engine), EngineState::Playing);
        assert!(engine.lock().expect("lock").current_time_ms() < 1_000);
    }

    #[test]
    fn previous_without_reset_always_moves() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(songs(3)).expect("tracks");
        queue.set_previous_behavior(false, 2_000).expect("behavior");
        queue.set_index(2).expect("index");
        queue.play().expect("play");
        queue.seek_to(5_000).expect("seek");

        queue.previous().expect("previous");
        assert_eq!(queue.index(), 1);
    }

    #[test]
    fn previous_with_single_loop_restarts_current() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(songs(3)).expect("tracks");
        queue.set_looping(Loop::Single).expect("loop");
        queue.set_index(1).expect("index");

        queue.previous().expect("previous");
        assert_eq!(queue.index(), 1);
        assert_eq!(queue.state(), QueueState::Starting);
    }

    #[test]
    fn set_index_out_of_range_is_rejected() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(songs(3)).expect("tracks");

        let err = queue.set_index(3).expect_err("out of range");
        assert!(matches!(err, Error::InvalidIndex { index: 3, len: 3 }));
        assert_eq!(queue.index(), 0);
    }

    #[test]
    fn set_index_out_of_range_degrades_without_effect() {
        let (mut queue, sink, _) = controller_with(ErrorPolicy::Degrade, Verbosity::Basic);
        queue.set_track_list(songs(3)).expect("tracks");

        queue.set_index(9).expect("degraded");
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.state(), QueueState::NotEmpty);
        assert!(sink.contains("index 9 is out of bounds"));
    }

    #[test]
    fn set_index_addresses_original_order_while_shuffled() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(songs(8)).expect("tracks");
        queue.set_shuffling(true, false).expect("shuffle");

        for k in 0..8 {
            queue.set_index(k).expect("index");
            assert_eq!(queue.get_current(), Some(&queue.original_list()[k]));
            assert_current_matches_index(&queue);
        }
    }

    #[test]
    fn shuffle_toggle_keeps_current_track_playing() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(10)).expect("tracks");
        queue.set_index(3).expect("index");
        queue.play().expect("play");

        queue.set_shuffling(true, false).expect("shuffle");
        assert!(queue.is_shuffling());
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.get_current().map(|t| t.title.as_str()), Some("song_3"));
        assert_eq!(titles(&queue)[0], "song_3");
        assert_eq!(queue.state(), QueueState::Playing);
        assert_eq!(engine_state(&engine), EngineState::Playing);

        let mut sorted = titles(&queue);
        sorted.sort();
        let mut expected: Vec<String> = (0..10).map(|n| format!("song_{n}")).collect();
        expected.sort();
        assert_eq!(sorted, expected);

        queue.set_shuffling(false, false).expect("unshuffle");
        assert!(!queue.is_shuffling());
        assert_eq!(queue.index(), 3);
        assert_eq!(queue.working_list(), queue.original_list().iter().collect::<Vec<_>>());
        assert_eq!(queue.state(), QueueState::Playing);
    }

    #[test]
    fn shuffle_reset_restarts_from_new_head() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(6)).expect("tracks");

        queue.set_shuffling(true, true).expect("shuffle");
        assert_eq!(queue.index(), 0);
        assert_current_matches_index(&queue);
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Prepared);
    }

    #[test]
    fn shuffling_an_empty_list_without_reset_is_harmless() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(Vec::new()).expect("empty");
        queue.set_shuffling(true, false).expect("shuffle");
        queue.set_shuffling(false, false).expect("unshuffle");
        assert!(queue.get_current().is_none());
    }

    #[test]
    fn play_on_fresh_engine_routes_through_start() {
        let (mut queue, _, engine) = controller();
        queue
            .set_track_list(vec![Track::new("song", "band", "file:///song.mp3")])
            .expect("tracks");
        assert_eq!(engine_state(&engine), EngineState::Created);

        queue.play().expect("play");
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Prepared);

        queue.play().expect("play prepared");
        assert_eq!(queue.state(), QueueState::Playing);
        assert_eq!(engine_state(&engine), EngineState::Playing);
    }

    #[test]
    fn pause_and_stop_follow_engine() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(2)).expect("tracks");
        queue.start().expect("start");
        queue.play().expect("play");

        queue.pause().expect("pause");
        assert_eq!(queue.state(), QueueState::Paused);
        assert_eq!(engine_state(&engine), EngineState::Paused);

        queue.stop().expect("stop");
        assert_eq!(queue.state(), QueueState::Stopped);
        assert_eq!(engine_state(&engine), EngineState::Stopped);

        queue.play().expect("restart");
        assert_eq!(queue.state(), QueueState::Starting);
    }

    #[test]
    fn illegal_pause_surfaces_engine_error() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(songs(2)).expect("tracks");
        queue.start().expect("start");

        let err = queue.pause().expect_err("prepared can't pause");
        assert!(matches!(
            err,
            Error::IllegalPlayerTransition {
                action: "pause",
                state: EngineState::Prepared
            }
        ));
        assert_eq!(queue.state(), QueueState::Starting);
    }

    #[test]
    fn degraded_pause_keeps_queue_in_step_with_engine() {
        let (mut queue, sink, engine) = controller_with(ErrorPolicy::Degrade, Verbosity::Basic);
        queue.set_track_list(songs(1)).expect("tracks");
        queue.start().expect("start");

        queue.pause().expect("degraded");
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Prepared);
        assert!(sink.contains("tried to pause when player was prepared"));
    }

    fn mixed_tracks() -> Vec<Track> {
        vec![
            Track::new("local", "band", "file:///a.mp3"),
            Track::new("radio", "dj", "https://radio.example/live"),
        ]
    }

    #[test]
    fn degraded_next_onto_unplayable_track_stays_put() {
        let (mut queue, sink, engine) = controller_with(ErrorPolicy::Degrade, Verbosity::Basic);
        queue.set_track_list(mixed_tracks()).expect("tracks");
        queue.start().expect("start");

        queue.next().expect("degraded");
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.get_current().map(|t| t.title.as_str()), Some("local"));
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Prepared);
        assert_eq!(engine.lock().expect("lock").locator(), Some("file:///a.mp3"));
        assert!(sink.contains("no player found to handle locator: https://radio.example/live"));

        let active = queue.current_player().expect("active");
        assert_eq!(crate::engine::lock(&active).name(), "local");
    }

    #[test]
    fn next_onto_unplayable_track_fails_before_stopping() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(mixed_tracks()).expect("tracks");
        queue.start().expect("start");

        let err = queue.next().expect_err("no engine for radio");
        assert!(matches!(err, Error::NoPlayerFound(_)));
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Prepared);
    }

    #[test]
    fn degraded_set_index_onto_unplayable_track_stays_put() {
        let (mut queue, _, engine) = controller_with(ErrorPolicy::Degrade, Verbosity::Basic);
        queue.set_track_list(mixed_tracks()).expect("tracks");
        queue.start().expect("start");
        queue.play().expect("play");

        queue.set_index(1).expect("degraded");
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.state(), QueueState::Playing);
        assert_eq!(engine_state(&engine), EngineState::Playing);
    }

    #[test]
    fn degraded_track_list_without_engine_keeps_previous_list() {
        let (mut queue, _, _) = controller_with(ErrorPolicy::Degrade, Verbosity::Basic);
        queue.set_track_list(songs(2)).expect("tracks");

        queue
            .set_track_list(vec![Track::new("radio", "dj", "https://radio.example/live")])
            .expect("degraded");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get_current().map(|t| t.title.as_str()), Some("song_0"));
    }

    #[test]
    fn degraded_stop_without_engine_keeps_state() {
        let sink = Arc::new(MemorySink::new());
        let config = QueueConfig {
            error_policy: ErrorPolicy::Degrade,
            ..QueueConfig::default()
        };
        let mut queue = QueueController::with_sink(&config, sink.clone());
        queue.set_track_list(Vec::new()).expect("empty");

        queue.stop().expect("degraded");
        queue.pause().expect("degraded");
        assert_eq!(queue.state(), QueueState::NotEmpty);
        assert!(sink.contains("no current player"));
    }

    #[test]
    fn prepare_pre_buffers_without_starting() {
        let (mut queue, sink, engine) = controller();
        queue.set_track_list(songs(2)).expect("tracks");

        queue.prepare().expect("prepare");
        assert_eq!(queue.state(), QueueState::Starting);
        assert_eq!(engine_state(&engine), EngineState::Paused);
        assert!(sink.contains("The queue event listener has not been set."));

        queue.play().expect("play");
        assert_eq!(queue.state(), QueueState::Playing);
    }

    #[test]
    fn listener_sees_state_and_media_type_changes() {
        let (mut queue, _, _) = controller();
        let (tx, rx) = mpsc::channel();
        queue.set_listener(tx).expect("listener");

        let tracks = vec![
            Track::new("a", "x", "file:///a.mp3").with_media_type(MediaType::Audio),
            Track::new("b", "x", "file:///b.mp3").with_media_type(MediaType::Audio),
            Track::new("c", "x", "file:///c.mp4").with_media_type(MediaType::Video),
        ];
        queue.set_track_list(tracks).expect("tracks");
        queue.set_looping(Loop::List).expect("loop");
        queue.next().expect("b");
        queue.next().expect("c");

        let events: Vec<QueueEvent> = rx.try_iter().collect();
        let media: Vec<MediaType> = events
            .iter()
            .filter_map(|event| match event {
                QueueEvent::MediaTypeChanged(media_type) => Some(*media_type),
                QueueEvent::StateChanged(_) => None,
            })
            .collect();
        assert_eq!(media, vec![MediaType::Audio, MediaType::Video]);
        assert_eq!(events[1], QueueEvent::StateChanged(QueueState::NotEmpty));
        assert_eq!(queue.media_type(), MediaType::Video);
    }

    #[test]
    fn missing_listener_is_a_warning_only() {
        let (mut queue, sink, _) = controller();
        queue.set_track_list(songs(1)).expect("tracks");

        assert_eq!(queue.state(), QueueState::NotEmpty);
        assert!(sink.count_at(Severity::Warn) >= 1);
        assert!(sink.contains("Queue event listener was not set."));
    }

    #[test]
    fn engine_events_drive_the_queue() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(3)).expect("tracks");
        queue.start().expect("start");

        queue
            .handle_engine_event(EngineState::Prepared)
            .expect("prepared");
        assert_eq!(queue.state(), QueueState::Playing);
        assert_eq!(engine_state(&engine), EngineState::Playing);

        engine.lock().expect("lock").notify_if_track_ended();
        queue
            .handle_engine_event(EngineState::TrackEnded)
            .expect("ended");
        assert_eq!(queue.index(), 1);
        assert_eq!(queue.state(), QueueState::Starting);
    }

    #[test]
    fn playing_acknowledgment_completes_start() {
        let (mut queue, _, _) = controller();
        queue.set_track_list(songs(1)).expect("tracks");
        queue.prepare().expect("prepare");

        queue
            .handle_engine_event(EngineState::Playing)
            .expect("ack");
        assert_eq!(queue.state(), QueueState::Playing);

        queue
            .handle_engine_event(EngineState::Paused)
            .expect("ignored");
        assert_eq!(queue.state(), QueueState::Playing);
    }

    #[test]
    fn release_is_terminal() {
        let (mut queue, _, engine) = controller();
        queue.set_track_list(songs(2)).expect("tracks");
        queue.release().expect("release");

        assert_eq!(queue.state(), QueueState::Released);
        assert_eq!(engine_state(&engine), EngineState::Released);
        assert!(queue.registry().is_empty());
        assert!(matches!(queue.next(), Err(Error::Released)));
        assert!(matches!(queue.release(), Err(Error::Released)));
        assert!(matches!(queue.set_track_list(songs(1)), Err(Error::Released)));
        queue
            .handle_engine_event(EngineState::TrackEnded)
            .expect("late event ignored");
    }

    #[test]
    fn release_degrades_later_calls_to_no_ops() {
        let (mut queue, sink, _) = controller_with(ErrorPolicy::Degrade, Verbosity::Basic);
        queue.set_track_list(songs(2)).expect("tracks");
        queue.release().expect("release");

        queue.set_index(1).expect("degraded");
        assert_eq!(queue.state(), QueueState::Released);
        assert_eq!(queue.index(), 0);
        assert!(sink.contains("the queue has been released"));
    }

    #[test]
    fn duplicate_identical_tracks_stay_distinct() {
        let (mut queue, _, _) = controller();
        let track = Track::new("same", "same", "file:///same.mp3");
        queue
            .set_track_list(vec![track.clone(), track.clone(), track])
            .expect("tracks");
        queue.set_index(2).expect("index");
        queue.set_shuffling(true, false).expect("shuffle");
        queue.set_shuffling(false, false).expect("unshuffle");
        assert_eq!(queue.index(), 2);
    }

    #[test]
    fn queue_tier_logs_state_changes_engine_tier_does_not() {
        let (mut queue, sink, _) = controller_with(ErrorPolicy::Raise, Verbosity::Queue);
        queue.set_track_list(songs(1)).expect("tracks");
        assert!(sink.contains("Queue state changed to: not empty"));

        let (mut queue, sink, _) = controller_with(ErrorPolicy::Raise, Verbosity::Engine);
        queue.set_track_list(songs(1)).expect("tracks");
        queue.start().expect("start");
        assert!(!sink.contains("Queue state changed"));
        assert!(!sink.contains("START"));
        assert!(sink.contains("Current player is now: local"));
    }

    proptest::proptest! {
        #[test]
        fn shuffle_round_trip_restores_original(len in 1usize..40, pick in 0usize..40) {
            let (mut queue, _, _) = controller_with(ErrorPolicy::Raise, Verbosity::None);
            queue.set_track_list(songs(len)).expect("tracks");
            let k = pick % len;
            queue.set_index(k).expect("index");
            let before = queue.get_current().cloned();

            queue.set_shuffling(true, false).expect("shuffle");
            prop_assert_eq!(queue.get_current().cloned(), before.clone());
            queue.set_shuffling(false, true).expect("unshuffle");

            prop_assert_eq!(queue.index(), k);
            prop_assert_eq!(queue.get_current().cloned(), before);
            prop_assert!(queue.working_list().into_iter().eq(queue.original_list().iter()));
        }

        #[test]
        fn index_invariant_holds_after_random_ops(
            len in 1usize..12,
            ops in proptest::collection::vec((0u8..10, 0usize..12), 1..150),
        ) {
            let (mut queue, _, _) = controller_with(ErrorPolicy::Degrade, Verbosity::None);
            let tracks = songs(len);
            queue.set_track_list(tracks.clone()).expect("tracks");

            for (op, arg) in ops {
                let _ = match op {
                    0 => queue.next(),
                    1 => queue.previous(),
                    2 => queue.set_index(arg),
                    3 => queue.set_shuffling(true, arg % 2 == 0),
                    4 => queue.set_shuffling(false, false),
                    5 => queue.set_looping(match arg % 3 {
                        0 => Loop::None,
                        1 => Loop::List,
                        _ => Loop::Single,
                    }),
                    6 => queue.play(),
                    7 => queue.pause(),
                    8 => queue.stop(),
                    _ => queue.start(),
                };

                let working = queue.working_list();
                prop_assert!(queue.index() < working.len());
                prop_assert_eq!(queue.get_current(), Some(working[queue.index()]));
                prop_assert_eq!(queue.original_list(), tracks.as_slice());
            }
        }
    }
}
