//! Test doubles for the engine.
//!
//! - [`ScriptedInput`]: an [`InputSource`] fed from a pre-written timeline
//!   of key-presses and hook changes. Offsets are measured against the
//!   tokio clock, so tests under `start_paused` run instantly and
//!   deterministically.
//! - [`RecordingPresenter`]: a [`Presenter`] that records every call for
//!   later assertions and can simulate scene audio of a fixed length.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::keypad::InputSource;
use crate::presenter::Presenter;

/// A scripted input source.
///
/// Build the timeline with [`press`], [`press_each`], and [`hook`], with
/// offsets relative to construction time. Entries must be added in
/// chronological order. The hook starts lifted.
///
/// [`press`]: ScriptedInput::press
/// [`press_each`]: ScriptedInput::press_each
/// [`hook`]: ScriptedInput::hook
pub struct ScriptedInput {
    start: Instant,
    symbols: VecDeque<(Duration, char)>,
    hook_changes: Vec<(Duration, bool)>,
}

impl ScriptedInput {
    /// An empty script: hook lifted, no symbols.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            symbols: VecDeque::new(),
            hook_changes: Vec::new(),
        }
    }

    /// Press one key at the given offset.
    pub fn press(mut self, at: Duration, symbol: char) -> Self {
        self.symbols.push_back((at, symbol));
        self
    }

    /// Press each character of `symbols` starting at `at`, one every `gap`.
    pub fn press_each(mut self, at: Duration, gap: Duration, symbols: &str) -> Self {
        for (i, symbol) in symbols.chars().enumerate() {
            self.symbols.push_back((at + gap * i as u32, symbol));
        }
        self
    }

    /// Change the hook state at the given offset.
    pub fn hook(mut self, at: Duration, lifted: bool) -> Self {
        self.hook_changes.push((at, lifted));
        self
    }

    fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.start)
    }
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for ScriptedInput {
    fn poll_symbol(&mut self) -> io::Result<Option<char>> {
        let now = self.elapsed();
        if let Some(&(at, symbol)) = self.symbols.front() {
            if at <= now {
                self.symbols.pop_front();
                return Ok(Some(symbol));
            }
        }
        Ok(None)
    }

    fn is_hook_lifted(&self) -> bool {
        let now = self.elapsed();
        self.hook_changes
            .iter()
            .take_while(|(at, _)| *at <= now)
            .last()
            .map(|(_, lifted)| *lifted)
            .unwrap_or(true)
    }
}

/// One recorded presenter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    Displayed(String),
    AudioStarted(String),
    AudioStopped,
    ItemObtained(String),
    KeyAccepted(char),
}

/// A presenter that records everything it is told.
///
/// Scene audio is simulated: `play_scene_audio` marks audio as busy for
/// the configured length (zero by default, so audio finishes instantly).
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
    audio_until: Mutex<Option<Instant>>,
    audio_length: Duration,
}

impl RecordingPresenter {
    /// A recorder whose simulated audio finishes instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate scene audio taking this long to play out.
    pub fn with_audio_length(mut self, length: Duration) -> Self {
        self.audio_length = length;
        self
    }

    /// Everything recorded so far, in order.
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().unwrap().clone()
    }

    /// The displayed texts, in order.
    pub fn displayed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PresenterEvent::Displayed(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// The item-obtained notifications, in order.
    pub fn items_obtained(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PresenterEvent::ItemObtained(item) => Some(item),
                _ => None,
            })
            .collect()
    }

    /// The accepted keys, in order.
    pub fn keys_accepted(&self) -> Vec<char> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PresenterEvent::KeyAccepted(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: PresenterEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn display(&self, text: &str, _options: &[(u8, &str)]) {
        self.record(PresenterEvent::Displayed(text.to_string()));
    }

    fn play_scene_audio(&self, scene_id: &str) {
        self.record(PresenterEvent::AudioStarted(scene_id.to_string()));
        *self.audio_until.lock().unwrap() = Some(Instant::now() + self.audio_length);
    }

    fn stop_audio(&self) {
        self.record(PresenterEvent::AudioStopped);
        *self.audio_until.lock().unwrap() = None;
    }

    fn is_audio_playing(&self) -> bool {
        matches!(*self.audio_until.lock().unwrap(), Some(until) if Instant::now() < until)
    }

    fn notify_item_obtained(&self, item: &str) {
        self.record(PresenterEvent::ItemObtained(item.to_string()));
    }

    fn notify_key_accepted(&self, key: char) {
        self.record(PresenterEvent::KeyAccepted(key));
    }
}
