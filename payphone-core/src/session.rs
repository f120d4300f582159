//! The session engine: one hand-lift is one session.
//!
//! [`Engine`] owns the immutable scene graph, the input stack, and the
//! presenter, and drives the turn cycle: enter a scene, check its gate,
//! grant its items, display it, wait for a token, resolve, transition.
//! All session state lives in [`Session`] and dies with the hang-up;
//! nothing persists between lifts.

use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::inventory::Inventory;
use crate::keypad::{CodeEntry, InputSource, KeypadReader, Token, TokenWait, POLL_INTERVAL};
use crate::presenter::Presenter;
use crate::scene::{Outcome, Scene, SceneGraph, SceneId};

/// Errors from building an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scene graph is empty")]
    EmptyGraph,

    #[error("scene graph has no scene named {0:?}")]
    MissingScene(String),
}

/// What a lone `#` does between scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashCommand {
    /// Replay the current scene's audio.
    #[default]
    ReplayAudio,
    /// Read the inventory back to the player.
    ReadInventory,
}

/// Configuration for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scene every session starts in.
    pub start_scene: SceneId,
    /// Scene used to recover from dangling references and failed gates
    /// with no previous scene.
    pub home_scene: SceneId,
    /// Bounce-suppression window for the keypad.
    pub min_key_interval: Duration,
    /// How long a blocked-choice message hangs before re-prompting.
    pub blocked_pause: Duration,
    /// What a lone `#` does.
    pub hash_command: HashCommand,
}

impl EngineConfig {
    /// Create a config starting (and homing) at the given scene.
    pub fn new(start_scene: impl Into<SceneId>) -> Self {
        let start_scene = start_scene.into();
        Self {
            home_scene: start_scene.clone(),
            start_scene,
            min_key_interval: Duration::from_millis(250),
            blocked_pause: Duration::from_millis(1200),
            hash_command: HashCommand::default(),
        }
    }

    /// Set the home scene used for recovery.
    pub fn with_home_scene(mut self, scene: impl Into<SceneId>) -> Self {
        self.home_scene = scene.into();
        self
    }

    /// Set the keypad bounce-suppression window.
    pub fn with_min_key_interval(mut self, interval: Duration) -> Self {
        self.min_key_interval = interval;
        self
    }

    /// Set the pause after a blocked-choice message.
    pub fn with_blocked_pause(mut self, pause: Duration) -> Self {
        self.blocked_pause = pause;
        self
    }

    /// Set what a lone `#` does.
    pub fn with_hash_command(mut self, command: HashCommand) -> Self {
        self.hash_command = command;
        self
    }
}

/// Mutable state for one hand-lift.
#[derive(Debug, Clone)]
pub struct Session {
    pub current_scene: SceneId,
    pub previous_scene: Option<SceneId>,
    pub inventory: Inventory,
}

impl Session {
    /// A fresh session positioned at the start scene with nothing held.
    pub fn new(start_scene: SceneId) -> Self {
        Self {
            current_scene: start_scene,
            previous_scene: None,
            inventory: Inventory::new(),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Handset returned to the cradle, or the hang-up key arrived.
    HungUp,
    /// The graph offered no scene the session could stand in.
    NoEntryScene,
}

/// The session engine.
///
/// Generic over the input source and the presenter so the same loop runs
/// against GPIO hardware, a development console, or a test script.
pub struct Engine<S, P> {
    graph: SceneGraph,
    config: EngineConfig,
    input: CodeEntry<S>,
    presenter: P,
}

impl<S: InputSource, P: Presenter> Engine<S, P> {
    /// Build an engine over a loaded graph.
    ///
    /// The start and home scenes must exist; everything else is checked at
    /// resolution time and recovers to the home scene.
    pub fn new(
        graph: SceneGraph,
        config: EngineConfig,
        source: S,
        presenter: P,
    ) -> Result<Self, EngineError> {
        if graph.is_empty() {
            return Err(EngineError::EmptyGraph);
        }
        for scene in [&config.start_scene, &config.home_scene] {
            if !graph.contains(scene) {
                return Err(EngineError::MissingScene(scene.clone()));
            }
        }
        let reader = KeypadReader::new(source, config.min_key_interval);
        Ok(Self {
            graph,
            config,
            input: CodeEntry::new(reader),
            presenter,
        })
    }

    /// The loaded scene graph.
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// The presenter, for inspection.
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Process loop: wait for a lift, run a session, wait for the handset
    /// to settle back on the cradle, repeat. Never returns; a failed
    /// session only ends that session.
    pub async fn run(&mut self) {
        loop {
            self.wait_for_hook(true).await;
            info!("handset lifted");
            let end = self.run_session().await;
            debug!(?end, "session over, awaiting cradle");
            self.wait_for_hook(false).await;
            info!("handset back on the cradle");
        }
    }

    /// Run one session: the handset is assumed lifted. Returns how the
    /// session ended; the engine is ready for the next lift afterwards.
    pub async fn run_session(&mut self) -> SessionEnd {
        let mut session = Session::new(self.config.start_scene.clone());
        info!(start = %session.current_scene, "session started");
        let end = self.drive(&mut session).await;
        self.presenter.stop_audio();
        info!(?end, items = session.inventory.len(), "session ended");
        end
    }

    async fn wait_for_hook(&self, lifted: bool) {
        while self.input.is_hook_lifted() != lifted {
            time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn drive(&mut self, session: &mut Session) -> SessionEnd {
        'enter: loop {
            let scene = match self.graph.get(&session.current_scene) {
                Some(scene) => scene.clone(),
                None => {
                    warn!(scene = %session.current_scene, "scene missing from graph, going home");
                    if session.current_scene == self.config.home_scene {
                        return SessionEnd::NoEntryScene;
                    }
                    session.current_scene = self.config.home_scene.clone();
                    continue;
                }
            };

            // Gate: the scene is not entered at all without its items. No
            // text, no grants.
            let missing = session.inventory.missing(&scene.items_required);
            if !missing.is_empty() {
                debug!(scene = %scene.id, ?missing, "entry gate blocked");
                self.presenter
                    .display(&format!("You need {} to go there.", missing.join(", ")), &[]);
                let back = session
                    .previous_scene
                    .clone()
                    .unwrap_or_else(|| self.config.home_scene.clone());
                if back == session.current_scene {
                    warn!(scene = %scene.id, "gate blocks its own recovery scene");
                    return SessionEnd::NoEntryScene;
                }
                time::sleep(self.config.blocked_pause).await;
                session.current_scene = back;
                continue;
            }

            // Grants happen before this scene's input is awaited, and only
            // notify for items not already held.
            for item in &scene.items_granted {
                if session.inventory.add(item.clone()) {
                    debug!(scene = %scene.id, item = %item, "item obtained");
                    self.presenter.notify_item_obtained(item);
                }
            }

            self.presenter.play_scene_audio(&scene.id);

            loop {
                self.presenter.display(&scene.text, &scene.options());

                let token = match self.await_turn_input(&scene).await {
                    token if token.is_hang_up() => return SessionEnd::HungUp,
                    token => token,
                };

                // Lone # is a command, not a choice: act, then show the
                // same scene again without re-granting.
                if token == Token::Key('#') {
                    self.handle_hash(session, &scene);
                    continue;
                }

                match scene.resolve(&token, &session.inventory) {
                    Outcome::Advance(target) => {
                        let target = if self.graph.contains(&target) {
                            target
                        } else {
                            warn!(from = %scene.id, to = %target, "dangling scene reference, going home");
                            self.config.home_scene.clone()
                        };
                        if target != scene.id {
                            debug!(from = %scene.id, to = %target, "scene change");
                            self.presenter.stop_audio();
                        }
                        session.previous_scene = Some(scene.id.clone());
                        session.current_scene = target;
                        continue 'enter;
                    }
                    Outcome::Blocked(message) => {
                        debug!(scene = %scene.id, %message, "choice blocked");
                        self.presenter.display(&message, &[]);
                        time::sleep(self.config.blocked_pause).await;
                    }
                    Outcome::Invalid => {
                        self.presenter
                            .display("That is not one of the choices.", &[]);
                    }
                }
            }
        }
    }

    /// Wait for this turn's token, honoring the scene's timeout policy.
    ///
    /// At most one of a real token, a hang-up, or a timeout comes back:
    /// the deadline is checked inside the same poll loop that reads keys,
    /// so there is no racing second task to double-resolve a turn.
    async fn await_turn_input(&mut self, scene: &Scene) -> Token {
        let Self {
            input, presenter, ..
        } = self;
        let mut on_accept = |key| presenter.notify_key_accepted(key);

        let deadline = match &scene.timeout {
            Some(policy) => {
                if policy.wait_for_audio {
                    // The clock starts when the audio ends; only a hang-up
                    // bounds this wait.
                    while presenter.is_audio_playing() {
                        if !input.is_hook_lifted() {
                            return Token::HangUp;
                        }
                        time::sleep(POLL_INTERVAL).await;
                    }
                }
                Some(Instant::now() + policy.duration)
            }
            None => None,
        };

        match input.next_token(deadline, &mut on_accept).await {
            TokenWait::Token(token) => token,
            TokenWait::HookDown => Token::HangUp,
            TokenWait::TimedOut => Token::Timeout,
        }
    }

    fn handle_hash(&self, session: &Session, scene: &Scene) {
        match self.config.hash_command {
            HashCommand::ReplayAudio => {
                debug!(scene = %scene.id, "replaying scene audio");
                self.presenter.play_scene_audio(&scene.id);
            }
            HashCommand::ReadInventory => {
                let line = if session.inventory.is_empty() {
                    "You are carrying nothing.".to_string()
                } else {
                    let items: Vec<&str> = session.inventory.items().collect();
                    format!("You are carrying: {}.", items.join(", "))
                };
                self.presenter.display(&line, &[]);
            }
        }
    }
}
