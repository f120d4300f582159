//! Session engine for a dial-to-play phone adventure.
//!
//! A player lifts the handset of an old payphone, listens, and dials. This
//! crate provides:
//! - The scene graph data model and choice resolution (numbered choices,
//!   secret `*…#` codes, timeouts, item gates)
//! - The debounced keypad reader and code-entry state machine
//! - The session loop that turns key-presses into scene transitions
//! - Scene-file loading from YAML front-matter text files
//!
//! Hardware concerns stay outside: anything that can produce keypad
//! symbols implements [`InputSource`], and anything that can speak to the
//! player implements [`Presenter`].
//!
//! # Quick Start
//!
//! ```ignore
//! use payphone_core::{content, Engine, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graph = content::load_scene_dir("scenes").await?;
//!     let config = EngineConfig::new("intro").with_home_scene("hub");
//!
//!     let mut engine = Engine::new(graph, config, my_input, my_presenter)?;
//!     engine.run().await;
//!     Ok(())
//! }
//! ```

pub mod content;
pub mod inventory;
pub mod keypad;
pub mod presenter;
pub mod scene;
pub mod session;
pub mod testing;

// Primary public API
pub use content::{load_scene_dir, parse_scene, ContentError};
pub use inventory::Inventory;
pub use keypad::{CodeEntry, InputSource, KeypadReader, KeyWait, Token, TokenWait};
pub use presenter::Presenter;
pub use scene::{
    ChoiceEdge, ConditionalTarget, EdgeRedirect, HiddenTarget, ItemRequirement, Outcome, Scene,
    SceneGraph, SceneId, TimeoutPolicy,
};
pub use session::{Engine, EngineConfig, EngineError, HashCommand, Session, SessionEnd};
