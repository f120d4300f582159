//! Scene-file loading: YAML front matter plus display text.
//!
//! A scene file is the authoring format of the installation: a YAML block
//! between `---` lines, then the text read to the player.
//!
//! ```text
//! ---
//! id: hall
//! title: The Hall
//! connections:
//!   - label: Try the vault door
//!     target: vault_door
//!   - label: Call somebody
//!     target: call_box
//!     redirect: { unless_item: phone_number, to: no_numbers }
//! hidden_connections:
//!   "451": vault
//!   timeout:
//!     paths:
//!       - { items: lantern, target: lit_hall }
//!     default: dark_hall
//! items_granted: [map]
//! timeout: { duration_secs: 12, wait_for_audio: true }
//! ---
//! Doors everywhere. The dial tone hums.
//! ```
//!
//! Loading is tolerant: a malformed file or entry is dropped with a
//! warning and the rest of the graph still loads. The raw YAML shapes
//! (bare string vs map, list vs keyed map) are decided here, once, into
//! the typed model.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::scene::{
    ChoiceEdge, ConditionalTarget, EdgeRedirect, HiddenTarget, ItemRequirement, Scene,
    SceneGraph, TimeoutPolicy,
};

/// Errors from loading scene content.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: missing `---` front matter delimiters")]
    MissingFrontMatter { path: PathBuf },

    #[error("{path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

// ============================================================================
// Raw document shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SceneDoc {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    connections: ConnectionsDoc,
    #[serde(default)]
    hidden_connections: BTreeMap<String, HiddenDoc>,
    #[serde(default)]
    items_granted: Vec<String>,
    #[serde(default)]
    items_required: Vec<String>,
    #[serde(default)]
    timeout: Option<TimeoutDoc>,
}

/// Connections are either an ordered list (position = digit, starting at 1)
/// or a map keyed by the digit itself.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConnectionsDoc {
    List(Vec<EdgeDoc>),
    Map(BTreeMap<u8, EdgeDoc>),
}

impl Default for ConnectionsDoc {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct EdgeDoc {
    #[serde(default)]
    label: String,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    required_items: Vec<String>,
    #[serde(default)]
    fallback: Option<String>,
    #[serde(default)]
    redirect: Option<RedirectDoc>,
    #[serde(default)]
    paths: Option<Vec<PathDoc>>,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RedirectDoc {
    unless_item: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct PathDoc {
    items: ItemsDoc,
    target: String,
}

/// One item name (commas allowed: `"crowbar,gloves"`) or a list of names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemsDoc {
    One(String),
    Many(Vec<String>),
}

/// A hidden connection is either a bare target id or a conditional table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HiddenDoc {
    Scene(String),
    Conditional(ConditionalDoc),
}

#[derive(Debug, Deserialize)]
struct ConditionalDoc {
    #[serde(default)]
    paths: Vec<PathDoc>,
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeoutDoc {
    duration_secs: f64,
    #[serde(default)]
    wait_for_audio: bool,
}

// ============================================================================
// Parsing and compilation
// ============================================================================

/// Parse one scene file's contents into a scene.
pub fn parse_scene(path: &Path, contents: &str) -> Result<Scene, ContentError> {
    let (front, body) =
        split_front_matter(contents).ok_or_else(|| ContentError::MissingFrontMatter {
            path: path.to_path_buf(),
        })?;
    let doc: SceneDoc = serde_yaml::from_str(front).map_err(|source| ContentError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(compile_scene(doc, body.trim()))
}

fn split_front_matter(contents: &str) -> Option<(&str, &str)> {
    let rest = contents.trim_start().strip_prefix("---")?;
    rest.split_once("\n---")
}

fn compile_scene(doc: SceneDoc, text: &str) -> Scene {
    let mut scene = Scene::new(doc.id);
    scene.title = doc.title;
    scene.text = text.to_string();
    scene.items_granted = doc.items_granted;
    scene.items_required = doc.items_required;

    match doc.connections {
        ConnectionsDoc::List(edges) => {
            for (i, edge) in edges.into_iter().enumerate() {
                let digit = i as u8 + 1;
                insert_edge(&mut scene, digit, edge);
            }
        }
        ConnectionsDoc::Map(edges) => {
            for (digit, edge) in edges {
                insert_edge(&mut scene, digit, edge);
            }
        }
    }

    for (key, hidden) in doc.hidden_connections {
        let target = match hidden {
            HiddenDoc::Scene(id) => HiddenTarget::Scene(id),
            HiddenDoc::Conditional(cond) => {
                HiddenTarget::Conditional(compile_paths(cond.paths, cond.default))
            }
        };
        scene.hidden.insert(key, target);
    }

    if let Some(timeout) = doc.timeout {
        if timeout.duration_secs.is_finite() && timeout.duration_secs > 0.0 {
            scene.timeout = Some(TimeoutPolicy {
                duration: std::time::Duration::from_secs_f64(timeout.duration_secs),
                wait_for_audio: timeout.wait_for_audio,
            });
        } else {
            warn!(scene = %scene.id, secs = timeout.duration_secs, "unusable timeout duration, dropped");
        }
    }

    scene
}

fn insert_edge(scene: &mut Scene, digit: u8, doc: EdgeDoc) {
    if digit > 9 {
        warn!(scene = %scene.id, digit, "connection digit not on the keypad, dropped");
        return;
    }
    let Some(edge) = compile_edge(&scene.id, digit, doc) else {
        return;
    };
    if scene.connections.insert(digit, edge).is_some() {
        warn!(scene = %scene.id, digit, "duplicate connection digit, last one kept");
    }
}

fn compile_edge(scene_id: &str, digit: u8, doc: EdgeDoc) -> Option<ChoiceEdge> {
    if let Some(paths) = doc.paths {
        if doc.target.is_some() {
            warn!(scene = %scene_id, digit, "connection has both target and paths, using paths");
        }
        return Some(ChoiceEdge::Conditional {
            label: doc.label,
            paths: compile_paths(paths, doc.default),
        });
    }
    if let Some(target) = doc.target {
        return Some(ChoiceEdge::Direct {
            label: doc.label,
            target,
            required_items: doc.required_items,
            fallback: doc.fallback,
            redirect: doc.redirect.map(|r| EdgeRedirect {
                unless_item: r.unless_item,
                to: r.to,
            }),
        });
    }
    warn!(scene = %scene_id, digit, "connection has neither target nor paths, dropped");
    None
}

fn compile_paths(paths: Vec<PathDoc>, default: Option<String>) -> ConditionalTarget {
    ConditionalTarget {
        paths: paths
            .into_iter()
            .map(|path| {
                let requirement = match path.items {
                    ItemsDoc::One(names) => ItemRequirement::parse(&names),
                    ItemsDoc::Many(items) => ItemRequirement::new(items),
                };
                (requirement, path.target)
            })
            .collect(),
        default,
    }
}

// ============================================================================
// Directory loading
// ============================================================================

const SCENE_EXTENSIONS: [&str; 3] = ["txt", "yaml", "yml"];

/// Walk `root` (subdirectories included) and load every scene file into a
/// graph.
///
/// Only an unreadable root is an error; a malformed file is skipped with a
/// warning and a duplicate id is overwritten by whichever file loads last.
pub async fn load_scene_dir(root: impl AsRef<Path>) -> Result<SceneGraph, ContentError> {
    let root = root.as_ref();
    let mut graph = SceneGraph::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if dir == root => return Err(err.into()),
            Err(err) => {
                warn!(dir = %dir.display(), "unreadable scene directory, skipped: {err}");
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(dir = %dir.display(), "directory walk interrupted: {err}");
                    break;
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {
                    pending.push(path);
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(file = %path.display(), "unreadable entry, skipped: {err}");
                    continue;
                }
            }
            let is_scene_file = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SCENE_EXTENSIONS.contains(&ext));
            if !is_scene_file {
                continue;
            }
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(file = %path.display(), "unreadable scene file, skipped: {err}");
                    continue;
                }
            };
            match parse_scene(&path, &contents) {
                Ok(scene) => {
                    let id = scene.id.clone();
                    if graph.insert(scene).is_some() {
                        warn!(file = %path.display(), id = %id, "duplicate scene id, last file wins");
                    }
                }
                Err(err) => warn!("bad scene file, skipped: {err}"),
            }
        }
    }

    info!(scenes = graph.len(), root = %root.display(), "scene graph loaded");
    Ok(graph)
}
