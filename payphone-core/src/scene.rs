//! Scene graph data model and choice resolution.
//!
//! A scene is one node of the branching narrative: the text read to the
//! player, the numbered choices on the keypad, and the hidden connections
//! reachable by secret codes, timeouts, or as a catch-all default. The graph
//! is immutable once loaded; everything that changes during play lives in
//! the session.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::inventory::Inventory;
use crate::keypad::Token;

/// Opaque scene identifier, unique within a graph.
pub type SceneId = String;

/// Hidden-connection key matched when a timed turn expires.
pub const TIMEOUT_TOKEN: &str = "timeout";

/// Hidden-connection key matched when nothing else does.
pub const DEFAULT_TOKEN: &str = "default";

/// A set of item names that must all be held for a path to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRequirement {
    items: Vec<String>,
}

impl ItemRequirement {
    /// Build a requirement from item names.
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    /// Parse an author-facing requirement: one item name, or several
    /// separated by commas (`"crowbar,gloves"`).
    pub fn parse(names: &str) -> Self {
        Self {
            items: names
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Whether every required item is in the inventory.
    pub fn satisfied_by(&self, inventory: &Inventory) -> bool {
        self.items.iter().all(|item| inventory.has(item))
    }

    /// Number of items required. Used to rank how specific a match is.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the requirement names no items (always satisfied).
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The required item names.
    pub fn items(&self) -> &[String] {
        &self.items
    }
}

/// An ordered routing table: `(requirement, target)` pairs plus an optional
/// default taken when no pair is satisfied.
#[derive(Debug, Clone, Default)]
pub struct ConditionalTarget {
    pub paths: Vec<(ItemRequirement, SceneId)>,
    pub default: Option<SceneId>,
}

impl ConditionalTarget {
    /// The most specific satisfied path: among the pairs whose requirement
    /// is fully held, the one requiring the most items wins; declaration
    /// order breaks ties.
    pub fn best_match(&self, inventory: &Inventory) -> Option<&SceneId> {
        let mut best: Option<(&ItemRequirement, &SceneId)> = None;
        for (req, target) in &self.paths {
            if !req.satisfied_by(inventory) {
                continue;
            }
            match best {
                Some((held, _)) if held.len() >= req.len() => {}
                _ => best = Some((req, target)),
            }
        }
        best.map(|(_, target)| target)
    }

    /// The first satisfied path in declaration order.
    pub fn first_match(&self, inventory: &Inventory) -> Option<&SceneId> {
        self.paths
            .iter()
            .find(|(req, _)| req.satisfied_by(inventory))
            .map(|(_, target)| target)
    }
}

/// A guard evaluated before an edge's normal requirement check: players who
/// do not hold `unless_item` are routed to `to` instead of the edge target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRedirect {
    /// Holding this item disarms the redirect.
    pub unless_item: String,
    /// Where the player goes when the redirect fires.
    pub to: SceneId,
}

/// One numbered choice out of a scene.
#[derive(Debug, Clone)]
pub enum ChoiceEdge {
    /// A fixed target, optionally gated on items, with an optional
    /// fallback scene when the gate fails.
    Direct {
        label: String,
        target: SceneId,
        required_items: Vec<String>,
        fallback: Option<SceneId>,
        redirect: Option<EdgeRedirect>,
    },
    /// A target chosen by what the player is carrying.
    Conditional {
        label: String,
        paths: ConditionalTarget,
    },
}

impl ChoiceEdge {
    /// A plain edge straight to `target`.
    pub fn direct(label: impl Into<String>, target: impl Into<SceneId>) -> Self {
        Self::Direct {
            label: label.into(),
            target: target.into(),
            required_items: Vec::new(),
            fallback: None,
            redirect: None,
        }
    }

    /// The label shown next to the choice number.
    pub fn label(&self) -> &str {
        match self {
            Self::Direct { label, .. } | Self::Conditional { label, .. } => label,
        }
    }

    fn resolve(&self, inventory: &Inventory) -> Outcome {
        match self {
            Self::Direct {
                target,
                required_items,
                fallback,
                redirect,
                ..
            } => {
                if let Some(redirect) = redirect {
                    if !inventory.has(&redirect.unless_item) {
                        return Outcome::Advance(redirect.to.clone());
                    }
                }
                let missing = inventory.missing(required_items);
                if missing.is_empty() {
                    Outcome::Advance(target.clone())
                } else if let Some(fallback) = fallback {
                    Outcome::Advance(fallback.clone())
                } else {
                    Outcome::Blocked(format!("need: {}", missing.join(", ")))
                }
            }
            Self::Conditional { paths, .. } => match paths.first_match(inventory) {
                Some(target) => Outcome::Advance(target.clone()),
                None => match &paths.default {
                    Some(target) => Outcome::Advance(target.clone()),
                    None => Outcome::Blocked("wrong item for this action".to_string()),
                },
            },
        }
    }
}

/// Where a hidden connection leads.
#[derive(Debug, Clone)]
pub enum HiddenTarget {
    Scene(SceneId),
    Conditional(ConditionalTarget),
}

impl HiddenTarget {
    fn resolve(&self, inventory: &Inventory) -> Outcome {
        match self {
            Self::Scene(target) => Outcome::Advance(target.clone()),
            Self::Conditional(cond) => match cond.best_match(inventory) {
                Some(target) => Outcome::Advance(target.clone()),
                None => match &cond.default {
                    Some(target) => Outcome::Advance(target.clone()),
                    None => Outcome::Blocked("need the right items".to_string()),
                },
            },
        }
    }
}

/// Deadline policy for a scene that expects a timely answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// How long the player has once the clock starts.
    pub duration: Duration,
    /// Whether the clock only starts after scene audio finishes.
    pub wait_for_audio: bool,
}

/// What resolving a token against a scene produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Move to this scene.
    Advance(SceneId),
    /// A rule matched but the player cannot take it; tell them why.
    Blocked(String),
    /// Nothing matched; re-prompt without changing state.
    Invalid,
}

/// One node of the narrative graph.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub id: SceneId,
    pub title: String,
    /// Display text read to the player on entry.
    pub text: String,
    /// Numbered choices, keyed by the digit the player presses.
    pub connections: BTreeMap<u8, ChoiceEdge>,
    /// Connections keyed by secret codes or the `timeout`/`default`
    /// sentinels.
    pub hidden: HashMap<String, HiddenTarget>,
    /// Items granted automatically when the scene is entered.
    pub items_granted: Vec<String>,
    /// Items the player must hold to enter the scene at all.
    pub items_required: Vec<String>,
    /// When set, the turn races this deadline against the keypad.
    pub timeout: Option<TimeoutPolicy>,
}

impl Scene {
    /// Create an empty scene with the given id.
    pub fn new(id: impl Into<SceneId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the display text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Add a numbered choice.
    pub fn with_connection(mut self, digit: u8, edge: ChoiceEdge) -> Self {
        self.connections.insert(digit, edge);
        self
    }

    /// Add a hidden connection.
    pub fn with_hidden(mut self, key: impl Into<String>, target: HiddenTarget) -> Self {
        self.hidden.insert(key.into(), target);
        self
    }

    /// Grant an item on entry.
    pub fn grants(mut self, item: impl Into<String>) -> Self {
        self.items_granted.push(item.into());
        self
    }

    /// Require an item to enter.
    pub fn requires(mut self, item: impl Into<String>) -> Self {
        self.items_required.push(item.into());
        self
    }

    /// Race the keypad against a deadline on this scene's turn.
    pub fn with_timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout = Some(policy);
        self
    }

    /// The numbered choices in digit order, for display.
    pub fn options(&self) -> Vec<(u8, &str)> {
        self.connections
            .iter()
            .map(|(digit, edge)| (*digit, edge.label()))
            .collect()
    }

    /// Resolve one player token against this scene.
    ///
    /// Rules are tried in order and the first match wins: hidden/special
    /// token, numbered choice, the `default` hidden connection, and finally
    /// `Invalid`.
    pub fn resolve(&self, token: &Token, inventory: &Inventory) -> Outcome {
        // Hidden and special tokens first; a timed-out turn arrives here as
        // the "timeout" key like any other code.
        let hidden_hit = match token {
            Token::Code(code) => self.hidden.get(code.as_str()),
            Token::Key(key) => self.hidden.get(key.to_string().as_str()),
            Token::Timeout => self.hidden.get(TIMEOUT_TOKEN),
            Token::HangUp => None,
        };
        if let Some(target) = hidden_hit {
            return target.resolve(inventory);
        }

        if let Some(digit) = token.as_digit() {
            if let Some(edge) = self.connections.get(&digit) {
                return edge.resolve(inventory);
            }
        }

        if let Some(target) = self.hidden.get(DEFAULT_TOKEN) {
            return target.resolve(inventory);
        }

        Outcome::Invalid
    }
}

/// The immutable, fully materialized narrative graph.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    scenes: HashMap<SceneId, Scene>,
}

impl SceneGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from scenes.
    pub fn from_scenes(scenes: impl IntoIterator<Item = Scene>) -> Self {
        let mut graph = Self::new();
        for scene in scenes {
            graph.insert(scene);
        }
        graph
    }

    /// Insert a scene, returning any scene previously under the same id.
    pub fn insert(&mut self, scene: Scene) -> Option<Scene> {
        self.scenes.insert(scene.id.clone(), scene)
    }

    /// Look up a scene by id.
    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.get(id)
    }

    /// Whether the id names a scene in this graph.
    pub fn contains(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    /// Number of scenes.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the graph has no scenes.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Iterate over all scenes in no particular order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(items: &[&str]) -> Inventory {
        let mut inventory = Inventory::new();
        for item in items {
            inventory.add(*item);
        }
        inventory
    }

    fn cond(paths: &[(&str, &str)], default: Option<&str>) -> ConditionalTarget {
        ConditionalTarget {
            paths: paths
                .iter()
                .map(|(req, target)| (ItemRequirement::parse(req), target.to_string()))
                .collect(),
            default: default.map(String::from),
        }
    }

    #[test]
    fn test_direct_choice_advances() {
        let scene = Scene::new("s").with_connection(1, ChoiceEdge::direct("go", "a"));
        let outcome = scene.resolve(&Token::Key('1'), &Inventory::new());
        assert_eq!(outcome, Outcome::Advance("a".to_string()));
    }

    #[test]
    fn test_missing_requirement_blocks_with_names() {
        let scene = Scene::new("s").with_connection(
            1,
            ChoiceEdge::Direct {
                label: "unlock".to_string(),
                target: "a".to_string(),
                required_items: vec!["key".to_string()],
                fallback: None,
                redirect: None,
            },
        );
        let outcome = scene.resolve(&Token::Key('1'), &Inventory::new());
        assert_eq!(outcome, Outcome::Blocked("need: key".to_string()));
    }

    #[test]
    fn test_fallback_taken_when_requirement_missing() {
        let scene = Scene::new("s").with_connection(
            1,
            ChoiceEdge::Direct {
                label: "unlock".to_string(),
                target: "a".to_string(),
                required_items: vec!["key".to_string()],
                fallback: Some("rattle".to_string()),
                redirect: None,
            },
        );
        let outcome = scene.resolve(&Token::Key('1'), &Inventory::new());
        assert_eq!(outcome, Outcome::Advance("rattle".to_string()));
    }

    #[test]
    fn test_redirect_fires_before_requirements() {
        // The call edge: without a phone number the player is sent to the
        // no-numbers scene no matter what else the edge requires.
        let edge = ChoiceEdge::Direct {
            label: "call someone".to_string(),
            target: "call".to_string(),
            required_items: vec!["coin".to_string()],
            fallback: None,
            redirect: Some(EdgeRedirect {
                unless_item: "phone_number".to_string(),
                to: "no_numbers".to_string(),
            }),
        };
        let scene = Scene::new("s").with_connection(2, edge);

        let outcome = scene.resolve(&Token::Key('2'), &inv(&["coin"]));
        assert_eq!(outcome, Outcome::Advance("no_numbers".to_string()));
    }

    #[test]
    fn test_redirect_disarmed_by_item() {
        let edge = ChoiceEdge::Direct {
            label: "call someone".to_string(),
            target: "call".to_string(),
            required_items: vec![],
            fallback: None,
            redirect: Some(EdgeRedirect {
                unless_item: "phone_number".to_string(),
                to: "no_numbers".to_string(),
            }),
        };
        let scene = Scene::new("s").with_connection(2, edge);

        let outcome = scene.resolve(&Token::Key('2'), &inv(&["phone_number"]));
        assert_eq!(outcome, Outcome::Advance("call".to_string()));
    }

    #[test]
    fn test_hidden_code_advances() {
        let scene = Scene::new("s").with_hidden("451", HiddenTarget::Scene("vault".to_string()));
        let outcome = scene.resolve(&Token::Code("451".to_string()), &Inventory::new());
        assert_eq!(outcome, Outcome::Advance("vault".to_string()));
    }

    #[test]
    fn test_conditional_hidden_prefers_most_specific() {
        let scene = Scene::new("s").with_hidden(
            "timeout",
            HiddenTarget::Conditional(cond(&[("a", "x"), ("a,b", "y")], Some("z"))),
        );
        let outcome = scene.resolve(&Token::Timeout, &inv(&["a", "b"]));
        assert_eq!(outcome, Outcome::Advance("y".to_string()));
    }

    #[test]
    fn test_conditional_hidden_tie_breaks_by_declaration() {
        let scene = Scene::new("s").with_hidden(
            "timeout",
            HiddenTarget::Conditional(cond(&[("a", "x"), ("b", "y")], None)),
        );
        let outcome = scene.resolve(&Token::Timeout, &inv(&["a", "b"]));
        assert_eq!(outcome, Outcome::Advance("x".to_string()));
    }

    #[test]
    fn test_conditional_hidden_default_when_unsatisfied() {
        let scene = Scene::new("s").with_hidden(
            "timeout",
            HiddenTarget::Conditional(cond(&[("a", "x")], Some("z"))),
        );
        let outcome = scene.resolve(&Token::Timeout, &Inventory::new());
        assert_eq!(outcome, Outcome::Advance("z".to_string()));
    }

    #[test]
    fn test_conditional_hidden_blocked_without_default() {
        let scene = Scene::new("s").with_hidden(
            "timeout",
            HiddenTarget::Conditional(cond(&[("a", "x")], None)),
        );
        let outcome = scene.resolve(&Token::Timeout, &Inventory::new());
        assert_eq!(outcome, Outcome::Blocked("need the right items".to_string()));
    }

    #[test]
    fn test_conditional_edge_uses_declaration_order() {
        let scene = Scene::new("s").with_connection(
            1,
            ChoiceEdge::Conditional {
                label: "use something".to_string(),
                paths: cond(&[("rope", "down"), ("ladder", "also_down")], None),
            },
        );
        let outcome = scene.resolve(&Token::Key('1'), &inv(&["ladder", "rope"]));
        assert_eq!(outcome, Outcome::Advance("down".to_string()));
    }

    #[test]
    fn test_conditional_edge_blocked_message() {
        let scene = Scene::new("s").with_connection(
            1,
            ChoiceEdge::Conditional {
                label: "use something".to_string(),
                paths: cond(&[("rope", "down")], None),
            },
        );
        let outcome = scene.resolve(&Token::Key('1'), &Inventory::new());
        assert_eq!(
            outcome,
            Outcome::Blocked("wrong item for this action".to_string())
        );
    }

    #[test]
    fn test_default_hidden_catches_unmatched_tokens() {
        let scene = Scene::new("s")
            .with_connection(1, ChoiceEdge::direct("go", "a"))
            .with_hidden("default", HiddenTarget::Scene("hub".to_string()));
        let outcome = scene.resolve(&Token::Code("9999".to_string()), &Inventory::new());
        assert_eq!(outcome, Outcome::Advance("hub".to_string()));
    }

    #[test]
    fn test_invalid_when_nothing_matches() {
        let scene = Scene::new("s").with_connection(1, ChoiceEdge::direct("go", "a"));
        assert_eq!(
            scene.resolve(&Token::Key('7'), &Inventory::new()),
            Outcome::Invalid
        );
        assert_eq!(
            scene.resolve(&Token::Timeout, &Inventory::new()),
            Outcome::Invalid
        );
    }

    #[test]
    fn test_single_key_can_match_hidden() {
        // A hidden connection keyed by a bare digit takes precedence over
        // the numbered choice with the same digit.
        let scene = Scene::new("s")
            .with_connection(4, ChoiceEdge::direct("go", "a"))
            .with_hidden("4", HiddenTarget::Scene("secret".to_string()));
        let outcome = scene.resolve(&Token::Key('4'), &Inventory::new());
        assert_eq!(outcome, Outcome::Advance("secret".to_string()));
    }

    #[test]
    fn test_options_in_digit_order() {
        let scene = Scene::new("s")
            .with_connection(3, ChoiceEdge::direct("third", "c"))
            .with_connection(1, ChoiceEdge::direct("first", "a"));
        let options = scene.options();
        assert_eq!(options, vec![(1, "first"), (3, "third")]);
    }

    #[test]
    fn test_requirement_parse_splits_commas() {
        let req = ItemRequirement::parse(" a , b ");
        assert_eq!(req.items(), &["a".to_string(), "b".to_string()]);
        assert_eq!(req.len(), 2);
    }
}
