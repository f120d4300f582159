//! Session inventory: the items a player has collected since lifting the
//! handset.
//!
//! The inventory only ever grows during a session. It is dropped wholesale
//! when the handset goes back on the cradle; a fresh lift starts empty.

use std::collections::BTreeSet;

/// Items held during one session.
///
/// Backed by an ordered set so readouts and missing-item messages come out
/// in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    items: BTreeSet<String>,
}

impl Inventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Returns `true` if the item was newly added; adding an
    /// item that is already held is a no-op.
    pub fn add(&mut self, item: impl Into<String>) -> bool {
        self.items.insert(item.into())
    }

    /// Whether the item is held.
    pub fn has(&self, item: &str) -> bool {
        self.items.contains(item)
    }

    /// Whether every item in `required` is held.
    pub fn has_all(&self, required: &[String]) -> bool {
        required.iter().all(|item| self.has(item))
    }

    /// The items from `required` that are not currently held, in the order
    /// given.
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|item| !self.has(item))
            .map(String::as_str)
            .collect()
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over held items in sorted order.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut inv = Inventory::new();
        assert!(inv.add("rusty_key"));
        assert!(!inv.add("rusty_key"));
        assert_eq!(inv.len(), 1);
    }

    #[test]
    fn test_missing_preserves_required_order() {
        let mut inv = Inventory::new();
        inv.add("b");
        let required = vec!["c".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(inv.missing(&required), vec!["c", "a"]);
    }

    #[test]
    fn test_has_all() {
        let mut inv = Inventory::new();
        inv.add("a");
        inv.add("b");
        assert!(inv.has_all(&["a".to_string(), "b".to_string()]));
        assert!(!inv.has_all(&["a".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_items_sorted() {
        let mut inv = Inventory::new();
        inv.add("zebra");
        inv.add("apple");
        let items: Vec<&str> = inv.items().collect();
        assert_eq!(items, vec!["apple", "zebra"]);
    }
}
