//! Durable client-side storage owned by a single scenario
//!
//! The browser's `localStorage` is modelled as an explicit object instead of
//! ambient state: setup steps write into it, and the Playwright driver seeds
//! the real browser from a [`StorageSnapshot`] before the first page load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Key the app reads the logged-in username from
pub const USERNAME_KEY: &str = "username";

/// Key the app reads the opaque session token from
pub const TOKEN_KEY: &str = "token";

/// Key/value store surviving page navigation
pub trait ClientStorage: Send {
    fn set_item(&mut self, key: &str, value: &str);

    fn get_item(&self, key: &str) -> Option<String>;

    fn remove_item(&mut self, key: &str) -> Option<String>;

    fn clear(&mut self);

    fn keys(&self) -> Vec<String>;

    /// Point-in-time copy used to seed a browser context
    fn snapshot(&self) -> StorageSnapshot;
}

/// Serializable copy of a storage's contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSnapshot {
    pub items: BTreeMap<String, String>,
}

impl StorageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// JavaScript that replaces the page's `localStorage` with this snapshot
    /// once per tab, so later navigations keep whatever the app wrote.
    pub fn to_init_script(&self) -> serde_json::Result<String> {
        let items = serde_json::to_string(&self.items)?;
        Ok(format!(
            r#"if (!window.sessionStorage.getItem('__e2e_seeded')) {{
  window.localStorage.clear();
  const items = {items};
  for (const [k, v] of Object.entries(items)) window.localStorage.setItem(k, v);
  window.sessionStorage.setItem('__e2e_seeded', '1');
}}"#
        ))
    }
}

/// In-memory storage, one per scenario
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an earlier snapshot, e.g. what a before-all hook left behind
    pub fn from_snapshot(snapshot: StorageSnapshot) -> Self {
        Self {
            items: snapshot.items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ClientStorage for MemoryStorage {
    fn set_item(&mut self, key: &str, value: &str) {
        debug!("storage: set {}", key);
        self.items.insert(key.to_string(), value.to_string());
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn remove_item(&mut self, key: &str) -> Option<String> {
        self.items.remove(key)
    }

    fn clear(&mut self) {
        debug!("storage: clear ({} keys)", self.items.len());
        self.items.clear();
    }

    fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    fn snapshot(&self) -> StorageSnapshot {
        StorageSnapshot {
            items: self.items.clone(),
        }
    }
}
