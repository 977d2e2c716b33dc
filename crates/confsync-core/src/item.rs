//! Parsed configuration items

use std::collections::HashMap;

use serde_yaml::Value;

/// One item read from a module file or a domain file.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleItem {
    pub id: String,
    /// Item as written in its file, template tags intact
    pub data: Value,
    /// Root-relative file the item was read from or will be written to
    pub source: String,
    /// Position within its file
    pub order: usize,
    pub name: Option<String>,
    pub fingerprint: String,
    pub helper_type: Option<&'static str>,
    /// Item with templates resolved; `None` when expansion dropped it
    pub expanded: Option<Value>,
    /// 1-based line of the item in its file, when known
    pub line: Option<usize>,
}

impl ModuleItem {
    /// Identity unique within a target: `helper_type:id` for helpers.
    pub fn key(&self) -> String {
        match self.helper_type {
            Some(helper_type) => format!("{}:{}", helper_type, self.id),
            None => self.id.clone(),
        }
    }
}

/// Items indexed by [`ModuleItem::key`], keeping the first of each key.
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<ModuleItem>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item. Returns `false`, leaving the catalog unchanged, when the
    /// key is already taken.
    pub fn insert(&mut self, item: ModuleItem) -> bool {
        let key = item.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.items.len());
        self.items.push(item);
        true
    }

    pub fn get(&self, key: &str) -> Option<&ModuleItem> {
        self.index.get(key).map(|&idx| &self.items[idx])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
