//! Category tree access
//!
//! Categories live in a flat id-keyed table; the parent relation is a weak
//! id lookup, never an owning pointer, so the tree cannot form ownership
//! cycles. Paths and depths are computed by repeated lookup.

use std::collections::HashMap;

use crate::models::Category;

/// Flat index over a category snapshot
#[derive(Debug, Default)]
pub struct CategoryIndex {
    by_id: HashMap<String, Category>,
}

impl CategoryIndex {
    pub fn new(categories: Vec<Category>) -> Self {
        let by_id = categories.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self { by_id }
    }

    pub fn get(&self, id: &str) -> Option<&Category> {
        self.by_id.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Depth from the root (0 = root), walking parent links.
    /// A dangling or cyclic parent chain terminates at the walk limit.
    pub fn depth(&self, id: &str) -> u32 {
        let mut depth = 0;
        let mut current = self.by_id.get(id);
        while let Some(cat) = current {
            match &cat.parent_id {
                Some(parent) if depth < 32 => {
                    depth += 1;
                    current = self.by_id.get(parent.as_str());
                }
                _ => break,
            }
        }
        depth
    }

    /// Full path from root, e.g. "Food.Groceries".
    pub fn path(&self, id: &str) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.by_id.get(id)?;
        names.push(current.name.clone());
        let mut hops = 0;
        while let Some(parent_id) = &current.parent_id {
            let Some(parent) = self.by_id.get(parent_id.as_str()) else {
                break;
            };
            names.push(parent.name.clone());
            current = parent;
            hops += 1;
            if hops >= 32 {
                break;
            }
        }
        names.reverse();
        Some(names.join("."))
    }
}
