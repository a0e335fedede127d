use std::collections::HashMap;

use crate::table::Cell;

/// Label ↔ id map for one normalization run.
///
/// Ids are dense, start at 1 and follow first-assignment order. Create a new
/// instance per run; ids from one run mean nothing in another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupIdentity {
    by_label: HashMap<String, u32>,
    /// `labels[id - 1]` is the label for `id`.
    labels: Vec<String>,
}

impl GroupIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trim + lower-case a text label; anything that is not text becomes "".
    pub fn normalize_label(cell: &Cell) -> String {
        match cell {
            Cell::Text(s) => s.trim().to_lowercase(),
            _ => String::new(),
        }
    }

    /// Id for `label`, issuing the next one on first sight.
    /// Returns `None` for an empty label; empty labels never get an id.
    pub fn assign(&mut self, label: &str) -> Option<u32> {
        if label.is_empty() {
            return None;
        }
        if let Some(&id) = self.by_label.get(label) {
            return Some(id);
        }
        self.labels.push(label.to_string());
        let id = self.labels.len() as u32;
        self.by_label.insert(label.to_string(), id);
        Some(id)
    }

    pub fn id_of(&self, label: &str) -> Option<u32> {
        self.by_label.get(label).copied()
    }

    pub fn label_of(&self, id: u32) -> Option<&str> {
        let idx = (id as usize).checked_sub(1)?;
        self.labels.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(id, label)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, l)| (i as u32 + 1, l.as_str()))
    }
}
