use std::collections::HashSet;

use indexmap::IndexMap;
use uuid::Uuid;

pub const BLANK_LABEL: &str = "\u{2800}";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// A button owned by one session. The token is assigned by the arena on registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Control {
    pub token: String,
    pub label: Option<String>,
    pub emoji: Option<String>,
    pub style: ControlStyle,
    pub disabled: bool,
    pub row: u8,
}

impl Control {
    pub fn new(style: ControlStyle) -> Self {
        Control {
            token: String::new(),
            label: None,
            emoji: None,
            style,
            disabled: false,
            row: 0,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn row(mut self, row: u8) -> Self {
        self.row = row;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Session-local mapping from token to control, kept in render order.
///
/// Tokens are never reused for the lifetime of the arena, even after `clear`,
/// so a stale component id from an earlier render can't hit a newer control.
#[derive(Debug, Default)]
pub struct ControlArena {
    controls: IndexMap<String, Control>,
    issued: HashSet<String>,
}

impl ControlArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, mut control: Control) -> String {
        let token = loop {
            let candidate = Uuid::new_v4().simple().to_string()[..8].to_string();
            if self.issued.insert(candidate.clone()) {
                break candidate;
            }
        };
        control.token = token.clone();
        self.controls.insert(token.clone(), control);
        token
    }

    pub fn contains(&self, token: &str) -> bool {
        self.controls.contains_key(token)
    }

    pub fn get(&self, token: &str) -> Option<&Control> {
        self.controls.get(token)
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut Control> {
        self.controls.get_mut(token)
    }

    pub fn position(&self, token: &str) -> Option<usize> {
        self.controls.get_index_of(token)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Control> {
        self.controls.values().find(|c| c.label.as_deref() == Some(label))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Control> {
        self.controls.values_mut()
    }

    pub fn disable_all(&mut self) {
        for control in self.controls.values_mut() {
            control.disabled = true;
        }
    }

    pub fn clear(&mut self) {
        self.controls.clear();
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Control> {
        self.controls.values().cloned().collect()
    }
}
