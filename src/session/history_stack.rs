use crate::service::types::Artifact;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// One point in the undo/redo timeline of the open document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingSnapshot {
    pub artifact: Option<Artifact>,
    pub instruction: String,
}

impl EditingSnapshot {
    pub fn new(artifact: Option<Artifact>, instruction: impl Into<String>) -> Self {
        Self {
            artifact,
            instruction: instruction.into(),
        }
    }
}

/// Configuration for the in-memory editing session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub undo_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { undo_capacity: 30 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackState {
    Empty,
    At(usize),
}

/// Bounded undo/redo stack: one sequence plus a cursor
///
/// `push` discards any redo tail, appends and moves the cursor to the new
/// entry. Once the sequence holds more than `capacity` entries the oldest is
/// dropped and the cursor shifts with it. `undo`/`redo` only move the cursor.
#[derive(Debug, Clone)]
pub struct SessionHistoryStack {
    entries: VecDeque<EditingSnapshot>,
    cursor: Option<usize>,
    capacity: usize,
}

impl SessionHistoryStack {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: None,
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: EditingSnapshot) {
        let keep = self.cursor.map_or(0, |i| i + 1);
        self.entries.truncate(keep);
        self.entries.push_back(snapshot);

        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            debug!("Undo history full, dropped oldest snapshot");
        }

        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back; returns the new current snapshot, `None` once at Empty
    pub fn undo(&mut self) -> Option<&EditingSnapshot> {
        self.cursor = match self.cursor {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
        self.current()
    }

    /// Step forward; a no-op at the tail
    pub fn redo(&mut self) -> Option<&EditingSnapshot> {
        let next = self.cursor.map_or(0, |i| i + 1);
        if next < self.entries.len() {
            self.cursor = Some(next);
        }
        self.current()
    }

    pub fn current(&self) -> Option<&EditingSnapshot> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    pub fn state(&self) -> StackState {
        match self.cursor {
            Some(i) => StackState::At(i),
            None => StackState::Empty,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.map_or(0, |i| i + 1) < self.entries.len()
    }

    /// Start a new document
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
