use crate::sprite::{SpriteId, SpriteState};

#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub sprite_id: SpriteId,
    pub prior: SpriteState,
}

/// Whole-sprite snapshots taken before runs, newest last. No redo.
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sprite_id: SpriteId, prior: SpriteState) {
        self.entries.push(UndoEntry { sprite_id, prior });
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries for a sprite that no longer exists.
    pub fn forget(&mut self, sprite_id: SpriteId) {
        self.entries.retain(|entry| entry.sprite_id != sprite_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
