use crate::sprite::{SpriteId, SpriteKind, SpriteState};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct StoredSprite {
    version: u64,
    state: SpriteState,
}

/// Owns every sprite, keyed by id. Each committed update bumps the sprite's
/// version so observers can tell stale reads from fresh ones.
#[derive(Debug, Clone)]
pub struct SpriteStore {
    sprites: BTreeMap<SpriteId, StoredSprite>,
    next_id: SpriteId,
    selected: Option<SpriteId>,
}

impl Default for SpriteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteStore {
    pub fn new() -> Self {
        Self {
            sprites: BTreeMap::new(),
            next_id: 1,
            selected: None,
        }
    }

    pub fn add(&mut self, kind: SpriteKind) -> SpriteId {
        let id = self.next_id;
        self.next_id += 1;
        self.sprites.insert(
            id,
            StoredSprite {
                version: 0,
                state: SpriteState::new(id, kind),
            },
        );
        id
    }

    pub fn remove(&mut self, id: SpriteId) -> Option<SpriteState> {
        let removed = self.sprites.remove(&id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(removed.state)
    }

    pub fn get(&self, id: SpriteId) -> Option<&SpriteState> {
        self.sprites.get(&id).map(|stored| &stored.state)
    }

    pub fn contains(&self, id: SpriteId) -> bool {
        self.sprites.contains_key(&id)
    }

    pub fn version(&self, id: SpriteId) -> Option<u64> {
        self.sprites.get(&id).map(|stored| stored.version)
    }

    /// Applies `f` to one sprite and commits the result. Returns the new
    /// version, or `None` when the id is unknown.
    pub fn update<F>(&mut self, id: SpriteId, f: F) -> Option<u64>
    where
        F: FnOnce(&mut SpriteState),
    {
        let stored = self.sprites.get_mut(&id)?;
        f(&mut stored.state);
        stored.state.id = id;
        stored.version += 1;
        Some(stored.version)
    }

    /// Replaces a sprite wholesale, keeping its id.
    pub fn replace(&mut self, id: SpriteId, state: SpriteState) -> Option<u64> {
        self.update(id, move |current| *current = state)
    }

    pub fn ids(&self) -> Vec<SpriteId> {
        self.sprites.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpriteState> {
        self.sprites.values().map(|stored| &stored.state)
    }

    pub fn snapshot(&self) -> Vec<SpriteState> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    pub fn select(&mut self, id: SpriteId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<SpriteId> {
        self.selected
    }

    /// The explicit selection, or the first sprite when nothing is selected.
    pub fn effective_selection(&self) -> Option<SpriteId> {
        self.selected
            .filter(|id| self.contains(*id))
            .or_else(|| self.sprites.keys().next().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::Position;

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut store = SpriteStore::new();
        let a = store.add(SpriteKind::Cat);
        let b = store.add(SpriteKind::Dog);
        store.remove(b);
        let c = store.add(SpriteKind::Ball);
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(store.ids(), vec![1, 3]);
    }

    #[test]
    fn update_bumps_version_and_pins_id() {
        let mut store = SpriteStore::new();
        let id = store.add(SpriteKind::Cat);
        assert_eq!(store.version(id), Some(0));
        let version = store.update(id, |sprite| {
            sprite.position = Position::new(5.0, 6.0);
            sprite.id = 99;
        });
        assert_eq!(version, Some(1));
        let sprite = store.get(id).expect("sprite exists");
        assert_eq!(sprite.id, id);
        assert_eq!(sprite.position, Position::new(5.0, 6.0));
        assert_eq!(store.update(42, |_| {}), None);
    }

    #[test]
    fn removing_the_selected_sprite_clears_selection() {
        let mut store = SpriteStore::new();
        let a = store.add(SpriteKind::Cat);
        let b = store.add(SpriteKind::Dog);
        assert!(store.select(b));
        assert!(!store.select(77));
        store.remove(b);
        assert_eq!(store.selected(), None);
        assert_eq!(store.effective_selection(), Some(a));
    }
}
