//! Hero Mode: sprites whose boxes start overlapping trade their speech and
//! program once per new contact.

use crate::sprite::SpriteId;
use crate::store::SpriteStore;
use std::collections::BTreeSet;
use tracing::info;

/// Unordered pair, stored smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollisionPair(SpriteId, SpriteId);

impl CollisionPair {
    pub fn new(a: SpriteId, b: SpriteId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn ids(&self) -> (SpriteId, SpriteId) {
        (self.0, self.1)
    }

    pub fn involves(&self, id: SpriteId) -> bool {
        self.0 == id || self.1 == id
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollisionMonitor {
    enabled: bool,
    colliding: BTreeSet<CollisionPair>,
}

impl CollisionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turning the mode off forgets every tracked pair, so overlaps that still
    /// exist count as new once it is turned back on.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.colliding.clear();
        }
    }

    pub fn colliding(&self) -> impl Iterator<Item = &CollisionPair> {
        self.colliding.iter()
    }

    pub fn forget(&mut self, id: SpriteId) {
        self.colliding.retain(|pair| !pair.involves(id));
    }

    /// Recomputes overlaps and swaps `text`/`blocks` for every pair that was
    /// not overlapping on the previous evaluation. Returns the swapped pairs.
    pub fn evaluate(&mut self, store: &mut SpriteStore) -> Vec<CollisionPair> {
        if !self.enabled {
            return Vec::new();
        }
        let current = overlapping_pairs(store);
        let fresh = current
            .iter()
            .filter(|pair| !self.colliding.contains(pair))
            .copied()
            .collect::<Vec<_>>();
        for pair in &fresh {
            swap_payload(store, *pair);
        }
        self.colliding = current;
        fresh
    }
}

pub fn overlapping_pairs(store: &SpriteStore) -> BTreeSet<CollisionPair> {
    let sprites = store
        .iter()
        .map(|sprite| (sprite.id, sprite.bounding_box()))
        .collect::<Vec<_>>();
    let mut pairs = BTreeSet::new();
    for (i, (id_a, box_a)) in sprites.iter().enumerate() {
        for (id_b, box_b) in &sprites[i + 1..] {
            if box_a.overlaps(box_b) {
                pairs.insert(CollisionPair::new(*id_a, *id_b));
            }
        }
    }
    pairs
}

fn swap_payload(store: &mut SpriteStore, pair: CollisionPair) {
    let (id_a, id_b) = pair.ids();
    let (Some(a), Some(b)) = (store.get(id_a), store.get(id_b)) else {
        return;
    };
    let (text_a, blocks_a) = (a.text.clone(), a.blocks.clone());
    let (text_b, blocks_b) = (b.text.clone(), b.blocks.clone());
    store.update(id_a, |sprite| {
        sprite.text = text_b;
        sprite.blocks = blocks_b;
    });
    store.update(id_b, |sprite| {
        sprite.text = text_a;
        sprite.blocks = blocks_a;
    });
    info!(sprite_a = id_a, sprite_b = id_b, "hero mode swap");
}
