//! Per-sprite bookkeeping for outstanding work: one cancellation token for
//! program chains, one for speech auto-clear timers, and a count of chains
//! still running.

use crate::sprite::SpriteId;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct SpriteTasks {
    chains: CancellationToken,
    speech: CancellationToken,
    active_chains: usize,
}

impl SpriteTasks {
    fn new() -> Self {
        Self {
            chains: CancellationToken::new(),
            speech: CancellationToken::new(),
            active_chains: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    sprites: HashMap<SpriteId, SpriteTasks>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, id: SpriteId) -> &mut SpriteTasks {
        self.sprites.entry(id).or_insert_with(SpriteTasks::new)
    }

    /// Registers a new chain and hands back the token it must watch.
    pub fn start_chain(&mut self, id: SpriteId) -> CancellationToken {
        let tasks = self.entry(id);
        tasks.active_chains += 1;
        tasks.chains.clone()
    }

    /// Marks a chain done. Returns true when it was the sprite's last one.
    /// Chains whose token was cancelled were already written off.
    pub fn finish_chain(&mut self, id: SpriteId, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        let Some(tasks) = self.sprites.get_mut(&id) else {
            return false;
        };
        tasks.active_chains = tasks.active_chains.saturating_sub(1);
        tasks.active_chains == 0
    }

    pub fn speech_token(&mut self, id: SpriteId) -> CancellationToken {
        self.entry(id).speech.clone()
    }

    pub fn active_chains(&self, id: SpriteId) -> usize {
        self.sprites
            .get(&id)
            .map(|tasks| tasks.active_chains)
            .unwrap_or(0)
    }

    /// Stops every chain of one sprite; later chains get a fresh token.
    /// Returns how many chains were running.
    pub fn cancel_chains(&mut self, id: SpriteId) -> usize {
        let Some(tasks) = self.sprites.get_mut(&id) else {
            return 0;
        };
        tasks.chains.cancel();
        tasks.chains = CancellationToken::new();
        std::mem::take(&mut tasks.active_chains)
    }

    /// Stops chains and speech timers of one sprite and forgets it.
    pub fn cancel_sprite(&mut self, id: SpriteId) {
        if let Some(tasks) = self.sprites.remove(&id) {
            tasks.chains.cancel();
            tasks.speech.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, tasks) in self.sprites.drain() {
            tasks.chains.cancel();
            tasks.speech.cancel();
        }
    }
}
