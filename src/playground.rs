//! The sprite control surface. A [`Playground`] is a cheap handle around the
//! shared stage; clones drive the same sprites.
//!
//! Operations that start programs spawn Tokio tasks and must be called from
//! inside a runtime. Everything else is synchronous and never fails: unknown
//! sprite ids turn the call into a no-op.

use crate::collision::{CollisionMonitor, CollisionPair};
use crate::config::EngineConfig;
use crate::engine::spawn_chain;
use crate::normalize::normalize_program;
use crate::program::{flag_entries, top_level_blocks, workspace_blocks, BlockInstance};
use crate::render::{render, SpriteView};
use crate::sprite::{Axis, Position, SpriteId, SpriteKind, SpriteState};
use crate::store::SpriteStore;
use crate::tasks::TaskRegistry;
use crate::undo::UndoLog;
use crate::validate::validate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    state: Mutex<StageState>,
    pub(crate) tracker: TaskTracker,
}

impl Shared {
    /// Never hold the guard across an await.
    pub(crate) fn lock(&self) -> MutexGuard<'_, StageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct StageState {
    pub(crate) store: SpriteStore,
    pub(crate) undo: UndoLog,
    pub(crate) collisions: CollisionMonitor,
    pub(crate) tasks: TaskRegistry,
    pub(crate) pointer: Position,
    rng: StdRng,
}

impl StageState {
    /// Updates one sprite, then lets Hero Mode react to the new layout.
    pub(crate) fn commit<F>(&mut self, id: SpriteId, f: F) -> Option<u64>
    where
        F: FnOnce(&mut SpriteState),
    {
        let version = self.store.update(id, f)?;
        self.evaluate_collisions();
        Some(version)
    }

    pub(crate) fn commit_state(&mut self, id: SpriteId, state: SpriteState) -> Option<u64> {
        self.commit(id, move |current| *current = state)
    }

    /// Uniform in `[0, range)` on both axes; a zero range pins the origin.
    pub(crate) fn random_point(&mut self, range: f64) -> Position {
        if !range.is_finite() || range <= 0.0 {
            return Position::default();
        }
        let x = self.rng.gen_range(0.0..range);
        let y = self.rng.gen_range(0.0..range);
        Position::new(x, y)
    }

    fn evaluate_collisions(&mut self) -> Vec<CollisionPair> {
        self.collisions.evaluate(&mut self.store)
    }

    /// Stops the sprite's chains and clears what they were showing as
    /// in-flight.
    fn cancel_chains(&mut self, id: SpriteId) {
        let cancelled = self.tasks.cancel_chains(id);
        if cancelled > 0 {
            debug!(sprite = id, cancelled, "cancelled running chains");
        }
        self.store.update(id, |sprite| {
            sprite.is_running_program = false;
            sprite.active_animation = None;
        });
    }

    fn set_hero_mode(&mut self, enabled: bool) {
        self.collisions.set_enabled(enabled);
        info!(enabled, "hero mode");
        if enabled {
            self.evaluate_collisions();
        }
    }
}

#[derive(Clone)]
pub struct Playground {
    shared: Arc<Shared>,
}

impl Default for Playground {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Playground {
    /// An empty stage.
    pub fn new(config: EngineConfig) -> Self {
        let config = config.sanitized();
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(u64::from(seed)),
            None => StdRng::from_entropy(),
        };
        let state = StageState {
            store: SpriteStore::new(),
            undo: UndoLog::new(),
            collisions: CollisionMonitor::new(),
            tasks: TaskRegistry::new(),
            pointer: Position::default(),
            rng,
        };
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// A stage holding the single Dog every fresh editor session starts with.
    pub fn with_default_sprite(config: EngineConfig) -> Self {
        let playground = Self::new(config);
        playground.add_sprite(SpriteKind::Dog);
        playground
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn add_sprite(&self, kind: SpriteKind) -> SpriteId {
        let mut state = self.shared.lock();
        let id = state.store.add(kind);
        state.evaluate_collisions();
        info!(sprite = id, %kind, "sprite added");
        id
    }

    pub fn select(&self, id: SpriteId) -> bool {
        self.shared.lock().store.select(id)
    }

    pub fn clear_selection(&self) {
        self.shared.lock().store.clear_selection();
    }

    pub fn selected(&self) -> Option<SpriteId> {
        self.shared.lock().store.selected()
    }

    /// The sprite editing controls act on: the selection, else the first sprite.
    pub fn effective_selection(&self) -> Option<SpriteId> {
        self.shared.lock().store.effective_selection()
    }

    /// Removes a sprite along with its running chains, pending speech timers,
    /// tracked collisions and undo entries.
    pub fn delete(&self, id: SpriteId) -> bool {
        let mut state = self.shared.lock();
        if !state.store.contains(id) {
            return false;
        }
        state.tasks.cancel_sprite(id);
        state.store.remove(id);
        state.collisions.forget(id);
        state.undo.forget(id);
        info!(sprite = id, "sprite deleted");
        true
    }

    pub fn set_position(&self, id: SpriteId, axis: Axis, value: f64) -> bool {
        self.shared
            .lock()
            .commit(id, |sprite| match axis {
                Axis::X => sprite.position.x = value,
                Axis::Y => sprite.position.y = value,
            })
            .is_some()
    }

    /// Drop target of a drag gesture.
    pub fn drag_to(&self, id: SpriteId, position: Position) -> bool {
        self.shared
            .lock()
            .commit(id, |sprite| sprite.position = position)
            .is_some()
    }

    pub fn set_rotation(&self, id: SpriteId, value: f64) -> bool {
        self.shared
            .lock()
            .commit(id, |sprite| sprite.rotation = value)
            .is_some()
    }

    pub fn change_size(&self, id: SpriteId, delta: f64) -> bool {
        self.shared
            .lock()
            .commit(id, |sprite| sprite.size += delta)
            .is_some()
    }

    /// Normalizes raw editor nodes and stores them as the sprite's program.
    /// Lint findings are logged, never rejected.
    pub fn set_program(&self, id: SpriteId, raw_blocks: &[Value]) -> bool {
        let blocks = normalize_program(raw_blocks);
        let report = validate(&blocks);
        for warning in &report.warnings {
            warn!(sprite = id, "{}", warning);
        }
        self.set_blocks(id, blocks)
    }

    /// Accepts a workspace export, either a bare node array or the
    /// `{"blocks": {"blocks": [...]}}` envelope.
    pub fn load_workspace(&self, id: SpriteId, export: &Value) -> bool {
        self.set_program(id, &workspace_blocks(export))
    }

    pub fn set_blocks(&self, id: SpriteId, blocks: Vec<BlockInstance>) -> bool {
        self.shared
            .lock()
            .commit(id, move |sprite| sprite.blocks = blocks)
            .is_some()
    }

    /// Last known pointer position, in stage coordinates.
    pub fn move_pointer(&self, position: Position) {
        self.shared.lock().pointer = position;
    }

    pub fn pointer(&self) -> Position {
        self.shared.lock().pointer
    }

    /// Runs every `when_flag_clicked` chain of one sprite, replacing any run
    /// already in flight for it. Returns the number of chains started; zero
    /// leaves the sprite and the undo log untouched.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and there is a chain to start.
    pub fn run(&self, id: SpriteId) -> usize {
        let mut state = self.shared.lock();
        let entries = match state.store.get(id) {
            Some(sprite) => flag_entries(&sprite.blocks)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>(),
            None => return 0,
        };
        if entries.is_empty() {
            debug!(sprite = id, "no flag block to run");
            return 0;
        }
        self.start_run(&mut state, id, entries)
    }

    /// Runs every top-level chain of every sprite. Hat blocks are top-level
    /// too, so flagged chains start here as well.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime and there is a chain to start.
    pub fn run_all(&self) -> usize {
        let mut state = self.shared.lock();
        let mut started = 0;
        for id in state.store.ids() {
            let entries = match state.store.get(id) {
                Some(sprite) => top_level_blocks(&sprite.blocks)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>(),
                None => continue,
            };
            if !entries.is_empty() {
                started += self.start_run(&mut state, id, entries);
            }
        }
        info!(chains = started, "run all");
        started
    }

    fn start_run(
        &self,
        state: &mut StageState,
        id: SpriteId,
        entries: Vec<BlockInstance>,
    ) -> usize {
        state.cancel_chains(id);
        if let Some(prior) = state.store.get(id).cloned() {
            state.undo.push(id, prior);
        }
        let count = entries.len();
        for entry in entries {
            spawn_chain(&self.shared, state, id, entry);
        }
        info!(sprite = id, chains = count, "run");
        count
    }

    /// Rolls the most recently run sprite back to its pre-run snapshot.
    /// Returns the restored sprite's id, or `None` when the log is empty.
    pub fn undo(&self) -> Option<SpriteId> {
        let mut state = self.shared.lock();
        let entry = state.undo.pop()?;
        let id = entry.sprite_id;
        state.cancel_chains(id);
        let mut prior = entry.prior;
        prior.is_running_program = false;
        prior.active_animation = None;
        state.commit_state(id, prior)?;
        info!(sprite = id, remaining = state.undo.len(), "undo");
        Some(id)
    }

    /// Stops everything in flight, puts every sprite back to its starting
    /// pose and forgets the undo history. Programs are kept.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        state.tasks.cancel_all();
        for id in state.store.ids() {
            state.store.update(id, SpriteState::reset_pose);
        }
        state.undo.clear();
        state.evaluate_collisions();
        info!("reset");
    }

    pub fn set_hero_mode(&self, enabled: bool) {
        self.shared.lock().set_hero_mode(enabled);
    }

    pub fn toggle_hero_mode(&self) -> bool {
        let mut state = self.shared.lock();
        let enabled = !state.collisions.is_enabled();
        state.set_hero_mode(enabled);
        enabled
    }

    pub fn hero_mode(&self) -> bool {
        self.shared.lock().collisions.is_enabled()
    }

    pub fn sprite(&self, id: SpriteId) -> Option<SpriteState> {
        self.shared.lock().store.get(id).cloned()
    }

    pub fn sprites(&self) -> Vec<SpriteState> {
        self.shared.lock().store.snapshot()
    }

    pub fn version(&self, id: SpriteId) -> Option<u64> {
        self.shared.lock().store.version(id)
    }

    pub fn render(&self, id: SpriteId) -> Option<SpriteView> {
        self.shared.lock().store.get(id).map(render)
    }

    pub fn render_all(&self) -> Vec<SpriteView> {
        self.shared.lock().store.iter().map(render).collect()
    }

    pub fn undo_depth(&self) -> usize {
        self.shared.lock().undo.len()
    }

    pub fn is_running(&self, id: SpriteId) -> bool {
        self.shared.lock().tasks.active_chains(id) > 0
    }

    /// Resolves once every chain and speech timer spawned so far has ended.
    pub async fn settle(&self) {
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        self.shared.tracker.reopen();
    }
}
