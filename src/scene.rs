//! Scene files for headless runs: which sprites exist, where they stand and
//! what program each one carries.

use crate::playground::Playground;
use crate::sprite::{Position, SpriteId, SpriteKind};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneFile {
    #[serde(default)]
    pub sprites: Vec<SceneSprite>,
    #[serde(default)]
    pub hero_mode: bool,
    #[serde(default)]
    pub pointer: Option<Position>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneSprite {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub rotation: Option<f64>,
    /// Absolute size delta; the kind's default when absent.
    #[serde(default)]
    pub size: Option<f64>,
    /// Workspace export: a node array or the `{"blocks": {"blocks": [...]}}` envelope.
    #[serde(default)]
    pub program: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum SceneError {
    #[error("Scene defines no sprites.")]
    NoSprites,
    #[error("Sprite #{index} has unknown type '{kind}' (expected Cat, Dog or Ball).")]
    UnknownKind { index: usize, kind: String },
    #[error("Sprite #{index} has a program that is neither a block list nor a workspace export.")]
    InvalidProgram { index: usize },
}

pub fn parse_kind(name: &str) -> Option<SpriteKind> {
    match name.to_ascii_lowercase().as_str() {
        "cat" => Some(SpriteKind::Cat),
        "dog" => Some(SpriteKind::Dog),
        "ball" => Some(SpriteKind::Ball),
        _ => None,
    }
}

pub fn load_scene(path: &Path) -> Result<SceneFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene '{}'.", path.display()))?;
    SceneFile::from_json(&text).with_context(|| format!("Invalid scene '{}'.", path.display()))
}

impl SceneFile {
    /// Chains nest two JSON levels per block, so the parser runs without a
    /// depth limit and grows its stack as needed.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut json = serde_json::Deserializer::from_str(text);
        json.disable_recursion_limit();
        let scene = SceneFile::deserialize(serde_stacker::Deserializer::new(&mut json))?;
        json.end()?;
        scene.check()?;
        Ok(scene)
    }

    pub fn check(&self) -> Result<(), SceneError> {
        if self.sprites.is_empty() {
            return Err(SceneError::NoSprites);
        }
        for (index, sprite) in self.sprites.iter().enumerate() {
            if parse_kind(&sprite.kind).is_none() {
                return Err(SceneError::UnknownKind {
                    index,
                    kind: sprite.kind.clone(),
                });
            }
            if !is_program(&sprite.program) {
                return Err(SceneError::InvalidProgram { index });
            }
        }
        Ok(())
    }
}

fn is_program(program: &Value) -> bool {
    program.is_null()
        || program.is_array()
        || program
            .get("blocks")
            .and_then(|blocks| blocks.get("blocks"))
            .map(Value::is_array)
            .unwrap_or(false)
}

/// Populates a playground from a scene. Hero Mode is switched on only after
/// every sprite is placed, so overlaps in the initial layout swap once.
pub fn apply_scene(playground: &Playground, scene: &SceneFile) -> Result<Vec<SpriteId>, SceneError> {
    scene.check()?;
    let mut ids = Vec::with_capacity(scene.sprites.len());
    for (index, entry) in scene.sprites.iter().enumerate() {
        let kind = parse_kind(&entry.kind).ok_or_else(|| SceneError::UnknownKind {
            index,
            kind: entry.kind.clone(),
        })?;
        let id = playground.add_sprite(kind);
        if let Some(position) = entry.position {
            playground.drag_to(id, position);
        }
        if let Some(rotation) = entry.rotation {
            playground.set_rotation(id, rotation);
        }
        if let Some(size) = entry.size {
            playground.change_size(id, size - kind.default_size());
        }
        if !entry.program.is_null() {
            playground.load_workspace(id, &entry.program);
        }
        ids.push(id);
    }
    if let Some(pointer) = scene.pointer {
        playground.move_pointer(pointer);
    }
    if scene.hero_mode {
        playground.set_hero_mode(true);
    }
    Ok(ids)
}
