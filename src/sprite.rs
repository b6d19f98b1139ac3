use crate::program::BlockInstance;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub type SpriteId = u32;

pub const START_POSITION: Position = Position { x: 30.0, y: 30.0 };

const FIGURE_WIDTH: f64 = 95.17898101806641;
const FIGURE_HEIGHT: f64 = 100.04156036376953;
const BALL_SIDE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpriteKind {
    Cat,
    Dog,
    Ball,
}

impl SpriteKind {
    /// Size delta a freshly added sprite starts with.
    pub fn default_size(self) -> f64 {
        match self {
            SpriteKind::Ball => -10.0,
            SpriteKind::Cat | SpriteKind::Dog => -30.0,
        }
    }

    /// Unscaled drawing extent before the size delta is applied.
    pub fn base_extent(self) -> (f64, f64) {
        match self {
            SpriteKind::Cat | SpriteKind::Dog => (FIGURE_WIDTH, FIGURE_HEIGHT),
            SpriteKind::Ball => (BALL_SIDE, BALL_SIDE),
        }
    }
}

impl Display for SpriteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpriteKind::Cat => "Cat",
            SpriteKind::Dog => "Dog",
            SpriteKind::Ball => "Ball",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Position, t: f64) -> Position {
        Position {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeechText {
    pub message: String,
    pub duration_ms: f64,
    pub is_thought: bool,
}

impl SpeechText {
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.duration_ms > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Glide,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub kind: AnimationKind,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteState {
    pub id: SpriteId,
    #[serde(rename = "type")]
    pub kind: SpriteKind,
    pub position: Position,
    pub rotation: f64,
    pub size: f64,
    pub text: SpeechText,
    pub active_animation: Option<Animation>,
    pub is_running_program: bool,
    pub blocks: Vec<BlockInstance>,
}

impl SpriteState {
    pub fn new(id: SpriteId, kind: SpriteKind) -> Self {
        Self {
            id,
            kind,
            position: START_POSITION,
            rotation: 0.0,
            size: kind.default_size(),
            text: SpeechText::cleared(),
            active_animation: None,
            is_running_program: false,
            blocks: Vec::new(),
        }
    }

    /// Puts everything but identity and program back to a fresh sprite.
    pub fn reset_pose(&mut self) {
        self.position = START_POSITION;
        self.rotation = 0.0;
        self.size = self.kind.default_size();
        self.text = SpeechText::cleared();
        self.active_animation = None;
        self.is_running_program = false;
    }

    pub fn extent(&self) -> (f64, f64) {
        let (width, height) = self.kind.base_extent();
        (width + self.size, height + self.size)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let (width, height) = self.extent();
        BoundingBox {
            left: self.position.x,
            top: self.position.y,
            right: self.position.x + width,
            bottom: self.position.y + height,
        }
    }

    pub fn center(&self) -> Position {
        let (width, height) = self.extent();
        Position::new(
            self.position.x + width / 2.0,
            self.position.y + height / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    /// Boxes that merely touch still count as overlapping.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(self.right < other.left
            || self.left > other.right
            || self.bottom < other.top
            || self.top > other.bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sprites_use_kind_defaults() {
        let ball = SpriteState::new(1, SpriteKind::Ball);
        let dog = SpriteState::new(2, SpriteKind::Dog);
        assert_eq!(ball.size, -10.0);
        assert_eq!(dog.size, -30.0);
        assert_eq!(dog.position, START_POSITION);
        assert!(!dog.text.is_visible());
    }

    #[test]
    fn bounding_box_grows_with_size() {
        let mut ball = SpriteState::new(1, SpriteKind::Ball);
        ball.position = Position::new(0.0, 0.0);
        ball.size = 10.0;
        let bbox = ball.bounding_box();
        assert_eq!(bbox.right, 60.0);
        assert_eq!(bbox.bottom, 60.0);
        assert_eq!(ball.center(), Position::new(30.0, 30.0));
    }

    #[test]
    fn touching_boxes_overlap() {
        let a = BoundingBox { left: 0.0, top: 0.0, right: 10.0, bottom: 10.0 };
        let b = BoundingBox { left: 10.0, top: 10.0, right: 20.0, bottom: 20.0 };
        let c = BoundingBox { left: 10.5, top: 0.0, right: 20.0, bottom: 10.0 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn reset_pose_keeps_program() {
        let mut cat = SpriteState::new(3, SpriteKind::Cat);
        cat.blocks.push(BlockInstance::new("a", "move"));
        cat.position = Position::new(1.0, 2.0);
        cat.rotation = 90.0;
        cat.is_running_program = true;
        cat.reset_pose();
        assert_eq!(cat.position, START_POSITION);
        assert_eq!(cat.rotation, 0.0);
        assert!(!cat.is_running_program);
        assert_eq!(cat.blocks.len(), 1);
    }

    #[test]
    fn lerp_hits_both_ends() {
        let from = Position::new(0.0, 10.0);
        let to = Position::new(100.0, -10.0);
        assert_eq!(from.lerp(to, 0.0), from);
        assert_eq!(from.lerp(to, 1.0), to);
        assert_eq!(from.lerp(to, 0.5), Position::new(50.0, 0.0));
    }
}
