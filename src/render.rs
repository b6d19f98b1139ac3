use crate::sprite::{Position, SpriteId, SpriteKind, SpriteState};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub visible: bool,
    pub text: String,
    pub thought: bool,
}

/// Everything the drawing side needs for one sprite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpriteView {
    pub id: SpriteId,
    #[serde(rename = "type")]
    pub kind: SpriteKind,
    pub position: Position,
    pub size: f64,
    pub rotation: f64,
    /// Only the dog artwork is sized explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub tooltip: Tooltip,
}

pub fn render(sprite: &SpriteState) -> SpriteView {
    let tooltip = Tooltip {
        visible: sprite.text.is_visible(),
        text: sprite.text.message.clone(),
        thought: sprite.text.is_thought,
    };
    let (width, height, rotation) = match sprite.kind {
        SpriteKind::Dog => {
            let (w, h) = sprite.extent();
            // The dog artwork faces the other way.
            (Some(w), Some(h), -sprite.rotation)
        }
        SpriteKind::Cat | SpriteKind::Ball => (None, None, sprite.rotation),
    };
    SpriteView {
        id: sprite.id,
        kind: sprite.kind,
        position: sprite.position,
        size: sprite.size,
        rotation,
        width,
        height,
        tooltip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::SpeechText;

    #[test]
    fn dog_gets_explicit_extent_and_mirrored_rotation() {
        let mut dog = SpriteState::new(1, SpriteKind::Dog);
        dog.rotation = 45.0;
        let view = render(&dog);
        assert_eq!(view.rotation, -45.0);
        assert!(view.width.is_some() && view.height.is_some());
    }

    #[test]
    fn tooltip_follows_speech() {
        let mut cat = SpriteState::new(2, SpriteKind::Cat);
        assert!(!render(&cat).tooltip.visible);
        cat.text = SpeechText {
            message: "Hmm...".to_string(),
            duration_ms: 100.0,
            is_thought: true,
        };
        let view = render(&cat);
        assert!(view.tooltip.visible);
        assert!(view.tooltip.thought);
        assert_eq!(view.tooltip.text, "Hmm...");
        assert!(view.width.is_none());
    }
}
