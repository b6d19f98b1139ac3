//! Static block vocabulary: every block type the editor offers, with its
//! category, display template and field definitions.
//!
//! Nothing here runs. The engine uses the field names as the contract for what
//! it reads from a normalized block, and `validate` checks programs against it.

use serde::Serialize;
use std::fmt::{Display, Formatter};

pub const WHEN_FLAG_CLICKED: &str = "when_flag_clicked";
pub const REPEAT: &str = "repeat";
pub const MOUSE_POINTER: &str = "MOUSE_POINTER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Event,
    Motion,
    Looks,
    Control,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Event,
        Category::Motion,
        Category::Looks,
        Category::Control,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Event => "Event",
            Category::Motion => "Motion",
            Category::Looks => "Looks",
            Category::Control => "Control",
        }
    }

    pub fn colour(self) -> &'static str {
        match self {
            Category::Event => "#ffbf00",
            Category::Motion => "#4d97fe",
            Category::Looks => "#9966ff",
            Category::Control => "#ffab19",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    /// Decorative icon; carries no value and never appears in `fields`.
    ImageDecoration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldDefault {
    Number(f64),
    Text(&'static str),
    Image(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FieldSpec {
    const fn number(name: &'static str, default: f64) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
            default: FieldDefault::Number(default),
            min: None,
            max: None,
        }
    }

    const fn number_min(name: &'static str, default: f64, min: f64) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
            default: FieldDefault::Number(default),
            min: Some(min),
            max: None,
        }
    }

    const fn angle(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
            default: FieldDefault::Number(15.0),
            min: Some(0.0),
            max: Some(360.0),
        }
    }

    const fn text(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            default: FieldDefault::Text(default),
            min: None,
            max: None,
        }
    }

    const fn image(src: &'static str) -> Self {
        Self {
            name: "",
            kind: FieldKind::ImageDecoration,
            default: FieldDefault::Image(src),
            min: None,
            max: None,
        }
    }

    /// True for specs that name a value the engine reads.
    pub fn carries_value(&self) -> bool {
        self.kind != FieldKind::ImageDecoration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockType {
    pub type_id: &'static str,
    pub category: Category,
    pub template: &'static str,
    pub fields: &'static [FieldSpec],
    /// Hat blocks start a chain and cannot follow another block.
    pub accepts_previous: bool,
}

impl BlockType {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .filter(|spec| spec.carries_value())
            .find(|spec| spec.name == name)
    }

    pub fn value_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|spec| spec.carries_value())
    }
}

macro_rules! block {
    ($type_id:expr, $category:expr, $template:expr, [$($field:expr),* $(,)?] $(,)?) => {
        BlockType {
            type_id: $type_id,
            category: $category,
            template: $template,
            fields: &[$($field),*],
            accepts_previous: true,
        }
    };
}

static VOCABULARY: &[BlockType] = &[
    BlockType {
        type_id: WHEN_FLAG_CLICKED,
        category: Category::Event,
        template: "when %1 clicked",
        fields: &[FieldSpec::image("/play.svg")],
        accepts_previous: false,
    },
    block!(
        "move",
        Category::Motion,
        "move %1 steps",
        [FieldSpec::number("x_position", 20.0)],
    ),
    block!(
        "clockwise",
        Category::Motion,
        "turn %1 %2 degrees",
        [FieldSpec::image("/rotate-right.svg"), FieldSpec::angle("angle")],
    ),
    block!(
        "anticlockwise",
        Category::Motion,
        "turn %1 %2 degrees",
        [FieldSpec::image("/rotate-left.svg"), FieldSpec::angle("angle")],
    ),
    block!(
        "go_to",
        Category::Motion,
        "go to x: %1 y: %2",
        [
            FieldSpec::number("x_position", 0.0),
            FieldSpec::number("y_position", 0.0),
        ],
    ),
    block!("go_to_random", Category::Motion, "go to random position", []),
    block!(
        "glide",
        Category::Motion,
        "glide %1 secs to x: %2 y: %3",
        [
            FieldSpec::number_min("seconds", 1.0, 0.0),
            FieldSpec::number("x_position", 0.0),
            FieldSpec::number("y_position", 0.0),
        ],
    ),
    block!(
        "point_towards",
        Category::Motion,
        "point towards %1",
        [FieldSpec::text("target", MOUSE_POINTER)],
    ),
    block!(
        "change_x_by",
        Category::Motion,
        "change x by %1",
        [FieldSpec::number("delta_x", 10.0)],
    ),
    block!(
        "set_x",
        Category::Motion,
        "set x to %1",
        [FieldSpec::number("x_position", 0.0)],
    ),
    block!(
        "change_y_by",
        Category::Motion,
        "change y by %1",
        [FieldSpec::number("delta_y", 10.0)],
    ),
    block!(
        "set_y",
        Category::Motion,
        "set y to %1",
        [FieldSpec::number("y_position", 0.0)],
    ),
    block!(
        "say_for_seconds",
        Category::Looks,
        "say %1 for %2 seconds",
        [
            FieldSpec::text("message", "Hello!"),
            FieldSpec::number_min("seconds", 2.0, 0.0),
        ],
    ),
    block!(
        "say",
        Category::Looks,
        "say %1",
        [FieldSpec::text("message", "Hello!")],
    ),
    block!(
        "think_for_seconds",
        Category::Looks,
        "think %1 for %2 seconds",
        [
            FieldSpec::text("message", "Hmm..."),
            FieldSpec::number_min("seconds", 2.0, 0.0),
        ],
    ),
    block!(
        "think",
        Category::Looks,
        "think %1",
        [FieldSpec::text("message", "Hmm...")],
    ),
    block!(
        "change_size",
        Category::Looks,
        "change size by %1",
        [FieldSpec::number("size", 10.0)],
    ),
    block!(
        "wait",
        Category::Control,
        "wait %1 secs",
        [FieldSpec::number_min("seconds", 1.0, 0.0)],
    ),
    block!(
        REPEAT,
        Category::Control,
        "repeat above block %1 times.",
        [FieldSpec::number_min("TIMES", 10.0, 1.0)],
    ),
];

pub fn vocabulary() -> &'static [BlockType] {
    VOCABULARY
}

pub fn lookup(type_id: &str) -> Option<&'static BlockType> {
    VOCABULARY.iter().find(|block| block.type_id == type_id)
}

/// Block types grouped the way the editor flyout lists them.
pub fn toolbox() -> Vec<(Category, Vec<&'static BlockType>)> {
    Category::ALL
        .iter()
        .map(|category| {
            let entries = VOCABULARY
                .iter()
                .filter(|block| block.category == *category)
                .collect::<Vec<_>>();
            (*category, entries)
        })
        .collect()
}
