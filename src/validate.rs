//! Lint pass over a normalized program. Findings are advisory: the engine
//! runs malformed programs anyway and degrades per block.

use crate::blocks::{lookup, FieldKind, FieldSpec, REPEAT};
use crate::program::{coerce_number, BlockInstance};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramWarning {
    pub block_id: String,
    pub message: String,
}

impl Display for ProgramWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block '{}': {}", self.block_id, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgramReport {
    pub warnings: Vec<ProgramWarning>,
}

impl ProgramReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, block: &BlockInstance, message: String) {
        self.warnings.push(ProgramWarning {
            block_id: block.id.clone(),
            message,
        });
    }
}

impl Display for ProgramReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, warning) in self.warnings.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", warning)?;
        }
        Ok(())
    }
}

pub fn validate(blocks: &[BlockInstance]) -> ProgramReport {
    let mut report = ProgramReport::default();
    let mut seen = HashSet::new();
    for head in blocks {
        validate_chain(head, &mut seen, &mut report);
    }
    report
}

fn validate_chain<'a>(
    head: &'a BlockInstance,
    seen: &mut HashSet<&'a str>,
    report: &mut ProgramReport,
) {
    for (position, block) in head.chain().enumerate() {
        if !seen.insert(block.id.as_str()) {
            report.warn(block, "Duplicate block id.".to_string());
        }
        if let Some(body) = block.body.as_deref() {
            validate_chain(body, seen, report);
        }

        let Some(block_type) = lookup(&block.type_id) else {
            report.warn(
                block,
                format!("Unknown block type '{}'; it will be skipped.", block.type_id),
            );
            continue;
        };
        if position > 0 && !block_type.accepts_previous {
            report.warn(
                block,
                format!("'{}' can only start a chain.", block.type_id),
            );
        }
        if position == 0 && block.type_id == REPEAT {
            report.warn(
                block,
                "'repeat' has no block above it to repeat.".to_string(),
            );
        }
        for spec in block_type.value_fields() {
            check_field(block, spec, report);
        }
    }
}

fn check_field(block: &BlockInstance, spec: &FieldSpec, report: &mut ProgramReport) {
    let Some(value) = block.fields.get(spec.name) else {
        // repeat falls back to a single copy; everything else reads NaN or "".
        if block.type_id != REPEAT {
            report.warn(block, format!("Missing field '{}'.", spec.name));
        }
        return;
    };
    if spec.kind != FieldKind::Number {
        return;
    }
    let number = coerce_number(value);
    if number.is_nan() {
        report.warn(
            block,
            format!("Field '{}' is not a number ({}).", spec.name, value),
        );
        return;
    }
    if let Some(min) = spec.min {
        if number < min {
            report.warn(
                block,
                format!("Field '{}' is below its minimum {} ({}).", spec.name, min, number),
            );
        }
    }
    if let Some(max) = spec.max {
        if number > max {
            report.warn(
                block,
                format!("Field '{}' is above its maximum {} ({}).", spec.name, max, number),
            );
        }
    }
}
