//! Block interpreter.
//!
//! [`dispatch`] is pure: it maps one block and the sprite's current state to
//! an [`Effect`]. The chain runner applies effects to the store, sleeping for
//! timed blocks, and splices `repeat` expansions into the chain it walks.

use crate::blocks::{MOUSE_POINTER, REPEAT};
use crate::playground::{Shared, StageState};
use crate::program::{coerce_number, is_truthy, BlockInstance};
use crate::sprite::{Animation, AnimationKind, Position, SpeechText, SpriteId, SpriteState};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchContext {
    /// Last observed pointer position, in stage coordinates.
    pub pointer: Position,
    /// Target for `go_to_random`, drawn by the caller.
    pub random_point: Position,
    pub say_display_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Commit this sprite state and move on.
    Update(SpriteState),
    /// Commit, then clear the speech bubble after the delay without holding
    /// up the chain.
    SpeakFor {
        state: SpriteState,
        clear_after_ms: f64,
    },
    Glide {
        to: Position,
        duration_ms: f64,
    },
    Wait {
        duration_ms: f64,
    },
    Repeat {
        times: f64,
    },
    /// Nothing to do; advance.
    Pass,
}

#[derive(Debug, Error, PartialEq)]
pub enum ChainError {
    #[error("chain dispatched more than {limit} blocks and was stopped as runaway")]
    Runaway { limit: usize },
}

pub fn dispatch(block: &BlockInstance, sprite: &SpriteState, ctx: &DispatchContext) -> Effect {
    let mut next = sprite.clone();
    match block.type_id.as_str() {
        "go_to" => {
            next.position = Position::new(
                block.number_field("x_position"),
                block.number_field("y_position"),
            );
        }
        "go_to_random" => next.position = ctx.random_point,
        "clockwise" => next.rotation += block.number_field("angle"),
        "anticlockwise" => next.rotation -= block.number_field("angle"),
        "move" => next.position.x += block.number_field("x_position"),
        "change_x_by" => next.position.x += block.number_field("delta_x"),
        "change_y_by" => next.position.y += block.number_field("delta_y"),
        "set_x" => next.position.x = block.number_field("x_position"),
        "set_y" => next.position.y = block.number_field("y_position"),
        "glide" => {
            return Effect::Glide {
                to: Position::new(
                    block.number_field("x_position"),
                    block.number_field("y_position"),
                ),
                duration_ms: block.number_field("seconds") * 1000.0,
            };
        }
        "point_towards" => {
            if block.text_field("target") != MOUSE_POINTER {
                return Effect::Pass;
            }
            let center = sprite.center();
            let angle = (ctx.pointer.y - center.y)
                .atan2(ctx.pointer.x - center.x)
                .to_degrees();
            next.rotation = if angle < 0.0 { angle + 360.0 } else { angle };
            next.active_animation = None;
        }
        "say" | "think" => {
            next.text = SpeechText {
                message: block.text_field("message"),
                duration_ms: ctx.say_display_ms,
                is_thought: block.type_id == "think",
            };
        }
        "say_for_seconds" | "think_for_seconds" => {
            let duration_ms = block.number_field("seconds") * 1000.0;
            next.text = SpeechText {
                message: block.text_field("message"),
                duration_ms,
                is_thought: block.type_id == "think_for_seconds",
            };
            return Effect::SpeakFor {
                state: next,
                clear_after_ms: duration_ms,
            };
        }
        "change_size" => next.size += block.number_field("size"),
        "wait" => {
            // Only falsy values fall back to one second; text such as "soon"
            // reads as NaN and fires at once.
            let seconds = block
                .field("seconds")
                .filter(|value| is_truthy(value))
                .map(coerce_number)
                .unwrap_or(1.0);
            return Effect::Wait {
                duration_ms: seconds * 1000.0,
            };
        }
        REPEAT => {
            // An explicit numeric count is kept even when zero; other falsy
            // values mean one copy.
            let times = match block.field("TIMES") {
                Some(value) if value.is_number() || is_truthy(value) => coerce_number(value),
                _ => 1.0,
            };
            return Effect::Repeat { times };
        }
        _ => return Effect::Pass,
    }
    Effect::Update(next)
}

/// Builds the continuation after a `repeat`: `times` fresh copies of the
/// block that preceded it, followed by `successor`. Without a preceding block
/// or with a non-positive count the continuation is just `successor`.
///
/// Only the single preceding block is replayed, never a group. Counts round
/// up and are capped at `limit`.
pub fn expand_repeat(
    template: Option<&BlockInstance>,
    times: f64,
    successor: Option<BlockInstance>,
    limit: usize,
    serial: &mut usize,
) -> Option<BlockInstance> {
    let Some(template) = template else {
        return successor;
    };
    if times.is_nan() || times <= 0.0 {
        return successor;
    }
    let wanted = times.ceil();
    let count = if wanted > limit as f64 {
        warn!(block = %template.id, times, limit, "repeat count clamped");
        limit
    } else {
        wanted as usize
    };

    let first = *serial;
    *serial += count;
    let mut chain = successor;
    for i in (0..count).rev() {
        let mut clone = template.detached();
        clone.id = format!("{}~{}", template.id, first + i + 1);
        clone.next = chain.map(Box::new);
        chain = Some(clone);
    }
    chain
}

/// Converts a block's millisecond figure into a sleep. Negative, NaN and
/// unrepresentable values fire immediately.
pub fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

enum After {
    Advance,
    Sleep(Duration),
    Glide {
        from: Position,
        to: Position,
        duration_ms: f64,
    },
    Repeat {
        times: f64,
    },
    Stop,
}

/// Starts one chain for a sprite as a tracked task. Must be called from
/// inside a Tokio runtime.
pub(crate) fn spawn_chain(
    shared: &Arc<Shared>,
    state: &mut StageState,
    sprite: SpriteId,
    entry: BlockInstance,
) {
    let token = state.tasks.start_chain(sprite);
    state.commit(sprite, |s| s.is_running_program = true);
    let span = info_span!("chain", sprite, entry = %entry.id);
    let task_shared = Arc::clone(shared);
    shared
        .tracker
        .spawn(run_chain(task_shared, sprite, entry, token).instrument(span));
}

async fn run_chain(
    shared: Arc<Shared>,
    sprite: SpriteId,
    entry: BlockInstance,
    token: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("chain cancelled");
            return;
        }
        outcome = drive_chain(&shared, sprite, entry, &token) => outcome,
    };
    match outcome {
        Ok(steps) => debug!(steps, "chain finished"),
        Err(err) => error!(%err, "chain stopped"),
    }
    let mut state = shared.lock();
    if state.tasks.finish_chain(sprite, &token) {
        state.commit(sprite, |s| s.is_running_program = false);
    }
}

async fn drive_chain(
    shared: &Arc<Shared>,
    sprite: SpriteId,
    entry: BlockInstance,
    token: &CancellationToken,
) -> Result<usize, ChainError> {
    let config = &shared.config;
    let mut current = Some(entry);
    let mut previous: Option<BlockInstance> = None;
    let mut steps = 0usize;
    let mut serial = 0usize;

    while let Some(mut block) = current.take() {
        steps += 1;
        if steps > config.max_steps {
            return Err(ChainError::Runaway {
                limit: config.max_steps,
            });
        }
        let after = {
            let mut state = shared.lock();
            if token.is_cancelled() {
                return Ok(steps);
            }
            step(shared, &mut state, sprite, &block)
        };
        let successor = block.next.take().map(|next| *next);

        match after {
            After::Stop => return Ok(steps),
            After::Advance => {
                if successor.is_some() {
                    sleep(config.step_delay()).await;
                }
            }
            After::Sleep(duration) => sleep(duration).await,
            After::Glide {
                from,
                to,
                duration_ms,
            } => {
                if !glide(shared, sprite, token, from, to, duration_ms).await {
                    return Ok(steps);
                }
                if successor.is_some() {
                    sleep(config.step_delay()).await;
                }
            }
            After::Repeat { times } => {
                current = expand_repeat(
                    previous.as_ref(),
                    times,
                    successor,
                    config.max_steps,
                    &mut serial,
                );
                previous = Some(block);
                continue;
            }
        }
        previous = Some(block);
        current = successor;
    }
    Ok(steps)
}

fn step(
    shared: &Arc<Shared>,
    state: &mut StageState,
    sprite: SpriteId,
    block: &BlockInstance,
) -> After {
    // Only draw when needed so seeded runs do not depend on chain length.
    let random_point = if block.type_id == "go_to_random" {
        state.random_point(shared.config.random_range)
    } else {
        Position::default()
    };
    let ctx = DispatchContext {
        pointer: state.pointer,
        random_point,
        say_display_ms: shared.config.say_display_ms,
    };
    let Some(current) = state.store.get(sprite) else {
        return After::Stop;
    };
    let from = current.position;
    debug!(block = %block.id, kind = %block.type_id, "dispatch");

    match dispatch(block, current, &ctx) {
        Effect::Update(next) => {
            state.commit_state(sprite, next);
            After::Advance
        }
        Effect::SpeakFor {
            state: next,
            clear_after_ms,
        } => {
            state.commit_state(sprite, next);
            spawn_speech_clear(shared, state, sprite, millis(clear_after_ms));
            After::Advance
        }
        Effect::Glide { to, duration_ms } => {
            state.commit(sprite, |s| {
                s.active_animation = Some(Animation {
                    kind: AnimationKind::Glide,
                    duration_ms,
                });
            });
            After::Glide {
                from,
                to,
                duration_ms,
            }
        }
        Effect::Wait { duration_ms } => After::Sleep(millis(duration_ms)),
        Effect::Repeat { times } => After::Repeat { times },
        Effect::Pass => After::Advance,
    }
}

/// Moves the sprite towards `to` once per frame, then snaps onto it.
/// Returns false when the chain should stop.
async fn glide(
    shared: &Shared,
    sprite: SpriteId,
    token: &CancellationToken,
    from: Position,
    to: Position,
    duration_ms: f64,
) -> bool {
    let started = Instant::now();
    if duration_ms.is_finite() && duration_ms > 0.0 {
        loop {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let t = (elapsed_ms / duration_ms).min(1.0);
            if t >= 1.0 {
                break;
            }
            {
                let mut state = shared.lock();
                if token.is_cancelled() {
                    return false;
                }
                if state
                    .commit(sprite, |s| s.position = from.lerp(to, t))
                    .is_none()
                {
                    return false;
                }
            }
            sleep(shared.config.frame_interval()).await;
        }
    }
    let mut state = shared.lock();
    if token.is_cancelled() {
        return false;
    }
    state
        .commit(sprite, |s| {
            s.active_animation = None;
            s.position = to;
        })
        .is_some()
}

fn spawn_speech_clear(
    shared: &Arc<Shared>,
    state: &mut StageState,
    sprite: SpriteId,
    after: Duration,
) {
    let token = state.tasks.speech_token(sprite);
    let task_shared = Arc::clone(shared);
    let task = async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            _ = sleep(after) => {
                let mut state = task_shared.lock();
                if !token.is_cancelled() {
                    state.commit(sprite, |s| s.text = SpeechText::cleared());
                }
            }
        }
    };
    shared
        .tracker
        .spawn(task.instrument(debug_span!("speech_clear", sprite)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::SpriteKind;
    use serde_json::{json, Value};

    fn ctx() -> DispatchContext {
        DispatchContext {
            pointer: Position::new(0.0, 0.0),
            random_point: Position::new(123.0, 45.0),
            say_display_ms: 100.0,
        }
    }

    fn cat_at(x: f64, y: f64) -> SpriteState {
        let mut cat = SpriteState::new(1, SpriteKind::Cat);
        cat.position = Position::new(x, y);
        cat
    }

    fn updated(effect: Effect) -> SpriteState {
        match effect {
            Effect::Update(state) => state,
            other => panic!("expected an update, got {:?}", other),
        }
    }

    #[test]
    fn go_to_sets_exact_position() {
        let block = BlockInstance::new("g", "go_to")
            .with_field("x_position", 5)
            .with_field("y_position", -3);
        for (x, y) in [(0.0, 0.0), (999.0, -12.5)] {
            let next = updated(dispatch(&block, &cat_at(x, y), &ctx()));
            assert_eq!(next.position, Position::new(5.0, -3.0));
        }
    }

    #[test]
    fn motion_blocks_adjust_axes_and_rotation() {
        let sprite = cat_at(10.0, 20.0);
        let moved = updated(dispatch(
            &BlockInstance::new("m", "move").with_field("x_position", 10),
            &sprite,
            &ctx(),
        ));
        assert_eq!(moved.position, Position::new(20.0, 20.0));

        let dy = updated(dispatch(
            &BlockInstance::new("c", "change_y_by").with_field("delta_y", -5),
            &sprite,
            &ctx(),
        ));
        assert_eq!(dy.position.y, 15.0);

        let set_x = updated(dispatch(
            &BlockInstance::new("s", "set_x").with_field("x_position", "7"),
            &sprite,
            &ctx(),
        ));
        assert_eq!(set_x.position.x, 7.0);

        let left = updated(dispatch(
            &BlockInstance::new("a", "anticlockwise").with_field("angle", 15),
            &sprite,
            &ctx(),
        ));
        assert_eq!(left.rotation, -15.0);

        let random = updated(dispatch(&BlockInstance::new("r", "go_to_random"), &sprite, &ctx()));
        assert_eq!(random.position, Position::new(123.0, 45.0));
    }

    #[test]
    fn missing_fields_propagate_nan() {
        let next = updated(dispatch(&BlockInstance::new("m", "move"), &cat_at(0.0, 0.0), &ctx()));
        assert!(next.position.x.is_nan());
        assert_eq!(next.position.y, 0.0);
    }

    #[test]
    fn point_towards_pointer_is_normalized() {
        let mut ball = SpriteState::new(1, SpriteKind::Ball);
        ball.position = Position::new(0.0, 0.0);
        ball.size = 0.0;
        let block = BlockInstance::new("p", "point_towards").with_field("target", MOUSE_POINTER);
        // Centre is (25, 25); pointer straight above it.
        let mut context = ctx();
        context.pointer = Position::new(25.0, 0.0);
        let next = updated(dispatch(&block, &ball, &context));
        assert!((next.rotation - 270.0).abs() < 1e-9);

        let other = BlockInstance::new("p", "point_towards").with_field("target", "Cat");
        assert_eq!(dispatch(&other, &ball, &context), Effect::Pass);
    }

    #[test]
    fn say_and_think_set_speech() {
        let think = BlockInstance::new("t", "think").with_field("message", "Hmm...");
        let next = updated(dispatch(&think, &cat_at(0.0, 0.0), &ctx()));
        assert!(next.text.is_thought);
        assert_eq!(next.text.duration_ms, 100.0);

        let timed = BlockInstance::new("s", "say_for_seconds")
            .with_field("message", "Hello!")
            .with_field("seconds", 2);
        match dispatch(&timed, &cat_at(0.0, 0.0), &ctx()) {
            Effect::SpeakFor {
                state,
                clear_after_ms,
            } => {
                assert_eq!(clear_after_ms, 2000.0);
                assert_eq!(state.text.message, "Hello!");
                assert!(!state.text.is_thought);
            }
            other => panic!("expected SpeakFor, got {:?}", other),
        }
    }

    #[test]
    fn wait_defaults_to_one_second() {
        let sprite = cat_at(0.0, 0.0);
        for block in [
            BlockInstance::new("w", "wait"),
            BlockInstance::new("w", "wait").with_field("seconds", 0),
            BlockInstance::new("w", "wait").with_field("seconds", ""),
            BlockInstance::new("w", "wait").with_field("seconds", Value::Null),
            BlockInstance::new("w", "wait").with_field("seconds", false),
        ] {
            assert_eq!(
                dispatch(&block, &sprite, &ctx()),
                Effect::Wait {
                    duration_ms: 1000.0
                }
            );
        }
        let half = BlockInstance::new("w", "wait").with_field("seconds", 0.5);
        assert_eq!(
            dispatch(&half, &sprite, &ctx()),
            Effect::Wait { duration_ms: 500.0 }
        );
    }

    #[test]
    fn wait_on_unreadable_text_fires_at_once() {
        let sprite = cat_at(0.0, 0.0);
        let soon = BlockInstance::new("w", "wait").with_field("seconds", "soon");
        match dispatch(&soon, &sprite, &ctx()) {
            Effect::Wait { duration_ms } => {
                assert!(duration_ms.is_nan());
                assert_eq!(millis(duration_ms), Duration::ZERO);
            }
            other => panic!("expected Wait, got {:?}", other),
        }
    }

    #[test]
    fn repeat_count_fallbacks() {
        let sprite = cat_at(0.0, 0.0);
        let times = |value: Value| {
            let block = BlockInstance::new("r", "repeat").with_field("TIMES", value);
            dispatch(&block, &sprite, &ctx())
        };
        assert_eq!(times(Value::Null), Effect::Repeat { times: 1.0 });
        assert_eq!(times(json!("")), Effect::Repeat { times: 1.0 });
        assert_eq!(times(json!(false)), Effect::Repeat { times: 1.0 });
        assert_eq!(times(json!(0)), Effect::Repeat { times: 0.0 });
        assert_eq!(times(json!("4")), Effect::Repeat { times: 4.0 });
    }

    #[test]
    fn unknown_and_hat_blocks_pass() {
        let sprite = cat_at(0.0, 0.0);
        assert_eq!(
            dispatch(&BlockInstance::new("x", "teleport"), &sprite, &ctx()),
            Effect::Pass
        );
        assert_eq!(
            dispatch(&BlockInstance::new("f", "when_flag_clicked"), &sprite, &ctx()),
            Effect::Pass
        );
        assert_eq!(
            dispatch(&BlockInstance::new("r", "repeat"), &sprite, &ctx()),
            Effect::Repeat { times: 1.0 }
        );
    }

    #[test]
    fn repeat_clones_the_preceding_block() {
        let template = BlockInstance::new("m", "move")
            .with_field("x_position", 10)
            .with_next(BlockInstance::new("r", "repeat"));
        let after = BlockInstance::new("s", "say");
        let mut serial = 0;
        let chain = expand_repeat(Some(&template), 3.0, Some(after), 100, &mut serial)
            .expect("expansion yields a chain");
        let ids = chain.chain().map(|b| b.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["m~1", "m~2", "m~3", "s"]);
        assert!(chain.chain().take(3).all(|b| b.type_id == "move"));
        assert_eq!(serial, 3);
    }

    #[test]
    fn repeat_without_template_or_count_falls_through() {
        let after = BlockInstance::new("s", "say");
        let template = BlockInstance::new("m", "move");
        let mut serial = 0;
        let none = expand_repeat(None, 3.0, Some(after.clone()), 100, &mut serial);
        assert_eq!(none.map(|b| b.id), Some("s".to_string()));
        for times in [0.0, -2.0, f64::NAN] {
            let chain = expand_repeat(Some(&template), times, Some(after.clone()), 100, &mut serial);
            assert_eq!(chain.map(|b| b.chain_len()), Some(1));
        }
        assert!(expand_repeat(Some(&template), 0.0, None, 100, &mut serial).is_none());
    }

    #[test]
    fn repeat_rounds_up_and_clamps() {
        let template = BlockInstance::new("m", "move");
        let mut serial = 0;
        let rounded = expand_repeat(Some(&template), 2.2, None, 100, &mut serial);
        assert_eq!(rounded.map(|b| b.chain_len()), Some(3));
        let clamped = expand_repeat(Some(&template), 1e12, None, 5, &mut serial);
        assert_eq!(clamped.map(|b| b.chain_len()), Some(5));
    }

    #[test]
    fn millis_guards_odd_values() {
        assert_eq!(millis(1500.0), Duration::from_millis(1500));
        assert_eq!(millis(-3.0), Duration::ZERO);
        assert_eq!(millis(f64::NAN), Duration::ZERO);
        assert_eq!(millis(f64::INFINITY), Duration::ZERO);
    }
}
