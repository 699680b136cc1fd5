/// Numeric gameplay rules: pure functions, no side effects beyond their
/// `&mut` argument.
///
/// ## Run scalars
/// ┌──────────────────────┬────────┬──────────────┬──────────────┐
/// │ Event                │ Fear   │ Enlightenment│ Notes        │
/// ├──────────────────────┼────────┼──────────────┼──────────────┤
/// │ Villain contact      │ +2     │              │ cap 100      │
/// │ Pickup collected     │ −10    │ +5           │ floor 0      │
/// │ Calm Breath          │ −20    │              │ floor 0      │
/// │ Villain integrated   │ −30    │ +20          │ floor 0      │
/// └──────────────────────┴────────┴──────────────┴──────────────┘
/// Fear is clamped to [0, 100]. Enlightenment has a floor of 0 and no cap.
///
/// ## Player controller
/// ┌──────────────┬───────────────────────────────┬──────────────────┐
/// │ Input        │ Accelerated                   │ Direct           │
/// ├──────────────┼───────────────────────────────┼──────────────────┤
/// │ left held    │ vx = max(vx − accel, −max)    │ vx = −speed      │
/// │ right held   │ vx = min(vx + accel, max)     │ vx = +speed      │
/// │ neither      │ vx = vx · friction            │ vx = 0           │
/// │ jump+grounded│ vy = −jump_velocity           │ same             │
/// └──────────────┴───────────────────────────────┴──────────────────┘
/// Left wins when both directions are held.

use super::catalog::WORLD_WIDTH;
use super::entity::{Facing, FrameInput, Player, Vec2};
use crate::config::{MovementModel, Tuning};

pub const FEAR_MAX: i32 = 100;
pub const FEAR_START: i32 = 50;

pub const CONTACT_FEAR: i32 = 2;
pub const PICKUP_ENLIGHTENMENT: i32 = 5;
pub const PICKUP_FEAR_RELIEF: i32 = 10;
pub const CALM_FEAR_RELIEF: i32 = 20;
pub const INTEGRATE_ENLIGHTENMENT: i32 = 20;
pub const INTEGRATE_FEAR_RELIEF: i32 = 30;

/// Enlightenment needed before a level may complete.
pub const COMPLETION_ENLIGHTENMENT: i32 = 50;

pub const MIRROR_DAMAGE: i32 = 30;
pub const LEAP_DISTANCE: f32 = 300.0;
pub const LEAP_MIN_X: f32 = 50.0;
pub const LEAP_MAX_X: f32 = WORLD_WIDTH - 50.0;

/// Radius inside which a villain stops chasing and may be integrated.
pub const PROXIMITY: f32 = 100.0;

pub const KNOCKBACK_X: f32 = 300.0;
pub const KNOCKBACK_Y: f32 = -200.0;

// Durations, milliseconds of real time
pub const FREEZE_MS: u64 = 5_000;
pub const SLOW_MS: u64 = 5_000;
pub const SLOW_TIME_SCALE: f32 = 0.5;
pub const DIALOGUE_MS: u64 = 5_000;
pub const ADVANCE_DELAY_MS: u64 = 2_000;
pub const REMOVE_DELAY_MS: u64 = 2_000;
pub const GUIDE_INTRO_DELAY_MS: u64 = 1_000;
pub const VILLAIN_ENGAGE_DELAY_MS: u64 = 3_000;

// ── Run scalars ──

/// Shift fear by `delta`, clamped to [0, 100].
pub fn shift_fear(fear: i32, delta: i32) -> i32 {
    (fear + delta).clamp(0, FEAR_MAX)
}

/// Shift enlightenment by `delta`, floored at 0.
pub fn shift_enlightenment(enlightenment: i32, delta: i32) -> i32 {
    (enlightenment + delta).max(0)
}

/// Enlightenment as a 0..=100 bar.
pub fn enlightenment_percent(enlightenment: i32) -> u8 {
    enlightenment.clamp(0, 100) as u8
}

// ── Player controller ──

/// Apply one tick of directional input to the player. Returns true if a
/// jump impulse was applied.
pub fn control_player(player: &mut Player, input: &FrameInput, tuning: &Tuning) -> bool {
    if input.left {
        player.facing = Facing::Left;
    } else if input.right {
        player.facing = Facing::Right;
    }

    let vx = player.vel.x;
    player.vel.x = match tuning.movement {
        MovementModel::Accelerated => {
            if input.left {
                (vx - tuning.acceleration).max(-tuning.max_speed)
            } else if input.right {
                (vx + tuning.acceleration).min(tuning.max_speed)
            } else {
                vx * tuning.friction
            }
        }
        MovementModel::Direct => {
            if input.left {
                -tuning.direct_speed
            } else if input.right {
                tuning.direct_speed
            } else {
                0.0
            }
        }
    };

    if input.jump && input.contacts.grounded {
        player.vel.y = -tuning.jump_velocity;
        return true;
    }
    false
}

/// Impulse pushing the player away from a villain.
/// A player exactly level with the villain is pushed right.
pub fn knockback(player_x: f32, villain_x: f32) -> Vec2 {
    let dir = if player_x < villain_x { -1.0 } else { 1.0 };
    Vec2::new(dir * KNOCKBACK_X, KNOCKBACK_Y)
}

/// Fractal Leap destination x.
pub fn leap_target(x: f32, facing: Facing) -> f32 {
    (x + facing.sign() * LEAP_DISTANCE).clamp(LEAP_MIN_X, LEAP_MAX_X)
}

// ── Visual factor ──

/// Player opacity: 0.7 at no enlightenment, 1.0 from 100 up.
pub fn player_alpha(enlightenment: i32) -> f32 {
    0.7 + 0.3 * enlightenment_factor(enlightenment)
}

/// Hue in [0, 1), cycling once per second at zero enlightenment and up to
/// twice as fast at full enlightenment.
pub fn player_hue(clock_ms: u64, enlightenment: i32) -> f32 {
    let cycles = clock_ms as f64 / 1000.0 * (1.0 + enlightenment_factor(enlightenment) as f64);
    cycles.fract() as f32
}

fn enlightenment_factor(enlightenment: i32) -> f32 {
    enlightenment.clamp(0, 100) as f32 / 100.0
}
