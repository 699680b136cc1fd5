/// Villain AI: horizontal chase steering.
///
/// Modes, in priority order:
///   1. **Inert**  : defeated or integrated; never moves again.
///   2. **Frozen** : Dissolve Self is holding it; velocity stays zero.
///   3. **Chase**  : farther than `PROXIMITY` from the player; blend
///      horizontal velocity toward ±`CHASE_SPEED`.
///   4. **Hold**   : within `PROXIMITY`; let horizontal velocity decay.
///
/// Vertical motion is left to physics (gravity, platforms).

use super::entity::{Vec2, Villain};
use super::rules::PROXIMITY;

pub const CHASE_SPEED: f32 = 80.0;
/// Weight kept from the previous velocity each tick.
pub const CHASE_INERTIA: f32 = 0.9;
pub const ANIMATION_STEP: f32 = 0.05;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Inert,
    Frozen,
    Chase,
    Hold,
}

pub fn mode(villain: &Villain, player: Vec2, now_ms: u64) -> Mode {
    if villain.is_defeated() { return Mode::Inert; }
    if villain.is_frozen(now_ms) { return Mode::Frozen; }
    if villain.pos.distance(player) > PROXIMITY { Mode::Chase } else { Mode::Hold }
}

/// One tick of steering. `time_scale` only slows the idle animation; the
/// velocity itself is scaled later by the integrator.
pub fn steer(villain: &mut Villain, player: Vec2, now_ms: u64, time_scale: f32) -> Mode {
    let m = mode(villain, player, now_ms);
    match m {
        Mode::Inert => return m,
        Mode::Frozen => {
            villain.vel.x = 0.0;
        }
        Mode::Chase => {
            let target = if player.x < villain.pos.x { -CHASE_SPEED } else { CHASE_SPEED };
            villain.vel.x = villain.vel.x * CHASE_INERTIA + target * (1.0 - CHASE_INERTIA);
        }
        Mode::Hold => {
            villain.vel.x *= CHASE_INERTIA;
        }
    }
    if villain.frozen_until_ms.is_some() && m != Mode::Frozen {
        villain.frozen_until_ms = None;
    }
    villain.animation_phase += ANIMATION_STEP * time_scale;
    m
}
