/// Arcade physics: the body integrator the front-end runs before each core
/// tick. The core itself never moves bodies by velocity; it only reads the
/// `Contacts` this layer reports.
///
/// ## Step
///
///   1. `vel.y += GRAVITY · dt`
///   2. Move along x, push out of any platform it now penetrates.
///   3. Move along y, push out; landing on a top edge sets *grounded*.
///   4. Clamp to world bounds; the bottom edge also counts as ground.
///
/// `dt` is real frame time multiplied by the session's `time_scale`, so
/// Calm Breath slows every body uniformly.
///
/// ## Contacts
///
/// Reported after movement, for the player only:
///   - `grounded` : player landed on (or is resting on) a surface
///   - `pickups`  : ids of pickups whose box overlaps the player
///   - `villains` : ids of villains whose box overlaps the player

use super::catalog::{WORLD_HEIGHT, WORLD_WIDTH};
use super::entity::{Aabb, Contacts, Pickup, Platform, Player, Vec2, Villain, PICKUP_SIZE, PLAYER_SIZE, VILLAIN_SIZE};

pub const GRAVITY: f32 = 700.0;

/// Longest step integrated at once; a stalled frame is not replayed.
pub const MAX_STEP_MS: u32 = 50;

/// Penetration below this depth is treated as touching.
const SKIN: f32 = 0.01;

/// Mutable view of every simulated body for one step.
pub struct Bodies<'a> {
    pub player: &'a mut Player,
    pub villains: &'a mut [Villain],
    pub pickups: &'a mut [Pickup],
    pub platforms: &'a [Platform],
}

// ══════════════════════════════════════════════════════════════
// Step
// ══════════════════════════════════════════════════════════════

pub fn integrate(bodies: Bodies<'_>, dt_ms: u32, time_scale: f32) -> Contacts {
    let dt = dt_ms.min(MAX_STEP_MS) as f32 / 1000.0 * time_scale;
    let platforms = bodies.platforms;

    let player = bodies.player;
    let grounded = move_body(&mut player.pos, &mut player.vel, PLAYER_SIZE, platforms, dt);

    for v in bodies.villains.iter_mut() {
        move_body(&mut v.pos, &mut v.vel, VILLAIN_SIZE, platforms, dt);
    }
    for p in bodies.pickups.iter_mut() {
        move_body(&mut p.pos, &mut p.vel, PICKUP_SIZE, platforms, dt);
    }

    let body = player.body();
    Contacts {
        grounded,
        pickups: bodies.pickups.iter()
            .filter(|p| body.overlaps(&p.body()))
            .map(|p| p.id)
            .collect(),
        villains: bodies.villains.iter()
            .filter(|v| body.overlaps(&v.body()))
            .map(|v| v.id)
            .collect(),
    }
}

/// Returns true if the body ends the step supported from below.
fn move_body(pos: &mut Vec2, vel: &mut Vec2, size: Vec2, platforms: &[Platform], dt: f32) -> bool {
    vel.y += GRAVITY * dt;
    let mut grounded = false;

    // ── Horizontal ──
    pos.x += vel.x * dt;
    for plat in platforms {
        if !penetrates(&Aabb::new(*pos, size), &plat.rect) { continue; }
        if vel.x > 0.0 {
            pos.x = plat.rect.left() - size.x / 2.0;
        } else if vel.x < 0.0 {
            pos.x = plat.rect.right() + size.x / 2.0;
        }
        vel.x = 0.0;
    }

    // ── Vertical ──
    pos.y += vel.y * dt;
    for plat in platforms {
        if !penetrates(&Aabb::new(*pos, size), &plat.rect) { continue; }
        if vel.y > 0.0 {
            pos.y = plat.rect.top() - size.y / 2.0;
            grounded = true;
        } else if vel.y < 0.0 {
            pos.y = plat.rect.bottom() + size.y / 2.0;
        }
        vel.y = 0.0;
    }

    // ── World bounds ──
    let (hw, hh) = (size.x / 2.0, size.y / 2.0);
    if pos.x < hw {
        pos.x = hw;
        vel.x = 0.0;
    } else if pos.x > WORLD_WIDTH - hw {
        pos.x = WORLD_WIDTH - hw;
        vel.x = 0.0;
    }
    if pos.y < hh {
        pos.y = hh;
        vel.y = 0.0;
    } else if pos.y >= WORLD_HEIGHT - hh {
        pos.y = WORLD_HEIGHT - hh;
        vel.y = 0.0;
        grounded = true;
    }

    grounded
}

fn penetrates(a: &Aabb, b: &Aabb) -> bool {
    let dx = a.right().min(b.right()) - a.left().max(b.left());
    let dy = a.bottom().min(b.bottom()) - a.top().max(b.top());
    dx > SKIN && dy > SKIN
}
