/// Entities: Player, Villain (with its defeat/integration state machine),
/// Pickup, Platform, plus the per-tick input record.
///
/// Coordinates are world units (1200 × 700), y grows downward, and every
/// body is an axis-aligned box centred on its position.

use serde::{Deserialize, Serialize};

use super::ability::AbilityId;
use super::catalog::VillainDefinition;

pub const PLAYER_SIZE: Vec2 = Vec2 { x: 32.0, y: 32.0 };
pub const VILLAIN_SIZE: Vec2 = Vec2 { x: 50.0, y: 70.0 };
pub const PICKUP_SIZE: Vec2 = Vec2 { x: 24.0, y: 24.0 };
pub const VILLAIN_MAX_HEALTH: i32 = 100;

#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box given by centre and full size.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Aabb {
    pub center: Vec2,
    pub size: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Aabb { center, size }
    }

    pub fn left(&self) -> f32 { self.center.x - self.size.x / 2.0 }
    pub fn right(&self) -> f32 { self.center.x + self.size.x / 2.0 }
    pub fn top(&self) -> f32 { self.center.y - self.size.y / 2.0 }
    pub fn bottom(&self) -> f32 { self.center.y + self.size.y / 2.0 }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub facing: Facing,
}

impl Player {
    pub fn new(pos: Vec2) -> Self {
        Player { pos, vel: Vec2::ZERO, facing: Facing::Right }
    }

    pub fn body(&self) -> Aabb {
        Aabb::new(self.pos, PLAYER_SIZE)
    }
}

/// Villain state machine.
///
///   Active ──(health ≤ 0)──▶ Defeated ──(integrate, in range)──▶ Integrated
///
/// `Integrated` is terminal. `Defeated` never returns to `Active`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VillainState {
    Active,
    Defeated,
    Integrated,
}

/// Result of a hit.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Damage {
    /// Not `Active`: nothing changed.
    Ignored,
    Wounded,
    /// This hit drove health to zero or below.
    Defeated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Villain {
    pub id: usize,
    pub name: String,
    pub color: u32,
    pub defeat_line: String,
    pub pos: Vec2,
    pub vel: Vec2,
    pub health: i32,
    pub state: VillainState,
    /// Movement AI suspended until this clock time (ms).
    pub frozen_until_ms: Option<u64>,
    pub animation_phase: f32,
}

impl Villain {
    pub fn new(id: usize, def: &VillainDefinition, spawn: Vec2) -> Self {
        Villain {
            id,
            name: def.name.clone(),
            color: def.color,
            defeat_line: def.defeat_line.clone(),
            pos: spawn,
            vel: Vec2::ZERO,
            health: VILLAIN_MAX_HEALTH,
            state: VillainState::Active,
            frozen_until_ms: None,
            animation_phase: 0.0,
        }
    }

    pub fn body(&self) -> Aabb {
        Aabb::new(self.pos, VILLAIN_SIZE)
    }

    /// Defeated or integrated.
    pub fn is_defeated(&self) -> bool {
        self.state != VillainState::Active
    }

    pub fn is_integrated(&self) -> bool {
        self.state == VillainState::Integrated
    }

    pub fn is_frozen(&self, now_ms: u64) -> bool {
        self.frozen_until_ms.map_or(false, |t| now_ms < t)
    }

    /// Halt and suspend AI until `until_ms`. Ignored once defeated.
    pub fn freeze(&mut self, until_ms: u64) {
        if self.is_defeated() { return; }
        self.vel = Vec2::ZERO;
        self.frozen_until_ms = Some(until_ms);
    }

    pub fn take_damage(&mut self, amount: i32) -> Damage {
        if self.state != VillainState::Active {
            return Damage::Ignored;
        }
        self.health -= amount;
        if self.health <= 0 {
            self.state = VillainState::Defeated;
            self.vel = Vec2::ZERO;
            self.frozen_until_ms = None;
            Damage::Defeated
        } else {
            Damage::Wounded
        }
    }

    /// `Defeated → Integrated`. Returns false (and changes nothing) from any other state.
    pub fn integrate(&mut self) -> bool {
        if self.state != VillainState::Defeated {
            return false;
        }
        self.state = VillainState::Integrated;
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pickup {
    pub id: usize,
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Pickup {
    pub fn body(&self) -> Aabb {
        Aabb::new(self.pos, PICKUP_SIZE)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Platform {
    pub rect: Aabb,
}

/// Contacts reported by the physics collaborator for the previous step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contacts {
    /// Player is standing on something.
    pub grounded: bool,
    /// Ids of pickups overlapping the player.
    pub pickups: Vec<usize>,
    /// Ids of villains overlapping the player.
    pub villains: Vec<usize>,
}

/// Frame input: movement is continuous (held), abilities and interact are
/// edge-triggered (fresh press only).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameInput {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub abilities: [bool; 4],
    pub interact: bool,
    pub contacts: Contacts,
}

impl FrameInput {
    pub fn pressed(&self, id: AbilityId) -> bool {
        self.abilities[id.index()]
    }

    pub fn press(&mut self, id: AbilityId) {
        self.abilities[id.index()] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn villain() -> Villain {
        let def = VillainDefinition {
            name: "The Test Shadow".into(),
            kind: "shadow".into(),
            color: 0x4b0082,
            engage_line: "boo".into(),
            defeat_line: "ok".into(),
        };
        Villain::new(0, &def, Vec2::new(900.0, 300.0))
    }

    #[test]
    fn damage_lifecycle() {
        let mut v = villain();
        v.health = 40;
        v.vel = Vec2::new(60.0, 0.0);
        assert_eq!(v.take_damage(30), Damage::Wounded);
        assert_eq!(v.health, 10);
        assert_eq!(v.state, VillainState::Active);

        assert_eq!(v.take_damage(30), Damage::Defeated);
        assert_eq!(v.health, -20);
        assert_eq!(v.state, VillainState::Defeated);
        assert_eq!(v.vel, Vec2::ZERO);

        // No further damage once defeated
        assert_eq!(v.take_damage(30), Damage::Ignored);
        assert_eq!(v.health, -20);
        assert_eq!(v.state, VillainState::Defeated);
    }

    #[test]
    fn exact_zero_health_defeats() {
        let mut v = villain();
        v.health = 30;
        assert_eq!(v.take_damage(30), Damage::Defeated);
        assert_eq!(v.health, 0);
    }

    #[test]
    fn integrate_only_from_defeated() {
        let mut v = villain();
        assert!(!v.integrate());
        assert_eq!(v.state, VillainState::Active);

        v.health = 1;
        v.take_damage(30);
        assert!(v.integrate());
        assert!(v.is_integrated());
        assert!(v.is_defeated());

        assert!(!v.integrate());
        assert_eq!(v.take_damage(30), Damage::Ignored);
        assert_eq!(v.state, VillainState::Integrated);
    }

    #[test]
    fn freeze_window() {
        let mut v = villain();
        v.vel = Vec2::new(-80.0, 0.0);
        v.freeze(5000);
        assert_eq!(v.vel, Vec2::ZERO);
        assert!(v.is_frozen(0));
        assert!(v.is_frozen(4999));
        assert!(!v.is_frozen(5000));
    }

    #[test]
    fn aabb_overlap_excludes_touching() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let b = Aabb::new(Vec2::new(10.0, 0.0), Vec2::new(10.0, 10.0));
        let c = Aabb::new(Vec2::new(9.0, 9.0), Vec2::new(10.0, 10.0));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert_eq!(a.left(), -5.0);
        assert_eq!(a.bottom(), 5.0);
    }

    #[test]
    fn frame_input_ability_presses() {
        let mut input = FrameInput::default();
        assert!(!input.pressed(AbilityId::CalmBreath));
        input.press(AbilityId::CalmBreath);
        assert!(input.pressed(AbilityId::CalmBreath));
        assert!(!input.pressed(AbilityId::FractalLeap));
    }
}
