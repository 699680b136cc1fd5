/// GameSession: the complete state of a running game.
///
/// ## Scopes
///
/// Two lifetimes live side by side:
///   - **run-scoped**  : `run` and `abilities`. Survive level transitions;
///     reset only by `new_run`.
///   - **level-scoped**: `level`, `player` motion, `villains`, `pickups`,
///     `platforms`, `dialogue`, `schedule`, time scale. Rebuilt by
///     `on_level_start` on every transition or restart.
///
/// ## Time
///
/// `clock_ms` is real elapsed frame time since the session was created.
/// Every deadline (`expires_at_ms`, `frozen_until_ms`, schedule entries) is
/// an absolute value on this clock. `time_scale` slows movement only.

use serde::{Deserialize, Serialize};

use crate::config::Tuning;
use crate::domain::ability::AbilityBank;
use crate::domain::catalog::{builtin_catalog, LevelDefinition};
use crate::domain::entity::{Pickup, Platform, Player, Villain};
use crate::domain::physics::Bodies;
use crate::domain::rules::{self, FEAR_START};
use super::schedule::Schedule;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Playing,
    Victory,
    Defeat,
}

/// Run-wide progress counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub current_level: usize,
    /// 0..=100.
    pub fear: i32,
    /// Floor 0, no cap.
    pub enlightenment: i32,
    /// Names of integrated villains, in integration order.
    pub integrated: Vec<String>,
}

impl RunProgress {
    pub fn new() -> Self {
        RunProgress {
            current_level: 0,
            fear: FEAR_START,
            enlightenment: 0,
            integrated: vec![],
        }
    }

    pub fn hud(&self) -> (u8, u8) {
        (self.fear.clamp(0, 100) as u8, rules::enlightenment_percent(self.enlightenment))
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        RunProgress::new()
    }
}

/// The single dialogue slot. A new line replaces the old one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub text: String,
    pub speaker: String,
    pub accent: Option<u32>,
    pub expires_at_ms: u64,
}

pub struct GameSession {
    pub tuning: Tuning,
    pub catalog: Vec<LevelDefinition>,

    // ── Run scope ──
    pub run: RunProgress,
    pub abilities: AbilityBank,

    // ── Level scope ──
    pub level: LevelDefinition,
    pub player: Player,
    pub villains: Vec<Villain>,
    pub pickups: Vec<Pickup>,
    pub platforms: Vec<Platform>,
    pub dialogue: Option<DialogueLine>,
    pub schedule: Schedule,
    pub time_scale: f32,
    /// Calm Breath ends at this clock time.
    pub slow_until_ms: Option<u64>,

    // ── Meta ──
    pub clock_ms: u64,
    pub phase: Phase,
    /// HUD values last reported, to emit `HudChanged` only on change.
    pub(crate) last_hud: Option<(u8, u8)>,
}

impl GameSession {
    /// New session at level 0. An empty catalog falls back to the built-in one.
    /// Nothing is spawned until `on_level_start` (or `begin`).
    pub fn new(tuning: Tuning, catalog: Vec<LevelDefinition>) -> Self {
        let catalog = if catalog.is_empty() { builtin_catalog() } else { catalog };
        let level = catalog[0].clone();
        let abilities = AbilityBank::new(&tuning);
        GameSession {
            player: Player::new(level.layout.player_spawn),
            tuning,
            catalog,
            run: RunProgress::new(),
            abilities,
            level,
            villains: vec![],
            pickups: vec![],
            platforms: vec![],
            dialogue: None,
            schedule: Schedule::new(),
            time_scale: 1.0,
            slow_until_ms: None,
            clock_ms: 0,
            phase: Phase::Playing,
            last_hud: None,
        }
    }

    pub fn level_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn villain(&self, id: usize) -> Option<&Villain> {
        self.villains.iter().find(|v| v.id == id)
    }

    /// Split borrow of every body for the physics collaborator.
    pub fn bodies(&mut self) -> Bodies<'_> {
        Bodies {
            player: &mut self.player,
            villains: &mut self.villains,
            pickups: &mut self.pickups,
            platforms: &self.platforms,
        }
    }

    pub fn player_alpha(&self) -> f32 {
        rules::player_alpha(self.run.enlightenment)
    }

    pub fn player_hue(&self) -> f32 {
        rules::player_hue(self.clock_ms, self.run.enlightenment)
    }
}
