/// Save and load game progress: 4 slots, each holding a full snapshot.
///
/// ## What a snapshot holds
///
///   **Run scope**: `RunProgress` and every ability's state.
///   **Level scope**: player, villains, pickups, dialogue, pending
///   schedule entries, time scale, and the session clock.
///
/// Static data (level text, platforms, villain names and colours) is not
/// stored; restore takes it from the session's catalog by level index, so a
/// snapshot only loads against the catalog it was taken with.
///
/// ## File format
///   TOML, one file per slot: `save_1.toml` .. `save_4.toml`.

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::domain::ability::{AbilityBank, AbilityState};
use crate::domain::entity::{Facing, Pickup, Player, Vec2, Villain, VillainState};
use crate::error::SaveError;
use super::event::PresentationEvent;
use super::level;
use super::schedule::{Schedule, ScheduledEvent};
use super::world::{DialogueLine, GameSession, Phase, RunProgress};

pub const SLOT_COUNT: u8 = 4;
const SNAPSHOT_VERSION: u32 = 1;

// ══════════════════════════════════════════════════════════════
// Public types
// ══════════════════════════════════════════════════════════════

/// Full session state. Scalars precede tables so the TOML encodes cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub clock_ms: u64,
    pub phase: Phase,
    pub time_scale: f32,
    pub slow_until_ms: Option<u64>,
    pub run: RunProgress,
    pub player: PlayerSnapshot,
    pub dialogue: Option<DialogueLine>,
    pub abilities: Vec<AbilityState>,
    pub villains: Vec<VillainSnapshot>,
    pub pickups: Vec<PickupSnapshot>,
    pub schedule: Vec<ScheduledEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub facing: Facing,
    pub pos: Vec2,
    pub vel: Vec2,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VillainSnapshot {
    pub id: usize,
    pub health: i32,
    pub state: VillainState,
    pub frozen_until_ms: Option<u64>,
    pub animation_phase: f32,
    pub pos: Vec2,
    pub vel: Vec2,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PickupSnapshot {
    pub id: usize,
    pub pos: Vec2,
    pub vel: Vec2,
}

// ══════════════════════════════════════════════════════════════
// Paths
// ══════════════════════════════════════════════════════════════

pub fn save_dir() -> PathBuf {
    // 1. Exe directory, when writable (portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_mindbloom");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/mindbloom");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn slot_path(dir: &Path, slot: u8) -> PathBuf {
    dir.join(format!("save_{}.toml", slot))
}

// ══════════════════════════════════════════════════════════════
// Snapshot capture / restore (GameSession ↔ Snapshot)
// ══════════════════════════════════════════════════════════════

pub fn capture(s: &GameSession) -> Snapshot {
    Snapshot {
        version: SNAPSHOT_VERSION,
        clock_ms: s.clock_ms,
        phase: s.phase,
        time_scale: s.time_scale,
        slow_until_ms: s.slow_until_ms,
        run: s.run.clone(),
        player: PlayerSnapshot {
            facing: s.player.facing,
            pos: s.player.pos,
            vel: s.player.vel,
        },
        dialogue: s.dialogue.clone(),
        abilities: s.abilities.states().to_vec(),
        villains: s.villains.iter().map(|v| VillainSnapshot {
            id: v.id,
            health: v.health,
            state: v.state,
            frozen_until_ms: v.frozen_until_ms,
            animation_phase: v.animation_phase,
            pos: v.pos,
            vel: v.vel,
        }).collect(),
        pickups: s.pickups.iter().map(|p| PickupSnapshot {
            id: p.id,
            pos: p.pos,
            vel: p.vel,
        }).collect(),
        schedule: s.schedule.events().to_vec(),
    }
}

/// Overwrite the session with a snapshot. On error the session is untouched.
pub fn restore(s: &mut GameSession, snap: &Snapshot) -> Result<Vec<PresentationEvent>, SaveError> {
    if snap.version != SNAPSHOT_VERSION {
        return Err(SaveError::Mismatch(format!("snapshot version {}", snap.version)));
    }
    let idx = snap.run.current_level;
    let Some(def) = s.catalog.get(idx).cloned() else {
        return Err(SaveError::Mismatch(format!("level {} not in catalog", idx + 1)));
    };
    let states: [AbilityState; 4] = snap.abilities.clone().try_into().map_err(|v: Vec<AbilityState>| {
        SaveError::Mismatch(format!("{} ability entries", v.len()))
    })?;
    let villains = match (&def.villain, snap.villains.as_slice()) {
        (_, []) => vec![],
        (Some(vdef), saved) => saved.iter().map(|v| Villain {
            pos: v.pos,
            vel: v.vel,
            health: v.health,
            state: v.state,
            frozen_until_ms: v.frozen_until_ms,
            animation_phase: v.animation_phase,
            ..Villain::new(v.id, vdef, v.pos)
        }).collect(),
        (None, _) => {
            return Err(SaveError::Mismatch(format!("{} has no villain", def.name)));
        }
    };

    let mut events = vec![PresentationEvent::LevelStarted {
        index: idx,
        name: def.name.clone(),
        fear_label: def.fear_label.clone(),
        background: def.background.clone(),
    }];

    s.platforms = level::spawn(&def).platforms;
    s.level = def;
    s.run = snap.run.clone();
    s.abilities = AbilityBank::from_states(states);
    s.player = Player {
        pos: snap.player.pos,
        vel: snap.player.vel,
        facing: snap.player.facing,
    };
    s.villains = villains;
    s.pickups = snap.pickups.iter()
        .map(|p| Pickup { id: p.id, pos: p.pos, vel: p.vel })
        .collect();
    s.dialogue = snap.dialogue.clone();
    s.schedule = Schedule::from_events(snap.schedule.clone());
    s.time_scale = snap.time_scale;
    s.slow_until_ms = snap.slow_until_ms;
    s.clock_ms = snap.clock_ms;
    s.phase = snap.phase;

    let (fear, enlightenment) = s.run.hud();
    s.last_hud = Some((fear, enlightenment));
    events.push(PresentationEvent::HudChanged { fear, enlightenment });
    events.push(PresentationEvent::AbilitySlots(s.abilities.slots()));
    if s.time_scale != 1.0 {
        events.push(PresentationEvent::TimeScaleChanged(s.time_scale));
    }
    if let Some(d) = &s.dialogue {
        events.push(PresentationEvent::ShowDialogue {
            text: d.text.clone(),
            speaker: d.speaker.clone(),
            accent: d.accent,
            duration_ms: d.expires_at_ms.saturating_sub(s.clock_ms),
        });
    }
    Ok(events)
}

// ══════════════════════════════════════════════════════════════
// Encoding
// ══════════════════════════════════════════════════════════════

pub fn encode(snap: &Snapshot) -> Result<String, SaveError> {
    Ok(toml::to_string(snap)?)
}

pub fn decode(text: &str) -> Result<Snapshot, SaveError> {
    Ok(toml::from_str(text)?)
}

// ══════════════════════════════════════════════════════════════
// Slots
// ══════════════════════════════════════════════════════════════

pub fn save_slot(s: &GameSession, slot: u8) -> Result<PathBuf, SaveError> {
    save_slot_in(&save_dir(), s, slot)
}

pub fn load_slot(s: &mut GameSession, slot: u8) -> Result<Vec<PresentationEvent>, SaveError> {
    load_slot_from(&save_dir(), s, slot)
}

pub fn has_slot(slot: u8) -> bool {
    slot_path(&save_dir(), slot).is_file()
}

pub fn save_slot_in(dir: &Path, s: &GameSession, slot: u8) -> Result<PathBuf, SaveError> {
    let path = slot_path(dir, slot);
    std::fs::write(&path, encode(&capture(s))?)?;
    info!("saved slot {} ({}, level {})", slot, path.display(), s.run.current_level + 1);
    Ok(path)
}

pub fn load_slot_from(dir: &Path, s: &mut GameSession, slot: u8) -> Result<Vec<PresentationEvent>, SaveError> {
    let path = slot_path(dir, slot);
    if !path.is_file() {
        return Err(SaveError::EmptySlot(slot));
    }
    let snap = decode(&std::fs::read_to_string(&path)?)?;
    let events = restore(s, &snap)?;
    info!("loaded slot {} (level {})", slot, s.run.current_level + 1);
    Ok(events)
}
