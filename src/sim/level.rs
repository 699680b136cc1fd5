/// Level loading: catalog sources and the entity factory.
///
/// ## Catalog sources (priority order):
///   1. `general.levels_file` from `config.toml` (a TOML catalog)
///   2. Built-in catalog
///
/// A catalog file that cannot be read, does not parse, or lists no levels
/// is reported with `warn!` and the built-in catalog is used instead.
///
/// ## Catalog format:
///   ```toml
///   [[level]]
///   name = "The Hall of Mirrors"
///   fear_label = "Fear of Rejection"
///   unlock_power = "dissolve_self"     # optional
///   final = false                      # optional
///
///   [level.villain]                    # optional
///   name = "The Siren of Validation"
///   kind = "siren"
///   color = 0xff1493
///   engage_line = "..."
///   defeat_line = "..."
///
///   [level.guide]
///   name = "The Fool"
///   archetype = "playfulness"
///   color = 0xffff00
///   intro = "..."
///   wisdom = "..."
///
///   [level.background]                 # optional
///   colors = [0xff1493, 0x000000]
///   speed = 0.5
///
///   [level.layout]                     # optional, default arena
///   player_spawn = { x = 100.0, y = 300.0 }
///   villain_spawn = { x = 900.0, y = 300.0 }
///   platforms = [{ x = 600.0, y = 680.0, w = 1200.0 }]
///   pickups = [{ x = 300.0, y = 500.0 }]
///   ```

use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::domain::catalog::{builtin_catalog, LevelDefinition};
use crate::domain::entity::{Aabb, Pickup, Platform, Player, Vec2, Villain};
use crate::error::CatalogError;
use super::event::PresentationEvent;
use super::schedule::ScheduledKind;
use super::world::GameSession;
use crate::domain::rules::{GUIDE_INTRO_DELAY_MS, VILLAIN_ENGAGE_DELAY_MS};

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    level: Vec<LevelDefinition>,
}

// ══════════════════════════════════════════════════════════════
// Catalog sources
// ══════════════════════════════════════════════════════════════

/// Resolve the catalog for a run. Never fails.
pub fn load_catalog(levels_file: Option<&Path>) -> Vec<LevelDefinition> {
    let Some(path) = levels_file else {
        return builtin_catalog();
    };
    match read_catalog(path) {
        Ok(levels) => {
            info!("loaded {} levels from {}", levels.len(), path.display());
            levels
        }
        Err(e) => {
            warn!("{e}");
            warn!("Using built-in levels.");
            builtin_catalog()
        }
    }
}

pub fn read_catalog(path: &Path) -> Result<Vec<LevelDefinition>, CatalogError> {
    let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&text)
}

pub fn parse_catalog(text: &str) -> Result<Vec<LevelDefinition>, CatalogError> {
    let file: CatalogFile = toml::from_str(text)?;
    if file.level.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(file.level)
}

// ══════════════════════════════════════════════════════════════
// Entity factory
// ══════════════════════════════════════════════════════════════

/// Level-scoped bodies built from one catalog entry.
pub struct LevelEntities {
    pub player: Player,
    pub villains: Vec<Villain>,
    pub pickups: Vec<Pickup>,
    pub platforms: Vec<Platform>,
}

pub fn spawn(def: &LevelDefinition) -> LevelEntities {
    let layout = &def.layout;
    let villains = def.villain.iter()
        .map(|v| Villain::new(0, v, layout.villain_spawn))
        .collect();
    let pickups = layout.pickups.iter()
        .enumerate()
        .map(|(id, &pos)| Pickup { id, pos, vel: Vec2::ZERO })
        .collect();
    let platforms = layout.platforms.iter()
        .map(|p| Platform { rect: Aabb::new(Vec2::new(p.x, p.y), Vec2::new(p.w, p.h)) })
        .collect();
    LevelEntities {
        player: Player::new(layout.player_spawn),
        villains,
        pickups,
        platforms,
    }
}

/// Replace every level-scoped part of the session with a fresh level.
/// Run progress and the ability bank are untouched.
pub fn start_level(s: &mut GameSession, def: &LevelDefinition) -> Vec<PresentationEvent> {
    let mut events = Vec::new();
    let LevelEntities { player, villains, pickups, platforms } = spawn(def);

    s.level = def.clone();
    s.player = player;
    s.villains = villains;
    s.pickups = pickups;
    s.platforms = platforms;

    s.schedule.clear();
    if s.dialogue.take().is_some() {
        events.push(PresentationEvent::DialogueCleared);
    }
    if s.time_scale != 1.0 {
        events.push(PresentationEvent::TimeScaleChanged(1.0));
    }
    s.time_scale = 1.0;
    s.slow_until_ms = None;

    s.schedule.push(s.clock_ms + GUIDE_INTRO_DELAY_MS, ScheduledKind::GuideLine);
    if def.villain.is_some() {
        s.schedule.push(s.clock_ms + VILLAIN_ENGAGE_DELAY_MS, ScheduledKind::VillainLine);
    }

    info!("level {} started: {}", s.run.current_level + 1, def.name);
    events.push(PresentationEvent::LevelStarted {
        index: s.run.current_level,
        name: def.name.clone(),
        fear_label: def.fear_label.clone(),
        background: def.background.clone(),
    });

    let (fear, enlightenment) = s.run.hud();
    s.last_hud = Some((fear, enlightenment));
    events.push(PresentationEvent::HudChanged { fear, enlightenment });
    events.push(PresentationEvent::AbilitySlots(s.abilities.slots()));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::domain::ability::AbilityId;

    const CUSTOM: &str = r#"
        [[level]]
        name = "Custom One"
        fear_label = "Fear of Tests"
        unlock_power = "mirror_sight"

        [level.villain]
        name = "The Flake"
        kind = "shadow"
        color = 0x123456
        engage_line = "I fail sometimes."
        defeat_line = "You found me."

        [level.guide]
        name = "The Reviewer"
        archetype = "clarity"
        color = 0xffffff
        intro = "Read carefully."
        wisdom = "Green at last."

        [level.layout]
        player_spawn = { x = 50.0, y = 100.0 }
        villain_spawn = { x = 800.0, y = 100.0 }
        platforms = [{ x = 600.0, y = 680.0, w = 1200.0 }]
        pickups = [{ x = 300.0, y = 600.0 }, { x = 500.0, y = 600.0 }]

        [[level]]
        name = "Custom End"
        fear_label = "None"
        final = true

        [level.guide]
        name = "Self"
        archetype = "unity"
        color = 0xffffff
        intro = "Done."
        wisdom = "Done."
    "#;

    #[test]
    fn parses_custom_catalog() {
        let cat = parse_catalog(CUSTOM).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat[0].unlock_power, Some(AbilityId::MirrorSight));
        assert_eq!(cat[0].layout.pickups.len(), 2);
        assert_eq!(cat[0].layout.platforms[0].h, 20.0);
        assert!(cat[1].is_final);
        assert!(cat[1].villain.is_none());
        // Omitted layout falls back to the default arena
        assert_eq!(cat[1].layout.pickups.len(), 5);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        assert!(matches!(parse_catalog(""), Err(CatalogError::Empty)));
        assert!(matches!(parse_catalog("[[level]]\nname = 3\n"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn bundled_demo_catalog_parses() {
        let cat = parse_catalog(include_str!("../../demos/levels.toml")).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat[0].unlock_power, Some(AbilityId::CalmBreath));
        assert_eq!(cat[0].layout.platforms[0].w, 1200.0);
        assert_eq!(cat[0].layout.platforms[1].w, 200.0);
        assert!(cat[1].is_final);
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let cat = load_catalog(Some(Path::new("/nonexistent/mindbloom/levels.toml")));
        assert_eq!(cat, builtin_catalog());
        assert_eq!(load_catalog(None).len(), 6);
    }

    #[test]
    fn spawn_builds_level_bodies() {
        let cat = parse_catalog(CUSTOM).unwrap();
        let e = spawn(&cat[0]);
        assert_eq!(e.player.pos, Vec2::new(50.0, 100.0));
        assert_eq!(e.player.vel, Vec2::ZERO);
        assert_eq!(e.villains.len(), 1);
        assert_eq!(e.villains[0].health, 100);
        assert_eq!(e.villains[0].pos, Vec2::new(800.0, 100.0));
        assert_eq!(e.pickups.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(e.platforms.len(), 1);

        let e = spawn(&cat[1]);
        assert!(e.villains.is_empty());
    }

    #[test]
    fn start_level_resets_level_scope_only() {
        let mut s = GameSession::new(Tuning::default(), vec![]);
        s.run.fear = 12;
        s.run.enlightenment = 44;
        s.clock_ms = 10_000;
        s.time_scale = 0.5;
        s.slow_until_ms = Some(12_000);
        s.schedule.push(11_000, ScheduledKind::RestoreTimeScale);
        s.abilities.try_activate(AbilityId::FractalLeap);

        let def = s.catalog[1].clone();
        let events = start_level(&mut s, &def);

        assert_eq!(s.level.name, "The Tower of Perfection");
        assert_eq!(s.run.fear, 12);
        assert_eq!(s.run.enlightenment, 44);
        assert!(!s.abilities.get(AbilityId::FractalLeap).is_ready());
        assert_eq!(s.time_scale, 1.0);
        assert_eq!(s.villains.len(), 1);
        assert_eq!(s.pickups.len(), 5);
        assert!(!s.schedule.contains(ScheduledKind::RestoreTimeScale));
        let fires: Vec<_> = s.schedule.events().iter().map(|e| (e.fire_at_ms, e.kind)).collect();
        assert_eq!(fires, vec![
            (11_000, ScheduledKind::GuideLine),
            (13_000, ScheduledKind::VillainLine),
        ]);
        assert!(events.contains(&PresentationEvent::TimeScaleChanged(1.0)));
        assert!(events.contains(&PresentationEvent::HudChanged { fear: 12, enlightenment: 44 }));
    }
}
