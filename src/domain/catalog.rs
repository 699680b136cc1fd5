/// Level catalog: the ordered, immutable run of themed levels.
///
/// Each entry names the fear it confronts, the shadow (villain) that embodies
/// it, the guide who speaks at the start, the background palette, and the
/// ability its pickups awaken under the per-level unlock policy.
///
/// Every built-in level shares the same arena layout; custom catalogs
/// (see `sim::level`) may override it per level.

use serde::Deserialize;

use super::ability::AbilityId;
use super::entity::Vec2;

pub const WORLD_WIDTH: f32 = 1200.0;
pub const WORLD_HEIGHT: f32 = 700.0;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LevelDefinition {
    pub name: String,
    pub fear_label: String,
    #[serde(default)]
    pub villain: Option<VillainDefinition>,
    pub guide: GuideDefinition,
    #[serde(default)]
    pub background: BackgroundSpec,
    #[serde(default)]
    pub unlock_power: Option<AbilityId>,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default)]
    pub layout: LevelLayout,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VillainDefinition {
    pub name: String,
    pub kind: String,
    pub color: u32,
    pub engage_line: String,
    pub defeat_line: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GuideDefinition {
    pub name: String,
    pub archetype: String,
    pub color: u32,
    pub intro: String,
    pub wisdom: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BackgroundSpec {
    pub colors: Vec<u32>,
    pub speed: f32,
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        BackgroundSpec { colors: vec![0x000000], speed: 0.5 }
    }
}

/// A static platform rectangle, centred on `(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PlatformSpec {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_platform_w")]
    pub w: f32,
    #[serde(default = "default_platform_h")]
    pub h: f32,
}

fn default_platform_w() -> f32 { 200.0 }
fn default_platform_h() -> f32 { 20.0 }

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LevelLayout {
    pub player_spawn: Vec2,
    pub villain_spawn: Vec2,
    pub platforms: Vec<PlatformSpec>,
    pub pickups: Vec<Vec2>,
}

impl Default for LevelLayout {
    fn default() -> Self {
        let mut platforms: Vec<PlatformSpec> = (0..10)
            .map(|i| PlatformSpec { x: i as f32 * 120.0 + 100.0, y: 680.0, w: 200.0, h: 20.0 })
            .collect();
        for (x, y) in [(300.0, 550.0), (500.0, 450.0), (700.0, 350.0),
                       (200.0, 400.0), (900.0, 500.0), (1000.0, 300.0)] {
            platforms.push(PlatformSpec { x, y, w: 200.0, h: 20.0 });
        }
        let pickups = [(300.0, 500.0), (500.0, 400.0), (700.0, 300.0), (900.0, 450.0), (400.0, 250.0)]
            .iter()
            .map(|&(x, y)| Vec2::new(x, y))
            .collect();
        LevelLayout {
            player_spawn: Vec2::new(100.0, 300.0),
            villain_spawn: Vec2::new(900.0, 300.0),
            platforms,
            pickups,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Built-in catalog
// ══════════════════════════════════════════════════════════════

pub fn builtin_catalog() -> Vec<LevelDefinition> {
    vec![
        level(
            "The Hall of Mirrors", "Fear of Rejection",
            Some(villain("The Siren of Validation", "siren", 0xff1493,
                "You seek my approval... but why? Without me, you are nothing.",
                "I am... your need to be seen. Integrate me.")),
            guide("The Fool", "playfulness", 0xffff00,
                "Why take it so seriously? Dance with rejection, my friend!",
                "The Fool sees no failure, only lessons wrapped in laughter."),
            &[0xff1493, 0x9400d3, 0x000000], 0.5,
            Some(AbilityId::DissolveSelf),
        ),
        level(
            "The Tower of Perfection", "Fear of Failure",
            Some(villain("The Overlord of Perfection", "overlord", 0xff0000,
                "You will never be good enough. Every flaw proves your worthlessness.",
                "I pushed you... but I am the voice of your ambition gone toxic.")),
            guide("The Warrior", "willpower", 0xff4500,
                "Failure is the forge. Each fall makes you stronger.",
                "The Warrior knows: perfection is the enemy of progress."),
            &[0xff0000, 0x8b0000, 0x000000], 0.3,
            Some(AbilityId::CalmBreath),
        ),
        level(
            "The Narcissist's Kingdom", "Fear of Not Being Seen",
            Some(villain("The Narcissist King", "narcissist", 0xffd700,
                "Bow before me! I am everything you wish you could be!",
                "I... am your hunger for significance. Do you see me now?")),
            guide("The Sage", "clarity", 0x00ced1,
                "To be unseen is to be free. The universe sees all.",
                "The Sage whispers: You are not your audience."),
            &[0xffd700, 0xdaa520, 0x000000], 0.4,
            Some(AbilityId::MirrorSight),
        ),
        level(
            "The Labyrinth of Isolation", "Fear of Loneliness",
            Some(villain("The Shadow of Solitude", "shadow", 0x4b0082,
                "No one understands you. No one ever will. You are alone.",
                "I kept you safe... but also imprisoned. Integrate me gently.")),
            guide("The Lover", "compassion", 0xff69b4,
                "You are never alone when you love yourself first.",
                "The Lover knows: Solitude is where you meet your true self."),
            &[0x4b0082, 0x2f1b4e, 0x000000], 0.6,
            Some(AbilityId::FractalLeap),
        ),
        level(
            "The Abyss of the Void", "Fear of Death / Nothingness",
            Some(villain("The Void Beast", "void", 0x000000,
                "All ends in nothing. Your light will fade. Embrace the darkness.",
                "I am the ultimate truth... and the ultimate liberation.")),
            guide("All Guides United", "integration", 0xffffff,
                "Death is not the end, but a transformation. We are with you.",
                "In the void, you find everything."),
            &[0x0a0a0a, 0x1a0033, 0x000000], 0.2,
            None,
        ),
        LevelDefinition {
            is_final: true,
            ..level(
                "The Garden of Ego Death", "No Fear - Only Reflections",
                None,
                guide("Your True Self", "unity", 0xffffff,
                    "There is no one to fight. Only yourself to embrace.",
                    "You are the journey. You are the destination."),
                &[0xffffff, 0x00ffff, 0xff00ff], 1.0,
                None,
            )
        },
    ]
}

fn level(
    name: &str,
    fear_label: &str,
    villain: Option<VillainDefinition>,
    guide: GuideDefinition,
    colors: &[u32],
    speed: f32,
    unlock_power: Option<AbilityId>,
) -> LevelDefinition {
    LevelDefinition {
        name: name.to_string(),
        fear_label: fear_label.to_string(),
        villain,
        guide,
        background: BackgroundSpec { colors: colors.to_vec(), speed },
        unlock_power,
        is_final: false,
        layout: LevelLayout::default(),
    }
}

fn villain(name: &str, kind: &str, color: u32, engage: &str, defeat: &str) -> VillainDefinition {
    VillainDefinition {
        name: name.to_string(),
        kind: kind.to_string(),
        color,
        engage_line: engage.to_string(),
        defeat_line: defeat.to_string(),
    }
}

fn guide(name: &str, archetype: &str, color: u32, intro: &str, wisdom: &str) -> GuideDefinition {
    GuideDefinition {
        name: name.to_string(),
        archetype: archetype.to_string(),
        color,
        intro: intro.to_string(),
        wisdom: wisdom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_shape() {
        let cat = builtin_catalog();
        assert_eq!(cat.len(), 6);
        assert!(cat[..5].iter().all(|l| l.villain.is_some() && !l.is_final));
        assert!(cat[5].villain.is_none());
        assert!(cat[5].is_final);
    }

    #[test]
    fn each_ability_awakens_exactly_once() {
        let cat = builtin_catalog();
        for id in AbilityId::ALL {
            let n = cat.iter().filter(|l| l.unlock_power == Some(id)).count();
            assert_eq!(n, 1, "{id:?}");
        }
    }

    #[test]
    fn default_layout_matches_arena() {
        let layout = LevelLayout::default();
        assert_eq!(layout.platforms.len(), 16);
        assert_eq!(layout.pickups.len(), 5);
        assert_eq!(layout.player_spawn, Vec2::new(100.0, 300.0));
        assert!(layout.platforms.iter().all(|p| p.x >= 0.0 && p.x <= WORLD_WIDTH));
    }
}
