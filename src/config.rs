/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
///
/// Two tuning profiles share one core:
///   - `classic`    : every ability unlocked from the start, smoothed acceleration.
///   - `progressive`: abilities awaken one per level on pickup, direct velocity.
/// Any explicit key in `[player]` / `[abilities]` overrides the profile preset.

use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

use crate::domain::ability::AbilityId;
use crate::error::ConfigError;

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tick_rate_ms: u64,
    pub tuning: Tuning,
    pub gamepad: GamepadConfig,
    pub levels_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Classic,
    Progressive,
}

/// How directional input turns into horizontal velocity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementModel {
    /// Add `acceleration` per tick up to `max_speed`; decay by `friction` with no input.
    Accelerated,
    /// Set velocity to ±`direct_speed` while held, zero otherwise.
    Direct,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockPolicy {
    AllUnlocked,
    PerLevel,
}

/// Gameplay tunables carried by the session.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuning {
    pub movement: MovementModel,
    pub acceleration: f32,
    pub max_speed: f32,
    pub friction: f32,
    pub direct_speed: f32,
    pub jump_velocity: f32,
    pub unlock_policy: UnlockPolicy,
    pub cooldowns: CooldownConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownConfig {
    pub dissolve_self_ms: u32,
    pub mirror_sight_ms: u32,
    pub calm_breath_ms: u32,
    pub fractal_leap_ms: u32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub jump: Vec<String>,
    pub integrate: Vec<String>,
    pub dissolve_self: Vec<String>,
    pub mirror_sight: Vec<String>,
    pub calm_breath: Vec<String>,
    pub fractal_leap: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
}

impl CooldownConfig {
    pub fn for_ability(&self, id: AbilityId) -> u32 {
        match id {
            AbilityId::DissolveSelf => self.dissolve_self_ms,
            AbilityId::MirrorSight => self.mirror_sight_ms,
            AbilityId::CalmBreath => self.calm_breath_ms,
            AbilityId::FractalLeap => self.fractal_leap_ms,
        }
    }
}

impl Tuning {
    pub fn for_profile(profile: Profile) -> Self {
        let cooldowns = CooldownConfig {
            dissolve_self_ms: 10_000,
            mirror_sight_ms: 8_000,
            calm_breath_ms: 12_000,
            fractal_leap_ms: 6_000,
        };
        match profile {
            Profile::Classic => Tuning {
                movement: MovementModel::Accelerated,
                acceleration: 15.0,
                max_speed: 250.0,
                friction: 0.85,
                direct_speed: 200.0,
                jump_velocity: 550.0,
                unlock_policy: UnlockPolicy::AllUnlocked,
                cooldowns,
            },
            Profile::Progressive => Tuning {
                movement: MovementModel::Direct,
                acceleration: 15.0,
                max_speed: 250.0,
                friction: 0.85,
                direct_speed: 200.0,
                jump_velocity: 500.0,
                unlock_policy: UnlockPolicy::PerLevel,
                cooldowns,
            },
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::for_profile(Profile::Classic)
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    player: TomlPlayer,
    #[serde(default)]
    abilities: TomlAbilities,
    #[serde(default)]
    gamepad: TomlGamepad,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_profile")]
    profile: Profile,
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default)]
    levels_file: Option<String>,
    #[serde(default)]
    log_file: Option<String>,
}

/// Every key optional: unset keys come from the profile preset.
#[derive(Deserialize, Debug, Default)]
struct TomlPlayer {
    movement: Option<MovementModel>,
    acceleration: Option<f32>,
    max_speed: Option<f32>,
    friction: Option<f32>,
    direct_speed: Option<f32>,
    jump_velocity: Option<f32>,
}

#[derive(Deserialize, Debug, Default)]
struct TomlAbilities {
    unlock_policy: Option<UnlockPolicy>,
    dissolve_self_cooldown_ms: Option<u32>,
    mirror_sight_cooldown_ms: Option<u32>,
    calm_breath_cooldown_ms: Option<u32>,
    fractal_leap_cooldown_ms: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_jump")]
    jump: Vec<String>,
    #[serde(default = "default_integrate")]
    integrate: Vec<String>,
    #[serde(default = "default_dissolve_self")]
    dissolve_self: Vec<String>,
    #[serde(default = "default_mirror_sight")]
    mirror_sight: Vec<String>,
    #[serde(default = "default_calm_breath")]
    calm_breath: Vec<String>,
    #[serde(default = "default_fractal_leap")]
    fractal_leap: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
}

// ── Defaults ──

fn default_profile() -> Profile { Profile::Classic }
fn default_tick_rate() -> u64 { 16 }  // ~60 ticks per second

fn default_jump() -> Vec<String> { vec!["A".into()] }
fn default_integrate() -> Vec<String> { vec!["B".into()] }
fn default_dissolve_self() -> Vec<String> { vec!["X".into()] }
fn default_mirror_sight() -> Vec<String> { vec!["Y".into()] }
fn default_calm_breath() -> Vec<String> { vec!["L1".into()] }
fn default_fractal_leap() -> Vec<String> { vec!["R1".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            profile: default_profile(),
            tick_rate_ms: default_tick_rate(),
            levels_file: None,
            log_file: None,
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            jump: default_jump(),
            integrate: default_integrate(),
            dissolve_self: default_dissolve_self(),
            mirror_sight: default_mirror_sight(),
            calm_breath: default_calm_breath(),
            fractal_leap: default_fractal_leap(),
            confirm: default_confirm(),
            cancel: default_cancel(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        resolve(TomlConfig::default(), &[])
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) XDG data home, (4) system data directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        for dir in &search_dirs {
            let path = dir.join("config.toml");
            if !path.exists() { continue; }
            match read_toml(&path) {
                Ok(cfg) => return resolve(cfg, &search_dirs),
                Err(e) => {
                    warn!("{e}");
                    warn!("Using default settings.");
                    return resolve(TomlConfig::default(), &search_dirs);
                }
            }
        }
        resolve(TomlConfig::default(), &search_dirs)
    }

    /// Parse config text. Relative paths are left as written.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: TomlConfig = toml::from_str(text)?;
        Ok(resolve(cfg, &[]))
    }

    /// Parse a specific config file; relative paths resolve against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let cfg = read_toml(path)?;
        let base: Vec<PathBuf> = path.parent().map(|p| p.to_path_buf()).into_iter().collect();
        Ok(resolve(cfg, &base))
    }
}

fn read_toml(path: &Path) -> Result<TomlConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str::<TomlConfig>(&text)?)
}

/// Merge the parsed schema over the profile preset.
fn resolve(cfg: TomlConfig, search_dirs: &[PathBuf]) -> GameConfig {
    let mut tuning = Tuning::for_profile(cfg.general.profile);

    let p = &cfg.player;
    if let Some(v) = p.movement { tuning.movement = v; }
    if let Some(v) = p.acceleration { tuning.acceleration = v; }
    if let Some(v) = p.max_speed { tuning.max_speed = v; }
    if let Some(v) = p.friction { tuning.friction = v; }
    if let Some(v) = p.direct_speed { tuning.direct_speed = v; }
    if let Some(v) = p.jump_velocity { tuning.jump_velocity = v; }

    let a = &cfg.abilities;
    if let Some(v) = a.unlock_policy { tuning.unlock_policy = v; }
    if let Some(v) = a.dissolve_self_cooldown_ms { tuning.cooldowns.dissolve_self_ms = v; }
    if let Some(v) = a.mirror_sight_cooldown_ms { tuning.cooldowns.mirror_sight_ms = v; }
    if let Some(v) = a.calm_breath_cooldown_ms { tuning.cooldowns.calm_breath_ms = v; }
    if let Some(v) = a.fractal_leap_cooldown_ms { tuning.cooldowns.fractal_leap_ms = v; }

    let levels_file = non_empty(cfg.general.levels_file).map(|f| locate(&f, search_dirs));
    let log_file = non_empty(cfg.general.log_file).map(PathBuf::from);

    let g = cfg.gamepad;
    GameConfig {
        tick_rate_ms: cfg.general.tick_rate_ms.max(1),
        tuning,
        gamepad: GamepadConfig {
            jump: g.jump,
            integrate: g.integrate,
            dissolve_self: g.dissolve_self,
            mirror_sight: g.mirror_sight,
            calm_breath: g.calm_breath,
            fractal_leap: g.fractal_leap,
            confirm: g.confirm,
            cancel: g.cancel,
        },
        levels_file,
        log_file,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Resolve a relative data file against the search dirs; first existing wins.
fn locate(name: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let raw = PathBuf::from(name);
    if raw.is_absolute() {
        return raw;
    }
    search_dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_file())
        .unwrap_or(raw)
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so an installed link still finds data next to the real binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/mindbloom");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    let sys = PathBuf::from("/usr/share/mindbloom");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_classic_profile() {
        let cfg = GameConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.tick_rate_ms, 16);
        assert_eq!(cfg.tuning, Tuning::for_profile(Profile::Classic));
        assert_eq!(cfg.tuning.unlock_policy, UnlockPolicy::AllUnlocked);
        assert_eq!(cfg.tuning.movement, MovementModel::Accelerated);
        assert!(cfg.levels_file.is_none());
        assert_eq!(cfg.gamepad.jump, vec!["A".to_string()]);
    }

    #[test]
    fn progressive_profile_switches_policies() {
        let cfg = GameConfig::from_toml_str("[general]\nprofile = \"progressive\"\n").unwrap();
        assert_eq!(cfg.tuning.unlock_policy, UnlockPolicy::PerLevel);
        assert_eq!(cfg.tuning.movement, MovementModel::Direct);
    }

    #[test]
    fn explicit_keys_override_profile() {
        let text = r#"
            [general]
            profile = "progressive"
            tick_rate_ms = 20

            [player]
            movement = "accelerated"
            max_speed = 300.0

            [abilities]
            unlock_policy = "all_unlocked"
            mirror_sight_cooldown_ms = 4000
        "#;
        let cfg = GameConfig::from_toml_str(text).unwrap();
        assert_eq!(cfg.tick_rate_ms, 20);
        assert_eq!(cfg.tuning.movement, MovementModel::Accelerated);
        assert_eq!(cfg.tuning.max_speed, 300.0);
        assert_eq!(cfg.tuning.unlock_policy, UnlockPolicy::AllUnlocked);
        assert_eq!(cfg.tuning.cooldowns.for_ability(AbilityId::MirrorSight), 4000);
        assert_eq!(cfg.tuning.cooldowns.for_ability(AbilityId::FractalLeap), 6000);
    }

    #[test]
    fn blank_paths_are_ignored() {
        let cfg = GameConfig::from_toml_str("[general]\nlevels_file = \"  \"\nlog_file = \"\"\n").unwrap();
        assert!(cfg.levels_file.is_none());
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let err = GameConfig::from_toml_str("[general]\nprofile = \"chaotic\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn demo_config_resolves_levels_next_to_it() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
        let cfg = GameConfig::from_file(&dir.join("config.toml")).unwrap();
        assert_eq!(cfg.tuning.unlock_policy, UnlockPolicy::PerLevel);
        assert_eq!(cfg.tuning.movement, MovementModel::Direct);
        assert_eq!(cfg.tuning.direct_speed, 220.0);
        assert_eq!(cfg.tuning.cooldowns.fractal_leap_ms, 5000);
        assert_eq!(cfg.tuning.cooldowns.calm_breath_ms, 12_000);
        assert_eq!(cfg.levels_file, Some(dir.join("levels.toml")));
        assert_eq!(cfg.gamepad.calm_breath, vec!["L1".to_string(), "L2".to_string()]);
    }

    #[test]
    fn zero_tick_rate_is_raised_to_one() {
        let cfg = GameConfig::from_toml_str("[general]\ntick_rate_ms = 0\n").unwrap();
        assert_eq!(cfg.tick_rate_ms, 1);
    }
}
