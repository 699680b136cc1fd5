/// The step function: advances a session by one tick.
///
/// Processing order:
///   1. Clock advance
///   2. Scheduled events (lines, villain removal, time scale, level advance)
///   3. Dialogue expiry
///   4. Contacts (pickups, villain hits); a defeat ends the tick
///   5. Player controller
///   6. Ability activations
///   7. Integration
///   8. Villain AI
///   9. Cooldown tick
///  10. Completion check
///  11. HUD events
///
/// Bodies are moved by the physics collaborator *before* the tick; the tick
/// only reads its `Contacts` and rewrites velocities for the next step.

use log::{debug, info};

use crate::config::UnlockPolicy;
use crate::domain::ability::{AbilityBank, AbilityId};
use crate::domain::ai;
use crate::domain::catalog::LevelDefinition;
use crate::domain::entity::{Damage, FrameInput, VillainState};
use crate::domain::rules::{self, *};
use super::event::PresentationEvent;
use super::level;
use super::schedule::ScheduledKind;
use super::world::{DialogueLine, GameSession, Phase, RunProgress};

const ENGAGE_ACCENT: u32 = 0xff0000;
const INTEGRATE_ACCENT: u32 = 0x00ff00;

/// The seam between the simulation and whatever drives it.
pub trait GameCore {
    /// Build a level's bodies and script. Run progress is kept.
    fn on_level_start(&mut self, level: &LevelDefinition) -> Vec<PresentationEvent>;
    /// Advance by `dt_ms` of real time.
    fn on_tick(&mut self, input: &FrameInput, dt_ms: u32) -> Vec<PresentationEvent>;
}

impl GameCore for GameSession {
    fn on_level_start(&mut self, level: &LevelDefinition) -> Vec<PresentationEvent> {
        level::start_level(self, level)
    }

    fn on_tick(&mut self, input: &FrameInput, dt_ms: u32) -> Vec<PresentationEvent> {
        step(self, input, dt_ms)
    }
}

// ══════════════════════════════════════════════════════════════
// Session control
// ══════════════════════════════════════════════════════════════

impl GameSession {
    /// Start the level at `run.current_level`.
    pub fn begin(&mut self) -> Vec<PresentationEvent> {
        let def = self.catalog[self.run.current_level].clone();
        self.on_level_start(&def)
    }

    /// Rebuild the current level. Run progress and abilities are kept.
    pub fn restart_level(&mut self) -> Vec<PresentationEvent> {
        self.phase = Phase::Playing;
        self.begin()
    }

    /// Discard the run and start again from the first level.
    pub fn new_run(&mut self) -> Vec<PresentationEvent> {
        self.run = RunProgress::new();
        self.abilities = AbilityBank::new(&self.tuning);
        self.phase = Phase::Playing;
        info!("new run");
        self.begin()
    }
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(s: &mut GameSession, input: &FrameInput, dt_ms: u32) -> Vec<PresentationEvent> {
    if s.phase != Phase::Playing { return vec![]; }

    let mut events = Vec::new();
    s.clock_ms += dt_ms as u64;

    // Cooldowns are run-scoped: they count down even on a tick that ends early
    if resolve_schedule(s, &mut events) {
        s.abilities.tick(dt_ms);
        return events;
    }
    resolve_dialogue_expiry(s, &mut events);
    if resolve_contacts(s, input, &mut events) {
        s.abilities.tick(dt_ms);
        return events;
    }
    resolve_player(s, input, &mut events);
    resolve_abilities(s, input, &mut events);
    resolve_integration(s, input, &mut events);
    resolve_villains(s);
    s.abilities.tick(dt_ms);
    resolve_completion(s);
    resolve_hud(s, &mut events);

    events
}

// ══════════════════════════════════════════════════════════════
// Dialogue
// ══════════════════════════════════════════════════════════════

/// Replace the dialogue slot and restart its auto-dismiss clock.
fn say(
    s: &mut GameSession,
    text: &str,
    speaker: &str,
    accent: Option<u32>,
    events: &mut Vec<PresentationEvent>,
) {
    s.dialogue = Some(DialogueLine {
        text: text.to_string(),
        speaker: speaker.to_string(),
        accent,
        expires_at_ms: s.clock_ms + DIALOGUE_MS,
    });
    events.push(PresentationEvent::ShowDialogue {
        text: text.to_string(),
        speaker: speaker.to_string(),
        accent,
        duration_ms: DIALOGUE_MS,
    });
}

fn resolve_dialogue_expiry(s: &mut GameSession, events: &mut Vec<PresentationEvent>) {
    let expired = s.dialogue.as_ref().map_or(false, |d| d.expires_at_ms <= s.clock_ms);
    if expired {
        s.dialogue = None;
        events.push(PresentationEvent::DialogueCleared);
    }
}

// ══════════════════════════════════════════════════════════════
// Scheduled events
// ══════════════════════════════════════════════════════════════

/// Returns true when the level changed or the run ended; the rest of the
/// tick belongs to bodies that no longer exist.
fn resolve_schedule(s: &mut GameSession, events: &mut Vec<PresentationEvent>) -> bool {
    for due in s.schedule.drain_due(s.clock_ms) {
        debug!("scheduled {:?} fired at {}ms", due.kind, s.clock_ms);
        match due.kind {
            ScheduledKind::GuideLine => {
                let g = s.level.guide.clone();
                say(s, &g.intro, &g.name, Some(g.color), events);
            }
            ScheduledKind::VillainLine => {
                let engaged = s.villains.iter().any(|v| !v.is_defeated());
                if let Some(v) = s.level.villain.clone().filter(|_| engaged) {
                    say(s, &v.engage_line, &v.name, Some(ENGAGE_ACCENT), events);
                }
            }
            ScheduledKind::RemoveVillain(id) => {
                let before = s.villains.len();
                s.villains.retain(|v| v.id != id);
                if s.villains.len() < before {
                    events.push(PresentationEvent::VillainRemoved { id });
                    let g = s.level.guide.clone();
                    say(s, &g.wisdom, &g.name, Some(g.color), events);
                }
            }
            ScheduledKind::RestoreTimeScale => {
                // A later Calm Breath extends the window
                if s.slow_until_ms.map_or(true, |t| t <= s.clock_ms) {
                    s.slow_until_ms = None;
                    s.time_scale = 1.0;
                    events.push(PresentationEvent::TimeScaleChanged(1.0));
                }
            }
            ScheduledKind::AdvanceLevel => {
                if advance_level(s, events) { return true; }
            }
        }
    }
    false
}

/// Commit a pending level advance. Returns true if the level changed or the
/// run ended.
fn advance_level(s: &mut GameSession, events: &mut Vec<PresentationEvent>) -> bool {
    // The run may have ended after this advance was scheduled
    if s.phase != Phase::Playing || s.run.fear >= FEAR_MAX {
        return false;
    }

    // A level marked final ends the run even if more entries follow
    if s.level.is_final || s.run.current_level + 1 >= s.catalog.len() {
        s.phase = Phase::Victory;
        let enlightenment = s.run.enlightenment;
        info!("victory: enlightenment {}, integrated {:?}", s.run.enlightenment, s.run.integrated);
        events.push(PresentationEvent::Victory { enlightenment });
        return true;
    }

    s.run.current_level += 1;
    info!("advancing to level {}", s.run.current_level + 1);
    let def = s.catalog[s.run.current_level].clone();
    events.extend(s.on_level_start(&def));
    true
}

// ══════════════════════════════════════════════════════════════
// Contacts
// ══════════════════════════════════════════════════════════════

/// Returns true if fear reached the maximum (run over).
fn resolve_contacts(s: &mut GameSession, input: &FrameInput, events: &mut Vec<PresentationEvent>) -> bool {
    for &id in &input.contacts.pickups {
        let Some(idx) = s.pickups.iter().position(|p| p.id == id) else { continue };
        s.pickups.remove(idx);
        collect_pickup(s, id, events);
    }

    for &id in &input.contacts.villains {
        let Some(v) = s.villain(id) else { continue };
        if v.is_defeated() { continue; }
        let vx = v.pos.x;

        s.run.fear = rules::shift_fear(s.run.fear, CONTACT_FEAR);
        s.player.vel = rules::knockback(s.player.pos.x, vx);
        events.push(PresentationEvent::PlayerHit { villain: id });

        if s.run.fear >= FEAR_MAX {
            s.phase = Phase::Defeat;
            let enlightenment = s.run.enlightenment;
            info!("defeat on level {}: fear reached {}", s.run.current_level + 1, FEAR_MAX);
            let (fear, e) = s.run.hud();
            events.push(PresentationEvent::HudChanged { fear, enlightenment: e });
            events.push(PresentationEvent::Defeat { enlightenment });
            return true;
        }
    }
    false
}

fn collect_pickup(s: &mut GameSession, id: usize, events: &mut Vec<PresentationEvent>) {
    s.run.enlightenment = rules::shift_enlightenment(s.run.enlightenment, PICKUP_ENLIGHTENMENT);
    s.run.fear = rules::shift_fear(s.run.fear, -PICKUP_FEAR_RELIEF);
    events.push(PresentationEvent::PickupCollected { id });

    let guide = s.level.guide.name.clone();
    let awakened = match (s.tuning.unlock_policy, s.level.unlock_power) {
        (UnlockPolicy::PerLevel, Some(power)) if s.abilities.unlock(power) => Some(power),
        _ => None,
    };
    match awakened {
        Some(power) => {
            debug!("{power:?} unlocked");
            events.push(PresentationEvent::AbilityUnlocked(power));
            say(s, &format!("{} awakened!", power.name()), &guide, None, events);
        }
        None => {
            say(s, "Mind Bloom collected! +5 Enlightenment", &guide, None, events);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

fn resolve_player(s: &mut GameSession, input: &FrameInput, events: &mut Vec<PresentationEvent>) {
    if rules::control_player(&mut s.player, input, &s.tuning) {
        events.push(PresentationEvent::Jumped);
    }
}

// ══════════════════════════════════════════════════════════════
// Abilities
// ══════════════════════════════════════════════════════════════

type Effect = fn(&mut GameSession, &mut Vec<PresentationEvent>);

/// Effect handlers in `AbilityId::index()` order.
const EFFECTS: [Effect; 4] = [dissolve_self, mirror_sight, calm_breath, fractal_leap];

fn resolve_abilities(s: &mut GameSession, input: &FrameInput, events: &mut Vec<PresentationEvent>) {
    for id in AbilityId::ALL {
        if !input.pressed(id) { continue; }
        if !s.abilities.try_activate(id) { continue; }
        debug!("{id:?} activated at {}ms", s.clock_ms);
        events.push(PresentationEvent::AbilityActivated(id));
        EFFECTS[id.index()](s, events);
    }
}

fn dissolve_self(s: &mut GameSession, _events: &mut Vec<PresentationEvent>) {
    let until = s.clock_ms + FREEZE_MS;
    for v in &mut s.villains {
        v.freeze(until);
    }
}

fn mirror_sight(s: &mut GameSession, events: &mut Vec<PresentationEvent>) {
    let mut defeated = false;
    for v in &mut s.villains {
        match v.take_damage(MIRROR_DAMAGE) {
            Damage::Ignored => {}
            Damage::Wounded => {
                events.push(PresentationEvent::VillainDamaged { id: v.id, health: v.health });
            }
            Damage::Defeated => {
                debug!("{} defeated", v.name);
                events.push(PresentationEvent::VillainDamaged { id: v.id, health: v.health });
                events.push(PresentationEvent::VillainDefeated { id: v.id });
                defeated = true;
            }
        }
    }
    if defeated {
        say(s, "Press E to integrate this shadow.", "Guide", None, events);
    }
}

fn calm_breath(s: &mut GameSession, events: &mut Vec<PresentationEvent>) {
    let until = s.clock_ms + SLOW_MS;
    s.slow_until_ms = Some(until);
    s.schedule.push(until, ScheduledKind::RestoreTimeScale);
    if s.time_scale != SLOW_TIME_SCALE {
        s.time_scale = SLOW_TIME_SCALE;
        events.push(PresentationEvent::TimeScaleChanged(SLOW_TIME_SCALE));
    }
    s.run.fear = rules::shift_fear(s.run.fear, -CALM_FEAR_RELIEF);
}

fn fractal_leap(s: &mut GameSession, _events: &mut Vec<PresentationEvent>) {
    s.player.pos.x = rules::leap_target(s.player.pos.x, s.player.facing);
}

// ══════════════════════════════════════════════════════════════
// Integration
// ══════════════════════════════════════════════════════════════

fn resolve_integration(s: &mut GameSession, input: &FrameInput, events: &mut Vec<PresentationEvent>) {
    if !input.interact { return; }
    let player = s.player.pos;
    let Some(v) = s.villains.iter_mut().find(|v| {
        v.state == VillainState::Defeated && v.pos.distance(player) < PROXIMITY
    }) else { return };

    if !v.integrate() { return; }
    let (id, name, line) = (v.id, v.name.clone(), v.defeat_line.clone());
    debug!("{name} integrated");

    s.run.enlightenment = rules::shift_enlightenment(s.run.enlightenment, INTEGRATE_ENLIGHTENMENT);
    s.run.fear = rules::shift_fear(s.run.fear, -INTEGRATE_FEAR_RELIEF);
    s.run.integrated.push(name.clone());
    s.schedule.push(s.clock_ms + REMOVE_DELAY_MS, ScheduledKind::RemoveVillain(id));

    events.push(PresentationEvent::VillainIntegrated { id, name: name.clone() });
    say(s, &line, &name, Some(INTEGRATE_ACCENT), events);
}

// ══════════════════════════════════════════════════════════════
// Villains
// ══════════════════════════════════════════════════════════════

fn resolve_villains(s: &mut GameSession) {
    let player = s.player.pos;
    for v in &mut s.villains {
        ai::steer(v, player, s.clock_ms, s.time_scale);
    }
}

// ══════════════════════════════════════════════════════════════
// Completion
// ══════════════════════════════════════════════════════════════

/// All villains absent or integrated, enough enlightenment, no dialogue.
pub fn level_complete(s: &GameSession) -> bool {
    s.villains.iter().all(|v| v.is_integrated())
        && s.run.enlightenment >= COMPLETION_ENLIGHTENMENT
        && s.dialogue.is_none()
}

fn resolve_completion(s: &mut GameSession) {
    if s.schedule.contains(ScheduledKind::AdvanceLevel) { return; }
    if !level_complete(s) { return; }
    info!("level {} complete", s.run.current_level + 1);
    s.schedule.push(s.clock_ms + ADVANCE_DELAY_MS, ScheduledKind::AdvanceLevel);
}

// ══════════════════════════════════════════════════════════════
// HUD
// ══════════════════════════════════════════════════════════════

fn resolve_hud(s: &mut GameSession, events: &mut Vec<PresentationEvent>) {
    let hud = s.run.hud();
    if s.last_hud != Some(hud) {
        s.last_hud = Some(hud);
        events.push(PresentationEvent::HudChanged { fear: hud.0, enlightenment: hud.1 });
    }
    events.push(PresentationEvent::AbilitySlots(s.abilities.slots()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Profile, Tuning};
    use crate::domain::entity::{Contacts, Vec2};

    const DT: u32 = 16;

    fn session() -> GameSession {
        let mut s = GameSession::new(Tuning::for_profile(Profile::Classic), vec![]);
        s.begin();
        s
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    fn pressing(id: AbilityId) -> FrameInput {
        let mut input = FrameInput::default();
        input.press(id);
        input
    }

    fn interact() -> FrameInput {
        FrameInput { interact: true, ..FrameInput::default() }
    }

    fn touching_villain(id: usize) -> FrameInput {
        FrameInput {
            contacts: Contacts { villains: vec![id], ..Contacts::default() },
            ..FrameInput::default()
        }
    }

    /// Run idle ticks until `ms` of clock time has passed or the run ends.
    fn idle_for(s: &mut GameSession, ms: u64) -> Vec<PresentationEvent> {
        let end = s.clock_ms + ms;
        let mut all = vec![];
        while s.clock_ms < end && s.phase == Phase::Playing {
            all.extend(s.on_tick(&idle(), DT));
        }
        all
    }

    fn defeat_villain(s: &mut GameSession) {
        s.villains[0].health = 10;
        s.on_tick(&pressing(AbilityId::MirrorSight), DT);
        assert_eq!(s.villains[0].state, VillainState::Defeated);
    }

    // ── Abilities ──

    #[test]
    fn mirror_sight_two_hits_defeat() {
        let mut s = session();
        s.villains[0].health = 40;

        let ev = s.on_tick(&pressing(AbilityId::MirrorSight), DT);
        assert_eq!(s.villains[0].health, 10);
        assert_eq!(s.villains[0].state, VillainState::Active);
        assert!(ev.contains(&PresentationEvent::VillainDamaged { id: 0, health: 10 }));

        // Still cooling: ignored
        s.on_tick(&pressing(AbilityId::MirrorSight), DT);
        assert_eq!(s.villains[0].health, 10);

        idle_for(&mut s, 8_000);
        assert!(s.abilities.get(AbilityId::MirrorSight).is_ready());

        let ev = s.on_tick(&pressing(AbilityId::MirrorSight), DT);
        assert_eq!(s.villains[0].health, -20);
        assert_eq!(s.villains[0].state, VillainState::Defeated);
        assert_eq!(s.villains[0].vel, Vec2::ZERO);
        assert!(ev.contains(&PresentationEvent::VillainDefeated { id: 0 }));
        assert_eq!(s.dialogue.as_ref().map(|d| d.speaker.as_str()), Some("Guide"));
    }

    #[test]
    fn cooling_activation_changes_nothing() {
        let mut s = session();
        s.on_tick(&pressing(AbilityId::CalmBreath), DT);
        let fear = s.run.fear;
        let scale = s.time_scale;
        s.on_tick(&pressing(AbilityId::CalmBreath), DT);
        assert_eq!(s.run.fear, fear);
        assert_eq!(s.time_scale, scale);
    }

    #[test]
    fn locked_ability_is_ignored() {
        let mut s = GameSession::new(Tuning::for_profile(Profile::Progressive), vec![]);
        s.begin();
        let x = s.player.pos.x;
        let ev = s.on_tick(&pressing(AbilityId::FractalLeap), DT);
        assert_eq!(s.player.pos.x, x);
        assert!(!ev.iter().any(|e| matches!(e, PresentationEvent::AbilityActivated(_))));
    }

    #[test]
    fn dissolve_self_freezes_for_five_seconds() {
        let mut s = session();
        s.villains[0].vel.x = -60.0;
        s.on_tick(&pressing(AbilityId::DissolveSelf), DT);
        assert_eq!(s.villains[0].vel.x, 0.0);
        idle_for(&mut s, 4_000);
        assert_eq!(s.villains[0].vel.x, 0.0);
        idle_for(&mut s, 1_100);
        assert!(s.villains[0].vel.x < 0.0);
    }

    #[test]
    fn calm_breath_slows_then_restores() {
        let mut s = session();
        let ev = s.on_tick(&pressing(AbilityId::CalmBreath), DT);
        assert_eq!(s.time_scale, 0.5);
        assert_eq!(s.run.fear, 30);
        assert!(ev.contains(&PresentationEvent::TimeScaleChanged(0.5)));

        let ev = idle_for(&mut s, 5_000);
        assert_eq!(s.time_scale, 1.0);
        assert!(ev.contains(&PresentationEvent::TimeScaleChanged(1.0)));
    }

    #[test]
    fn fractal_leap_clamps_right_edge() {
        let mut s = session();
        s.player.pos.x = 1100.0;
        s.player.facing = crate::domain::entity::Facing::Right;
        s.on_tick(&pressing(AbilityId::FractalLeap), DT);
        assert_eq!(s.player.pos.x, 1150.0);
        assert_eq!(s.player.pos.y, 300.0);
    }

    #[test]
    fn all_four_in_one_tick() {
        let mut s = session();
        let mut input = idle();
        for id in AbilityId::ALL { input.press(id); }
        let ev = s.on_tick(&input, DT);
        let fired = ev.iter().filter(|e| matches!(e, PresentationEvent::AbilityActivated(_))).count();
        assert_eq!(fired, 4);
        assert_eq!(s.villains[0].health, 70);
        assert_eq!(s.time_scale, 0.5);
    }

    #[test]
    fn pickup_awakens_level_power_once() {
        let mut s = GameSession::new(Tuning::for_profile(Profile::Progressive), vec![]);
        s.begin();
        let input = FrameInput {
            contacts: Contacts { pickups: vec![0, 1], ..Contacts::default() },
            ..idle()
        };
        let ev = s.on_tick(&input, DT);
        let unlocked = ev.iter()
            .filter(|e| **e == PresentationEvent::AbilityUnlocked(AbilityId::DissolveSelf))
            .count();
        assert_eq!(unlocked, 1);
        assert!(s.abilities.get(AbilityId::DissolveSelf).unlocked);
        assert!(!s.abilities.get(AbilityId::MirrorSight).unlocked);
        assert_eq!(s.pickups.len(), 3);
        assert_eq!(s.run.enlightenment, 10);
        assert_eq!(s.run.fear, 30);

        // Same ids again: already gone
        s.on_tick(&input, DT);
        assert_eq!(s.run.enlightenment, 10);
    }

    // ── Contact / defeat ──

    #[test]
    fn contact_at_98_fear_is_defeat() {
        let mut s = session();
        s.run.fear = 98;
        s.player.pos = Vec2::new(880.0, 300.0);
        let ev = s.on_tick(&touching_villain(0), DT);
        assert_eq!(s.run.fear, 100);
        assert_eq!(s.phase, Phase::Defeat);
        assert!(ev.contains(&PresentationEvent::Defeat { enlightenment: 0 }));
        // Terminal: further ticks do nothing
        assert!(s.on_tick(&idle(), DT).is_empty());
    }

    #[test]
    fn contact_knocks_player_away() {
        let mut s = session();
        s.player.pos = Vec2::new(880.0, 300.0);
        s.on_tick(&touching_villain(0), DT);
        assert_eq!(s.run.fear, 52);
        assert_eq!(s.player.vel.y, -200.0);
        // Friction from the controller runs after the impulse
        assert!(s.player.vel.x < 0.0);
    }

    #[test]
    fn defeated_villain_does_not_hurt() {
        let mut s = session();
        defeat_villain(&mut s);
        let fear = s.run.fear;
        s.on_tick(&touching_villain(0), DT);
        assert_eq!(s.run.fear, fear);
    }

    // ── Integration ──

    #[test]
    fn integrate_requires_defeat_and_proximity() {
        let mut s = session();
        s.player.pos = s.villains[0].pos;
        s.on_tick(&interact(), DT);
        assert_eq!(s.villains[0].state, VillainState::Active);
        assert_eq!(s.run.enlightenment, 0);

        defeat_villain(&mut s);
        s.player.pos = Vec2::new(s.villains[0].pos.x - 150.0, s.villains[0].pos.y);
        let (fear, e) = (s.run.fear, s.run.enlightenment);
        s.on_tick(&interact(), DT);
        assert_eq!(s.villains[0].state, VillainState::Defeated);
        assert_eq!((s.run.fear, s.run.enlightenment), (fear, e));
    }

    #[test]
    fn integrate_in_range() {
        let mut s = session();
        defeat_villain(&mut s);
        s.player.pos = Vec2::new(s.villains[0].pos.x - 50.0, s.villains[0].pos.y);
        let ev = s.on_tick(&interact(), DT);
        assert_eq!(s.villains[0].state, VillainState::Integrated);
        assert_eq!(s.run.enlightenment, 20);
        assert_eq!(s.run.fear, 20);
        assert_eq!(s.run.integrated, vec!["The Siren of Validation".to_string()]);
        assert!(ev.iter().any(|e| matches!(e, PresentationEvent::VillainIntegrated { id: 0, .. })));
        assert_eq!(s.dialogue.as_ref().and_then(|d| d.accent), Some(0x00ff00));

        // Second press: already integrated
        s.on_tick(&interact(), DT);
        assert_eq!(s.run.enlightenment, 20);

        let ev = idle_for(&mut s, 2_000);
        assert!(s.villains.is_empty());
        assert!(ev.contains(&PresentationEvent::VillainRemoved { id: 0 }));
    }

    // ── Progression ──

    #[test]
    fn completed_level_advances_after_delay() {
        let mut s = session();
        defeat_villain(&mut s);
        s.villains[0].integrate();
        s.run.enlightenment = 55;
        s.dialogue = None;
        s.schedule.clear();

        s.on_tick(&idle(), DT);
        assert!(s.schedule.contains(ScheduledKind::AdvanceLevel));
        let fire_at = s.schedule.events().iter()
            .find(|e| e.kind == ScheduledKind::AdvanceLevel)
            .map(|e| e.fire_at_ms);
        assert_eq!(fire_at, Some(s.clock_ms + 2_000));

        // Exactly one advance is pending while the predicate keeps holding
        s.on_tick(&idle(), DT);
        assert_eq!(s.schedule.len(), 1);

        let ev = idle_for(&mut s, 2_000);
        assert_eq!(s.run.current_level, 1);
        assert_eq!(s.level.name, "The Tower of Perfection");
        assert_eq!(s.villains.len(), 1);
        assert_eq!(s.villains[0].state, VillainState::Active);
        assert_eq!(s.villains[0].health, 100);
        assert_eq!(s.pickups.len(), 5);
        assert_eq!(s.player.pos, Vec2::new(100.0, 300.0));
        assert_eq!(s.run.enlightenment, 55);
        assert!(ev.iter().any(|e| matches!(e, PresentationEvent::LevelStarted { index: 1, .. })));
    }

    #[test]
    fn incomplete_level_does_not_advance() {
        let mut s = session();
        s.run.enlightenment = 80;
        s.dialogue = None;
        s.schedule.clear();
        s.on_tick(&idle(), DT);
        assert!(!s.schedule.contains(ScheduledKind::AdvanceLevel));
    }

    #[test]
    fn active_dialogue_blocks_completion() {
        let mut s = session();
        s.villains.clear();
        s.run.enlightenment = 60;
        s.schedule.clear();
        s.dialogue = Some(DialogueLine {
            text: "wait".into(),
            speaker: "Guide".into(),
            accent: None,
            expires_at_ms: s.clock_ms + 1_000,
        });
        s.on_tick(&idle(), DT);
        assert!(!s.schedule.contains(ScheduledKind::AdvanceLevel));
        idle_for(&mut s, 1_000);
        assert!(s.dialogue.is_none());
        assert!(s.schedule.contains(ScheduledKind::AdvanceLevel));
    }

    #[test]
    fn defeat_cancels_pending_advance() {
        let mut s = session();
        s.villains.clear();
        s.run.enlightenment = 60;
        s.dialogue = None;
        s.schedule.clear();
        s.on_tick(&idle(), DT);
        assert!(s.schedule.contains(ScheduledKind::AdvanceLevel));

        // Fear maxes out before the advance fires
        s.villains = level::spawn(&s.catalog[0]).villains;
        s.run.fear = 98;
        s.on_tick(&touching_villain(0), DT);
        assert_eq!(s.phase, Phase::Defeat);

        s.on_tick(&idle(), 5_000);
        assert_eq!(s.run.current_level, 0);
        assert_eq!(s.phase, Phase::Defeat);
    }

    #[test]
    fn final_level_leads_to_victory() {
        let mut s = session();
        s.run.current_level = 5;
        s.begin();
        assert!(s.villains.is_empty());
        s.run.enlightenment = 120;
        s.dialogue = None;
        s.schedule.clear();

        s.on_tick(&idle(), DT);
        let ev = idle_for(&mut s, 2_000);
        assert_eq!(s.phase, Phase::Victory);
        assert!(ev.contains(&PresentationEvent::Victory { enlightenment: 120 }));
        assert_eq!(s.run.current_level, 5);
    }

    #[test]
    fn level_marked_final_ends_run_early() {
        let mut catalog = crate::domain::catalog::builtin_catalog();
        catalog[0].is_final = true;
        let mut s = GameSession::new(Tuning::for_profile(Profile::Classic), catalog);
        s.begin();
        s.villains.clear();
        s.run.enlightenment = 60;
        s.dialogue = None;
        s.schedule.clear();

        s.on_tick(&idle(), DT);
        let ev = idle_for(&mut s, 2_000);
        assert_eq!(s.phase, Phase::Victory);
        assert_eq!(s.run.current_level, 0);
        assert_eq!(s.level.name, "The Hall of Mirrors");
        assert!(ev.contains(&PresentationEvent::Victory { enlightenment: 60 }));
    }

    #[test]
    fn cooldown_keeps_counting_on_advance_tick() {
        let mut s = session();
        s.on_tick(&pressing(AbilityId::FractalLeap), DT);
        s.villains.clear();
        s.run.enlightenment = 60;
        s.dialogue = None;
        s.schedule.clear();

        s.on_tick(&idle(), DT);
        assert!(s.schedule.contains(ScheduledKind::AdvanceLevel));
        let before = s.abilities.get(AbilityId::FractalLeap).cooldown_remaining_ms;
        let start = s.clock_ms;

        idle_for(&mut s, 2_000);
        assert_eq!(s.run.current_level, 1);
        let elapsed = (s.clock_ms - start) as u32;
        let after = s.abilities.get(AbilityId::FractalLeap).cooldown_remaining_ms;
        assert_eq!(after, before - elapsed);
    }

    #[test]
    fn cooldown_keeps_counting_on_defeat_tick() {
        let mut s = session();
        s.on_tick(&pressing(AbilityId::CalmBreath), DT);
        let before = s.abilities.get(AbilityId::CalmBreath).cooldown_remaining_ms;
        s.run.fear = 98;
        s.on_tick(&touching_villain(0), DT);
        assert_eq!(s.phase, Phase::Defeat);
        assert_eq!(s.abilities.get(AbilityId::CalmBreath).cooldown_remaining_ms, before - DT);
    }

    // ── Dialogue / schedule ──

    #[test]
    fn scripted_lines_at_level_start() {
        let mut s = session();
        let ev = idle_for(&mut s, 1_000);
        assert!(ev.iter().any(|e| matches!(e,
            PresentationEvent::ShowDialogue { speaker, .. } if speaker == "The Fool")));

        let ev = idle_for(&mut s, 2_000);
        assert!(ev.iter().any(|e| matches!(e,
            PresentationEvent::ShowDialogue { accent: Some(0xff0000), .. })));
        let d = s.dialogue.clone().unwrap();
        assert_eq!(d.speaker, "The Siren of Validation");
    }

    #[test]
    fn newer_line_restarts_dismiss_clock() {
        let mut s = session();
        idle_for(&mut s, 1_000);   // guide intro
        idle_for(&mut s, 2_000);   // villain line replaces it
        let expires = s.dialogue.as_ref().map(|d| d.expires_at_ms).unwrap();
        // Old line would have expired 1000 + 5000; the new one holds
        idle_for(&mut s, 3_100);
        assert!(s.dialogue.is_some());
        assert!(s.clock_ms < expires);
        let rest = expires - s.clock_ms;
        let ev = idle_for(&mut s, rest);
        assert!(s.dialogue.is_none());
        assert!(ev.contains(&PresentationEvent::DialogueCleared));
    }

    // ── HUD ──

    #[test]
    fn hud_events_only_on_change_and_slots_every_tick() {
        let mut s = session();
        let ev = s.on_tick(&idle(), DT);
        assert!(!ev.iter().any(|e| matches!(e, PresentationEvent::HudChanged { .. })));
        assert!(ev.iter().any(|e| matches!(e, PresentationEvent::AbilitySlots(_))));

        let ev = s.on_tick(&pressing(AbilityId::CalmBreath), DT);
        assert!(ev.contains(&PresentationEvent::HudChanged { fear: 30, enlightenment: 0 }));
    }

    #[test]
    fn fear_stays_bounded_under_coalesced_events() {
        let mut s = session();
        s.run.fear = 3;
        let input = FrameInput {
            contacts: Contacts { pickups: vec![0, 1, 2, 3, 4], ..Contacts::default() },
            ..idle()
        };
        s.on_tick(&input, DT);
        assert_eq!(s.run.fear, 0);
        s.on_tick(&pressing(AbilityId::CalmBreath), DT);
        assert_eq!(s.run.fear, 0);
    }

    #[test]
    fn restart_keeps_run() {
        let mut s = session();
        s.run.enlightenment = 30;
        s.player.pos.x = 700.0;
        s.pickups.clear();
        s.restart_level();
        assert_eq!(s.run.enlightenment, 30);
        assert_eq!(s.pickups.len(), 5);
        assert_eq!(s.player.pos, Vec2::new(100.0, 300.0));

        s.new_run();
        assert_eq!(s.run, RunProgress::new());
    }
}
