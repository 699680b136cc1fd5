/// Keyboard state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement and jump while a key is held
///   - Edge-triggered abilities and integrate (only fire on initial press)
///   - Movement and abilities in the same tick
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
///
/// Bindings:
///   ← / a        move left        → / d       move right
///   ↑ / w / Space  jump           1 2 3 4     abilities
///   e            integrate

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use mindbloom::domain::ability::ABILITY_DEFS;
use mindbloom::domain::entity::{Contacts, FrameInput};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

const LEFT: [KeyCode; 3] = [KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const RIGHT: [KeyCode; 3] = [KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const JUMP: [KeyCode; 4] = [KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W'), KeyCode::Char(' ')];
const INTERACT: [KeyCode; 2] = [KeyCode::Char('e'), KeyCode::Char('E')];

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.raw_events.push(key);
                match key.kind {
                    KeyEventKind::Release if self.honor_release => {
                        self.last_active.remove(&key.code);
                    }
                    KeyEventKind::Release => {
                        // Unconfirmed enhancement: rely on timeout expiry
                    }
                    _ => self.note_active(key.code),
                }
            }
        }

        // Expire keys that have timed out (fallback for terminals without Release)
        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    /// Is this key currently held down?
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active.get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// Build this frame's core input from the keyboard and the contacts the
    /// physics step just reported.
    pub fn frame_input(&self, contacts: Contacts) -> FrameInput {
        let mut input = FrameInput {
            left: self.any_held(&LEFT),
            right: self.any_held(&RIGHT),
            jump: self.any_held(&JUMP),
            interact: self.any_pressed(&INTERACT),
            contacts,
            ..FrameInput::default()
        };
        for def in &ABILITY_DEFS {
            if self.was_pressed(KeyCode::Char(def.key)) {
                input.press(def.id);
            }
        }
        input
    }

    // ── Internal ──

    fn note_active(&mut self, code: KeyCode) {
        let was_held = self.is_held(code);
        self.last_active.insert(code, Instant::now());
        if !was_held {
            self.fresh_presses.push(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindbloom::domain::ability::AbilityId;

    #[test]
    fn held_keys_map_to_movement() {
        let mut st = InputState::new();
        st.note_active(KeyCode::Char('a'));
        st.note_active(KeyCode::Char(' '));
        let input = st.frame_input(Contacts::default());
        assert!(input.left);
        assert!(!input.right);
        assert!(input.jump);
        assert!(!input.interact);
    }

    #[test]
    fn repeat_is_not_a_fresh_press() {
        let mut st = InputState::new();
        st.note_active(KeyCode::Char('2'));
        assert!(st.frame_input(Contacts::default()).pressed(AbilityId::MirrorSight));

        // Next frame: key still held (auto-repeat)
        st.fresh_presses.clear();
        st.note_active(KeyCode::Char('2'));
        assert!(!st.frame_input(Contacts::default()).pressed(AbilityId::MirrorSight));
    }

    #[test]
    fn interact_and_contacts_pass_through() {
        let mut st = InputState::new();
        st.note_active(KeyCode::Char('E'));
        let contacts = Contacts { grounded: true, pickups: vec![3], villains: vec![] };
        let input = st.frame_input(contacts.clone());
        assert!(input.interact);
        assert_eq!(input.contacts, contacts);
    }
}
