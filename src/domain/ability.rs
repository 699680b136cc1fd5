/// Ability bank: the four Mind Bloom powers and their cooldowns.
///
/// Each ability is independently unlockable and independently gated by a
/// countdown. Activation sets `cooldown_remaining_ms = max_cooldown_ms`;
/// the per-tick `tick(dt)` lowers it with `max(0, c - dt)`. A request on a
/// locked or cooling ability is ignored.
///
/// The bank is run-scoped: it survives level transitions.

use serde::{Deserialize, Serialize};

use crate::config::{Tuning, UnlockPolicy};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityId {
    DissolveSelf,
    MirrorSight,
    CalmBreath,
    FractalLeap,
}

/// Static description of one ability slot.
#[derive(Clone, Copy, Debug)]
pub struct AbilityDef {
    pub id: AbilityId,
    pub name: &'static str,
    pub key: char,
    pub summary: &'static str,
}

pub const ABILITY_DEFS: [AbilityDef; 4] = [
    AbilityDef {
        id: AbilityId::DissolveSelf,
        name: "Dissolve Self",
        key: '1',
        summary: "Freeze every shadow for five seconds",
    },
    AbilityDef {
        id: AbilityId::MirrorSight,
        name: "Mirror Sight",
        key: '2',
        summary: "Wound every shadow you can see",
    },
    AbilityDef {
        id: AbilityId::CalmBreath,
        name: "Calm Breath",
        key: '3',
        summary: "Slow time and quiet your fear",
    },
    AbilityDef {
        id: AbilityId::FractalLeap,
        name: "Fractal Leap",
        key: '4',
        summary: "Blink 300 units ahead",
    },
];

impl AbilityId {
    pub const ALL: [AbilityId; 4] = [
        AbilityId::DissolveSelf,
        AbilityId::MirrorSight,
        AbilityId::CalmBreath,
        AbilityId::FractalLeap,
    ];

    /// Slot index (0..4), matching HUD order.
    pub fn index(self) -> usize {
        match self {
            AbilityId::DissolveSelf => 0,
            AbilityId::MirrorSight => 1,
            AbilityId::CalmBreath => 2,
            AbilityId::FractalLeap => 3,
        }
    }

    pub fn def(self) -> &'static AbilityDef {
        &ABILITY_DEFS[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AbilityState {
    pub unlocked: bool,
    pub cooldown_remaining_ms: u32,
    pub max_cooldown_ms: u32,
}

impl AbilityState {
    pub fn is_ready(&self) -> bool {
        self.unlocked && self.cooldown_remaining_ms == 0
    }

    /// Remaining cooldown as 0..=100.
    pub fn percent_remaining(&self) -> u8 {
        if self.max_cooldown_ms == 0 || self.cooldown_remaining_ms == 0 {
            return 0;
        }
        let pct = self.cooldown_remaining_ms as u64 * 100 / self.max_cooldown_ms as u64;
        pct.min(100) as u8
    }
}

/// HUD view of one ability slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AbilitySlot {
    Locked,
    Ready,
    Cooling { percent_remaining: u8 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbilityBank {
    states: [AbilityState; 4],
}

impl AbilityBank {
    pub fn new(tuning: &Tuning) -> Self {
        let unlocked = tuning.unlock_policy == UnlockPolicy::AllUnlocked;
        let states = AbilityId::ALL.map(|id| AbilityState {
            unlocked,
            cooldown_remaining_ms: 0,
            max_cooldown_ms: tuning.cooldowns.for_ability(id),
        });
        AbilityBank { states }
    }

    /// Rebuild from saved states (slot order).
    pub fn from_states(states: [AbilityState; 4]) -> Self {
        AbilityBank { states }
    }

    pub fn states(&self) -> [AbilityState; 4] {
        self.states
    }

    pub fn get(&self, id: AbilityId) -> &AbilityState {
        &self.states[id.index()]
    }

    /// Unlock an ability. Returns true only if it was locked before.
    pub fn unlock(&mut self, id: AbilityId) -> bool {
        let s = &mut self.states[id.index()];
        if s.unlocked {
            return false;
        }
        s.unlocked = true;
        true
    }

    /// Start the cooldown if the ability is usable. Returns whether it fired.
    pub fn try_activate(&mut self, id: AbilityId) -> bool {
        let s = &mut self.states[id.index()];
        if !s.is_ready() {
            return false;
        }
        s.cooldown_remaining_ms = s.max_cooldown_ms;
        true
    }

    /// Advance every cooldown by `dt_ms` of real time, floored at zero.
    pub fn tick(&mut self, dt_ms: u32) {
        for s in &mut self.states {
            s.cooldown_remaining_ms = s.cooldown_remaining_ms.saturating_sub(dt_ms);
        }
    }

    pub fn slots(&self) -> [AbilitySlot; 4] {
        self.states.map(|s| {
            if !s.unlocked {
                AbilitySlot::Locked
            } else if s.cooldown_remaining_ms == 0 {
                AbilitySlot::Ready
            } else {
                AbilitySlot::Cooling { percent_remaining: s.percent_remaining() }
            }
        })
    }
}
