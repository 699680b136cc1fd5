/// Presentation requests emitted by a tick.
/// The front-end consumes these for dialogue, HUD, and terminal screens;
/// the core never renders anything itself.

use crate::domain::ability::{AbilityId, AbilitySlot};
use crate::domain::catalog::BackgroundSpec;

#[derive(Clone, Debug, PartialEq)]
pub enum PresentationEvent {
    LevelStarted {
        index: usize,
        name: String,
        fear_label: String,
        background: BackgroundSpec,
    },
    ShowDialogue {
        text: String,
        speaker: String,
        accent: Option<u32>,
        duration_ms: u64,
    },
    DialogueCleared,
    /// Both bars as 0..=100.
    HudChanged { fear: u8, enlightenment: u8 },
    AbilitySlots([AbilitySlot; 4]),
    AbilityActivated(AbilityId),
    AbilityUnlocked(AbilityId),
    PickupCollected { id: usize },
    PlayerHit { villain: usize },
    Jumped,
    VillainDamaged { id: usize, health: i32 },
    VillainDefeated { id: usize },
    VillainIntegrated { id: usize, name: String },
    VillainRemoved { id: usize },
    TimeScaleChanged(f32),
    /// Outcome events carry the raw enlightenment total, which may exceed 100.
    Defeat { enlightenment: i32 },
    Victory { enlightenment: i32 },
}
