/// Deferred effects as explicit records, keyed by the clock time they fire.
///
/// Drained once per tick, in fire-time order; entries sharing a fire time
/// keep insertion order. Nothing here blocks: an entry simply waits in the
/// queue until `drain_due(now)` reaches it.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledKind {
    /// Show the current level's guide intro.
    GuideLine,
    /// Show the current level's villain engage line.
    VillainLine,
    /// Remove an integrated villain and let its guide speak.
    RemoveVillain(usize),
    /// End Calm Breath.
    RestoreTimeScale,
    AdvanceLevel,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub fire_at_ms: u64,
    pub kind: ScheduledKind,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schedule {
    pending: Vec<ScheduledEvent>,
}

impl Schedule {
    pub fn new() -> Self {
        Schedule::default()
    }

    pub fn from_events(mut pending: Vec<ScheduledEvent>) -> Self {
        pending.sort_by_key(|e| e.fire_at_ms);
        Schedule { pending }
    }

    pub fn push(&mut self, fire_at_ms: u64, kind: ScheduledKind) {
        // Insert after every entry due at or before this one
        let at = self.pending.partition_point(|e| e.fire_at_ms <= fire_at_ms);
        self.pending.insert(at, ScheduledEvent { fire_at_ms, kind });
    }

    /// Remove and return every entry with `fire_at_ms <= now_ms`.
    pub fn drain_due(&mut self, now_ms: u64) -> Vec<ScheduledEvent> {
        let n = self.pending.partition_point(|e| e.fire_at_ms <= now_ms);
        self.pending.drain(..n).collect()
    }

    pub fn contains(&self, kind: ScheduledKind) -> bool {
        self.pending.iter().any(|e| e.kind == kind)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.pending
    }
}
