// src/resilience/degradation.rs
// Tracks overall system health as a degradation level and gates optional
// capabilities accordingly.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DegradationLevel {
    Full = 0,
    Reduced = 1,
    Minimal = 2,
    Off = 3,
}

impl DegradationLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Full,
            1 => Self::Reduced,
            2 => Self::Minimal,
            _ => Self::Off,
        }
    }
}

/// Capabilities that can be switched off as the system degrades. Ordered
/// from first-to-drop to last-to-drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    VectorSearch,
    ExternalAdapters,
    TierPromotion,
    CoreWrites,
}

impl Capability {
    fn min_level(self) -> DegradationLevel {
        match self {
            Capability::VectorSearch => DegradationLevel::Reduced,
            Capability::ExternalAdapters => DegradationLevel::Minimal,
            Capability::TierPromotion => DegradationLevel::Minimal,
            Capability::CoreWrites => DegradationLevel::Off,
        }
    }
}

pub struct DegradationManager {
    level: AtomicU8,
}

impl Default for DegradationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DegradationManager {
    pub fn new() -> Self {
        Self { level: AtomicU8::new(DegradationLevel::Full as u8) }
    }

    pub fn level(&self) -> DegradationLevel {
        DegradationLevel::from_u8(self.level.load(Ordering::SeqCst))
    }

    pub fn set_level(&self, level: DegradationLevel) {
        self.level.store(level as u8, Ordering::SeqCst);
    }

    /// A capability stays enabled as long as the current level is below the
    /// level at which that capability is first dropped.
    pub fn is_capability_enabled(&self, capability: Capability) -> bool {
        self.level() < capability.min_level()
    }

    pub fn escalate(&self) {
        let next = (self.level() as u8 + 1).min(DegradationLevel::Off as u8);
        self.level.store(next, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        let next = self.level().checked_sub_level();
        self.level.store(next as u8, Ordering::SeqCst);
    }
}

impl DegradationLevel {
    fn checked_sub_level(self) -> DegradationLevel {
        DegradationLevel::from_u8((self as u8).saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_search_drops_first() {
        let manager = DegradationManager::new();
        assert!(manager.is_capability_enabled(Capability::VectorSearch));
        manager.set_level(DegradationLevel::Reduced);
        assert!(!manager.is_capability_enabled(Capability::VectorSearch));
        assert!(manager.is_capability_enabled(Capability::ExternalAdapters));
    }

    #[test]
    fn core_writes_only_disabled_when_off() {
        let manager = DegradationManager::new();
        manager.set_level(DegradationLevel::Minimal);
        assert!(manager.is_capability_enabled(Capability::CoreWrites));
        manager.set_level(DegradationLevel::Off);
        assert!(!manager.is_capability_enabled(Capability::CoreWrites));
    }

    #[test]
    fn escalate_then_recover_round_trips() {
        let manager = DegradationManager::new();
        manager.escalate();
        manager.escalate();
        assert_eq!(manager.level(), DegradationLevel::Minimal);
        manager.recover();
        assert_eq!(manager.level(), DegradationLevel::Reduced);
    }
}
