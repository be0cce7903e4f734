//! Tunables for the dictionary and the skip list.

use crate::memory::UsedMemory;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared on/off switch for automatic table resizing.
///
/// Cloning yields a handle to the same switch, so a caller can pause growth
/// for a whole family of dictionaries at once (e.g. while a copy-on-write
/// snapshot is running) and resume it later. Explicit `expand` calls are not
/// affected.
#[derive(Clone, Debug)]
pub struct ResizeSwitch {
    enabled: Arc<AtomicBool>,
}

impl ResizeSwitch {
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for ResizeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct DictConfig {
    /// Size of the first table and the floor for every resize. Power of two, at least 4.
    pub initial_size: usize,
    /// Load factor above which the table grows even while resizing is disabled.
    pub force_resize_ratio: usize,
    /// Empty slots a rehash batch may skip, per requested step.
    pub rehash_empty_visits: usize,
    /// `clear` reports progress every this many slots.
    pub clear_progress_interval: usize,
    pub resize: ResizeSwitch,
    pub memory: UsedMemory,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            initial_size: 4,
            force_resize_ratio: 5,
            rehash_empty_visits: 10,
            clear_progress_interval: 65536,
            resize: ResizeSwitch::new(),
            memory: UsedMemory::new(),
        }
    }
}

impl DictConfig {
    pub fn with_initial_size(mut self, size: usize) -> Self {
        assert!(
            size >= 4 && size.is_power_of_two(),
            "initial size must be a power of two >= 4, got {size}"
        );
        self.initial_size = size;
        self
    }

    pub fn with_force_resize_ratio(mut self, ratio: usize) -> Self {
        self.force_resize_ratio = ratio;
        self
    }

    pub fn with_rehash_empty_visits(mut self, visits: usize) -> Self {
        assert!(visits > 0, "rehash_empty_visits must be positive");
        self.rehash_empty_visits = visits;
        self
    }

    pub fn with_clear_progress_interval(mut self, slots: usize) -> Self {
        assert!(slots > 0, "clear_progress_interval must be positive");
        self.clear_progress_interval = slots;
        self
    }

    pub fn with_resize_switch(mut self, switch: ResizeSwitch) -> Self {
        self.resize = switch;
        self
    }

    pub fn with_memory(mut self, memory: UsedMemory) -> Self {
        self.memory = memory;
        self
    }
}

#[derive(Clone, Debug)]
pub struct SkipListConfig {
    /// Chance that a node climbs one more level.
    pub probability: f64,
    /// Seed for level draws; `None` seeds from the OS.
    pub seed: Option<u64>,
    pub memory: UsedMemory,
}

impl Default for SkipListConfig {
    fn default() -> Self {
        Self {
            probability: 0.25,
            seed: None,
            memory: UsedMemory::new(),
        }
    }
}

impl SkipListConfig {
    pub fn with_probability(mut self, p: f64) -> Self {
        assert!(p > 0.0 && p < 1.0, "level probability must be in (0, 1)");
        self.probability = p;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_memory(mut self, memory: UsedMemory) -> Self {
        self.memory = memory;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_clones_share_state() {
        let a = ResizeSwitch::new();
        let b = a.clone();
        assert!(b.is_enabled());
        a.disable();
        assert!(!b.is_enabled());
        b.enable();
        assert!(a.is_enabled());
    }

    #[test]
    fn defaults_match_engine_constants() {
        let c = DictConfig::default();
        assert_eq!(c.initial_size, 4);
        assert_eq!(c.force_resize_ratio, 5);
        assert_eq!(c.rehash_empty_visits, 10);
        assert_eq!(c.clear_progress_interval, 65536);
        assert!(c.resize.is_enabled());
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn initial_size_must_be_power_of_two() {
        let _ = DictConfig::default().with_initial_size(6);
    }
}
