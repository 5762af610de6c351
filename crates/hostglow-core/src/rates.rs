//! Counter-to-rate conversion.
//!
//! Cumulative counters (network bytes, disk sectors) become per-second
//! rates by diffing against the previous observation. The first
//! observation of a key, a counter that moved backwards (reboot or
//! wraparound), a non-positive time delta and a gap longer than the
//! configured maximum all yield no rate for that cycle; a rate is never
//! negative.

use std::collections::HashMap;

use tracing::debug;

use crate::registry::MetricKey;

/// Per-key state carried between cycles.
#[derive(Debug, Clone, Copy)]
struct CounterState {
    last_value: f64,
    last_ts: f64,
    /// Cycle that last observed this key, for staleness eviction.
    seen_cycle: u64,
}

/// Converts cumulative counter observations into per-second rates.
#[derive(Debug)]
pub struct RateConverter {
    states: HashMap<MetricKey, CounterState>,
    cycle: u64,
    /// Consecutive unobserved cycles before a key's state is evicted.
    stale_cycles: u64,
    /// Gaps longer than this re-seed instead of producing a diluted rate.
    max_rate_dt: f64,
}

impl RateConverter {
    pub fn new(stale_cycles: u64, max_rate_dt: f64) -> Self {
        Self {
            states: HashMap::new(),
            cycle: 0,
            stale_cycles,
            max_rate_dt,
        }
    }

    /// Marks the start of a sampling cycle.
    pub fn begin_cycle(&mut self) {
        self.cycle += 1;
    }

    /// Feeds one counter observation, returning the per-second rate when
    /// one can be derived from the previous observation.
    pub fn convert(&mut self, key: &MetricKey, value: f64, now: f64) -> Option<f64> {
        let cycle = self.cycle;
        let Some(state) = self.states.get_mut(key) else {
            self.states.insert(
                key.clone(),
                CounterState {
                    last_value: value,
                    last_ts: now,
                    seen_cycle: cycle,
                },
            );
            return None;
        };

        let dt = now - state.last_ts;
        let delta = value - state.last_value;

        state.last_value = value;
        state.last_ts = now;
        state.seen_cycle = cycle;

        if dt <= 0.0 {
            return None;
        }
        if delta < 0.0 {
            // Counter reset: the new value seeds the next interval.
            debug!(name = %key.name, "counter moved backwards, re-seeding");
            return None;
        }
        if dt > self.max_rate_dt {
            debug!(name = %key.name, dt, "observation gap too long, re-seeding");
            return None;
        }

        Some(delta / dt)
    }

    /// Marks the end of a cycle, evicting state for keys that have gone
    /// unobserved too long (interfaces or devices that disappeared).
    pub fn end_cycle(&mut self) {
        let cycle = self.cycle;
        let stale_cycles = self.stale_cycles;
        self.states
            .retain(|_, state| cycle - state.seen_cycle <= stale_cycles);
    }

    /// Number of keys with live state.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}
