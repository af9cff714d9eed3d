//! Multi-day composite value area.
//!
//! The composite is always rebuilt by replaying the retained days'
//! per-level volumes into a scratch histogram, so the merge is
//! commutative: the result depends only on the set of retained days,
//! never on insertion order.

use chrono::NaiveDate;
use flowtrader_core::{DailyProfile, LevelVolume, Price, ValueArea};
use flowtrader_ingestion::compute_value_area;
use std::collections::BTreeMap;

/// The merged multi-day profile.
#[derive(Debug, Clone)]
pub struct CompositeProfile {
    /// Merged histogram across retained days.
    pub levels: BTreeMap<Price, LevelVolume>,
    /// Value area of the merged histogram.
    pub value_area: ValueArea,
    /// Number of days merged.
    pub days: usize,
}

/// Holds the rolling window of closed daily profiles and the lazily
/// rebuilt composite.
pub struct CompositeContext {
    max_days: usize,
    va_fraction: f64,
    days: BTreeMap<NaiveDate, DailyProfile>,
    cached: Option<CompositeProfile>,
}

impl CompositeContext {
    pub fn new(max_days: usize, va_fraction: f64) -> Self {
        Self {
            max_days,
            va_fraction,
            days: BTreeMap::new(),
            cached: None,
        }
    }

    /// Upsert a daily profile by date, retaining only the most recent
    /// `max_days` dates. Invalidates any cached composite.
    pub fn add_daily_profile(&mut self, profile: DailyProfile) {
        self.days.insert(profile.date, profile);
        while self.days.len() > self.max_days {
            let oldest = *self.days.keys().next().expect("non-empty");
            self.days.remove(&oldest);
        }
        self.cached = None;
    }

    /// Number of retained days.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// The composite profile, rebuilt on demand. `None` when no days
    /// are retained or the retained days carry no volume.
    pub fn composite(&mut self) -> Option<&CompositeProfile> {
        if self.cached.is_none() {
            self.cached = self.rebuild();
        }
        self.cached.as_ref()
    }

    /// Composite value area alone, for callers that do not need levels.
    pub fn composite_value_area(&mut self) -> Option<ValueArea> {
        self.composite().map(|c| c.value_area)
    }

    fn rebuild(&self) -> Option<CompositeProfile> {
        if self.days.is_empty() {
            return None;
        }
        let mut scratch: BTreeMap<Price, LevelVolume> = BTreeMap::new();
        for profile in self.days.values() {
            for (price, level) in &profile.levels {
                let entry = scratch.entry(*price).or_default();
                entry.buy += level.buy;
                entry.sell += level.sell;
            }
        }
        let value_area = compute_value_area(&scratch, self.va_fraction)?;
        Some(CompositeProfile {
            levels: scratch,
            value_area,
            days: self.days.len(),
        })
    }
}
