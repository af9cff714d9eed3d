//! Daily volume profiles: price histograms with value areas.
//!
//! One live builder accumulates today's ticks; closing it yields an
//! immutable `DailyProfile` for the composite history.

use chrono::NaiveDate;
use flowtrader_core::{
    AggressorSide, DailyProfile, LevelVolume, Price, ProfileShape, Tick, ValueArea,
};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

/// Compute POC and value area from a buy/sell histogram.
///
/// Expands outward from the POC toward whichever neighbor carries more
/// volume until the target coverage is reached. Returns `None` for an
/// empty or zero-volume histogram; the result always satisfies
/// VAL <= POC <= VAH.
pub fn compute_value_area(
    levels: &BTreeMap<Price, LevelVolume>,
    va_fraction: f64,
) -> Option<ValueArea> {
    let total_volume: f64 = levels.values().map(|l| l.total()).sum();
    if levels.is_empty() || total_volume <= 0.0 {
        return None;
    }

    let bins: Vec<(f64, f64)> = levels.iter().map(|(p, l)| (p.0, l.total())).collect();

    // POC: bin with maximum volume.
    let poc_idx = bins
        .iter()
        .enumerate()
        .max_by(|a, b| {
            a.1 .1
                .partial_cmp(&b.1 .1)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)?;

    let target_volume = total_volume * va_fraction;
    let mut cumulative = bins[poc_idx].1;
    let mut low_idx = poc_idx;
    let mut high_idx = poc_idx;

    while cumulative < target_volume {
        let next_low = low_idx.checked_sub(1);
        let next_high = if high_idx < bins.len() - 1 {
            Some(high_idx + 1)
        } else {
            None
        };

        // Expand toward the higher-volume adjacent bin.
        let expand_low = match (next_low, next_high) {
            (Some(l), Some(h)) => bins[l].1 >= bins[h].1,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        if expand_low {
            low_idx = next_low.unwrap();
            cumulative += bins[low_idx].1;
        } else {
            high_idx = next_high.unwrap();
            cumulative += bins[high_idx].1;
        }
    }

    Some(ValueArea {
        poc: bins[poc_idx].0,
        vah: bins[high_idx].0,
        val: bins[low_idx].0,
        coverage: cumulative / total_volume,
        total_volume,
    })
}

/// Coarse shape classification from POC position and value-area spread.
fn classify_shape(levels: &BTreeMap<Price, LevelVolume>, va: &ValueArea) -> ProfileShape {
    let low = levels.keys().next().map(|p| p.0).unwrap_or(va.val);
    let high = levels.keys().next_back().map(|p| p.0).unwrap_or(va.vah);
    let range = high - low;
    if range <= 0.0 {
        return ProfileShape::Balanced;
    }

    let poc_pos = (va.poc - low) / range;
    if poc_pos >= 2.0 / 3.0 {
        ProfileShape::PShape
    } else if poc_pos <= 1.0 / 3.0 {
        ProfileShape::BShape
    } else if va.width() / range < 0.35 {
        // Narrow value inside a wide range: one-timeframe trend day.
        ProfileShape::Trend
    } else {
        ProfileShape::Balanced
    }
}

/// Accumulates today's live volume profile.
pub struct ProfileBuilder {
    date: NaiveDate,
    tick_size: f64,
    va_fraction: f64,
    levels: BTreeMap<Price, LevelVolume>,
}

impl ProfileBuilder {
    pub fn new(date: NaiveDate, tick_size: f64, va_fraction: f64) -> Self {
        Self {
            date,
            tick_size,
            va_fraction,
            levels: BTreeMap::new(),
        }
    }

    /// Trading date this profile covers.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    fn price_key(&self, price: f64) -> Price {
        OrderedFloat((price / self.tick_size).round() * self.tick_size)
    }

    /// Accumulate one tick.
    pub fn add_tick(&mut self, tick: &Tick) {
        let level = self.levels.entry(self.price_key(tick.price)).or_default();
        match tick.side {
            AggressorSide::Buy => level.buy += tick.size,
            AggressorSide::Sell => level.sell += tick.size,
        }
    }

    /// Total volume accumulated so far.
    pub fn total_volume(&self) -> f64 {
        self.levels.values().map(|l| l.total()).sum()
    }

    /// Value area of the live profile, `None` while empty.
    pub fn value_area(&self) -> Option<ValueArea> {
        compute_value_area(&self.levels, self.va_fraction)
    }

    /// Read-only view of the histogram.
    pub fn levels(&self) -> &BTreeMap<Price, LevelVolume> {
        &self.levels
    }

    /// Close the day: freeze into an immutable profile and reset the
    /// builder for `next_date`.
    pub fn roll(&mut self, next_date: NaiveDate) -> DailyProfile {
        let levels = std::mem::take(&mut self.levels);
        let value_area = compute_value_area(&levels, self.va_fraction);
        let shape = value_area
            .as_ref()
            .map(|va| classify_shape(&levels, va))
            .unwrap_or(ProfileShape::Balanced);
        let profile = DailyProfile {
            date: self.date,
            levels,
            value_area,
            shape,
        };
        self.date = next_date;
        profile
    }
}
