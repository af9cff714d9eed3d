//! Multi-day level stacking.
//!
//! Each completed day contributes its (POC, VAH, VAL) tagged with the
//! day's migration character. Same-kind levels across days that fall
//! within a tick tolerance of each other cluster into stacked levels;
//! strength scales with occurrence count and saturates at a cap.

use chrono::NaiveDate;
use flowtrader_core::{LevelKind, MigrationKind, StackedLevel, ValueArea};
use std::collections::VecDeque;

/// One day's archived reference levels.
#[derive(Debug, Clone)]
pub struct ArchivedDay {
    pub date: NaiveDate,
    pub poc: f64,
    pub vah: f64,
    pub val: f64,
    pub character: MigrationKind,
}

/// Archives daily levels and clusters them into multi-day-confirmed
/// support/resistance.
pub struct LevelStackingManager {
    /// Cluster tolerance in price units.
    tolerance: f64,
    /// Occurrence count at which strength saturates.
    strength_cap: u32,
    /// Bounded archive, oldest first.
    archive: VecDeque<ArchivedDay>,
    max_archive_days: usize,
}

impl LevelStackingManager {
    pub fn new(tolerance: f64, strength_cap: u32, max_archive_days: usize) -> Self {
        Self {
            tolerance,
            strength_cap: strength_cap.max(1),
            archive: VecDeque::new(),
            max_archive_days,
        }
    }

    /// Archive one completed day's value area.
    pub fn archive_day(&mut self, date: NaiveDate, va: &ValueArea, character: MigrationKind) {
        // Re-archiving the same date replaces the earlier entry.
        self.archive.retain(|d| d.date != date);
        self.archive.push_back(ArchivedDay {
            date,
            poc: va.poc,
            vah: va.vah,
            val: va.val,
            character,
        });
        while self.archive.len() > self.max_archive_days {
            self.archive.pop_front();
        }
    }

    /// Number of archived days.
    pub fn archived_days(&self) -> usize {
        self.archive.len()
    }

    /// Cluster archived levels into stacked levels. Only clusters with
    /// at least two contributing days qualify.
    pub fn stacked_levels(&self) -> Vec<StackedLevel> {
        let mut stacked = Vec::new();
        for kind in [LevelKind::Poc, LevelKind::Vah, LevelKind::Val] {
            let mut prices: Vec<f64> = self
                .archive
                .iter()
                .map(|d| match kind {
                    LevelKind::Poc => d.poc,
                    LevelKind::Vah => d.vah,
                    LevelKind::Val => d.val,
                })
                .collect();
            prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let mut cluster: Vec<f64> = Vec::new();
            for price in prices {
                match cluster.last() {
                    Some(&last) if price - last <= self.tolerance => cluster.push(price),
                    _ => {
                        self.emit_cluster(kind, &cluster, &mut stacked);
                        cluster = vec![price];
                    }
                }
            }
            self.emit_cluster(kind, &cluster, &mut stacked);
        }
        // Strongest first.
        stacked.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        stacked
    }

    fn emit_cluster(&self, kind: LevelKind, cluster: &[f64], out: &mut Vec<StackedLevel>) {
        if cluster.len() < 2 {
            return;
        }
        let occurrences = cluster.len() as u32;
        let capped = occurrences.min(self.strength_cap);
        out.push(StackedLevel {
            kind,
            price: cluster.iter().sum::<f64>() / cluster.len() as f64,
            occurrences,
            strength: capped as f64 / self.strength_cap as f64 * 100.0,
        });
    }
}
