//! Migration detection: how today's value area sits against the
//! composite.
//!
//! Overlap is the intersected range over the union range of the two
//! [VAL, VAH] intervals. Low overlap with a higher daily midpoint is
//! bullish migration, lower is bearish; high overlap is neutral unless
//! price is pressing a composite edge, which is breakout-pending.

use flowtrader_core::{MigrationKind, ValueArea};

/// Classifies daily-vs-composite value-area migration.
pub struct MigrationDetector {
    /// Overlap at or above this is "mostly overlapping".
    overlap_threshold: f64,
    /// Price distance counting as pressing a composite edge.
    edge_tolerance: f64,
}

impl MigrationDetector {
    pub fn new(overlap_threshold: f64, edge_tolerance: f64) -> Self {
        Self {
            overlap_threshold,
            edge_tolerance,
        }
    }

    /// Intersection-over-union of the two value areas, in [0, 1].
    pub fn overlap_ratio(daily: &ValueArea, composite: &ValueArea) -> f64 {
        let intersect_low = daily.val.max(composite.val);
        let intersect_high = daily.vah.min(composite.vah);
        let intersection = (intersect_high - intersect_low).max(0.0);

        let union_low = daily.val.min(composite.val);
        let union_high = daily.vah.max(composite.vah);
        let union = union_high - union_low;

        if union > 0.0 {
            intersection / union
        } else {
            // Two degenerate (single-price) value areas overlap fully
            // when they coincide.
            if (daily.poc - composite.poc).abs() < f64::EPSILON {
                1.0
            } else {
                0.0
            }
        }
    }

    /// Classify today's migration given the latest traded price.
    pub fn detect(
        &self,
        daily: &ValueArea,
        composite: &ValueArea,
        last_price: f64,
    ) -> MigrationKind {
        let overlap = Self::overlap_ratio(daily, composite);

        if overlap >= self.overlap_threshold {
            let at_edge = (last_price - composite.vah).abs() <= self.edge_tolerance
                || (last_price - composite.val).abs() <= self.edge_tolerance;
            if at_edge {
                MigrationKind::BreakoutPending
            } else {
                MigrationKind::NeutralOverlap
            }
        } else {
            let daily_mid = (daily.vah + daily.val) / 2.0;
            let composite_mid = (composite.vah + composite.val) / 2.0;
            if daily_mid > composite_mid {
                MigrationKind::BullishMigration
            } else {
                MigrationKind::BearishMigration
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn va(val: f64, poc: f64, vah: f64) -> ValueArea {
        ValueArea {
            poc,
            vah,
            val,
            coverage: 0.70,
            total_volume: 1000.0,
        }
    }

    fn detector() -> MigrationDetector {
        MigrationDetector::new(0.5, 1.0)
    }

    #[test]
    fn test_full_overlap_ratio() {
        let a = va(4990.0, 5000.0, 5010.0);
        assert!((MigrationDetector::overlap_ratio(&a, &a) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_disjoint_overlap_ratio() {
        let daily = va(5020.0, 5025.0, 5030.0);
        let composite = va(4990.0, 5000.0, 5010.0);
        assert_eq!(MigrationDetector::overlap_ratio(&daily, &composite), 0.0);
    }

    #[test]
    fn test_partial_overlap_ratio() {
        // daily [5005, 5015], composite [5000, 5010]:
        // intersection 5, union 15.
        let daily = va(5005.0, 5010.0, 5015.0);
        let composite = va(5000.0, 5005.0, 5010.0);
        let ratio = MigrationDetector::overlap_ratio(&daily, &composite);
        assert!((ratio - 5.0 / 15.0).abs() < 1e-10);
    }

    #[test]
    fn test_bullish_migration() {
        let daily = va(5012.0, 5018.0, 5024.0);
        let composite = va(4990.0, 5000.0, 5010.0);
        assert_eq!(
            detector().detect(&daily, &composite, 5018.0),
            MigrationKind::BullishMigration
        );
    }

    #[test]
    fn test_bearish_migration() {
        let daily = va(4970.0, 4976.0, 4982.0);
        let composite = va(4990.0, 5000.0, 5010.0);
        assert_eq!(
            detector().detect(&daily, &composite, 4975.0),
            MigrationKind::BearishMigration
        );
    }

    #[test]
    fn test_neutral_overlap() {
        let daily = va(4992.0, 5001.0, 5011.0);
        let composite = va(4990.0, 5000.0, 5010.0);
        assert_eq!(
            detector().detect(&daily, &composite, 5000.0),
            MigrationKind::NeutralOverlap
        );
    }

    #[test]
    fn test_breakout_pending_at_edge() {
        let daily = va(4992.0, 5001.0, 5011.0);
        let composite = va(4990.0, 5000.0, 5010.0);
        // Price within tolerance of the composite VAH.
        assert_eq!(
            detector().detect(&daily, &composite, 5009.5),
            MigrationKind::BreakoutPending
        );
        // And of the composite VAL.
        assert_eq!(
            detector().detect(&daily, &composite, 4990.5),
            MigrationKind::BreakoutPending
        );
    }
}
