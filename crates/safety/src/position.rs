//! Position accounting from confirmed fills.
//!
//! A single mutable record owns "flat or not". Fills in the held
//! direction average into the entry price; opposing fills realize P&L
//! and may flip the position through zero.

use flowtrader_core::{OrderAction, Position};

/// Applies fills to the single position record and marks P&L.
pub struct PositionTracker {
    position: Position,
    point_value: f64,
}

impl PositionTracker {
    pub fn new(point_value: f64) -> Self {
        Self {
            position: Position::default(),
            point_value,
        }
    }

    /// Read-only view of the position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Apply a confirmed fill.
    pub fn apply_fill(&mut self, action: OrderAction, quantity: u32, price: f64) {
        let signed_qty = action.sign() * quantity as i32;
        let current = self.position.contracts;

        if current == 0 || current.signum() == signed_qty.signum() {
            // Opening or adding: volume-weighted entry.
            let total = current.abs() + signed_qty.abs();
            if total > 0 {
                self.position.entry_price = (self.position.entry_price * current.abs() as f64
                    + price * signed_qty.abs() as f64)
                    / total as f64;
            }
            self.position.contracts = current + signed_qty;
        } else {
            // Reducing, closing, or flipping through zero.
            let closing = current.abs().min(signed_qty.abs());
            let direction = current.signum() as f64;
            self.position.realized_pnl +=
                (price - self.position.entry_price) * direction * closing as f64 * self.point_value;

            let remaining = current + signed_qty;
            if remaining == 0 {
                self.position.contracts = 0;
                self.position.entry_price = 0.0;
                self.position.unrealized_pnl = 0.0;
            } else if remaining.signum() == current.signum() {
                // Partial reduction keeps the original entry.
                self.position.contracts = remaining;
            } else {
                // Flipped: remainder opens a fresh position at this fill.
                self.position.contracts = remaining;
                self.position.entry_price = price;
            }
        }
        self.mark(price);
    }

    /// Mark unrealized P&L to a price.
    pub fn mark(&mut self, price: f64) {
        if self.position.contracts == 0 {
            self.position.unrealized_pnl = 0.0;
        } else {
            self.position.unrealized_pnl = (price - self.position.entry_price)
                * self.position.contracts as f64
                * self.point_value;
        }
    }

    /// Realized plus unrealized P&L.
    pub fn daily_pnl(&self) -> f64 {
        self.position.realized_pnl + self.position.unrealized_pnl
    }

    /// Reset realized P&L at the daily roll.
    pub fn reset_daily(&mut self) {
        self.position.realized_pnl = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PositionTracker {
        PositionTracker::new(50.0)
    }

    #[test]
    fn test_open_long_and_mark() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Buy, 2, 5000.0);

        assert_eq!(t.position().contracts, 2);
        assert_eq!(t.position().entry_price, 5000.0);

        t.mark(5002.0);
        // 2 points * 2 contracts * $50.
        assert_eq!(t.position().unrealized_pnl, 200.0);
    }

    #[test]
    fn test_add_averages_entry() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Buy, 1, 5000.0);
        t.apply_fill(OrderAction::Buy, 1, 5010.0);

        assert_eq!(t.position().contracts, 2);
        assert_eq!(t.position().entry_price, 5005.0);
    }

    #[test]
    fn test_close_realizes_pnl() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Buy, 2, 5000.0);
        t.apply_fill(OrderAction::Sell, 2, 5004.0);

        assert!(t.position().is_flat());
        // 4 points * 2 contracts * $50.
        assert_eq!(t.position().realized_pnl, 400.0);
        assert_eq!(t.position().unrealized_pnl, 0.0);
    }

    #[test]
    fn test_short_side_pnl() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Sell, 1, 5000.0);
        t.mark(4996.0);
        assert_eq!(t.position().unrealized_pnl, 200.0);

        t.apply_fill(OrderAction::Buy, 1, 4996.0);
        assert_eq!(t.position().realized_pnl, 200.0);
        assert!(t.position().is_flat());
    }

    #[test]
    fn test_partial_close_keeps_entry() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Buy, 3, 5000.0);
        t.apply_fill(OrderAction::Sell, 1, 5002.0);

        assert_eq!(t.position().contracts, 2);
        assert_eq!(t.position().entry_price, 5000.0);
        assert_eq!(t.position().realized_pnl, 100.0);
    }

    #[test]
    fn test_flip_through_zero() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Buy, 1, 5000.0);
        t.apply_fill(OrderAction::Sell, 2, 5004.0);

        assert_eq!(t.position().contracts, -1);
        assert_eq!(t.position().entry_price, 5004.0);
        assert_eq!(t.position().realized_pnl, 200.0);
    }

    #[test]
    fn test_daily_reset() {
        let mut t = tracker();
        t.apply_fill(OrderAction::Buy, 1, 5000.0);
        t.apply_fill(OrderAction::Sell, 1, 5002.0);
        assert_eq!(t.daily_pnl(), 100.0);

        t.reset_daily();
        assert_eq!(t.daily_pnl(), 0.0);
    }
}
