//! VWAP with volume-weighted standard-deviation bands.
//!
//! Recomputes over a fixed lookback of closed candles using typical
//! price (H+L+C)/3 weighted by bar volume. Zero total volume or a
//! degenerate sample surfaces as `None`, never as NaN.

use flowtrader_core::{Candle, VwapBands};
use std::collections::VecDeque;

/// Rolling VWAP calculator over closed candles.
pub struct VwapCalculator {
    lookback: usize,
    prices: VecDeque<f64>,
    volumes: VecDeque<f64>,
}

impl VwapCalculator {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            prices: VecDeque::with_capacity(lookback),
            volumes: VecDeque::with_capacity(lookback),
        }
    }

    /// Add a closed candle to the window.
    pub fn add_candle(&mut self, candle: &Candle) {
        if self.prices.len() >= self.lookback {
            self.prices.pop_front();
            self.volumes.pop_front();
        }
        self.prices.push_back(candle.typical_price());
        self.volumes.push_back(candle.volume);
    }

    /// Volume-weighted average price over the window.
    pub fn vwap(&self) -> Option<f64> {
        let total_volume: f64 = self.volumes.iter().sum();
        if self.prices.is_empty() || total_volume <= 0.0 {
            return None;
        }
        let weighted: f64 = self
            .prices
            .iter()
            .zip(self.volumes.iter())
            .map(|(p, v)| p * v)
            .sum();
        let vwap = weighted / total_volume;
        vwap.is_finite().then_some(vwap)
    }

    /// Volume-weighted standard deviation of prices around the VWAP.
    /// Needs at least two bars.
    pub fn std_dev(&self) -> Option<f64> {
        if self.prices.len() < 2 {
            return None;
        }
        let vwap = self.vwap()?;
        let total_volume: f64 = self.volumes.iter().sum();
        let variance: f64 = self
            .prices
            .iter()
            .zip(self.volumes.iter())
            .map(|(p, v)| v * (p - vwap).powi(2))
            .sum::<f64>()
            / total_volume;
        if variance.is_finite() && variance >= 0.0 {
            Some(variance.sqrt())
        } else {
            None
        }
    }

    /// VWAP plus 1/2/3 sigma bands.
    pub fn bands(&self) -> Option<VwapBands> {
        let vwap = self.vwap()?;
        let std_dev = self.std_dev()?;
        Some(VwapBands::from_vwap(vwap, std_dev))
    }

    /// Number of bars currently in the window.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Reset for a new trading day.
    pub fn reset(&mut self) {
        self.prices.clear();
        self.volumes.clear();
    }
}
