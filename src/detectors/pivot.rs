//! Swing pivot classification
//!
//! A bar is a local high (low) when no bar within `radius` positions on
//! either side has a strictly higher high (strictly lower low). Equal
//! values never disqualify, so every bar of a flat plateau qualifies.

use serde::{Deserialize, Serialize};

use crate::OHLC;

/// Default neighbourhood radius on each side of a pivot candidate
pub const DEFAULT_PIVOT_RADIUS: usize = 3;

/// Which extreme of the bar a pivot refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

impl PivotKind {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            PivotKind::High => PivotKind::Low,
            PivotKind::Low => PivotKind::High,
        }
    }

    /// The bar price this kind of pivot tracks (`high` or `low`)
    #[inline]
    pub fn price_of<T: OHLC>(self, bar: &T) -> f64 {
        match self {
            PivotKind::High => bar.high(),
            PivotKind::Low => bar.low(),
        }
    }

    /// True if `candidate` is strictly more extreme than `current`
    #[inline]
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            PivotKind::High => candidate > current,
            PivotKind::Low => candidate < current,
        }
    }
}

/// A located swing point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub price: f64,
    pub kind: PivotKind,
}

impl Pivot {
    /// Pivot of `kind` taken from `bars[index]`. Panics on out-of-range index.
    #[inline]
    pub fn at<T: OHLC>(bars: &[T], index: usize, kind: PivotKind) -> Self {
        Self {
            index,
            price: kind.price_of(&bars[index]),
            kind,
        }
    }
}

/// Check if `bars[index]` is a local high within `radius`
pub fn is_local_high<T: OHLC>(bars: &[T], index: usize, radius: usize) -> bool {
    if index < radius || index + radius >= bars.len() {
        return false;
    }

    let high = bars[index].high();

    (1..=radius).all(|k| bars[index - k].high() <= high && bars[index + k].high() <= high)
}

/// Check if `bars[index]` is a local low within `radius`
pub fn is_local_low<T: OHLC>(bars: &[T], index: usize, radius: usize) -> bool {
    if index < radius || index + radius >= bars.len() {
        return false;
    }

    let low = bars[index].low();

    (1..=radius).all(|k| bars[index - k].low() >= low && bars[index + k].low() >= low)
}

#[inline]
pub fn is_pivot<T: OHLC>(bars: &[T], index: usize, radius: usize, kind: PivotKind) -> bool {
    match kind {
        PivotKind::High => is_local_high(bars, index, radius),
        PivotKind::Low => is_local_low(bars, index, radius),
    }
}
