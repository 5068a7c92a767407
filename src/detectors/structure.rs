//! Four-pivot structure scanning and breakout validation
//!
//! Starting from a candidate signal bar, the scanner walks backward through
//! four bounded windows, taking the nearest pivot of the expected kind in
//! each one. The resulting skeleton is then checked for monotonic geometry
//! and for a close beyond the breakout level before the signal bar.

use serde::{Deserialize, Serialize};

use super::{
    pivot::{is_pivot, Pivot, PivotKind, DEFAULT_PIVOT_RADIUS},
    scenario::ScenarioRules,
};
use crate::{Label, OHLC};

/// Bars skipped between the signal candidate and the first pivot search
pub const SIGNAL_GAP: usize = 2;

/// Default number of bars each pivot search may look back from its anchor
pub const DEFAULT_PIVOT_WINDOW: usize = 30;

/// One of the four structure pivots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructurePoint {
    Low1,
    High1,
    Low2,
    High2,
}

impl StructurePoint {
    #[inline]
    pub fn kind(self) -> PivotKind {
        match self {
            StructurePoint::Low1 | StructurePoint::Low2 => PivotKind::Low,
            StructurePoint::High1 | StructurePoint::High2 => PivotKind::High,
        }
    }

    #[inline]
    pub fn label(self) -> Label {
        match self {
            StructurePoint::Low1 => Label::Low1,
            StructurePoint::High1 => Label::High1,
            StructurePoint::Low2 => Label::Low2,
            StructurePoint::High2 => Label::High2,
        }
    }
}

/// The located pre-breakout skeleton
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructurePivots {
    pub low1: Pivot,
    pub high1: Pivot,
    pub low2: Pivot,
    pub high2: Pivot,
}

impl StructurePivots {
    #[inline]
    pub fn get(&self, point: StructurePoint) -> Pivot {
        match point {
            StructurePoint::Low1 => self.low1,
            StructurePoint::High1 => self.high1,
            StructurePoint::Low2 => self.low2,
            StructurePoint::High2 => self.high2,
        }
    }

    /// Pivots paired with their labels, oldest bar first
    pub fn labelled(&self) -> [(Pivot, Label); 4] {
        let mut out = [
            (self.low1, Label::Low1),
            (self.high1, Label::High1),
            (self.low2, Label::Low2),
            (self.high2, Label::High2),
        ];
        out.sort_by_key(|(p, _)| p.index);
        out
    }
}

/// Bounded backward pivot search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PivotSearch {
    pub radius: usize,
    pub window: usize,
}

impl Default for PivotSearch {
    fn default() -> Self {
        Self {
            radius: DEFAULT_PIVOT_RADIUS,
            window: DEFAULT_PIVOT_WINDOW,
        }
    }
}

impl PivotSearch {
    /// Nearest pivot of `kind` at or before `anchor - gap`, never reaching
    /// `anchor - window` or earlier.
    pub fn nearest_before<T: OHLC>(
        &self,
        bars: &[T],
        kind: PivotKind,
        anchor: usize,
        gap: usize,
    ) -> Option<Pivot> {
        let start = anchor.checked_sub(gap)?;
        let floor = (anchor + 1).saturating_sub(self.window);
        if start < floor {
            return None;
        }

        (floor..=start)
            .rev()
            .find(|&j| is_pivot(bars, j, self.radius, kind))
            .map(|j| Pivot::at(bars, j, kind))
    }
}

/// Walk backward from `signal` collecting the four pivots in the
/// scenario's discovery order. Each search is anchored on the previous hit.
pub fn scan_structure<T: OHLC>(
    bars: &[T],
    signal: usize,
    rules: &ScenarioRules,
    search: &PivotSearch,
) -> Option<StructurePivots> {
    let mut slots: [Option<Pivot>; 4] = [None; 4];
    let mut anchor = signal;
    let mut gap = SIGNAL_GAP;

    for point in rules.pivot_order {
        let pivot = search.nearest_before(bars, point.kind(), anchor, gap)?;
        slots[slot_of(point)] = Some(pivot);
        anchor = pivot.index;
        gap = 1;
    }

    Some(StructurePivots {
        low1: slots[slot_of(StructurePoint::Low1)]?,
        high1: slots[slot_of(StructurePoint::High1)]?,
        low2: slots[slot_of(StructurePoint::Low2)]?,
        high2: slots[slot_of(StructurePoint::High2)]?,
    })
}

#[inline]
fn slot_of(point: StructurePoint) -> usize {
    match point {
        StructurePoint::Low1 => 0,
        StructurePoint::High1 => 1,
        StructurePoint::Low2 => 2,
        StructurePoint::High2 => 3,
    }
}

/// Second swing must progress past the first on both highs and lows, and
/// the box must have positive height.
pub fn validate_geometry(pivots: &StructurePivots, rules: &ScenarioRules) -> bool {
    let lows_progress = rules.direction.beyond(pivots.low2.price, pivots.low1.price);
    let highs_progress = rules.direction.beyond(pivots.high2.price, pivots.high1.price);
    let box_open = pivots.get(rules.box_top).price > pivots.get(rules.box_bottom).price;

    lows_progress && highs_progress && box_open
}

/// Index of the first close beyond the breakout level, scanning forward
/// from just after the nearest structure pivot up to (excluding) `signal`.
pub fn find_breakout<T: OHLC>(
    bars: &[T],
    pivots: &StructurePivots,
    rules: &ScenarioRules,
    signal: usize,
) -> Option<usize> {
    let level = pivots.get(rules.breakout_level).price;
    let from = pivots.get(rules.pivot_order[0]).index + 1;

    (from..signal.min(bars.len())).find(|&k| rules.direction.beyond(bars[k].close(), level))
}
