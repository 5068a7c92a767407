//! Box construction and retest detection

use super::{
    pivot::{Pivot, PivotKind},
    scenario::ScenarioRules,
    structure::StructurePivots,
};
use crate::{BoxZone, OHLC};

/// Retest zone spanned by the scenario's box pivots
#[inline]
pub fn build_box(pivots: &StructurePivots, rules: &ScenarioRules) -> BoxZone {
    BoxZone {
        top: pivots.get(rules.box_top).price,
        bottom: pivots.get(rules.box_bottom).price,
    }
}

/// A bar touches the box when its `[low, high]` range overlaps it.
/// Partial overlap counts.
#[inline]
pub fn touches<T: OHLC>(bar: &T, zone: &BoxZone) -> bool {
    zone.overlaps(bar.low(), bar.high())
}

/// Most extreme bar of `kind` in `from..=through`. Only strict improvements
/// replace the current best, so ties keep the earliest bar.
pub fn find_extreme<T: OHLC>(
    bars: &[T],
    from: usize,
    through: usize,
    kind: PivotKind,
) -> Option<Pivot> {
    let through = through.min(bars.len().checked_sub(1)?);
    if from > through {
        return None;
    }

    let mut best = Pivot::at(bars, from, kind);
    for index in from + 1..=through {
        let price = kind.price_of(&bars[index]);
        if kind.improves(price, best.price) {
            best = Pivot { index, price, kind };
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::scenario::{LONG_RULES, SHORT_RULES};
    use crate::Candle;

    fn pivots() -> StructurePivots {
        StructurePivots {
            low1: Pivot { index: 10, price: 100.0, kind: PivotKind::Low },
            high1: Pivot { index: 16, price: 120.0, kind: PivotKind::High },
            low2: Pivot { index: 22, price: 95.0, kind: PivotKind::Low },
            high2: Pivot { index: 28, price: 110.0, kind: PivotKind::High },
        }
    }

    #[test]
    fn test_box_mapping() {
        let p = pivots();
        assert_eq!(build_box(&p, &SHORT_RULES), BoxZone { top: 110.0, bottom: 100.0 });
        assert_eq!(build_box(&p, &LONG_RULES), BoxZone { top: 120.0, bottom: 95.0 });
    }

    #[test]
    fn test_touch_is_interval_overlap() {
        let zone = BoxZone { top: 110.0, bottom: 100.0 };

        // Fully inside, straddling either edge, and engulfing
        assert!(touches(&Candle::new(0, 105.0, 106.0, 104.0, 105.0), &zone));
        assert!(touches(&Candle::new(0, 98.0, 101.0, 97.0, 99.0), &zone));
        assert!(touches(&Candle::new(0, 112.0, 115.0, 109.0, 111.0), &zone));
        assert!(touches(&Candle::new(0, 105.0, 120.0, 90.0, 105.0), &zone));
        // Edges count
        assert!(touches(&Candle::new(0, 99.0, 100.0, 98.0, 99.0), &zone));
        assert!(touches(&Candle::new(0, 111.0, 112.0, 110.0, 111.0), &zone));
        // Clear of the box
        assert!(!touches(&Candle::new(0, 99.0, 99.9, 98.0, 99.0), &zone));
        assert!(!touches(&Candle::new(0, 111.0, 112.0, 110.1, 111.0), &zone));
    }

    #[test]
    fn test_extreme_low_keeps_earliest_tie() {
        let bars = vec![
            Candle::new(0, 10.0, 11.0, 9.0, 10.0),
            Candle::new(1, 8.0, 9.0, 7.0, 8.0),
            Candle::new(2, 9.0, 10.0, 8.0, 9.0),
            Candle::new(3, 8.0, 9.0, 7.0, 8.0),
            Candle::new(4, 9.0, 10.0, 8.5, 9.0),
        ];
        let low = find_extreme(&bars, 0, 4, PivotKind::Low).unwrap();
        assert_eq!((low.index, low.price), (1, 7.0));

        let high = find_extreme(&bars, 1, 4, PivotKind::High).unwrap();
        assert_eq!((high.index, high.price), (2, 10.0));
    }

    #[test]
    fn test_extreme_range_is_inclusive() {
        let bars = vec![
            Candle::new(0, 10.0, 11.0, 9.0, 10.0),
            Candle::new(1, 10.0, 11.0, 9.0, 10.0),
            Candle::new(2, 10.0, 15.0, 9.0, 10.0),
        ];
        assert_eq!(find_extreme(&bars, 1, 2, PivotKind::High).unwrap().index, 2);
        assert_eq!(find_extreme(&bars, 2, 2, PivotKind::High).unwrap().index, 2);
        assert!(find_extreme(&bars, 3, 2, PivotKind::High).is_none());
        assert!(find_extreme::<Candle>(&[], 0, 0, PivotKind::Low).is_none());
    }
}
