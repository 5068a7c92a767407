//! Property-based tests for box retest detection
//!
//! Series are random walks on a quarter-point grid so that reflecting
//! prices around 500 is exact in floating point.
//!
//! Properties:
//! 1. Output preserves length and bar values
//! 2. A match satisfies its own structural constraints
//! 3. No later candidate would also have matched
//! 4. Reflected series match the opposite scenario at the same bar

use boxretest::prelude::*;
use proptest::prelude::*;

const TICK: f64 = 0.25;
const AXIS: f64 = 1000.0;

fn walk(steps: &[(i32, i32, i32)]) -> Vec<Candle> {
    let mut close = 2000i32;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(delta, up, down))| {
            let open = close;
            close = open + delta;
            let high = open.max(close) + up;
            let low = open.min(close) - down;
            Candle::new(
                i as i64,
                open as f64 * TICK,
                high as f64 * TICK,
                low as f64 * TICK,
                close as f64 * TICK,
            )
        })
        .collect()
}

fn reflect(bars: &[Candle]) -> Vec<Candle> {
    bars.iter()
        .map(|b| Candle::new(b.id, AXIS - b.open, AXIS - b.low, AXIS - b.high, AXIS - b.close))
        .collect()
}

fn steps() -> impl Strategy<Value = Vec<(i32, i32, i32)>> {
    prop::collection::vec((-6i32..=6, 0i32..4, 0i32..4), 50..160)
}

fn scenario() -> impl Strategy<Value = Scenario> {
    prop_oneof![Just(Scenario::Long), Just(Scenario::Short)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn output_preserves_bars(steps in steps(), scenario in scenario(), lookback in 0usize..=100) {
        let bars = walk(&steps);
        let detection = BoxRetestDetector::with_defaults()
            .detect_with_lookback(&bars, lookback, scenario)
            .unwrap();

        prop_assert_eq!(detection.bars.len(), bars.len());
        for (out, bar) in detection.bars.iter().zip(&bars) {
            prop_assert_eq!(&out.bar, bar);
        }

        if detection.matched.is_none() {
            prop_assert!(detection.bars.iter().all(|b| b.label.is_none() && !b.is_signal && !b.is_entry));
        }

        // Each label appears at most once
        let mut labels: Vec<Label> = detection.bars.iter().filter_map(|b| b.label).collect();
        let total = labels.len();
        labels.sort_by_key(|l| l.as_str());
        labels.dedup();
        prop_assert_eq!(labels.len(), total);

        let again = BoxRetestDetector::with_defaults()
            .detect_with_lookback(&bars, lookback, scenario)
            .unwrap();
        prop_assert_eq!(again, detection);
    }

    #[test]
    fn match_satisfies_structure(steps in steps(), scenario in scenario(), lookback in 0usize..=100) {
        let bars = walk(&steps);
        let len = bars.len();
        let detection = BoxRetestDetector::with_defaults()
            .detect_with_lookback(&bars, lookback, scenario)
            .unwrap();

        if let Some(m) = detection.matched {
            let p = m.pivots;
            let signal = m.signal_index;

            prop_assert!(signal <= len - 2);
            prop_assert!(signal >= 50usize.max((len - 1).saturating_sub(lookback)));
            prop_assert_eq!(m.entry_index, Some(signal + 1));

            // Pivot order, geometry and breakout
            match scenario {
                Scenario::Short => {
                    prop_assert!(p.low1.index < p.high1.index);
                    prop_assert!(p.high1.index < p.low2.index);
                    prop_assert!(p.low2.index < p.high2.index);
                    prop_assert!(p.high2.index + 2 <= signal);
                    prop_assert!(p.low2.price < p.low1.price);
                    prop_assert!(p.high2.price < p.high1.price);
                    prop_assert!(bars[m.breakout_index].close < p.low2.price);
                    prop_assert!(m.breakout_index > p.high2.index);
                }
                Scenario::Long => {
                    prop_assert!(p.high1.index < p.low1.index);
                    prop_assert!(p.low1.index < p.high2.index);
                    prop_assert!(p.high2.index < p.low2.index);
                    prop_assert!(p.low2.index + 2 <= signal);
                    prop_assert!(p.high2.price > p.high1.price);
                    prop_assert!(p.low2.price > p.low1.price);
                    prop_assert!(bars[m.breakout_index].close > p.high2.price);
                    prop_assert!(m.breakout_index > p.low2.index);
                }
            }
            prop_assert!(m.breakout_index < signal);

            // Retest
            prop_assert!(m.zone.top > m.zone.bottom);
            prop_assert!(bars[signal].high >= m.zone.bottom && bars[signal].low <= m.zone.top);

            // Labels and flags
            let rules = ScenarioRules::for_scenario(scenario);
            prop_assert_eq!(detection.bars[signal].label, Some(rules.signal_label()));
            prop_assert_eq!(detection.bars.iter().filter(|b| b.is_signal).count(), 1);
            prop_assert_eq!(detection.bars.iter().filter(|b| b.is_entry).count(), 1);
            prop_assert!(detection.bars[signal + 1].is_entry);
        }
    }

    #[test]
    fn match_is_most_recent(steps in steps(), scenario in scenario()) {
        let bars = walk(&steps);
        let detector = BoxRetestDetector::with_defaults();

        let found = detector.find_match(&bars, scenario).unwrap();
        let cutoff = found.map_or(0, |m| m.signal_index + 1);

        for candidate in detector.candidates(bars.len(), detector.config().signal_lookback) {
            if candidate >= cutoff {
                prop_assert!(detector.evaluate(&bars, candidate, scenario).is_err());
            }
        }
    }

    #[test]
    fn reflection_swaps_scenarios(steps in steps(), scenario in scenario()) {
        let bars = walk(&steps);
        let detector = BoxRetestDetector::with_defaults();

        let direct = detector.find_match(&bars, scenario).unwrap();
        let reflected = detector.find_match(&reflect(&bars), scenario.opposite()).unwrap();

        prop_assert_eq!(direct.is_some(), reflected.is_some());
        if let (Some(a), Some(b)) = (direct, reflected) {
            prop_assert_eq!(a.signal_index, b.signal_index);
            prop_assert_eq!(a.breakout_index, b.breakout_index);
            prop_assert_eq!(b.zone.top, AXIS - a.zone.bottom);
            prop_assert_eq!(b.zone.bottom, AXIS - a.zone.top);

            prop_assert_eq!(a.pivots.low1.index, b.pivots.high1.index);
            prop_assert_eq!(a.pivots.high1.index, b.pivots.low1.index);
            prop_assert_eq!(a.pivots.low2.index, b.pivots.high2.index);
            prop_assert_eq!(a.pivots.high2.index, b.pivots.low2.index);
            prop_assert_eq!(a.pivots.low1.price, AXIS - b.pivots.high1.price);
        }
    }
}
