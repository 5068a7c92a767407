//! Box breakout + retest scenario orchestration
//!
//! Candidate signal bars are tried from the most recent backward. Each
//! candidate runs through structure scan, geometry check, breakout search,
//! box construction and retest; the first candidate that survives every
//! stage is reported, so the result is always the most recent qualifying
//! pattern.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::{
    pivot::DEFAULT_PIVOT_RADIUS,
    retest::{build_box, find_extreme, touches},
    scenario::ScenarioRules,
    structure::{
        find_breakout, scan_structure, validate_geometry, PivotSearch, DEFAULT_PIVOT_WINDOW,
    },
};
use crate::{
    params::{get_count, get_period, ParamMeta, ParameterizedDetector},
    BoxRetestMatch, Detection, DetectorBuilder, DetectorConfig, OHLCExt, Result, Scenario,
    Structure, OHLC,
};

/// Stage at which a candidate signal bar was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A pivot search exhausted its window
    NoStructure,
    /// Swings do not progress or the box has no height
    Geometry,
    /// No close beyond the breakout level before the candidate
    NoBreakout,
    /// Candidate range does not overlap the box
    NoRetest,
}

/// Detector for the eight-step box breakout + retest pattern
#[derive(Debug, Clone, Default)]
pub struct BoxRetestDetector {
    config: DetectorConfig,
}

impl BoxRetestDetector {
    /// Create a detector, validating the configuration
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    #[inline]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn search(&self) -> PivotSearch {
        PivotSearch {
            radius: self.config.pivot_radius.get(),
            window: self.config.pivot_window.get(),
        }
    }

    // ===========================================
    // HIGH-LEVEL: annotated detection
    // ===========================================

    /// Detect the most recent pattern using the configured signal lookback.
    pub fn detect<T: OHLC + Clone>(&self, bars: &[T], scenario: Scenario) -> Result<Detection<T>> {
        self.detect_with_lookback(bars, self.config.signal_lookback, scenario)
    }

    /// Detect the most recent pattern whose signal bar lies within
    /// `signal_lookback` bars of the end of the series.
    ///
    /// The returned bars are always a fresh copy; on a match they carry the
    /// pattern labels, the signal flag and the entry flag.
    pub fn detect_with_lookback<T: OHLC + Clone>(
        &self,
        bars: &[T],
        signal_lookback: usize,
        scenario: Scenario,
    ) -> Result<Detection<T>> {
        let matched = self.find_match_with_lookback(bars, signal_lookback, scenario)?;
        Ok(match matched {
            Some(m) => Detection::annotated(bars, m),
            None => Detection::unmatched(bars),
        })
    }

    // ===========================================
    // MID-LEVEL: match without annotation
    // ===========================================

    /// Like [`detect`](Self::detect) but returns only the match record.
    pub fn find_match<T: OHLC>(
        &self,
        bars: &[T],
        scenario: Scenario,
    ) -> Result<Option<BoxRetestMatch>> {
        self.find_match_with_lookback(bars, self.config.signal_lookback, scenario)
    }

    pub fn find_match_with_lookback<T: OHLC>(
        &self,
        bars: &[T],
        signal_lookback: usize,
        scenario: Scenario,
    ) -> Result<Option<BoxRetestMatch>> {
        if self.config.validate_data {
            validate_bars(bars)?;
        }
        Ok(self.scan(bars, signal_lookback, scenario))
    }

    // ===========================================
    // LOW-LEVEL: candidate evaluation
    // ===========================================

    /// Candidate signal indices, most recent first. Empty when the series
    /// is shorter than `min_bars`.
    pub fn candidates(&self, len: usize, signal_lookback: usize) -> impl Iterator<Item = usize> {
        let start = if len < self.config.min_bars {
            None
        } else {
            len.checked_sub(2)
        };
        let end = self
            .config
            .min_bars
            .max(len.saturating_sub(1).saturating_sub(signal_lookback));

        start.into_iter().flat_map(move |start| (end..=start).rev())
    }

    /// Run every stage for a single candidate signal bar.
    pub fn evaluate<T: OHLC>(
        &self,
        bars: &[T],
        signal: usize,
        scenario: Scenario,
    ) -> std::result::Result<BoxRetestMatch, Rejection> {
        let rules = ScenarioRules::for_scenario(scenario);
        let signal_bar = bars.get(signal).ok_or(Rejection::NoStructure)?;

        let pivots =
            scan_structure(bars, signal, rules, &self.search()).ok_or(Rejection::NoStructure)?;

        if !validate_geometry(&pivots, rules) {
            return Err(Rejection::Geometry);
        }

        let breakout_index =
            find_breakout(bars, &pivots, rules, signal).ok_or(Rejection::NoBreakout)?;

        let zone = build_box(&pivots, rules);
        if !touches(signal_bar, &zone) {
            return Err(Rejection::NoRetest);
        }

        let from = pivots.get(rules.extreme_anchor).index + 1;
        let extreme =
            find_extreme(bars, from, signal, rules.extreme).ok_or(Rejection::NoRetest)?;
        let signal_price = rules.extreme.opposite().price_of(signal_bar);

        Ok(BoxRetestMatch {
            scenario,
            zone,
            structure: Structure::from_parts(&pivots, &extreme, signal_price),
            pivots,
            extreme,
            breakout_index,
            signal_index: signal,
            entry_index: entry_index_for(signal, bars.len()),
        })
    }

    fn scan<T: OHLC>(
        &self,
        bars: &[T],
        signal_lookback: usize,
        scenario: Scenario,
    ) -> Option<BoxRetestMatch> {
        for signal in self.candidates(bars.len(), signal_lookback) {
            match self.evaluate(bars, signal, scenario) {
                Ok(m) => {
                    debug!(
                        %scenario,
                        signal = m.signal_index,
                        box_top = m.zone.top,
                        box_bottom = m.zone.bottom,
                        "box retest matched"
                    );
                    return Some(m);
                }
                Err(rejection) => trace!(signal, ?rejection, "candidate rejected"),
            }
        }
        None
    }
}

/// Bar following the signal, if the series has one
#[inline]
pub(crate) fn entry_index_for(signal: usize, len: usize) -> Option<usize> {
    (signal + 1 < len).then_some(signal + 1)
}

pub(crate) fn validate_bars<T: OHLC>(bars: &[T]) -> Result<()> {
    for (i, bar) in bars.iter().enumerate() {
        bar.validate().map_err(|e| e.at_index(i))?;
    }
    Ok(())
}

// ============================================================
// PARAMETERS
// ============================================================

const PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "pivot_radius",
        DEFAULT_PIVOT_RADIUS as f64,
        (1.0, 10.0, 1.0),
        "Bars on each side a swing pivot must dominate",
    ),
    ParamMeta::period(
        "pivot_window",
        DEFAULT_PIVOT_WINDOW as f64,
        (5.0, 60.0, 5.0),
        "Bars each pivot search may look back from its anchor",
    ),
    ParamMeta::count(
        "signal_lookback",
        30.0,
        (5.0, 100.0, 5.0),
        "Most recent bars eligible as the signal bar",
    ),
    ParamMeta::count(
        "min_bars",
        50.0,
        (10.0, 200.0, 10.0),
        "Minimum series length before scanning",
    ),
];

impl ParameterizedDetector for BoxRetestDetector {
    fn param_meta() -> &'static [ParamMeta] {
        PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let defaults = DetectorConfig::default();
        DetectorBuilder::new()
            .pivot_radius(get_period(params, "pivot_radius", defaults.pivot_radius.get())?.get())
            .pivot_window(get_period(params, "pivot_window", defaults.pivot_window.get())?.get())
            .signal_lookback(get_count(params, "signal_lookback", defaults.signal_lookback)?)
            .min_bars(get_count(params, "min_bars", defaults.min_bars)?)
            .build()
    }

    fn pattern_id_str() -> &'static str {
        "BOX_BREAKOUT_RETEST"
    }
}
