//! # boxretest - Box breakout + retest structure detector
//!
//! Scans a sequence of OHLC bars backward in time for the eight-step
//! "box breakout + retest" market-structure pattern and labels the bars
//! that form it.
//!
//! ## Quick Start
//!
//! ```rust
//! use boxretest::prelude::*;
//!
//! // Oldest bar first
//! let bars: Vec<Candle> = (0..60)
//!     .map(|i| {
//!         let mid = 100.0 + i as f64;
//!         Candle::new(i, mid, mid + 0.5, mid - 0.5, mid)
//!     })
//!     .collect();
//!
//! let detector = DetectorBuilder::new()
//!     .signal_lookback(30)
//!     .build()
//!     .unwrap();
//!
//! let detection = detector.detect(&bars, Scenario::Short).unwrap();
//! assert!(detection.matched.is_none());
//! assert_eq!(detection.bars.len(), bars.len());
//! ```

pub mod detectors;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Parameters
        params::{get_count, get_period, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Types
        AnnotatedBar,
        BoxRetestMatch,
        BoxZone,
        Candle,
        Detection,
        // Builder
        DetectorBuilder,
        DetectorConfig,
        Label,
        OHLCExt,
        // Errors
        PatternError,
        Period,
        Result,
        Scenario,
        ScanError,
        ScanResult,
        Structure,
        // Core traits
        OHLC,
    };
}

use detectors::{
    box_retest::validate_bars, BoxRetestDetector, Pivot, PivotKind, StructurePivots,
    DEFAULT_PIVOT_RADIUS, DEFAULT_PIVOT_WINDOW, SIGNAL_GAP,
};
use serde::{Deserialize, Serialize};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during detection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid bar data at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },
}

impl PatternError {
    /// Attach the offending bar index to an `InvalidBar` error
    pub fn at_index(self, index: usize) -> Self {
        match self {
            PatternError::InvalidBar { reason, .. } => PatternError::InvalidBar { index, reason },
            other => other,
        }
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core OHLC data trait
pub trait OHLC {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

impl<T: OHLC + ?Sized> OHLC for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }

    fn timestamp(&self) -> Option<i64> {
        (**self).timestamp()
    }
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCExt: OHLC {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Validate OHLC data consistency. The reported index is 0; callers
    /// scanning a series rewrite it with [`PatternError::at_index`].
    fn validate(&self) -> Result<()> {
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "NaN in OHLC",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "Infinite value in OHLC",
            });
        }
        if self.high() < self.low() {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "high < low",
            });
        }
        if prices.iter().any(|&p| p <= 0.0) {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "non-positive price",
            });
        }
        if self.open() > self.high() || self.open() < self.low() {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "open outside [low, high]",
            });
        }
        if self.close() > self.high() || self.close() < self.low() {
            return Err(PatternError::InvalidBar {
                index: 0,
                reason: "close outside [low, high]",
            });
        }
        Ok(())
    }
}

impl<T: OHLC + ?Sized> OHLCExt for T {}

// ============================================================
// CANDLE
// ============================================================

/// Plain OHLC bar keyed by a monotonically increasing id (index or
/// open timestamp in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub id: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(id: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            id,
            open,
            high,
            low,
            close,
        }
    }
}

impl OHLC for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.id)
    }
}

// ============================================================
// SCENARIO & LABELS
// ============================================================

/// Which mirrored rule set to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scenario {
    /// Rising structure, breakout above High2, box `[Low2, High1]`
    Long,
    /// Falling structure, breakout below Low2, box `[Low1, High2]`
    Short,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::Long, Scenario::Short];

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Scenario::Long => Scenario::Short,
            Scenario::Short => Scenario::Long,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Long => "LONG",
            Scenario::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bar label written by a successful detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "Low 1")]
    Low1,
    #[serde(rename = "High 1")]
    High1,
    #[serde(rename = "Low 2")]
    Low2,
    #[serde(rename = "High 2")]
    High2,
    #[serde(rename = "Low 3")]
    Low3,
    #[serde(rename = "High 3")]
    High3,
}

impl Label {
    /// Third-swing label for a pivot of `kind`
    #[inline]
    pub fn third(kind: PivotKind) -> Self {
        match kind {
            PivotKind::High => Label::High3,
            PivotKind::Low => Label::Low3,
        }
    }

    #[inline]
    pub fn kind(self) -> PivotKind {
        match self {
            Label::Low1 | Label::Low2 | Label::Low3 => PivotKind::Low,
            Label::High1 | Label::High2 | Label::High3 => PivotKind::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Low1 => "Low 1",
            Label::High1 => "High 1",
            Label::Low2 => "Low 2",
            Label::High2 => "High 2",
            Label::Low3 => "Low 3",
            Label::High3 => "High 3",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// DETECTION RESULT
// ============================================================

/// Retest price zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxZone {
    pub top: f64,
    pub bottom: f64,
}

impl BoxZone {
    #[inline]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// True if `[low, high]` overlaps `[bottom, top]`, edges included
    #[inline]
    pub fn overlaps(&self, low: f64, high: f64) -> bool {
        high >= self.bottom && low <= self.top
    }
}

/// Structure prices reported on a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub low1: f64,
    pub high1: f64,
    pub low2: f64,
    pub high2: f64,
    pub low3: f64,
    pub high3: f64,
}

impl Structure {
    /// Combine the four structure pivots with the third swing. The extreme
    /// fills its own kind; `signal_price` (the signal bar's opposite
    /// extreme) fills the other.
    pub fn from_parts(pivots: &StructurePivots, extreme: &Pivot, signal_price: f64) -> Self {
        let (low3, high3) = match extreme.kind {
            PivotKind::Low => (extreme.price, signal_price),
            PivotKind::High => (signal_price, extreme.price),
        };
        Self {
            low1: pivots.low1.price,
            high1: pivots.high1.price,
            low2: pivots.low2.price,
            high2: pivots.high2.price,
            low3,
            high3,
        }
    }
}

/// A located box breakout + retest pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxRetestMatch {
    pub scenario: Scenario,
    pub zone: BoxZone,
    pub structure: Structure,
    pub pivots: StructurePivots,
    /// Third-swing extreme between Low2 and the signal bar
    pub extreme: Pivot,
    /// First bar closing beyond the breakout level
    pub breakout_index: usize,
    pub signal_index: usize,
    /// `signal_index + 1`, unless the signal bar is the last bar
    pub entry_index: Option<usize>,
}

impl BoxRetestMatch {
    /// `(index, label)` pairs in application order. The signal label comes
    /// last and wins if the extreme falls on the signal bar.
    pub fn labels(&self) -> [(usize, Label); 6] {
        let [a, b, c, d] = self.pivots.labelled();
        let rules = detectors::ScenarioRules::for_scenario(self.scenario);
        [
            (a.0.index, a.1),
            (b.0.index, b.1),
            (c.0.index, c.1),
            (d.0.index, d.1),
            (self.extreme.index, rules.extreme_label()),
            (self.signal_index, rules.signal_label()),
        ]
    }

    /// Bars between the signal bar and the end of a series of `len` bars
    #[inline]
    pub fn bars_ago(&self, len: usize) -> usize {
        len.saturating_sub(1).saturating_sub(self.signal_index)
    }
}

/// One bar of the detection output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedBar<T> {
    #[serde(flatten)]
    pub bar: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(default)]
    pub is_signal: bool,
    #[serde(default)]
    pub is_entry: bool,
}

impl<T> AnnotatedBar<T> {
    pub fn new(bar: T) -> Self {
        Self {
            bar,
            label: None,
            is_signal: false,
            is_entry: false,
        }
    }

    pub fn with_label(mut self, label: Option<Label>) -> Self {
        self.label = label;
        self
    }

    pub fn signal(mut self, is_signal: bool) -> Self {
        self.is_signal = is_signal;
        self
    }

    pub fn entry(mut self, is_entry: bool) -> Self {
        self.is_entry = is_entry;
        self
    }
}

impl<T: OHLC> OHLC for AnnotatedBar<T> {
    fn open(&self) -> f64 {
        self.bar.open()
    }

    fn high(&self) -> f64 {
        self.bar.high()
    }

    fn low(&self) -> f64 {
        self.bar.low()
    }

    fn close(&self) -> f64 {
        self.bar.close()
    }

    fn timestamp(&self) -> Option<i64> {
        self.bar.timestamp()
    }
}

/// Output of a detection run: a fresh copy of every input bar plus the
/// match, if any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection<T> {
    pub bars: Vec<AnnotatedBar<T>>,
    pub matched: Option<BoxRetestMatch>,
}

impl<T: Clone> Detection<T> {
    /// Unlabelled copy of `bars`
    pub fn unmatched(bars: &[T]) -> Self {
        Self {
            bars: bars.iter().cloned().map(AnnotatedBar::new).collect(),
            matched: None,
        }
    }

    /// Copy of `bars` carrying the labels and flags of `m`. Indices past
    /// the end of `bars` are ignored.
    pub fn annotated(bars: &[T], m: BoxRetestMatch) -> Self {
        let mut labels: Vec<Option<Label>> = vec![None; bars.len()];
        for (index, label) in m.labels() {
            if let Some(slot) = labels.get_mut(index) {
                *slot = Some(label);
            }
        }

        let bars = bars
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (bar, label))| {
                AnnotatedBar::new(bar.clone())
                    .with_label(label)
                    .signal(i == m.signal_index)
                    .entry(Some(i) == m.entry_index)
            })
            .collect();

        Self {
            bars,
            matched: Some(m),
        }
    }
}

impl<T> Detection<T> {
    #[inline]
    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }

    #[inline]
    pub fn scenario(&self) -> Option<Scenario> {
        self.matched.as_ref().map(|m| m.scenario)
    }

    #[inline]
    pub fn zone(&self) -> Option<BoxZone> {
        self.matched.as_ref().map(|m| m.zone)
    }

    #[inline]
    pub fn structure(&self) -> Option<Structure> {
        self.matched.as_ref().map(|m| m.structure)
    }

    #[inline]
    pub fn signal_index(&self) -> Option<usize> {
        self.matched.as_ref().map(|m| m.signal_index)
    }

    #[inline]
    pub fn entry_index(&self) -> Option<usize> {
        self.matched.as_ref().and_then(|m| m.entry_index)
    }

    /// Bars between the signal bar and the last bar
    #[inline]
    pub fn bars_ago(&self) -> Option<usize> {
        self.matched.as_ref().map(|m| m.bars_ago(self.bars.len()))
    }

    /// Unwrap the annotated bars back into the original bar type
    pub fn into_bars(self) -> Vec<T> {
        self.bars.into_iter().map(|b| b.bar).collect()
    }
}

// ============================================================
// CONFIG & BUILDER
// ============================================================

/// Detector configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Bars on each side a pivot must dominate
    pub pivot_radius: Period,
    /// Bars each pivot search may look back from its anchor
    pub pivot_window: Period,
    /// Shorter series return no match without scanning
    pub min_bars: usize,
    /// Most recent bars eligible as the signal bar
    pub signal_lookback: usize,
    pub validate_data: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pivot_radius: Period::new_const(DEFAULT_PIVOT_RADIUS),
            pivot_window: Period::new_const(DEFAULT_PIVOT_WINDOW),
            min_bars: 50,
            signal_lookback: 30,
            validate_data: true,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pivot_window.get() <= SIGNAL_GAP {
            return Err(PatternError::InvalidConfig(format!(
                "pivot_window = {} leaves no room after the {}-bar signal gap",
                self.pivot_window.get(),
                SIGNAL_GAP
            )));
        }
        Ok(())
    }
}

/// Builder for [`BoxRetestDetector`]
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    pivot_radius: usize,
    pivot_window: usize,
    min_bars: usize,
    signal_lookback: usize,
    validate_data: bool,
}

impl Default for DetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBuilder {
    pub fn new() -> Self {
        let defaults = DetectorConfig::default();
        Self {
            pivot_radius: defaults.pivot_radius.get(),
            pivot_window: defaults.pivot_window.get(),
            min_bars: defaults.min_bars,
            signal_lookback: defaults.signal_lookback,
            validate_data: defaults.validate_data,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: DetectorConfig) -> Self {
        Self {
            pivot_radius: config.pivot_radius.get(),
            pivot_window: config.pivot_window.get(),
            min_bars: config.min_bars,
            signal_lookback: config.signal_lookback,
            validate_data: config.validate_data,
        }
    }

    pub fn pivot_radius(mut self, radius: usize) -> Self {
        self.pivot_radius = radius;
        self
    }

    pub fn pivot_window(mut self, window: usize) -> Self {
        self.pivot_window = window;
        self
    }

    pub fn min_bars(mut self, min_bars: usize) -> Self {
        self.min_bars = min_bars;
        self
    }

    pub fn signal_lookback(mut self, lookback: usize) -> Self {
        self.signal_lookback = lookback;
        self
    }

    /// Enable/disable bar validation
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.validate_data = enable;
        self
    }

    /// Build the detector
    pub fn build(self) -> Result<BoxRetestDetector> {
        BoxRetestDetector::new(DetectorConfig {
            pivot_radius: Period::new(self.pivot_radius)?,
            pivot_window: Period::new(self.pivot_window)?,
            min_bars: self.min_bars,
            signal_lookback: self.signal_lookback,
            validate_data: self.validate_data,
        })
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;
use tracing::debug;

/// Match found on a single instrument
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub symbol: String,
    pub scenario: Scenario,
    pub signal_index: usize,
    pub bars_ago: usize,
    /// Timestamp of the signal bar, when the bar type carries one
    pub signal_timestamp: Option<i64>,
    pub last_close: f64,
    pub zone: BoxZone,
    pub structure: Structure,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel detection over multiple instruments.
///
/// Returns the instruments that matched `scenario` (in input order) and the
/// instruments whose data failed validation.
pub fn scan_parallel<'a, T, I>(
    detector: &BoxRetestDetector,
    instruments: I,
    scenario: Scenario,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            detector
                .find_match(bars, scenario)
                .map(|matched| {
                    matched.map(|m| ScanResult {
                        symbol: symbol.to_string(),
                        scenario: m.scenario,
                        signal_index: m.signal_index,
                        bars_ago: m.bars_ago(bars.len()),
                        signal_timestamp: bars[m.signal_index].timestamp(),
                        last_close: bars.last().map_or(f64::NAN, |b| b.close()),
                        zone: m.zone,
                        structure: m.structure,
                    })
                })
                .map_err(|error| {
                    debug!(symbol, %error, "instrument skipped");
                    ScanError {
                        symbol: symbol.to_string(),
                        error,
                    }
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(Some(r)) => successes.push(r),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

/// Validate every bar of a series, reporting the first bad index
pub fn validate_series<T: OHLC>(bars: &[T]) -> Result<()> {
    validate_bars(bars)
}

// ============================================================
// TESTS
// ============================================================
