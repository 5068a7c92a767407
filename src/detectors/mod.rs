//! Box breakout + retest detection
//!
//! The detector is split into the stages it runs for each candidate signal
//! bar:
//!
//! - **pivot**: swing high/low predicates over a symmetric radius
//! - **structure**: backward four-pivot scan, geometry check, breakout search
//! - **retest**: box construction, touch test, third-swing extreme
//! - **scenario**: the mirrored LONG/SHORT rule records
//! - **box_retest**: candidate iteration and the public detector

pub mod box_retest;
pub mod pivot;
pub mod retest;
pub mod scenario;
pub mod structure;

// Re-export all detectors for convenience
pub use box_retest::*;
pub use pivot::*;
pub use retest::*;
pub use scenario::*;
pub use structure::*;
