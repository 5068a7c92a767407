//! Mirrored rule sets for the two box-retest scenarios
//!
//! SHORT tracks a falling structure (Low1 -> High1 -> Low2 -> High2, breakout
//! below Low2), LONG the rising mirror (High1 -> Low1 -> High2 -> Low2,
//! breakout above High2). Both run through the same scanning routine; only
//! the [`ScenarioRules`] record differs.

use super::{pivot::PivotKind, structure::StructurePoint};
use crate::{Label, Scenario};

/// Direction in which successive swings progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swing {
    Rising,
    Falling,
}

impl Swing {
    /// True if `value` lies strictly past `reference` in this direction
    #[inline]
    pub fn beyond(self, value: f64, reference: f64) -> bool {
        match self {
            Swing::Rising => value > reference,
            Swing::Falling => value < reference,
        }
    }
}

/// Scenario configuration record consumed by the generic scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioRules {
    pub scenario: Scenario,
    /// Structure pivots in discovery order, nearest to the signal first
    pub pivot_order: [StructurePoint; 4],
    pub direction: Swing,
    pub box_top: StructurePoint,
    pub box_bottom: StructurePoint,
    /// Pivot whose price a close must pass for the breakout
    pub breakout_level: StructurePoint,
    /// Pivot after which the third-pivot extreme is searched
    pub extreme_anchor: StructurePoint,
    /// Kind of the third-pivot extreme (Low3 for SHORT, High3 for LONG)
    pub extreme: PivotKind,
}

pub const SHORT_RULES: ScenarioRules = ScenarioRules {
    scenario: Scenario::Short,
    pivot_order: [
        StructurePoint::High2,
        StructurePoint::Low2,
        StructurePoint::High1,
        StructurePoint::Low1,
    ],
    direction: Swing::Falling,
    box_top: StructurePoint::High2,
    box_bottom: StructurePoint::Low1,
    breakout_level: StructurePoint::Low2,
    extreme_anchor: StructurePoint::Low2,
    extreme: PivotKind::Low,
};

pub const LONG_RULES: ScenarioRules = ScenarioRules {
    scenario: Scenario::Long,
    pivot_order: [
        StructurePoint::Low2,
        StructurePoint::High2,
        StructurePoint::Low1,
        StructurePoint::High1,
    ],
    direction: Swing::Rising,
    box_top: StructurePoint::High1,
    box_bottom: StructurePoint::Low2,
    breakout_level: StructurePoint::High2,
    extreme_anchor: StructurePoint::Low2,
    extreme: PivotKind::High,
};

impl ScenarioRules {
    #[inline]
    pub fn for_scenario(scenario: Scenario) -> &'static ScenarioRules {
        match scenario {
            Scenario::Short => &SHORT_RULES,
            Scenario::Long => &LONG_RULES,
        }
    }

    /// Label written on the third-pivot extreme bar
    #[inline]
    pub fn extreme_label(&self) -> Label {
        Label::third(self.extreme)
    }

    /// Label written on the signal bar
    #[inline]
    pub fn signal_label(&self) -> Label {
        Label::third(self.extreme.opposite())
    }
}
