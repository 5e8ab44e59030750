//! Reading and range shapes handed to the threshold evaluator.

use chrono::{DateTime, Utc};

use crate::error::{MonitorError, Result};
use crate::taxonomy::{AlarmCode, BatteryType, Severity};

/// One sensor sample for one equipment unit. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub unit_id: i64,
    pub voltage: f64,
    pub current: f64,
    /// Zero for DC-only readings; module readings with a zero frequency are
    /// evaluated against the unit's DC ranges.
    pub frequency: f64,
    pub timestamp: DateTime<Utc>,
    pub alarm_code: AlarmCode,
}

impl Reading {
    pub fn new(
        unit_id: i64,
        voltage: f64,
        current: f64,
        frequency: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            unit_id,
            voltage,
            current,
            frequency,
            timestamp,
            alarm_code: AlarmCode::NoAlarm,
        }
    }

    pub fn with_alarm_code(mut self, code: AlarmCode) -> Self {
        self.alarm_code = code;
        self
    }

    /// Rejects non-finite samples before they reach evaluation or storage.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("voltage", self.voltage),
            ("current", self.current),
            ("frequency", self.frequency),
        ] {
            if !value.is_finite() {
                return Err(MonitorError::validation(format!(
                    "reading {name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A (lower, upper) bound for one metric. `lower < upper` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRange {
    lower: f64,
    upper: f64,
}

impl MetricRange {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(MonitorError::validation(format!(
                "range bounds must be finite, got ({lower}, {upper})"
            )));
        }
        if lower >= upper {
            return Err(MonitorError::validation(format!(
                "range lower bound {lower} must be strictly below upper bound {upper}"
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }
}

/// Range configuration of one equipment unit.
///
/// Module systems carry an AC side and a DC side; which one applies is
/// decided per reading (zero frequency means the sample came from the DC
/// side, where frequency is never checked). Batteries carry the ranges of
/// their specification and have no frequency at all.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitProfile {
    Module {
        ac_voltage: MetricRange,
        ac_current: MetricRange,
        ac_frequency: MetricRange,
        dc_voltage: MetricRange,
        dc_current: MetricRange,
    },
    Battery {
        battery_type: BatteryType,
        voltage: MetricRange,
        current: MetricRange,
    },
}

impl UnitProfile {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Module { .. } => "module",
            Self::Battery { .. } => "battery",
        }
    }

    pub(crate) fn ranges_for(&self, reading: &Reading, plant_id: i64) -> UnitRanges {
        match self {
            Self::Module {
                ac_voltage,
                ac_current,
                ac_frequency,
                dc_voltage,
                dc_current,
            } => {
                if reading.frequency == 0.0 {
                    UnitRanges {
                        plant_id,
                        voltage: *dc_voltage,
                        current: *dc_current,
                        frequency: None,
                    }
                } else {
                    UnitRanges {
                        plant_id,
                        voltage: *ac_voltage,
                        current: *ac_current,
                        frequency: Some(*ac_frequency),
                    }
                }
            }
            Self::Battery {
                voltage, current, ..
            } => UnitRanges {
                plant_id,
                voltage: *voltage,
                current: *current,
                frequency: None,
            },
        }
    }
}

/// The one shape the evaluator sees, whatever the unit kind.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRanges {
    pub plant_id: i64,
    pub voltage: MetricRange,
    pub current: MetricRange,
    /// `None` when frequency is not checked (battery, or DC-side module
    /// reading).
    pub frequency: Option<MetricRange>,
}

/// A detected condition prior to persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmCandidate {
    pub code: AlarmCode,
    pub description: &'static str,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub plant_id: i64,
}
