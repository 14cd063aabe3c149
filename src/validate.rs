//! Schema validation for plant documents.
//!
//! Validation never stops at the first problem: every issue is collected with
//! a path into the document so the user can fix them in one pass.

use crate::model::{ArrayConfig, PvPlant};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

pub const TILT_RANGE: std::ops::RangeInclusive<f64> = 0.0..=90.0;
pub const AZIMUTH_RANGE: std::ops::RangeInclusive<f64> = 0.0..=360.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn error(&mut self, path: String, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path,
            severity: Severity::Error,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: String, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path,
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Valid with no warnings either.
    pub fn is_valid_strict(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors: Vec<String> = self.errors().map(ToString::to_string).collect();
        if errors.is_empty() {
            return write!(f, "no errors");
        }
        write!(f, "{}", errors.join("; "))
    }
}

/// Validate an ordered list of plants.
pub fn validate_plants(plants: &[PvPlant]) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    for (i, plant) in plants.iter().enumerate() {
        let path = format!("plant[{i}]");
        if !plant.name.trim().is_empty() && !seen.insert(plant.name.as_str()) {
            report.error(
                format!("{path}.name"),
                format!("duplicate plant name '{}'", plant.name),
            );
        }
        check_plant(&mut report, &path, plant);
    }
    report
}

/// Validate a single plant record in isolation.
pub fn validate_plant(plant: &PvPlant) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_plant(&mut report, "plant", plant);
    report
}

/// Validate a single array record in isolation.
pub fn validate_array(array: &ArrayConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_array(&mut report, "array", array);
    report
}

fn check_plant(report: &mut ValidationReport, path: &str, plant: &PvPlant) {
    if plant.name.trim().is_empty() {
        report.error(format!("{path}.name"), "plant name must not be empty");
    }
    if plant.inverter.trim().is_empty() {
        report.warning(format!("{path}.inverter"), "no inverter configured");
    }
    if plant.arrays.is_empty() {
        report.warning(format!("{path}.arrays"), "plant has no arrays");
    }

    let mut seen = HashSet::new();
    for (j, array) in plant.arrays.iter().enumerate() {
        let array_path = format!("{path}.arrays[{j}]");
        if !array.name.trim().is_empty() && !seen.insert(array.name.as_str()) {
            report.error(
                format!("{array_path}.name"),
                format!("duplicate array name '{}'", array.name),
            );
        }
        check_array(report, &array_path, array);
    }
}

fn check_array(report: &mut ValidationReport, path: &str, array: &ArrayConfig) {
    if array.name.trim().is_empty() {
        report.error(format!("{path}.name"), "array name must not be empty");
    }
    if !array.tilt.is_finite() || !TILT_RANGE.contains(&array.tilt) {
        report.error(
            format!("{path}.tilt"),
            format!("tilt {} is outside 0..=90 degrees", array.tilt),
        );
    }
    if !array.azimuth.is_finite() || !AZIMUTH_RANGE.contains(&array.azimuth) {
        report.error(
            format!("{path}.azimuth"),
            format!("azimuth {} is outside 0..=360 degrees", array.azimuth),
        );
    }
    if array.modules_per_string < 1 {
        report.error(
            format!("{path}.modules_per_string"),
            "modules_per_string must be at least 1",
        );
    }
    if array.strings < 1 {
        report.error(format!("{path}.strings"), "strings must be at least 1");
    }
    if array.module.trim().is_empty() {
        report.warning(format!("{path}.module"), "no module type configured");
    }
}
