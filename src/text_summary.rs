//! Text summary builder for CLI output.
//!
//! Formats the registry and validation reports as human-readable lines.

use crate::model::PvPlant;
use crate::registry::PlantRegistry;
use crate::validate::ValidationReport;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of every plant and its arrays, in registry order.
pub(crate) fn build_text_summary(registry: &PlantRegistry) -> TextSummary {
    let mut lines = Vec::new();
    lines.push(format!("Number of configured PV plants: {}", registry.len()));

    if registry.is_empty() {
        lines.push("No PV plants configured yet. Add one with `plant add <NAME>`.".into());
        return TextSummary { lines };
    }

    for plant in registry.iter() {
        lines.push(String::new());
        lines.extend(build_plant_summary(plant).lines);
    }

    TextSummary { lines }
}

/// Lines describing one plant and its arrays.
pub(crate) fn build_plant_summary(plant: &PvPlant) -> TextSummary {
    let mut lines = vec![format!("PV plant: {}", plant.name)];
    let inverter = if plant.inverter.is_empty() {
        "-"
    } else {
        plant.inverter.as_str()
    };
    let kind = if plant.microinverter {
        "microinverter"
    } else {
        "string inverter"
    };
    lines.push(format!("  Inverter: {inverter} ({kind})"));
    lines.push(format!(
        "  Arrays: {}, modules: {}",
        plant.arrays.len(),
        plant.module_count()
    ));
    for array in &plant.arrays {
        let module = if array.module.is_empty() {
            "-"
        } else {
            array.module.as_str()
        };
        lines.push(format!(
            "    {}: tilt {:.1} az {:.1}, {} x {} modules, {}",
            array.name,
            array.tilt,
            array.azimuth,
            array.modules_per_string,
            array.strings,
            module
        ));
    }
    TextSummary { lines }
}

pub(crate) fn build_validation_summary(report: &ValidationReport, strict: bool) -> TextSummary {
    let mut lines: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
    let errors = report.errors().count();
    let warnings = report.warnings().count();
    let ok = if strict {
        report.is_valid_strict()
    } else {
        report.is_valid()
    };
    let verdict = if ok { "valid" } else { "invalid" };
    lines.push(format!(
        "Configuration is {verdict} ({errors} errors, {warnings} warnings)"
    ));
    TextSummary { lines }
}
