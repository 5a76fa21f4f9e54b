//! Run reports
//!
//! Gantree: L5_Node → Reporter
//!
//! Human-readable `report.md` and the flat `fit_results.csv` table written
//! next to the JSON artifacts of every run.

use crate::runner::{NodeRecord, RunStatus};
use crate::update::UpdateDecision;
use qcal_fit::FitResult;
use qcal_runtime::SimulatedSamples;
use std::fmt::{self, Write};

/// Run reporter
/// Gantree: Reporter // 결과 리포팅
pub struct Reporter;

/// Quote a CSV field when it needs it
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl Reporter {
    // ========================================================================
    // Markdown
    // ========================================================================

    /// Markdown summary of a run
    pub fn to_markdown(
        record: &NodeRecord,
        fits: Option<&FitResult>,
        samples: Option<&SimulatedSamples>,
    ) -> String {
        let mut output = String::new();
        // Writing to a String cannot fail
        let _ = Self::write_markdown(&mut output, record, fits, samples);
        output
    }

    fn write_markdown(
        out: &mut String,
        record: &NodeRecord,
        fits: Option<&FitResult>,
        samples: Option<&SimulatedSamples>,
    ) -> fmt::Result {
        writeln!(out, "# {} (#{})\n", record.name, record.run_index)?;
        writeln!(out, "- **Status**: {:?}", record.status)?;
        writeln!(out, "- **Targets**: {}", record.targets.join(", "))?;
        writeln!(out, "- **Started**: {}", record.started.format("%Y-%m-%d %H:%M:%S"))?;
        let seconds = (record.finished - record.started).num_milliseconds() as f64 / 1000.0;
        writeln!(out, "- **Duration**: {:.2}s", seconds)?;
        writeln!(out, "- **State**: `{}`\n", record.state_path.display())?;

        if let Some(fits) = fits {
            writeln!(out, "## Fits\n")?;
            writeln!(out, "| Device | Status | Parameter | Value | Uncertainty |")?;
            writeln!(out, "|--------|--------|-----------|-------|-------------|")?;
            for fit in fits.iter() {
                match fit.failure() {
                    Some(reason) => writeln!(out, "| {} | failed: {} | - | - | - |", fit.device, reason)?,
                    None => {
                        for (name, value) in &fit.parameters {
                            let err = fit
                                .uncertainties
                                .get(name)
                                .map(|e| format!("{:.4e}", e))
                                .unwrap_or_else(|| "-".to_string());
                            writeln!(out, "| {} | ok | {} | {:.6e} | {} |", fit.device, name, value, err)?;
                        }
                    }
                }
            }
            writeln!(out)?;
        }

        if record.status == RunStatus::Completed {
            writeln!(out, "## State Updates\n")?;
            if record.updates.is_empty() {
                writeln!(out, "No state changes proposed.")?;
            }
            for entry in record.updates.entries() {
                match &entry.decision {
                    UpdateDecision::Apply => writeln!(out, "- `{}` = {}", entry.target, entry.value)?,
                    UpdateDecision::Withhold { reason } => writeln!(
                        out,
                        "- `{}` withheld ({}): {}",
                        entry.target,
                        entry.contributors.join(", "),
                        reason
                    )?,
                }
            }
            writeln!(out)?;
        }

        if let Some(samples) = samples {
            writeln!(out, "## Simulation\n")?;
            writeln!(out, "- **Duration**: {} cycles", samples.duration_cycles)?;
            writeln!(out, "- **Sample period**: {} ns", samples.sample_period_ns)?;
            writeln!(out, "- **Active elements**: {}", samples.active_elements().join(", "))?;
        }
        Ok(())
    }

    // ========================================================================
    // CSV
    // ========================================================================

    /// One row per device parameter; failed devices get a single row
    pub fn fits_to_csv(fits: &FitResult) -> String {
        let mut output = String::from("device,status,parameter,value,uncertainty,reason\n");
        for fit in fits.iter() {
            match fit.failure() {
                Some(reason) => {
                    output.push_str(&format!("{},failed,,,,{}\n", fit.device, csv_field(reason)));
                }
                None => {
                    for (name, value) in &fit.parameters {
                        let err = fit
                            .uncertainties
                            .get(name)
                            .map(|e| e.to_string())
                            .unwrap_or_default();
                        output.push_str(&format!("{},ok,{},{},{},\n", fit.device, name, value, err));
                    }
                }
            }
        }
        output
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::UpdatePlan;
    use chrono::Local;
    use qcal_fit::{DeviceFit, FitError};
    use std::path::PathBuf;

    fn fits() -> FitResult {
        FitResult::per_device(&["q1", "q2"], |d| match d {
            "q1" => Ok(DeviceFit::ok(d).with_estimate("T2e", 12.5, 0.4)),
            _ => Err(FitError::Degenerate("flat, signal".into())),
        })
    }

    fn record(status: RunStatus) -> NodeRecord {
        let now = Local::now();
        NodeRecord {
            name: "t2_echo".into(),
            run_index: 7,
            status,
            targets: vec!["q1".into(), "q2".into()],
            parameters: serde_json::json!({}),
            failed_devices: vec!["q2".into()],
            updates: UpdatePlan::default(),
            state_path: PathBuf::from("/tmp/state.json"),
            started: now,
            finished: now,
        }
    }

    #[test]
    fn test_csv_rows() {
        let csv = Reporter::fits_to_csv(&fits());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "q1,ok,T2e,12.5,0.4,");
        assert!(lines[2].starts_with("q2,failed,,,,\""));
    }

    #[test]
    fn test_markdown_sections() {
        let fits = fits();
        let md = Reporter::to_markdown(&record(RunStatus::Completed), Some(&fits), None);
        assert!(md.starts_with("# t2_echo (#7)"));
        assert!(md.contains("| q1 | ok | T2e |"));
        assert!(md.contains("| q2 | failed:"));
        assert!(md.contains("No state changes proposed."));
        assert!(!md.contains("## Simulation"));

        let md = Reporter::to_markdown(&record(RunStatus::Simulated), None, None);
        assert!(!md.contains("## Fits"));
        assert!(!md.contains("## State Updates"));
    }
}
