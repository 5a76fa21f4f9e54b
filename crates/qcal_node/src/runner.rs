//! Node run lifecycle
//!
//! Gantree: L5_Node → Runner
//!
//! ```text
//! resolve targets → prepare (overrides) → build program
//!   ├─ simulate: offline traces → revert → artifacts
//!   └─ execute: connect → run → poll → fetch → park flux + close
//!        → assemble → fit → proposals → revert → update plan → save → artifacts
//! ```
//!
//! Targets are resolved before any hardware contact. Temporary overrides are
//! reverted on every exit path before the state can be saved, and the machine
//! guard parks every flux line whether the run succeeds or not.

use crate::experiment::{Experiment, RunContext};
use crate::report::Reporter;
use crate::storage::{files, RunFolder, RunStorage};
use crate::update::UpdatePlan;
use chrono::{DateTime, Local};
use log::{debug, info};
use qcal_core::QcalResult;
use qcal_fit::FitResult;
use qcal_results::{assemble, poll_live, wait_observed, Dataset, ProgressObserver};
use qcal_runtime::{ControlRuntime, ResultHandles, SequenceProgram, Session, SimulatedSamples, SimulationConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Measured, fitted and updated
    Completed,
    /// Offline simulation only
    Simulated,
}

/// Contents of `node.json`
/// Gantree: NodeRecord // 실행 기록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node name
    pub name: String,
    /// Run index
    pub run_index: u64,
    /// Outcome
    pub status: RunStatus,
    /// Target devices in measurement order
    pub targets: Vec<String>,
    /// Parameters as given
    pub parameters: Value,
    /// Devices whose fit failed
    pub failed_devices: Vec<String>,
    /// Planned state changes
    pub updates: UpdatePlan,
    /// Device-state file
    pub state_path: PathBuf,
    /// Run start
    pub started: DateTime<Local>,
    /// Run end
    pub finished: DateTime<Local>,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct NodeReport {
    /// Record written to `node.json`
    pub record: NodeRecord,
    /// Assembled results (measured runs)
    pub dataset: Option<Dataset>,
    /// Fits (measured runs)
    pub fits: Option<FitResult>,
    /// Offline traces (simulated runs)
    pub samples: Option<SimulatedSamples>,
    /// Artifact folder
    pub folder: RunFolder,
}

/// Runs experiments against a control runtime
/// Gantree: CalibrationNode // 보정 노드 실행기
pub struct CalibrationNode<'r> {
    runtime: &'r dyn ControlRuntime,
    storage: RunStorage,
    progress: &'r dyn ProgressObserver,
}

/// Intermediate products of a measured run
struct Measured {
    dataset: Dataset,
    fits: FitResult,
    plan: UpdatePlan,
}

impl<'r> CalibrationNode<'r> {
    /// Runner over `runtime`, storing artifacts in `storage`
    pub fn new(runtime: &'r dyn ControlRuntime, storage: RunStorage) -> Self {
        Self {
            runtime,
            storage,
            progress: &(),
        }
    }

    /// Hand every live update of measured runs to `observer`
    pub fn with_progress(mut self, observer: &'r dyn ProgressObserver) -> Self {
        self.progress = observer;
        self
    }

    /// Artifact storage
    pub fn storage(&self) -> &RunStorage {
        &self.storage
    }

    /// Run one experiment on the session's device state
    /// Gantree: run(experiment,session) -> QcalResult<NodeReport> // 노드 실행
    pub fn run(&self, experiment: &dyn Experiment, session: &mut Session) -> QcalResult<NodeReport> {
        let params = experiment.common();
        let targets = session.resolve_targets(params)?;
        info!(
            "Running {} on {} ({} device(s){})",
            experiment.name(),
            targets.iter().map(|q| q.name()).collect::<Vec<_>>().join(", "),
            targets.len(),
            if params.simulate() { ", simulated" } else { "" }
        );

        let mut ctx = RunContext::new(session, targets);
        let outcome = self.run_in_context(experiment, &mut ctx);
        if outcome.is_err() {
            ctx.revert_overrides()?;
        }
        outcome
    }

    fn run_in_context(&self, experiment: &dyn Experiment, ctx: &mut RunContext<'_>) -> QcalResult<NodeReport> {
        experiment.prepare(ctx)?;
        let program = experiment.build_program(ctx)?;
        program.validate()?;
        debug!(
            "Program {}: {} point(s) per stream, streams {:?}",
            program.name,
            program.points_per_stream(),
            program.stream_names()
        );

        if experiment.common().simulate() {
            return self.simulate(experiment, ctx, &program);
        }

        let handles = self.execute(experiment, ctx, &program)?;
        let measured = self.analyze(experiment, ctx, &program, &handles)?;
        ctx.session().save()?;

        let record = self.record(experiment, ctx, RunStatus::Completed, &measured.fits, measured.plan);
        let folder = self.storage.create_run(experiment.name(), ctx.started())?;
        folder.write_json(files::DATASET, &measured.dataset)?;
        folder.write_json(files::FIT_RESULTS, &measured.fits)?;
        folder.write_text(files::FIT_RESULTS_CSV, &Reporter::fits_to_csv(&measured.fits))?;
        folder.write_json(files::STATE, ctx.state().document())?;
        let record = NodeRecord {
            run_index: folder.index(),
            ..record
        };
        folder.write_json(files::NODE, &record)?;
        folder.write_text(files::REPORT, &Reporter::to_markdown(&record, Some(&measured.fits), None))?;
        info!("{} finished: {}", experiment.name(), measured.fits);

        Ok(NodeReport {
            record,
            dataset: Some(measured.dataset),
            fits: Some(measured.fits),
            samples: None,
            folder,
        })
    }

    /// Offline simulation; the machine is never opened
    fn simulate(
        &self,
        experiment: &dyn Experiment,
        ctx: &mut RunContext<'_>,
        program: &SequenceProgram,
    ) -> QcalResult<NodeReport> {
        let config = ctx.session().hardware_config()?;
        let simulation = SimulationConfig {
            duration_cycles: experiment.common().simulation_duration(),
        };
        let samples = self.runtime.simulate(&config, program, simulation)?;
        ctx.revert_overrides()?;

        let record = self.record(
            experiment,
            ctx,
            RunStatus::Simulated,
            &FitResult::default(),
            UpdatePlan::default(),
        );
        let folder = self.storage.create_run(experiment.name(), ctx.started())?;
        folder.write_json(files::SIMULATED_SAMPLES, &samples)?;
        let record = NodeRecord {
            run_index: folder.index(),
            ..record
        };
        folder.write_json(files::NODE, &record)?;
        folder.write_text(files::REPORT, &Reporter::to_markdown(&record, None, Some(&samples)))?;
        info!("Simulation of {} written to {}", experiment.name(), folder.path().display());

        Ok(NodeReport {
            record,
            dataset: None,
            fits: None,
            samples: Some(samples),
            folder,
        })
    }

    /// Connect, run, poll and fetch; the guard parks flux lines on every path
    fn execute(
        &self,
        experiment: &dyn Experiment,
        ctx: &RunContext<'_>,
        program: &SequenceProgram,
    ) -> QcalResult<ResultHandles> {
        let mut guard = ctx
            .session()
            .connect(self.runtime, experiment.common().timeout())?;

        let handles = {
            let mut job = guard.execute(program)?;
            let fields = program.stream_names();
            let last = wait_observed(
                poll_live(job.as_mut(), &fields, u64::from(program.num_averages)),
                self.progress,
            )?;
            if let Some(progress) = last {
                debug!(
                    "Last update: {}/{} after {:.1}s",
                    progress.iteration,
                    progress.total,
                    progress.elapsed.as_secs_f64()
                );
            }
            job.result_handles()?
        };

        guard.close()?;
        Ok(handles)
    }

    /// Assemble, fit, revert overrides, then plan and apply updates
    fn analyze(
        &self,
        experiment: &dyn Experiment,
        ctx: &mut RunContext<'_>,
        program: &SequenceProgram,
        handles: &ResultHandles,
    ) -> QcalResult<Measured> {
        let devices = ctx.device_names();
        let dataset = assemble(
            handles,
            &devices,
            &experiment.result_axes(program),
            &program.quantities,
        )?;
        let fits = experiment.fit(ctx, &dataset)?;

        let view: &RunContext<'_> = ctx;
        let mut proposals = Vec::new();
        for qubit in view.targets() {
            if let Some(fit) = fits.get(qubit.name()) {
                proposals.extend(experiment.proposals(view, qubit, fit)?);
            }
        }

        ctx.revert_overrides()?;
        let plan = UpdatePlan::build(ctx.state(), &proposals)?;
        let written = plan.apply(ctx.session_mut().state_mut())?;
        info!("{}: {} attribute(s) updated", plan, written);

        Ok(Measured { dataset, fits, plan })
    }

    fn record(
        &self,
        experiment: &dyn Experiment,
        ctx: &RunContext<'_>,
        status: RunStatus,
        fits: &FitResult,
        updates: UpdatePlan,
    ) -> NodeRecord {
        NodeRecord {
            name: experiment.name().to_string(),
            run_index: 0,
            status,
            targets: ctx.device_names(),
            parameters: experiment.parameters_json(),
            failed_devices: fits.failed_devices().into_iter().map(str::to_string).collect(),
            updates,
            state_path: ctx.session().path().to_path_buf(),
            started: ctx.started(),
            finished: Local::now(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoResponse;
    use crate::drag::DragCalibration;
    use crate::params::DragParametersSpec;
    use crate::testing::demo_session_at;
    use qcal_core::{QcalError, QubitSelection};
    use qcal_runtime::SyntheticRuntime;

    #[test]
    fn test_unknown_device_never_connects() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = demo_session_at(&dir.path().join("state.json"));
        let runtime = SyntheticRuntime::new();
        let node = CalibrationNode::new(&runtime, RunStorage::new(dir.path().join("data")));

        let mut spec = DragParametersSpec::default();
        spec.common.qubits = Some(QubitSelection::Csv("q1,q7".into()));
        let drag = DragCalibration::new(spec).unwrap();

        let err = node.run(&drag, &mut session).unwrap_err();
        assert_eq!(err, QcalError::UnknownDevice("q7".into()));
        assert_eq!(runtime.log().opened, 0);
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn test_failed_run_reverts_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = demo_session_at(&dir.path().join("state.json"));
        let before = session.state().document().clone();
        let runtime = SyntheticRuntime::new().unavailable();
        let node = CalibrationNode::new(&runtime, RunStorage::new(dir.path().join("data")));
        let drag = DragCalibration::new(DragParametersSpec::default()).unwrap();

        assert!(matches!(
            node.run(&drag, &mut session),
            Err(QcalError::Connection { .. })
        ));
        assert_eq!(session.state().document(), &before);
        assert_eq!(session.state().outstanding_overrides(), 0);
    }

    #[derive(Default)]
    struct Updates(std::cell::Cell<usize>);

    impl ProgressObserver for Updates {
        fn on_update(&self, _progress: &qcal_results::Progress) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_progress_observed_only_when_measuring() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = demo_session_at(&dir.path().join("state.json"));
        let runtime = SyntheticRuntime::new().with_model(DemoResponse::default());
        let updates = Updates::default();
        let node = CalibrationNode::new(&runtime, RunStorage::new(dir.path().join("data")))
            .with_progress(&updates);

        let mut spec = DragParametersSpec::default();
        spec.common.simulate = true;
        node.run(&DragCalibration::new(spec).unwrap(), &mut session).unwrap();
        assert_eq!(updates.0.get(), 0);

        node.run(&DragCalibration::new(DragParametersSpec::default()).unwrap(), &mut session)
            .unwrap();
        assert!(updates.0.get() > 0);
    }

    #[test]
    fn test_records_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = demo_session_at(&dir.path().join("state.json"));
        let runtime = SyntheticRuntime::new().with_model(DemoResponse::default());
        let node = CalibrationNode::new(&runtime, RunStorage::new(dir.path().join("data")));
        let drag = DragCalibration::new(DragParametersSpec::default()).unwrap();

        let report = node.run(&drag, &mut session).unwrap();
        assert_eq!(report.record.status, RunStatus::Completed);
        assert_eq!(report.record.run_index, 1);
        assert_eq!(report.record.parameters["operation"], "x180");
        assert_eq!(report.record.targets, vec!["q1", "q2"]);
    }
}
