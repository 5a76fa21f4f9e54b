//! Subcommand implementations
//!
//! Gantree: L6_Cli → Commands

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use qcal_core::defaults;
use qcal_node::{
    demo_state, load_spec, CalibrationNode, DemoResponse, DragCalibration, DragParametersSpec,
    Experiment, IqBlobs, IqBlobsParametersSpec, NodeReport, RunStorage, T2Echo,
    T2EchoParametersSpec,
};
use qcal_results::{Progress, ProgressObserver};
use qcal_runtime::{Session, SyntheticRuntime};
use qcal_state::DeviceState;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Flags shared by every node
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Device-state file
    #[arg(long, env = defaults::STATE_PATH_ENV)]
    pub state: Option<PathBuf>,

    /// JSON parameter file
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Target qubits, comma separated (default: active qubits)
    #[arg(long)]
    pub qubits: Option<String>,

    /// Number of averages
    #[arg(long)]
    pub num_averages: Option<i64>,

    /// Produce simulated waveforms instead of measuring
    #[arg(long)]
    pub simulate: bool,

    /// Simulation duration in clock cycles
    #[arg(long)]
    pub simulation_duration: Option<i64>,

    /// Session establishment timeout in seconds
    #[arg(long)]
    pub timeout: Option<i64>,

    /// Flux bias mode
    #[arg(long, value_parser = ["independent", "joint", "arbitrary"])]
    pub flux_point: Option<String>,

    /// Reset strategy
    #[arg(long, value_parser = ["thermal", "active"])]
    pub reset_type: Option<String>,

    /// Artifact root folder
    #[arg(long, env = defaults::DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Seed of the synthetic runtime
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Per-shot noise of the synthetic runtime
    #[arg(long, default_value = "0.0")]
    pub noise: f64,

    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

/// Flags of `init-state`
#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Device-state file to write
    #[arg(long, env = defaults::STATE_PATH_ENV)]
    pub state: Option<PathBuf>,

    /// Replace an existing file
    #[arg(long)]
    pub force: bool,
}

/// Insert `value` under `key` when present
pub fn set_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

fn state_path(explicit: &Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None => DeviceState::default_path().with_context(|| {
            format!("no home directory; pass --state or set {}", defaults::STATE_PATH_ENV)
        }),
    }
}

impl NodeArgs {
    /// Command-line parameter layer; only flags that were given
    pub fn overrides(&self, extra: Map<String, Value>) -> Value {
        let mut map = Map::new();
        set_opt(&mut map, "qubits", self.qubits.clone());
        set_opt(&mut map, "num_averages", self.num_averages);
        if self.simulate {
            map.insert("simulate".to_string(), Value::Bool(true));
        }
        set_opt(&mut map, "simulation_duration", self.simulation_duration);
        set_opt(&mut map, "timeout", self.timeout);
        set_opt(&mut map, "flux_point", self.flux_point.clone());
        set_opt(&mut map, "reset_type", self.reset_type.clone());
        map.extend(extra);
        Value::Object(map)
    }

    fn storage(&self) -> Result<RunStorage> {
        match &self.data_dir {
            Some(dir) => Ok(RunStorage::new(dir)),
            None => Ok(RunStorage::from_env()?),
        }
    }
}

// ============================================================================
// Progress Bar
// ============================================================================

/// Terminal bar fed by the live poller
struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {percent:>3}% {pos}/{len} averages [{elapsed_precise}, eta {eta}]")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }

    fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl ProgressObserver for ProgressDisplay {
    fn on_update(&self, progress: &Progress) {
        self.bar.set_length(progress.total);
        self.bar.set_position(progress.iteration.min(progress.total));
    }
}

// ============================================================================
// Node Commands
// ============================================================================

fn run_node(args: &NodeArgs, experiment: &dyn Experiment) -> Result<()> {
    let path = state_path(&args.state)?;
    let mut session =
        Session::open(&path).with_context(|| format!("loading device state {}", path.display()))?;
    let runtime = SyntheticRuntime::new()
        .with_seed(args.seed)
        .with_noise(args.noise)
        .with_model(DemoResponse::default());

    let display = if args.quiet {
        ProgressDisplay::hidden()
    } else {
        ProgressDisplay::new()?
    };
    let node = CalibrationNode::new(&runtime, args.storage()?).with_progress(&display);
    let outcome = node.run(experiment, &mut session);
    display.bar.finish_and_clear();

    let report = outcome.with_context(|| format!("{} failed", experiment.name()))?;
    print_summary(&report);
    Ok(())
}

/// `qcal drag`
pub fn run_drag(args: &NodeArgs, extra: Map<String, Value>) -> Result<()> {
    let spec: DragParametersSpec = load_spec(args.params.as_deref(), &args.overrides(extra))?;
    run_node(args, &DragCalibration::new(spec)?)
}

/// `qcal t2-echo`
pub fn run_t2_echo(args: &NodeArgs, extra: Map<String, Value>) -> Result<()> {
    let spec: T2EchoParametersSpec = load_spec(args.params.as_deref(), &args.overrides(extra))?;
    run_node(args, &T2Echo::new(spec)?)
}

/// `qcal iq-blobs`
pub fn run_iq_blobs(args: &NodeArgs, extra: Map<String, Value>) -> Result<()> {
    let spec: IqBlobsParametersSpec = load_spec(args.params.as_deref(), &args.overrides(extra))?;
    run_node(args, &IqBlobs::new(spec)?)
}

/// `qcal init-state`
pub fn init_state(args: &InitArgs) -> Result<()> {
    let path = state_path(&args.state)?;
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    DeviceState::from_value(demo_state())?.save(&path)?;
    info!("Wrote demo device state to {}", path.display());
    println!("{}", path.display());
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_summary(report: &NodeReport) {
    let record = &report.record;
    println!("{} #{} ({:?})", record.name, record.run_index, record.status);
    println!("  artifacts: {}", report.folder.path().display());

    if let Some(fits) = &report.fits {
        for fit in fits.iter() {
            match fit.failure() {
                Some(reason) => println!("  {}: fit failed ({})", fit.device, reason),
                None => {
                    let params: Vec<String> = fit
                        .parameters
                        .iter()
                        .map(|(name, value)| format!("{}={:.6e}", name, value))
                        .collect();
                    println!("  {}: {}", fit.device, params.join(" "));
                }
            }
        }
    }
    if let Some(samples) = &report.samples {
        println!("  {}", samples);
    }
    for entry in record.updates.applied() {
        println!("  updated {} = {}", entry.target, entry.value);
    }
    for entry in record.updates.withheld() {
        if let qcal_node::UpdateDecision::Withhold { reason } = &entry.decision {
            println!("  withheld {}: {}", entry.target, reason);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args() -> NodeArgs {
        NodeArgs {
            state: None,
            params: None,
            qubits: Some("q2".into()),
            num_averages: Some(10),
            simulate: false,
            simulation_duration: None,
            timeout: None,
            flux_point: Some("joint".into()),
            reset_type: None,
            data_dir: None,
            seed: 0,
            noise: 0.0,
            quiet: true,
        }
    }

    #[test]
    fn test_overrides_only_given_flags() {
        let mut extra = Map::new();
        set_opt(&mut extra, "num_runs", Some(200i64));
        set_opt::<i64>(&mut extra, "unused", None);
        assert_eq!(
            args().overrides(extra),
            json!({"qubits": "q2", "num_averages": 10, "flux_point": "joint", "num_runs": 200})
        );
    }

    #[test]
    fn test_bar_follows_progress() {
        let display = ProgressDisplay::hidden();
        let update = |iteration| Progress {
            iteration,
            total: 30,
            elapsed: std::time::Duration::from_secs(1),
            record: Default::default(),
        };
        display.on_update(&update(10));
        assert_eq!(display.bar.position(), 10);
        display.on_update(&update(45));
        assert_eq!(display.bar.position(), 30);
        assert!(ProgressDisplay::new().is_ok());
    }

    #[test]
    fn test_init_then_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nested").join("state.json");
        let init = InitArgs {
            state: Some(state.clone()),
            force: false,
        };
        init_state(&init).unwrap();
        assert!(init_state(&init).is_err());

        let node = NodeArgs {
            state: Some(state),
            data_dir: Some(dir.path().join("data")),
            ..args()
        };
        run_t2_echo(&node, Map::new()).unwrap();
        assert!(dir.path().join("data").is_dir());
    }
}
