//! # QCAL CLI
//!
//! Gantree: L6_Cli → Main
//!
//! ```text
//! qcal drag      [node flags] [--operation x180] [--max-number-pulses-per-sweep N]
//! qcal t2-echo   [node flags] [--use-state-discrimination true|false]
//! qcal iq-blobs  [node flags] [--num-runs N]
//! qcal init-state [--state PATH] [--force]
//! ```
//!
//! Nodes run against the synthetic runtime with the demo response model.

use clap::{Parser, Subcommand};
use env_logger::Env;

mod commands;

use commands::{InitArgs, NodeArgs};

/// QCAL - calibration nodes for superconducting qubits
#[derive(Parser, Debug)]
#[command(name = "qcal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// DRAG coefficient calibration from x180·y90 and y180·x90 pulse trains
    Drag {
        #[command(flatten)]
        node: NodeArgs,

        /// Operation whose DRAG coefficient is calibrated
        #[arg(long)]
        operation: Option<String>,

        /// Repetitions of each pulse pair per sweep point
        #[arg(long)]
        max_number_pulses_per_sweep: Option<i64>,
    },

    /// Hahn-echo coherence time
    T2Echo {
        #[command(flatten)]
        node: NodeArgs,

        /// Measure discriminated state instead of raw I/Q
        #[arg(long)]
        use_state_discrimination: Option<bool>,
    },

    /// Single-shot readout discrimination
    IqBlobs {
        #[command(flatten)]
        node: NodeArgs,

        /// Shots per prepared state
        #[arg(long)]
        num_runs: Option<i64>,
    },

    /// Write the two-qubit demo device state
    InitState(InitArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter))
        .format_target(false)
        .init();

    match cli.command {
        Commands::Drag {
            node,
            operation,
            max_number_pulses_per_sweep,
        } => {
            let mut extra = serde_json::Map::new();
            commands::set_opt(&mut extra, "operation", operation);
            commands::set_opt(
                &mut extra,
                "max_number_pulses_per_sweep",
                max_number_pulses_per_sweep,
            );
            commands::run_drag(&node, extra)
        }
        Commands::T2Echo {
            node,
            use_state_discrimination,
        } => {
            let mut extra = serde_json::Map::new();
            commands::set_opt(&mut extra, "use_state_discrimination", use_state_discrimination);
            commands::run_t2_echo(&node, extra)
        }
        Commands::IqBlobs { node, num_runs } => {
            let mut extra = serde_json::Map::new();
            commands::set_opt(&mut extra, "num_runs", num_runs);
            commands::run_iq_blobs(&node, extra)
        }
        Commands::InitState(args) => commands::init_state(&args),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_node_flags() {
        let cli = Cli::try_parse_from([
            "qcal",
            "-vv",
            "t2-echo",
            "--qubits",
            "q1,q2",
            "--simulate",
            "--flux-point",
            "arbitrary",
            "--use-state-discrimination",
            "false",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::T2Echo {
                node,
                use_state_discrimination,
            } => {
                assert_eq!(node.qubits.as_deref(), Some("q1,q2"));
                assert!(node.simulate);
                assert_eq!(use_state_discrimination, Some(false));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["qcal", "rabi"]).is_err());
    }
}
