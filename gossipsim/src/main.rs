//! gossipsim CLI
//!
//! Interactive driver for the overlay simulator. Commands come from stdin:
//!
//! ```text
//! add 10          # create 10 nodes
//! wait 1000000    # advance virtual time by 1s, printing status
//! del 3           # remove 3 random nodes
//! print           # dump the overlay as a DOT graph
//! exit
//! ```
//!
//! Runs are reproducible: the same seed and script produce the same output.

use std::io;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gossipsim::{repl, Simulator};

/// Gossip overlay simulator
///
/// Single-threaded and deterministic for a fixed seed.
#[derive(Parser, Debug)]
#[command(name = "gossipsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Random seed; runs with the same seed and input are byte-identical.
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> io::Result<()> {
    // Diagnostics go to stderr; stdout carries only the session transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    info!(seed = args.seed, "starting simulator");

    let mut sim = Simulator::new(args.seed);
    let stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    repl::run(&mut sim, stdin, &mut stdout)
}
