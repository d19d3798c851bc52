#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Runs the reduction benchmark suite and prints the report.

use std::io;
use std::process::ExitCode;
use std::thread;

use argh::FromArgs;
use par_reduce::{Experiment, Scale, SuiteConfig, run_suite};
use tracing_subscriber::EnvFilter;

/// Compare synchronization disciplines and scheduling policies for parallel reductions.
#[derive(FromArgs)]
struct Args {
    /// worker count to try every parallel strategy with; repeat for several (default: 1 2 4 8)
    #[argh(option, short = 'w')]
    workers: Vec<usize>,

    /// seed for all generated data
    #[argh(option, default = "42")]
    seed: u64,

    /// size of the data: smoke, standard or full
    #[argh(option, default = "Scale::Standard")]
    scale: Scale,

    /// only run experiments whose name contains this text
    #[argh(option)]
    filter: Option<String>,

    /// list the experiments and exit
    #[argh(switch)]
    list: bool,
}

const DEFAULT_WORKERS: [usize; 4] = [1, 2, 4, 8];

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Args = argh::from_env();

    if args.list {
        for experiment in Experiment::ALL {
            println!("{:<10} {}", experiment, experiment.description());
        }

        return ExitCode::SUCCESS;
    }

    match thread::available_parallelism() {
        Ok(count) => println!("Default number of threads: {count}"),
        Err(e) => println!("Default number of threads: unknown ({e})"),
    }

    let workers = if args.workers.is_empty() {
        DEFAULT_WORKERS.to_vec()
    } else {
        args.workers
    };

    let config = match SuiteConfig::new(&workers, args.seed, args.scale, args.filter) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Scale {:?}, seed {}, workers {:?}",
        config.scale(),
        config.seed(),
        config.workers()
    );
    println!();

    match run_suite(&config) {
        Ok(report) => {
            report.print_to_stdout();

            if report.all_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
