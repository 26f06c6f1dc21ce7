//! bess-dispatch entry point: CLI wiring and exit-code mapping.

use std::process;

use bess_dispatch::cli::{parse_args, print_usage};
use bess_dispatch::runner::run;
use bess_dispatch::telemetry::init_tracing;

fn main() {
    let opts = match parse_args() {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(msg) => {
            eprintln!("error: {msg}");
            print_usage();
            process::exit(1);
        }
    };

    init_tracing(opts.log_json);

    match run(&opts) {
        Ok(out) => {
            println!("{}", out.summary);
            println!();
            println!("Dataset: {}", out.dataset_path.display());
            println!("Summary: {}", out.summary_path.display());
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(e.exit_code());
        }
    }
}
