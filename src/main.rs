//! Provides the main entry point to the capmatch program.
use std::process::ExitCode;

/// The main entry point to the program
fn main() -> ExitCode {
    if let Err(err) = capmatch::cli::run_cli() {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
