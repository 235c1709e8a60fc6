use clap::Parser;
use stratgate::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
