use std::process::ExitCode;

use clap::Parser;

mod commands;
mod sink;

use commands::Commands;

#[derive(Parser)]
#[command(name = "mmarchive")]
#[command(version)]
#[command(about = "LOD archive and DEF sprite tools for Heroes / Might & Magic game data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<mmlod::Error>() {
                Some(mmlod::Error::Usage(_)) => ExitCode::from(2),
                Some(err) if err.is_corruption() => ExitCode::from(3),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
