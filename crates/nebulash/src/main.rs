//! Entry point that parses the CLI, initialises tracing, and dispatches to the
//! windowed backdrop, the headless still export, or `nebulash where`.

mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Export(args)) => run::export(args),
        Some(Command::Where) => run_where(),
        None => run::run(cli.run),
    }
}

fn run_where() -> Result<()> {
    let paths = AppPaths::discover()?;
    let config_file = paths.config_file();
    let status = if config_file.exists() {
        "present"
    } else {
        "missing; defaults in use"
    };
    println!("config dir:  {}", paths.config_dir().display());
    println!("config file: {} ({status})", config_file.display());
    Ok(())
}
