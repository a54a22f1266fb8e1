use std::io;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::generate;
use tracing::error;

use rsocistrap::cli::{self, Cli, Commands};
use rsocistrap::executor::RealCommandExecutor;

fn main() -> Result<()> {
    let args = cli::parse_args()?;

    let log_level = match &args.command {
        Commands::Build(opts) => opts.common.log_level,
        Commands::Validate(opts) => opts.common.log_level,
        Commands::Completions(opts) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(opts.shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
    };
    rsocistrap::init_logging(log_level)?;

    match &args.command {
        Commands::Build(opts) => {
            match rsocistrap::run_build(opts, Arc::new(RealCommandExecutor)) {
                Ok(id) => println!("{}", id),
                Err(e) => {
                    error!("{:#}", e);
                    process::exit(1);
                }
            }
        }
        Commands::Validate(opts) => {
            if let Err(e) = rsocistrap::run_validate(opts) {
                error!("{:#}", e);
                process::exit(1);
            }
        }
        Commands::Completions(_) => {}
    }

    Ok(())
}
