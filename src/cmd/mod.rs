//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], or [`health`].
//! Each handler lives in its own submodule.

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::TetherError;

pub async fn dispatch(cli: Cli) -> Result<(), TetherError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  tether v{version}: request-scoped database handles and access logging\n\n  \
         No command provided. To get started:\n\n    \
         tether init                  Generate a starter config\n    \
         tether run                   Start the server (auto-detects ./tether.yaml)\n    \
         tether run -c app.yaml       Start with a specific config file\n    \
         tether --help                See all commands and options\n"
    );
}
