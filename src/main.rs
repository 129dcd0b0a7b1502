use clap::Parser;
use k0s_supervisor::cli::{CliArgs, CliHandler, CliResult};
use std::process;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let handler = CliHandler::new(args.config.clone()).with_verbose(args.verbose);

    let result = match handler.handle_command(args.command).await {
        Ok(result) => result,
        Err(e) => CliResult::Error(format!("Failed to execute command [{}]: {e}", e.error_code())),
    };

    match result {
        CliResult::Success(msg) => {
            println!("{msg}");
            process::exit(0);
        }
        CliResult::Error(msg) => {
            eprintln!("{msg}");
            process::exit(1);
        }
    }
}
