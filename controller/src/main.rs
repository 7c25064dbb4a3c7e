use clap::{Parser, Subcommand};

use common::telemetry::init_telemetry;

use controller::command::run::{RunArgs, run};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug, Clone)]
enum Cmd {
    /// Run the reconciliation workers and the event endpoint
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry("controller");

    let args = Args::parse();

    match args.cmd {
        Cmd::Run(run_args) => {
            run(run_args).await?;
        }
    }

    Ok(())
}
