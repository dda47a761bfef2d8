use crate::demo::{run_demo, run_report, run_score, DemoArgs, ReportArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use risk_assessment::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Fine-Kinney Risk Assessment",
    about = "Run the occupational risk assessment service or work with assessments from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single probability/frequency/severity triple
    Score(ScoreArgs),
    /// Summarize a saved assessment snapshot and optionally export it as CSV
    Report(ReportArgs),
    /// Walk through catalog, suggestion and commit flows against an in-memory assessment
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Report(args) => run_report(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
