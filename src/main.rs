use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use deskflow::cli::args::{Cli, Commands};
use deskflow::cli::commands::{self, AppContext};
use deskflow::config::{ColorSetting, GeneralConfig};
use deskflow::error::DeskError;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(general: &GeneralConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {}
    }
}

fn run() -> Result<(), DeskError> {
    let cli = Cli::parse();
    let ctx = AppContext::open()?;
    init_logging(&ctx.config.general);
    let format = cli.output.unwrap_or(ctx.config.general.default_output);

    let output = match cli.command {
        Commands::Profile(args) => commands::profile(&ctx, args.command, format)?,
        Commands::Agent(args) => commands::agent(&ctx, args.command, format)?,
        Commands::Ticket(args) => commands::ticket(&ctx, args.command, format)?,
        Commands::Task(args) => commands::task(&ctx, args.command, format)?,
        Commands::Rule(args) => commands::rule(&ctx, args.command, format)?,
        Commands::Sweep => commands::sweep(&ctx, format)?,
        Commands::Watch { interval, count } => commands::watch(&ctx, interval, count, format)?,
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
