mod app;
mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use deepclean::config::{Config, Locations};
use deepclean::orchestrator::Orchestrator;
use deepclean::system::HostSystem;
use deepclean::tasks;

use cli::{Cli, Command};
use output::{GateAnswer, TerminalReporter};

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn run_gui(config: Config) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("DeepClean")
            .with_inner_size([760.0, 680.0])
            .with_min_inner_size([520.0, 460.0]),
        ..Default::default()
    };

    eframe::run_native(
        "DeepClean",
        options,
        Box::new(|cc| Ok(Box::new(app::DeepCleanApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("window failed: {e}"))
}

fn run_terminal(config: Config, answer: GateAnswer) -> Result<()> {
    output::print_banner();
    let locations = Locations::from_env(&config);
    let mut orchestrator = Orchestrator::new(config, locations, HostSystem);
    let reporter = TerminalReporter::new(answer);

    let summary = orchestrator.run(&reporter)?;
    output::print_summary(&summary);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Command::Gui) {
        Command::Gui => {
            init_tracing("deepclean=warn");
            run_gui(config)
        }
        Command::Run {
            assume_yes,
            skip_dangerous,
        } => {
            init_tracing("deepclean=info");
            let answer = if assume_yes {
                GateAnswer::Yes
            } else if skip_dangerous {
                GateAnswer::No
            } else {
                GateAnswer::Ask
            };
            run_terminal(config, answer)
        }
        Command::List => {
            init_tracing("deepclean=warn");
            output::print_banner();
            output::print_catalog(&tasks::catalog(), &Locations::from_env(&config));
            Ok(())
        }
    }
}
