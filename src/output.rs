use std::io::{self, BufRead, Write};

use colored::Colorize;

use deepclean::cleaner::{CleaningSummary, LogLevel, Reporter, TOTAL_STEPS};
use deepclean::config::Locations;
use deepclean::fs_ops;
use deepclean::tasks::TaskSpec;
use deepclean::utils;

/// How the terminal answers the confirmation gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAnswer {
    Ask,
    Yes,
    No,
}

/// Prints progress and log lines to stdout and prompts on stdin.
pub struct TerminalReporter {
    answer: GateAnswer,
}

impl TerminalReporter {
    pub fn new(answer: GateAnswer) -> Self {
        Self { answer }
    }

    fn prompt(title: &str, message: &str) -> bool {
        println!();
        println!("{} {}", "\u{26A0}".yellow().bold(), title.yellow().bold());
        for line in message.lines().filter(|l| !l.trim().is_empty() && *l != "Continue?") {
            println!("  {line}");
        }
        print!("{} ", "Continue? [y/N]".bold());
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut reply = String::new();
        match io::stdin().lock().read_line(&mut reply) {
            Ok(0) | Err(_) => false,
            Ok(_) => matches!(reply.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        }
    }
}

impl Reporter for TerminalReporter {
    fn report_progress(&self, step: usize, status: &str) {
        println!(
            "{} {}",
            format!("[{step:>2}/{TOTAL_STEPS}]").cyan().bold(),
            status.bold()
        );
    }

    fn log_message(&self, message: &str, level: LogLevel) {
        let glyph = level.glyph();
        let line = match level {
            LogLevel::Info => format!("  {glyph} {message}").normal(),
            LogLevel::Success => format!("  {glyph} {message}").green(),
            LogLevel::Warning => format!("  {glyph} {message}").yellow(),
            LogLevel::Error => format!("  {glyph} {message}").red().bold(),
        };
        println!("{line}");
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        match self.answer {
            GateAnswer::Yes => {
                println!("  {} {}", "auto-confirmed:".dimmed(), title.dimmed());
                true
            }
            GateAnswer::No => false,
            GateAnswer::Ask => Self::prompt(title, message),
        }
    }
}

pub fn print_banner() {
    println!("{}", "deepclean - Windows Deep Cleanup".bold().cyan());
    println!();
}

pub fn print_summary(summary: &CleaningSummary) {
    println!();
    println!("{}", "=== Summary ===".bold().white());
    println!("  {:<20} {}", "Files deleted:", summary.total_files_deleted.to_string().green());
    println!("  {:<20} {}", "Space freed:", summary.space_freed().green().bold());
    println!("  {:<20} {}", "Time taken:", summary.time_taken_formatted().green());
    println!();
}

pub fn print_catalog(tasks: &[TaskSpec], locations: &Locations) {
    for task in tasks {
        let gate = if task.requires_confirmation() {
            format!(" {}", "[asks first]".red())
        } else {
            String::new()
        };
        println!(
            "{} {}{}",
            format!("{:>2}.", task.step).cyan().bold(),
            task.name.bold(),
            gate
        );
        println!("    {}", task.description.dimmed());

        for target in (task.targets)(locations) {
            let state = if !fs_ops::directory_exists(&target) {
                "missing".dimmed()
            } else if fs_ops::has_write_access(&target) {
                "writable".green()
            } else {
                "read-only".yellow()
            };
            println!("    {}  {}", utils::display_path(&target), state);
        }
    }
    println!();
}
