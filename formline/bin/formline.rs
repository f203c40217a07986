#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formline::{Formline, FormlineConfig, find_config_file};
use formline_workflow::provider::{self, Detection};

/// Per-form notification settings service
#[derive(Parser, Debug)]
#[command(name = "formline")]
#[command(about = "Serve and inspect Formline notification settings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the notification settings actions over HTTP
    Serve {
        /// Configuration file (RON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show which SMTP settings would be suggested for an e-mail address
    Detect {
        /// E-mail address to inspect
        email: String,
    },
}

fn print_detection(email: &str) {
    match provider::detect(email) {
        Detection::NoDomain => println!("{email}: no domain yet"),
        Detection::Unknown { domain } => {
            println!("{domain}: unknown provider, enter the SMTP host and port manually");
        }
        Detection::Matched { domain, profile } => {
            println!("{domain}: {}", profile.name);
            println!("  host: {}", profile.host);
            println!("  port: {}", profile.port);
            println!("  tls:  {}", if profile.secure { "yes" } else { "no" });
            if !profile.hint.is_empty() {
                println!("  note: {}", profile.hint);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config_path = find_config_file(config.as_deref())?;
            let config = FormlineConfig::load(&config_path)?;

            Formline::new(config).run().await
        }
        Commands::Detect { email } => {
            print_detection(&email);
            Ok(())
        }
    }
}
