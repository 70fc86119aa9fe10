//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod auth;
pub mod say;

use std::error::Error;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::auth::{run_auth, run_deauth};
use crate::cli::say::{run_say, SayOptions};
use crate::core::config::{Config, ConfigKey};
use crate::utils::url::validate_base_url;

/// Environment variable holding the `tracing` filter directive.
pub const LOG_FILTER_ENV: &str = "PONDER_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(name = "ponder", version)]
#[command(about = "Stream answers and reasoning traces from the OpenAI Responses API")]
#[command(
    long_about = "Ponder sends a prompt to the OpenAI Responses API and streams the answer \
to stdout. For reasoning-capable models it also tracks the model's reasoning summary and \
reasoning text, which can be shown on stderr with --show-reasoning.\n\n\
Authentication:\n\
  Use 'ponder auth' to store an API key in your system keyring.\n\n\
Environment Variables:\n\
  OPENAI_API_KEY    API key (takes precedence over the keyring)\n\
  PONDER_CONFIG     Path to the configuration file\n\
  PONDER_LOG        Diagnostic log filter, e.g. 'debug' or 'ponder=trace'"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use; falls back to the configured default-model
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append a transcript to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a prompt and stream the answer
    Say {
        /// Prompt text (joined with spaces)
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
        /// JSON file with prior messages ([{"role": ..., "content": ...}])
        #[arg(long, value_name = "FILE")]
        messages: Option<String>,
        /// Print reasoning traces to stderr as they stream
        #[arg(short = 'r', long)]
        show_reasoning: bool,
    },
    /// Store an API key in the system keyring (read from stdin)
    Auth,
    /// Remove the stored API key
    Deauth,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command {
        Some(Commands::Say {
            prompt,
            messages,
            show_reasoning,
        }) => {
            run_say(SayOptions {
                prompt,
                messages_file: messages,
                model: args.model,
                log_file: args.log,
                show_reasoning,
            })
            .await
        }
        Some(Commands::Auth) => run_auth(),
        Some(Commands::Deauth) => run_deauth(),
        Some(Commands::Set { key, value }) => {
            let Some(key) = key else {
                Config::load()?.print_all();
                return Ok(());
            };
            let key: ConfigKey = key.parse()?;
            let value = value.join(" ");
            if value.trim().is_empty() {
                Config::load()?.print_all();
                return Ok(());
            }
            let value = normalize_value(key, &value)?;
            Config::mutate(|config| {
                config.set(key, Some(value.clone()));
                Ok(())
            })?;
            println!("✅ Set {} to: {value}", key.as_str());
            Ok(())
        }
        Some(Commands::Unset { key }) => {
            let key: ConfigKey = key.parse()?;
            Config::mutate(|config| {
                config.set(key, None);
                Ok(())
            })?;
            println!("✅ Unset {}", key.as_str());
            Ok(())
        }
        None => {
            Args::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn normalize_value(key: ConfigKey, value: &str) -> Result<String, Box<dyn Error>> {
    match key {
        ConfigKey::BaseUrl => Ok(validate_base_url(value)?),
        _ => Ok(value.trim().to_string()),
    }
}
