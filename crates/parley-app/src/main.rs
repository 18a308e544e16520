//! Parley terminal client - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (stderr, so it does not interleave with the chat)
//! 3. Build the HTTP backend and the terminal presentation adapter
//! 4. Open the widget and feed stdin lines into it as user events

mod cli;
mod terminal;

use std::sync::Arc;

use clap::Parser;
use parley_chat::{ChatError, ChatWidget, HttpBackend};
use parley_core::ParleyConfig;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::CliArgs;
use crate::terminal::{parse_command, Command, TerminalPresentation};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        ParleyConfig::load(&config_file)?
    } else {
        ParleyConfig::default()
    };
    args.apply_overrides(&mut config);

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        path = %config_file.display(),
        base_url = %config.service.base_url,
        client_id = %config.service.client_id,
        "Configuration resolved"
    );

    let backend = Arc::new(HttpBackend::new(&config.service)?);
    let ui = Arc::new(TerminalPresentation::new());
    let widget = ChatWidget::with_backend(&config, backend, ui.clone());
    widget.open()?;

    println!("Type a message, /n to pick an option, /toggle, /history or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let result = match parse_command(&line) {
            Command::Quit => break,
            Command::Toggle => widget.toggle().map(|_| ()),
            Command::History => {
                for turn in widget.history()? {
                    println!("{:?}  {} -> {}", turn.path, turn.user_phrase, turn.bot_text);
                }
                Ok(())
            }
            Command::Select(n) => match ui.option_at(n) {
                Some(option) => widget.click_option(&option).await.map(|_| ()),
                None => {
                    println!("No option [{}] is on offer.", n);
                    Ok(())
                }
            },
            Command::Text(text) => widget.submit_text(text).await.map(|_| ()),
        };

        match result {
            Ok(()) | Err(ChatError::TurnInFlight) => {}
            Err(e) => {
                tracing::error!(error = %e, "Widget failure");
                return Err(e.into());
            }
        }
    }

    widget.close()?;
    Ok(())
}
