//! Startup helpers for the `storefront-chat` binary.
//!
//! Parses the command line, initialises tracing on stderr, builds the message
//! transport and drives an interactive chat session on stdin/stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use crate::messaging::core::config::{MessagingConfig, TransportMode};
use crate::messaging::core::models::Identity;
use crate::messaging::state::ConversationState;
use crate::messaging::transport::{MessageTransport, build_transport};
use crate::messaging::ui::terminal::{render_detail, render_entries, render_widget};
use crate::messaging::ui::{AdminBrowser, ChatWidget, ProductContext};

/// Command line of the `storefront-chat` binary.
#[derive(Debug, Parser)]
#[command(name = "storefront-chat", version)]
#[command(about = "Storefront support chat in the terminal")]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Base URL of the storefront API
    #[arg(long, env = "STOREFRONT_CHAT_API_URL", value_name = "URL")]
    api_url: Option<String>,

    /// Directory holding the local fallback store
    #[arg(long, env = "STOREFRONT_CHAT_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Transport mode: remote, local, fallback or probe
    #[arg(long, env = "STOREFRONT_CHAT_TRANSPORT", value_name = "MODE")]
    transport: Option<TransportMode>,

    /// Bearer token sent to the storefront API
    #[arg(long, env = "STOREFRONT_CHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat as a signed-in shopper
    User {
        /// Id of the authenticated user
        #[arg(long)]
        user_id: String,
        /// Email shown to support
        #[arg(long)]
        email: Option<String>,
        /// Display name shown to support
        #[arg(long)]
        name: Option<String>,
        /// Product the shopper is looking at
        #[arg(long)]
        product: Option<String>,
    },
    /// Browse and answer every conversation as support
    Admin,
}

/// Run the binary.
///
/// # Returns
/// `ExitCode::SUCCESS` when the session ends normally, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting storefront-chat v{}", env!("CARGO_PKG_VERSION"));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(session(cli)) {
        tracing::error!("Chat session failed: {e:#}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Merge the configuration file with command line and environment overrides.
///
/// # Errors
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<MessagingConfig> {
    let mut config = match &cli.config {
        Some(path) => MessagingConfig::read(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MessagingConfig::default(),
    };

    if let Some(url) = &cli.api_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir.clone());
    }
    if let Some(token) = &cli.token {
        config = config.with_bearer_token(token.clone());
    }
    match cli.transport {
        Some(mode) => config = config.with_transport(mode),
        None if config.remote.base_url.is_none() && cli.config.is_none() => {
            tracing::info!("No API URL configured, using the local store only");
            config = config.with_transport(TransportMode::Local);
        }
        None => {}
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn session(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let transport = build_transport(&config)
        .await
        .context("building message transport")?;
    let mut console = Console::new();

    match cli.command {
        Command::User {
            user_id,
            email,
            name,
            product,
        } => {
            let mut identity = Identity::new(user_id);
            if let Some(email) = email {
                identity = identity.with_email(email);
            }
            if let Some(name) = name {
                identity = identity.with_name(name);
            }
            user_session(&mut console, transport, identity, product).await
        }
        Command::Admin => admin_session(&mut console, transport).await,
    }
}

async fn user_session(
    console: &mut Console,
    transport: Arc<dyn MessageTransport>,
    identity: Identity,
    product: Option<String>,
) -> anyhow::Result<()> {
    let state = Arc::new(ConversationState::new(transport));
    state.set_identity(Some(identity)).await;

    let mut widget = ChatWidget::new(Arc::clone(&state));
    if let Some(product) = product {
        widget = widget.with_product(ProductContext::new(product));
    }
    widget.open().await;
    console.lines(&render_widget(&widget.view())).await?;
    console
        .lines(&["Type a message, /refresh or /quit.".to_string()])
        .await?;

    while let Some(line) = console.read_line().await? {
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/refresh" => {
                state.fetch_conversations().await;
                let current = state.snapshot().current_conversation.map(|c| c.id);
                if let Some(id) = current {
                    // Failure leaves the transcript as is and is logged.
                    let _ = state.open_conversation(id).await;
                }
            }
            _ => {
                widget.set_draft(line);
                widget.submit().await;
            }
        }
        console.lines(&render_widget(&widget.view())).await?;
        widget.dismiss_notification();
    }

    state.set_identity(None).await;
    Ok(())
}

async fn admin_session(
    console: &mut Console,
    transport: Arc<dyn MessageTransport>,
) -> anyhow::Result<()> {
    let mut browser = AdminBrowser::new(transport);
    browser.refresh().await.context("loading conversations")?;
    console.lines(&render_entries(&browser.entries(&Utc::now()))).await?;
    console
        .lines(&["Commands: /list, /open N, /refresh, /quit. Other text replies.".to_string()])
        .await?;

    while let Some(line) = console.read_line().await? {
        let line = line.trim();
        let outcome = match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/list" | "/refresh" => browser.refresh().await,
            _ => match line.strip_prefix("/open") {
                Some(arg) => match arg.trim().parse::<usize>() {
                    Ok(index) if index > 0 => browser.select_index(index - 1).await,
                    _ => {
                        console.lines(&["usage: /open N".to_string()]).await?;
                        continue;
                    }
                },
                None => browser.reply(line).await.map(|_| ()),
            },
        };

        if let Err(err) = outcome {
            console.lines(&[format!("! {err}")]).await?;
            continue;
        }
        console.lines(&render_entries(&browser.entries(&Utc::now()))).await?;
        if let Some(detail) = browser.detail() {
            console.lines(&render_detail(&detail)).await?;
        }
    }

    Ok(())
}

/// Line-oriented stdin/stdout.
struct Console {
    input: Lines<BufReader<Stdin>>,
    output: Stdout,
}

impl Console {
    fn new() -> Self {
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
            output: tokio::io::stdout(),
        }
    }

    async fn lines(&mut self, lines: &[String]) -> anyhow::Result<()> {
        for line in lines {
            self.output.write_all(line.as_bytes()).await?;
            self.output.write_all(b"\n").await?;
        }
        self.output.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        self.output.write_all(b"> ").await?;
        self.output.flush().await?;
        Ok(self.input.next_line().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_api_url_the_local_store_is_used() {
        let cli = Cli::parse_from(["storefront-chat", "admin"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.transport, TransportMode::Local);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "storefront-chat",
            "--api-url",
            "https://shop.test/api",
            "--transport",
            "probe",
            "--data-dir",
            "/tmp/chat",
            "user",
            "--user-id",
            "u1",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.transport, TransportMode::Probe);
        assert_eq!(config.remote.base_url.as_deref(), Some("https://shop.test/api"));
        assert_eq!(config.fallback.data_dir, PathBuf::from("/tmp/chat"));
    }

    #[test]
    fn remote_mode_without_url_is_rejected() {
        let cli = Cli::parse_from(["storefront-chat", "--transport", "remote", "admin"]);
        assert!(resolve_config(&cli).is_err());
    }
}
