//! hookrelay - gateway-to-webhook relay
//!
//! Connects to the Discord gateway as a bot and forwards human messages to a
//! webhook.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use hookrelay::{EventDispatcher, ForwardMethod, GatewayConnection, RelayConfig, WebhookForwarder};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

/// How long in-flight forwards may finish after the session ends.
const FORWARD_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "hookrelay")]
#[command(about = "Relay Discord messages to a webhook")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "HOOKRELAY_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the gateway and relay messages (default)
    Run(RunArgs),

    /// Validate the configuration and print it with secrets redacted
    CheckConfig(RunArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    /// Gateway WebSocket URL
    #[arg(long, env = "HOOKRELAY_GATEWAY_URL")]
    gateway_url: Option<Url>,

    /// Gateway intents bitmask
    #[arg(long, env = "HOOKRELAY_INTENTS")]
    intents: Option<u64>,

    /// HTTP method used for the webhook (GET or POST)
    #[arg(long, env = "HOOKRELAY_FORWARD_METHOD")]
    forward_method: Option<ForwardMethod>,
}

impl RunArgs {
    fn into_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::from_env()?;
        if let Some(url) = self.gateway_url {
            config.gateway_url = url;
        }
        if let Some(intents) = self.intents {
            config.intents = intents;
        }
        if let Some(method) = self.forward_method {
            config.forward_method = method;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("hookrelay=info".parse()?);
    if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let config = args.into_config()?;
            if let Err(e) = run_relay(config).await {
                error!(error = %e, "relay stopped");
                return Err(e);
            }
        }

        Commands::CheckConfig(args) => {
            check_config(&args.into_config()?);
        }
    }

    Ok(())
}

async fn run_relay(config: RelayConfig) -> anyhow::Result<()> {
    info!(
        gateway = %config.gateway_url,
        webhook_host = config.webhook_url.host_str().unwrap_or("-"),
        method = %config.forward_method,
        intents = config.intents,
        "starting hookrelay"
    );

    let shutdown = CancellationToken::new();
    let signal = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received ctrl-c, shutting down");
                shutdown.cancel();
            }
        })
    };

    let forwarder = WebhookForwarder::from_config(&config)?;
    let mut dispatcher = EventDispatcher::new(forwarder);

    let result = match GatewayConnection::connect(&config).await {
        Ok(mut connection) => connection.run(&mut dispatcher, &shutdown).await,
        Err(e) => Err(e),
    };

    dispatcher.shutdown(FORWARD_GRACE).await;
    signal.abort();

    result?;
    info!(forwarded = dispatcher.forwarded(), "hookrelay stopped");
    Ok(())
}

fn check_config(config: &RelayConfig) {
    println!("Configuration OK");
    println!("  Gateway:        {}", config.gateway_url);
    println!("  Webhook host:   {}", config.webhook_url.host_str().unwrap_or("-"));
    println!("  Forward method: {}", config.forward_method);
    println!("  Intents:        {}", config.intents);
    println!("  Token:          {:?}", config.token);
    println!("  Forward timeout: {:?}", config.forward_timeout);
    println!("  Connect timeout: {:?}", config.connect_timeout);
}
