use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use banter::core::config::{self, CliOverrides};
use banter::core::gateway::Gateway;
use banter::inference::{ChatCompletionsProvider, ProviderId};
use banter::server::{self, AppState};
use clap::Parser;
use log::{LevelFilter, info, warn};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

#[derive(Parser)]
#[command(name = "banter", about = "Conversation-practice gateway for LLM tutors")]
struct Args {
    /// LLM provider to use (overrides AI_PROVIDER and the config file)
    #[arg(short, long, value_enum)]
    provider: Option<ProviderId>,

    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(short, long)]
    bind: Option<String>,

    /// Config file (defaults to ~/.banter/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let loaded = config::load_config(args.config.as_deref())?;
    let cli = CliOverrides {
        provider: args.provider.map(ProviderId::as_str),
        bind: args.bind.as_deref(),
        log_level: args.log_level.as_deref(),
    };

    // Logger before resolution: provider selection and config reporting log through it.
    let logging = config::logging(&loaded.config, cli);
    init_logging(logging.level, logging.file.as_deref());
    logging.log_ignored();
    loaded.log_source();

    let resolved = config::resolve(&loaded.config, cli);

    info!(
        "Banter starting up with provider: {} (model {}, {})",
        resolved.provider.id,
        resolved.provider.model,
        resolved.provider.base_url
    );
    if resolved.provider.credential.is_none() {
        warn!(
            "No API key for {}; chat requests will fail until {} is set",
            resolved.provider.id,
            resolved.provider.id.credential_env_var()
        );
    }

    let provider = match resolved.request_timeout {
        Some(timeout) => ChatCompletionsProvider::with_timeout(resolved.provider.clone(), timeout)?,
        None => ChatCompletionsProvider::new(resolved.provider.clone()),
    };
    let gateway = Gateway::new(Arc::new(provider), resolved.gateway);
    let state = AppState::new(gateway, resolved.expose_error_details);

    server::serve(state, &resolved.bind).await?;
    info!("Banter stopped");
    Ok(())
}

/// Logs to stderr, and additionally to `log_file` when one is configured.
fn init_logging(level: LevelFilter, log_file: Option<&Path>) {
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_ignore_str("hyper")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(level, log_config, file)),
            Err(e) => eprintln!("Failed to open log file {}: {}", path.display(), e),
        }
    }

    let _ = CombinedLogger::init(loggers);
}
