use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use review_core::{
    HttpReviewSource, MockReviewSource, ReviewSource, SessionController, WanaKanaNormalizer,
};
use shared::protocol::TelegramCredential;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod repl;

use config::{load_settings, normalize_server_url};

#[derive(Parser, Debug)]
#[command(about = "Review kanji meanings and readings in the terminal")]
struct Args {
    /// Settings file; missing is fine.
    #[arg(long, default_value = "review.toml")]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Session token from an earlier sign-in.
    #[arg(long)]
    token: Option<String>,
    /// JSON file with a Telegram login payload to sign in with.
    #[arg(long)]
    credential: Option<PathBuf>,
    /// Use the built-in offline deck instead of a server.
    #[arg(long)]
    mock: bool,
    #[arg(long)]
    no_shuffle: bool,
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .with_context(|| format!("invalid log level '{}'", args.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut settings = load_settings(&args.config)?;
    if let Some(url) = &args.server_url {
        settings.server_url = normalize_server_url(url)?;
    }
    if let Some(token) = args.token.clone() {
        settings.token = Some(token);
    }
    settings.use_mock |= args.mock;
    settings.shuffle &= !args.no_shuffle;

    let source: Arc<dyn ReviewSource> = if settings.use_mock {
        info!("using offline sample deck");
        let source = MockReviewSource::sample();
        source.set_token(Some("offline".into())).await;
        Arc::new(source)
    } else {
        info!(server_url = %settings.server_url, "using review server");
        let source = HttpReviewSource::new(settings.server_url.clone());
        source.set_token(settings.token.clone()).await;
        Arc::new(source)
    };

    let mut session = SessionController::new_with_dependencies(
        source,
        settings.session_options(),
        Arc::new(WanaKanaNormalizer),
        Arc::new(|| warn!("review server rejected the session token")),
    );

    let started = match &args.credential {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read credential '{}'", path.display()))?;
            let credential: TelegramCredential = serde_json::from_str(&raw)
                .with_context(|| format!("invalid credential '{}'", path.display()))?;
            session.login(&credential).await
        }
        None => session.start().await,
    };
    if let Err(err) = started {
        // Stalled loads can still be resumed from the prompt.
        if !session.is_stalled() {
            return Err(err).context("could not start review session");
        }
        eprintln!("warning: {err}");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    repl::run(&mut session, stdin, &mut stdout).await?;
    stdout.flush()?;
    Ok(())
}
