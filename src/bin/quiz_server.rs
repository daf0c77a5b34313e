use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use homework_quiz::clients::ClientType;
use homework_quiz::core::AiProvider;
use homework_quiz::server::router_with_shutdown;
use homework_quiz::{QuizService, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum Provider {
    Openai,
    Mock,
}

impl From<Provider> for ClientType {
    fn from(p: Provider) -> Self {
        match p {
            Provider::Openai => ClientType::OpenAI,
            Provider::Mock => ClientType::Mock,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Homework quiz HTTP service", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    OPENAI_API_KEY                 API key for the OpenAI provider
    OPENAI_BASE_URL                Override the API base URL
    OPENAI_ORG_ID                  Optional organization header
    QUIZ_BIND_ADDR                 Listen address [default: 127.0.0.1:3000]
    QUIZ_STRATEGY_TIMEOUT_SECS     Ceiling per fallback strategy [default: 30]
    QUIZ_PRIMARY_MODEL             Detailed OCR / fact questions [default: gpt-4o]
    QUIZ_FAST_VISION_MODEL         Brief OCR / detailed grading [default: gpt-4o-mini]
    QUIZ_SECONDARY_MODEL           Text fallbacks [default: gpt-3.5-turbo]
    QUIZ_TRANSCRIPTION_MODEL       Speech-to-text model [default: whisper-1]
    QUIZ_MAX_BODY_BYTES            Request body limit [default: 20971520]
    QUIZ_TRANSCRIPT_DIR            Write prompt/response transcripts here
    RUST_LOG                       Log filter [default: info]

EXAMPLES:
    quiz-server                           # Auto-detect provider from OPENAI_API_KEY
    quiz-server --provider mock           # Offline: every capability serves static content
    quiz-server --bind 0.0.0.0:8080 --strategy-timeout 15")]
struct Args {
    /// Provider: openai, mock [default: auto-detect]
    #[arg(short, long, value_enum)]
    provider: Option<Provider>,

    /// Listen address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Seconds allowed per fallback strategy
    #[arg(long)]
    strategy_timeout: Option<u64>,

    /// Directory for prompt/response transcripts
    #[arg(long)]
    transcripts: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(secs) = args.strategy_timeout {
        config = config.with_strategy_timeout(Duration::from_secs(secs));
    }
    if let Some(dir) = args.transcripts {
        config.transcript_dir = Some(dir);
    }

    let client_type = args.provider.map(ClientType::from).unwrap_or_default();
    if client_type == ClientType::Mock {
        warn!("no provider configured; all capabilities will serve static content");
    }
    let provider: Box<dyn AiProvider> = client_type.clone().into();

    let bind_addr = config.bind_addr;
    let service = QuizService::new(provider, config);
    let shutdown = CancellationToken::new();
    let app = router_with_shutdown(service, shutdown.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, provider = %client_type, "quiz server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            shutdown.cancel();
        })
        .await
        .context("server error")?;
    Ok(())
}
