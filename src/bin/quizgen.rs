use std::path::PathBuf;

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use homework_quiz::clients::ClientType;
use homework_quiz::{GradingRequest, QuizService, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Run the quiz pipelines once from the command line", long_about = None)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    OPENAI_API_KEY   API key for the OpenAI provider (mock when unset)
    RUST_LOG         Log filter [default: warn]

EXAMPLES:
    quizgen extract page.jpg
    quizgen questions --text \"Solen består av väte och helium.\"
    quizgen image page.jpg --seed 7
    quizgen grade --question \"Vad heter hund på engelska?\" --expected \"dog\" --answer \"a dog\"")]
struct Args {
    /// Provider: openai or mock [default: auto-detect]
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Fixed shuffle seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// OCR an image file
    Extract { image: PathBuf },
    /// Generate questions from text (inline or from a file)
    Questions {
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// OCR an image and generate questions in one go
    Image { image: PathBuf },
    /// Grade a typed answer
    Grade {
        #[arg(long)]
        question: String,
        #[arg(long)]
        expected: String,
        #[arg(long)]
        answer: String,
        #[arg(long, default_value = "svenska")]
        question_language: String,
        #[arg(long, default_value = "svenska")]
        answer_language: String,
    },
}

fn read_image(path: &PathBuf) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client_type = match args.provider.as_deref() {
        Some(name) => name.parse::<ClientType>().map_err(anyhow::Error::msg)?,
        None => ClientType::default(),
    };
    let mut service = QuizService::new(client_type.into(), ServiceConfig::from_env());
    if let Some(seed) = args.seed {
        service = service.with_seed(seed);
    }
    let cancel = CancellationToken::new();

    let output = match args.command {
        Command::Extract { image } => {
            let extracted = service.extract_text(&read_image(&image)?, &cancel).await?;
            serde_json::to_string_pretty(&extracted)?
        }
        Command::Questions { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => std::fs::read_to_string(&file).with_context(|| format!("cannot read {}", file.display()))?,
                (None, None) => bail!("either --text or --file is required"),
            };
            serde_json::to_string_pretty(&service.generate_questions(&text, &cancel).await?)?
        }
        Command::Image { image } => serde_json::to_string_pretty(&service.analyze_image(&read_image(&image)?, &cancel).await?)?,
        Command::Grade { question, expected, answer, question_language, answer_language } => {
            let request = GradingRequest {
                question,
                answer,
                expected_answer: expected,
                question_language,
                answer_language,
                vocabulary_pair: None,
            };
            serde_json::to_string_pretty(&service.grade_answer(&request, &cancel).await?)?
        }
    };
    println!("{output}");
    Ok(())
}
