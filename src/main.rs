use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use studysphere::api;
use studysphere::assistant::StudyAssistant;
use studysphere::commands::CommandHandler;
use studysphere::config::AppConfig;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Study assistant for your lecture notes, backed by a local model server", long_about = None)]
struct Args {
    /// Serve the JSON API instead of the interactive console
    #[arg(long)]
    api: bool,

    #[arg(long, default_value = "8501")]
    port: u16,

    /// PDF to load as notes before the first prompt
    #[arg(long)]
    upload: Option<PathBuf>,

    /// Chat model, overrides LLM_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Model server URL, overrides OLLAMA_API_URL
    #[arg(long)]
    ollama_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] studysphere::config::ConfigError),
    #[error("Startup error: {0}")]
    StartupError(String),
    #[error("API error: {0}")]
    ApiError(String),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    colored::control::set_override(true);

    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = AppConfig::from_env()
        .map_err(AppError::from)?
        .with_model(args.model.clone())
        .with_ollama_url(args.ollama_url.clone())
        .map_err(AppError::from)?;

    let assistant = StudyAssistant::new(config)
        .await
        .map_err(|e| AppError::StartupError(format!("{:#}", e)))?;
    let assistant = Arc::new(assistant);

    if args.api {
        run_api_server(&args, assistant).await
    } else {
        run_cli_mode(&args, assistant).await
    }
}

async fn run_cli_mode(
    args: &Args,
    assistant: Arc<StudyAssistant>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let health = assistant.health().await;
    if let Some(error) = &health.model_error {
        println!("{}", format!("⚠️  Model server not ready: {}", error).yellow());
        println!("{}", "   Start it with `ollama serve` and pull the models first.".yellow());
    }

    let command_handler = CommandHandler::new(assistant).await?;

    command_handler.handle_command("help").await?;

    if let Some(path) = &args.upload {
        let command = format!("upload {}", path.display());
        if let Err(e) = command_handler.handle_command(&command).await {
            println!("{}", e.red());
        }
    }

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("🎓 ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                if let Err(e) = command_handler.handle_command(input).await {
                    println!("{}", e.red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn run_api_server(
    args: &Args,
    assistant: Arc<StudyAssistant>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    if let Some(path) = &args.upload {
        let session = assistant.create_session().await?;
        let report = assistant.upload_pdf_path(session, path).await?;
        log::info!(
            "Preloaded {} into session {} ({} chunks)",
            report.document,
            session,
            report.chunks
        );
    }

    let app = api::create_api(assistant);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::ApiError(format!("Failed to bind to {}: {}", addr, e)))?;

    log::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::ApiError(format!("Server error: {}", e)))?;

    Ok(())
}
