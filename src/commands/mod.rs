use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::assistant::StudyAssistant;

mod document;
mod study;
mod system;

/// Console front end: one study session driven by typed commands.
pub struct CommandHandler {
    assistant: Arc<StudyAssistant>,
    session_id: Uuid,
}

impl CommandHandler {
    pub async fn new(assistant: Arc<StudyAssistant>) -> Result<Self, String> {
        let session_id = assistant
            .create_session()
            .await
            .map_err(|e| format!("Failed to start study session: {}", e))?;
        Ok(Self { assistant, session_id })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn handle_command(&self, input: &str) -> Result<(), String> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(());
        }

        let (command, args) = split_command(input);
        let assistant = self.assistant.as_ref();
        let id = self.session_id;

        match command.as_str() {
            "help" | "exit" | "quit" if args.is_empty() => system::handle_command(&command),
            "status" if args.is_empty() => self.show_status().await,
            "summarize" | "summary" if args.is_empty() => study::summarize(assistant, id).await,
            "upload" => document::upload(assistant, id, args).await,
            "doc" => document::handle_command(assistant, id, args).await,
            "explain" => study::explain(assistant, id, args).await,
            "quiz" => study::quiz(assistant, id, args).await,
            "ask" => study::ask(assistant, id, args).await,
            "history" => study::show_history(assistant, id, args).await,
            "outputs" => study::show_outputs(assistant, id, args).await,
            _ => self.handle_free_text(input).await,
        }
    }

    /// Plain questions go to the notes once a PDF is loaded, otherwise to the explainer.
    async fn handle_free_text(&self, input: &str) -> Result<(), String> {
        let snapshot = self
            .assistant
            .snapshot(self.session_id)
            .await
            .map_err(|e| e.to_string())?;

        if snapshot.has_notes {
            study::ask(&self.assistant, self.session_id, input).await
        } else {
            study::explain(&self.assistant, self.session_id, input).await
        }
    }

    async fn show_status(&self) -> Result<(), String> {
        let pb = spinner("Checking model server...");
        let health = self.assistant.health().await;
        pb.finish_and_clear();

        let snapshot = self
            .assistant
            .snapshot(self.session_id)
            .await
            .map_err(|e| e.to_string())?;

        println!("\n🩺 Status:");
        match (&health.model, &health.model_error) {
            (Some(model), _) => println!("  Model:        {} via {}", model.bright_cyan(), health.provider),
            (None, Some(error)) => println!("  Model:        {}", error.red()),
            (None, None) => println!("  Model:        {}", "unknown".yellow()),
        }
        println!("  Vector store: {}", health.vector_store.bright_cyan());
        match health.indexed_chunks {
            Some(count) => println!("  Chunks:       {}", count.to_string().cyan()),
            None => println!("  Chunks:       {}", "unavailable".red()),
        }
        println!(
            "  Notes:        {}",
            snapshot
                .active_document
                .as_deref()
                .map(|d| d.bright_yellow().to_string())
                .unwrap_or_else(|| "none loaded".dimmed().to_string())
        );
        println!("  Session:      {}", self.session_id.to_string().dimmed());
        println!();
        Ok(())
    }
}

/// Splits `input` into a lowercased command word and its trimmed arguments.
fn split_command(input: &str) -> (String, &str) {
    match input.split_once(char::is_whitespace) {
        Some((command, args)) => (command.to_lowercase(), args.trim()),
        None => (input.to_lowercase(), ""),
    }
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub(crate) fn print_response(response: &str) {
    println!("\n{}", response.truecolor(255, 236, 179));
    println!(
        "\n📊 Tokens: 📤 Response: {}",
        crate::providers::utils::count_tokens(response).to_string().cyan()
    );
    println!();
}
