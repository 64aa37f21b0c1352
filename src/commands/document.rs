use colored::Colorize;
use std::path::Path;
use uuid::Uuid;

use crate::assistant::StudyAssistant;
use super::spinner;

pub async fn upload(assistant: &StudyAssistant, id: Uuid, file_path: &str) -> Result<(), String> {
    if file_path.is_empty() {
        return Err("Usage: upload <file.pdf>".to_string());
    }

    let path = Path::new(file_path);
    println!("📄 Uploading: {}", file_path.bright_yellow());

    let pb = spinner("Extracting and indexing notes...");
    let result = assistant.upload_pdf_path(id, path).await;
    pb.finish_and_clear();

    let report = result.map_err(|e| format!("Failed to process document: {}", e))?;
    println!(
        "✅ {} loaded: {} characters, {} chunks indexed",
        report.document.bright_green(),
        report.characters.to_string().cyan(),
        report.chunks.to_string().cyan()
    );
    println!("   Saved to {}", report.path.dimmed());
    Ok(())
}

pub async fn handle_command(assistant: &StudyAssistant, id: Uuid, args: &str) -> Result<(), String> {
    let (command, rest) = match args.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (args, ""),
    };

    match command {
        "info" if rest.is_empty() => show_current_document(assistant, id).await,
        "info" => show_file_info(rest),
        "list" => list_documents(assistant, id).await,
        _ => {
            println!("📚 Document Commands:");
            println!("  upload <file.pdf>     - Load a PDF as your study notes");
            println!("  doc info              - Show the loaded notes");
            println!("  doc info <file_path>  - Show file information");
            println!("  doc list              - List documents uploaded this session");
            Ok(())
        }
    }
}

async fn show_current_document(assistant: &StudyAssistant, id: Uuid) -> Result<(), String> {
    let documents = assistant.documents(id).await.map_err(|e| e.to_string())?;
    let Some(document) = documents.last() else {
        println!("No notes loaded yet. Use {} to load a PDF.", "upload <file.pdf>".bright_yellow());
        return Ok(());
    };

    println!("\n📄 Current notes:");
    println!("Name: {}", document.name.bright_yellow());
    println!("Path: {}", document.path);
    println!("Characters: {}", document.char_count.to_string().bright_green());
    println!("Chunks: {}", document.chunk_count.to_string().bright_green());
    println!("Uploaded: {}", document.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

async fn list_documents(assistant: &StudyAssistant, id: Uuid) -> Result<(), String> {
    let documents = assistant.documents(id).await.map_err(|e| e.to_string())?;
    if documents.is_empty() {
        println!("No documents uploaded yet.");
        return Ok(());
    }

    println!("\n📚 Uploaded documents:");
    for (i, document) in documents.iter().enumerate() {
        println!(
            "  {}. {} ({} chunks, {})",
            i + 1,
            document.name.bright_yellow(),
            document.chunk_count,
            document.uploaded_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn show_file_info(file_path: &str) -> Result<(), String> {
    let path = Path::new(file_path);
    let metadata = std::fs::metadata(path)
        .map_err(|e| format!("Failed to get file info: {}", e))?;

    println!("\n📄 File Information:");
    println!(
        "Name: {}",
        path.file_name().unwrap_or_default().to_string_lossy().bright_yellow()
    );
    println!("Type: {}", path.extension().unwrap_or_default().to_string_lossy().bright_cyan());
    println!("Size: {} bytes", metadata.len().to_string().bright_green());
    println!(
        "Last modified: {}",
        metadata
            .modified()
            .map(|time| chrono::DateTime::<chrono::Utc>::from(time).format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(())
}
