use colored::Colorize;
use uuid::Uuid;

use crate::assistant::{Difficulty, StudyAssistant};
use crate::llm::memory::{format_history, Channel, OutputTag};
use super::{print_response, spinner};

pub async fn explain(assistant: &StudyAssistant, id: Uuid, question: &str) -> Result<(), String> {
    if question.is_empty() {
        return Err("Usage: explain <question>".to_string());
    }

    let pb = spinner("Thinking...");
    let result = assistant.explain(id, question).await;
    pb.finish_and_clear();

    print_response(&result.map_err(|e| e.to_string())?);
    Ok(())
}

pub async fn ask(assistant: &StudyAssistant, id: Uuid, question: &str) -> Result<(), String> {
    if question.is_empty() {
        return Err("Usage: ask <question about your notes>".to_string());
    }

    let pb = spinner("Searching your notes...");
    let result = assistant.chat_with_notes(id, question).await;
    pb.finish_and_clear();

    print_response(&result.map_err(|e| e.to_string())?);
    Ok(())
}

pub async fn summarize(assistant: &StudyAssistant, id: Uuid) -> Result<(), String> {
    let pb = spinner("Summarizing notes...");
    let result = assistant.summarize(id).await;
    pb.finish_and_clear();

    let summary = result.map_err(|e| e.to_string())?;
    println!("\n📝 {}", "Summary".bright_green().bold());
    print_response(&summary);
    Ok(())
}

#[derive(Debug, Default, PartialEq)]
pub struct QuizArgs {
    pub num: Option<usize>,
    pub difficulty: Option<Difficulty>,
    pub content: Option<String>,
}

/// Parses `[n] [easy|medium|hard] [content...]`; each part is optional.
pub fn parse_quiz_args(args: &str) -> QuizArgs {
    let mut rest = args.trim();
    let mut parsed = QuizArgs::default();

    if let Some((word, tail)) = next_word(rest) {
        if let Ok(num) = word.parse::<usize>() {
            parsed.num = Some(num);
            rest = tail;
        }
    }
    if let Some((word, tail)) = next_word(rest) {
        if let Ok(difficulty) = word.parse::<Difficulty>() {
            parsed.difficulty = Some(difficulty);
            rest = tail;
        }
    }

    parsed.content = Some(rest.trim().to_string()).filter(|c| !c.is_empty());
    parsed
}

fn next_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(match s.split_once(char::is_whitespace) {
        Some((word, tail)) => (word, tail.trim_start()),
        None => (s, ""),
    })
}

pub async fn quiz(assistant: &StudyAssistant, id: Uuid, args: &str) -> Result<(), String> {
    let QuizArgs { num, difficulty, content } = parse_quiz_args(args);

    let pb = spinner("Writing quiz questions...");
    let result = assistant
        .generate_quiz(id, content.as_deref(), num, difficulty)
        .await;
    pb.finish_and_clear();

    let quiz = result.map_err(|e| e.to_string())?;
    println!("\n❓ {}", "Quiz".bright_green().bold());
    print_response(&quiz);
    Ok(())
}

pub async fn show_history(assistant: &StudyAssistant, id: Uuid, args: &str) -> Result<(), String> {
    let channels = match args {
        "" => vec![Channel::Explain, Channel::Rag],
        other => vec![other.parse::<Channel>()?],
    };

    let session = assistant.session(id).await.map_err(|e| e.to_string())?;
    let session = session.lock().await;

    for channel in channels {
        let turns = session.history(channel);
        println!("\n💬 {} history ({} messages):", channel.as_str().bright_cyan(), turns.len());
        if turns.is_empty() {
            println!("  {}", "nothing yet".dimmed());
        } else {
            println!("{}", format_history(turns));
        }
    }
    println!();
    Ok(())
}

pub async fn show_outputs(assistant: &StudyAssistant, id: Uuid, args: &str) -> Result<(), String> {
    let tags = match args {
        "" => vec![OutputTag::Summary, OutputTag::Quiz],
        other => vec![other.parse::<OutputTag>()?],
    };

    let session = assistant.session(id).await.map_err(|e| e.to_string())?;
    let session = session.lock().await;

    for tag in tags {
        let outputs: Vec<_> = session.outputs_tagged(tag).collect();
        println!("\n📚 {} outputs ({}):", tag.as_str().bright_cyan(), outputs.len());
        for output in outputs {
            println!(
                "--- {} ---\n{}",
                output.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                output.text
            );
        }
    }
    println!();
    Ok(())
}
