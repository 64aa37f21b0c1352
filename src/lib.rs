pub mod api;
pub mod assistant;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod llm;
pub mod providers;

// Re-export commonly used items
pub use assistant::{Difficulty, StudyAssistant, StudyError};
pub use config::AppConfig;
