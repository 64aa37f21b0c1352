use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::{
    open_vector_store, Database, DatabaseError, DocumentRecord, VectorStore, VectorStoreError,
};
use crate::document::{extract_text_from_bytes, save_upload, upload_name, DocumentError};
use crate::llm::agents::{AgentError, StudyAgents};
use crate::llm::memory::{Channel, ChatTurn, OutputTag, StudyOutput};
use crate::llm::retriever::{build_context, Retriever};
use crate::providers::traits::CompletionProvider;
use crate::providers::ProviderFactory;

pub const DEFAULT_QUIZ_SIZE: usize = 5;
pub const MAX_QUIZ_SIZE: usize = 10;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Please enter a question first")]
    EmptyInput,
    #[error("Upload a PDF file first")]
    NoNotes,
    #[error("Upload a PDF or enter content.")]
    NoContent,
    #[error("A request is already running. Please wait for it to finish.")]
    Busy,
    #[error("Number of questions must be between 1 and 10, got {0}")]
    InvalidQuizSize(usize),
    #[error("Unknown difficulty '{0}'. Use easy, medium or hard")]
    InvalidDifficulty(String),
    #[error("Unknown session {0}")]
    UnknownSession(Uuid),
    #[error("No extractable text found in {0}")]
    EmptyDocument(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
    #[error("Model server error: {0}")]
    Provider(String),
}

impl StudyError {
    fn provider(e: anyhow::Error) -> Self {
        StudyError::Provider(format!("{:#}", e))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(StudyError::InvalidDifficulty(other.to_string())),
        }
    }
}

/// One learner's working state: the current notes plus everything asked and generated.
#[derive(Debug, Clone)]
pub struct StudySession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub active_document: Option<String>,
    pub pdf_text: String,
    pub explain_history: Vec<ChatTurn>,
    pub rag_history: Vec<ChatTurn>,
    pub outputs: Vec<StudyOutput>,
}

impl StudySession {
    fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            active_document: None,
            pdf_text: String::new(),
            explain_history: Vec::new(),
            rag_history: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn has_notes(&self) -> bool {
        !self.pdf_text.is_empty()
    }

    pub fn history(&self, channel: Channel) -> &[ChatTurn] {
        match channel {
            Channel::Explain => &self.explain_history,
            Channel::Rag => &self.rag_history,
        }
    }

    fn history_mut(&mut self, channel: Channel) -> &mut Vec<ChatTurn> {
        match channel {
            Channel::Explain => &mut self.explain_history,
            Channel::Rag => &mut self.rag_history,
        }
    }

    pub fn outputs_tagged(&self, tag: OutputTag) -> impl Iterator<Item = &StudyOutput> {
        self.outputs.iter().filter(move |o| o.tag == tag)
    }

    pub fn snapshot(&self, busy: bool) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            created_at: self.created_at,
            active_document: self.active_document.clone(),
            has_notes: self.has_notes(),
            note_chars: self.pdf_text.chars().count(),
            explain_history: self.explain_history.clone(),
            rag_history: self.rag_history.clone(),
            outputs: self.outputs.clone(),
            busy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub active_document: Option<String>,
    pub has_notes: bool,
    pub note_chars: usize,
    pub explain_history: Vec<ChatTurn>,
    pub rag_history: Vec<ChatTurn>,
    pub outputs: Vec<StudyOutput>,
    /// A request is running, so explain would be rejected right now.
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub document: String,
    pub path: String,
    pub characters: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub provider: &'static str,
    pub model: Option<String>,
    pub model_error: Option<String>,
    pub vector_store: &'static str,
    pub indexed_chunks: Option<usize>,
    pub busy: bool,
}

/// Runs the study actions for any number of sessions. Whole actions are
/// serialized by the request lock so a question and its answer are always
/// recorded back to back.
pub struct StudyAssistant {
    config: AppConfig,
    agents: StudyAgents,
    retriever: Retriever,
    db: Database,
    request_lock: Mutex<()>,
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<StudySession>>>>,
}

impl StudyAssistant {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let provider = ProviderFactory::from_config(&config.provider)?;
        let store = open_vector_store(&config).await?;
        let db = Database::new(&config.database_path).await?;
        Ok(Self::with_components(config, provider, store, db))
    }

    pub fn with_components(
        config: AppConfig,
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        db: Database,
    ) -> Self {
        let retriever = Retriever::new(provider.clone(), store, config.splitter());
        Self {
            agents: StudyAgents::new(provider),
            retriever,
            db,
            config,
            request_lock: Mutex::new(()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.request_lock.try_lock().is_err()
    }

    pub async fn create_session(&self) -> Result<Uuid, StudyError> {
        let id = Uuid::new_v4();
        self.db.create_session(id).await?;
        self.sessions
            .write()
            .insert(id, Arc::new(Mutex::new(StudySession::new(id))));
        log::info!("Created session {}", id);
        Ok(id)
    }

    /// Returns a live session, restoring it from the database after a restart.
    pub async fn session(&self, id: Uuid) -> Result<Arc<Mutex<StudySession>>, StudyError> {
        let live = self.sessions.read().get(&id).cloned();
        if let Some(session) = live {
            return Ok(session);
        }

        let record = self.db.load_session(id).await?.ok_or(StudyError::UnknownSession(id))?;
        let session = StudySession {
            id,
            created_at: record.created_at,
            active_document: record.active_document,
            pdf_text: record.pdf_text,
            explain_history: self.db.turns(id, Channel::Explain).await?,
            rag_history: self.db.turns(id, Channel::Rag).await?,
            outputs: self.db.outputs(id).await?,
        };
        log::info!("Restored session {} from database", id);

        let mut sessions = self.sessions.write();
        let entry = sessions.entry(id).or_insert_with(|| Arc::new(Mutex::new(session)));
        Ok(entry.clone())
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot, StudyError> {
        let session = self.session(id).await?;
        let busy = self.is_busy();
        let session = session.lock().await;
        Ok(session.snapshot(busy))
    }

    pub async fn documents(&self, id: Uuid) -> Result<Vec<DocumentRecord>, StudyError> {
        self.session(id).await?;
        Ok(self.db.documents(id).await?)
    }

    pub async fn indexed_chunks(&self) -> Result<usize, StudyError> {
        Ok(self.retriever.store().count().await?)
    }

    /// Extracts the PDF's text, saves the file, makes the text the session's
    /// notes and indexes it. Nothing is written when extraction fails.
    pub async fn upload_pdf(&self, id: Uuid, file_name: &str, bytes: Vec<u8>) -> Result<UploadReport, StudyError> {
        let document = upload_name(file_name)?.to_string();
        let session = self.session(id).await?;
        let _request = self.request_lock.lock().await;

        let text = extract_text_from_bytes(bytes.clone()).await?;
        if text.is_empty() {
            return Err(StudyError::EmptyDocument(document));
        }
        let path = save_upload(&self.config.upload_dir, &document, &bytes).await?;

        let chunks = self.load_notes(id, &session, &document, text.clone()).await?;
        let report = UploadReport {
            document,
            path: path.display().to_string(),
            characters: text.chars().count(),
            chunks,
        };

        self.db
            .record_document(
                id,
                &DocumentRecord {
                    name: report.document.clone(),
                    path: report.path.clone(),
                    char_count: report.characters,
                    chunk_count: report.chunks,
                    uploaded_at: Utc::now(),
                },
            )
            .await?;

        Ok(report)
    }

    pub async fn upload_pdf_path(&self, id: Uuid, path: &Path) -> Result<UploadReport, StudyError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DocumentError::InvalidName(path.display().to_string()))?;
        let bytes = tokio::fs::read(path).await.map_err(DocumentError::Io)?;
        self.upload_pdf(id, &file_name, bytes).await
    }

    /// Stores `text` as the session's notes, then indexes it. The notes stay
    /// usable for summaries and quizzes even if indexing fails.
    async fn load_notes(
        &self,
        id: Uuid,
        session: &Mutex<StudySession>,
        document: &str,
        text: String,
    ) -> Result<usize, StudyError> {
        self.db
            .set_session_notes(id, document.to_string(), text.clone())
            .await?;
        {
            let mut session = session.lock().await;
            session.active_document = Some(document.to_string());
            session.pdf_text = text.clone();
        }

        self.retriever
            .index_text(&notes_source(id, document), &text)
            .await
            .map_err(StudyError::provider)
    }

    pub async fn explain(&self, id: Uuid, question: &str) -> Result<String, StudyError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(StudyError::EmptyInput);
        }
        let session = self.session(id).await?;
        let _request = self.request_lock.try_lock().map_err(|_| StudyError::Busy)?;

        let reply = reply_text(self.agents.explanation_agent(question, "").await);
        self.record_exchange(&session, Channel::Explain, question, &reply).await?;
        Ok(reply)
    }

    pub async fn summarize(&self, id: Uuid) -> Result<String, StudyError> {
        let session = self.session(id).await?;
        let _request = self.request_lock.lock().await;

        let notes = session.lock().await.pdf_text.clone();
        if notes.is_empty() {
            return Err(StudyError::NoNotes);
        }

        let summary = reply_text(self.agents.summarization_agent(&notes).await);
        self.record_output(&session, OutputTag::Summary, &summary).await?;
        Ok(summary)
    }

    pub async fn generate_quiz(
        &self,
        id: Uuid,
        content: Option<&str>,
        num: Option<usize>,
        difficulty: Option<Difficulty>,
    ) -> Result<String, StudyError> {
        let num = num.unwrap_or(DEFAULT_QUIZ_SIZE);
        if !(1..=MAX_QUIZ_SIZE).contains(&num) {
            return Err(StudyError::InvalidQuizSize(num));
        }
        let difficulty = difficulty.unwrap_or_default();

        let session = self.session(id).await?;
        let _request = self.request_lock.lock().await;

        let content = match content.map(str::trim).filter(|c| !c.is_empty()) {
            Some(manual) => manual.to_string(),
            None => session.lock().await.pdf_text.clone(),
        };
        if content.is_empty() {
            return Err(StudyError::NoContent);
        }

        let quiz = reply_text(self.agents.quiz_agent(&content, num, difficulty.as_str()).await);
        self.record_output(&session, OutputTag::Quiz, &quiz).await?;
        Ok(quiz)
    }

    pub async fn chat_with_notes(&self, id: Uuid, question: &str) -> Result<String, StudyError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(StudyError::EmptyInput);
        }
        let session = self.session(id).await?;
        let _request = self.request_lock.lock().await;

        let source = {
            let session = session.lock().await;
            match &session.active_document {
                Some(document) if session.has_notes() => notes_source(id, document),
                _ => return Err(StudyError::NoNotes),
            }
        };

        let chunks = self
            .retriever
            .retrieve_relevant_chunks(question, Some(&source), self.config.retrieval_k)
            .await
            .map_err(StudyError::provider)?;
        let context = build_context(&chunks);

        let answer = reply_text(self.agents.rag_answer_agent(question, &context).await);
        self.record_exchange(&session, Channel::Rag, question, &answer).await?;
        Ok(answer)
    }

    pub async fn health(&self) -> HealthReport {
        let provider = self.agents.provider();
        let (model, model_error) = match provider.get_model_info().await {
            Ok(model) => (Some(model), None),
            Err(e) => {
                log::warn!("Model server health check failed: {:#}", e);
                (None, Some(format!("{:#}", e)))
            }
        };
        let indexed_chunks = match self.indexed_chunks().await {
            Ok(count) => Some(count),
            Err(e) => {
                log::warn!("Vector store health check failed: {}", e);
                None
            }
        };

        HealthReport {
            ok: model_error.is_none() && indexed_chunks.is_some(),
            provider: provider.name(),
            model,
            model_error,
            vector_store: self.retriever.store().backend(),
            indexed_chunks,
            busy: self.is_busy(),
        }
    }

    async fn record_exchange(
        &self,
        session: &Mutex<StudySession>,
        channel: Channel,
        question: &str,
        reply: &str,
    ) -> Result<(), StudyError> {
        let mut session = session.lock().await;
        for turn in [ChatTurn::user(question), ChatTurn::assistant(reply)] {
            self.db.append_turn(session.id, channel, &turn).await?;
            session.history_mut(channel).push(turn);
        }
        Ok(())
    }

    async fn record_output(
        &self,
        session: &Mutex<StudySession>,
        tag: OutputTag,
        text: &str,
    ) -> Result<(), StudyError> {
        let mut session = session.lock().await;
        let output = StudyOutput::new(tag, text);
        self.db.append_output(session.id, &output).await?;
        session.outputs.push(output);
        Ok(())
    }
}

/// Vector store key for a session's notes. Two sessions uploading the same file
/// name keep separate chunk sets.
fn notes_source(id: Uuid, document: &str) -> String {
    format!("{}/{}", id, document)
}

/// Agent failures are shown to the learner in place of the reply.
fn reply_text(result: Result<String, AgentError>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            log::error!("{}", e);
            e.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::LocalVectorStore;
    use crate::document::test_pdf::pdf_with_pages;
    use crate::providers::mock::MockProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn assistant_with(provider: Arc<MockProvider>, dir: &TempDir) -> Arc<StudyAssistant> {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.upload_dir = dir.path().join("uploads");
        config.chunk_size = 60;
        config.chunk_overlap = 0;

        let store = LocalVectorStore::open_in_memory().await.unwrap();
        let db = Database::open_in_memory().await.unwrap();
        Arc::new(StudyAssistant::with_components(config, provider, Arc::new(store), db))
    }

    async fn with_notes(assistant: &StudyAssistant, id: Uuid, text: &str) -> usize {
        let session = assistant.session(id).await.unwrap();
        assistant.load_notes(id, &session, "notes.pdf", text.to_string()).await.unwrap()
    }

    #[tokio::test]
    async fn test_explain_records_both_turns() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        provider.push_reply("Entropy measures disorder.");
        let assistant = assistant_with(provider, &dir).await;
        let id = assistant.create_session().await.unwrap();

        let reply = assistant.explain(id, "  What is entropy?  ").await.unwrap();
        assert_eq!(reply, "Entropy measures disorder.");

        let snapshot = assistant.snapshot(id).await.unwrap();
        assert_eq!(snapshot.explain_history.len(), 2);
        assert_eq!(snapshot.explain_history[0].text, "What is entropy?");
        assert_eq!(snapshot.explain_history[1].text, "Entropy measures disorder.");
        assert!(snapshot.rag_history.is_empty());
    }

    #[tokio::test]
    async fn test_blank_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = assistant.create_session().await.unwrap();

        assert!(matches!(assistant.explain(id, "   ").await, Err(StudyError::EmptyInput)));
        assert!(matches!(assistant.chat_with_notes(id, "").await, Err(StudyError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_actions_needing_notes() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = assistant.create_session().await.unwrap();

        assert!(matches!(assistant.summarize(id).await, Err(StudyError::NoNotes)));
        assert!(matches!(assistant.chat_with_notes(id, "why?").await, Err(StudyError::NoNotes)));
        assert!(matches!(
            assistant.generate_quiz(id, Some("  "), None, None).await,
            Err(StudyError::NoContent)
        ));
    }

    #[tokio::test]
    async fn test_quiz_bounds_and_defaults() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        let assistant = assistant_with(provider.clone(), &dir).await;
        let id = assistant.create_session().await.unwrap();

        assert!(matches!(
            assistant.generate_quiz(id, Some("cells"), Some(0), None).await,
            Err(StudyError::InvalidQuizSize(0))
        ));
        assert!(matches!(
            assistant.generate_quiz(id, Some("cells"), Some(11), None).await,
            Err(StudyError::InvalidQuizSize(11))
        ));

        assistant.generate_quiz(id, Some("The cell membrane"), None, None).await.unwrap();
        let prompt = provider.prompts().pop().unwrap();
        assert!(prompt.contains("Write 5 multiple-choice questions"));
        assert!(prompt.contains("Difficulty: medium"));
        assert!(prompt.contains("The cell membrane"));

        let snapshot = assistant.snapshot(id).await.unwrap();
        assert_eq!(snapshot.outputs.len(), 1);
        assert_eq!(snapshot.outputs[0].tag, OutputTag::Quiz);
    }

    #[tokio::test]
    async fn test_quiz_falls_back_to_notes() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        let assistant = assistant_with(provider.clone(), &dir).await;
        let id = assistant.create_session().await.unwrap();
        with_notes(&assistant, id, "Glycolysis splits glucose into pyruvate.").await;

        assistant.generate_quiz(id, None, Some(2), Some(Difficulty::Hard)).await.unwrap();
        let prompt = provider.prompts().pop().unwrap();
        assert!(prompt.contains("Glycolysis splits glucose"));
        assert!(prompt.contains("Difficulty: hard"));
    }

    #[tokio::test]
    async fn test_chat_with_notes_uses_retrieved_context() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        let assistant = assistant_with(provider.clone(), &dir).await;
        let id = assistant.create_session().await.unwrap();
        let chunks = with_notes(
            &assistant,
            id,
            "Ohm's law relates voltage, current and resistance.\n\nZebras graze in the savanna zone.",
        )
        .await;
        assert_eq!(chunks, 2);

        provider.push_reply("V = IR");
        let answer = assistant.chat_with_notes(id, "What does Ohm's law relate?").await.unwrap();
        assert_eq!(answer, "V = IR");

        let prompt = provider.prompts().pop().unwrap();
        assert!(prompt.contains("Ohm's law relates voltage"));

        let snapshot = assistant.snapshot(id).await.unwrap();
        assert_eq!(snapshot.rag_history.len(), 2);
        assert_eq!(snapshot.active_document.as_deref(), Some("notes.pdf"));
    }

    #[tokio::test]
    async fn test_chat_only_sees_own_session_notes() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        let assistant = assistant_with(provider.clone(), &dir).await;
        let alice = assistant.create_session().await.unwrap();
        let bob = assistant.create_session().await.unwrap();

        with_notes(&assistant, alice, "Photosynthesis uses chlorophyll to capture light.").await;
        with_notes(&assistant, bob, "Roman aqueducts carried water by gravity.").await;
        assert_eq!(assistant.indexed_chunks().await.unwrap(), 2);

        assistant.chat_with_notes(alice, "photosynthesis chlorophyll?").await.unwrap();
        let prompt = provider.prompts().pop().unwrap();
        assert!(prompt.contains("chlorophyll to capture light"));
        assert!(!prompt.contains("aqueducts"));

        assistant.chat_with_notes(bob, "photosynthesis chlorophyll?").await.unwrap();
        let prompt = provider.prompts().pop().unwrap();
        assert!(prompt.contains("aqueducts"));
        assert!(!prompt.contains("capture light"));
    }

    #[tokio::test]
    async fn test_upload_pdf_loads_and_indexes_notes() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = assistant.create_session().await.unwrap();

        let pdf = pdf_with_pages(&["Osmosis moves water", "Diffusion spreads solutes"]);
        let report = assistant.upload_pdf(id, "week3/cells.pdf", pdf.clone()).await.unwrap();
        assert_eq!(report.document, "cells.pdf");
        assert_eq!(report.characters, "Osmosis moves water\n\nDiffusion spreads solutes".len());
        assert!(report.chunks >= 1);
        assert_eq!(assistant.indexed_chunks().await.unwrap(), report.chunks);

        let saved = dir.path().join("uploads").join("cells.pdf");
        assert_eq!(std::fs::read(&saved).unwrap(), pdf);

        let snapshot = assistant.snapshot(id).await.unwrap();
        assert!(snapshot.has_notes);
        assert_eq!(snapshot.active_document.as_deref(), Some("cells.pdf"));

        let documents = assistant.documents(id).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].name, "cells.pdf");
        assert_eq!(documents[0].chunk_count, report.chunks);
    }

    #[tokio::test]
    async fn test_upload_blank_pdf_keeps_current_notes() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = assistant.create_session().await.unwrap();
        with_notes(&assistant, id, "Existing notes").await;

        let err = assistant.upload_pdf(id, "scan.pdf", pdf_with_pages(&[""])).await.unwrap_err();
        assert!(matches!(err, StudyError::EmptyDocument(ref name) if name == "scan.pdf"));
        assert!(!dir.path().join("uploads").join("scan.pdf").exists());

        let snapshot = assistant.snapshot(id).await.unwrap();
        assert_eq!(snapshot.active_document.as_deref(), Some("notes.pdf"));
        assert!(assistant.documents(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_reupload_keeps_saved_file() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = assistant.create_session().await.unwrap();

        let good = pdf_with_pages(&["Enzymes lower activation energy"]);
        assistant.upload_pdf(id, "notes.pdf", good.clone()).await.unwrap();

        let err = assistant.upload_pdf(id, "notes.pdf", b"%PDF-1.4 broken".to_vec()).await.unwrap_err();
        assert!(matches!(err, StudyError::Document(DocumentError::Extraction(_))));
        assert_eq!(std::fs::read(dir.path().join("uploads").join("notes.pdf")).unwrap(), good);
    }

    #[tokio::test]
    async fn test_agent_failure_becomes_reply() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        provider.push_error("connection refused");
        let assistant = assistant_with(provider, &dir).await;
        let id = assistant.create_session().await.unwrap();
        with_notes(&assistant, id, "Some notes").await;

        let summary = assistant.summarize(id).await.unwrap();
        assert_eq!(summary, "[Error from summarization_agent] connection refused");
        let snapshot = assistant.snapshot(id).await.unwrap();
        assert_eq!(snapshot.outputs[0].text, summary);
    }

    #[tokio::test]
    async fn test_explain_fails_fast_when_busy() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_millis(200)));
        let assistant = assistant_with(provider, &dir).await;
        let id = assistant.create_session().await.unwrap();
        with_notes(&assistant, id, "Long notes to summarize").await;

        let background = assistant.clone();
        let running = tokio::spawn(async move { background.summarize(id).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(assistant.is_busy());
        assert!(assistant.snapshot(id).await.unwrap().busy);
        assert!(matches!(assistant.explain(id, "quick question").await, Err(StudyError::Busy)));

        running.await.unwrap().unwrap();
        assert!(!assistant.is_busy());
        assert!(!assistant.snapshot(id).await.unwrap().busy);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = assistant.create_session().await.unwrap();

        let err = assistant.upload_pdf(id, "notes.txt", b"plain".to_vec()).await.unwrap_err();
        assert!(matches!(err, StudyError::Document(DocumentError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let id = Uuid::new_v4();
        assert!(matches!(assistant.summarize(id).await, Err(StudyError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn test_session_restored_from_database() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::new());
        let assistant = assistant_with(provider.clone(), &dir).await;
        let id = assistant.create_session().await.unwrap();
        with_notes(&assistant, id, "Persisted notes").await;
        assistant.explain(id, "Remember me?").await.unwrap();

        let restored = StudyAssistant::with_components(
            assistant.config().clone(),
            provider,
            Arc::new(LocalVectorStore::open_in_memory().await.unwrap()),
            assistant.db.clone(),
        );
        let snapshot = restored.snapshot(id).await.unwrap();
        assert!(snapshot.has_notes);
        assert_eq!(snapshot.explain_history.len(), 2);
    }

    #[tokio::test]
    async fn test_health_report() {
        let dir = TempDir::new().unwrap();
        let assistant = assistant_with(Arc::new(MockProvider::new()), &dir).await;
        let report = assistant.health().await;
        assert!(report.ok);
        assert_eq!(report.model.as_deref(), Some("mock-model"));
        assert_eq!(report.vector_store, "local");
        assert_eq!(report.indexed_chunks, Some(0));
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
        assert!(matches!("extreme".parse::<Difficulty>(), Err(StudyError::InvalidDifficulty(_))));
    }
}
