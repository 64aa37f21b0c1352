use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::providers::traits::CompletionProvider;
use super::prompts::PromptTemplate;

/// A failed agent run. Its display form is the reply text shown to the learner.
#[derive(Error, Debug)]
#[error("[Error from {agent}] {cause}")]
pub struct AgentError {
    pub agent: &'static str,
    pub cause: String,
}

impl AgentError {
    fn new(agent: &'static str, cause: impl std::fmt::Display) -> Self {
        Self { agent, cause: cause.to_string() }
    }
}

/// The four study agents. Clones share the provider and the pipeline lock, so at
/// most one model call is in flight no matter which agent issued it.
#[derive(Clone)]
pub struct StudyAgents {
    provider: Arc<dyn CompletionProvider>,
    pipeline_lock: Arc<Mutex<()>>,
    explain: PromptTemplate,
    summary: PromptTemplate,
    quiz: PromptTemplate,
    rag: PromptTemplate,
}

impl StudyAgents {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            pipeline_lock: Arc::new(Mutex::new(())),
            explain: PromptTemplate::explain(),
            summary: PromptTemplate::summary(),
            quiz: PromptTemplate::quiz(),
            rag: PromptTemplate::rag(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    async fn run(
        &self,
        agent: &'static str,
        template: &PromptTemplate,
        values: &[(&str, &str)],
    ) -> Result<String, AgentError> {
        let prompt = template.format(values).map_err(|e| AgentError::new(agent, e))?;

        let _guard = self.pipeline_lock.lock().await;
        log::info!("Running {} on {} ({} prompt chars)", agent, self.provider.name(), prompt.len());
        let started = Instant::now();

        let reply = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| AgentError::new(agent, e))?;

        log::debug!("{} finished in {:.2?}", agent, started.elapsed());
        Ok(reply)
    }

    pub async fn explanation_agent(&self, question: &str, context: &str) -> Result<String, AgentError> {
        self.run(
            "explanation_agent",
            &self.explain,
            &[("question", question), ("context", context)],
        )
        .await
    }

    pub async fn summarization_agent(&self, notes: &str) -> Result<String, AgentError> {
        self.run("summarization_agent", &self.summary, &[("notes", notes)]).await
    }

    pub async fn quiz_agent(&self, content: &str, num: usize, difficulty: &str) -> Result<String, AgentError> {
        let num = num.to_string();
        self.run(
            "quiz_agent",
            &self.quiz,
            &[("num", num.as_str()), ("content", content), ("difficulty", difficulty)],
        )
        .await
    }

    pub async fn rag_answer_agent(&self, question: &str, context: &str) -> Result<String, AgentError> {
        self.run(
            "rag_answer_agent",
            &self.rag,
            &[("context", context), ("question", question)],
        )
        .await
    }
}
