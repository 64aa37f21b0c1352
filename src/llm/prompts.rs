use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PromptError {
    #[error("Missing prompt variable: {0}")]
    MissingVariable(String),
    #[error("Malformed template: {0}")]
    Malformed(String),
}

const EXPLAIN_TEMPLATE: &str = "
You are a patient study assistant. Explain the concept below in plain, clear language,
with examples and analogies an undergraduate student would recognise.

QUESTION:
{question}

Additional context (may be empty):
{context}

Give a clear, easy-to-follow explanation.
";

const SUMMARY_TEMPLATE: &str = "
Summarize these notes as short bullet points. Cover the key topics, definitions,
formulas and important ideas.

NOTES:
{notes}
";

const QUIZ_TEMPLATE: &str = "
Write {num} multiple-choice questions based on the content below.

CONTENT:
{content}

Difficulty: {difficulty}

Every question must have:
- 4 options (A, B, C, D)
- the correct answer
- a brief explanation

Format the questions so they are ready to use in an exam.
";

const RAG_TEMPLATE: &str = "
You are a tutor. Answer the question using ONLY the notes below.

NOTES:
{context}

QUESTION:
{question}

Give a clear, accurate answer and cite the note line(s) you relied on.
";

/// A prompt with `{name}` placeholders. `{{` and `}}` render literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>, input_variables: &[&str]) -> Self {
        Self {
            template: template.into(),
            input_variables: input_variables.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn explain() -> Self {
        Self::new(EXPLAIN_TEMPLATE, &["question", "context"])
    }

    pub fn summary() -> Self {
        Self::new(SUMMARY_TEMPLATE, &["notes"])
    }

    pub fn quiz() -> Self {
        Self::new(QUIZ_TEMPLATE, &["num", "content", "difficulty"])
    }

    pub fn rag() -> Self {
        Self::new(RAG_TEMPLATE, &["context", "question"])
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn format(&self, values: &[(&str, &str)]) -> Result<String, PromptError> {
        let values: HashMap<&str, &str> = values.iter().copied().collect();

        if let Some(missing) = self
            .input_variables
            .iter()
            .find(|name| !values.contains_key(name.as_str()))
        {
            return Err(PromptError::MissingVariable(missing.clone()));
        }

        let mut output = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    output.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => return Err(PromptError::Malformed(format!("unclosed placeholder '{{{}'", name))),
                        }
                    }
                    let value = values
                        .get(name.trim())
                        .ok_or_else(|| PromptError::MissingVariable(name.trim().to_string()))?;
                    output.push_str(value);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    output.push('}');
                }
                '}' => return Err(PromptError::Malformed("single '}' outside a placeholder".to_string())),
                _ => output.push(c),
            }
        }

        Ok(output)
    }
}
