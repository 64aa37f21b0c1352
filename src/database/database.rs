use crate::llm::memory::{Channel, ChatTurn, OutputTag, Role, StudyOutput};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rusqlite::Connection;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub active_document: Option<String>,
    pub pdf_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub name: String,
    pub path: String,
    pub char_count: usize,
    pub chunk_count: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// Persists study sessions: notes, chat histories and generated outputs.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatabaseError::Connection(format!("{}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self { conn: Arc::new(conn) };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS sessions (
                        id TEXT PRIMARY KEY,
                        created_at TEXT NOT NULL,
                        active_document TEXT,
                        pdf_text TEXT NOT NULL DEFAULT ''
                    );
                    CREATE TABLE IF NOT EXISTS chat_turns (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        session_id TEXT NOT NULL,
                        channel TEXT NOT NULL,
                        role TEXT NOT NULL,
                        text TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS outputs (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        session_id TEXT NOT NULL,
                        tag TEXT NOT NULL,
                        text TEXT NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS documents (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        session_id TEXT NOT NULL,
                        name TEXT NOT NULL,
                        path TEXT NOT NULL,
                        char_count INTEGER NOT NULL,
                        chunk_count INTEGER NOT NULL,
                        created_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS idx_turns_session ON chat_turns (session_id, channel);
                    CREATE INDEX IF NOT EXISTS idx_outputs_session ON outputs (session_id, tag);",
                )?;
                Ok(())
            })
            .await?;

        info!("Database initialized successfully");
        Ok(())
    }

    pub async fn create_session(&self, id: Uuid) -> Result<(), DatabaseError> {
        let id = id.to_string();
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO sessions (id, created_at) VALUES (?1, ?2)",
                    [&id, &created_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn load_session(&self, id: Uuid) -> Result<Option<SessionRecord>, DatabaseError> {
        let key = id.to_string();
        let row = self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT created_at, active_document, pdf_text FROM sessions WHERE id = ?1",
                )?;
                let mut rows = stmt.query([&key])?;
                if let Some(row) = rows.next()? {
                    Ok(Some((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    )))
                } else {
                    Ok(None)
                }
            })
            .await?;

        row.map(|(created_at, active_document, pdf_text)| {
            Ok(SessionRecord {
                id,
                created_at: parse_timestamp(&created_at)?,
                active_document,
                pdf_text,
            })
        })
        .transpose()
    }

    pub async fn set_session_notes(
        &self,
        id: Uuid,
        document: String,
        pdf_text: String,
    ) -> Result<(), DatabaseError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sessions SET active_document = ?1, pdf_text = ?2 WHERE id = ?3",
                    [&document, &pdf_text, &id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn append_turn(
        &self,
        session_id: Uuid,
        channel: Channel,
        turn: &ChatTurn,
    ) -> Result<(), DatabaseError> {
        let values = [
            session_id.to_string(),
            channel.as_str().to_string(),
            turn.role.as_str().to_string(),
            turn.text.clone(),
            turn.timestamp.to_rfc3339(),
        ];
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chat_turns (session_id, channel, role, text, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    values,
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn turns(&self, session_id: Uuid, channel: Channel) -> Result<Vec<ChatTurn>, DatabaseError> {
        let params = [session_id.to_string(), channel.as_str().to_string()];
        let rows = self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT role, text, created_at FROM chat_turns
                     WHERE session_id = ?1 AND channel = ?2
                     ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params, |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;

                let mut turns = Vec::new();
                for row in rows {
                    turns.push(row?);
                }
                Ok(turns)
            })
            .await?;

        rows.into_iter()
            .map(|(role, text, created_at)| {
                Ok(ChatTurn {
                    role: role.parse::<Role>().map_err(DatabaseError::Corrupt)?,
                    text,
                    timestamp: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    pub async fn append_output(&self, session_id: Uuid, output: &StudyOutput) -> Result<(), DatabaseError> {
        let values = [
            session_id.to_string(),
            output.tag.as_str().to_string(),
            output.text.clone(),
            output.timestamp.to_rfc3339(),
        ];
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO outputs (session_id, tag, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                    values,
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn outputs(&self, session_id: Uuid) -> Result<Vec<StudyOutput>, DatabaseError> {
        let key = session_id.to_string();
        let rows = self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT tag, text, created_at FROM outputs WHERE session_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([&key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?;

                let mut outputs = Vec::new();
                for row in rows {
                    outputs.push(row?);
                }
                Ok(outputs)
            })
            .await?;

        rows.into_iter()
            .map(|(tag, text, created_at)| {
                Ok(StudyOutput {
                    tag: tag.parse::<OutputTag>().map_err(DatabaseError::Corrupt)?,
                    text,
                    timestamp: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    pub async fn record_document(&self, session_id: Uuid, document: &DocumentRecord) -> Result<(), DatabaseError> {
        let values = [
            session_id.to_string(),
            document.name.clone(),
            document.path.clone(),
            document.char_count.to_string(),
            document.chunk_count.to_string(),
            document.uploaded_at.to_rfc3339(),
        ];
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents (session_id, name, path, char_count, chunk_count, created_at)
                     VALUES (?1, ?2, ?3, CAST(?4 AS INTEGER), CAST(?5 AS INTEGER), ?6)",
                    values,
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn documents(&self, session_id: Uuid) -> Result<Vec<DocumentRecord>, DatabaseError> {
        let key = session_id.to_string();
        let rows = self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT name, path, char_count, chunk_count, created_at FROM documents
                     WHERE session_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([&key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?;

                let mut documents = Vec::new();
                for row in rows {
                    documents.push(row?);
                }
                Ok(documents)
            })
            .await?;

        rows.into_iter()
            .map(|(name, path, char_count, chunk_count, created_at)| {
                Ok(DocumentRecord {
                    name,
                    path,
                    char_count: char_count.max(0) as usize,
                    chunk_count: chunk_count.max(0) as usize,
                    uploaded_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}
