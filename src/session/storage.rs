//! Session transcript storage and retrieval using SQLite.
//!
//! When a session stops, its accumulated responses are persisted as one
//! transcript so they can be reviewed after the fact with `sidecoach
//! transcripts`.

use anyhow::Result;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// One persisted session transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    /// When the session went active
    pub started_at: DateTime<Local>,
    /// Assistant responses in the order they arrived
    pub responses: Vec<String>,
}

/// Manages the transcript database.
pub struct TranscriptStore {
    /// Path to the SQLite database file
    database_path: PathBuf,
    /// Connection to the database (lazy-loaded)
    connection: Option<Connection>,
}

impl TranscriptStore {
    /// The default data directory for the transcript database, created on
    /// first use.
    ///
    /// # Errors
    /// - If the home directory cannot be determined
    /// - If the directory cannot be created
    pub fn default_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?
            .join(".local")
            .join("share")
            .join("sidecoach");
        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    /// Creates a transcript store for the given data directory.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            database_path: data_dir.join("transcripts.db"),
            connection: None,
        }
    }

    /// Initializes database connection and creates tables if necessary.
    ///
    /// # Errors
    /// - If the database file cannot be opened
    /// - If table creation fails
    fn get_connection(&mut self) -> Result<&Connection> {
        if self.connection.is_none() {
            let connection = Connection::open(&self.database_path)?;

            connection.execute(
                "CREATE TABLE IF NOT EXISTS responses (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    session_started_at TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    text TEXT NOT NULL
                )",
                [],
            )?;

            self.connection = Some(connection);
        }

        Ok(self.connection.as_ref().unwrap())
    }

    /// Persists one finished session's responses. A session with no responses
    /// is skipped.
    ///
    /// # Errors
    /// - If database connection fails
    /// - If insertion fails
    pub fn save_session(
        &mut self,
        started_at: DateTime<Local>,
        responses: &[String],
    ) -> Result<()> {
        if responses.is_empty() {
            return Ok(());
        }

        let connection = self.get_connection()?;
        let timestamp = started_at.to_rfc3339();

        for (position, text) in responses.iter().enumerate() {
            connection.execute(
                "INSERT INTO responses (session_started_at, position, text) VALUES (?1, ?2, ?3)",
                params![timestamp, position as i64, text],
            )?;
        }

        tracing::debug!("Saved transcript with {} responses", responses.len());
        Ok(())
    }

    /// Retrieves the most recent `count` session transcripts, newest first.
    ///
    /// # Errors
    /// - If database connection fails
    /// - If query execution fails
    /// - If timestamp parsing fails
    pub fn recent_sessions(&mut self, count: usize) -> Result<Vec<TranscriptEntry>> {
        let connection = self.get_connection()?;

        let mut statement = connection.prepare(
            "SELECT session_started_at, text FROM responses
             ORDER BY session_started_at DESC, position ASC",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut sessions: Vec<TranscriptEntry> = Vec::new();
        for (timestamp_str, text) in rows {
            let started_at = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))?;

            match sessions.last_mut() {
                Some(last) if last.started_at == started_at => last.responses.push(text),
                _ => {
                    if sessions.len() == count {
                        break;
                    }
                    sessions.push(TranscriptEntry {
                        started_at,
                        responses: vec![text],
                    });
                }
            }
        }

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_store(tag: &str) -> (TranscriptStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("sidecoach-test-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let _ = std::fs::remove_file(dir.join("transcripts.db"));
        (TranscriptStore::new(&dir), dir)
    }

    #[test]
    fn save_and_reload_round_trips_in_order() {
        let (mut store, dir) = temp_store("roundtrip");
        let earlier = Local::now() - Duration::minutes(10);
        let later = Local::now();

        store
            .save_session(earlier, &["one".into(), "two".into()])
            .unwrap();
        store.save_session(later, &["three".into()]).unwrap();

        let sessions = store.recent_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        // Newest session first, responses in arrival order
        assert_eq!(sessions[0].responses, vec!["three".to_string()]);
        assert_eq!(
            sessions[1].responses,
            vec!["one".to_string(), "two".to_string()]
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn empty_session_is_not_persisted() {
        let (mut store, dir) = temp_store("empty");
        store.save_session(Local::now(), &[]).unwrap();
        assert!(store.recent_sessions(10).unwrap().is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn recent_sessions_honors_count() {
        let (mut store, dir) = temp_store("count");
        let base = Local::now();
        for i in 0..5 {
            store
                .save_session(base - Duration::minutes(i), &[format!("r{i}")])
                .unwrap();
        }

        let sessions = store.recent_sessions(2).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].responses, vec!["r0".to_string()]);
        assert_eq!(sessions[1].responses, vec!["r1".to_string()]);

        let _ = std::fs::remove_dir_all(dir);
    }
}
