//! SQLite persistence for sessions

use super::message::{BehaviorDirective, Message, Prompt, Response};
use super::store::Session;
use super::types::{ChatModel, Role};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS message (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    role        TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
    content     TEXT NOT NULL,
    tokens      INTEGER,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    model               TEXT NOT NULL,
    context_size        INTEGER NOT NULL DEFAULT -1,
    context_size_tokens INTEGER NOT NULL DEFAULT -1,
    behavior_id         INTEGER REFERENCES message(id),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prompt (
    id          INTEGER PRIMARY KEY REFERENCES message(id),
    session_id  INTEGER NOT NULL REFERENCES session(id)
);
CREATE INDEX IF NOT EXISTS idx_prompt_session ON prompt(session_id);

CREATE TABLE IF NOT EXISTS response (
    id          INTEGER PRIMARY KEY REFERENCES message(id),
    prompt_id   INTEGER NOT NULL UNIQUE REFERENCES prompt(id),
    raw_json    TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS message_created_at_immutable
BEFORE UPDATE OF created_at ON message
WHEN NEW.created_at IS NOT OLD.created_at
BEGIN
    SELECT RAISE(ABORT, 'message: column \"created_at\" cannot be modified retroactively');
END;

CREATE TRIGGER IF NOT EXISTS session_created_at_immutable
BEFORE UPDATE OF created_at ON session
WHEN NEW.created_at IS NOT OLD.created_at
BEGIN
    SELECT RAISE(ABORT, 'session: column \"created_at\" cannot be modified retroactively');
END;
";

/// Summary of a stored session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: i64,
    pub model: String,
    pub prompt_count: usize,
    pub tokens: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stores sessions and their messages in one SQLite database
///
/// One connection per CLI invocation.
pub struct SessionManager {
    conn: Connection,
}

impl SessionManager {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("Opening session database at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> crate::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> crate::Result<Self> {
        // SQLite leaves foreign keys unenforced unless asked per connection
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Save new rows of `session` and assign their ids
    ///
    /// Already stored messages are left untouched; only the session row's
    /// `updated_at` and settings are refreshed.
    pub fn save(&mut self, session: &mut Session) -> crate::Result<i64> {
        let tx = self.conn.transaction()?;

        let behavior_id = match session.behavior_mut() {
            Some(behavior) => Some(insert_if_new(&tx, behavior.message_mut())?),
            None => None,
        };

        let session_id = match session.id() {
            Some(id) => {
                let updated = tx.execute(
                    "UPDATE session
                     SET model = ?1, context_size = ?2, context_size_tokens = ?3,
                         behavior_id = ?4, updated_at = ?5
                     WHERE id = ?6",
                    params![
                        session.model.as_str(),
                        session.context_size,
                        session.context_size_tokens,
                        behavior_id,
                        format_timestamp(session.updated_at()),
                        id
                    ],
                )?;
                if updated == 0 {
                    return Err(crate::Error::NotFound(format!("session {}", id)));
                }
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO session
                     (model, context_size, context_size_tokens, behavior_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        session.model.as_str(),
                        session.context_size,
                        session.context_size_tokens,
                        behavior_id,
                        format_timestamp(session.created_at()),
                        format_timestamp(session.updated_at())
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        let mut inserted = 0usize;
        for prompt in session.prompts_mut() {
            if prompt.message().id().is_none() {
                let id = insert_message(&tx, prompt.message())?;
                prompt.message_mut().set_id(id);
                tx.execute(
                    "INSERT INTO prompt (id, session_id) VALUES (?1, ?2)",
                    params![id, session_id],
                )?;
                inserted += 1;
            }
            let prompt_id = prompt.message().id();
            if let (Some(prompt_id), Some(response)) = (prompt_id, prompt.response_mut()) {
                if response.message().id().is_none() {
                    let id = insert_message(&tx, response.message())?;
                    response.message_mut().set_id(id);
                    tx.execute(
                        "INSERT INTO response (id, prompt_id, raw_json) VALUES (?1, ?2, ?3)",
                        params![id, prompt_id, response.raw_json],
                    )?;
                    inserted += 1;
                }
            }
        }

        tx.commit()?;
        session.set_id(session_id);
        debug!("Saved session {} ({} new messages)", session_id, inserted);
        Ok(session_id)
    }

    /// Load a session with all of its messages
    pub fn load(&self, id: i64) -> crate::Result<Option<Session>> {
        let row = self
            .conn
            .query_row(
                "SELECT model, context_size, context_size_tokens, behavior_id, created_at, updated_at
                 FROM session WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((model, context_size, context_size_tokens, behavior_id, created_at, updated_at)) =
            row
        else {
            return Ok(None);
        };

        let behavior = match behavior_id {
            Some(behavior_id) => Some(BehaviorDirective::from_message(
                self.load_message(behavior_id)?,
            )),
            None => None,
        };

        let mut prompts: Vec<Prompt> = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT m.id, m.role, m.content, m.tokens, m.created_at, m.updated_at
                 FROM prompt p JOIN message m ON m.id = p.id
                 WHERE p.session_id = ?1
                 ORDER BY m.id ASC",
            )?;
            let rows = stmt.query_map(params![id], message_from_row)?;
            for row in rows {
                prompts.push(Prompt::from_message(row??));
            }
        }

        let mut responses: HashMap<i64, Response> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT m.id, m.role, m.content, m.tokens, m.created_at, m.updated_at,
                        r.prompt_id, r.raw_json
                 FROM response r
                 JOIN prompt p ON p.id = r.prompt_id
                 JOIN message m ON m.id = r.id
                 WHERE p.session_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                let message = message_from_row(row)?;
                let prompt_id: i64 = row.get(6)?;
                let raw_json: String = row.get(7)?;
                Ok((message, prompt_id, raw_json))
            })?;
            for row in rows {
                let (message, prompt_id, raw_json) = row?;
                responses.insert(prompt_id, Response::from_message(message?, raw_json));
            }
        }

        for prompt in &mut prompts {
            let Some(prompt_id) = prompt.message().id() else {
                continue;
            };
            if let Some(response) = responses.remove(&prompt_id) {
                prompt.respond(response)?;
            }
        }

        Ok(Some(Session::restore(
            id,
            ChatModel::from(model),
            context_size,
            context_size_tokens,
            behavior,
            prompts,
            parse_timestamp(&created_at)?,
            parse_timestamp(&updated_at)?,
        )))
    }

    /// The most recently updated session
    pub fn latest(&self) -> crate::Result<Option<Session>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM session ORDER BY updated_at DESC, id DESC LIMIT 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        match id {
            Some(id) => self.load(id),
            None => Ok(None),
        }
    }

    /// List all sessions, most recently updated first
    pub fn list_sessions(&self) -> crate::Result<Vec<SessionInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.model, s.created_at, s.updated_at,
                    (SELECT COUNT(*) FROM prompt p WHERE p.session_id = s.id),
                    (SELECT COALESCE(SUM(m.tokens), 0)
                       FROM message m
                      WHERE m.id IN (SELECT p.id FROM prompt p WHERE p.session_id = s.id)
                         OR m.id IN (SELECT r.id FROM response r
                                     JOIN prompt p ON p.id = r.prompt_id
                                     WHERE p.session_id = s.id))
             FROM session s
             ORDER BY s.updated_at DESC, s.id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, model, created_at, updated_at, prompt_count, tokens) = row?;
            sessions.push(SessionInfo {
                id,
                model,
                prompt_count: prompt_count.max(0) as usize,
                tokens,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(sessions)
    }

    /// Delete a session and its messages. Returns whether it existed.
    pub fn delete(&mut self, id: i64) -> crate::Result<bool> {
        let tx = self.conn.transaction()?;

        let behavior_id: Option<Option<i64>> = tx
            .query_row(
                "SELECT behavior_id FROM session WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(behavior_id) = behavior_id else {
            return Ok(false);
        };

        let message_ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                "SELECT p.id FROM prompt p WHERE p.session_id = ?1
                 UNION ALL
                 SELECT r.id FROM response r JOIN prompt p ON p.id = r.prompt_id
                 WHERE p.session_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| row.get::<_, i64>(0))?;
            rows.collect::<Result<_, _>>()?
        };

        tx.execute(
            "DELETE FROM response WHERE prompt_id IN (SELECT id FROM prompt WHERE session_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM prompt WHERE session_id = ?1", params![id])?;
        tx.execute("DELETE FROM session WHERE id = ?1", params![id])?;
        for message_id in message_ids.iter().chain(behavior_id.iter()) {
            tx.execute("DELETE FROM message WHERE id = ?1", params![message_id])?;
        }

        tx.commit()?;
        debug!("Deleted session {}", id);
        Ok(true)
    }

    fn load_message(&self, id: i64) -> crate::Result<Message> {
        self.conn.query_row(
            "SELECT id, role, content, tokens, created_at, updated_at FROM message WHERE id = ?1",
            params![id],
            message_from_row,
        )?
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn insert_if_new(tx: &Transaction<'_>, message: &mut Message) -> crate::Result<i64> {
    if let Some(id) = message.id() {
        return Ok(id);
    }
    let id = insert_message(tx, message)?;
    message.set_id(id);
    Ok(id)
}

fn insert_message(tx: &Transaction<'_>, message: &Message) -> crate::Result<i64> {
    tx.execute(
        "INSERT INTO message (role, content, tokens, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.role().as_str(),
            message.content,
            message.tokens,
            format_timestamp(message.created_at()),
            format_timestamp(message.updated_at())
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Maps a `(id, role, content, tokens, created_at, updated_at)` row.
/// Column errors fail the query, decoding errors come back as the inner result.
fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<crate::Result<Message>> {
    Ok(decode_message(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_message(
    id: i64,
    role: String,
    content: String,
    tokens: Option<i64>,
    created_at: String,
    updated_at: String,
) -> crate::Result<Message> {
    let role = Role::parse(&role)
        .ok_or_else(|| crate::Error::Session(format!("unknown role '{}'", role)))?;
    Ok(Message::restore(
        id,
        role,
        content,
        tokens,
        parse_timestamp(&created_at)?,
        parse_timestamp(&updated_at)?,
    ))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Session(format!("invalid timestamp '{}': {}", raw, e)))
}
