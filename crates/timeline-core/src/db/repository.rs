//! Note store implementation

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};
use crate::util::from_millis;

use super::Database;

/// Key-by-id storage for notes
pub trait NoteStore: Send + Sync {
    /// Insert a new note; fails if the id already exists
    fn insert(&self, note: &Note) -> Result<()>;

    /// Overwrite an existing note; fails with `NotFound` if absent
    fn update(&self, note: &Note) -> Result<()>;

    /// Remove a note and its tag links; fails with `NotFound` if absent
    fn delete(&self, id: &NoteId) -> Result<()>;

    /// Insert the note, or overwrite every field if the id exists
    fn upsert(&self, note: &Note) -> Result<()>;

    /// Get a note by ID
    fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    /// All notes, pinned first, then most recently updated first
    fn list_all(&self) -> Result<Vec<Note>>;
}

/// `SQLite` implementation of `NoteStore`
pub struct SqliteNoteStore {
    db: Mutex<Database>,
}

impl SqliteNoteStore {
    /// Wrap an open database
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open (or create) the note database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// In-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Storage("Note database lock poisoned".to_string()))
    }

    fn write_row(conn: &Connection, note: &Note, replace: bool) -> Result<usize> {
        let sql = if replace {
            "INSERT INTO notes (id, text, created_at, updated_at, is_pinned, image_paths, audio_paths)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                is_pinned = excluded.is_pinned,
                image_paths = excluded.image_paths,
                audio_paths = excluded.audio_paths"
        } else {
            "INSERT INTO notes (id, text, created_at, updated_at, is_pinned, image_paths, audio_paths)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        };
        let rows = conn.execute(
            sql,
            params![
                note.id.as_str(),
                note.text,
                note.created_at.timestamp_millis(),
                note.updated_at.timestamp_millis(),
                i32::from(note.is_pinned),
                serde_json::to_string(&note.image_paths)?,
                serde_json::to_string(&note.audio_paths)?,
            ],
        )?;
        Ok(rows)
    }

    /// Replace all tag links for a note
    fn sync_tags(conn: &Connection, note: &Note) -> Result<()> {
        conn.execute(
            "DELETE FROM note_tags WHERE note_id = ?",
            params![note.id.as_str()],
        )?;
        for tag in &note.tags {
            conn.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag) VALUES (?, ?)",
                params![note.id.as_str(), tag],
            )?;
        }
        Ok(())
    }

    fn load_tags(conn: &Connection, id: &NoteId) -> Result<BTreeSet<String>> {
        let mut stmt = conn.prepare("SELECT tag FROM note_tags WHERE note_id = ?")?;
        let tags = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(tags)
    }

    /// Parse a note (without tags) from a database row
    fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
        let id: String = row.get(0)?;
        Ok(Note {
            id: id
                .parse()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
            text: row.get(1)?,
            created_at: from_millis(row.get(2)?),
            updated_at: from_millis(row.get(3)?),
            is_pinned: row.get::<_, i32>(4)? != 0,
            tags: BTreeSet::new(),
            image_paths: parse_paths(row, 5)?,
            audio_paths: parse_paths(row, 6)?,
        })
    }
}

fn parse_paths(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const SELECT_NOTE: &str =
    "SELECT id, text, created_at, updated_at, is_pinned, image_paths, audio_paths FROM notes";

impl NoteStore for SqliteNoteStore {
    fn insert(&self, note: &Note) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;
        Self::write_row(&tx, note, false)?;
        Self::sync_tags(&tx, note)?;
        tx.commit()?;
        Ok(())
    }

    fn update(&self, note: &Note) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;
        let rows = tx.execute(
            "UPDATE notes SET text = ?, created_at = ?, updated_at = ?, is_pinned = ?,
                image_paths = ?, audio_paths = ?
             WHERE id = ?",
            params![
                note.text,
                note.created_at.timestamp_millis(),
                note.updated_at.timestamp_millis(),
                i32::from(note.is_pinned),
                serde_json::to_string(&note.image_paths)?,
                serde_json::to_string(&note.audio_paths)?,
                note.id.as_str(),
            ],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(note.id.to_string()));
        }
        Self::sync_tags(&tx, note)?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, id: &NoteId) -> Result<()> {
        let db = self.lock()?;
        let rows = db
            .connection()
            .execute("DELETE FROM notes WHERE id = ?", params![id.as_str()])?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn upsert(&self, note: &Note) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.connection_mut().transaction()?;
        Self::write_row(&tx, note, true)?;
        Self::sync_tags(&tx, note)?;
        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let db = self.lock()?;
        let conn = db.connection();
        let note = conn
            .query_row(
                &format!("{SELECT_NOTE} WHERE id = ?"),
                params![id.as_str()],
                Self::parse_note,
            )
            .optional()?;

        match note {
            Some(mut note) => {
                note.tags = Self::load_tags(conn, &note.id)?;
                Ok(Some(note))
            }
            None => Ok(None),
        }
    }

    fn list_all(&self) -> Result<Vec<Note>> {
        let db = self.lock()?;
        let conn = db.connection();

        let mut tags: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut stmt = conn.prepare("SELECT note_id, tag FROM note_tags")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (note_id, tag) = row?;
            tags.entry(note_id).or_default().insert(tag);
        }

        let mut stmt = conn.prepare(&format!(
            "{SELECT_NOTE} ORDER BY is_pinned DESC, updated_at DESC, id DESC"
        ))?;
        let mut notes = stmt
            .query_map([], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for note in &mut notes {
            if let Some(note_tags) = tags.remove(note.id.as_str()) {
                note.tags = note_tags;
            }
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn store() -> SqliteNoteStore {
        SqliteNoteStore::open_in_memory().unwrap()
    }

    fn note(text: &str) -> Note {
        Note::new(
            text,
            vec!["a.jpg".to_string()],
            vec!["b.m4a".to_string()],
            ["work"],
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = store();
        let note = note("Hello");
        store.insert(&note).unwrap();

        let loaded = store.get(&note.id).unwrap().unwrap();
        assert_eq!(loaded, note);
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let store = store();
        let note = note("Once");
        store.insert(&note).unwrap();
        assert!(store.insert(&note).is_err());
    }

    #[test]
    fn test_get_missing() {
        let store = store();
        assert!(store.get(&NoteId::new()).unwrap().is_none());
    }

    #[test]
    fn test_update_replaces_fields_and_tags() {
        let store = store();
        let mut note = note("Before");
        store.insert(&note).unwrap();

        note.text = "After".to_string();
        note.is_pinned = true;
        note.tags = ["home".to_string()].into_iter().collect();
        note.image_paths.clear();
        store.update(&note).unwrap();

        assert_eq!(store.get(&note.id).unwrap().unwrap(), note);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = store();
        let error = store.update(&note("ghost")).unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[test]
    fn test_delete() {
        let store = store();
        let note = note("Doomed");
        store.insert(&note).unwrap();

        store.delete(&note.id).unwrap();
        assert!(store.get(&note.id).unwrap().is_none());
        assert!(matches!(store.delete(&note.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_upsert_inserts_then_overwrites() {
        let store = store();
        let mut note = note("Remote");
        store.upsert(&note).unwrap();

        note.text = "Remote v2".to_string();
        note.tags.clear();
        store.upsert(&note).unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all, vec![note]);
    }

    #[test]
    fn test_list_all_orders_pinned_then_newest() {
        let store = store();
        let mut old = note("old");
        old.updated_at -= Duration::minutes(10);
        old.created_at = old.updated_at;
        let new = note("new");
        let mut pinned = note("pinned");
        pinned.is_pinned = true;
        pinned.updated_at -= Duration::hours(1);
        pinned.created_at = pinned.updated_at;

        for n in [&old, &new, &pinned] {
            store.insert(n).unwrap();
        }

        let texts: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|n| n.text)
            .collect();
        assert_eq!(texts, vec!["pinned", "new", "old"]);
    }
}
