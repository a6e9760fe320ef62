//! SQLite-backed triples table used to look up entities by (relation, tail).
//!
//! The database is an intermediate artifact of the directory build and is
//! kept around for debugging. Layout:
//!
//!   triples(head INT, rel INT, tail INT)
//!   head_index ON triples(head)
//!   rel_index  ON triples(rel)
//!   tail_index ON triples(tail)
//!
//! No connection outlives a call: each operation opens the file, does its
//! work (bulk inserts inside one transaction) and drops the handle.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OpenFlags};

use crate::base::DataFile;
use crate::error::{DaoError, Result};

// ── Triple ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triple {
    pub head: i64,
    pub rel: i64,
    pub tail: i64,
}

impl Triple {
    pub fn new(head: i64, rel: i64, tail: i64) -> Self {
        Self { head, rel, tail }
    }
}

// ── Schema SQL ───────────────────────────────────────────────────────────

const SCHEMA_SQL: &str = "
CREATE TABLE triples (
    head    INT,
    rel     INT,
    tail    INT
);

CREATE INDEX head_index ON triples(head);
CREATE INDEX rel_index ON triples(rel);
CREATE INDEX tail_index ON triples(tail);
";

// ═════════════════════════════════════════════════════════════════════════
// TriplesDb
// ═════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct TriplesDb {
    name: String,
    path: PathBuf,
}

impl DataFile for TriplesDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl TriplesDb {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Only `create_schema` may bring the file into existence; everything
    /// else treats an absent file as unavailable storage.
    fn connect(&self, create: bool) -> Result<Connection> {
        let mut flags = OpenFlags::default();
        if !create {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }
        Connection::open_with_flags(&self.path, flags).map_err(|source| self.unavailable(source))
    }

    fn unavailable(&self, source: rusqlite::Error) -> DaoError {
        DaoError::StorageUnavailable {
            path: self.path.clone(),
            source,
        }
    }

    /// Create the triples table and its three single-column indexes.
    /// Fails with `SchemaConflict` if any of them already exists.
    pub fn create_schema(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DaoError::io(parent, e))?;
        }
        let mut conn = self.connect(true)?;
        let tx = conn.transaction().map_err(|e| self.unavailable(e))?;
        if let Err(source) = tx.execute_batch(SCHEMA_SQL) {
            return Err(if is_not_a_database(&source) {
                self.unavailable(source)
            } else {
                DaoError::SchemaConflict {
                    path: self.path.clone(),
                    source,
                }
            });
        }
        tx.commit().map_err(|e| self.unavailable(e))?;
        tracing::debug!("created triples schema in {}", self.path.display());
        Ok(())
    }

    /// Append all triples in a single transaction; either every row lands
    /// or none does.
    pub fn insert_many(&self, triples: &[Triple]) -> Result<()> {
        let mut conn = self.connect(false)?;
        let tx = conn.transaction().map_err(|e| self.unavailable(e))?;
        {
            let mut stmt = tx
                .prepare("INSERT INTO triples (head, rel, tail) VALUES (?1, ?2, ?3)")
                .map_err(|e| self.unavailable(e))?;
            for triple in triples {
                stmt.execute(params![triple.head, triple.rel, triple.tail])
                    .map_err(|e| self.unavailable(e))?;
            }
        }
        tx.commit().map_err(|e| self.unavailable(e))?;
        tracing::debug!(
            "inserted {} triples into {}",
            triples.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Distinct heads `h` such that `(h, rel, tail)` is stored. Used as a
    /// membership test when assigning classes, hence a set.
    pub fn select_heads(&self, rel: i64, tail: i64) -> Result<HashSet<i64>> {
        let conn = self.connect(false)?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT head FROM triples WHERE rel = ?1 AND tail = ?2")
            .map_err(|e| self.unavailable(e))?;
        let rows = stmt
            .query_map(params![rel, tail], |row| row.get::<_, i64>(0))
            .map_err(|e| self.unavailable(e))?;
        let mut heads = HashSet::new();
        for head in rows {
            heads.insert(head.map_err(|e| self.unavailable(e))?);
        }
        Ok(heads)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.connect(false)?;
        conn.query_row("SELECT COUNT(*) FROM triples", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| self.unavailable(e))
    }
}

fn is_not_a_database(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::NotADatabase
    )
}

// ── Raw triples input ────────────────────────────────────────────────────

/// Parse a tab-separated `head rel tail` file, one triple per line.
pub fn read_triples_tsv(path: &Path) -> Result<Vec<Triple>> {
    let text = fs::read_to_string(path).map_err(|e| DaoError::io(path, e))?;
    let mut triples = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 {
            return Err(DaoError::format(
                path,
                line_no,
                format!("expected 3 fields, found {}", fields.len()),
            ));
        }
        let mut ids = [0i64; 3];
        for (slot, field) in ids.iter_mut().zip(&fields) {
            *slot = field.trim().parse().map_err(|_| {
                DaoError::format(path, line_no, format!("not an integer id: {field:?}"))
            })?;
        }
        triples.push(Triple::new(ids[0], ids[1], ids[2]));
    }
    Ok(triples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_db(dir: &tempfile::TempDir, name: &str) -> TriplesDb {
        let db = TriplesDb::new("Test Triples DB", dir.path().join(name));
        db.create_schema().unwrap();
        db
    }

    fn sample_triples() -> Vec<Triple> {
        vec![
            Triple::new(1, 5, 99),
            Triple::new(2, 5, 99),
            Triple::new(3, 6, 99),
        ]
    }

    #[test]
    fn test_select_heads_by_rel_tail() {
        let dir = tempfile::tempdir().unwrap();
        let db = fresh_db(&dir, "train.db");
        db.insert_many(&sample_triples()).unwrap();

        assert_eq!(db.select_heads(5, 99).unwrap(), HashSet::from([1, 2]));
        assert_eq!(db.select_heads(6, 99).unwrap(), HashSet::from([3]));
        assert!(db.select_heads(5, 100).unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_are_stored_but_heads_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let db = fresh_db(&dir, "dup.db");
        db.insert_many(&[Triple::new(7, 1, 2), Triple::new(7, 1, 2)])
            .unwrap();

        assert_eq!(db.count().unwrap(), 2);
        assert_eq!(db.select_heads(1, 2).unwrap(), HashSet::from([7]));
    }

    #[test]
    fn test_repeated_queries_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let db = fresh_db(&dir, "stable.db");
        db.insert_many(&sample_triples()).unwrap();

        let first = db.select_heads(5, 99).unwrap();
        for _ in 0..3 {
            assert_eq!(db.select_heads(5, 99).unwrap(), first);
        }
    }

    #[test]
    fn test_every_inserted_pair_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let db = fresh_db(&dir, "all.db");
        let triples: Vec<Triple> = (0..40)
            .map(|h| Triple::new(h, h % 3, 100 + h % 4))
            .collect();
        db.insert_many(&triples).unwrap();

        for rel in 0..3 {
            for tail in 100..104 {
                let expected: HashSet<i64> = triples
                    .iter()
                    .filter(|t| t.rel == rel && t.tail == tail)
                    .map(|t| t.head)
                    .collect();
                assert_eq!(db.select_heads(rel, tail).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_failed_insert_rolls_back_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let db = fresh_db(&dir, "abort.db");
        Connection::open(db.path())
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_head_3 BEFORE INSERT ON triples
                 WHEN NEW.head = 3
                 BEGIN SELECT RAISE(ABORT, 'head 3 rejected'); END;",
            )
            .unwrap();

        assert!(db.insert_many(&sample_triples()).is_err());
        assert_eq!(db.count().unwrap(), 0);
        assert!(db.select_heads(5, 99).unwrap().is_empty());
    }

    #[test]
    fn test_create_schema_twice_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let db = fresh_db(&dir, "twice.db");
        assert!(matches!(
            db.create_schema(),
            Err(DaoError::SchemaConflict { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let db = TriplesDb::new("Absent DB", dir.path().join("absent.db"));

        assert!(matches!(
            db.select_heads(1, 1),
            Err(DaoError::StorageUnavailable { .. })
        ));
        assert!(matches!(
            db.insert_many(&sample_triples()),
            Err(DaoError::StorageUnavailable { .. })
        ));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_garbage_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        fs::write(&path, vec![0xAB; 4096]).unwrap();
        let db = TriplesDb::new("Garbage DB", &path);

        assert!(matches!(
            db.create_schema(),
            Err(DaoError::StorageUnavailable { .. })
        ));
        assert!(matches!(
            db.select_heads(1, 1),
            Err(DaoError::StorageUnavailable { .. })
        ));
    }

    #[test]
    fn test_read_triples_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.tsv");
        fs::write(&path, "1\t5\t99\n2\t5\t99\r\n\n3\t6\t99\n").unwrap();

        assert_eq!(read_triples_tsv(&path).unwrap(), sample_triples());
    }

    #[test]
    fn test_read_triples_tsv_rejects_short_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tsv");
        fs::write(&path, "1\t5\t99\n2\t5\n").unwrap();

        match read_triples_tsv(&path) {
            Err(DaoError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {other:?}"),
        }
    }
}
