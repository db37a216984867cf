use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection};
use std::path::{Path, PathBuf};

use crate::dedup::KnownKeys;
use crate::errors::PersistenceError;
use crate::models::{IdentityKey, NormalizedJob, SourceTag, Status, TrackedJob};
use crate::normalize::parse_deadline;
use crate::tracker::Tracker;

const JOB_COLUMNS: &str = "id, added_at, company, role, location, deadline, apply_link, source,
     status, notes, resume_file, cover_letter_file, reminder_event, updated_at";

/// Local SQLite tracker.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identity_key TEXT NOT NULL UNIQUE,
                added_at TEXT NOT NULL,
                company TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT '',
                location TEXT NOT NULL DEFAULT '',
                deadline TEXT,
                apply_link TEXT NOT NULL,
                source TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new' CHECK (status IN ('new', 'interested', 'applied', 'interview', 'offer', 'rejected')),
                notes TEXT NOT NULL DEFAULT '',
                resume_file TEXT,
                cover_letter_file TEXT,
                reminder_event TEXT,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_deadline ON jobs(deadline);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'scout init' first."));
        }
        Ok(())
    }

    pub fn list_jobs(&self, status: Option<Status>, company: Option<&str>) -> Result<Vec<TrackedJob>> {
        let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1");
        let mut params: Vec<String> = vec![];

        if let Some(s) = status {
            sql.push_str(&format!(" AND status = ?{}", params.len() + 1));
            params.push(s.to_string());
        }

        if let Some(c) = company {
            sql.push_str(&format!(" AND LOWER(company) = LOWER(?{})", params.len() + 1));
            params.push(c.to_string());
        }

        sql.push_str(" ORDER BY added_at DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), Self::row_to_job)?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    pub fn get_job(&self, id: i64) -> Result<Option<TrackedJob>> {
        let result = self.conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [id],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Jobs that carry a deadline, earliest first.
    pub fn jobs_with_deadlines(&self) -> Result<Vec<TrackedJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE deadline IS NOT NULL ORDER BY deadline"
        ))?;
        let rows = stmt.query_map([], Self::row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs with deadlines")
    }

    /// Returns false when no job has this id.
    pub fn set_status(&self, id: i64, status: Status) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE jobs SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn set_material_files(&self, id: i64, resume_file: &str, cover_letter_file: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE jobs SET resume_file = ?1, cover_letter_file = ?2, updated_at = datetime('now')
             WHERE id = ?3",
            params![resume_file, cover_letter_file, id],
        )?;
        Ok(())
    }

    pub fn set_reminder_event(&self, id: i64, event_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE jobs SET reminder_event = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![event_id, id],
        )?;
        Ok(())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<TrackedJob> {
        let added_at: String = row.get(1)?;
        let added_at = DateTime::parse_from_rfc3339(&added_at)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let deadline: Option<String> = row.get(5)?;
        let source: String = row.get(7)?;
        let status: String = row.get(8)?;
        let status = status
            .parse::<Status>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

        Ok(TrackedJob {
            id: row.get(0)?,
            job: NormalizedJob {
                company: row.get(2)?,
                role: row.get(3)?,
                location: row.get(4)?,
                deadline: deadline.as_deref().and_then(parse_deadline),
                apply_link: row.get(6)?,
                source: SourceTag::from(source.as_str()),
                notes: row.get(9)?,
                status,
                added_at,
            },
            resume_file: row.get(10)?,
            cover_letter_file: row.get(11)?,
            reminder_event: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl Tracker for Database {
    fn append(&self, job: &NormalizedJob) -> Result<(), PersistenceError> {
        let key = job.identity_key();
        let result = self.conn.execute(
            "INSERT INTO jobs (identity_key, added_at, company, role, location, deadline,
                               apply_link, source, status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                key.as_str(),
                job.added_at.to_rfc3339(),
                job.company,
                job.role,
                job.location,
                job.deadline.map(|d| d.to_string()),
                job.apply_link,
                job.source.to_string(),
                job.status.as_str(),
                job.notes,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            // Only the identity_key UNIQUE index means "already tracked".
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE => {
                Err(PersistenceError::Duplicate(key))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn known_identity_keys(&self) -> Result<KnownKeys, PersistenceError> {
        let mut stmt = self.conn.prepare("SELECT identity_key FROM jobs")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .map(|key| key.map(IdentityKey::from))
            .collect::<Result<KnownKeys, _>>()?;
        Ok(keys)
    }
}
