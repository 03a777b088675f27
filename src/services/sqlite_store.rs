use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, error, info};

use crate::error::StoreError;
use crate::models::{
    Class, ClassId, ClassSubjectLink, ClassSubjectRow, NewClass, NewSubject, Subject, SubjectId,
};
use crate::services::store::ClassSubjectStore;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        school_id TEXT NOT NULL,
        name TEXT NOT NULL,
        grade INTEGER NOT NULL,
        section TEXT NOT NULL,
        education_level TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(school_id, name)
    );
    CREATE TABLE IF NOT EXISTS subjects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        school_id TEXT NOT NULL,
        name TEXT NOT NULL,
        code TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(school_id, name)
    );
    CREATE INDEX IF NOT EXISTS idx_subjects_school_code ON subjects(school_id, code);
    CREATE TABLE IF NOT EXISTS class_subjects (
        class_id INTEGER NOT NULL,
        subject_id INTEGER NOT NULL,
        school_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(class_id, subject_id),
        FOREIGN KEY(class_id) REFERENCES classes(id),
        FOREIGN KEY(subject_id) REFERENCES subjects(id)
    );
    CREATE INDEX IF NOT EXISTS idx_class_subjects_school ON class_subjects(school_id);
";

/// SQLite-backed store. A single connection guarded by a mutex; every call
/// is one short round-trip.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        info!("Opening school database at {}", path);
        let opened = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        };
        let conn = opened.map_err(|e| {
            error!("Failed to open database {}: {}", path, e);
            StoreError::from(e)
        })?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(SCHEMA).map_err(|e| {
            error!("Failed to create schema: {}", e);
            StoreError::from(e)
        })?;
        debug!("Schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get(0)?,
        school_id: row.get(1)?,
        name: row.get(2)?,
        grade: row.get(3)?,
        section: row.get(4)?,
        education_level: row.get(5)?,
    })
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        school_id: row.get(1)?,
        name: row.get(2)?,
        code: row.get(3)?,
    })
}

#[async_trait]
impl ClassSubjectStore for SqliteStore {
    async fn find_class(&self, school_id: &str, name: &str) -> Result<Option<Class>, StoreError> {
        let conn = self.conn.lock();
        let class = conn
            .query_row(
                "SELECT id, school_id, name, grade, section, education_level
                 FROM classes WHERE school_id = ?1 AND name = ?2 LIMIT 1",
                params![school_id, name],
                class_from_row,
            )
            .optional()?;
        Ok(class)
    }

    async fn insert_class(&self, class: NewClass) -> Result<ClassId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO classes (school_id, name, grade, section, education_level, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                class.school_id,
                class.name,
                class.grade,
                class.section,
                class.education_level,
                now()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn find_subject(
        &self,
        school_id: &str,
        name: &str,
    ) -> Result<Option<Subject>, StoreError> {
        let conn = self.conn.lock();
        let subject = conn
            .query_row(
                "SELECT id, school_id, name, code
                 FROM subjects WHERE school_id = ?1 AND name = ?2 LIMIT 1",
                params![school_id, name],
                subject_from_row,
            )
            .optional()?;
        Ok(subject)
    }

    async fn insert_subject(&self, subject: NewSubject) -> Result<SubjectId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO subjects (school_id, name, code, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![subject.school_id, subject.name, subject.code, now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn subject_code_exists(&self, school_id: &str, code: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE school_id = ?1 AND code = ?2)",
            params![school_id, code],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn insert_class_subject(&self, link: ClassSubjectLink<'_>) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO class_subjects (class_id, subject_id, school_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![link.class_id, link.subject_id, link.school_id, now()],
        )?;
        Ok(())
    }

    async fn list_classes(&self, school_id: &str) -> Result<Vec<Class>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, school_id, name, grade, section, education_level
             FROM classes WHERE school_id = ?1 ORDER BY grade, section, name",
        )?;
        let classes = stmt
            .query_map(params![school_id], class_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(classes)
    }

    async fn list_subjects(&self, school_id: &str) -> Result<Vec<Subject>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, school_id, name, code FROM subjects WHERE school_id = ?1 ORDER BY id",
        )?;
        let subjects = stmt
            .query_map(params![school_id], subject_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(subjects)
    }

    async fn list_class_subjects(
        &self,
        school_id: &str,
    ) -> Result<Vec<ClassSubjectRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT class_id, subject_id, school_id FROM class_subjects
             WHERE school_id = ?1 ORDER BY class_id, subject_id",
        )?;
        let links = stmt
            .query_map(params![school_id], |row| {
                Ok(ClassSubjectRow {
                    class_id: row.get(0)?,
                    subject_id: row.get(1)?,
                    school_id: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }
}
