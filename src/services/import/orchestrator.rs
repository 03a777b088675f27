use serde_json::Value;
use tracing::{info, warn};

use super::class_resolver::resolve_class;
use super::link_writer::link_class_subject;
use super::subject_resolver::resolve_subject;
use super::validator::validate_row;
use super::{ResolutionContext, ResolveError};
use crate::models::{
    ClassId, ImportOptions, ImportResult, ImportRow, RowError, SubjectFailurePolicy, SubjectWarning,
};
use crate::services::store::ClassSubjectStore;

enum RowOutcome {
    Imported(Vec<SubjectWarning>),
    Failed(Vec<String>),
}

async fn provision_subject(
    store: &dyn ClassSubjectStore,
    ctx: &mut ResolutionContext,
    class_id: ClassId,
    name: &str,
) -> Result<(), ResolveError> {
    let subject_id = resolve_subject(store, ctx, name).await?;
    link_class_subject(store, class_id, subject_id, &ctx.school_id)
        .await
        .map_err(|source| ResolveError::Link {
            name: name.to_string(),
            source,
        })
}

async fn process_row(
    store: &dyn ClassSubjectStore,
    ctx: &mut ResolutionContext,
    row_number: usize,
    row: ImportRow,
) -> RowOutcome {
    let class_id = match resolve_class(store, ctx, &row.class, &row.level).await {
        Ok(id) => id,
        Err(e) => return RowOutcome::Failed(vec![e.to_string()]),
    };

    let mut warnings = Vec::new();
    for subject in &row.subjects {
        if let Err(e) = provision_subject(store, ctx, class_id, subject).await {
            warn!("Row {}: skipping subject {}: {}", row_number, subject, e);
            warnings.push(SubjectWarning {
                row: row_number,
                subject: subject.clone(),
                message: e.to_string(),
            });
        }
    }

    match ctx.options.subject_failures {
        SubjectFailurePolicy::Strict if !warnings.is_empty() => {
            RowOutcome::Failed(warnings.into_iter().map(|w| w.message).collect())
        }
        _ => RowOutcome::Imported(warnings),
    }
}

/// Imports a batch of raw rows for one school.
///
/// Rows are handled strictly in order; a bad row is recorded and the batch
/// moves on. Row numbers in the result are 1-based positions in `rows`.
pub async fn import_class_subjects(
    store: &dyn ClassSubjectStore,
    school_id: &str,
    rows: &[Value],
    options: ImportOptions,
) -> ImportResult {
    let numbered = rows.iter().enumerate().map(|(idx, raw)| (idx + 1, raw));
    run_batch(store, school_id, rows.len(), numbered, options).await
}

/// Same as [`import_class_subjects`] for rows that already carry their own
/// number, e.g. the sheet line of a workbook record.
pub async fn import_numbered_rows(
    store: &dyn ClassSubjectStore,
    school_id: &str,
    rows: &[(usize, Value)],
    options: ImportOptions,
) -> ImportResult {
    let numbered = rows.iter().map(|(line, raw)| (*line, raw));
    run_batch(store, school_id, rows.len(), numbered, options).await
}

async fn run_batch<'a, I>(
    store: &dyn ClassSubjectStore,
    school_id: &str,
    total: usize,
    rows: I,
    options: ImportOptions,
) -> ImportResult
where
    I: Iterator<Item = (usize, &'a Value)> + Send,
{
    let start = std::time::Instant::now();
    info!("Starting class-subject import of {} rows for school {}", total, school_id);

    let mut ctx = ResolutionContext::new(school_id, options);
    let mut result = ImportResult::default();

    for (row_number, raw) in rows {
        let outcome = match validate_row(raw) {
            Ok(row) => process_row(store, &mut ctx, row_number, row).await,
            Err(errors) => RowOutcome::Failed(errors),
        };

        match outcome {
            RowOutcome::Imported(warnings) => {
                result.success += 1;
                result.warnings.extend(warnings);
            }
            RowOutcome::Failed(errors) => {
                warn!("Row {} failed: {}", row_number, errors.join("; "));
                result.failed += 1;
                result.errors.push(RowError {
                    row: row_number,
                    data: raw.clone(),
                    errors,
                });
            }
        }
    }

    info!(
        "Import for school {} finished in {:?}: {} succeeded, {} failed, {} subject warnings",
        school_id,
        start.elapsed(),
        result.success,
        result.failed,
        result.warnings.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::models::{
        Class, ClassSubjectLink, ClassSubjectRow, NewClass, NewSubject, Subject, SubjectId,
    };
    use crate::services::sqlite_store::SqliteStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store faults to inject, keyed by class or subject name.
    #[derive(Default)]
    struct Faults {
        failing_class: Option<&'static str>,
        failing_subject: Option<&'static str>,
        failing_link: Option<&'static str>,
        failing_lookup: Option<&'static str>,
        // The row is written, then the insert reports a conflict, as when a
        // concurrent import got there first.
        racing_inserts: bool,
    }

    /// Wraps a store, counting inserts and injecting faults.
    struct CountingStore {
        inner: SqliteStore,
        class_inserts: AtomicUsize,
        subject_inserts: AtomicUsize,
        faults: Faults,
    }

    impl CountingStore {
        fn new(failing_subject: Option<&'static str>) -> Self {
            Self::with_faults(Faults {
                failing_subject,
                ..Faults::default()
            })
        }

        fn with_faults(faults: Faults) -> Self {
            Self {
                inner: SqliteStore::open_in_memory().unwrap(),
                class_inserts: AtomicUsize::new(0),
                subject_inserts: AtomicUsize::new(0),
                faults,
            }
        }
    }

    fn backend(msg: &str) -> StoreError {
        StoreError::Backend(msg.to_string())
    }

    #[async_trait]
    impl ClassSubjectStore for CountingStore {
        async fn find_class(&self, school_id: &str, name: &str) -> Result<Option<Class>, StoreError> {
            if self.faults.failing_lookup == Some(name) {
                return Err(backend("connection reset"));
            }
            self.inner.find_class(school_id, name).await
        }

        async fn insert_class(&self, class: NewClass) -> Result<ClassId, StoreError> {
            self.class_inserts.fetch_add(1, Ordering::SeqCst);
            if self.faults.failing_class == Some(class.name.as_str()) {
                return Err(backend("disk full"));
            }
            let id = self.inner.insert_class(class).await?;
            if self.faults.racing_inserts {
                return Err(StoreError::Conflict(format!("classes row {}", id)));
            }
            Ok(id)
        }

        async fn find_subject(
            &self,
            school_id: &str,
            name: &str,
        ) -> Result<Option<Subject>, StoreError> {
            if self.faults.failing_lookup == Some(name) {
                return Err(backend("connection reset"));
            }
            self.inner.find_subject(school_id, name).await
        }

        async fn insert_subject(&self, subject: NewSubject) -> Result<SubjectId, StoreError> {
            self.subject_inserts.fetch_add(1, Ordering::SeqCst);
            if self.faults.failing_subject == Some(subject.name.as_str()) {
                return Err(backend("disk full"));
            }
            let id = self.inner.insert_subject(subject).await?;
            if self.faults.racing_inserts {
                return Err(StoreError::Conflict(format!("subjects row {}", id)));
            }
            Ok(id)
        }

        async fn subject_code_exists(&self, school_id: &str, code: &str) -> Result<bool, StoreError> {
            self.inner.subject_code_exists(school_id, code).await
        }

        async fn insert_class_subject(&self, link: ClassSubjectLink<'_>) -> Result<(), StoreError> {
            if let Some(failing) = self.faults.failing_link {
                let subjects = self.inner.list_subjects(link.school_id).await?;
                if subjects.iter().any(|s| s.id == link.subject_id && s.name == failing) {
                    return Err(backend("foreign key mismatch"));
                }
            }
            self.inner.insert_class_subject(link).await
        }

        async fn list_classes(&self, school_id: &str) -> Result<Vec<Class>, StoreError> {
            self.inner.list_classes(school_id).await
        }

        async fn list_subjects(&self, school_id: &str) -> Result<Vec<Subject>, StoreError> {
            self.inner.list_subjects(school_id).await
        }

        async fn list_class_subjects(
            &self,
            school_id: &str,
        ) -> Result<Vec<ClassSubjectRow>, StoreError> {
            self.inner.list_class_subjects(school_id).await
        }
    }

    fn strict() -> ImportOptions {
        ImportOptions {
            subject_failures: SubjectFailurePolicy::Strict,
            ..ImportOptions::default()
        }
    }

    #[tokio::test]
    async fn single_row_provisions_class_subjects_and_links() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = vec![json!({ "class": "1A", "level": "Primary", "subjects": "Math, English" })];

        let result = import_class_subjects(&store, "school-1", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 0));
        assert!(result.errors.is_empty());

        let classes = store.list_classes("school-1").await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "1A");
        assert_eq!((classes[0].grade, classes[0].section.as_str()), (1, "A"));
        assert_eq!(classes[0].education_level, "Primary");

        let subjects: Vec<String> =
            store.list_subjects("school-1").await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(subjects, vec!["Math", "English"]);

        let links = store.list_class_subjects("school-1").await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.class_id == classes[0].id));
    }

    #[tokio::test]
    async fn malformed_class_fails_row_without_creating_anything() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = vec![json!({ "class": "X9", "level": "Secondary", "subject": "Biology" })];

        let result = import_class_subjects(&store, "school-1", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (0, 1));
        assert_eq!(result.errors[0].row, 1);
        assert_eq!(result.errors[0].data, rows[0]);
        assert!(result.errors[0].errors[0].contains("Invalid class format"));
        assert!(store.list_classes("school-1").await.unwrap().is_empty());
        assert!(store.list_subjects("school-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reimporting_the_same_batch_changes_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = vec![
            json!({ "class": "6A", "level": "Primary", "subjects": "Math, Science" }),
            json!({ "class": "6B", "level": "Primary", "subject": "Math" }),
        ];

        let first = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;
        let classes = store.list_classes("s").await.unwrap();
        let subjects = store.list_subjects("s").await.unwrap();
        let links = store.list_class_subjects("s").await.unwrap();

        let second = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((first.success, first.failed), (2, 0));
        assert_eq!((second.success, second.failed), (2, 0));
        assert!(second.warnings.is_empty());
        assert_eq!(store.list_classes("s").await.unwrap(), classes);
        assert_eq!(store.list_subjects("s").await.unwrap(), subjects);
        assert_eq!(store.list_class_subjects("s").await.unwrap(), links);
        assert_eq!(links.len(), 3);
    }

    #[tokio::test]
    async fn repeated_names_are_created_once_per_batch() {
        let store = CountingStore::new(None);
        let rows = vec![
            json!({ "class": "6A", "level": "Primary", "subject": "Math" }),
            json!({ "class": "6A", "level": "Primary", "subjects": "Math, Art" }),
        ];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!(result.success, 2);
        assert_eq!(store.class_inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.subject_inserts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bad_rows_do_not_stop_the_batch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = vec![
            json!({}),
            json!({ "class": "A6", "level": "Primary", "subject": "Art" }),
            json!({ "class": "2C", "level": "Primary", "subject": "Art" }),
        ];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 2));
        let failed_rows: Vec<usize> = result.errors.iter().map(|e| e.row).collect();
        assert_eq!(failed_rows, vec![1, 2]);
        assert_eq!(result.errors[0].errors.len(), 3);
    }

    #[tokio::test]
    async fn lenient_policy_keeps_row_and_reports_skipped_subject() {
        let store = CountingStore::new(Some("Latin"));
        let rows = vec![json!({ "class": "4D", "level": "Primary", "subjects": "Latin, Greek" })];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 0));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].subject, "Latin");
        assert!(result.warnings[0].message.contains("disk full"));
        assert_eq!(store.list_class_subjects("s").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn strict_policy_fails_row_with_skipped_subject() {
        let store = CountingStore::new(Some("Latin"));
        let rows = vec![json!({ "class": "4D", "level": "Primary", "subjects": "Latin, Greek" })];

        let result = import_class_subjects(&store, "s", &rows, strict()).await;

        assert_eq!((result.success, result.failed), (0, 1));
        assert!(result.errors[0].errors[0].contains("Latin"));
        // Greek is still provisioned; the policy only decides how the row counts.
        assert_eq!(store.list_class_subjects("s").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn class_storage_failure_fails_the_row() {
        let store = CountingStore::with_faults(Faults {
            failing_class: Some("7A"),
            ..Faults::default()
        });
        let rows = vec![
            json!({ "class": "7A", "level": "Secondary", "subject": "Physics" }),
            json!({ "class": "7B", "level": "Secondary", "subject": "Physics" }),
        ];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 1));
        assert_eq!(result.errors[0].row, 1);
        let message = &result.errors[0].errors[0];
        assert!(message.contains("Failed to create class \"7A\""), "{message}");
        assert!(message.contains("disk full"), "{message}");
        assert!(store.find_class("s", "7A").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_conflicts_reuse_the_stored_rows() {
        let store = CountingStore::with_faults(Faults {
            racing_inserts: true,
            ..Faults::default()
        });
        let rows = vec![json!({ "class": "8C", "level": "Secondary", "subjects": "Chemistry, Drama" })];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 0));
        assert!(result.warnings.is_empty());
        assert_eq!(store.class_inserts.load(Ordering::SeqCst), 1);
        assert_eq!(store.subject_inserts.load(Ordering::SeqCst), 2);

        let classes = store.list_classes("s").await.unwrap();
        assert_eq!(classes.len(), 1);
        let subjects = store.list_subjects("s").await.unwrap();
        assert_eq!(subjects.len(), 2);
        let links = store.list_class_subjects("s").await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.class_id == classes[0].id));
        assert!(subjects.iter().all(|s| links.iter().any(|l| l.subject_id == s.id)));
    }

    #[tokio::test]
    async fn link_failure_is_a_warning_when_lenient() {
        let store = CountingStore::with_faults(Faults {
            failing_link: Some("Music"),
            ..Faults::default()
        });
        let rows = vec![json!({ "class": "5E", "level": "Primary", "subjects": "Music, Art" })];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 0));
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].row, 1);
        assert_eq!(result.warnings[0].subject, "Music");
        assert!(result.warnings[0].message.contains("Failed to link subject \"Music\""));
        assert_eq!(store.list_class_subjects("s").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn link_failure_fails_the_row_when_strict() {
        let store = CountingStore::with_faults(Faults {
            failing_link: Some("Music"),
            ..Faults::default()
        });
        let rows = vec![json!({ "class": "5E", "level": "Primary", "subjects": "Music, Art" })];

        let result = import_class_subjects(&store, "s", &rows, strict()).await;

        assert_eq!((result.success, result.failed), (0, 1));
        assert!(result.warnings.is_empty());
        assert_eq!(result.errors[0].errors.len(), 1);
        assert!(result.errors[0].errors[0].contains("foreign key mismatch"));
    }

    #[tokio::test]
    async fn lookup_failures_are_not_reported_as_creation_failures() {
        let store = CountingStore::with_faults(Faults {
            failing_lookup: Some("9A"),
            ..Faults::default()
        });
        let rows = vec![json!({ "class": "9A", "level": "Secondary", "subject": "Art" })];

        let result = import_class_subjects(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!(result.failed, 1);
        let message = &result.errors[0].errors[0];
        assert!(message.starts_with("Failed to look up class \"9A\""), "{message}");
        assert_eq!(store.class_inserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn numbered_rows_keep_their_numbers() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rows = vec![
            (2, json!({ "class": "1A", "level": "Primary", "subject": "Math" })),
            (7, json!({ "class": "Z", "level": "Primary", "subject": "Math" })),
        ];

        let result = import_numbered_rows(&store, "s", &rows, ImportOptions::default()).await;

        assert_eq!((result.success, result.failed), (1, 1));
        assert_eq!(result.errors[0].row, 7);
    }
}
