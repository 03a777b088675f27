use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    Class, ClassId, ClassSubjectLink, ClassSubjectRow, NewClass, NewSubject, Subject, SubjectId,
};

/// Storage collaborator for class/subject provisioning.
///
/// Lookups return at most one row. Inserts return the new id and report
/// unique-constraint violations as [`StoreError::Conflict`].
#[async_trait]
pub trait ClassSubjectStore: Send + Sync {
    async fn find_class(&self, school_id: &str, name: &str) -> Result<Option<Class>, StoreError>;

    async fn insert_class(&self, class: NewClass) -> Result<ClassId, StoreError>;

    async fn find_subject(&self, school_id: &str, name: &str)
        -> Result<Option<Subject>, StoreError>;

    async fn insert_subject(&self, subject: NewSubject) -> Result<SubjectId, StoreError>;

    async fn subject_code_exists(&self, school_id: &str, code: &str) -> Result<bool, StoreError>;

    async fn insert_class_subject(&self, link: ClassSubjectLink<'_>) -> Result<(), StoreError>;

    async fn list_classes(&self, school_id: &str) -> Result<Vec<Class>, StoreError>;

    async fn list_subjects(&self, school_id: &str) -> Result<Vec<Subject>, StoreError>;

    async fn list_class_subjects(&self, school_id: &str)
        -> Result<Vec<ClassSubjectRow>, StoreError>;
}
