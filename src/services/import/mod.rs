//! Bulk class/subject provisioning.
//!
//! Rows are validated, their class is resolved (found or created), then every
//! subject of the row is resolved and linked to the class. All lookups go
//! through a [`ResolutionContext`] so a name is created at most once per batch.

pub mod class_resolver;
pub mod context;
pub mod link_writer;
pub mod orchestrator;
pub mod subject_resolver;
pub mod validator;

use thiserror::Error;

use crate::error::StoreError;

pub use context::ResolutionContext;
pub use orchestrator::{import_class_subjects, import_numbered_rows};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid class format \"{0}\": expected a grade number followed by a section letter, e.g. 6A or 6-A")]
    MalformedClassName(String),
    #[error("Failed to look up {entity} \"{name}\": {source}")]
    Lookup {
        entity: &'static str,
        name: String,
        source: StoreError,
    },
    #[error("Failed to create class \"{name}\": {source}")]
    ClassStorage { name: String, source: StoreError },
    #[error("Failed to create subject \"{name}\": {source}")]
    SubjectStorage { name: String, source: StoreError },
    #[error("Failed to link subject \"{name}\": {source}")]
    Link { name: String, source: StoreError },
}
