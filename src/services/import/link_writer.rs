use tracing::debug;

use crate::error::StoreError;
use crate::models::{ClassId, ClassSubjectLink, SubjectId};
use crate::services::store::ClassSubjectStore;

/// Associates a class with a subject. An existing link is success.
pub async fn link_class_subject(
    store: &dyn ClassSubjectStore,
    class_id: ClassId,
    subject_id: SubjectId,
    school_id: &str,
) -> Result<(), StoreError> {
    let link = ClassSubjectLink {
        class_id,
        subject_id,
        school_id,
    };

    match store.insert_class_subject(link).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_conflict() => {
            debug!("Class {} already linked to subject {}", class_id, subject_id);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
