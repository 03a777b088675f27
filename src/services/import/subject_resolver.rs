use tracing::{debug, info, warn};

use super::{ResolutionContext, ResolveError};
use crate::models::{NewSubject, SubjectCodePolicy, SubjectId};
use crate::services::store::ClassSubjectStore;

const CODE_LEN: usize = 4;
const FALLBACK_CODE: &str = "SUBJ";

/// Upper-cased letters of the name, first four. "Math" -> "MATH",
/// "English 2" -> "ENGL".
pub fn derive_subject_code(name: &str) -> String {
    let code: String = name
        .chars()
        .filter(|c| c.is_alphabetic())
        .flat_map(char::to_uppercase)
        .take(CODE_LEN)
        .collect();

    if code.is_empty() {
        FALLBACK_CODE.to_string()
    } else {
        code
    }
}

/// Smallest free code for the school: `base`, then `base2`, `base3`, ...
///
/// Best-effort only. Codes carry no storage constraint (cosmetic mode allows
/// duplicates), so two imports running at once can still pick the same code.
async fn unique_code(
    store: &dyn ClassSubjectStore,
    school_id: &str,
    base: String,
) -> Result<String, crate::error::StoreError> {
    if !store.subject_code_exists(school_id, &base).await? {
        return Ok(base);
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}{}", base, suffix);
        if !store.subject_code_exists(school_id, &candidate).await? {
            debug!("Subject code {} taken, using {}", base, candidate);
            return Ok(candidate);
        }
        suffix += 1;
    }
}

pub async fn resolve_subject(
    store: &dyn ClassSubjectStore,
    ctx: &mut ResolutionContext,
    name: &str,
) -> Result<SubjectId, ResolveError> {
    if let Some(id) = ctx.cached_subject(name) {
        debug!("Subject {} served from batch cache", name);
        return Ok(id);
    }

    let lookup = |source| ResolveError::Lookup {
        entity: "subject",
        name: name.to_string(),
        source,
    };
    let storage = |source| ResolveError::SubjectStorage {
        name: name.to_string(),
        source,
    };

    if let Some(existing) = store.find_subject(&ctx.school_id, name).await.map_err(lookup)? {
        debug!("Reusing existing subject {} ({})", name, existing.id);
        ctx.remember_subject(name, existing.id);
        return Ok(existing.id);
    }

    let mut code = derive_subject_code(name);
    if ctx.options.subject_codes == SubjectCodePolicy::Unique {
        code = unique_code(store, &ctx.school_id, code).await.map_err(lookup)?;
    }

    let new_subject = NewSubject {
        school_id: ctx.school_id.clone(),
        name: name.to_string(),
        code,
    };

    let id = match store.insert_subject(new_subject).await {
        Ok(id) => {
            info!("Created subject {} for school {}", name, ctx.school_id);
            id
        }
        Err(e) if e.is_conflict() => {
            warn!("Subject {} was created concurrently, reusing it", name);
            store
                .find_subject(&ctx.school_id, name)
                .await
                .map_err(lookup)?
                .map(|subject| subject.id)
                .ok_or_else(|| storage(e))?
        }
        Err(e) => return Err(storage(e)),
    };

    ctx.remember_subject(name, id);
    Ok(id)
}
