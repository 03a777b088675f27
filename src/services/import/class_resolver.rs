use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{ResolutionContext, ResolveError};
use crate::models::{ClassId, NewClass};
use crate::services::store::ClassSubjectStore;

static CLASS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)-?([A-Za-z])$").expect("class name pattern is valid"));

/// Splits "6A" / "6-A" into grade and upper-cased section.
pub fn parse_class_name(name: &str) -> Option<(i64, String)> {
    let caps = CLASS_NAME.captures(name.trim())?;
    let grade = caps[1].parse::<i64>().ok()?;
    Some((grade, caps[2].to_ascii_uppercase()))
}

pub async fn resolve_class(
    store: &dyn ClassSubjectStore,
    ctx: &mut ResolutionContext,
    name: &str,
    level: &str,
) -> Result<ClassId, ResolveError> {
    if let Some(id) = ctx.cached_class(name) {
        debug!("Class {} served from batch cache", name);
        return Ok(id);
    }

    let lookup = |source| ResolveError::Lookup {
        entity: "class",
        name: name.to_string(),
        source,
    };
    let storage = |source| ResolveError::ClassStorage {
        name: name.to_string(),
        source,
    };

    if let Some(existing) = store.find_class(&ctx.school_id, name).await.map_err(lookup)? {
        debug!("Reusing existing class {} ({})", name, existing.id);
        ctx.remember_class(name, existing.id);
        return Ok(existing.id);
    }

    let (grade, section) =
        parse_class_name(name).ok_or_else(|| ResolveError::MalformedClassName(name.to_string()))?;

    let new_class = NewClass {
        school_id: ctx.school_id.clone(),
        name: name.to_string(),
        grade,
        section,
        education_level: level.to_string(),
    };

    let id = match store.insert_class(new_class).await {
        Ok(id) => {
            info!("Created class {} (grade {}) for school {}", name, grade, ctx.school_id);
            id
        }
        Err(e) if e.is_conflict() => {
            warn!("Class {} was created concurrently, reusing it", name);
            store
                .find_class(&ctx.school_id, name)
                .await
                .map_err(lookup)?
                .map(|class| class.id)
                .ok_or_else(|| storage(e))?
        }
        Err(e) => return Err(storage(e)),
    };

    ctx.remember_class(name, id);
    Ok(id)
}
