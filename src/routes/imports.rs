use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    models::{Class, ImportOptions, ImportResult, SubjectCodePolicy, SubjectFailurePolicy},
    services::{
        excel,
        import::{import_class_subjects, import_numbered_rows},
    },
    AppState,
};

pub fn routes(max_body: usize) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/schools/:school_id/class-subjects/import", post(import_rows))
        .route("/schools/:school_id/class-subjects/import/xlsx", post(import_xlsx))
        .route("/schools/:school_id/class-subjects/import/url", post(import_from_url))
        .route("/schools/:school_id/classes", get(list_classes))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
}

/// Per-request overrides of the configured import policies.
#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    subject_failures: Option<SubjectFailurePolicy>,
    subject_codes: Option<SubjectCodePolicy>,
}

impl ImportQuery {
    fn apply(&self, defaults: ImportOptions) -> ImportOptions {
        ImportOptions {
            subject_failures: self.subject_failures.unwrap_or(defaults.subject_failures),
            subject_codes: self.subject_codes.unwrap_or(defaults.subject_codes),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "type")]
    file_type: String,
    signed_url: String,
}

#[derive(Debug, Serialize)]
pub struct ClassWithSubjects {
    #[serde(flatten)]
    class: Class,
    subjects: Vec<String>,
}

fn school_id(raw: String) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("School id is required".to_string()));
    }
    Ok(trimmed.to_string())
}

async fn run_import(
    state: &AppState,
    school_id: &str,
    rows: &[Value],
    query: &ImportQuery,
) -> Json<ImportResult> {
    let options = query.apply(state.config.import);
    Json(import_class_subjects(state.store.as_ref(), school_id, rows, options).await)
}

async fn run_workbook_import(
    state: &AppState,
    school_id: &str,
    records: &[(usize, Value)],
    query: &ImportQuery,
) -> Json<ImportResult> {
    let options = query.apply(state.config.import);
    Json(import_numbered_rows(state.store.as_ref(), school_id, records, options).await)
}

async fn import_rows(
    State(state): State<Arc<AppState>>,
    Path(school): Path<String>,
    Query(query): Query<ImportQuery>,
    Json(body): Json<Value>,
) -> Result<Json<ImportResult>, AppError> {
    let school_id = school_id(school)?;
    let rows = match body {
        Value::Array(rows) => rows,
        _ => return Err(AppError::InvalidInput("Expected a JSON array of rows".to_string())),
    };
    tracing::info!("Received {} rows for school {}", rows.len(), school_id);

    Ok(run_import(&state, &school_id, &rows, &query).await)
}

async fn import_xlsx(
    State(state): State<Arc<AppState>>,
    Path(school): Path<String>,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<Json<ImportResult>, AppError> {
    let school_id = school_id(school)?;
    if body.is_empty() {
        return Err(AppError::InvalidInput("No file provided".to_string()));
    }
    tracing::info!("Received {}KB workbook for school {}", body.len() / 1024, school_id);

    let records = excel::read_workbook(body)?;
    Ok(run_workbook_import(&state, &school_id, &records, &query).await)
}

async fn import_from_url(
    State(state): State<Arc<AppState>>,
    Path(school): Path<String>,
    Query(query): Query<ImportQuery>,
    Json(file_info): Json<FileInfo>,
) -> Result<Json<ImportResult>, AppError> {
    let school_id = school_id(school)?;
    if !excel::is_xlsx_type(&file_info.file_type) {
        tracing::error!("Unsupported file type: {}", file_info.file_type);
        return Err(AppError::InvalidInput("Only XLSX files are supported".to_string()));
    }

    let download_start = std::time::Instant::now();
    let file_data =
        excel::load_file_from_url(&file_info.signed_url, state.config.max_file_size).await?;
    tracing::info!(
        "File downloaded, size: {}KB, took: {:?}",
        file_data.len() / 1024,
        download_start.elapsed()
    );

    let records = excel::read_workbook(file_data)?;
    Ok(run_workbook_import(&state, &school_id, &records, &query).await)
}

async fn list_classes(
    State(state): State<Arc<AppState>>,
    Path(school): Path<String>,
) -> Result<Json<Vec<ClassWithSubjects>>, AppError> {
    let school_id = school_id(school)?;
    let classes = state.store.list_classes(&school_id).await?;
    let subject_names: HashMap<i64, String> = state
        .store
        .list_subjects(&school_id)
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();
    let links = state.store.list_class_subjects(&school_id).await?;

    let response = classes
        .into_iter()
        .map(|class| {
            let subjects = links
                .iter()
                .filter(|link| link.class_id == class.id)
                .filter_map(|link| subject_names.get(&link.subject_id).cloned())
                .collect();
            ClassWithSubjects { class, subjects }
        })
        .collect();

    Ok(Json(response))
}
