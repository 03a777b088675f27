use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

pub type ClassId = i64;
pub type SubjectId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Class {
    pub id: ClassId,
    pub school_id: String,
    pub name: String,
    pub grade: i64,
    pub section: String,
    pub education_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClass {
    pub school_id: String,
    pub name: String,
    pub grade: i64,
    pub section: String,
    pub education_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub school_id: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubject {
    pub school_id: String,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSubjectLink<'a> {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub school_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSubjectRow {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub school_id: String,
}

/// A validated spreadsheet line, ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub class: String,
    pub level: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub data: Value,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectWarning {
    pub row: usize,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub warnings: Vec<SubjectWarning>,
}

/// What happens to a row when some of its subjects could not be provisioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectFailurePolicy {
    /// The row still counts as imported; skipped subjects become warnings.
    #[default]
    Lenient,
    /// Any skipped subject fails the row.
    Strict,
}

/// Whether derived subject codes must be unique inside a school.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectCodePolicy {
    #[default]
    Cosmetic,
    Unique,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub subject_failures: SubjectFailurePolicy,
    pub subject_codes: SubjectCodePolicy,
}

impl FromStr for SubjectFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown subject failure policy '{}'", other)),
        }
    }
}

impl FromStr for SubjectCodePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosmetic" => Ok(Self::Cosmetic),
            "unique" => Ok(Self::Unique),
            other => Err(format!("unknown subject code policy '{}'", other)),
        }
    }
}
