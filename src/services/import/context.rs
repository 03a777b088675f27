use std::collections::HashMap;

use crate::models::{ClassId, ImportOptions, SubjectId};

/// Per-batch resolution state: the name→id caches and the options the batch
/// runs with. Built once per import call and dropped with it.
#[derive(Debug)]
pub struct ResolutionContext {
    pub school_id: String,
    pub options: ImportOptions,
    classes: HashMap<String, ClassId>,
    subjects: HashMap<String, SubjectId>,
}

impl ResolutionContext {
    pub fn new(school_id: impl Into<String>, options: ImportOptions) -> Self {
        Self {
            school_id: school_id.into(),
            options,
            classes: HashMap::new(),
            subjects: HashMap::new(),
        }
    }

    pub fn cached_class(&self, name: &str) -> Option<ClassId> {
        self.classes.get(name).copied()
    }

    pub fn remember_class(&mut self, name: &str, id: ClassId) {
        self.classes.insert(name.to_string(), id);
    }

    pub fn cached_subject(&self, name: &str) -> Option<SubjectId> {
        self.subjects.get(name).copied()
    }

    pub fn remember_subject(&mut self, name: &str, id: SubjectId) {
        self.subjects.insert(name.to_string(), id);
    }
}
