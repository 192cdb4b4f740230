use crate::models::{ChangeEvent, OperationKind, METADATA_DIR};
use std::path::{Path, PathBuf};

/// Decides whether a filesystem event is a project-file write worth committing.
///
/// Only in-place content writes to files with the project extension pass.
/// Anything under the metadata directory is rejected so the coordinator's own
/// commits never feed back into the watcher.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    extension: String,
}

impl ChangeFilter {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: normalize_extension(extension.into()),
        }
    }

    pub fn accept(&self, event: &ChangeEvent) -> bool {
        event.kind == OperationKind::Write
            && self.has_project_extension(&event.path)
            && !self.is_metadata(&event.path)
    }

    fn has_project_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }

    fn is_metadata(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        relative
            .components()
            .any(|component| component.as_os_str() == METADATA_DIR)
    }
}

fn normalize_extension(extension: String) -> String {
    extension.trim_start_matches('.').to_string()
}
