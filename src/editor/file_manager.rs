//! File management for `.ndz` documents
//!
//! Tracks the current file and whether it has unsaved changes. Saving
//! writes the canonical document text; loading replaces the document only
//! when the whole file decodes.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::editor::document::Document;
use crate::error::FileError;
use crate::nodes::NodeFactory;

/// Manages file state for the open document
pub struct FileManager {
    /// Current file path (None if unsaved/new file)
    current_file_path: Option<PathBuf>,
    /// Whether the document has been modified since last save
    is_modified: bool,
}

impl FileManager {
    pub fn new() -> Self {
        Self {
            current_file_path: None,
            is_modified: false,
        }
    }

    pub fn current_file_path(&self) -> Option<&PathBuf> {
        self.current_file_path.as_ref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.is_modified
    }

    pub fn mark_modified(&mut self) {
        self.is_modified = true;
    }

    pub fn mark_saved(&mut self) {
        self.is_modified = false;
    }

    /// File name with a `*` suffix when modified
    pub fn get_file_display_name(&self) -> String {
        let name = match &self.current_file_path {
            Some(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            None => "Untitled".to_string(),
        };
        if self.is_modified {
            format!("{}*", name)
        } else {
            name
        }
    }

    /// Forget the current file
    pub fn new_file(&mut self) {
        self.current_file_path = None;
        self.is_modified = false;
    }

    /// Save a document to `file_path`, which becomes the current file
    pub fn save_to_file(&mut self, file_path: &Path, document: &Document) -> Result<(), FileError> {
        fs::write(file_path, document.to_text()).map_err(|source| FileError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;

        info!("Saved {}", file_path.display());
        self.current_file_path = Some(file_path.to_path_buf());
        self.is_modified = false;
        Ok(())
    }

    /// Load a document; the current file changes only on success
    pub fn load_from_file(
        &mut self,
        file_path: &Path,
        factory: &mut NodeFactory,
        palette_size: usize,
    ) -> Result<Document, FileError> {
        let text = fs::read_to_string(file_path).map_err(|source| FileError::Io {
            path: file_path.to_path_buf(),
            source,
        })?;
        let document = Document::parse(&text, factory, palette_size).map_err(|err| {
            warn!("Could not load {}: {}", file_path.display(), err);
            err
        })?;

        info!("Loaded {}", file_path.display());
        self.current_file_path = Some(file_path.to_path_buf());
        self.is_modified = false;
        Ok(document)
    }

    /// Save to the current file path
    pub fn save_file(&mut self, document: &Document) -> Result<(), FileError> {
        match self.current_file_path.clone() {
            Some(path) => self.save_to_file(&path, document),
            None => Err(FileError::NoPath),
        }
    }
}

impl Default for FileManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::nodes::{CallableRegistry, Node};
    use crate::plugins::NodePackRegistry;

    fn factory() -> NodeFactory {
        NodeFactory::new(CallableRegistry::with_defaults(), NodePackRegistry::with_search_dirs(Vec::new()))
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("graph.ndz");

        let mut document = Document::new(8);
        document.graph.insert_node(Node::operator(0, "a + b").unwrap()).unwrap();

        let mut manager = FileManager::new();
        assert_eq!(manager.save_file(&document).unwrap_err().to_string(), FileError::NoPath.to_string());
        manager.mark_modified();
        assert_eq!(manager.get_file_display_name(), "Untitled*");

        manager.save_to_file(&path, &document).unwrap();
        assert!(!manager.has_unsaved_changes());
        assert_eq!(manager.get_file_display_name(), "graph.ndz");

        let loaded = manager.load_from_file(&path, &mut factory(), 8).unwrap();
        assert_eq!(loaded.to_text(), document.to_text());
    }

    #[test]
    fn test_failed_load_keeps_current_file() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.ndz");
        let bad = temp.path().join("bad.ndz");
        fs::write(&bad, "{'nodes': [{'id': 0}]}").unwrap();

        let mut manager = FileManager::new();
        manager.save_to_file(&good, &Document::new(8)).unwrap();
        let err = manager.load_from_file(&bad, &mut factory(), 8).unwrap_err();
        assert!(matches!(err, FileError::Validation(ValidationError::MalformedDocument(_))));
        assert_eq!(manager.current_file_path(), Some(&good));

        let missing = temp.path().join("missing.ndz");
        assert!(matches!(
            manager.load_from_file(&missing, &mut factory(), 8),
            Err(FileError::Io { .. })
        ));
    }
}
