//! Application context: the open document and everything needed to edit,
//! run and export it

use std::collections::BTreeMap;
use std::path::Path;

use log::{info, warn};

use crate::config::AppConfig;
use crate::editor::{rename_node_packs, Document, FileManager};
use crate::error::{ExportError, FileError, GraphError, ValidationError};
use crate::export::{export_graph, ExportOptions};
use crate::literal::parse_literal;
use crate::nodes::operations;
use crate::nodes::{ExecutionEngine, ExecutionReport, NodeFactory, NodeId, SelectedObj};
use crate::plugins::NodePackRegistry;

/// Owns the open document together with its callables and file state
pub struct AppContext {
    pub config: AppConfig,
    pub factory: NodeFactory,
    pub document: Document,
    pub file_manager: FileManager,
    pub engine: ExecutionEngine,
}

impl AppContext {
    /// Context with the default callables and the configured pack directories
    pub fn new(config: AppConfig) -> Self {
        let mut node_packs = NodePackRegistry::new();
        for dir in config.node_pack_dirs.iter().rev() {
            node_packs.add_search_dir(dir);
        }
        let factory = NodeFactory::new(crate::nodes::CallableRegistry::with_defaults(), node_packs);
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: AppConfig, factory: NodeFactory) -> Self {
        let document = Document::new(config.palette_size);
        Self {
            config,
            factory,
            document,
            file_manager: FileManager::new(),
            engine: ExecutionEngine::new(),
        }
    }

    /// Start over with an empty document
    pub fn new_document(&mut self) {
        self.document = Document::new(self.config.palette_size);
        self.file_manager.new_file();
    }

    /// Opens a document; on failure the current document is untouched
    pub fn open(&mut self, path: &Path) -> Result<(), FileError> {
        let document = self
            .file_manager
            .load_from_file(path, &mut self.factory, self.config.palette_size)?;
        self.document = document;
        Ok(())
    }

    /// Opens a document whose node packs moved, repointing each old
    /// identifier in `renames` before loading
    pub fn open_with_renames(&mut self, path: &Path, renames: &BTreeMap<String, String>) -> Result<(), FileError> {
        let text = std::fs::read_to_string(path).map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value = parse_literal(&text).map_err(|err| ValidationError::MalformedDocument(err.to_string()))?;
        let renamed = rename_node_packs(&value, renames);
        let document = Document::from_value(&renamed, &mut self.factory, self.config.palette_size)?;

        self.document = document;
        self.file_manager.new_file();
        // The renamed document differs from the file on disk
        self.file_manager.mark_modified();
        info!("Opened {} with {} renamed node packs", path.display(), renames.len());
        Ok(())
    }

    pub fn save(&mut self) -> Result<(), FileError> {
        self.file_manager.save_file(&self.document)
    }

    pub fn save_as(&mut self, path: &Path) -> Result<(), FileError> {
        self.file_manager.save_to_file(path, &self.document)
    }

    /// Executes the whole graph, or only `requested` and their ancestors
    pub fn run(&self, requested: Option<&[NodeId]>) -> ExecutionReport {
        self.engine.cancel_handle().reset();
        let report = self.engine.run(&self.document.graph, requested);
        if !report.is_success() {
            warn!("Execution finished with {} errors", report.errors.len());
        }
        report
    }

    /// Exports with the configured wrapping
    pub fn export(&self) -> Result<String, ExportError> {
        self.export_with(self.config.export_options())
    }

    pub fn export_with(&self, options: ExportOptions) -> Result<String, ExportError> {
        export_graph(&self.document.graph, options)
    }

    /// Duplicates the current selection by the configured offset
    pub fn duplicate_selection(&mut self) -> Result<Vec<SelectedObj>, GraphError> {
        let selection: Vec<SelectedObj> = self.document.graph.selected_objs().iter().copied().collect();
        if selection.is_empty() {
            return Ok(Vec::new());
        }
        let copies = operations::duplicate(&mut self.document.graph, &selection, self.config.duplicate_offset)?;
        self.file_manager.mark_modified();
        Ok(copies)
    }
}
