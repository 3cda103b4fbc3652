//! Node packs: user-authored callables grouped by category
//!
//! A node pack on disk is a directory of categories, each a directory of
//! scripts, each script a directory holding a `__main__.py` module. The
//! callable behind every script is registered here under the pack's name;
//! loading a document resolves its pack identifiers against those
//! registrations and, for paths, checks the directory layout matches.

pub mod palette;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::ValidationError;
use crate::nodes::factory::CallableDef;
use crate::nodes::node::ScriptId;

pub use palette::CategoryPalette;

/// Module file every script directory must contain
pub const SCRIPT_MODULE_FILE: &str = "__main__.py";

/// Callables of one node pack, by category then script
#[derive(Debug, Clone, Default)]
pub struct NodePack {
    pub name: String,
    categories: BTreeMap<String, BTreeMap<String, Arc<CallableDef>>>,
}

impl NodePack {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            categories: BTreeMap::new(),
        }
    }

    /// Builder form of [`NodePack::add_script`]
    pub fn with_script(mut self, category: &str, script: &str, def: CallableDef) -> Self {
        self.add_script(category, script, def);
        self
    }

    pub fn add_script(&mut self, category: &str, script: &str, def: CallableDef) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(script.to_string(), Arc::new(def));
    }

    pub fn script(&self, category: &str, script: &str) -> Option<Arc<CallableDef>> {
        self.categories.get(category)?.get(script).cloned()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Every script id of the pack, sorted
    pub fn script_ids(&self) -> Vec<ScriptId> {
        self.categories
            .iter()
            .flat_map(|(category, scripts)| {
                scripts
                    .keys()
                    .map(move |script| ScriptId::new(&self.name, category, script))
            })
            .collect()
    }
}

/// Registered node packs and the directories searched for them
pub struct NodePackRegistry {
    packs: HashMap<String, NodePack>,
    search_dirs: Vec<PathBuf>,
}

impl NodePackRegistry {
    /// Creates a registry searching the standard node-pack directories
    pub fn new() -> Self {
        let mut search_dirs = Vec::new();

        if let Some(home) = dirs::home_dir() {
            search_dirs.push(home.join(".nodezator/node_packs"));
        }
        search_dirs.push(PathBuf::from("./node_packs"));

        Self {
            packs: HashMap::new(),
            search_dirs,
        }
    }

    /// Creates a registry that searches only `search_dirs`
    pub fn with_search_dirs(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            packs: HashMap::new(),
            search_dirs,
        }
    }

    /// Add a directory to search for node packs
    pub fn add_search_dir<P: AsRef<Path>>(&mut self, path: P) {
        self.search_dirs.push(path.as_ref().to_path_buf());
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn register(&mut self, pack: NodePack) {
        info!("Registered node pack '{}'", pack.name);
        self.packs.insert(pack.name.clone(), pack);
    }

    pub fn pack(&self, name: &str) -> Option<&NodePack> {
        self.packs.get(name)
    }

    /// Callable behind a script id
    pub fn script(&self, script_id: &ScriptId) -> Option<Arc<CallableDef>> {
        self.packs
            .get(&script_id.pack)?
            .script(&script_id.category, &script_id.script)
    }

    /// Resolves every identifier to a pack name, failing with the full list
    /// of identifiers that could not be found
    pub fn resolve_all(&self, identifiers: &[String]) -> Result<Vec<String>, ValidationError> {
        let mut names = Vec::with_capacity(identifiers.len());
        let mut missing = Vec::new();
        for identifier in identifiers {
            match self.resolve(identifier)? {
                Some(name) => names.push(name),
                None => missing.push(identifier.clone()),
            }
        }
        if missing.is_empty() {
            Ok(names)
        } else {
            warn!("Missing node packs: {}", missing.join(", "));
            Err(ValidationError::MissingNodePacks(missing))
        }
    }

    /// Resolves a pack identifier: an installed pack name, or a directory
    /// (absolute, relative, or inside a search directory) whose final
    /// component names a registered pack. Directories are validated.
    pub fn resolve(&self, identifier: &str) -> Result<Option<String>, ValidationError> {
        let path = Path::new(identifier);
        let candidates = std::iter::once(path.to_path_buf())
            .chain(self.search_dirs.iter().map(|dir| dir.join(path)));
        for candidate in candidates {
            if !candidate.is_dir() {
                continue;
            }
            let Some(name) = candidate.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let Some(pack) = self.packs.get(name) else {
                continue;
            };
            validate_pack_dir(&candidate, pack)?;
            info!("Resolved node pack '{}' at {}", name, candidate.display());
            return Ok(Some(name.to_string()));
        }

        if self.packs.contains_key(identifier) {
            debug!("Resolved installed node pack '{}'", identifier);
            return Ok(Some(identifier.to_string()));
        }
        Ok(None)
    }
}

impl Default for NodePackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Hidden directories and bytecode caches are not categories or scripts
fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name == "__pycache__"
}

/// Subdirectories of `dir` that count as pack entries, sorted by name
fn entry_dirs(dir: &Path, pack: &str) -> Result<Vec<(String, PathBuf)>, ValidationError> {
    let io_error = |err: std::io::Error| ValidationError::InvalidNodePack {
        pack: pack.to_string(),
        reason: format!("cannot read {}: {}", dir.display(), err),
    };
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if is_ignored(name) {
            continue;
        }
        entries.push((name.to_string(), path));
    }
    entries.sort();
    Ok(entries)
}

/// Checks a pack directory against the registered implementation: every
/// script on disk holds its module file and has a registered callable
pub fn validate_pack_dir(dir: &Path, pack: &NodePack) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidNodePack {
        pack: pack.name.clone(),
        reason,
    };

    let categories = entry_dirs(dir, &pack.name)?;
    if categories.is_empty() {
        return Err(invalid("pack directory has no categories".to_string()));
    }
    for (category, category_dir) in categories {
        for (script, script_dir) in entry_dirs(&category_dir, &pack.name)? {
            if !script_dir.join(SCRIPT_MODULE_FILE).is_file() {
                return Err(invalid(format!(
                    "script {}/{} has no {}",
                    category, script, SCRIPT_MODULE_FILE
                )));
            }
            if pack.script(&category, &script).is_none() {
                return Err(invalid(format!(
                    "script {}/{} has no registered callable",
                    category, script
                )));
            }
            debug!("Validated script {}/{}/{}", pack.name, category, script);
        }
    }
    Ok(())
}
