//! Document editing: the `.ndz` codec and file state

pub mod document;
pub mod file_manager;

pub use document::{rename_node_packs, Document};
pub use file_manager::FileManager;
