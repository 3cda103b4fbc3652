//! Nodezator core library
//!
//! Callable graphs: nodes wrapping Python-style callables, their
//! connections, execution, `.ndz` documents and Python export.

pub mod config;
pub mod constants;
pub mod context;
pub mod editor;
pub mod error;
pub mod export;
pub mod literal;
pub mod nodes;
pub mod plugins;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::AppContext;
pub use editor::{Document, FileManager};
pub use error::{ExecutionError, ExportError, FileError, GraphError, ValidationError};
pub use export::{export_graph, ExportOptions, PythonExporter};
pub use literal::{parse_literal, pformat, Value};
pub use nodes::{ExecutionEngine, ExecutionReport, NodeFactory, NodeGraph};
