//! Error taxonomy
//!
//! One enum per failure family: document/pack validation, graph integrity,
//! execution and Python export. Graph-integrity errors never leave the model
//! mutated.

use std::path::PathBuf;

use thiserror::Error;

use crate::literal::{CallError, LiteralError};
use crate::nodes::NodeId;

/// Raised while importing callables or loading a document
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid return annotation on '{callable}': {reason}")]
    InvalidReturnAnnotation { callable: String, reason: String },

    #[error("invalid widget annotation on parameter '{param}': {reason}")]
    InvalidWidgetAnnotation { param: String, reason: String },

    #[error("invalid node pack '{pack}': {reason}")]
    InvalidNodePack { pack: String, reason: String },

    #[error("node {node_id} references unknown callable {reference}")]
    UnknownCallableRef { node_id: NodeId, reference: String },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("node packs could not be found: {}", .0.join(", "))]
    MissingNodePacks(Vec<String>),

    #[error(transparent)]
    Literal(#[from] LiteralError),
}

/// Rejected graph mutation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node id {0} is already in use")]
    IdCollision(NodeId),

    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("socket {0} does not exist")]
    SocketNotFound(String),

    #[error("input socket {0} already has a parent")]
    AlreadyParented(String),

    #[error("connecting {parent} to {child} would introduce a cycle")]
    CycleIntroduced { parent: String, child: String },

    #[error("cannot connect node {0} to itself")]
    SameNodeConnection(NodeId),

    #[error("node {node_id} does not support mode '{mode}'")]
    ModeNotSupported { node_id: NodeId, mode: String },

    #[error("widget '{widget}' cannot hold {got}: expected {expected}")]
    InvalidWidgetValue {
        widget: String,
        expected: String,
        got: String,
    },

    #[error("invalid keyword '{keyword}' for parameter '{param}'")]
    InvalidKeyword { param: String, keyword: String },
}

/// Failure collected while running a graph
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("node {node_id} is missing input for: {}", .params.join(", "))]
    MissingInput { node_id: NodeId, params: Vec<String> },

    #[error("node {node_id} could not unpack subparameter {subparam} of '*{param}': {message}")]
    PositionalUnpackError {
        node_id: NodeId,
        param: String,
        subparam: usize,
        message: String,
    },

    #[error("node {node_id} could not unpack subparameter {subparam} of '**{param}': {message}")]
    KeywordUnpackError {
        node_id: NodeId,
        param: String,
        subparam: usize,
        message: String,
    },

    #[error("node {node_id} returned a value that cannot be split into its outputs: {message}")]
    SplitReturnError { node_id: NodeId, message: String },

    #[error("execution was cancelled")]
    Cancelled,

    #[error("node {0} is commented out")]
    Skipped(NodeId),

    #[error("node {node_id} raised {error}")]
    CallableFailed { node_id: NodeId, error: CallError },

    #[error("nodes are waiting on each other: {0:?}")]
    Deadlock(Vec<NodeId>),
}

impl ExecutionError {
    /// Node the error belongs to, when there is one
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            ExecutionError::MissingInput { node_id, .. }
            | ExecutionError::PositionalUnpackError { node_id, .. }
            | ExecutionError::KeywordUnpackError { node_id, .. }
            | ExecutionError::SplitReturnError { node_id, .. }
            | ExecutionError::CallableFailed { node_id, .. } => Some(*node_id),
            ExecutionError::Skipped(node_id) => Some(*node_id),
            ExecutionError::Cancelled | ExecutionError::Deadlock(_) => None,
        }
    }

    /// Whether the engine stops after this error
    pub fn aborts_run(&self) -> bool {
        !matches!(
            self,
            ExecutionError::MissingInput { .. } | ExecutionError::Skipped(_)
        )
    }
}

/// Failure while rendering a graph as Python source
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    #[error("node {node_id} cannot be exported: {reason}")]
    NonExportable { node_id: NodeId, reason: String },

    #[error("node {node_id} is missing input for: {}", .params.join(", "))]
    MissingInput { node_id: NodeId, params: Vec<String> },

    #[error("substitution template of node {node_id}: {message}")]
    Template { node_id: NodeId, message: String },

    #[error("graph contains a cycle through nodes {0:?}")]
    Cycle(Vec<NodeId>),
}

/// Errors surfaced by the document file manager
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no file path set; save to an explicit path first")]
    NoPath,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
