use thiserror::Error;

use crate::ids::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("nodes {0} and {1} do not share a common ancestor")]
    Disconnected(NodeId, NodeId),
    #[error("cycle detected at node {0}")]
    CycleDetected(NodeId),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("traverse requires at least one visitor")]
    NoVisitor,
    #[error("node id space exhausted")]
    IdSpaceExhausted,
}
