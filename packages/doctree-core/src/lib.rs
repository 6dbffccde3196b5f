#![forbid(unsafe_code)]
//! Document-model engine for a structured-text editor: a schema-aware,
//! overlay-capable node store with document-order traversal, queries,
//! relational helpers, indent/outdent, drop-behavior resolution and range
//! serialization. Rendering, format conversion and schema authoring live
//! outside this crate and talk to it through the types exported here.

pub mod capabilities;
pub mod drop_behavior;
pub mod error;
pub mod ids;
mod indent;
pub mod iter;
pub mod node;
mod query;
pub mod range;
mod relations;
pub mod schema;
pub mod store;
pub mod visitor;

pub use capabilities::Capability;
pub use drop_behavior::{
    DragOrigin, DropAction, DropBehavior, DropBehaviorResolver, DropContext, DropRequest,
    DropRule, DropRuleRegistry, DropZone, Modifiers, RuleOptions,
};
pub use error::{Error, Result};
pub use ids::{IdAllocator, NodeId};
pub use iter::{DocumentIterator, RangeBound, TraversalOptions};
pub use node::{Attributes, Mark, Node, NodeFragment, NodeKind, NodeTree, TextRange};
pub use range::{Position, Selection};
pub use schema::{MemorySchema, NodeGroup, NodeTypeSpec, SchemaProvider, WILDCARD};
pub use store::{DocumentStore, Layer, Snapshot};
pub use visitor::{TraversalResult, Visitor};
