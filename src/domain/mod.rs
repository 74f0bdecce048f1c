//! Domain layer: node chains, roots and the root forest
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod forest;
pub mod geometry;
pub mod node;
pub mod root;
pub mod topology;

pub use error::{DomainError, DomainResult};
pub use forest::{ForestMetadata, RemovalPolicy, RootForest, RootIndex};
pub use geometry::{BoundingBox, HullProvider, Point};
pub use node::{BorderCrossing, Node, NodeChain, NodeIndex};
pub use root::{Insertion, Mark, MarkType, Root, RootKey};
