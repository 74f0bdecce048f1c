//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::root::RootKey;

/// Domain errors represent violations of the forest's structural invariants.
/// These are independent of parsing and I/O concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("cannot attach root {0} to itself")]
    SelfAttachment(RootKey),

    #[error("cycle detected: root {child} is an ancestor of root {parent}")]
    Cycle { parent: RootKey, child: RootKey },

    #[error("root not found in forest: {0}")]
    UnknownRoot(String),

    #[error("duplicate root key: {0}")]
    DuplicateKey(RootKey),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
