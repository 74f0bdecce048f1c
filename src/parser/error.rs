//! Parser errors (wraps domain errors raised while resolving topology)

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::DomainError;

/// Every way reading a document can fail.
///
/// Whatever the variant, the forest that was being filled is left empty.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("unexpected document element <{found}>, expected <{expected}>")]
    UnexpectedRootElement { expected: String, found: String },

    #[error("<{element}> is missing {what}")]
    MissingValue { element: String, what: String },

    #[error("invalid number for {what}: {value:?}")]
    InvalidNumber { what: String, value: String },

    #[error("topology: {0}")]
    Topology(#[from] DomainError),
}

impl ParseError {
    pub(crate) fn missing(element: &str, what: &str) -> Self {
        Self::MissingValue {
            element: element.to_string(),
            what: what.to_string(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
