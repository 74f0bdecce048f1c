//! RSML markup parsing into a [`crate::domain::RootForest`]

pub mod error;
pub mod rsml;
pub mod units;

pub use error::{ParseError, ParseResult};
pub use rsml::{ParseReport, ParseWarning, RsmlParser};
pub use units::{resolve_dpi, LengthUnit};
