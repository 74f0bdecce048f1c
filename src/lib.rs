//! Root system architecture model.
//!
//! Layers, innermost first:
//! - [`domain`]: node chains, roots and the root forest
//! - [`parser`]: RSML documents into a forest
//! - [`application`]: statistics and the analysis service
//! - [`infrastructure`]: filesystem, convex hull and service wiring
//! - [`cli`]: command line front end

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod parser;
pub mod tree_traits;
pub mod util;
