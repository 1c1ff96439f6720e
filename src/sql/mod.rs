//! Safe SQL builder: identifiers are quoted, values travel as parameters.

mod builder;
pub use builder::*;
