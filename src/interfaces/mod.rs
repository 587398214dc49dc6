//! File formats at the edge of the CLI: JSON scenarios in, CSV payment logs
//! out.

pub mod csv;
pub mod json;
