//! Export adapters

mod fs;

pub use fs::{numbered_name, FsExporter};
