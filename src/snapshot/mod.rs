//! The snapshot protocol: guard, write, manifest, fingerprint store.

pub mod archive;
pub mod error;
pub mod guard;
pub mod manifest;
pub mod media;
pub mod paths;
pub mod runner;
pub mod writer;

pub use paths::CategoryPaths;
pub use runner::{CategoryOutcome, CategoryRun};
