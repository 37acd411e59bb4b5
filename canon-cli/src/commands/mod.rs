//! CLI command implementations.

pub mod check;
pub mod current;
pub mod drift;
pub mod migrate;
pub mod rollback;
pub mod sync;
pub mod validate;
pub mod version;
