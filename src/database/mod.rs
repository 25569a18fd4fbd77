pub mod catalog;
pub mod registry;

pub use catalog::PgCatalog;
pub use registry::{ConnectionRegistry, ConnectionSource, SharedRegistry};
