// Embedded Engine Module
// JDBC plumbing and the federation engine seam

pub mod datasource;
pub mod memory;
pub mod registry;
pub mod traits;

pub use datasource::JdbcUrlDataSource;
pub use memory::{InMemoryEngine, InMemoryEngineFactory, InMemoryEngineHandle};
pub use registry::{DriverManager, JdbcDriver};
pub use traits::{EmbeddedEngine, EngineFactory};
