pub mod executor;
pub mod harness;
pub mod limits;
pub mod containment;
pub mod environment;

pub use executor::SandboxExecutor;
pub use environment::{ EnvironmentCheck, EnvironmentReport };
pub use limits::MEMORY_LIMIT_SUPPORTED;
pub use containment::namespaces_available;
