//! LLM backend implementations

pub mod cloud;
pub mod local;

// Re-export for convenience
pub use cloud::CloudClient;
pub use local::LocalClient;
