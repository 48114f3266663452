pub mod compression;
pub mod errors;
pub mod config;

// Re-export commonly used items for easier testing
pub use compression::*;
pub use errors::*;
pub use config::*;
