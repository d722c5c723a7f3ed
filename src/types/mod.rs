//! Core types used throughout the library.

pub mod message;
pub mod records;
pub mod request;
pub mod streaming;

// Re-export commonly used types
pub use message::*;
pub use records::*;
pub use request::*;
pub use streaming::*;
