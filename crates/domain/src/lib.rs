pub mod config;
pub mod error;
pub mod redact;
pub mod stream;
pub mod types;

pub use error::{Result, SarkError};
pub use redact::mask_secrets;
pub use stream::{BoxStream, StreamChunk, StreamEvent, Usage};
pub use types::*;
