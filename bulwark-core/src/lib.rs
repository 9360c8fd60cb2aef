// Core library for Bulwark
// Request/response types, the middleware pipeline and logging setup shared by all guards

pub mod error;
pub mod extensions;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod session;

// Re-export commonly used types
pub use crate::error::*;
pub use crate::extensions::Extensions;
pub use crate::http::*;
pub use crate::middleware::*;
pub use crate::session::*;
