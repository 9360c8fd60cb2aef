// Bulwark - request guards for Rust HTTP pipelines
//
// Re-exports the pipeline core and the guards enabled through features.

pub use bulwark_core::*;

#[cfg(feature = "csrf")]
pub use bulwark_csrf as csrf;

/// Prelude for common imports.
///
/// ```
/// use bulwark::prelude::*;
///
/// let guard = CsrfGuard::new(CsrfConfig::new(CsrfConfig::generate_secret()).unwrap()).unwrap();
/// let _chain = MiddlewareChain::new().with(guard);
/// ```
pub mod prelude {
    pub use bulwark_core::{
        Error, HandlerFn, HttpRequest, HttpResponse, Middleware, MiddlewareChain, Next,
        SessionSettings, handler,
    };

    #[cfg(feature = "csrf")]
    pub use bulwark_csrf::{CsrfConfig, CsrfGuard, CsrfToken, VerifyError, request_token};
}
