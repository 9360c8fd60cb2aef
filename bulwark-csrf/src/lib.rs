//! # Bulwark CSRF Protection
//!
//! Double-submit-cookie Cross-Site Request Forgery protection for the
//! Bulwark pipeline.
//!
//! ## How it works
//!
//! - Safe requests (GET, HEAD, OPTIONS, TRACE) that arrive without a valid
//!   token cookie get a fresh one (`XSRF-TOKEN` by default).
//! - Mutating requests must send the same token back in a header
//!   (`X-XSRF-TOKEN` by default) or a form/JSON body field. Anything else is
//!   answered with 403 and the rest of the pipeline never runs.
//! - Every forwarded request carries the current token, readable with
//!   [`request_token`], so server-rendered forms can embed it.
//! - Tokens are HMAC-SHA256 signed and carry their issue time, so no server
//!   side storage is needed and any instance holding the secret can verify
//!   them.
//!
//! ## Quick Start
//!
//! ```rust
//! use bulwark_csrf::{CsrfConfig, CsrfGuard};
//! use std::time::Duration;
//!
//! let config = CsrfConfig::builder(CsrfConfig::generate_secret())
//!     .timeout(Duration::from_secs(3600))
//!     .build()
//!     .unwrap();
//!
//! let guard = CsrfGuard::new(config).unwrap();
//!
//! // Tokens are opaque, cookie-safe strings
//! let token = guard.issue_token();
//! assert!(guard.verify_token(token.as_str()).is_ok());
//! ```
//!
//! ## In a pipeline
//!
//! ```rust
//! use bulwark_core::{HttpRequest, HttpResponse, MiddlewareChain, handler};
//! use bulwark_csrf::{CsrfConfig, CsrfGuard};
//!
//! # tokio_test::block_on(async {
//! let guard = CsrfGuard::new(CsrfConfig::new(CsrfConfig::generate_secret()).unwrap()).unwrap();
//! let chain = MiddlewareChain::new().with(guard);
//! let app = handler(|_req| async { Ok(HttpResponse::ok()) });
//!
//! // A GET hands out the cookie...
//! let response = chain.apply(HttpRequest::get("/form"), app.clone()).await.unwrap();
//! assert!(response.header_values("set-cookie")[0].starts_with("XSRF-TOKEN="));
//!
//! // ...and a POST without it is refused
//! let response = chain.apply(HttpRequest::post("/submit"), app).await.unwrap();
//! assert_eq!(response.status, 403);
//! # });
//! ```

pub mod clock;
pub mod config;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod token;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    CsrfConfig, CsrfConfigBuilder, DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_PATH, DEFAULT_HEADER_NAME,
    DEFAULT_RESPONSE_BODY, DEFAULT_TIMEOUT, SameSite,
};
pub use error::{CsrfError, ERROR_MESSAGE, Result, VerifyError};
pub use middleware::{CsrfGuard, Decision, request_token};
pub use policy::MethodClass;
pub use token::{CsrfToken, TokenSigner};
