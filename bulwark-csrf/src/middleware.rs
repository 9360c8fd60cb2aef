use crate::clock::{Clock, SystemClock};
use crate::config::CsrfConfig;
use crate::cookie::set_cookie;
use crate::error::{ERROR_MESSAGE, Result, VerifyError};
use crate::policy::{self, MethodClass};
use crate::token::{CsrfToken, TokenSigner};
use async_trait::async_trait;
use bulwark_core::{Error, HttpRequest, HttpResponse, Middleware, Next};
use http::header::{CONTENT_TYPE, SET_COOKIE};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use subtle::ConstantTimeEq;
use tracing::{debug, trace, warn};

/// What the guard does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Path is excluded from protection
    Skip,
    /// Forward with the verified cookie token attached
    Pass(CsrfToken),
    /// Forward and attach this fresh token as a cookie
    Issue(CsrfToken),
    /// Answer 403 without calling the rest of the pipeline
    Reject(VerifyError),
}

/// Double-submit-cookie CSRF guard.
///
/// Safe requests without a valid cookie token get one. Mutating requests
/// must carry a valid cookie token and echo it byte for byte in the
/// configured header or body field.
#[derive(Clone)]
pub struct CsrfGuard {
    config: Arc<CsrfConfig>,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
    nagged: Arc<AtomicBool>,
}

impl CsrfGuard {
    pub fn new(config: CsrfConfig) -> Result<Self> {
        let signer = TokenSigner::new(config.secret())?;

        Ok(Self {
            config: Arc::new(config),
            signer,
            clock: Arc::new(SystemClock),
            nagged: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the wall clock, e.g. with a [`FixedClock`](crate::FixedClock)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Issue a fresh token outside the pipeline.
    ///
    /// Handlers behind the guard should embed [`request_token`] instead, which
    /// matches the cookie the browser holds.
    pub fn issue_token(&self) -> CsrfToken {
        self.signer.issue(self.clock.now_millis())
    }

    /// Verify a serialized token against this guard's secret and timeout
    pub fn verify_token(&self, token: &str) -> std::result::Result<CsrfToken, VerifyError> {
        self.signer
            .verify(token, self.clock.now_millis(), self.config.timeout())
    }

    /// `Set-Cookie` value for `token`
    pub fn cookie_for(&self, token: &CsrfToken, secure: bool) -> String {
        set_cookie(&self.config, token.as_str(), secure)
    }

    /// Decide how to treat `request` without touching it
    pub fn decide(&self, request: &HttpRequest) -> Decision {
        if policy::is_excluded(&request.path, self.config.exclude_paths()) {
            return Decision::Skip;
        }

        match MethodClass::of(&request.method) {
            MethodClass::Safe => match request.cookie(self.config.cookie_name()) {
                Some(cookie) => match self.verify_token(cookie) {
                    Ok(token) => Decision::Pass(token),
                    Err(_) => Decision::Issue(self.issue_token()),
                },
                None => Decision::Issue(self.issue_token()),
            },
            MethodClass::Mutating => match self.check_submitted(request) {
                Ok(token) => Decision::Pass(token),
                Err(kind) => Decision::Reject(kind),
            },
        }
    }

    /// Check a request the way a mutating request is checked, regardless of
    /// its method.
    ///
    /// Converts into a 403 [`Error`] with `?` inside handlers.
    pub fn validate_request(&self, request: &HttpRequest) -> std::result::Result<(), VerifyError> {
        if policy::is_excluded(&request.path, self.config.exclude_paths()) {
            return Ok(());
        }
        self.check_submitted(request).map(|_| ())
    }

    fn check_submitted(&self, request: &HttpRequest) -> std::result::Result<CsrfToken, VerifyError> {
        let cookie = request
            .cookie(self.config.cookie_name())
            .filter(|c| !c.is_empty())
            .ok_or(VerifyError::Missing)?;

        let submitted = policy::submitted_token(
            request,
            self.config.header_name(),
            self.config.field_name(),
        )
        .ok_or(VerifyError::Missing)?;

        let token = self.verify_token(cookie)?;

        if !bool::from(cookie.as_bytes().ct_eq(submitted.as_bytes())) {
            // Report a broken submitted token as such rather than as a mismatch
            self.verify_token(&submitted)?;
            return Err(VerifyError::Mismatch);
        }

        Ok(token)
    }

    /// The 403 response sent on any validation failure
    pub fn rejection_response(&self) -> HttpResponse {
        match self.config.response_body() {
            Some(body) => HttpResponse::forbidden()
                .with_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")
                .with_body(body.to_string()),
            None => HttpResponse::forbidden(),
        }
    }

    /// HTTPS as far as this guard is concerned; the forwarded header only
    /// counts when the proxy is trusted
    pub fn is_https(&self, request: &HttpRequest) -> bool {
        if self.config.trust_proxy() {
            request.is_https()
        } else {
            request.secure
        }
    }

    fn nag_if_insecure(&self, request: &HttpRequest) {
        if !self.config.nag_https() || self.is_https(request) {
            return;
        }
        if !self.nagged.swap(true, Ordering::Relaxed) {
            warn!(
                path = %request.path,
                "CSRF tokens are being issued over plain HTTP; use HTTPS so the token cookie can be marked Secure"
            );
        }
    }
}

/// Token the guard attached to `request`.
///
/// Set for every request the guard forwards, except on excluded paths. It is
/// the freshly issued token when the response carries a new cookie, otherwise
/// the verified cookie token. Embed it in rendered forms so the body field
/// echoes the cookie.
pub fn request_token(request: &HttpRequest) -> Option<&CsrfToken> {
    request.extensions.get::<CsrfToken>()
}

impl std::fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for CsrfGuard {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> std::result::Result<HttpResponse, Error> {
        match self.decide(&req) {
            Decision::Skip => next(req).await,
            Decision::Pass(token) => {
                trace!(method = %req.method, path = %req.path, "CSRF check passed");
                req.extensions.insert(token);
                next(req).await
            }
            Decision::Issue(token) => {
                self.nag_if_insecure(&req);
                let cookie = self.cookie_for(&token, self.is_https(&req));
                req.extensions.insert(token);

                let mut response = next(req).await?;
                response.append_header(SET_COOKIE.as_str(), &cookie);
                Ok(response)
            }
            Decision::Reject(kind) => {
                debug!(
                    method = %req.method,
                    path = %req.path,
                    reason = %kind,
                    "{}",
                    ERROR_MESSAGE
                );
                Ok(self.rejection_response())
            }
        }
    }
}
