use crate::error::{CsrfError, Result};
use bulwark_core::{DEFAULT_SESSION_TIMEOUT, SessionSettings};
use http::HeaderName;
use std::fmt;
use std::time::Duration;

/// Cookie name expected by AngularJS and friends
pub const DEFAULT_COOKIE_NAME: &str = "XSRF-TOKEN";

pub const DEFAULT_COOKIE_PATH: &str = "/";

/// Header name expected by AngularJS and friends
pub const DEFAULT_HEADER_NAME: &str = "X-XSRF-TOKEN";

/// Rejections carry no body unless one is configured
pub const DEFAULT_RESPONSE_BODY: Option<&str> = None;

/// Token lifetime when neither a timeout nor session settings are given
pub const DEFAULT_TIMEOUT: Duration = DEFAULT_SESSION_TIMEOUT;

/// Minimum secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

const ENV_PREFIX: &str = "BULWARK_CSRF_";

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// CSRF protection configuration.
///
/// Built once through [`CsrfConfig::builder`] and read-only afterwards.
#[derive(Clone)]
pub struct CsrfConfig {
    secret: Vec<u8>,
    cookie_name: String,
    cookie_path: String,
    cookie_domain: Option<String>,
    same_site: Option<SameSite>,
    header_name: String,
    field_name: String,
    response_body: Option<String>,
    timeout: Duration,
    nag_https: bool,
    trust_proxy: bool,
    exclude_paths: Vec<String>,
}

impl CsrfConfig {
    /// Start a configuration for the given signing secret
    pub fn builder(secret: impl Into<Vec<u8>>) -> CsrfConfigBuilder {
        CsrfConfigBuilder::new(secret.into())
    }

    /// Configuration with every default and the given secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        Self::builder(secret).build()
    }

    /// Generate a random 32-byte secret
    pub fn generate_secret() -> Vec<u8> {
        use rand::RngCore;
        let mut secret = vec![0u8; MIN_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        secret
    }

    /// Load from `BULWARK_CSRF_*` environment variables, reading `.env` first
    /// when one exists.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `BULWARK_CSRF_SECRET` | signing secret (required) |
    /// | `BULWARK_CSRF_COOKIE_NAME` | cookie name |
    /// | `BULWARK_CSRF_COOKIE_PATH` | cookie path |
    /// | `BULWARK_CSRF_COOKIE_DOMAIN` | cookie domain |
    /// | `BULWARK_CSRF_SAME_SITE` | `strict`, `lax`, `none` or `off` |
    /// | `BULWARK_CSRF_HEADER_NAME` | header name |
    /// | `BULWARK_CSRF_FIELD_NAME` | form/JSON field name |
    /// | `BULWARK_CSRF_RESPONSE_BODY` | body sent on rejection |
    /// | `BULWARK_CSRF_TIMEOUT_SECS` | token lifetime in seconds |
    /// | `BULWARK_CSRF_NAG_HTTPS` | `true`/`false` |
    /// | `BULWARK_CSRF_TRUST_PROXY` | `true`/`false` |
    /// | `BULWARK_CSRF_EXCLUDE_PATHS` | comma-separated path prefixes |
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup using the same keys as
    /// [`from_env`](Self::from_env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        let secret = var("SECRET").ok_or(CsrfError::MissingSecret)?;
        let mut builder = Self::builder(secret);

        if let Some(name) = var("COOKIE_NAME") {
            builder = builder.cookie_name(name);
        }
        if let Some(path) = var("COOKIE_PATH") {
            builder = builder.cookie_path(path);
        }
        if let Some(domain) = var("COOKIE_DOMAIN") {
            builder = builder.cookie_domain(domain);
        }
        if let Some(same_site) = var("SAME_SITE") {
            let parsed = if same_site.eq_ignore_ascii_case("off") {
                None
            } else {
                Some(SameSite::parse(&same_site).ok_or_else(|| {
                    CsrfError::InvalidConfig(format!("unknown SameSite value '{}'", same_site))
                })?)
            };
            builder = builder.same_site(parsed);
        }
        if let Some(name) = var("HEADER_NAME") {
            builder = builder.header_name(name);
        }
        if let Some(name) = var("FIELD_NAME") {
            builder = builder.field_name(name);
        }
        if let Some(body) = var("RESPONSE_BODY") {
            builder = builder.response_body(body);
        }
        if let Some(secs) = var("TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                CsrfError::InvalidConfig(format!("timeout '{}' is not a number of seconds", secs))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(nag) = var("NAG_HTTPS") {
            builder = builder.nag_https(parse_bool(&nag).ok_or_else(|| {
                CsrfError::InvalidConfig(format!("'{}' is not a boolean", nag))
            })?);
        }
        if let Some(trust) = var("TRUST_PROXY") {
            builder = builder.trust_proxy(parse_bool(&trust).ok_or_else(|| {
                CsrfError::InvalidConfig(format!("'{}' is not a boolean", trust))
            })?);
        }
        if let Some(paths) = var("EXCLUDE_PATHS") {
            for path in paths.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                builder = builder.exclude_path(path);
            }
        }

        builder.build()
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn cookie_path(&self) -> &str {
        &self.cookie_path
    }

    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    pub fn same_site(&self) -> Option<SameSite> {
        self.same_site
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Form or JSON body field checked when the header is absent
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Body of the 403 response; `None` means an empty body
    pub fn response_body(&self) -> Option<&str> {
        self.response_body.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether to warn when tokens are issued over plain HTTP
    pub fn nag_https(&self) -> bool {
        self.nag_https
    }

    /// Whether `X-Forwarded-Proto: https` counts as HTTPS
    pub fn trust_proxy(&self) -> bool {
        self.trust_proxy
    }

    pub fn exclude_paths(&self) -> &[String] {
        &self.exclude_paths
    }
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("secret", &"[redacted]")
            .field("cookie_name", &self.cookie_name)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_domain", &self.cookie_domain)
            .field("same_site", &self.same_site)
            .field("header_name", &self.header_name)
            .field("field_name", &self.field_name)
            .field("response_body", &self.response_body)
            .field("timeout", &self.timeout)
            .field("nag_https", &self.nag_https)
            .field("trust_proxy", &self.trust_proxy)
            .field("exclude_paths", &self.exclude_paths)
            .finish()
    }
}

/// Builder for [`CsrfConfig`]
#[derive(Clone)]
pub struct CsrfConfigBuilder {
    secret: Vec<u8>,
    cookie_name: String,
    cookie_path: String,
    cookie_domain: Option<String>,
    same_site: Option<SameSite>,
    header_name: String,
    field_name: Option<String>,
    response_body: Option<String>,
    timeout: Option<Duration>,
    session_timeout: Option<Duration>,
    nag_https: bool,
    trust_proxy: bool,
    exclude_paths: Vec<String>,
}

impl CsrfConfigBuilder {
    fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            cookie_domain: None,
            same_site: Some(SameSite::Strict),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            field_name: None,
            response_body: DEFAULT_RESPONSE_BODY.map(str::to_string),
            timeout: None,
            session_timeout: None,
            nag_https: true,
            trust_proxy: true,
            exclude_paths: Vec::new(),
        }
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the SameSite attribute; `None` omits it
    pub fn same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Body field name; defaults to the header name
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    /// Send rejections with an empty body
    pub fn no_response_body(mut self) -> Self {
        self.response_body = None;
        self
    }

    /// Token lifetime; takes precedence over session settings
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Take the token lifetime from the session layer unless
    /// [`timeout`](Self::timeout) is set
    pub fn session(mut self, session: &SessionSettings) -> Self {
        self.session_timeout = Some(session.timeout);
        self
    }

    pub fn nag_https(mut self, nag: bool) -> Self {
        self.nag_https = nag;
        self
    }

    /// Honor `X-Forwarded-Proto` when deciding whether a request is HTTPS.
    ///
    /// Only enable this behind a proxy that overwrites the header.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    /// Skip protection for `prefix` and every path below it
    pub fn exclude_path(mut self, prefix: impl Into<String>) -> Self {
        self.exclude_paths.push(prefix.into());
        self
    }

    pub fn exclude_paths(mut self, prefixes: Vec<String>) -> Self {
        self.exclude_paths = prefixes;
        self
    }

    pub fn build(self) -> Result<CsrfConfig> {
        if self.secret.is_empty() {
            return Err(CsrfError::MissingSecret);
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(CsrfError::WeakSecret {
                len: self.secret.len(),
                min: MIN_SECRET_LEN,
            });
        }

        if !is_cookie_name(&self.cookie_name) {
            return Err(CsrfError::InvalidConfig(format!(
                "invalid cookie name '{}'",
                self.cookie_name
            )));
        }
        if !self.cookie_path.starts_with('/') || !is_cookie_attr(&self.cookie_path) {
            return Err(CsrfError::InvalidConfig(format!(
                "cookie path '{}' must be absolute",
                self.cookie_path
            )));
        }
        if let Some(domain) = &self.cookie_domain {
            if domain.is_empty() || !is_cookie_attr(domain) {
                return Err(CsrfError::InvalidConfig(format!(
                    "invalid cookie domain '{}'",
                    domain
                )));
            }
        }
        if HeaderName::from_bytes(self.header_name.as_bytes()).is_err() {
            return Err(CsrfError::InvalidConfig(format!(
                "invalid header name '{}'",
                self.header_name
            )));
        }

        let field_name = self.field_name.unwrap_or_else(|| self.header_name.clone());
        if field_name.is_empty() {
            return Err(CsrfError::InvalidConfig("empty field name".to_string()));
        }

        let timeout = self
            .timeout
            .or(self.session_timeout)
            .unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(CsrfError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        Ok(CsrfConfig {
            secret: self.secret,
            cookie_name: self.cookie_name,
            cookie_path: self.cookie_path,
            cookie_domain: self.cookie_domain,
            same_site: self.same_site,
            header_name: self.header_name,
            field_name,
            response_body: self.response_body,
            timeout,
            nag_https: self.nag_https,
            trust_proxy: self.trust_proxy,
            exclude_paths: self.exclude_paths,
        })
    }
}

impl fmt::Debug for CsrfConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfigBuilder")
            .field("secret", &"[redacted]")
            .field("cookie_name", &self.cookie_name)
            .field("header_name", &self.header_name)
            .finish_non_exhaustive()
    }
}

// RFC 6265 cookie-name: a token
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

fn is_cookie_attr(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_graphic() && b != b';')
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
