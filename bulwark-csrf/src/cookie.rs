use crate::config::CsrfConfig;

/// `Set-Cookie` value carrying `token`.
///
/// Never `HttpOnly`: client script has to read the cookie to echo it back.
pub fn set_cookie(config: &CsrfConfig, token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path={}",
        config.cookie_name(),
        token,
        config.cookie_path()
    );

    if let Some(domain) = config.cookie_domain() {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }

    if secure {
        cookie.push_str("; Secure");
    }

    if let Some(same_site) = config.same_site() {
        cookie.push_str("; SameSite=");
        cookie.push_str(same_site.as_str());
    }

    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SameSite;

    const SECRET: &[u8] = b"test_secret_key_32_bytes_long!!!";

    #[test]
    fn test_default_cookie() {
        let config = CsrfConfig::new(SECRET).unwrap();
        assert_eq!(
            set_cookie(&config, "tok", false),
            "XSRF-TOKEN=tok; Path=/; SameSite=Strict"
        );
    }

    #[test]
    fn test_secure_with_domain() {
        let config = CsrfConfig::builder(SECRET)
            .cookie_name("_csrf")
            .cookie_path("/app")
            .cookie_domain("example.com")
            .same_site(Some(SameSite::Lax))
            .build()
            .unwrap();

        assert_eq!(
            set_cookie(&config, "tok", true),
            "_csrf=tok; Path=/app; Domain=example.com; Secure; SameSite=Lax"
        );
    }

    #[test]
    fn test_never_http_only() {
        let config = CsrfConfig::builder(SECRET).same_site(None).build().unwrap();
        let cookie = set_cookie(&config, "tok", true);

        assert!(!cookie.to_ascii_lowercase().contains("httponly"));
        assert!(!cookie.contains("SameSite"));
    }
}
