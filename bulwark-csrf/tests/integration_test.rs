//! Integration tests for bulwark-csrf

use bulwark_core::{Error, HttpRequest, HttpResponse, MiddlewareChain, handler};
use bulwark_csrf::*;
use http::StatusCode;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SECRET: &[u8] = b"integration_secret_32_bytes_long";
const T0: i64 = 1_700_000_000_000;

fn guard_at(clock: Arc<FixedClock>) -> CsrfGuard {
    CsrfGuard::new(CsrfConfig::new(SECRET).unwrap())
        .unwrap()
        .with_clock(clock)
}

/// Chain with the guard in front of a handler that counts its calls
fn app(guard: CsrfGuard) -> (MiddlewareChain, bulwark_core::HandlerFn, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let app = handler(move |_req| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(HttpResponse::ok().with_body("done"))
        }
    });
    (MiddlewareChain::new().with(guard), app, calls)
}

fn cookie_token(response: &HttpResponse) -> String {
    let cookie = response
        .header_values("set-cookie")
        .into_iter()
        .find(|c| c.starts_with("XSRF-TOKEN="))
        .expect("token cookie");
    cookie["XSRF-TOKEN=".len()..]
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

#[test]
fn test_verify_within_and_past_timeout() {
    let signer = TokenSigner::new(SECRET).unwrap();
    let timeout = Duration::from_secs(600);
    let token = signer.issue(T0);

    for offset in [0, 1, 300_000, 600_000] {
        assert!(signer.verify(token.as_str(), T0 + offset, timeout).is_ok());
    }
    for offset in [600_001, 3_600_000] {
        assert_eq!(
            signer.verify(token.as_str(), T0 + offset, timeout),
            Err(VerifyError::Expired)
        );
    }
}

#[test]
fn test_other_secret_fails_signature() {
    let token = TokenSigner::new(SECRET).unwrap().issue(T0);
    let other = TokenSigner::new(CsrfConfig::generate_secret().as_slice()).unwrap();

    assert_eq!(
        other.verify(token.as_str(), T0, DEFAULT_TIMEOUT),
        Err(VerifyError::BadSignature)
    );
}

#[tokio::test]
async fn test_safe_request_gets_cookie() {
    let (chain, app, calls) = app(guard_at(Arc::new(FixedClock::new(T0))));

    let response = chain.apply(HttpRequest::get("/form"), app).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cookie_token(&response).is_empty());
}

#[tokio::test]
async fn test_round_trip_get_then_post() {
    let (chain, app, calls) = app(guard_at(Arc::new(FixedClock::new(T0))));

    let response = chain.apply(HttpRequest::get("/form"), app.clone()).await.unwrap();
    let token = cookie_token(&response);

    let post = HttpRequest::post("/submit")
        .with_cookie("XSRF-TOKEN", &token)
        .with_header("X-XSRF-TOKEN", &token);
    let response = chain.apply(post, app).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.header_values("set-cookie").is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_form_field_echo_passes() {
    let guard = guard_at(Arc::new(FixedClock::new(T0)));
    let token = guard.issue_token();
    let (chain, app, calls) = app(guard);

    let post = HttpRequest::post("/submit")
        .with_cookie("XSRF-TOKEN", token.as_str())
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body(format!("name=bob&X-XSRF-TOKEN={}", token));
    let response = chain.apply(post, app).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_submitted_token_rejected() {
    let guard = guard_at(Arc::new(FixedClock::new(T0)));
    let token = guard.issue_token();
    let (chain, app, calls) = app(guard);

    let post = HttpRequest::post("/submit").with_cookie("XSRF-TOKEN", token.as_str());
    let response = chain.apply(post, app).await.unwrap();

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.body.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_two_valid_but_different_tokens_rejected() {
    let guard = guard_at(Arc::new(FixedClock::new(T0)));
    let a = guard.issue_token();
    let b = guard.issue_token();
    assert!(guard.verify_token(b.as_str()).is_ok());

    let post = HttpRequest::post("/submit")
        .with_cookie("XSRF-TOKEN", a.as_str())
        .with_header("X-XSRF-TOKEN", b.as_str());
    assert_eq!(guard.decide(&post), Decision::Reject(VerifyError::Mismatch));

    let (chain, app, calls) = app(guard);
    let response = chain.apply(post, app).await.unwrap();
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_expired_pair_rejected() {
    let clock = Arc::new(FixedClock::new(T0));
    let guard = guard_at(clock.clone());
    let token = guard.issue_token();
    let (chain, app, _) = app(guard);

    clock.advance(DEFAULT_TIMEOUT + Duration::from_millis(1));
    let post = HttpRequest::post("/submit")
        .with_cookie("XSRF-TOKEN", token.as_str())
        .with_header("X-XSRF-TOKEN", token.as_str());

    let response = chain.apply(post, app).await.unwrap();
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_configured_rejection_body() {
    let config = CsrfConfig::builder(SECRET)
        .response_body(ERROR_MESSAGE)
        .build()
        .unwrap();
    let (chain, app, _) = app(CsrfGuard::new(config).unwrap());

    let delete = HttpRequest::new(http::Method::DELETE, "/item/1");
    let response = chain.apply(delete, app).await.unwrap();

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(&response.body[..], ERROR_MESSAGE.as_bytes());
}

#[tokio::test]
async fn test_custom_names() {
    let config = CsrfConfig::builder(SECRET)
        .cookie_name("_csrf")
        .header_name("X-CSRF-Token")
        .build()
        .unwrap();
    let guard = CsrfGuard::new(config).unwrap();
    let token = guard.issue_token();
    let (chain, app, calls) = app(guard);

    let post = HttpRequest::post("/submit")
        .with_cookie("_csrf", token.as_str())
        .with_header("x-csrf-token", token.as_str());
    let response = chain.apply(post, app).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_issuance_is_unique() {
    const N: usize = 64;
    let guard = guard_at(Arc::new(FixedClock::new(T0)));

    let tasks: Vec<_> = (0..N)
        .map(|_| {
            let guard = guard.clone();
            tokio::spawn(async move { guard.issue_token() })
        })
        .collect();

    let mut nonces = HashSet::new();
    for task in tasks {
        let token = task.await.unwrap();
        assert!(guard.verify_token(token.as_str()).is_ok());
        nonces.insert(*token.nonce());
    }
    assert_eq!(nonces.len(), N);
}

#[test]
fn test_guard_requires_secret() {
    assert!(matches!(
        CsrfConfig::from_lookup(|_| None),
        Err(CsrfError::MissingSecret)
    ));
}


#[tokio::test]
async fn test_server_rendered_form_round_trip() {
    let config = CsrfConfig::builder(SECRET).field_name("_csrf").build().unwrap();
    let chain = MiddlewareChain::new().with(CsrfGuard::new(config).unwrap());
    let app = handler(|req: HttpRequest| async move {
        if req.method == http::Method::GET {
            let token = request_token(&req).map(|t| t.to_string()).unwrap_or_default();
            let form = format!(r#"<input type="hidden" name="_csrf" value="{}">"#, token);
            Ok(HttpResponse::ok().with_body(form))
        } else {
            Ok(HttpResponse::no_content())
        }
    });

    // First visit: no cookie yet
    let page = chain.apply(HttpRequest::get("/transfer"), app.clone()).await.unwrap();
    let cookie = cookie_token(&page);
    let html = String::from_utf8(page.body.to_vec()).unwrap();
    let embedded = html
        .split("value=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string();
    assert_eq!(embedded, cookie);

    let submit = HttpRequest::post("/transfer")
        .with_cookie("XSRF-TOKEN", &cookie)
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body(format!("amount=10&_csrf={}", embedded));
    let response = chain.apply(submit, app).await.unwrap();
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}
