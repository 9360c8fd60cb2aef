// Middleware pipeline for request/response processing

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// Boxed future returned by handlers and pipeline stages
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// The rest of the pipeline after the current middleware
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture + Send>;

/// Terminal request handler
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxFuture + Send + Sync>;

/// Wrap an async closure into a [`HandlerFn`]
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)) as BoxFuture)
}

/// A pipeline stage.
///
/// A stage either forwards the request by calling `next` or terminates the
/// exchange by returning its own response without calling it.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Ordered list of middleware in front of a handler
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it runs after the ones already added
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.use_middleware(middleware);
        self
    }

    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let mut mws = (*self.middlewares).clone();
        mws.push(Arc::new(middleware));
        self.middlewares = Arc::new(mws);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the request through every middleware and then the handler
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, handler).await
    }

    fn execute_from(&self, index: usize, req: HttpRequest, handler: HandlerFn) -> BoxFuture {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            return handler(req);
        }

        let middleware = self.middlewares[index].clone();
        let chain = self.clone();

        trace!(middleware_index = index, "Executing middleware");
        Box::pin(async move {
            middleware
                .handle(
                    req,
                    Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                )
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
            let mut response = next(req).await?;
            response.append_header("x-tag", self.0);
            Ok(response)
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        async fn handle(&self, _req: HttpRequest, _next: Next) -> Result<HttpResponse, Error> {
            Ok(HttpResponse::forbidden())
        }
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let chain = MiddlewareChain::new().with(Tag("outer")).with(Tag("inner"));
        let response = chain
            .apply(
                HttpRequest::get("/"),
                handler(|_req| async { Ok(HttpResponse::ok()) }),
            )
            .await
            .unwrap();

        // Inner stage finishes first, so its header lands first
        assert_eq!(response.header_values("x-tag"), vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_handler() {
        let chain = MiddlewareChain::new().with(Deny);
        let response = chain
            .apply(
                HttpRequest::post("/"),
                handler(|_req| async { Err(Error::Internal("handler ran".into())) }),
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_empty_chain_calls_handler() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());

        let response = tokio_test::block_on(chain.apply(
            HttpRequest::get("/"),
            handler(|_req| async { Ok(HttpResponse::no_content()) }),
        ))
        .unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }
}
