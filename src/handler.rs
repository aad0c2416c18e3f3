//! Handler storage and type erasure.
//!
//! # How handlers are stored
//!
//! The app keeps handlers of *different* closure types in one ordered
//! `Vec<Route>`. A collection holds one concrete type, so each handler is
//! wrapped in [`FnHandler`] and stored as a trait object:
//!
//! ```text
//! fn greet(req: &Request, vars: &Params) -> String { … }   ← user writes this
//!        ↓ app.get("/greet/<str:name>/", greet)
//! boxed(greet)                                          ← generic, typed
//!        ↓
//! Box::new(FnHandler(greet))                            ← stored as BoxedHandler
//!        ↓
//! handler.call(&req, &vars)  at request time            ← one vtable dispatch
//!        ↓
//! greet(&req, &vars).into_outcome()                     ← Result<Option<Response>, BoxError>
//! ```
//!
//! Registration functions bound their argument as `Fn(&Request, &Params) -> R`
//! directly rather than through a helper trait, so closures infer their
//! higher-ranked signature without annotations.

use http::StatusCode;

use crate::error::BoxError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::route::Params;

/// What a handler produced: a response, nothing, or a failure.
pub type HandlerResult = Result<Option<Response>, BoxError>;

// ── HandlerOutput ────────────────────────────────────────────────────────────

/// Types a handler may return.
///
/// | return type | meaning |
/// |---|---|
/// | `Response`, `String`, `&'static str`, `StatusCode` | a response |
/// | `Option<Response>` | `None` = the handler produced nothing (500) |
/// | `Result<Response, E>` / `Result<Option<Response>, E>` | `Err` = handler failure |
pub trait HandlerOutput {
    fn into_outcome(self) -> HandlerResult;
}

impl HandlerOutput for Response {
    fn into_outcome(self) -> HandlerResult { Ok(Some(self)) }
}

impl HandlerOutput for String {
    fn into_outcome(self) -> HandlerResult { Ok(Some(self.into_response())) }
}

impl HandlerOutput for &'static str {
    fn into_outcome(self) -> HandlerResult { Ok(Some(self.into_response())) }
}

impl HandlerOutput for StatusCode {
    fn into_outcome(self) -> HandlerResult { Ok(Some(self.into_response())) }
}

impl HandlerOutput for Option<Response> {
    fn into_outcome(self) -> HandlerResult { Ok(self) }
}

impl<E: Into<BoxError>> HandlerOutput for Result<Response, E> {
    fn into_outcome(self) -> HandlerResult {
        self.map(Some).map_err(Into::into)
    }
}

impl<E: Into<BoxError>> HandlerOutput for Result<Option<Response>, E> {
    fn into_outcome(self) -> HandlerResult {
        self.map_err(Into::into)
    }
}

// ── Erased storage ───────────────────────────────────────────────────────────

pub(crate) trait ErasedHandler {
    fn call(&self, req: &Request, params: &Params) -> HandlerResult;
}

/// A heap-allocated, type-erased handler.
pub(crate) type BoxedHandler = Box<dyn ErasedHandler + Send + Sync + 'static>;

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&Request, &Params) -> R,
    R: HandlerOutput,
{
    fn call(&self, req: &Request, params: &Params) -> HandlerResult {
        (self.0)(req, params).into_outcome()
    }
}

pub(crate) fn boxed<F, R>(handler: F) -> BoxedHandler
where
    F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
    R: HandlerOutput,
{
    Box::new(FnHandler(handler))
}

/// Wraps a request-only handler (the 404 / 500 hooks) in the route shape.
pub(crate) fn boxed_fallback<F, R>(handler: F) -> BoxedHandler
where
    F: Fn(&Request) -> R + Send + Sync + 'static,
    R: HandlerOutput,
{
    boxed(move |req: &Request, _: &Params| handler(req))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request::builder("GET", "/").build().unwrap()
    }

    #[test]
    fn plain_values_become_responses() {
        let h = boxed(|_: &Request, _: &Params| "hi");
        let resp = h.call(&request(), &Params::new()).unwrap().unwrap();
        assert_eq!(resp.body(), b"hi");
        assert_eq!(resp.status_code(), 200);
    }

    #[test]
    fn none_means_no_response() {
        let h = boxed(|_: &Request, _: &Params| -> Option<Response> { None });
        assert!(h.call(&request(), &Params::new()).unwrap().is_none());
    }

    #[test]
    fn err_means_failure() {
        let h = boxed(|_: &Request, _: &Params| -> Result<Response, BoxError> { Err("boom".into()) });
        let err = h.call(&request(), &Params::new()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn fallback_ignores_params() {
        let h = boxed_fallback(|_: &Request| StatusCode::NOT_FOUND);
        let resp = h.call(&request(), &Params::new()).unwrap().unwrap();
        assert_eq!(resp.status_code(), 404);
    }
}
