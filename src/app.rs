//! The dispatcher: an ordered route list and the request lifecycle.
//!
//! ```text
//! Environ ──► Request ──► dispatch ──► Outcome ──► respond ──► Response ──► write
//!                          │                        │
//!                          first route whose        Matched    → as is
//!                          method + path match      NotFound   → error_404
//!                          wins, in registration    NoResponse → error_500
//!                          order                    Failed     → error_500, or Err in debug
//! ```
//!
//! No specificity ordering happens: register specific routes before general
//! ones (an `<any:..>` catch-all last).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use http::{Method, StatusCode};
use tracing::{Dispatch, debug, error, warn};

use crate::environ::Environ;
use crate::error::Error;
use crate::handler::{self, BoxedHandler, HandlerOutput, HandlerResult};
use crate::request::Request;
use crate::response::{Response, StartResponse};
use crate::route::{Params, Route};
use crate::static_files::StaticFiles;

/// Result of the routing step for one request.
#[derive(Debug)]
pub enum Outcome {
    /// The first matching route answered.
    Matched(Response),
    /// A route matched but its handler produced nothing.
    NoResponse,
    /// No route matched the method and path.
    NotFound,
    /// The matching route failed: bad path variable, handler error or panic.
    Failed(Error),
}

/// The application: routes plus the hooks that turn failures into responses.
///
/// Build it once, then hand it to a server:
///
/// ```rust,no_run
/// use tern::{App, Params, Request, Response, Server};
///
/// #[tokio::main]
/// async fn main() {
///     let app = App::new()
///         .get("/greet/<str:name>/", greet)
///         .post("/items/<int:id>/", |_req: &Request, vars: &Params| {
///             format!("saved {}", vars.int("id").unwrap_or_default())
///         });
///
///     Server::bind("127.0.0.1:8000").serve(app).await.unwrap();
/// }
///
/// fn greet(_req: &Request, vars: &Params) -> Response {
///     Response::html(format!("Hello, {}", vars.str("name").unwrap_or("world")))
/// }
/// ```
///
/// Route mutation takes `&mut self`; once the app is shared with a server it
/// is read-only.
#[derive(Default)]
pub struct App {
    routes: Vec<Route>,
    debug: bool,
    not_found: Option<BoxedHandler>,
    internal_error: Option<BoxedHandler>,
    dispatch: Option<Dispatch>,
}

impl App {
    pub fn new() -> Self { Self::default() }

    // ── Configuration ────────────────────────────────────────────────────────

    /// In debug mode handler failures propagate out of [`App::handle`] and
    /// [`App::process_request`] (and panics unwind) instead of becoming a 500.
    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn is_debug(&self) -> bool { self.debug }

    /// Routes this app's log events to `dispatch` instead of the global
    /// subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Replaces the 404 handler.
    pub fn not_found<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.not_found = Some(handler::boxed_fallback(handler));
        self
    }

    /// Replaces the 500 handler.
    pub fn internal_error<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.internal_error = Some(handler::boxed_fallback(handler));
        self
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers a handler for a method + template pair. Returns `self` for
    /// chaining.
    ///
    /// # Panics
    ///
    /// Panics if the template does not compile (e.g. a repeated placeholder
    /// name). Use [`Route::new`] and [`App::push`] for the fallible form.
    pub fn route<F, R>(mut self, method: Method, template: &str, handler: F) -> Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.add_route(method, template, handler);
        self
    }

    pub fn get<F, R>(self, template: &str, handler: F) -> Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.route(Method::GET, template, handler)
    }

    pub fn post<F, R>(self, template: &str, handler: F) -> Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.route(Method::POST, template, handler)
    }

    pub fn put<F, R>(self, template: &str, handler: F) -> Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.route(Method::PUT, template, handler)
    }

    pub fn delete<F, R>(self, template: &str, handler: F) -> Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.route(Method::DELETE, template, handler)
    }

    pub fn patch<F, R>(self, template: &str, handler: F) -> Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.route(Method::PATCH, template, handler)
    }

    /// Mounts `files` as `GET {prefix}/<any:asset_path>`.
    pub fn static_files(self, files: StaticFiles) -> Self {
        let template = files.route_template();
        self.get(&template, move |_req: &Request, vars: &Params| {
            files.serve(vars.str(StaticFiles::VARIABLE).unwrap_or_default())
        })
    }

    /// In-place form of [`App::route`]. Same panics.
    pub fn add_route<F, R>(&mut self, method: Method, template: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request, &Params) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        let route = Route::with_boxed(method, template, handler::boxed(handler))
            .unwrap_or_else(|e| panic!("invalid route `{template}`: {e}"));
        self.push(route)
    }

    /// Appends an already-built route.
    pub fn push(&mut self, route: Route) -> &mut Self {
        debug!(route = %route, position = self.routes.len(), "route registered");
        self.routes.push(route);
        self
    }

    /// Position of the first route registered with exactly `method` and
    /// `template` (the template text, not a path it would match).
    pub fn find_route(&self, method: &Method, template: &str) -> Result<usize, Error> {
        self.routes
            .iter()
            .position(|r| r.method() == method && r.template() == template)
            .ok_or_else(|| Error::RouteNotFound {
                method: method.to_string(),
                path: template.to_owned(),
            })
    }

    /// Removes the first route registered with `method` and `template`.
    /// Missing routes are not an error.
    pub fn remove_route(&mut self, method: &Method, template: &str) -> Option<Route> {
        let index = self.find_route(method, template).ok()?;
        Some(self.routes.remove(index))
    }

    /// Registered routes in matching order.
    pub fn routes(&self) -> &[Route] { &self.routes }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Entry point for a hosting server: builds the request, routes it,
    /// hands status and headers to `sink` and returns the body.
    ///
    /// A target that cannot be parsed as a URI answers `400 Bad Request`.
    pub fn process_request(
        &self,
        environ: Environ,
        sink: impl StartResponse + 'static,
    ) -> Result<Bytes, Error> {
        self.in_scope(|| {
            let mut response = match Request::from_environ(environ) {
                Ok(req) => self.handle(&req)?,
                Err(e @ Error::InvalidUri { .. }) => {
                    warn!(error = %e, "rejecting request");
                    Response::builder().status(StatusCode::BAD_REQUEST).html("Bad Request")
                }
                Err(e) => return Err(e),
            };
            response.attach(sink);
            response.write()
        })
    }

    /// Routes `req` and settles the outcome into a response.
    pub fn handle(&self, req: &Request) -> Result<Response, Error> {
        let outcome = self.dispatch(req);
        let response = self.respond(req, outcome)?;
        debug!(method = req.method(), path = req.path(), status = response.status_code(), "handled");
        Ok(response)
    }

    /// Finds the first route that can handle `req` and runs it.
    ///
    /// The first structural match is authoritative: when its handler fails,
    /// later routes are not tried.
    pub fn dispatch(&self, req: &Request) -> Outcome {
        let Some(route) = self.routes.iter().find(|r| r.can_handle(req.method(), req.path())) else {
            debug!(method = req.method(), path = req.path(), "no route matched");
            return Outcome::NotFound;
        };
        debug!(route = %route, path = req.path(), "route matched");

        match self.invoke(route, req) {
            Ok(Some(response)) => Outcome::Matched(response),
            Ok(None) => Outcome::NoResponse,
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Turns an [`Outcome`] into the response to send.
    ///
    /// Only `Failed` in debug mode is an error; everything else yields a
    /// response, falling back to a built-in 500 if the hooks misbehave.
    pub fn respond(&self, req: &Request, outcome: Outcome) -> Result<Response, Error> {
        let response = match outcome {
            Outcome::Matched(response) => response,
            Outcome::NotFound => self.error_404(req),
            Outcome::NoResponse => {
                error!(method = req.method(), path = req.path(), "handler returned no response");
                self.error_500(req)
            }
            Outcome::Failed(e) if self.debug => return Err(e),
            Outcome::Failed(e) => {
                error!(method = req.method(), path = req.path(), error = %e, "handler failed");
                self.error_500(req)
            }
        };
        Ok(response)
    }

    /// The 404 response: the `not_found` hook if set and it answers, else
    /// `"Not Found"`. A hook that fails yields the 500 response instead.
    pub fn error_404(&self, req: &Request) -> Response {
        match &self.not_found {
            Some(hook) => self.call_hook(hook, req).unwrap_or_else(|| self.error_500(req)),
            None => default_not_found(),
        }
    }

    /// The 500 response: the `internal_error` hook if set and it answers,
    /// else `"Internal Error"`.
    pub fn error_500(&self, req: &Request) -> Response {
        self.internal_error
            .as_ref()
            .and_then(|hook| self.call_hook(hook, req))
            .unwrap_or_else(default_internal_error)
    }

    fn invoke(&self, route: &Route, req: &Request) -> Result<Option<Response>, Error> {
        let call = || -> Result<Option<Response>, Error> {
            let params = route.extract_variables(req.path())?;
            route.handler.call(req, &params).map_err(Error::Handler)
        };
        if self.debug {
            return call();
        }
        panic::catch_unwind(AssertUnwindSafe(call))
            .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload.as_ref()))))
    }

    fn call_hook(&self, hook: &BoxedHandler, req: &Request) -> Option<Response> {
        let params = Params::new();
        let result: Result<HandlerResult, _> =
            panic::catch_unwind(AssertUnwindSafe(|| hook.call(req, &params)));
        match result {
            Ok(Ok(Some(response))) => Some(response),
            Ok(Ok(None)) => {
                warn!("error hook returned no response");
                None
            }
            Ok(Err(e)) => {
                warn!(error = %e, "error hook failed");
                None
            }
            Err(payload) => {
                warn!(panic = %panic_message(payload.as_ref()), "error hook panicked");
                None
            }
        }
    }

    fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}

fn default_not_found() -> Response {
    Response::builder().status(StatusCode::NOT_FOUND).html("Not Found")
}

fn default_internal_error() -> Response {
    Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).html("Internal Error")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
