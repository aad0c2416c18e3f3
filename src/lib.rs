//! # tern
//!
//! A small request router with typed path variables. Nothing more.
//!
//! ## The contract
//!
//! tern resolves a `(method, path)` pair to a handler, converts the path
//! variables it captured, and turns whatever the handler returned (or
//! failed with) into a response. The hosting server owns everything else:
//! connections, TLS, concurrency, timeouts.
//!
//! - **Routes** are scanned in registration order. The first match wins.
//! - **Templates** carry typed placeholders: `<str:name>`, `<int:id>`,
//!   `<float:ratio>`, `<uuid:id>`, `<slug:title>`, `<any:rest>`.
//! - **Handlers** are plain synchronous functions of `(&Request, &Params)`.
//! - **Failures** become `404 Not Found` / `500 Internal Error` unless the
//!   app runs in debug mode, where they propagate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tern::{App, Params, Request, Response, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new()
//!         .get("/greet/<str:name>/", greet)
//!         .post("/items/<int:id>/", save_item);
//!
//!     Server::bind("0.0.0.0:8000").serve(app).await.unwrap();
//! }
//!
//! fn greet(_req: &Request, vars: &Params) -> String {
//!     format!("Hello, {}", vars.str("name").unwrap_or("stranger"))
//! }
//!
//! fn save_item(req: &Request, vars: &Params) -> Response {
//!     let id = vars.int("id").unwrap_or_default();
//!     let name = req.post_data().get("name").unwrap_or("unnamed");
//!     Response::html(format!("saved #{id}: {name}"))
//! }
//! ```
//!
//! ## Hosting without the bundled server
//!
//! [`App::process_request`] takes an [`Environ`] and a [`StartResponse`]
//! sink, reports the status line and headers to the sink, and returns the
//! body. Any server loop can drive it.

mod app;
mod cookie;
mod environ;
mod error;
mod handler;
mod pattern;
mod query;
mod request;
mod response;
mod route;
mod server;
mod static_files;

pub use app::{App, Outcome};
pub use cookie::{Cookie, SameSite, parse_cookie_header};
pub use environ::Environ;
pub use error::{BoxError, Error};
pub use handler::{HandlerOutput, HandlerResult};
pub use pattern::{PathPattern, VarType};
pub use query::QueryDict;
pub use request::{AJAX_HEADER, Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder, StartResponse};
pub use route::{Params, Route, Value};
pub use server::Server;
pub use static_files::StaticFiles;

/// Well-known [`Environ`] keys.
pub mod keys {
    pub use crate::environ::{
        CONTENT_LENGTH, CONTENT_TYPE, HEADER_PREFIX, HTTP_HOST, HTTPS, PATH_INFO, QUERY_STRING,
        REQUEST_METHOD, REQUEST_SCHEME, SCRIPT_NAME, SERVER_NAME, SERVER_PORT, SERVER_PROTOCOL,
        UNPREFIXED_HEADERS,
    };
}
