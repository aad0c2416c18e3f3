//! Minimal tern example: typed path variables, forms, cookies and JSON.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8000/greet/Daniel/
//!   curl http://localhost:8000/greet/?name=Daniel
//!   curl -X POST http://localhost:8000/messages/ -d 'name=Daniel&msg=Hi'
//!   curl -i http://localhost:8000/visit/
//!   curl http://localhost:8000/items/42/
//!   curl -i http://localhost:8000/old/
//!   curl http://localhost:8000/static/basic.rs

use tern::{App, Cookie, Params, Request, Response, SameSite, Server, StaticFiles};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let app = App::new()
        .get("/greet/", greet_query)
        .get("/greet/<str:name>/", greet)
        .post("/messages/", post_message)
        .get("/visit/", visit)
        .get("/items/<int:id>/", item)
        .get("/old/", |_: &Request, _: &Params| Response::redirect("/greet/", true))
        .static_files(StaticFiles::new(env!("CARGO_MANIFEST_DIR").to_owned() + "/demos", "/static/"))
        .not_found(|req: &Request| {
            Response::builder().status(404u16).html(format!("<h1>Nothing at {}</h1>", req.path()))
        });

    if let Err(e) = Server::bind("127.0.0.1:8000").serve(app).await {
        eprintln!("server error: {e}");
    }
}

// GET /greet/?name=...
fn greet_query(req: &Request, _: &Params) -> String {
    format!("Hello, {}", req.get_data().get("name").unwrap_or("world"))
}

// GET /greet/<str:name>/
fn greet(_: &Request, vars: &Params) -> Response {
    Response::html(format!("Hello, {}", vars.str("name").unwrap_or("world")))
}

// POST /messages/
fn post_message(req: &Request, _: &Params) -> Response {
    let form = req.post_data();
    let (Some(name), Some(msg)) = (form.get("name"), form.get("msg")) else {
        return Response::builder().status(400u16).text("name and msg are required");
    };
    Response::builder().status(201u16).text(format!("{name} says {msg}"))
}

// GET /visit/ counts visits in a cookie.
fn visit(req: &Request, _: &Params) -> Response {
    let visits = req.cookie("visits").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0) + 1;
    let mut resp = Response::text(format!("visit #{visits}"));
    resp.set_cookie(
        Cookie::new("visits", visits.to_string())
            .max_age(3600)
            .http_only(true)
            .same_site(SameSite::Lax),
    );
    resp
}

// GET /items/<int:id>/
fn item(_: &Request, vars: &Params) -> Response {
    let id = vars.int("id").unwrap_or_default();
    Response::json(serde_json::json!({ "id": id, "name": format!("item {id}") }).to_string())
}
