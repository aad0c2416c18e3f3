//! End-to-end behaviour through `App::process_request`, the way a hosting
//! server drives it.

use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};

use http::Method;
use rstest::{fixture, rstest};
use tern::{App, Cookie, Environ, Error, Params, Request, Response, Route, keys};

type Head = (String, Vec<(String, String)>);

/// A sink that remembers what it was handed.
fn capture() -> (Arc<Mutex<Option<Head>>>, impl FnMut(&str, &[(String, String)]) + Send + 'static) {
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    let sink = move |status: &str, headers: &[(String, String)]| {
        *slot.lock().unwrap() = Some((status.to_owned(), headers.to_vec()));
    };
    (seen, sink)
}

fn environ(method: &str, path: &str, query: &str) -> Environ {
    Environ::new()
        .var(keys::REQUEST_METHOD, method)
        .var(keys::PATH_INFO, path)
        .var(keys::QUERY_STRING, query)
        .var(keys::SERVER_NAME, "localhost")
        .var(keys::SERVER_PORT, "8000")
        .var(keys::REQUEST_SCHEME, "http")
}

fn with_body(env: Environ, content_type: &str, body: &'static str) -> Environ {
    env.var(keys::CONTENT_TYPE, content_type)
        .var(keys::CONTENT_LENGTH, body.len().to_string())
        .input(Cursor::new(body.as_bytes()))
}

/// Runs one request; returns status line, headers and body text.
fn run(app: &App, env: Environ) -> (String, Vec<(String, String)>, String) {
    let (seen, sink) = capture();
    let body = app.process_request(env, sink).unwrap();
    let (status, headers) = seen.lock().unwrap().take().expect("sink was not called");
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

fn header<'h>(headers: &'h [(String, String)], name: &str) -> Vec<&'h str> {
    headers
        .iter()
        .filter(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .collect()
}

#[fixture]
fn app() -> App {
    App::new()
        .get("/", |_: &Request, _: &Params| Response::html("Hello, world"))
        .get("/greet/", |req: &Request, _: &Params| {
            format!("Hello, {}", req.get_data().get("name").unwrap_or("stranger"))
        })
        .get("/greet/<str:name>/", |_: &Request, vars: &Params| {
            Response::html(format!("Hello, {}", vars.str("name").unwrap_or_default()))
        })
        .post("/messages/", |req: &Request, _: &Params| {
            let form = req.post_data();
            Response::text(format!(
                "{} says {}",
                form.get("name").unwrap_or("?"),
                form.get("msg").unwrap_or("?")
            ))
        })
        .get("/items/<int:id>/", |_: &Request, vars: &Params| {
            format!("item {}", vars.int("id").unwrap_or_default() + 1)
        })
        .get("/apps/<uuid:app_id>/", |_: &Request, vars: &Params| {
            format!("app {}", vars.str("app_id").unwrap_or_default())
        })
        .get("/fail/", |_: &Request, _: &Params| -> Result<Response, Error> {
            Err(Error::ResponseNotReady)
        })
}

#[rstest]
#[case::root("GET", "/", "", "200 OK", "Hello, world")]
#[case::query("GET", "/greet/", "name=Daniel", "200 OK", "Hello, Daniel")]
#[case::variable("GET", "/greet/Daniel/", "", "200 OK", "Hello, Daniel")]
#[case::int("GET", "/items/41/", "", "200 OK", "item 42")]
#[case::uuid(
    "GET",
    "/apps/A7F3C2E1-93B6-4D2A-8E5F-1B2C3D4E5F60/",
    "",
    "200 OK",
    "app A7F3C2E1-93B6-4D2A-8E5F-1B2C3D4E5F60"
)]
#[case::int_rejects_letters("GET", "/items/4x/", "", "404 Not Found", "Not Found")]
#[case::missing("GET", "/nowhere/", "", "404 Not Found", "Not Found")]
#[case::wrong_method("DELETE", "/", "", "404 Not Found", "Not Found")]
#[case::handler_error("GET", "/fail/", "", "500 Internal Server Error", "Internal Error")]
fn routes_requests(
    app: App,
    #[case] method: &str,
    #[case] path: &str,
    #[case] query: &str,
    #[case] status: &str,
    #[case] body: &str,
) {
    let (got_status, _, got_body) = run(&app, environ(method, path, query));
    assert_eq!(got_status, status);
    assert_eq!(got_body, body);
}

#[rstest]
fn empty_app_answers_404() {
    let (status, headers, body) = run(&App::new(), environ("GET", "/", ""));
    assert_eq!(status, "404 Not Found");
    assert_eq!(body, "Not Found");
    assert_eq!(header(&headers, "content-type"), ["text/html"]);
}

#[rstest]
fn posted_form_reaches_handler(app: App) {
    let env = with_body(
        environ("POST", "/messages/", ""),
        "application/x-www-form-urlencoded",
        "name=Daniel&msg=Hi",
    );
    let (status, headers, body) = run(&app, env);
    assert_eq!(status, "200 OK");
    assert_eq!(body, "Daniel says Hi");
    assert_eq!(header(&headers, "content-type"), ["text/plain"]);
}

#[rstest]
fn registration_order_wins() {
    let app = App::new()
        .get("/a/<str:x>/", |_: &Request, vars: &Params| {
            format!("general {}", vars.str("x").unwrap_or_default())
        })
        .get("/a/fixed/", |_: &Request, _: &Params| "fixed");

    let (_, _, body) = run(&app, environ("GET", "/a/fixed/", ""));
    assert_eq!(body, "general fixed");
}

#[rstest]
fn cookies_round_trip() {
    let app = App::new().get("/visit/", |req: &Request, _: &Params| {
        let seen = req.cookie("visits").unwrap_or("none").to_owned();
        let mut resp = Response::text(format!("seen {seen}"));
        resp.set_cookie(Cookie::new("visits", "2"));
        resp.set_cookie(Cookie::new("flavour", "oat").max_age(60));
        resp
    });

    let env = environ("GET", "/visit/", "").var("HTTP_COOKIE", "visits=1; theme=dark");
    let (_, headers, body) = run(&app, env);
    assert_eq!(body, "seen 1");
    assert_eq!(
        header(&headers, "set-cookie"),
        ["flavour=oat; Max-Age=60; Path=/", "visits=2; Path=/"]
    );
}

#[rstest]
fn redirect_sets_location() {
    let app = App::new().get("/old/", |_: &Request, _: &Params| Response::redirect("/new/", false));
    let (status, headers, _) = run(&app, environ("GET", "/old/", ""));
    assert_eq!(status, "302 Found");
    assert_eq!(header(&headers, "location"), ["/new/"]);
}

#[rstest]
fn malformed_host_is_a_bad_request(app: App) {
    let env = environ("GET", "/", "").var(keys::HTTP_HOST, "bad host");
    let (status, _, body) = run(&app, env);
    assert_eq!(status, "400 Bad Request");
    assert_eq!(body, "Bad Request");
}

#[rstest]
fn ipv6_server_name_without_host_is_routed(app: App) {
    let env = environ("GET", "/greet/Daniel/", "").var(keys::SERVER_NAME, "::1");
    let (status, _, body) = run(&app, env);
    assert_eq!(status, "200 OK");
    assert_eq!(body, "Hello, Daniel");
}

#[rstest]
#[case::path_and_fragment("x/public/#")]
#[case::query("x?/public/")]
#[case::userinfo("evil@x")]
#[case::backslash("x\\public")]
fn host_header_cannot_reroute(#[case] host: &str) {
    let app = App::new()
        .get("/public/", |_: &Request, _: &Params| "public")
        .get("/admin/", |_: &Request, _: &Params| "admin");

    let env = environ("GET", "/admin/", "").var(keys::HTTP_HOST, host);
    let (status, _, body) = run(&app, env);
    assert_eq!(status, "200 OK");
    assert_eq!(body, "admin");
}

#[rstest]
fn debug_mode_surfaces_handler_errors(app: App) {
    let app = app.debug(true);
    let (_, sink) = capture();
    let err = app.process_request(environ("GET", "/fail/", ""), sink).unwrap_err();
    assert!(matches!(err, Error::Handler(_)));
}

#[rstest]
fn custom_hooks_replace_builtin_pages() {
    let app = App::new()
        .not_found(|req: &Request| Response::builder().status(404u16).text(format!("no {}", req.path())))
        .internal_error(|_: &Request| Response::builder().status(500u16).text("oops"))
        .get("/none/", |_: &Request, _: &Params| -> Option<Response> { None });

    let (status, _, body) = run(&app, environ("GET", "/missing/", ""));
    assert_eq!((status.as_str(), body.as_str()), ("404 Not Found", "no /missing/"));

    let (status, _, body) = run(&app, environ("GET", "/none/", ""));
    assert_eq!((status.as_str(), body.as_str()), ("500 Internal Server Error", "oops"));
}

#[rstest]
fn prebuilt_routes_can_be_pushed() {
    let route = Route::new(Method::PUT, "/items/<int:id>/", |req: &Request, vars: &Params| {
        format!("{} = {}", vars.int("id").unwrap_or_default(), req.put_data().get("v").unwrap_or("?"))
    })
    .unwrap();
    let mut app = App::new();
    app.push(route);

    let env = with_body(environ("PUT", "/items/7/", ""), "application/x-www-form-urlencoded", "v=x");
    let (_, _, body) = run(&app, env);
    assert_eq!(body, "7 = x");
}

#[rstest]
fn writing_without_a_sink_fails() {
    let mut resp = Response::html("unsent");
    assert!(matches!(resp.write(), Err(Error::ResponseNotReady)));
}

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

#[rstest]
fn log_events_go_to_the_injected_dispatch() {
    let buffer = Buffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let app = App::new().with_dispatch(tracing::Dispatch::new(subscriber));
    run(&app, environ("GET", "/unrouted/", ""));

    let logged = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert!(logged.contains("no route matched"), "{logged}");
    assert!(logged.contains("/unrouted/"), "{logged}");
}
