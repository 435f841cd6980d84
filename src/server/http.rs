//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Every handler returns
//! `Result<Response, ToyshopError>`; failures are translated to status codes
//! and JSON bodies here and nowhere else.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::routes::{self, json_response, text_response, FullBody};
use crate::store::{GalleryStore, MemoryStore, Shutdown, ToyStore};
use crate::types::{Result, ToyshopError};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// How long in-flight connections may take to finish after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Toy collection
    pub toys: Arc<dyn ToyStore>,
    /// Gallery collection (read-only)
    pub gallery: Arc<dyn GalleryStore>,
    /// Closes the backing store when the server stops
    lifecycle: Arc<dyn Shutdown>,
}

impl AppState {
    /// Create AppState over one backend serving both collections
    pub fn new<S>(args: Args, store: Arc<S>) -> Self
    where
        S: ToyStore + GalleryStore + Shutdown + 'static,
    {
        Self {
            args,
            toys: store.clone(),
            gallery: store.clone(),
            lifecycle: store,
        }
    }

    /// Create AppState backed by a fresh in-memory store
    pub fn in_memory(args: Args) -> Self {
        Self::new(args, Arc::new(MemoryStore::new()))
    }

    /// Run the store's shutdown hook
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }
}

/// Bind the configured address and serve until `shutdown` resolves
pub async fn run(state: Arc<AppState>, shutdown: impl Future<Output = ()>) -> Result<()> {
    let addr = state.args.listen_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Toyshop listening on {}", addr);

    serve(listener, state, shutdown).await
}

/// Accept loop over an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    let conn = http1::Builder::new().serve_connection(io, service);
                    let conn = graceful.watch(conn);

                    tokio::spawn(async move {
                        if let Err(err) = conn.await {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            }
        }
    }

    tokio::select! {
        _ = graceful.shutdown() => info!("All connections closed"),
        _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
            warn!("Connections still open after {:?}, closing anyway", SHUTDOWN_GRACE);
        }
    }

    Ok(())
}

/// Serve one request: read the body, dispatch, translate errors, add CORS
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<FullBody>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    let result = if method == Method::OPTIONS {
        Ok(preflight_response())
    } else {
        match read_body(req.into_body()).await {
            Ok(body) => dispatch(&state, &method, &path, query.as_deref(), body).await,
            Err(e) => Err(e),
        }
    };

    let mut response = match result {
        Ok(response) => response,
        Err(err) => {
            if err.is_client_error() {
                warn!("[{}] {} {} rejected: {}", addr, method, path, err);
            } else {
                error!("[{}] {} {} failed: {}", addr, method, path, err);
            }
            error_response(&err)
        }
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

    info!(
        "[{}] {} {} -> {} ({} ms)",
        addr,
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );

    Ok(response)
}

/// Collect a request body, enforcing [`MAX_BODY_BYTES`]
async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ToyshopError::PayloadTooLarge(MAX_BODY_BYTES))
        }
        Err(e) => Err(ToyshopError::BadRequest(format!("Failed to read request body: {}", e))),
    }
}

/// Known routes, matched case-insensitively on the first path segment
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Liveness,
    SearchByName(&'a str),
    MyToys(&'a str),
    Gallery,
    AllToys,
    ToyDetails(&'a str),
    CreateToy,
    UpdateToy(&'a str),
    Unknown,
}

impl<'a> Route<'a> {
    fn parse(path: &'a str) -> Self {
        let trimmed = path.trim_start_matches('/');
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Self::Liveness;
        }

        let (head, param) = match trimmed.split_once('/') {
            Some((head, param)) => (head, Some(param)),
            None => (trimmed, None),
        };
        let head = head.to_ascii_lowercase();

        // Parameters are a single non-empty segment
        let param = match param {
            Some(p) if p.is_empty() || p.contains('/') => return Self::Unknown,
            p => p,
        };

        match (head.as_str(), param) {
            ("toysearchbyname", Some(text)) => Self::SearchByName(text),
            ("mytoys", Some(key)) => Self::MyToys(key),
            ("gallery", None) => Self::Gallery,
            ("alltoys", None) => Self::AllToys,
            ("toyviewdetails", Some(id)) => Self::ToyDetails(id),
            ("createtoy", None) => Self::CreateToy,
            ("updatemytoy", Some(id)) => Self::UpdateToy(id),
            _ => Self::Unknown,
        }
    }
}

/// Percent-decode a path parameter
fn decode_param(raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|_| ToyshopError::BadRequest("Path parameter is not valid UTF-8".to_string()))
}

/// Route a request to its handler
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> Result<Response<FullBody>> {
    let route = Route::parse(path);

    // GET routes answer HEAD too; hyper drops the body on the way out
    let get = Method::GET;
    let method = if method == Method::HEAD { &get } else { method };

    match (route, method) {
        (Route::Liveness, &Method::GET) => Ok(routes::liveness()),

        (Route::SearchByName(text), &Method::GET) => {
            routes::handle_search_by_name(state, &decode_param(text)?).await
        }

        // Seller listing and deletion share a path; the segment is an email
        // for GET and an identifier for DELETE
        (Route::MyToys(email), &Method::GET) => {
            routes::handle_my_toys(state, &decode_param(email)?, query).await
        }
        (Route::MyToys(id), &Method::DELETE) => {
            routes::handle_delete_toy(state, &decode_param(id)?).await
        }

        (Route::Gallery, &Method::GET) => routes::handle_gallery(state).await,

        (Route::AllToys, &Method::GET) => routes::handle_all_toys(state, query).await,

        (Route::ToyDetails(id), &Method::GET) => {
            routes::handle_toy_details(state, &decode_param(id)?).await
        }

        (Route::CreateToy, &Method::POST) => routes::handle_create_toy(state, &body).await,

        (Route::UpdateToy(id), &Method::PUT) => {
            routes::handle_update_toy(state, &decode_param(id)?, &body).await
        }

        (Route::Unknown, _) => Err(ToyshopError::NotFound(path.to_string())),

        (_, method) => Err(ToyshopError::MethodNotAllowed(format!("{} {}", method, path))),
    }
}

/// Uniform error translation
fn error_response(err: &ToyshopError) -> Response<FullBody> {
    json_response(err.status_code(), &err.to_body()).unwrap_or_else(|_| {
        text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })
}

/// CORS preflight response
fn preflight_response() -> Response<FullBody> {
    let mut response = Response::new(FullBody::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use clap::Parser;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn state() -> AppState {
        AppState::in_memory(Args::try_parse_from(["toyshop", "--in-memory"]).unwrap())
    }

    async fn call(
        state: &AppState,
        method: Method,
        path_and_query: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path_and_query, None),
        };
        let body = body
            .map(|b| Bytes::from(b.to_string()))
            .unwrap_or_default();

        let response = match dispatch(state, &method, path, query, body).await {
            Ok(r) => r,
            Err(e) => error_response(&e),
        };
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create(state: &AppState, name: &str, price: &str, seller: &str) -> String {
        let (status, ack) = call(
            state,
            Method::POST,
            "/createToy",
            Some(json!({
                "data": { "name": name, "price": price, "quantity": "4", "sellerEmail": seller }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{ack}");
        ack["insertedId"].as_str().unwrap().to_string()
    }

    fn names(items: &Value) -> Vec<&str> {
        items
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["data"]["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/"), Route::Liveness);
        assert_eq!(Route::parse("/gallery/"), Route::Gallery);
        assert_eq!(Route::parse("/toyviewdetails/abc"), Route::ToyDetails("abc"));
        assert_eq!(Route::parse("/myToys/a@x.com"), Route::MyToys("a@x.com"));
        assert_eq!(Route::parse("/myToys/"), Route::Unknown);
        assert_eq!(Route::parse("/myToys/a/b"), Route::Unknown);
        assert_eq!(Route::parse("/gallery/extra"), Route::Unknown);
        assert_eq!(Route::parse("/nope"), Route::Unknown);
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let state = state();

        let id = create(&state, "RaceCar", "25", "a@x.com").await;

        let (status, toy) = call(&state, Method::GET, &format!("/ToyViewDetails/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(toy["_id"], id);
        assert_eq!(toy["data"]["name"], "RaceCar");
        assert_eq!(toy["data"]["price"], 25);
        assert_eq!(toy["data"]["quantity"], 4);
        assert_eq!(toy["data"]["sellerEmail"], "a@x.com");

        let (status, ack) = call(
            &state,
            Method::PUT,
            &format!("/updateMyToy/{id}"),
            Some(json!({ "price": "30", "quantity": "2", "description": "fast" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["matchedCount"], 1);

        let (_, toy) = call(&state, Method::GET, &format!("/ToyViewDetails/{id}"), None).await;
        assert_eq!(toy["data"]["price"], 30);
        assert_eq!(toy["data"]["quantity"], 2);
        assert_eq!(toy["data"]["description"], "fast");
        assert_eq!(toy["data"]["name"], "RaceCar");
        assert_eq!(toy["data"]["sellerEmail"], "a@x.com");

        let (status, ack) = call(&state, Method::DELETE, &format!("/myToys/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["deletedCount"], 1);

        let (status, toy) = call(&state, Method::GET, &format!("/ToyViewDetails/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(toy.is_null());
    }

    #[tokio::test]
    async fn test_missing_ids_are_noops() {
        let state = state();
        let missing = ObjectId::new().to_hex();

        let (status, ack) = call(
            &state,
            Method::PUT,
            &format!("/updateMyToy/{missing}"),
            Some(json!({ "price": 1, "quantity": 1, "description": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["matchedCount"], 0);
        assert_eq!(ack["modifiedCount"], 0);

        let (status, ack) = call(&state, Method::DELETE, &format!("/myToys/{missing}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["deletedCount"], 0);
    }

    #[tokio::test]
    async fn test_malformed_ids_rejected() {
        let state = state();

        for (method, path, body) in [
            (Method::GET, "/ToyViewDetails/not-an-id", None),
            (
                Method::PUT,
                "/updateMyToy/not-an-id",
                Some(json!({ "price": 1, "quantity": 1, "description": "" })),
            ),
            (Method::DELETE, "/myToys/not-an-id", None),
        ] {
            let (status, err) = call(&state, method, path, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(err["code"], "INVALID_ID", "{path}");
        }
    }

    #[tokio::test]
    async fn test_seller_listing_and_price_sort() {
        let state = state();
        create(&state, "Mid", "20", "a@x.com").await;
        create(&state, "Other seller", "1", "b@x.com").await;
        create(&state, "Cheap", "5", "a@x.com").await;
        create(&state, "Pricey", "100", "a@x.com").await;

        let (_, toys) = call(&state, Method::GET, "/myToys/a@x.com", None).await;
        assert_eq!(names(&toys), vec!["Mid", "Cheap", "Pricey"]);

        let (_, toys) = call(&state, Method::GET, "/myToys/a@x.com?sortBy=price", None).await;
        assert_eq!(names(&toys), vec!["Cheap", "Mid", "Pricey"]);

        let (_, toys) = call(
            &state,
            Method::GET,
            "/myToys/a%40x.com?sortBy=price&sortOrder=desc",
            None,
        )
        .await;
        assert_eq!(names(&toys), vec!["Pricey", "Mid", "Cheap"]);

        let (_, toys) = call(&state, Method::GET, "/myToys/nobody@x.com", None).await;
        assert_eq!(toys, json!([]));
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let state = state();
        for name in ["Car", "Sports Car", "carriage", "Truck"] {
            create(&state, name, "1", "a@x.com").await;
        }

        let (status, toys) = call(&state, Method::GET, "/toySearchByName/car", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&toys), vec!["Car", "Sports Car", "carriage"]);

        let (_, toys) = call(&state, Method::GET, "/toySearchByName/sports%20car", None).await;
        assert_eq!(names(&toys), vec!["Sports Car"]);
    }

    #[tokio::test]
    async fn test_all_toys_limit() {
        let state = state();
        for i in 0..4 {
            create(&state, &format!("toy-{i}"), "1", "a@x.com").await;
        }

        let (_, toys) = call(&state, Method::GET, "/allToys?limit=2", None).await;
        assert_eq!(names(&toys), vec!["toy-0", "toy-1"]);

        let (_, toys) = call(&state, Method::GET, "/allToys?limit=lots", None).await;
        assert_eq!(toys.as_array().unwrap().len(), 4);

        let (_, toys) = call(&state, Method::GET, "/allToys", None).await;
        assert_eq!(toys.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_gallery() {
        let id = ObjectId::new();
        let store = Arc::new(MemoryStore::with_gallery(vec![
            doc! { "_id": id, "image": "https://img.example/1.png" },
        ]));
        let state = AppState::new(
            Args::try_parse_from(["toyshop", "--in-memory"]).unwrap(),
            store,
        );

        let (status, items) = call(&state, Method::GET, "/gallery", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items, json!([{ "_id": id.to_hex(), "image": "https://img.example/1.png" }]));
    }

    #[tokio::test]
    async fn test_invalid_payloads() {
        let state = state();

        let (status, err) = call(
            &state,
            Method::POST,
            "/createToy",
            Some(json!({ "data": { "name": "", "price": "free" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_FAILED");
        assert_eq!(err["details"].as_array().unwrap().len(), 4);

        let err = dispatch(&state, &Method::POST, "/createToy", None, Bytes::from("{oops"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_JSON");
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let state = state();

        let (status, err) = call(&state, Method::GET, "/toys", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");

        let (status, err) = call(&state, Method::POST, "/gallery", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_head_answers_get_routes() {
        let state = state();

        let response = dispatch(&state, &Method::HEAD, "/", None, Bytes::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = dispatch(&state, &Method::HEAD, "/allToys", None, Bytes::new())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let err = dispatch(&state, &Method::HEAD, "/createToy", None, Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let body = read_body(FullBody::new(Bytes::from(vec![b'x'; MAX_BODY_BYTES])))
            .await
            .unwrap();
        assert_eq!(body.len(), MAX_BODY_BYTES);

        let err = read_body(FullBody::new(Bytes::from(vec![b'x'; MAX_BODY_BYTES + 1])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PAYLOAD_TOO_LARGE");

        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    /// Serve one raw HTTP/1.1 request on an ephemeral port and return the raw response
    async fn exchange(request: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, Arc::new(state()), async {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        raw
    }

    #[tokio::test]
    async fn test_serves_over_tcp_with_cors() {
        let raw = exchange("GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
        assert!(raw.to_ascii_lowercase().contains("access-control-allow-origin: *"));
        assert!(raw.ends_with(routes::LIVENESS_TEXT));
    }

    #[tokio::test]
    async fn test_preflight_over_tcp() {
        let raw = exchange(
            "OPTIONS /createToy HTTP/1.1\r\nHost: localhost\r\n\
             Origin: http://shop.example\r\n\
             Access-Control-Request-Method: POST\r\n\
             Connection: close\r\n\r\n",
        )
        .await;
        let headers = raw.to_ascii_lowercase();

        assert!(raw.starts_with("HTTP/1.1 204 No Content"), "{raw}");
        assert!(headers.contains("access-control-allow-origin: *"));
        assert!(headers.contains("access-control-allow-methods: get, post, put, delete, options"));
    }

    #[tokio::test]
    async fn test_head_over_tcp_has_no_body() {
        let raw = exchange("HEAD / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;

        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
        assert!(raw.ends_with("\r\n\r\n"), "{raw}");
    }
}
