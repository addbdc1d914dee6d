//! Minimal httpbox example: a failing handler, central error rendering and an
//! access log.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example hello
//!
//! Try:
//!   curl http://localhost:8080/hello/alice
//!   curl http://localhost:8080/hello/bob      ← 400 with JSON error body
//!   curl -X POST http://localhost:8080/echo -d '{"name":"carol"}'
//!   curl -X POST http://localhost:8080/echo.xml -d '<greeting><name>dave</name></greeting>'
//!   curl http://localhost:8080/healthz

use http::{Method, StatusCode};
use httpbox::middleware::AccessLog;
use httpbox::{
    adapt, handler_fn, read_json, read_xml, write_json, write_text, HttpError, Pipeline, Request,
    Response, Router, Server,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize)]
struct Greeting {
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .on(Method::GET, "/hello/{name}", handler_fn(|w, req| Box::pin(async move {
            let name = req.param("name").unwrap_or("stranger");
            if name == "bob" {
                return Err(HttpError::new(StatusCode::BAD_REQUEST, "Bob is banned")
                    .with_details("Please contact the HR")
                    .into());
            }
            write_text(w, StatusCode::OK, &format!("Hello, {name}!"))
        })))
        // Body that is not valid JSON → 400 "invalid JSON body".
        .on(Method::POST, "/echo", handler_fn(|w, req| Box::pin(async move {
            let greeting: Greeting = read_json(req.body_reader())?;
            write_json(w, StatusCode::OK, &greeting)
        })))
        // XML in, JSON out.
        .on(Method::POST, "/echo.xml", handler_fn(|w, req| Box::pin(async move {
            let greeting: Greeting = read_xml(req.body_reader())?;
            write_json(w, StatusCode::OK, &greeting)
        })))
        .on(Method::GET, "/healthz", adapt(healthz));

    let app = Pipeline::new(router).layer(AccessLog::default()).build();

    Server::bind("0.0.0.0:8080")
        .serve(app)
        .await
        .expect("server error");
}

async fn healthz(_req: Request) -> Response {
    Response::json(br#"{"status":"ok"}"#.to_vec())
}
