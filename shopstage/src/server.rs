//! HTTP read surface.
//!
//! A thin dispatch layer over the aggregation strategies: one route
//! resolving a customer id and stage number to a revenue row list, a
//! liveness probe, and a connectivity probe reporting the stage-1
//! customer count. Request failures are isolated to their request; the
//! accept loop keeps serving.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use url::form_urlencoded;

use stagedb::{connect, DocId, ErrorKind, StoreResult};

use crate::config::Config;
use crate::dispatch::dispatch;
use crate::model;
use crate::stage::Stage;

/// Binds the configured address and serves until the process is killed.
pub async fn run(config: &Config) -> StoreResult<()> {
    let listener = TcpListener::bind(config.listen).await?;
    let bound = listener.local_addr()?;
    log::info!("listening on http://{}", bound);

    let config = Arc::new(config.clone());
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let config = config.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, config.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                log::error!("connection error from {}: {}", peer, err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    config: Arc<Config>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    let response = match (req.method(), path.as_str()) {
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (&Method::GET, "/") => match probe(&config) {
            Ok(body) => json_response(StatusCode::OK, &body),
            Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
        },
        (&Method::GET, path) if path.starts_with("/orders/") => {
            handle_orders(path, req.uri().query(), &config)
        }
        _ => json_error(StatusCode::NOT_FOUND, "no such route"),
    };
    Ok(response)
}

fn handle_orders(path: &str, query: Option<&str>, config: &Config) -> Response<Full<Bytes>> {
    let raw_id = &path["/orders/".len()..];
    let customer_id = match DocId::from_str(raw_id) {
        Ok(id) => id,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    let stage_number = match stage_from_query(query) {
        Ok(number) => number,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, &message),
    };

    match dispatch(&config.store_root, stage_number, &customer_id) {
        Ok(rows) => json_response(StatusCode::OK, &rows),
        Err(err) if err.kind() == &ErrorKind::InvalidOperation => {
            json_error(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Err(err) => {
            log::error!(
                "stage {} lookup for {} failed: {}",
                stage_number,
                customer_id,
                err
            );
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

/// Reads `stage=N` out of the query string; absent means stage 1.
fn stage_from_query(query: Option<&str>) -> Result<u8, String> {
    let Some(query) = query else {
        return Ok(Stage::Naive.number());
    };
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == "stage" {
            return value
                .parse()
                .map_err(|_| format!("stage '{}' is not a number", value));
        }
    }
    Ok(Stage::Naive.number())
}

/// Connectivity probe: counts customers in the stage-1 target.
fn probe(config: &Config) -> StoreResult<serde_json::Value> {
    let db = connect(&Stage::Naive.target(&config.store_root))?;
    let customers = db.collection(model::CUSTOMERS)?.size();
    Ok(serde_json::json!({
        "store": config.store_root,
        "customers": customers,
    }))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let value = serde_json::json!({ "error": message });
    json_response(status, &value)
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal"))))
}
