//! Drives a couple of endpoints through simulated requests and prints what a host would send back.
//!
//! Run with `cargo run --example resources`.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, StatusCode};
use micro_endpoint::{
    Auther, Config, Context, Endpoint, EndpointExecutor, Handler, HandlerDescriptor, HttpRequester, Requester, Route,
    StatusError, get, post,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

type Store = Arc<Mutex<HashMap<i64, String>>>;

#[derive(Deserialize)]
struct NewResource {
    id: i64,
    name: String,
    #[serde(default)]
    explode: bool,
}

#[derive(Serialize)]
struct ResourceView {
    id: i64,
    name: String,
}

#[derive(Default)]
struct CreateResource {
    store: Option<Store>,
    request: Option<NewResource>,
    response: Option<ResourceView>,
}

#[async_trait]
impl Handler for CreateResource {
    async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
        let request = self.request.take().ok_or_else(|| StatusError::bad_request("missing body"))?;
        assert!(!request.explode, "asked to explode");

        let store = self.store.as_ref().ok_or_else(|| StatusError::internal("store not bound"))?;
        store
            .lock()
            .map_err(|e| StatusError::internal(e.to_string()))?
            .insert(request.id, request.name.clone());
        self.response = Some(ResourceView { id: request.id, name: request.name });
        Ok(StatusCode::CREATED)
    }
}

#[derive(Default)]
struct ReadResource {
    id: i64,
    store: Option<Store>,
    response: Option<ResourceView>,
}

#[async_trait]
impl Handler for ReadResource {
    async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
        let store = self.store.as_ref().ok_or_else(|| StatusError::internal("store not bound"))?;
        let name = store
            .lock()
            .map_err(|e| StatusError::internal(e.to_string()))?
            .get(&self.id)
            .cloned()
            .ok_or_else(|| StatusError::new(StatusCode::NOT_FOUND, format!("resource {} not found", self.id)))?;
        self.response = Some(ResourceView { id: self.id, name });
        Ok(StatusCode::OK)
    }
}

#[derive(Debug)]
struct BearerAuther;

#[async_trait]
impl Auther for BearerAuther {
    async fn auth(&self, _ctx: &Context, requester: &dyn Requester) -> Result<(), StatusError> {
        match requester.peek_header("authorization") {
            Some(value) if value.starts_with("Bearer ") => Ok(()),
            _ => Err(StatusError::unauthorized("bearer token required")),
        }
    }
}

fn routes() -> Result<Vec<Route>, Box<dyn Error + Send + Sync>> {
    let store: Store = Arc::default();
    let config = Config::builder().auther(BearerAuther).resource("store", store).build();

    let create = HandlerDescriptor::builder("CreateResource")
        .resource("store", |h: &mut CreateResource, store: Store| h.store = Some(store))
        .request_body(|h: &mut CreateResource, body: NewResource| h.request = Some(body))
        .response_body(|h: &mut CreateResource| h.response.take())
        .build()?;
    let read = HandlerDescriptor::builder("ReadResource")
        .path("id", |h: &mut ReadResource, id: i64| h.id = id)
        .resource("store", |h: &mut ReadResource, store: Store| h.store = Some(store))
        .response_body(|h: &mut ReadResource| h.response.take())
        .etag(60)
        .build()?;

    Ok(vec![
        post("/resources", Endpoint::new(Arc::clone(&config), create)?),
        get("/resources/{id}", Endpoint::new(config, read)?),
    ])
}

async fn call(
    route: &Route,
    request: Request<Bytes>,
    path_params: &[(&str, &str)],
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut requester = HttpRequester::new(request, route.path()).with_path_params(path_params.iter().copied());
    let executor = route.executor();
    let mut ctx = Context::with_parent(&CancellationToken::new()).with_timeout(executor.timeout());

    let (status, body) = executor.execute(&mut ctx, &mut requester).await;
    let response = requester.into_response(status, body.clone());
    info!(
        route = %route.path(),
        status = %response.status(),
        etag = ?response.headers().get("etag"),
        body = %String::from_utf8_lossy(&body),
        "responded"
    );
    Ok(())
}

fn json(builder: http::request::Builder, body: &'static str) -> Result<Request<Bytes>, http::Error> {
    builder
        .header("Authorization", "Bearer demo")
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .body(Bytes::from_static(body.as_bytes()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let routes = routes()?;
    let (create, read) = (&routes[0], &routes[1]);

    call(create, json(Request::post("/resources"), r#"{"id": 7, "name": "seven"}"#)?, &[]).await?;
    call(read, json(Request::get("/resources/7"), "")?, &[("id", "7")]).await?;

    let conditional = Request::get("/resources/7")
        .header("Authorization", "Bearer demo")
        .header("Accept", "application/json")
        .header("If-None-Match", micro_endpoint::fingerprint(br#"{"id":7,"name":"seven"}"#))
        .body(Bytes::new())?;
    call(read, conditional, &[("id", "7")]).await?;

    call(read, json(Request::get("/resources/8"), "")?, &[("id", "8")]).await?;
    call(create, json(Request::post("/resources"), r#"{"id": 9, "name": "boom", "explode": true}"#)?, &[]).await?;

    let anonymous = Request::post("/resources")
        .header("Content-Type", "application/json")
        .body(Bytes::from_static(br#"{"id": 10, "name": "ten"}"#))?;
    call(create, anonymous, &[]).await?;

    Ok(())
}
