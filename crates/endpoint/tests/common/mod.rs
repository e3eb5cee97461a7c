#![allow(dead_code, reason = "each test binary uses a different subset of the shared fixtures")]

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use micro_endpoint::{
    Auther, CodedError, Config, ConfigBuilder, Context, DescriptorBuilder, Endpoint, ErrorStrategy, Handler, HandlerDescriptor,
    HttpRequester, RequestValidator, Requester, ResponseValidator, StatusError,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const REQUEST_BODY: &[u8] = br#"{"my_string": "hello", "my_int": 5}"#;
pub const RESPONSE_BODY: &[u8] = br#"{"output_string":"hello","output_int":5}"#;

pub trait Datastore: Send + Sync {
    fn conn(&self) -> &str;
}

#[derive(Debug)]
pub struct DbClient {
    conn: String,
}

impl DbClient {
    pub fn shared(conn: &str) -> Arc<dyn Datastore> {
        Arc::new(Self { conn: conn.to_string() })
    }
}

impl Datastore for DbClient {
    fn conn(&self) -> &str {
        &self.conn
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestModel {
    pub my_string: String,
    pub my_int: i64,
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub panic: bool,
}

#[derive(Debug, Serialize)]
pub struct ResponseModel {
    pub output_string: String,
    pub output_int: i64,
}

/// A handler that checks every binding it declares before echoing its request body.
#[derive(Default)]
pub struct MyEndpoint {
    query_id: String,
    query_num: i64,
    query_flag: bool,
    path_id: String,
    path_num: i64,
    path_flag: bool,
    db: Option<Arc<dyn Datastore>>,
    calls: Option<Arc<AtomicUsize>>,
    request: Option<RequestModel>,
    response: Option<ResponseModel>,
}

fn check(ok: bool, message: &str) -> Result<(), StatusError> {
    if ok { Ok(()) } else { Err(StatusError::internal(CodedError::new("APP1111", message))) }
}

#[async_trait]
impl Handler for MyEndpoint {
    async fn handle(&mut self, _ctx: &Context) -> Result<StatusCode, StatusError> {
        if let Some(calls) = &self.calls {
            calls.fetch_add(1, Ordering::SeqCst);
        }

        let request = self.request.take().ok_or_else(|| StatusError::bad_request("request body not set"))?;
        if request.panic {
            panic!("handler blew up");
        }
        if request.fail {
            return Err(StatusError::unprocessable(CodedError::new("APP1234", "invalid input")));
        }

        check(self.query_id == "myid", "string query param not set")?;
        check(self.query_num == 13, "int query param not set")?;
        check(self.query_flag, "bool query param not set")?;
        check(self.path_id == "myid", "string path param not set")?;
        check(self.path_num == 5, "int path param not set")?;
        check(self.path_flag, "bool path param not set")?;
        check(self.db.as_ref().is_some_and(|db| db.conn() == "myconnection"), "database connection error")?;

        self.response = Some(ResponseModel { output_string: request.my_string, output_int: request.my_int });
        Ok(StatusCode::OK)
    }
}

/// Every binding of [`MyEndpoint`], without validation.
pub fn my_endpoint_builder() -> DescriptorBuilder<MyEndpoint> {
    HandlerDescriptor::builder("MyEndpoint")
        .query("id", |h: &mut MyEndpoint, id: String| h.query_id = id)
        .query("num", |h: &mut MyEndpoint, num: i64| h.query_num = num)
        .query("flag", |h: &mut MyEndpoint, flag: bool| h.query_flag = flag)
        .path("id", |h: &mut MyEndpoint, id: String| h.path_id = id)
        .path("num", |h: &mut MyEndpoint, num: i64| h.path_num = num)
        .path("flag", |h: &mut MyEndpoint, flag: bool| h.path_flag = flag)
        .resource("db", |h: &mut MyEndpoint, db: Arc<dyn Datastore>| h.db = Some(db))
        .resource("calls", |h: &mut MyEndpoint, calls: Arc<AtomicUsize>| h.calls = Some(calls))
        .request_body(|h: &mut MyEndpoint, body: RequestModel| h.request = Some(body))
        .request_mime("application/json")
        .response_body(|h: &mut MyEndpoint| h.response.take())
        .response_mime("application/json")
}

pub fn my_endpoint_descriptor() -> HandlerDescriptor<MyEndpoint> {
    my_endpoint_builder().validate_request().validate_response().build().unwrap()
}

/// Renders errors as `{"message": ...}`.
#[derive(Debug, Default)]
pub struct MessageStrategy;

impl ErrorStrategy for MessageStrategy {
    fn handle_error(
        &self,
        _ctx: &Context,
        status: StatusCode,
        error: &(dyn Error + Send + Sync + 'static),
    ) -> (StatusCode, Value) {
        (status, json!({ "message": error.to_string() }))
    }
}

/// Accepts requests carrying `Authorization: auth-token`.
#[derive(Debug, Default)]
pub struct TokenAuther;

#[async_trait]
impl Auther for TokenAuther {
    async fn auth(&self, _ctx: &Context, requester: &dyn Requester) -> Result<(), StatusError> {
        let mut headers = 0;
        requester.visit_headers(&mut |_name, _value| headers += 1);
        assert!(headers > 0);

        match requester.peek_header("authorization") {
            Some("auth-token") => Ok(()),
            Some(_) => Err(StatusError::forbidden("access denied")),
            None => Err(StatusError::unauthorized("authorization required")),
        }
    }
}

/// Rejects request bodies mentioning `"forbidden"`.
#[derive(Debug, Default)]
pub struct BodyValidator;

#[async_trait]
impl RequestValidator for BodyValidator {
    async fn validate_request(&self, _ctx: &Context, body: &[u8]) -> Result<(), StatusError> {
        if body.windows(9).any(|window| window == b"forbidden") {
            return Err(StatusError::unprocessable(CodedError::new("VAL0001", "forbidden value")));
        }
        Ok(())
    }
}

/// Rejects responses larger than `max_len`.
#[derive(Debug)]
pub struct SizeValidator {
    pub max_len: usize,
}

#[async_trait]
impl ResponseValidator for SizeValidator {
    async fn validate_response(&self, _ctx: &Context, status: StatusCode, body: &[u8]) -> Result<(), StatusError> {
        assert!(status.is_success());
        if body.len() > self.max_len {
            return Err(StatusError::internal(CodedError::new("VAL0002", "response too large")));
        }
        Ok(())
    }
}

pub fn config_builder() -> ConfigBuilder {
    Config::builder()
        .error_strategy(MessageStrategy)
        .auther(TokenAuther)
        .request_validator(BodyValidator)
        .response_validator(SizeValidator { max_len: 1024 })
        .resource("db", DbClient::shared("myconnection"))
        .resource("calls", Arc::new(AtomicUsize::new(0)))
}

/// How many times handlers built against `config` have run.
pub fn handled(config: &Config) -> usize {
    config.resources().get_as::<Arc<AtomicUsize>>("calls").map_or(0, |calls| calls.load(Ordering::SeqCst))
}

pub fn my_endpoint(config: Arc<Config>) -> Endpoint<MyEndpoint> {
    Endpoint::new(config, my_endpoint_descriptor()).unwrap()
}

pub fn request(content_type: Option<&str>, accept: Option<&str>, body: &'static [u8]) -> HttpRequester {
    request_as(Some("auth-token"), content_type, accept, body)
}

pub fn request_as(
    authorization: Option<&str>,
    content_type: Option<&str>,
    accept: Option<&str>,
    body: &'static [u8],
) -> HttpRequester {
    let mut builder = Request::builder().method(Method::POST).uri("/resources/myid?id=myid&num=13&flag=true");
    if let Some(authorization) = authorization {
        builder = builder.header(AUTHORIZATION, authorization);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    if let Some(accept) = accept {
        builder = builder.header(ACCEPT, accept);
    }

    HttpRequester::new(builder.body(Bytes::from_static(body)).unwrap(), "/resources/{id}")
        .with_path_params([("id", "myid"), ("num", "5"), ("flag", "true")])
}

pub fn json_request(body: &'static [u8]) -> HttpRequester {
    request(Some("application/json"), Some("application/json"), body)
}
