//! Integration tests for the request pipeline and its middleware layers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use sdkit::{
    AccessToken, BaseClient, Error, LogLevel, Logger, Method, Middleware, Request, RequestOptions,
    Response, Result, ServiceContainer, Transport, names,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, method, path},
};

/// Records every request and answers `{"ok": true}`.
fn recording_transport(seen: Arc<Mutex<Vec<Request>>>) -> Transport {
    Transport::new(tower::service_fn(move |request: Request| {
        seen.lock().expect("seen").push(request);
        async {
            let body = Bytes::from_static(br#"{"ok":true}"#);
            Ok::<_, Error>(Response::new(200, HashMap::new(), body))
        }
    }))
}

fn container_with(transport: Transport, logger: Option<Arc<Recorder>>) -> ServiceContainer {
    let mut builder = ServiceContainer::builder()
        .config(json!({"http": {"base_uri": "https://api.example.com/", "log_template": "{method} {target} {code}"}}))
        .provider(move |container: &ServiceContainer| {
            container.container().instance(names::HANDLER, transport.clone());
            Ok(())
        });
    if let Some(logger) = logger {
        builder = builder.logger(logger);
    }
    builder.build().expect("container")
}

#[derive(Default)]
struct Recorder(Mutex<Vec<(LogLevel, String)>>);

impl Logger for Recorder {
    fn log(&self, level: LogLevel, message: &str) {
        self.0.lock().expect("records").push((level, message.to_string()));
    }
}

struct QueryToken;

impl AccessToken for QueryToken {
    fn apply_to_request(&self, request: Request, _options: &RequestOptions) -> Result<Request> {
        let mut url = request.url().clone();
        url.query_pairs_mut().append_pair("access_token", "t0");
        Ok(request.with_url(url))
    }
}

fn tag(value: &'static str) -> Middleware {
    Middleware::map_request(move |request| Ok(request.with_header("X-Tag", value)))
}

#[tokio::test]
async fn named_middleware_registered_twice_keeps_the_second() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let client = BaseClient::new(container_with(recording_transport(Arc::clone(&seen)), None))
        .expect("client");

    client.push_middleware(tag("first"), Some("tagger"));
    client.push_middleware(tag("second"), Some("tagger"));
    client.get("ping", json!({})).await.expect("response");

    let layers = client.executor().handler_stack().expect("stack");
    let taggers = layers.layers().iter().filter(|name| *name == "tagger").count();
    assert_eq!(taggers, 1);
    let seen = seen.lock().expect("seen");
    assert_eq!(seen[0].header("x-tag"), Some("second"));
}

#[tokio::test]
async fn handler_stack_is_built_once() {
    let client = BaseClient::new(container_with(recording_transport(Arc::default()), None))
        .expect("client");

    client.get("a", json!({})).await.expect("response");
    let first = client.executor().handler_stack().expect("stack");
    client.get("b", json!({})).await.expect("response");
    let second = client.executor().handler_stack().expect("stack");

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn standard_middlewares_in_order() {
    let client = BaseClient::builder(container_with(recording_transport(Arc::default()), None))
        .eligibility(sdkit::middleware::RequireStatusOk)
        .build()
        .expect("client");
    client.get("a", json!({})).await.expect("response");

    let stack = client.executor().handler_stack().expect("stack");
    insta::assert_snapshot!(stack.layers().join(" > "), @"http_errors > access_token > logger > not_eligible_response > allow_redirects > prepare_body > cookies");
}

#[tokio::test]
async fn logger_sees_the_signed_request() {
    let recorder = Arc::new(Recorder::default());
    let container = container_with(recording_transport(Arc::default()), Some(Arc::clone(&recorder)));
    let client = BaseClient::builder(container)
        .access_token(Arc::new(QueryToken))
        .build()
        .expect("client");

    client.get("menu", json!({"lang": "en"})).await.expect("response");

    let records = recorder.0.lock().expect("records");
    assert_eq!(
        *records,
        vec![(LogLevel::Debug, "GET /menu?lang=en&access_token=t0 200".to_string())]
    );
}

#[tokio::test]
async fn failures_are_logged_at_error_level() {
    let recorder = Arc::new(Recorder::default());
    let failing = Transport::new(tower::service_fn(|_request: Request| async {
        Err::<Response, _>(Error::connection("connection refused"))
    }));
    let client = BaseClient::new(container_with(failing, Some(Arc::clone(&recorder))))
        .expect("client");

    let error = client.get("menu", json!({})).await.expect_err("connection error");
    assert!(error.is_connection());

    let records = recorder.0.lock().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, LogLevel::Error);
}

#[tokio::test]
async fn map_response_middleware_rewrites_responses() {
    let client = BaseClient::new(container_with(recording_transport(Arc::default()), None))
        .expect("client");
    client.push_middleware(
        Middleware::map_response(|request, response| {
            let body = format!(r#"{{"path":"{}","status":{}}}"#, request.url().path(), response.status());
            Ok(Response::new(200, HashMap::new(), Bytes::from(body)))
        }),
        None,
    );

    let casted = client.get("wrapped", json!({})).await.expect("response");
    assert_eq!(casted.to_array(), json!({"path": "/wrapped", "status": 200}));
}

#[tokio::test]
async fn executor_defaults_come_from_the_container() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let transport = recording_transport(Arc::clone(&seen));
    let container = ServiceContainer::builder()
        .config(json!({"http": {"base_uri": "https://api.example.com/"}}))
        .default_options(RequestOptions::new().with_header("X-Sdk", "sdkit"))
        .provider(move |container: &ServiceContainer| {
            container.container().instance(names::HANDLER, transport.clone());
            Ok(())
        })
        .build()
        .expect("container");
    let client = BaseClient::builder(container)
        .default_options(RequestOptions::new().with_header("X-Client", "menu"))
        .build()
        .expect("client");

    client.get("a", json!({})).await.expect("response");

    let seen = seen.lock().expect("seen");
    assert_eq!(seen[0].header("x-sdk"), Some("sdkit"));
    assert_eq!(seen[0].header("x-client"), Some("menu"));
}

#[tokio::test]
async fn too_many_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let container = ServiceContainer::new(json!({
        "http": {"base_uri": format!("{}/", server.uri()), "allow_redirects": {"max": 2}}
    }))
    .expect("container");
    let client = BaseClient::new(container).expect("client");

    let error = client.get("loop", json!({})).await.expect_err("redirect loop");
    assert!(matches!(error, Error::TooManyRedirects { count: 2, max: 2 }));
}

#[tokio::test]
async fn temporary_redirect_preserves_method_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/new"))
        .and(body_string(r#"{"name":"menu"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updated": true})))
        .expect(1)
        .mount(&server)
        .await;

    let container = ServiceContainer::new(json!({
        "http": {"base_uri": format!("{}/", server.uri())}
    }))
    .expect("container");
    let client = BaseClient::new(container).expect("client");

    let casted = client.put("old", json!({"name": "menu"})).await.expect("response");
    assert_eq!(casted.to_array(), json!({"updated": true}));
}

#[tokio::test]
async fn http_errors_can_be_disabled_per_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410).set_body_string("gone"))
        .mount(&server)
        .await;

    let container = ServiceContainer::new(json!({
        "http": {"base_uri": format!("{}/", server.uri())}
    }))
    .expect("container");
    let client = BaseClient::new(container).expect("client");

    let response = client
        .request_raw("gone", Method::Get, RequestOptions::new().with_http_errors(false))
        .await
        .expect("response");
    assert_eq!(response.status(), 410);
    assert_eq!(response.contents(), "gone");
}
