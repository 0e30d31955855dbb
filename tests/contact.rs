use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{Method, Request, StatusCode, header},
};
use futures_util::future::BoxFuture;
use serde_json::{Value, json};
use storefront::{
    AppState,
    clock::ManualClock,
    config::Config,
    error::NotifyError,
    router::{Stages, create_router},
    routes::contact::{ContactNotifier, model::ContactSubmission},
};
use tower::ServiceExt;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<ContactSubmission>>,
}

impl ContactNotifier for Recorder {
    fn notify<'a>(
        &'a self,
        submission: &'a ContactSubmission,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.seen.lock().unwrap().push(submission.clone());
            Ok(())
        })
    }
}

struct Unreachable;

impl ContactNotifier for Unreachable {
    fn notify<'a>(
        &'a self,
        _submission: &'a ContactSubmission,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async { Err(NotifyError::Delivery("smtp timeout".into())) })
    }
}

const CLIENT: [u8; 4] = [198, 51, 100, 20];

fn app(notifier: Arc<dyn ContactNotifier>) -> (Router, Arc<ManualClock>) {
    let config = Config::default();
    let clock = Arc::new(ManualClock::new(0));
    let stages = Stages::from_config(&config, clock.clone());
    let state = AppState::new(config, notifier);
    (create_router(state, &stages), clock)
}

fn with_client(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 61000))));
    req
}

fn contact_request(body: Value) -> Request<Body> {
    with_client(
        Request::builder()
            .method(Method::POST)
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        CLIENT,
    )
}

fn valid_form() -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "subject": "Hedge trimmer",
        "message": "Do you ship to the countryside?"
    })
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn accepted_submission_reaches_the_notifier() {
    let recorder = Arc::new(Recorder::default());
    let (app, _) = app(recorder.clone());

    let resp = app.oneshot(contact_request(valid_form())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["code"], 0);
    assert_eq!(body["msg"], "success");

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].email, "ada@example.com");
    assert_eq!(body["resp_data"]["id"], seen[0].id.as_str());
}

#[tokio::test]
async fn invalid_submission_is_a_400() {
    let recorder = Arc::new(Recorder::default());
    let (app, _) = app(recorder.clone());

    let resp = app
        .oneshot(contact_request(json!({
            "name": "Ada",
            "email": "not-an-address",
            "message": "hi"
        })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], 1000);
    assert!(recorder.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn notifier_failure_is_a_502() {
    let (app, _) = app(Arc::new(Unreachable));
    let resp = app.oneshot(contact_request(valid_form())).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(resp).await["code"], 1006);
}

#[tokio::test]
async fn fourth_submission_in_fifteen_minutes_is_rejected() {
    let (app, clock) = app(Arc::new(Recorder::default()));

    for _ in 0..3 {
        let resp = app.clone().oneshot(contact_request(valid_form())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    clock.set(60_000);
    let rejected = app.clone().oneshot(contact_request(valid_form())).await.unwrap();
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(rejected.headers().get(header::RETRY_AFTER).unwrap(), "840");
    let body = json_body(rejected).await;
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(
        body["message"],
        "Too many contact requests from this IP, please try again after 15 minutes."
    );
    assert_eq!(body["retryAfter"], 840);

    let health = app
        .clone()
        .oneshot(with_client(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
            CLIENT,
        ))
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    clock.set(15 * 60 * 1000);
    let reopened = app.oneshot(contact_request(valid_form())).await.unwrap();
    assert_eq!(reopened.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_responses_go_through_the_cache() {
    let (app, _) = app(Arc::new(Recorder::default()));

    let get_health = || {
        with_client(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
            CLIENT,
        )
    };

    let first = app.clone().oneshot(get_health()).await.unwrap();
    assert_eq!(first.headers().get("x-cache").unwrap(), "MISS");
    let second = app.oneshot(get_health()).await.unwrap();
    assert_eq!(second.headers().get("x-cache").unwrap(), "HIT");
    assert_eq!(json_body(second).await["resp_data"]["status"], "ok");
}
