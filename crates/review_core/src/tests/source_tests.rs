use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{KanjiId, KanjiRecord},
    error::{ApiError, ErrorCode},
    protocol::{KanjiAnswer, LoginResponse, SubmitAnswersRequest, TelegramCredential},
};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

const TOKEN: &str = "secret-token";

#[derive(Clone, Default)]
struct ServerState {
    inner: Arc<Mutex<Recorded>>,
}

#[derive(Default)]
struct Recorded {
    answers: Vec<SubmitAnswersRequest>,
    learn_more: usize,
    bare_array: bool,
    fail_fetch: bool,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"))
}

async fn handle_login(Json(credential): Json<TelegramCredential>) -> impl IntoResponse {
    if credential.hash != "valid" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(LoginResponse {
        token: TOKEN.to_string(),
    })
    .into_response()
}

async fn handle_kanjis(State(state): State<ServerState>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let recorded = state.inner.lock().await;
    if recorded.fail_fetch {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::Internal, "database locked")),
        )
            .into_response();
    }
    let kanjis = vec![KanjiRecord::new(4, "青", "blue").with_example("青い", "あおい")];
    if recorded.bare_array {
        Json(serde_json::json!(kanjis)).into_response()
    } else {
        Json(serde_json::json!({ "kanjis": kanjis, "total_pending": 12 })).into_response()
    }
}

async fn handle_answers(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitAnswersRequest>,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.inner.lock().await.answers.push(payload);
    StatusCode::OK
}

async fn handle_learn_more(State(state): State<ServerState>, headers: HeaderMap) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    state.inner.lock().await.learn_more += 1;
    StatusCode::OK
}

async fn spawn_review_server() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/login", post(handle_login))
        .route("/api/kanjis", get(handle_kanjis))
        .route("/api/answers", post(handle_answers))
        .route("/api/learn-more", post(handle_learn_more))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/"), state))
}

fn credential(hash: &str) -> TelegramCredential {
    TelegramCredential {
        id: 42,
        first_name: "Aki".into(),
        last_name: None,
        username: "aki".into(),
        photo_url: None,
        auth_date: 1_700_000_000,
        hash: hash.into(),
    }
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let (server_url, _state) = spawn_review_server().await.expect("spawn server");
    let source = HttpReviewSource::new(server_url);

    let err = source.fetch_review_batch().await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn login_stores_token_for_later_calls() {
    let (server_url, _state) = spawn_review_server().await.expect("spawn server");
    let source = HttpReviewSource::new(server_url);

    let rejected = source.authenticate(&credential("forged")).await.unwrap_err();
    assert!(rejected.is_unauthorized());
    assert!(!source.has_token().await);

    let token = source.authenticate(&credential("valid")).await.expect("login");
    assert_eq!(token, TOKEN);

    let batch = source.fetch_review_batch().await.expect("fetch");
    assert_eq!(batch.total_pending, 12);
    assert_eq!(batch.kanjis[0].id, KanjiId(4));
    assert_eq!(batch.kanjis[0].examples[0].reading, "あおい");
}

#[tokio::test]
async fn accepts_bare_array_batches() {
    let (server_url, state) = spawn_review_server().await.expect("spawn server");
    state.inner.lock().await.bare_array = true;
    let source = HttpReviewSource::new(server_url);
    source.set_token(Some(TOKEN.into())).await;

    let batch = source.fetch_review_batch().await.expect("fetch");
    assert_eq!(batch.kanjis.len(), 1);
    assert_eq!(batch.total_pending, 1);
}

#[tokio::test]
async fn posts_answers_and_learn_more() {
    let (server_url, state) = spawn_review_server().await.expect("spawn server");
    let source = HttpReviewSource::new(server_url);
    source.set_token(Some(TOKEN.into())).await;

    source
        .submit_batch_result(&[KanjiAnswer {
            kanji_id: KanjiId(4),
            incorrect_streak: 3,
        }])
        .await
        .expect("answers");
    source
        .request_additional_material()
        .await
        .expect("learn more");

    let recorded = state.inner.lock().await;
    assert_eq!(recorded.answers.len(), 1);
    assert_eq!(recorded.answers[0].answers[0].incorrect_streak, 3);
    assert_eq!(recorded.learn_more, 1);
}

#[tokio::test]
async fn server_errors_keep_message() {
    let (server_url, state) = spawn_review_server().await.expect("spawn server");
    state.inner.lock().await.fail_fetch = true;
    let source = HttpReviewSource::new(server_url);
    source.set_token(Some(TOKEN.into())).await;

    match source.fetch_review_batch().await.unwrap_err() {
        SourceError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database locked");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let (server_url, _state) = spawn_review_server().await.expect("spawn server");
    let source = HttpReviewSource::new(server_url);
    source.set_token(Some("stale".into())).await;

    let err = source.request_additional_material().await.unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn session_runs_against_http_backend() {
    let (server_url, state) = spawn_review_server().await.expect("spawn server");
    let source = Arc::new(HttpReviewSource::new(server_url));
    let mut session = SessionController::new(
        source,
        SessionOptions {
            correct_delay: std::time::Duration::ZERO,
            incorrect_delay: std::time::Duration::ZERO,
            shuffle: false,
        },
    );

    session.login(&credential("valid")).await.expect("login");
    assert_eq!(session.remaining(), 2);
    assert_eq!(session.total_pending(), 12);

    for text in ["blue", "aoi"] {
        let Transition::Evaluated { correct, effect } = session.submit_answer(text) else {
            panic!("answer not evaluated");
        };
        assert!(correct);
        session.settle(effect).await.expect("settle");
    }

    // The drained batch is reported and the backend hands out the next one.
    assert_eq!(session.phase(), SessionPhase::Active);
    let recorded = state.inner.lock().await;
    assert_eq!(recorded.answers.len(), 1);
    assert_eq!(
        recorded.answers[0].answers,
        vec![KanjiAnswer {
            kanji_id: KanjiId(4),
            incorrect_streak: 0
        }]
    );
}
