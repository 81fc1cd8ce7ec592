//! Integration tests for the HTTP-backed API client.
//!
//! Each test spins up an Axum fake backend on a random port that records
//! every request and answers from a canned route table, then drives the
//! real `HttpApiClient` against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use identity_wizard::api::{ApiClient, HttpApiClient};
use identity_wizard::config::UserIdStrategy;
use identity_wizard::error::{ApiError, TRANSPORT_FAILURE_MESSAGE};
use identity_wizard::flow::model::{
    AnalyticsEventName, AnalyticsEventPayload, IdentityModelCard, OnboardingInput,
    OnboardingProfile, PersonaConstitution, RiskTolerance,
};
use identity_wizard::identity::{StableUserId, USER_ID_STORAGE_KEY};
use identity_wizard::normalize::DayArticleRequest;
use identity_wizard::storage::{KeyValueStore, MemoryStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const USER_ID: &str = "user_fixed01";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    body: Value,
}

#[derive(Default)]
struct FakeBackend {
    routes: Mutex<HashMap<(Method, String), (StatusCode, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeBackend {
    fn respond(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.respond_raw(method, path, status, body.to_string());
    }

    fn respond_raw(&self, method: Method, path: &str, status: StatusCode, body: String) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, format!("/v1{path}")), (status, body));
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn request(&self, method: Method, path: &str) -> Recorded {
        let path = format!("/v1{path}");
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path == path)
            .unwrap_or_else(|| panic!("no {method} {path} recorded"))
    }
}

async fn handle(
    State(backend): State<Arc<FakeBackend>>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, String) {
    let path = uri.path().to_string();
    backend.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });
    backend
        .routes
        .lock()
        .unwrap()
        .get(&(method, path))
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, String::new()))
}

/// Start the fake backend on a random port, return (client, backend).
async fn start_backend() -> (HttpApiClient, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::default());
    let app = Router::new()
        .fallback(handle)
        .with_state(Arc::clone(&backend));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (client_for(&format!("http://127.0.0.1:{port}/")), backend)
}

fn client_for(base: &str) -> HttpApiClient {
    let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    storage.set(USER_ID_STORAGE_KEY, USER_ID).unwrap();
    HttpApiClient::new(
        base,
        Arc::new(StableUserId::new(storage, UserIdStrategy::Uuid)),
    )
}

fn model(id: &str) -> IdentityModelCard {
    IdentityModelCard {
        id: id.to_string(),
        title: "Model".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn onboarding_runs_create_complete_fetch_in_order() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(
            Method::POST,
            "/onboarding/sessions",
            StatusCode::OK,
            json!({"id": "session_9"}),
        );
        backend.respond(
            Method::POST,
            "/onboarding/sessions/session_9/complete",
            StatusCode::OK,
            json!({"status": "ok"}),
        );
        backend.respond(
            Method::GET,
            "/onboarding/sessions/session_9/profile",
            StatusCode::OK,
            json!({
                "skill_stack_json": "[\"写作\",\"剪辑\"]",
                "interest_energy_curve_json": [{"interest": "效率"}, {"name": "理财"}],
                "cognitive_style": "结构化",
                "value_boundaries_json": ["不夸大"],
                "risk_tolerance": 5,
                "time_investment_hours": 9
            }),
        );

        let session_id = client.create_onboarding_session().await.unwrap();
        assert_eq!(session_id, "session_9");

        let input = OnboardingInput {
            skills: vec!["写作".into()],
            interests: vec!["效率".into()],
            risk_tolerance: RiskTolerance::Low,
            weekly_hours: 4,
            ..Default::default()
        };
        let profile = client.complete_onboarding(&session_id, &input).await.unwrap();
        assert_eq!(profile.skill_stack, ["写作", "剪辑"]);
        assert_eq!(profile.energy_curve, ["效率", "理财"]);
        assert_eq!(profile.risk_tolerance, RiskTolerance::High);
        assert_eq!(profile.weekly_hours, 9);
        assert_eq!(profile.recommended_platforms, ["小红书", "公众号", "视频号"]);

        let order: Vec<_> = backend
            .requests()
            .into_iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect();
        assert_eq!(
            order,
            [
                "POST /v1/onboarding/sessions",
                "POST /v1/onboarding/sessions/session_9/complete",
                "GET /v1/onboarding/sessions/session_9/profile",
            ]
        );

        let created = backend.request(Method::POST, "/onboarding/sessions");
        assert_eq!(created.body, json!({"user_id": USER_ID}));

        let complete = backend.request(Method::POST, "/onboarding/sessions/session_9/complete");
        assert_eq!(complete.body["risk_tolerance"], 1);
        assert_eq!(complete.body["time_investment_hours"], 4);
        assert_eq!(complete.body["interest_energy_curve"], json!([{"interest": "效率"}]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn identity_models_are_normalized() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(
            Method::POST,
            "/identity-models/generate",
            StatusCode::OK,
            json!({"ok": true}),
        );
        backend.respond(
            Method::GET,
            &format!("/identity-models/users/{USER_ID}"),
            StatusCode::OK,
            json!([
                {
                    "id": "im_1",
                    "title": "效率教练",
                    "tone_examples_json": "[\"a\",\"b\",\"c\",\"d\",\"e\"]",
                    "monetization_validation_order_json": ["咨询", "课程"],
                    "growth_path_0_3m": "起步",
                    "growth_path_3_12m": "放大"
                },
                {"id": 2, "title": "", "tone_examples_json": "bad json"}
            ]),
        );

        let profile = OnboardingProfile {
            energy_curve: vec!["效率".into(), "理财".into()],
            ..Default::default()
        };
        let models = client.generate_identity_models(&profile).await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].tone_examples.len(), 5);
        assert_eq!(models[0].monetization_map, "咨询 -> 课程");
        assert_eq!(models[0].growth_path.year_one, "放大");
        assert_eq!(models[1].id, "2");
        assert_eq!(models[1].title, "未命名身份");
        assert!(models[1].tone_examples.is_empty());
        assert!(!models[1].validation_warnings().is_empty());

        let sent = backend.request(Method::POST, "/identity-models/generate");
        assert_eq!(sent.body["user_id"], USER_ID);
        assert_eq!(sent.body["count"], 3);
        assert_eq!(
            sent.body["capability_profile"]["interest_energy_curve"],
            json!([{"interest": "效率"}, {"interest": "理财"}])
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn day_article_body_matches_contract() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(
            Method::POST,
            "/launch-kits/day-articles/generate",
            StatusCode::OK,
            json!({"day_no": 2, "title": "第二天", "markdown": "# 标题"}),
        );

        let article = client
            .generate_day_article(&DayArticleRequest {
                identity_model: model("im_1"),
                day_no: 2,
                theme: "主题".into(),
                draft_outline: "提纲".into(),
                opening: "开场".into(),
            })
            .await
            .unwrap();
        assert_eq!(article.day_no, 2);
        assert_eq!(article.markdown, "# 标题");

        let sent = backend.request(Method::POST, "/launch-kits/day-articles/generate");
        assert_eq!(
            sent.body,
            json!({
                "user_id": USER_ID,
                "identity_model_id": "im_1",
                "constitution_id": null,
                "day_no": 2,
                "theme": "主题",
                "draft_or_outline": "提纲",
                "opening_text": "开场"
            })
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn consistency_score_from_backend_is_authoritative() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(
            Method::POST,
            "/consistency-checks",
            StatusCode::OK,
            json!({
                "deviation_items": ["语气偏离", "用词偏离", "立场偏离"],
                "deviation_reasons": ["r1"],
                "suggestions": ["s1"],
                "risk_warning": "有风险",
                "score": 74
            }),
        );

        let result = client
            .run_consistency_check("草稿", &model("im_1"), &PersonaConstitution::default())
            .await
            .unwrap();
        assert_eq!(result.score, 74);
        assert_eq!(result.deviations.len(), 3);
        assert_eq!(result.risk_warning.as_deref(), Some("有风险"));

        let sent = backend.request(Method::POST, "/consistency-checks");
        assert_eq!(sent.body["draft_text"], "草稿");
        assert_eq!(sent.body["identity_model_id"], "im_1");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn out_of_range_score_is_a_protocol_violation() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        for score in [json!(140), json!("high"), Value::Null, json!(-1), json!(7.5)] {
            backend.respond(
                Method::POST,
                "/consistency-checks",
                StatusCode::OK,
                json!({"deviation_items": [], "score": score}),
            );
            let err = client
                .run_consistency_check("草稿", &model("im_1"), &PersonaConstitution::default())
                .await
                .unwrap_err();
            assert!(err.is_protocol_violation(), "score {score}: {err:?}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn event_body_carries_stage_and_metadata() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(Method::POST, "/events", StatusCode::OK, json!({"ok": true}));

        let mut metadata = serde_json::Map::new();
        metadata.insert("score".into(), json!(74));
        client
            .track_event(&AnalyticsEventPayload {
                event_name: AnalyticsEventName::ConsistencyCheckTriggered,
                user_id: USER_ID.into(),
                timestamp: Utc::now(),
                identity_id: Some("im_1".into()),
                metadata: Some(metadata),
            })
            .await
            .unwrap();

        let sent = backend.request(Method::POST, "/events");
        assert_eq!(sent.body["user_id"], USER_ID);
        assert_eq!(sent.body["event_name"], "consistency_check_triggered");
        assert_eq!(sent.body["stage"], "MVP");
        assert_eq!(sent.body["identity_model_id"], "im_1");
        assert_eq!(sent.body["payload"]["score"], 74);
        assert!(sent.body["payload"]["timestamp"].as_str().unwrap().ends_with('Z'));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn error_statuses_map_to_taxonomy() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;

        backend.respond(
            Method::POST,
            "/onboarding/sessions",
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"detail": [{"msg": "user_id 必填"}, {"msg": "格式错误"}]}),
        );
        let err = client.create_onboarding_session().await.unwrap_err();
        assert!(matches!(err, ApiError::Validation { .. }));
        assert_eq!(err.to_string(), "user_id 必填；格式错误");

        backend.respond(
            Method::POST,
            "/onboarding/sessions",
            StatusCode::BAD_REQUEST,
            json!({"detail": "参数错误啦"}),
        );
        let err = client.create_onboarding_session().await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
        assert_eq!(err.to_string(), "参数错误啦");

        backend.respond_raw(
            Method::POST,
            "/onboarding/sessions",
            StatusCode::SERVICE_UNAVAILABLE,
            String::new(),
        );
        let err = client.create_onboarding_session().await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 503, .. }));

        // Unrouted path: the fake backend answers 404 with an empty body.
        let err = client.list_experiments().await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));

        backend.respond_raw(
            Method::POST,
            "/onboarding/sessions",
            StatusCode::OK,
            "<html>".into(),
        );
        let err = client.create_onboarding_session().await.unwrap_err();
        assert!(err.is_protocol_violation());

        backend.respond(
            Method::POST,
            "/onboarding/sessions",
            StatusCode::OK,
            json!({"no_id": true}),
        );
        let err = client.create_onboarding_session().await.unwrap_err();
        assert!(err.is_protocol_violation());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    timeout(TEST_TIMEOUT, async {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = client_for(&format!("http://127.0.0.1:{port}"));
        let err = client.create_onboarding_session().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
        assert_eq!(err.to_string(), TRANSPORT_FAILURE_MESSAGE);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn generated_resources_are_fetched_by_id() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(
            Method::POST,
            "/monetization-maps/generate",
            StatusCode::OK,
            json!({"id": 31}),
        );
        backend.respond(
            Method::GET,
            "/monetization-maps/31",
            StatusCode::OK,
            json!({
                "primary_path": "咨询",
                "backup_path": "课程",
                "weeks_json": [
                    {"week_no": 1, "goal": "g1"},
                    {"week_no": 0, "goal": "dropped"},
                    {"week_no": 2, "goal": "g2"}
                ]
            }),
        );

        let map = client.generate_monetization_map(&model("im_1")).await.unwrap();
        assert_eq!(map.primary_path, "咨询");
        let weeks: Vec<_> = map.weeks.iter().map(|w| w.week_no).collect();
        assert_eq!(weeks, [1, 2]);

        let sent = backend.request(Method::POST, "/monetization-maps/generate");
        assert_eq!(
            sent.body,
            json!({"user_id": USER_ID, "identity_model_id": "im_1"})
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn content_matrix_is_generated_then_fetched() {
    timeout(TEST_TIMEOUT, async {
        let (client, backend) = start_backend().await;
        backend.respond(
            Method::POST,
            "/content-matrices/generate",
            StatusCode::OK,
            json!({"id": "cm_9"}),
        );
        backend.respond(
            Method::GET,
            "/content-matrices/cm_9",
            StatusCode::OK,
            json!({
                "matrix_json": "[{\"pillar\": \"方法论\", \"topics\": [\"复盘\"], \"platform_rewrites\": {\"小红书\": \"清单版\"}}, {\"pillar\": \" \"}]"
            }),
        );

        let matrix = client.generate_content_matrix(&model("im_2")).await.unwrap();
        assert_eq!(matrix.pillars.len(), 1);
        assert_eq!(matrix.pillars[0].pillar, "方法论");
        assert_eq!(matrix.pillars[0].topics, ["复盘"]);
        assert_eq!(matrix.pillars[0].platform_rewrites["小红书"], ["清单版"]);

        let sent = backend.request(Method::POST, "/content-matrices/generate");
        assert_eq!(
            sent.body,
            json!({"user_id": USER_ID, "identity_model_id": "im_2"})
        );
        assert_eq!(backend.requests().len(), 2);
    })
    .await
    .expect("test timed out");
}
