use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::{appointment_routes, AppointmentState};
use shared_utils::clock::FixedClock;
use shared_utils::identity::ClaimsIdentity;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

struct Fixture {
    appointment_id: String,
    professional: TestUser,
    patient: TestUser,
}

fn scheduled_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap()
}

fn create_test_app(mock_server: &MockServer, now: DateTime<Utc>) -> Router {
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_arc();
    let state = AppointmentState::new(config, Arc::new(FixedClock::new(now)), Arc::new(ClaimsIdentity));
    appointment_routes(Arc::new(state))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn setup_appointment(mock_server: &MockServer, status: &str) -> Fixture {
    let fixture = Fixture {
        appointment_id: Uuid::new_v4().to_string(),
        professional: TestUser::professional("pro@example.com"),
        patient: TestUser::patient("patient@example.com"),
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", fixture.appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &fixture.appointment_id,
                &fixture.professional.id,
                &fixture.patient.id,
                scheduled_at(),
                55,
                status,
            )
        ])))
        .mount(mock_server)
        .await;

    fixture
}

fn note_row(fixture: &Fixture, content: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "appointment_id": fixture.appointment_id,
        "professional_id": fixture.professional.id,
        "patient_id": fixture.patient.id,
        "content": content,
        "created_at": "2025-03-04T14:20:00Z",
        "updated_at": "2025-03-04T14:20:00Z"
    })
}

fn put_note(fixture: &Fixture, user: &TestUser, content: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/{}/clinical-note", fixture.appointment_id))
        .header("Authorization", JwtTestUtils::bearer(user))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "content": content }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_window_reports_before_state() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "confirmed").await;
    let app = create_test_app(&mock_server, scheduled_at() - Duration::minutes(6));

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/window", fixture.appointment_id))
        .header("Authorization", JwtTestUtils::bearer(&fixture.patient))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["state"], "BEFORE");
    assert_eq!(json_response["is_editable"], false);
    assert_eq!(json_response["message"], "Editing opens in 1 minute");
    assert_eq!(json_response["recheck_after_seconds"], 60);
}

#[tokio::test]
async fn test_window_requires_participant() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "confirmed").await;
    let stranger = TestUser::patient("someone@example.com");
    let app = create_test_app(&mock_server, scheduled_at());

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/window", fixture.appointment_id))
        .header("Authorization", JwtTestUtils::bearer(&stranger))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_professional_writes_note_in_window() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "in_progress").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/clinical_notes"))
        .and(query_param("on_conflict", "appointment_id"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([note_row(&fixture, "Stable, review labs")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server, scheduled_at() + Duration::minutes(20));
    let response = app
        .oneshot(put_note(&fixture, &fixture.professional, "Stable, review labs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = body_json(response).await;
    assert_eq!(json_response["note"]["content"], "Stable, review labs");
    assert_eq!(json_response["window"]["phase"], "in_progress");
}

#[tokio::test]
async fn test_note_after_window_is_conflict() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "completed").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/clinical_notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server, scheduled_at() + Duration::minutes(61));
    let response = app
        .oneshot(put_note(&fixture, &fixture.professional, "Too late"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json_response = body_json(response).await;
    assert_eq!(json_response["error"], "Editing window has closed");
}

#[tokio::test]
async fn test_patient_cannot_write_note() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "in_progress").await;

    let app = create_test_app(&mock_server, scheduled_at() + Duration::minutes(20));
    let response = app
        .oneshot(put_note(&fixture, &fixture.patient, "Feeling better"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_note_is_404() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "completed").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinical_notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server, scheduled_at());
    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/clinical-note", fixture.appointment_id))
        .header("Authorization", JwtTestUtils::bearer(&fixture.professional))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_join_uses_window_predicate() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "confirmed").await;

    let join = |user: &TestUser| {
        Request::builder()
            .method("POST")
            .uri(format!("/{}/join", fixture.appointment_id))
            .header("Authorization", JwtTestUtils::bearer(user))
            .body(Body::empty())
            .unwrap()
    };

    let open = create_test_app(&mock_server, scheduled_at() - Duration::minutes(5));
    let response = open.oneshot(join(&fixture.patient)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["allowed"], true);

    let closed = create_test_app(&mock_server, scheduled_at() + Duration::minutes(61));
    let response = closed.oneshot(join(&fixture.professional)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json_response = body_json(response).await;
    assert_eq!(json_response["allowed"], false);
    assert_eq!(json_response["window"]["state"], "EXPIRED");
}

#[tokio::test]
async fn test_cancelled_appointment_cannot_be_joined() {
    let mock_server = MockServer::start().await;
    let fixture = setup_appointment(&mock_server, "cancelled").await;

    let app = create_test_app(&mock_server, scheduled_at());
    let request = Request::builder()
        .method("POST")
        .uri(format!("/{}/join", fixture.appointment_id))
        .header("Authorization", JwtTestUtils::bearer(&fixture.patient))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_json(response).await["allowed"], false);
}

#[tokio::test]
async fn test_unknown_appointment_is_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let professional = TestUser::professional("pro@example.com");
    let app = create_test_app(&mock_server, scheduled_at());
    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}/window", Uuid::new_v4()))
        .header("Authorization", JwtTestUtils::bearer(&professional))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
