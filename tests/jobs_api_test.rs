mod common;

use ats_backend::models::user::Role;
use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use common::{app, body_json, empty_request, json_request, token};

#[tokio::test]
async fn public_listing_rejects_unknown_sort_field() {
    let response = app()
        .oneshot(empty_request("GET", "/api/v1/jobs?sort=-password_hash", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_listing_rejects_bad_filter_values() {
    let response = app()
        .oneshot(empty_request("GET", "/api/v1/jobs?employment_type=gig", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn candidates_cannot_post_jobs() {
    let payload = json!({
        "title": "Lead Educator",
        "description": "Plan and lead daily activities for toddlers.",
        "employment_type": "full_time",
        "location": "Riverside"
    });
    let response = app()
        .oneshot(json_request(
            "POST",
            "/api/v1/jobs",
            Some(&token(Role::Candidate)),
            payload,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn hr_managers_cannot_edit_jobs() {
    let uri = format!("/api/v1/jobs/{}", Uuid::new_v4());
    let response = app()
        .oneshot(json_request(
            "PATCH",
            &uri,
            Some(&token(Role::HrManager)),
            json!({ "title": "Renamed" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn job_payload_is_validated_before_lookup() {
    let payload = json!({
        "title": "QA",
        "description": "too short",
        "employment_type": "contract",
        "location": "Remote",
        "salary_min": 90000,
        "salary_max": 50000
    });
    let response = app()
        .oneshot(json_request(
            "POST",
            "/api/v1/jobs",
            Some(&token(Role::Recruiter)),
            payload,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("title"));
}

#[tokio::test]
async fn export_needs_staff_role() {
    let uri = format!("/api/v1/jobs/{}/applications/export", Uuid::new_v4());
    let anonymous = app()
        .oneshot(empty_request("GET", &uri, None))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let candidate = app()
        .oneshot(empty_request("GET", &uri, Some(&token(Role::Candidate))))
        .await
        .unwrap();
    assert_eq!(candidate.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unsupported_method_on_jobs_collection() {
    let response = app()
        .oneshot(empty_request("PUT", "/api/v1/jobs", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
