pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::auth::handlers as auth;
use crate::models::staff::StaffKind;
use crate::reports::handlers as reports;
use crate::staff;
use crate::state::AppState;
use crate::students::{documents, handlers as students};
use crate::summary::handlers as summary;
use crate::users::handlers as users;

/// Request bodies above this are rejected before reaching a handler.
/// Leaves headroom over the 5 MiB document limit for multipart framing.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route(
            "/api/v1/auth/change-password",
            post(auth::handle_change_password),
        )
        // Users
        .route("/api/v1/users/me", get(users::handle_me))
        .route(
            "/api/v1/users",
            get(users::handle_list_users).post(users::handle_create_user),
        )
        .route("/api/v1/users/:id", get(users::handle_get_user))
        // Students
        .route(
            "/api/v1/students",
            get(students::handle_list_students).post(students::handle_create_student),
        )
        .route(
            "/api/v1/students/:id",
            get(students::handle_get_student)
                .put(students::handle_update_student)
                .delete(students::handle_delete_student),
        )
        .route(
            "/api/v1/students/:id/case-record",
            put(students::handle_update_case_record),
        )
        .route("/api/v1/students/:id/photo", post(students::handle_upload_photo))
        .route(
            "/api/v1/students/:id/documents",
            get(documents::handle_list_documents).post(documents::handle_upload_document),
        )
        .route(
            "/api/v1/students/:id/documents/:document_id",
            get(documents::handle_download_document).delete(documents::handle_delete_document),
        )
        // Staff
        .nest("/api/v1/teachers", staff::routes(StaffKind::Teacher))
        .nest("/api/v1/therapists", staff::routes(StaffKind::Therapist))
        // Therapy reports and summaries
        .route("/api/v1/therapy-reports", post(reports::handle_create_report))
        .route(
            "/api/v1/therapy-reports/student/:student_id",
            get(reports::handle_list_student_reports),
        )
        .route(
            "/api/v1/therapy-reports/summary",
            post(summary::handle_plain_summary),
        )
        .route(
            "/api/v1/therapy-reports/summary/ai",
            post(summary::handle_ai_summary),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::ai_client::AiProviders;
    use crate::auth::jwt::TokenKeys;
    use crate::state::testing::offline_state;

    fn state() -> AppState {
        offline_state(AiProviders::default())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = build_router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "school-api");
    }

    #[tokio::test]
    async fn test_protected_route_without_token_is_unauthorized() {
        let response = build_router(state())
            .oneshot(Request::get("/api/v1/students").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Not authenticated");
    }

    #[tokio::test]
    async fn test_garbage_token_is_unauthorized() {
        let request = Request::get("/api/v1/therapists")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let response = build_router(state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_signed_with_other_key_is_unauthorized() {
        let token = TokenKeys::new("some-other-secret", 30).issue(1).unwrap();
        let request = Request::post("/api/v1/therapy-reports/summary/ai")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"student_id": "STU2025001"}"#))
            .unwrap();
        let response = build_router(state()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = build_router(state())
            .oneshot(Request::get("/api/v1/resumes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
