//! Teacher and therapist records. Both tables are served by the same
//! handlers; the nested router tells them which table via `Extension<StaffKind>`.

use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::models::staff::StaffKind;
use crate::state::AppState;

pub mod handlers;
pub mod repository;

pub fn routes(kind: StaffKind) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::handle_list_staff).post(handlers::handle_create_staff),
        )
        .route(
            "/:id",
            get(handlers::handle_get_staff)
                .put(handlers::handle_update_staff)
                .delete(handlers::handle_delete_staff),
        )
        .route("/:id/photo", post(handlers::handle_upload_staff_photo))
        .layer(Extension(kind))
}
