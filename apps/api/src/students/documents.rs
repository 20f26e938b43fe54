//! PDF documents attached to a student, kept in the `documents` JSONB array.
//! Every mutation locks the student row so concurrent uploads and deletes
//! never drop each other's changes.

use axum::{
    extract::{Multipart, State},
    Json,
};
use base64::Engine as _;
use chrono::Local;
use serde::Serialize;
use sqlx::types::Json as SqlJson;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::extract::AppPath;
use crate::media::{read_file_field, UploadedFile};
use crate::models::student::{DocumentSummary, StudentDocument};
use crate::state::AppState;
use crate::students::repository;

pub const MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub document_id: String,
    pub document_name: String,
    pub file_size: i64,
    pub total_documents: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentDownload {
    pub id: String,
    pub name: String,
    /// `data:application/pdf;base64,...`
    pub file_data: String,
    pub upload_date: chrono::NaiveDateTime,
    pub file_size: i64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub document_name: String,
}

/// Checks the upload is a PDF of acceptable size and returns its file name.
pub fn validate_pdf_upload(upload: &UploadedFile) -> Result<String, AppError> {
    let name = upload
        .file_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::Validation("Only PDF files are allowed".to_string()))?;
    if !name.to_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation("Only PDF files are allowed".to_string()));
    }
    if upload.data.len() > MAX_DOCUMENT_BYTES {
        return Err(AppError::Validation(format!(
            "File size exceeds 5MB limit. File size: {:.2}MB",
            upload.data.len() as f64 / (1024.0 * 1024.0)
        )));
    }
    Ok(name.to_string())
}

async fn lock_documents(
    tx: &mut Transaction<'_, Postgres>,
    student_id: i32,
) -> Result<Vec<StudentDocument>, AppError> {
    let row: Option<Option<SqlJson<Vec<StudentDocument>>>> =
        sqlx::query_scalar("SELECT documents FROM students WHERE id = $1 FOR UPDATE")
            .bind(student_id)
            .fetch_optional(&mut **tx)
            .await?;
    match row {
        None => Err(AppError::NotFound("Student not found".to_string())),
        Some(docs) => Ok(docs.map(|d| d.0).unwrap_or_default()),
    }
}

async fn store_documents(
    tx: &mut Transaction<'_, Postgres>,
    student_id: i32,
    documents: &[StudentDocument],
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE students SET documents = $1 WHERE id = $2")
        .bind(SqlJson(documents))
        .bind(student_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Appends a document and returns the new document count.
pub async fn append_document(
    pool: &PgPool,
    student_id: i32,
    document: StudentDocument,
) -> Result<usize, AppError> {
    let mut tx = pool.begin().await?;
    let mut documents = lock_documents(&mut tx, student_id).await?;
    documents.push(document);
    store_documents(&mut tx, student_id, &documents).await?;
    tx.commit().await?;
    Ok(documents.len())
}

/// Removes a document by id and returns it.
pub async fn remove_document(
    pool: &PgPool,
    student_id: i32,
    document_id: &str,
) -> Result<StudentDocument, AppError> {
    let mut tx = pool.begin().await?;
    let mut documents = lock_documents(&mut tx, student_id).await?;
    let position = documents
        .iter()
        .position(|d| d.id == document_id)
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
    let removed = documents.remove(position);
    store_documents(&mut tx, student_id, &documents).await?;
    tx.commit().await?;
    Ok(removed)
}

async fn load_documents(pool: &PgPool, student_id: i32) -> Result<Vec<StudentDocument>, AppError> {
    let student = repository::find(pool, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    Ok(student.documents.map(|d| d.0).unwrap_or_default())
}

/// POST /api/v1/students/:id/documents
pub async fn handle_upload_document(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(student_id): AppPath<i32>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = read_file_field(&mut multipart).await?;
    let name = validate_pdf_upload(&upload)?;

    let document = StudentDocument {
        id: Uuid::new_v4().to_string(),
        name: name.clone(),
        file_data: base64::engine::general_purpose::STANDARD.encode(&upload.data),
        upload_date: Local::now().naive_local(),
        file_size: upload.data.len() as i64,
    };
    let document_id = document.id.clone();
    let file_size = document.file_size;

    let total_documents = append_document(&state.db, student_id, document).await?;
    info!(
        "User {} attached {name} ({file_size} bytes) to student {student_id}",
        user.id()
    );

    Ok(Json(UploadResponse {
        message: "Document uploaded successfully",
        document_id,
        document_name: name,
        file_size,
        total_documents,
    }))
}

/// GET /api/v1/students/:id/documents
pub async fn handle_list_documents(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath(student_id): AppPath<i32>,
) -> Result<Json<DocumentList>, AppError> {
    let documents: Vec<DocumentSummary> = load_documents(&state.db, student_id)
        .await?
        .iter()
        .map(DocumentSummary::from)
        .collect();
    Ok(Json(DocumentList {
        total: documents.len(),
        documents,
    }))
}

/// GET /api/v1/students/:id/documents/:document_id
pub async fn handle_download_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    AppPath((student_id, document_id)): AppPath<(i32, String)>,
) -> Result<Json<DocumentDownload>, AppError> {
    let document = load_documents(&state.db, student_id)
        .await?
        .into_iter()
        .find(|d| d.id == document_id)
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

    Ok(Json(DocumentDownload {
        file_data: format!("data:application/pdf;base64,{}", document.file_data),
        id: document.id,
        name: document.name,
        upload_date: document.upload_date,
        file_size: document.file_size,
    }))
}

/// DELETE /api/v1/students/:id/documents/:document_id
pub async fn handle_delete_document(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath((student_id, document_id)): AppPath<(i32, String)>,
) -> Result<Json<DeleteResponse>, AppError> {
    let removed = remove_document(&state.db, student_id, &document_id).await?;
    info!(
        "User {} removed document {} from student {student_id}",
        user.id(),
        removed.id
    );
    Ok(Json(DeleteResponse {
        message: "Document deleted successfully",
        document_name: removed.name,
    }))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn upload(name: Option<&str>, len: usize) -> UploadedFile {
        UploadedFile {
            file_name: name.map(str::to_string),
            content_type: Some("application/pdf".into()),
            data: Bytes::from(vec![b'%'; len]),
        }
    }

    #[test]
    fn test_pdf_extension_is_case_insensitive() {
        assert_eq!(
            validate_pdf_upload(&upload(Some("Certificate.PDF"), 10)).unwrap(),
            "Certificate.PDF"
        );
    }

    #[test]
    fn test_non_pdf_rejected() {
        for name in [Some("photo.png"), Some("notes.pdf.txt"), None] {
            match validate_pdf_upload(&upload(name, 10)) {
                Err(AppError::Validation(msg)) => assert_eq!(msg, "Only PDF files are allowed"),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_size_limit_reports_megabytes() {
        assert!(validate_pdf_upload(&upload(Some("a.pdf"), MAX_DOCUMENT_BYTES)).is_ok());
        match validate_pdf_upload(&upload(Some("a.pdf"), 6 * 1024 * 1024)) {
            Err(AppError::Validation(msg)) => assert!(msg.ends_with("File size: 6.00MB"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn document(id: &str, name: &str, payload: &[u8]) -> StudentDocument {
        StudentDocument {
            id: id.to_string(),
            name: name.to_string(),
            file_data: base64::engine::general_purpose::STANDARD.encode(payload),
            upload_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
            file_size: payload.len() as i64,
        }
    }

    async fn new_student(pool: &PgPool) -> i32 {
        let profile = crate::models::student::StudentProfile {
            name: Some("Anu".into()),
            ..Default::default()
        };
        let today = chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        repository::insert(pool, &profile, today).await.unwrap().id
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_documents_append_then_remove(pool: PgPool) {
        let student_id = new_student(&pool).await;
        let iep = document("doc-1", "iep.pdf", b"%PDF-1.4 iep");
        let report = document("doc-2", "report.pdf", b"%PDF-1.4 report");

        assert_eq!(append_document(&pool, student_id, iep.clone()).await.unwrap(), 1);
        assert_eq!(append_document(&pool, student_id, report).await.unwrap(), 2);

        let stored = repository::find(&pool, student_id).await.unwrap().unwrap();
        let first = &stored.documents()[0];
        assert_eq!(first.name, "iep.pdf");
        assert_eq!(first.file_data, iep.file_data);
        assert_eq!(first.upload_date, iep.upload_date);
        assert_eq!(stored.documents()[1].id, "doc-2");

        let removed = remove_document(&pool, student_id, "doc-1").await.unwrap();
        assert_eq!(removed.name, "iep.pdf");
        let remaining = load_documents(&pool, student_id).await.unwrap();
        assert_eq!(remaining.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["doc-2"]);

        match remove_document(&pool, student_id, "doc-1").await {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Document not found"),
            other => panic!("expected 404, got {other:?}"),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_documents_of_missing_student_are_404(pool: PgPool) {
        let result = append_document(&pool, 999, document("doc-1", "iep.pdf", b"%PDF")).await;
        assert!(matches!(result, Err(AppError::NotFound(ref m)) if m == "Student not found"));
        assert!(matches!(
            load_documents(&pool, 999).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            remove_document(&pool, 999, "doc-1").await,
            Err(AppError::NotFound(ref m)) if m == "Student not found"
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_uploads_keep_every_document(pool: PgPool) {
        let student_id = new_student(&pool).await;
        let uploads = (0..8).map(|n| {
            let pool = pool.clone();
            tokio::spawn(async move {
                append_document(&pool, student_id, document(&format!("doc-{n}"), "f.pdf", b"%PDF"))
                    .await
            })
        });
        for handle in uploads.collect::<Vec<_>>() {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(load_documents(&pool, student_id).await.unwrap().len(), 8);
    }
}
