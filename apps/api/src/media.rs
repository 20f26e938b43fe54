//! Upload handling shared by student and staff endpoints: reading the `file`
//! multipart field, image sniffing and `data:` URL rendering.

use axum::extract::Multipart;
use base64::Engine as _;
use bytes::Bytes;

use crate::errors::AppError;

pub const FILE_FIELD: &str = "file";

/// A single file pulled out of a multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Reads the first `file` field; other fields are skipped.
pub async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
        return Ok(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }
    Err(AppError::UnprocessableEntity(
        "multipart field 'file' is required".to_string(),
    ))
}

impl UploadedFile {
    /// Rejects non-image uploads when the client declared a content type.
    pub fn ensure_image(&self) -> Result<(), AppError> {
        if self.data.is_empty() {
            return Err(AppError::Validation("No file uploaded".to_string()));
        }
        match self.content_type.as_deref() {
            Some(ct) if !ct.starts_with("image/") => {
                Err(AppError::Validation("File must be an image".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Image MIME type from magic bytes. Unrecognised data is treated as JPEG.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return "image/png";
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if bytes.len() >= 12 && bytes[..4] == *b"RIFF" && bytes[8..12] == *b"WEBP" {
        return "image/webp";
    }
    "image/jpeg"
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// `data:` URL for a stored photo, or `None` when there is no photo.
pub fn photo_url(photo: Option<&[u8]>) -> Option<String> {
    photo
        .filter(|p| !p.is_empty())
        .map(|p| data_url(detect_image_mime(p), p))
}
