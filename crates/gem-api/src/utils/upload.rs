//! Multipart image upload extraction and validation

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use gem_core::AppError;
use gem_storage::path_safety::{extension_of, is_allowed_extension, ALLOWED_EXTENSIONS};

/// A validated image taken from the `file` field of a multipart body
#[derive(Debug)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Upload exceeds the body limit: {}", e.body_text()))
    } else {
        AppError::BadRequest(format!("Failed to read multipart: {}", e.body_text()))
    }
}

/// Read the `file` field and validate it, in order: presence, `image/*`
/// content type, allow-listed extension, non-empty, size.
pub async fn extract_image_upload(
    mut multipart: Multipart,
    max_size: usize,
) -> Result<ImageUpload, AppError> {
    let mut upload: Option<(Vec<u8>, Option<String>, Option<String>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::BadRequest(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((data.to_vec(), filename, content_type));
    }

    let (data, filename, content_type) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let content_type = content_type.unwrap_or_default();
    validate_content_type(&content_type)?;

    let filename = filename.unwrap_or_default();
    validate_extension(&filename)?;

    if data.is_empty() {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    validate_file_size(data.len(), max_size)?;

    Ok(ImageUpload {
        data,
        filename,
        content_type,
    })
}

/// Content type must be `image/*`, ignoring parameters
pub fn validate_content_type(content_type: &str) -> Result<(), AppError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if !normalized.starts_with("image/") {
        return Err(AppError::BadRequest(
            "File must be an image (content type image/*)".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_extension(filename: &str) -> Result<(), AppError> {
    match extension_of(filename) {
        Some(ext) if is_allowed_extension(&ext) => Ok(()),
        _ => Err(AppError::BadRequest(format!(
            "Invalid file extension. Allowed extensions: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))),
    }
}

pub fn validate_file_size(file_size: usize, max_size: usize) -> Result<(), AppError> {
    if file_size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            max_size / 1024 / 1024
        )));
    }
    Ok(())
}
