use std::path::Path;

use axum::extract::multipart::Field;

use crate::api::errors::ApiError;
use crate::core::config::StorageSettings;

/// Reads a file field, enforcing the size limit while streaming and then the
/// extension and MIME checks.
pub(crate) async fn read_image_field(
    mut field: Field<'_>,
    storage: &StorageSettings,
) -> Result<Vec<u8>, ApiError> {
    let filename = field.file_name().unwrap_or("image.jpg").to_string();
    let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
    let max_bytes = storage.max_upload_bytes();

    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
    {
        if (bytes.len() as u64).saturating_add(chunk.len() as u64) > max_bytes {
            return Err(ApiError::BadRequest(format!(
                "File size exceeds {}MB limit",
                storage.max_upload_size_mb
            )));
        }
        bytes.extend_from_slice(&chunk);
    }

    validate_image_upload(&filename, &content_type, &storage.allowed_image_extensions)?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest(format!("File '{filename}' is empty")));
    }

    tracing::debug!(filename = %filename, size = bytes.len(), "Received image upload");
    Ok(bytes)
}

pub(crate) fn validate_image_upload(
    filename: &str,
    content_type: &str,
    allowed_extensions: &[String],
) -> Result<(), ApiError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!("File extension '{extension}' is not allowed")));
    }

    let mime = content_type.trim().to_ascii_lowercase();
    // curl and some browsers fall back to octet-stream
    if mime == "application/octet-stream" || mime_allowed_for_extension(&mime, &extension) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "MIME type '{mime}' does not match extension '.{extension}'"
        )))
    }
}

fn mime_allowed_for_extension(mime: &str, extension: &str) -> bool {
    match extension {
        "jpg" | "jpeg" => matches!(mime, "image/jpeg" | "image/jpg"),
        "png" => mime == "image/png",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
    }

    #[test]
    fn accepts_matching_extension_and_mime() {
        assert!(validate_image_upload("sheet.PNG", "image/png", &allowed()).is_ok());
        assert!(validate_image_upload("sheet.jpg", "image/jpeg", &allowed()).is_ok());
        assert!(validate_image_upload("sheet.jpeg", "application/octet-stream", &allowed()).is_ok());
    }

    #[test]
    fn rejects_unknown_extension_and_mismatched_mime() {
        assert!(matches!(
            validate_image_upload("sheet.pdf", "application/pdf", &allowed()),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate_image_upload("sheet.png", "image/jpeg", &allowed()),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate_image_upload("sheet", "image/png", &allowed()),
            Err(ApiError::BadRequest(_))
        ));
    }
}
