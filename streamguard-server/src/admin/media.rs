//! `GET /media`, `POST /media/upload`, `GET|DELETE /media/{filename}`
//! (spec §6, §9): the loop child's source-file directory.
//!
//! Filename safety and the upload cap are the two invariants spec §9
//! calls out explicitly: reject path separators/`..` outright, and
//! reject (rather than silently overwrite) a collision with a file
//! that's already on disk — the open question's recommended resolution.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use streamguard_contracts::admin::MediaFileResponse;

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::errors::{AppError, AppResult};

const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov"];

fn validate_filename(filename: &str) -> AppResult<()> {
    if filename.is_empty() || filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(AppError::bad_request(format!(
            "media filename must not contain path separators or '..': {filename:?}"
        )));
    }
    let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::bad_request(format!(
            "media filename must end in one of {ALLOWED_EXTENSIONS:?}: {filename:?}"
        )));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
) -> AppResult<Json<Vec<MediaFileResponse>>> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(&state.config.media_root).await?;
    while let Some(entry) = dir.next_entry().await? {
        if let Ok(metadata) = entry.metadata().await {
            if metadata.is_file() {
                entries.push(MediaFileResponse {
                    filename: entry.file_name().to_string_lossy().into_owned(),
                    size_bytes: metadata.len(),
                });
            }
        }
    }
    Ok(Json(entries))
}

pub async fn upload(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    mut multipart: Multipart,
) -> AppResult<Json<MediaFileResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        validate_filename(&filename)?;

        let path = std::path::Path::new(&state.config.media_root).join(&filename);
        if tokio::fs::metadata(&path).await.is_ok() {
            return Err(AppError::conflict(format!("media file {filename:?} already exists")));
        }

        let data: Bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.to_string()))?;
        if data.len() as u64 > state.config.max_media_upload_bytes {
            return Err(AppError::payload_too_large("upload exceeds the configured size cap"));
        }

        tokio::fs::create_dir_all(&state.config.media_root).await?;
        tokio::fs::write(&path, &data).await?;
        return Ok(Json(MediaFileResponse {
            filename,
            size_bytes: data.len() as u64,
        }));
    }
    Err(AppError::bad_request("multipart body had no file field"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    AdminUser(_claims): AdminUser,
) -> AppResult<StatusCode> {
    validate_filename(&filename)?;
    let path = std::path::Path::new(&state.config.media_root).join(&filename);
    tokio::fs::remove_file(&path).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    AdminUser(_claims): AdminUser,
) -> AppResult<Json<MediaFileResponse>> {
    validate_filename(&filename)?;
    let path = std::path::Path::new(&state.config.media_root).join(&filename);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| AppError::not_found(format!("media file {filename:?} not found")))?;
    Ok(Json(MediaFileResponse {
        filename,
        size_bytes: metadata.len(),
    }))
}
