// Generic attachment upload

use actix_multipart::Multipart;
use actix_web::{HttpResponse, Scope, post, web};
use serde::Serialize;

use crate::{
    api::multipart::read_form,
    error::AppError,
    model::{AppState, response},
    secured::CurrentUser,
    service::storage::{AllowedFiles, UploadCategory, validate_file},
};

const ATTACHMENT_TAG: &str = "attachment";

#[derive(Debug, Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    url: String,
    size: usize,
}

#[post("")]
async fn upload(
    user: CurrentUser,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let max_file_size = data.uploads.max_file_size();
    let file = read_form(payload, max_file_size).await?.require_file()?;

    let extension = validate_file(
        &file.filename,
        file.content_type.as_deref(),
        file.bytes.len(),
        max_file_size,
        AllowedFiles::Documents,
    )?;

    let stored = data
        .uploads
        .store(
            UploadCategory::Uploads,
            user.id,
            ATTACHMENT_TAG,
            &extension,
            &file.bytes,
        )
        .await?;

    Ok(response::Result::<UploadResponse>::http_created(UploadResponse {
        message: "File uploaded successfully",
        filename: stored.filename,
        url: stored.url,
        size: stored.size,
    }))
}

pub fn routes() -> Scope {
    web::scope("/api/v1/uploads").service(upload)
}
