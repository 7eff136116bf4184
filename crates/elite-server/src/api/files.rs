// Static file serving for uploaded documents and pictures
//
// Profile pictures and generic uploads are public. KYC documents are served
// only to their owner, identified by the `user_{id}_` file name prefix, and to
// administrators.

use actix_web::{HttpRequest, HttpResponse, Scope, get, http::header, web};
use elite_common::EliteError;

use crate::{
    error::AppError,
    model::AppState,
    secured::{auth_context, resolve_user},
    service::storage::{content_type_for, owner_of},
};

#[get("/{category}/{filename}")]
async fn serve_file(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (category, filename) = path.into_inner();
    let (category, file_path) = data.uploads.resolve(&category, &filename)?;

    if !category.is_public() {
        let user = resolve_user(&auth_context(&req), &data).await?;
        if !user.is_admin && owner_of(&filename) != Some(user.id) {
            tracing::warn!(
                user_id = user.id,
                filename = %filename,
                "Refused access to another user's document"
            );
            return Err(EliteError::Forbidden("Access denied".to_string()).into());
        }
    }

    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EliteError::NotFound("File".to_string()).into());
        }
        Err(e) => return Err(anyhow::Error::from(e).into()),
    };

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&filename))
        .insert_header((header::CACHE_CONTROL, "private, max-age=300"))
        .body(bytes))
}

pub fn routes() -> Scope {
    web::scope("/static").service(serve_file)
}
