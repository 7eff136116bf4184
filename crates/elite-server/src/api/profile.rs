// Profile endpoints

use actix_multipart::Multipart;
use actix_web::{HttpResponse, Scope, get, post, put, web};
use elite_common::{
    API_V1_PREFIX,
    validation::{validate_language, validate_phone},
};
use elite_persistence::UserPatch;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    api::multipart::read_form,
    error::AppError,
    model::{AppState, response},
    secured::CurrentUser,
    service::{
        storage::{AllowedFiles, PROFILE_PICTURE_MAX_SIZE, UploadCategory, validate_file},
        users::UserView,
    },
};

const PROFILE_PICTURE_TAG: &str = "profile";

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "first name must not be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "last name must not be empty"))]
    pub last_name: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(custom(function = "validate_language"))]
    pub language_preference: Option<String>,
}

#[get("")]
async fn get_profile(user: CurrentUser) -> HttpResponse {
    response::Result::<UserView>::http_success(UserView::from(&user.0))
}

#[put("")]
async fn update_profile(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;

    let trimmed = |value: &Option<String>| value.as_deref().map(|v| v.trim().to_string());
    let patch = UserPatch {
        first_name: trimmed(&body.first_name),
        last_name: trimmed(&body.last_name),
        phone: trimmed(&body.phone).map(Some),
        language_preference: trimmed(&body.language_preference),
        ..Default::default()
    };

    let user = data.persistence.user_update(user.id, &patch).await?;
    tracing::info!(user_id = user.id, "Profile updated");
    Ok(response::Result::<UserView>::http_success(UserView::from(&user)))
}

#[post("/picture")]
async fn upload_picture(
    user: CurrentUser,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let file = read_form(payload, PROFILE_PICTURE_MAX_SIZE)
        .await?
        .require_file()?;
    let extension = validate_file(
        &file.filename,
        file.content_type.as_deref(),
        file.bytes.len(),
        PROFILE_PICTURE_MAX_SIZE,
        AllowedFiles::Images,
    )?;

    let stored = data
        .uploads
        .store(
            UploadCategory::ProfilePictures,
            user.id,
            PROFILE_PICTURE_TAG,
            &extension,
            &file.bytes,
        )
        .await?;

    let previous = user.profile_image.clone();
    let patch = UserPatch {
        profile_image: Some(Some(stored.url.clone())),
        ..Default::default()
    };
    let user = data.persistence.user_update(user.id, &patch).await?;
    if let Some(previous) = previous.filter(|p| *p != stored.url) {
        data.uploads.remove_url(&previous).await;
    }

    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": "Profile picture updated successfully",
        "profile_image": user.profile_image,
    })))
}

pub fn routes() -> Scope {
    web::scope(&format!("{}/profile", API_V1_PREFIX))
        .service(get_profile)
        .service(update_profile)
        .service(upload_picture)
}
