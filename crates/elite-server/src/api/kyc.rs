// Customer KYC endpoints, mounted inside the /api/v1/auth scope

use actix_multipart::Multipart;
use actix_web::{Either, HttpResponse, get, http::StatusCode, post, web};
use elite_common::{EliteError, error::PARAMETER_VALIDATE_ERROR};
use elite_persistence::KycStatus;
use serde_json::json;

use crate::{
    api::multipart::read_form,
    error::AppError,
    model::{AppState, response},
    secured::CurrentUser,
    service::kyc::{
        DocumentFlags, DocumentType, KycStatusView, KycSubmission, PersonalInfo, SUBMITTED_MESSAGE,
        missing_documents,
    },
};

const DOCUMENT_TYPE_FIELD: &str = "document_type";

#[get("/kyc-status")]
async fn kyc_status(user: CurrentUser) -> HttpResponse {
    response::Result::<KycStatusView>::http_success(KycStatusView::of(&user))
}

#[post("/upload-kyc-document")]
async fn upload_kyc_document(
    user: CurrentUser,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = read_form(payload, data.uploads.max_file_size()).await?;
    let document_type: DocumentType = form
        .field(DOCUMENT_TYPE_FIELD)
        .ok_or_else(|| EliteError::IllegalArgument("document_type is required".to_string()))?
        .parse()?;
    let file = form.require_file()?;

    let (user, stored) = data
        .kyc
        .upload_document(
            &user,
            document_type,
            &file.filename,
            file.content_type.as_deref(),
            &file.bytes,
        )
        .await?;

    let missing = missing_documents(&user);
    Ok(response::Result::<serde_json::Value>::http_success(json!({
        "message": format!("{} uploaded successfully", document_type.title()),
        "document_url": stored.url,
        "kyc_status": user.kyc_status,
        "can_transact": user.kyc_status == KycStatus::Verified,
        "missing_documents": if missing.is_empty() { None } else { Some(missing) },
    })))
}

/// Accepts the personal details as JSON or as a URL-encoded form
#[post("/submit-kyc")]
async fn submit_kyc(
    user: CurrentUser,
    data: web::Data<AppState>,
    body: Either<web::Json<PersonalInfo>, web::Form<PersonalInfo>>,
) -> Result<HttpResponse, AppError> {
    let info = match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };

    match data.kyc.submit(&user, &info).await? {
        KycSubmission::Submitted(user) => Ok(response::Result::<serde_json::Value>::http_success(json!({
            "message": SUBMITTED_MESSAGE,
            "kyc_status": user.kyc_status,
            "can_transact": user.kyc_status == KycStatus::Verified,
        }))),
        KycSubmission::MissingDocuments(missing) => Ok(response::Result::<serde_json::Value>::http_response(
            StatusCode::BAD_REQUEST.as_u16(),
            PARAMETER_VALIDATE_ERROR.code,
            format!("Missing required documents: {}", missing.join(", ")),
            json!({ "missing_documents": missing }),
        )),
    }
}

#[get("/kyc-documents-status")]
async fn kyc_documents_status(user: CurrentUser) -> HttpResponse {
    response::Result::<DocumentFlags>::http_success(DocumentFlags::of(&user))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(kyc_status)
        .service(upload_kyc_document)
        .service(submit_kyc)
        .service(kyc_documents_status);
}
