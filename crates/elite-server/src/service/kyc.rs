//! Identity verification (KYC)
//!
//! A user uploads documents and personal details, submits the application, and
//! an admin verifies or rejects it. Only `verified` users may move money.

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use elite_common::{
    EliteError,
    utils::utc_now,
    validation::{validate_date_of_birth, validate_postal_code},
};
use elite_persistence::{KycStatus, Page, PersistenceService, UserInfo, UserPatch, UserQuery};
use serde::{Deserialize, Serialize};

use super::storage::{AllowedFiles, StoredFile, UploadCategory, UploadStore, validate_file};

pub const REQUIRED_DOCUMENTS: [DocumentType; 3] = [
    DocumentType::IdFront,
    DocumentType::ProofOfAddress,
    DocumentType::Selfie,
];

pub const ALREADY_VERIFIED_MESSAGE: &str = "Your KYC is already verified";
pub const UNDER_REVIEW_MESSAGE: &str = "Your KYC application is already under review";
pub const SUBMITTED_MESSAGE: &str = "KYC application submitted successfully. Your documents are under review. This may take 1-2 business days.";
pub const DEFAULT_DEADLINE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdFront,
    IdBack,
    ProofOfAddress,
    Selfie,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::IdFront,
        DocumentType::IdBack,
        DocumentType::ProofOfAddress,
        DocumentType::Selfie,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::IdFront => "id_front",
            DocumentType::IdBack => "id_back",
            DocumentType::ProofOfAddress => "proof_of_address",
            DocumentType::Selfie => "selfie",
        }
    }

    /// `proof_of_address` -> `Proof Of Address`
    pub fn title(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// URL stored on the user for this document
    pub fn url_of(self, user: &UserInfo) -> Option<&str> {
        match self {
            DocumentType::IdFront => user.id_document_front.as_deref(),
            DocumentType::IdBack => user.id_document_back.as_deref(),
            DocumentType::ProofOfAddress => user.proof_of_address.as_deref(),
            DocumentType::Selfie => user.selfie_photo.as_deref(),
        }
    }

    fn current(self, user: &UserInfo) -> Option<&str> {
        match self {
            DocumentType::IdFront => user.id_document_front.as_deref(),
            DocumentType::IdBack => user.id_document_back.as_deref(),
            DocumentType::ProofOfAddress => user.proof_of_address.as_deref(),
            DocumentType::Selfie => user.selfie_photo.as_deref(),
        }
    }

    /// Update that points this document slot at `url`
    fn attach(self, url: String) -> UserPatch {
        let mut patch = UserPatch::default();
        let slot = match self {
            DocumentType::IdFront => &mut patch.id_document_front,
            DocumentType::IdBack => &mut patch.id_document_back,
            DocumentType::ProofOfAddress => &mut patch.proof_of_address,
            DocumentType::Selfie => &mut patch.selfie_photo,
        };
        *slot = Some(Some(url));
        patch
    }
}

impl FromStr for DocumentType {
    type Err = EliteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| {
                EliteError::IllegalArgument(format!(
                    "Invalid document type. Allowed types: {}",
                    DocumentType::ALL.map(DocumentType::as_str).join(", ")
                ))
            })
    }
}

/// Which documents a user has on file
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DocumentFlags {
    pub id_front: bool,
    pub id_back: bool,
    pub proof_of_address: bool,
    pub selfie: bool,
}

impl DocumentFlags {
    pub fn of(user: &UserInfo) -> Self {
        let present = |d: DocumentType| d.url_of(user).is_some_and(|u| !u.is_empty());
        Self {
            id_front: present(DocumentType::IdFront),
            id_back: present(DocumentType::IdBack),
            proof_of_address: present(DocumentType::ProofOfAddress),
            selfie: present(DocumentType::Selfie),
        }
    }
}

pub fn missing_documents(user: &UserInfo) -> Vec<&'static str> {
    REQUIRED_DOCUMENTS
        .into_iter()
        .filter(|d| d.url_of(user).is_none_or(str::is_empty))
        .map(DocumentType::as_str)
        .collect()
}

pub fn personal_info_complete(user: &UserInfo) -> bool {
    [
        &user.date_of_birth,
        &user.address,
        &user.city,
        &user.country,
        &user.postal_code,
    ]
    .iter()
    .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
}

/// KYC summary shown to the user and to admins
#[derive(Debug, Clone, Serialize)]
pub struct KycStatusView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub kyc_status: KycStatus,
    pub can_transact: bool,
    pub kyc_submitted_at: Option<chrono::NaiveDateTime>,
    pub kyc_verified_at: Option<chrono::NaiveDateTime>,
    pub kyc_rejection_reason: Option<String>,
    pub documents: DocumentFlags,
    pub personal_info_complete: bool,
}

impl KycStatusView {
    pub fn of(user: &UserInfo) -> Self {
        Self {
            user_id: None,
            email: None,
            kyc_status: user.kyc_status,
            can_transact: user.kyc_status == KycStatus::Verified,
            kyc_submitted_at: user.kyc_submitted_at,
            kyc_verified_at: user.kyc_verified_at,
            kyc_rejection_reason: user.kyc_rejection_reason.clone(),
            documents: DocumentFlags::of(user),
            personal_info_complete: personal_info_complete(user),
        }
    }

    pub fn with_identity(mut self, user: &UserInfo) -> Self {
        self.user_id = Some(user.id);
        self.email = Some(user.email.clone());
        self
    }
}

/// Application entry in the admin review queue
#[derive(Debug, Clone, Serialize)]
pub struct PendingApplication {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub kyc_status: KycStatus,
    pub kyc_submitted_at: Option<chrono::NaiveDateTime>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub documents: serde_json::Value,
}

impl From<UserInfo> for PendingApplication {
    fn from(user: UserInfo) -> Self {
        let documents = serde_json::json!({
            "id_front": user.id_document_front,
            "id_back": user.id_document_back,
            "proof_of_address": user.proof_of_address,
            "selfie": user.selfie_photo,
        });
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            kyc_status: user.kyc_status,
            kyc_submitted_at: user.kyc_submitted_at,
            date_of_birth: user.date_of_birth,
            address: user.address,
            city: user.city,
            country: user.country,
            documents,
        }
    }
}

/// Personal details submitted with an application
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalInfo {
    pub date_of_birth: String,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub country: String,
    pub postal_code: String,
}

impl PersonalInfo {
    /// Validate every field, reporting all problems together
    pub fn validate(&self, today: NaiveDate) -> Result<NaiveDate, EliteError> {
        let mut errors = Vec::new();

        let dob = match validate_date_of_birth(&self.date_of_birth, today) {
            Ok(dob) => Some(dob),
            Err(e) => {
                errors.push(
                    match &*e.code {
                        "date_of_birth_underage" => "You must be at least 18 years old to register",
                        "date_of_birth_invalid" => "Invalid date of birth",
                        _ => "Invalid date format. Use YYYY-MM-DD",
                    }
                    .to_string(),
                );
                None
            }
        };

        if self.address.trim().chars().count() < 10 {
            errors.push("Address must be at least 10 characters long".to_string());
        }
        if self.city.trim().chars().count() < 2 {
            errors.push("City must be at least 2 characters long".to_string());
        }
        if self.country.trim().chars().count() < 2 {
            errors.push("Country must be at least 2 characters long".to_string());
        }
        if validate_postal_code(&self.postal_code).is_err() {
            errors.push("Invalid postal code format".to_string());
        }

        match dob {
            Some(dob) if errors.is_empty() => Ok(dob),
            _ => Err(EliteError::ValidationFailed(errors)),
        }
    }
}

/// Outcome of submitting an application
#[derive(Debug, Clone)]
pub enum KycSubmission {
    Submitted(UserInfo),
    MissingDocuments(Vec<&'static str>),
}

#[derive(Clone)]
pub struct KycService {
    persistence: Arc<dyn PersistenceService>,
    uploads: UploadStore,
}

fn ensure_open(user: &UserInfo) -> Result<(), EliteError> {
    match user.kyc_status {
        KycStatus::Verified => Err(EliteError::IllegalArgument(ALREADY_VERIFIED_MESSAGE.to_string())),
        KycStatus::Submitted => Err(EliteError::IllegalArgument(UNDER_REVIEW_MESSAGE.to_string())),
        KycStatus::Pending | KycStatus::Rejected => Ok(()),
    }
}

impl KycService {
    pub fn new(persistence: Arc<dyn PersistenceService>, uploads: UploadStore) -> Self {
        Self {
            persistence,
            uploads,
        }
    }

    /// Store a document and attach it to the user, replacing any earlier file
    pub async fn upload_document(
        &self,
        user: &UserInfo,
        document_type: DocumentType,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> anyhow::Result<(UserInfo, StoredFile)> {
        ensure_open(user)?;
        let extension = validate_file(
            filename,
            content_type,
            bytes.len(),
            self.uploads.max_file_size(),
            AllowedFiles::Documents,
        )?;

        let stored = self
            .uploads
            .store(
                UploadCategory::KycDocuments,
                user.id,
                document_type.as_str(),
                &extension,
                bytes,
            )
            .await?;

        let previous = document_type.current(user).map(str::to_string);
        let updated = self
            .persistence
            .user_update(user.id, &document_type.attach(stored.url.clone()))
            .await?;

        if let Some(previous) = previous.filter(|p| *p != stored.url) {
            self.uploads.remove_url(&previous).await;
        }

        tracing::info!(
            user_id = user.id,
            document_type = document_type.as_str(),
            "KYC document uploaded"
        );
        Ok((updated, stored))
    }

    pub async fn submit(&self, user: &UserInfo, info: &PersonalInfo) -> anyhow::Result<KycSubmission> {
        ensure_open(user)?;
        let dob = info.validate(utc_now().date())?;

        let missing = missing_documents(user);
        if !missing.is_empty() {
            return Ok(KycSubmission::MissingDocuments(missing));
        }

        let patch = UserPatch {
            date_of_birth: Some(Some(dob.format("%Y-%m-%d").to_string())),
            address: Some(Some(info.address.trim().to_string())),
            city: Some(Some(info.city.trim().to_string())),
            state: Some(Some(info.state.trim().to_string()).filter(|s| !s.is_empty())),
            country: Some(Some(info.country.trim().to_string())),
            postal_code: Some(Some(info.postal_code.trim().to_string())),
            kyc_status: Some(KycStatus::Submitted),
            kyc_submitted_at: Some(Some(utc_now())),
            kyc_rejection_reason: Some(None),
            ..Default::default()
        };
        let updated = self.persistence.user_update(user.id, &patch).await?;
        metrics::counter!("elite_kyc_submissions_total").increment(1);
        tracing::info!(user_id = user.id, "KYC application submitted");
        Ok(KycSubmission::Submitted(updated))
    }

    async fn submitted_user(&self, user_id: i64) -> anyhow::Result<UserInfo> {
        let user = self
            .persistence
            .user_find_by_id(user_id)
            .await?
            .ok_or_else(|| EliteError::NotFound("User".to_string()))?;
        if user.kyc_status != KycStatus::Submitted {
            return Err(
                EliteError::IllegalArgument("User KYC is not in submitted status".to_string()).into(),
            );
        }
        Ok(user)
    }

    /// Verify or reject a submitted application
    pub async fn review(
        &self,
        user_id: i64,
        status: KycStatus,
        rejection_reason: Option<&str>,
    ) -> anyhow::Result<UserInfo> {
        self.submitted_user(user_id).await?;
        let reason = rejection_reason.map(str::trim).filter(|r| !r.is_empty());

        let patch = match status {
            KycStatus::Verified => UserPatch {
                kyc_status: Some(KycStatus::Verified),
                kyc_verified_at: Some(Some(utc_now())),
                kyc_rejection_reason: Some(None),
                ..Default::default()
            },
            KycStatus::Rejected => {
                let Some(reason) = reason else {
                    return Err(EliteError::IllegalArgument(
                        "Rejection reason is required".to_string(),
                    )
                    .into());
                };
                UserPatch {
                    kyc_status: Some(KycStatus::Rejected),
                    kyc_rejection_reason: Some(Some(reason.to_string())),
                    ..Default::default()
                }
            }
            _ => return Err(EliteError::IllegalArgument("Invalid status".to_string()).into()),
        };

        let user = self.persistence.user_update(user_id, &patch).await?;
        metrics::counter!("elite_kyc_reviews_total", "status" => user.kyc_status.as_str()).increment(1);
        tracing::info!(user_id, status = %user.kyc_status, "KYC application reviewed");
        Ok(user)
    }

    /// Send a submitted application back to the user asking for more documents
    pub async fn request_additional_documents(
        &self,
        user_id: i64,
        required_documents: &[String],
        reason: &str,
        deadline_days: i64,
    ) -> anyhow::Result<(UserInfo, NaiveDate)> {
        if required_documents.is_empty() {
            return Err(EliteError::IllegalArgument(
                "required_documents must not be empty".to_string(),
            )
            .into());
        }
        if !(1..=90).contains(&deadline_days) {
            return Err(EliteError::IllegalArgument(
                "deadline_days must be between 1 and 90".to_string(),
            )
            .into());
        }

        self.submitted_user(user_id).await?;
        let deadline = utc_now().date() + chrono::Duration::days(deadline_days);

        let patch = UserPatch {
            kyc_status: Some(KycStatus::Rejected),
            kyc_rejection_reason: Some(Some(format!(
                "Additional documents required: {}. {}",
                required_documents.join(", "),
                reason.trim()
            ))),
            ..Default::default()
        };
        let user = self.persistence.user_update(user_id, &patch).await?;
        tracing::info!(user_id, %deadline, "Additional KYC documents requested");
        Ok((user, deadline))
    }

    pub async fn pending(&self, page_no: u64, page_size: u64) -> anyhow::Result<Page<PendingApplication>> {
        let query = UserQuery {
            kyc_status: Some(KycStatus::Submitted),
            ..Default::default()
        };
        Ok(self
            .persistence
            .user_find_page(&query, page_no, page_size)
            .await?
            .map(PendingApplication::from))
    }
}
