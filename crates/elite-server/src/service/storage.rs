//! Upload storage on the local filesystem
//!
//! Files live under `{root}/{category}/` and are addressed by the URL
//! `/static/{category}/{filename}`. Generated names start with `user_{id}_` so
//! the owner of a private document can be recovered from its name alone.

use std::path::{Path, PathBuf};

use elite_common::EliteError;

pub const STATIC_URL_PREFIX: &str = "/static";
pub const MIB: usize = 1024 * 1024;
pub const PROFILE_PICTURE_MAX_SIZE: usize = 5 * MIB;

/// Directory an upload is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadCategory {
    KycDocuments,
    ProfilePictures,
    Uploads,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 3] = [
        UploadCategory::KycDocuments,
        UploadCategory::ProfilePictures,
        UploadCategory::Uploads,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UploadCategory::KycDocuments => "kyc_documents",
            UploadCategory::ProfilePictures => "profile_pictures",
            UploadCategory::Uploads => "uploads",
        }
    }

    /// Whether files may be served without a token
    pub fn is_public(self) -> bool {
        !matches!(self, UploadCategory::KycDocuments)
    }
}

impl std::str::FromStr for UploadCategory {
    type Err = EliteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UploadCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EliteError::NotFound("File".to_string()))
    }
}

/// Which file kinds an upload endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedFiles {
    /// JPG, JPEG, PNG, and PDF
    Documents,
    /// JPG, JPEG, and PNG
    Images,
}

impl AllowedFiles {
    fn extensions(self) -> &'static [&'static str] {
        match self {
            AllowedFiles::Documents => &[".jpg", ".jpeg", ".png", ".pdf"],
            AllowedFiles::Images => &[".jpg", ".jpeg", ".png"],
        }
    }

    fn type_error(self) -> &'static str {
        match self {
            AllowedFiles::Documents => "Invalid file type. Only JPG, JPEG, PNG, and PDF are allowed.",
            AllowedFiles::Images => "Invalid file type. Only JPG, JPEG, and PNG are allowed.",
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub url: String,
    pub path: PathBuf,
    pub size: usize,
}

pub fn size_limit_message(max_file_size: usize) -> String {
    format!("File size exceeds {}MB limit", max_file_size / MIB)
}

/// Lowercase extension including the dot, e.g. `.png`
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Checks size, extension and declared content type of an upload and returns
/// the normalized extension.
pub fn validate_file(
    filename: &str,
    content_type: Option<&str>,
    size: usize,
    max_file_size: usize,
    allowed: AllowedFiles,
) -> Result<String, EliteError> {
    if size > max_file_size {
        return Err(EliteError::IllegalArgument(size_limit_message(max_file_size)));
    }
    if size == 0 {
        return Err(EliteError::IllegalArgument("Uploaded file is empty".to_string()));
    }

    let extension = extension_of(filename)
        .filter(|e| allowed.extensions().contains(&e.as_str()))
        .ok_or_else(|| EliteError::IllegalArgument(allowed.type_error().to_string()))?;

    let content_type = content_type.unwrap_or_default();
    if extension == ".pdf" {
        if content_type != "application/pdf" {
            return Err(EliteError::IllegalArgument("Invalid PDF file".to_string()));
        }
    } else if !content_type.starts_with("image/") {
        return Err(EliteError::IllegalArgument("Invalid image file".to_string()));
    }

    Ok(extension)
}

pub fn content_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some(".jpg") | Some(".jpeg") => "image/jpeg",
        Some(".png") => "image/png",
        Some(".pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// User id encoded in a generated file name
pub fn owner_of(filename: &str) -> Option<i64> {
    filename
        .strip_prefix("user_")?
        .split('_')
        .next()?
        .parse()
        .ok()
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_file_size: usize,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn dir(&self, category: UploadCategory) -> PathBuf {
        self.root.join(category.as_str())
    }

    /// Create every category directory. Safe to call repeatedly.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for category in UploadCategory::ALL {
            let dir = self.dir(category);
            std::fs::create_dir_all(&dir).map_err(|e| {
                EliteError::InternalError(format!(
                    "failed to create upload directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        tracing::info!(root = %self.root.display(), "Upload directories ready");
        Ok(())
    }

    pub fn dirs_ready(&self) -> bool {
        UploadCategory::ALL
            .into_iter()
            .all(|category| self.dir(category).is_dir())
    }

    /// Write `bytes` under a generated `user_{id}_{tag}_{8 hex}_{ts}{ext}` name
    pub async fn store(
        &self,
        category: UploadCategory,
        user_id: i64,
        tag: &str,
        extension: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredFile> {
        let unique = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!(
            "user_{}_{}_{}_{}{}",
            user_id,
            tag,
            &unique[..8],
            chrono::Utc::now().timestamp(),
            extension
        );

        let dir = self.dir(category);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(
            user_id,
            category = category.as_str(),
            filename = %filename,
            size = bytes.len(),
            "Stored upload"
        );

        Ok(StoredFile {
            url: format!("{}/{}/{}", STATIC_URL_PREFIX, category.as_str(), filename),
            filename,
            path,
            size: bytes.len(),
        })
    }

    /// Map a request path onto a file inside the upload root
    pub fn resolve(&self, category: &str, filename: &str) -> Result<(UploadCategory, PathBuf), EliteError> {
        if filename.is_empty()
            || filename.contains("..")
            || filename.contains('/')
            || filename.contains('\\')
            || category.contains("..")
        {
            return Err(EliteError::IllegalArgument("Invalid file path".to_string()));
        }
        let category: UploadCategory = category.parse()?;
        Ok((category, self.dir(category).join(filename)))
    }

    /// Remove a previously stored file given its URL. Missing files are ignored.
    pub async fn remove_url(&self, url: &str) {
        let Some(rest) = url.strip_prefix(STATIC_URL_PREFIX) else {
            return;
        };
        let mut parts = rest.trim_start_matches('/').splitn(2, '/');
        let (Some(category), Some(filename)) = (parts.next(), parts.next()) else {
            return;
        };
        if let Ok((_, path)) = self.resolve(category, filename)
            && let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove old upload");
        }
    }
}
