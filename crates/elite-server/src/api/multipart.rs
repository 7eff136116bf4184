// Multipart form reading for the upload endpoints

use std::collections::HashMap;

use actix_multipart::Multipart;
use elite_common::EliteError;
use futures::StreamExt;

use crate::service::storage::size_limit_message;

/// Name of the form field carrying the file
pub const FILE_FIELD: &str = "file";

/// Longest accepted text field value
const MAX_TEXT_FIELD: usize = 4 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Text fields and the `file` part of a multipart body
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require_file(self) -> Result<UploadedFile, EliteError> {
        self.file
            .ok_or_else(|| EliteError::IllegalArgument("No file uploaded".to_string()))
    }
}

fn malformed(e: impl std::fmt::Display) -> EliteError {
    EliteError::IllegalArgument(format!("Malformed multipart body: {}", e))
}

/// Reads the whole form. The file part is refused as soon as it grows past
/// `max_file_size`, before the rest of the body is buffered.
pub async fn read_form(mut payload: Multipart, max_file_size: usize) -> Result<UploadForm, EliteError> {
    let mut form = UploadForm::default();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(malformed)?;

        let Some(disposition) = field.content_disposition() else {
            continue;
        };
        let Some(name) = disposition.get_name().map(str::to_string) else {
            continue;
        };
        let filename = disposition.get_filename().map(str::to_string);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let limit = if name == FILE_FIELD {
            max_file_size
        } else {
            MAX_TEXT_FIELD
        };

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(malformed)?;
            if data.len() + chunk.len() > limit {
                return Err(if name == FILE_FIELD {
                    EliteError::IllegalArgument(size_limit_message(max_file_size))
                } else {
                    EliteError::IllegalArgument(format!("Field {} is too long", name))
                });
            }
            data.extend_from_slice(&chunk);
        }

        if name == FILE_FIELD {
            form.file = Some(UploadedFile {
                filename: filename.unwrap_or_default(),
                content_type,
                bytes: data,
            });
        } else {
            let value = String::from_utf8(data)
                .map_err(|_| EliteError::IllegalArgument(format!("Field {} is not valid UTF-8", name)))?;
            form.fields.insert(name, value.trim().to_string());
        }
    }

    Ok(form)
}
