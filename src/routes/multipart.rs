use std::collections::HashMap;

use actix_multipart::Multipart;
use futures::TryStreamExt;

use crate::error::{AppError, ValidationError};
use crate::media::MediaAsset;

const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;
const MAX_TEXT_BYTES: usize = 64 * 1024;

/// A fully read `multipart/form-data` body
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, MediaAsset>,
}

impl FormData {
    /// Text field value, empty when absent
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<MediaAsset> {
        self.files.remove(name)
    }
}

/// Read every part of a multipart body into memory.
///
/// Parts with a filename become files, everything else is text. A file
/// part with neither a name nor content (an untouched file input) is
/// treated as absent.
pub async fn read_multipart(mut payload: Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(mut field) = payload.try_next().await.map_err(invalid_body)? {
        let disposition = field.content_disposition().clone();
        let name = match disposition.get_name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let file_name = disposition.get_filename().map(str::to_owned);
        let limit = if file_name.is_some() {
            MAX_FILE_BYTES
        } else {
            MAX_TEXT_BYTES
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid_body)? {
            if data.len() + chunk.len() > limit {
                return Err(ValidationError::TooLong(name, limit).into());
            }
            data.extend_from_slice(&chunk);
        }

        match file_name {
            Some(file_name) if file_name.is_empty() && data.is_empty() => {}
            Some(file_name) => {
                form.files.insert(name, MediaAsset::new(file_name, data));
            }
            None => {
                let value = String::from_utf8(data)
                    .map_err(|_| ValidationError::InvalidFormat(name.clone()))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

fn invalid_body(e: actix_multipart::MultipartError) -> AppError {
    tracing::debug!(error = %e, "Unreadable multipart body");
    ValidationError::InvalidFormat("form data".to_string()).into()
}
