use axum::{body::Bytes, extract::Multipart};
use std::collections::HashMap;

use crate::error::AppResult;
use crate::services::uploads::extension;

/// A file part held in memory until it is stored.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn extension(&self) -> Option<String> {
        extension(&self.file_name)
    }
}

/// Every part of a multipart body: text fields by name, file parts by name.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, FilePart>,
}

impl FormData {
    /// Trimmed text field, `None` when missing or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Removes the named file part. Empty uploads count as absent.
    pub fn take_file(&mut self, name: &str) -> Option<FilePart> {
        self.files.remove(name).filter(|f| !f.bytes.is_empty())
    }
}

#[cfg(test)]
impl FormData {
    pub fn with_fields(pairs: &[(&str, &str)]) -> Self {
        FormData {
            fields: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, name: &str, file_name: &str, bytes: &'static [u8]) -> Self {
        let part = FilePart {
            file_name: file_name.to_string(),
            content_type: None,
            bytes: Bytes::from_static(bytes),
        };
        self.files.insert(name.to_string(), part);
        self
    }
}

pub async fn read_form(mut multipart: Multipart) -> AppResult<FormData> {
    let mut form = FormData::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                form.files.insert(name, FilePart { file_name, content_type, bytes });
            }
            None => {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}
