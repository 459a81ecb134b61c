use std::{collections::BTreeSet, path::Path};

use vault_ox_common::MultipartForm;

use crate::error::VaultError;

/// Multipart field every file is sent under
pub(crate) const FILES_FIELD: &str = "files";
/// Field the backend reads the declared MIME type from
pub(crate) const MIME_FIELD: &str = "mime";

/// One file queued for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

impl UploadFile {
    /// File from memory; the MIME type is guessed from the extension.
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first_raw()
            .map(ToString::to_string);
        Self {
            filename,
            data: data.into(),
            mime_type,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, VaultError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VaultError::validation(format!("not a file path: {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(filename, data))
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The single MIME type shared by every file, if there is exactly one.
fn declared_mime(files: &[UploadFile]) -> Option<&str> {
    let mimes: BTreeSet<Option<&str>> = files.iter().map(|f| f.mime_type.as_deref()).collect();
    match mimes.into_iter().collect::<Vec<_>>().as_slice() {
        [Some(mime)] => Some(*mime),
        _ => None,
    }
}

pub(crate) fn build_form(files: Vec<UploadFile>) -> Result<MultipartForm, VaultError> {
    if files.is_empty() {
        return Err(VaultError::validation("no files to upload"));
    }

    let mut form = MultipartForm::new();
    if let Some(mime) = declared_mime(&files) {
        form = form.text(MIME_FIELD, mime.to_string());
    }

    for file in files {
        form = match file.mime_type {
            Some(ref mime) => form.file_from_bytes_with_mime(FILES_FIELD, file.filename, file.data, mime)?,
            None => form.file_from_bytes(FILES_FIELD, file.filename, file.data),
        };
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_is_guessed_from_extension() {
        let file = UploadFile::from_bytes("photo.png", vec![0u8; 4]);
        assert_eq!(file.mime_type.as_deref(), Some("image/png"));
        assert_eq!(UploadFile::from_bytes("README", b"x".to_vec()).mime_type, None);
    }

    #[test]
    fn shared_mime_is_declared_once() {
        let files = vec![
            UploadFile::from_bytes("a.png", vec![1]),
            UploadFile::from_bytes("b.png", vec![2]),
        ];
        assert_eq!(declared_mime(&files), Some("image/png"));
        let form = build_form(files).expect("form");
        assert_eq!(form.len(), 3);
    }

    #[test]
    fn mixed_mime_is_not_declared() {
        let files = vec![
            UploadFile::from_bytes("a.png", vec![1]),
            UploadFile::from_bytes("b.txt", vec![2]),
        ];
        assert_eq!(declared_mime(&files), None);
        assert_eq!(build_form(files).expect("form").len(), 2);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(build_form(Vec::new()), Err(VaultError::Validation(_))));
    }

    #[tokio::test]
    async fn from_path_reads_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").expect("write");
        let file = UploadFile::from_path(&path).await.expect("read");
        assert_eq!(file.filename, "notes.txt");
        assert_eq!(file.data, b"hello");
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
    }
}
