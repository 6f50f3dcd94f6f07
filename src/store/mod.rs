use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde_json::Value;

use crate::error::{FileReadError, StoreError};

pub mod models;

/// Subdirectory of the results root holding per-recipient delivery files.
pub const EMAIL_SUBDIR: &str = "emails";

/// Legacy flat layouts stored email files next to responses under this
/// prefix; the response listing must not double-count them.
const EMAIL_FILE_PREFIX: &str = "email-";

/// One parsed source file: the filename stem (the fallback record id)
/// plus the raw JSON document.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id_hint: String,
    pub value: Value,
}

/// Read-only reader over a results directory and its email subdirectory.
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn email_dir(&self) -> PathBuf {
        self.root.join(EMAIL_SUBDIR)
    }

    /// Load every readable response file in the results directory.
    pub async fn load_responses(&self) -> Result<Vec<RawDocument>, StoreError> {
        load_dir(&self.root, true).await
    }

    /// Load every readable delivery file in the email subdirectory.
    pub async fn load_emails(&self) -> Result<Vec<RawDocument>, StoreError> {
        load_dir(&self.email_dir(), false).await
    }
}

async fn load_dir(dir: &Path, skip_email_prefix: bool) -> Result<Vec<RawDocument>, StoreError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        // A store that does not exist yet is empty, not broken.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(StoreError {
                path: dir.to_path_buf(),
                source: err,
            })
        }
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                return Err(StoreError {
                    path: dir.to_path_buf(),
                    source: err,
                })
            }
        };
        let path = entry.path();
        if is_candidate(&path, skip_email_prefix) {
            paths.push(path);
        }
    }

    // Readdir order is platform-dependent; insertion order is defined as
    // filename order.
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        match read_document(path).await {
            Ok(document) => documents.push(document),
            Err(err) => log::warn!("skipping {}: {}", path.display(), err),
        }
    }

    Ok(documents)
}

fn is_candidate(path: &Path, skip_email_prefix: bool) -> bool {
    if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        return false;
    }
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    !(skip_email_prefix && name.starts_with(EMAIL_FILE_PREFIX))
}

async fn read_document(path: &Path) -> Result<RawDocument, FileReadError> {
    let bytes = tokio::fs::read(path).await?;
    let text = decode_text(&bytes)?;
    let value: Value = serde_json::from_str(&text)?;

    let id_hint = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string();

    Ok(RawDocument { id_hint, value })
}

/// Decode file bytes to text: BOM detection first, plain UTF-8 next,
/// Windows-1252 as the legacy fallback.
fn decode_text(bytes: &[u8]) -> Result<String, FileReadError> {
    let encoding = match Encoding::for_bom(bytes) {
        Some((encoding, _)) => encoding,
        None if std::str::from_utf8(bytes).is_ok() => UTF_8,
        None => WINDOWS_1252,
    };

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(FileReadError::Encoding);
    }
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, contents: &[u8]) {
        std::fs::write(dir.join(name), contents).expect("failed to write fixture");
    }

    #[tokio::test]
    async fn missing_directory_yields_empty_sequence() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("does-not-exist"));

        let responses = store.load_responses().await.unwrap();
        assert!(responses.is_empty());

        let emails = store.load_emails().await.unwrap();
        assert!(emails.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.json", br#"{"id": "a"}"#);
        write_file(dir.path(), "b.json", b"{ not json at all");
        write_file(dir.path(), "c.json", br#"{"id": "c"}"#);

        let store = ResultStore::new(dir.path());
        let documents = store.load_responses().await.unwrap();

        let ids: Vec<&str> = documents.iter().map(|doc| doc.id_hint.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn listing_skips_non_json_and_email_prefixed_files() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "response-1.json", b"{}");
        write_file(dir.path(), "email-1.json", b"{}");
        write_file(dir.path(), "notes.txt", b"ignore me");

        let store = ResultStore::new(dir.path());
        let documents = store.load_responses().await.unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id_hint, "response-1");
    }

    #[tokio::test]
    async fn email_subdirectory_is_read_separately() {
        let dir = tempdir().unwrap();
        let email_dir = dir.path().join(EMAIL_SUBDIR);
        std::fs::create_dir(&email_dir).unwrap();
        write_file(dir.path(), "r1.json", br#"{"id": "r1"}"#);
        write_file(&email_dir, "email-r1.json", br#"{"recipientEmail": "a@b.c"}"#);

        let store = ResultStore::new(dir.path());
        assert_eq!(store.load_responses().await.unwrap().len(), 1);
        assert_eq!(store.load_emails().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn documents_come_back_in_filename_order() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "c.json", b"{}");
        write_file(dir.path(), "a.json", b"{}");
        write_file(dir.path(), "b.json", b"{}");

        let store = ResultStore::new(dir.path());
        let documents = store.load_responses().await.unwrap();
        let ids: Vec<&str> = documents.iter().map(|doc| doc.id_hint.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn bom_prefixed_file_still_parses() {
        let dir = tempdir().unwrap();
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"{"id": "bom"}"#);
        write_file(dir.path(), "bom.json", &bytes);

        let store = ResultStore::new(dir.path());
        let documents = store.load_responses().await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].value["id"], "bom");
    }

    #[test]
    fn decode_text_falls_back_to_windows_1252() {
        // 0xE9 is "é" in Windows-1252 and invalid on its own in UTF-8.
        let decoded = decode_text(&[0x22, 0xE9, 0x22]).unwrap();
        assert_eq!(decoded, "\"\u{e9}\"");
    }
}
