//! Input decoding: turn what the caller hands us into PDF bytes.
//!
//! Documents usually arrive base64-encoded (that is how workflow hosts pass
//! binary parameters around). We validate the `%PDF` header before handing
//! bytes to the engine so callers get a meaningful error rather than an
//! opaque parser failure.

use crate::error::Pdf2TextError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// How far into the buffer the `%PDF` header may appear. Some producers
/// prepend junk; readers are expected to tolerate up to 1 KiB of it.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Decode a base64 document and check it looks like a PDF.
///
/// ASCII whitespace (line-wrapped base64) is ignored.
pub fn decode_base64_document(encoded: &str) -> Result<Vec<u8>, Pdf2TextError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Pdf2TextError::DocumentLoad {
            detail: format!("document is not valid base64: {e}"),
        })?;
    check_pdf_header(&bytes)?;
    debug!("Decoded base64 document: {} bytes", bytes.len());
    Ok(bytes)
}

/// Fail with [`Pdf2TextError::DocumentLoad`] unless `%PDF` occurs near the start.
pub fn check_pdf_header(bytes: &[u8]) -> Result<(), Pdf2TextError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window.windows(4).any(|w| w == b"%PDF") {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(Pdf2TextError::DocumentLoad {
        detail: format!("missing %PDF header (first bytes: {magic:?})"),
    })
}

/// Read a document from disk. With `base64 = true` the file holds base64 text.
pub async fn read_document(path: &Path, base64: bool) -> Result<Vec<u8>, Pdf2TextError> {
    let raw = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Pdf2TextError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Pdf2TextError::DocumentLoad {
            detail: format!("failed to read '{}': {e}", path.display()),
        },
    })?;

    if base64 {
        let text = String::from_utf8(raw).map_err(|_| Pdf2TextError::DocumentLoad {
            detail: format!("'{}' is not base64 text", path.display()),
        })?;
        decode_base64_document(&text)
    } else {
        check_pdf_header(&raw)?;
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = STANDARD.encode(b"%PDF-1.7\n...");
        let (a, b) = encoded.split_at(5);
        let wrapped = format!("{a}\n  {b}\r\n");
        assert_eq!(decode_base64_document(&wrapped).unwrap(), b"%PDF-1.7\n...");
    }

    #[test]
    fn invalid_base64_is_a_load_error() {
        let err = decode_base64_document("%%% not base64 %%%").unwrap_err();
        assert!(matches!(err, Pdf2TextError::DocumentLoad { .. }));
    }

    #[test]
    fn non_pdf_payload_is_rejected() {
        let err = decode_base64_document(&STANDARD.encode(b"GIF89a....")).unwrap_err();
        assert!(err.to_string().contains("%PDF"), "{err}");
    }

    #[test]
    fn header_may_follow_leading_junk() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(check_pdf_header(&bytes).is_ok());

        let mut far = vec![b' '; 2000];
        far.extend_from_slice(b"%PDF-1.4");
        assert!(check_pdf_header(&far).is_err());
    }

    #[test]
    fn empty_buffer_is_rejected() {
        assert!(check_pdf_header(b"").is_err());
    }

    #[tokio::test]
    async fn read_document_missing_file() {
        let err = read_document(Path::new("/definitely/not/a/real/file.pdf"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2TextError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn read_document_base64_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.b64");
        std::fs::write(&path, STANDARD.encode(b"%PDF-1.7 body")).unwrap();
        assert_eq!(read_document(&path, true).await.unwrap(), b"%PDF-1.7 body");
    }
}
