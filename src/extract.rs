//! PDF text extraction for comparison inputs.
//!
//! Documents reach the engine three ways: as plain text in the request body,
//! as base64-encoded PDF bytes (optionally wrapped in a data URL), or as
//! `.pdf` files sitting in the uploads directory. This module turns all
//! three into plain UTF-8 text keyed by document name.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::BTreeMap;
use std::path::Path;

/// Extraction error. Extraction never panics; failures are reported per
/// document so the surrounding pipeline can skip the item.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    Base64(String),
    Io(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Base64(e) => write!(f, "base64 decode failed: {}", e),
            ExtractError::Io(e) => write!(f, "read failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract text from in-memory PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Decode a base64 PDF payload (with or without a `data:application/pdf;base64,`
/// prefix) and extract its text.
pub fn extract_base64_pdf(content: &str) -> Result<String, ExtractError> {
    let payload = match content.split_once(',') {
        Some((_, rest)) => rest,
        None => content,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| ExtractError::Base64(e.to_string()))?;
    extract_pdf(&bytes)
}

/// Heuristic for request payloads: content that carries a PDF data-URL
/// prefix, or that is long, starts with base64-alphabet characters only,
/// and does not read as prose, is treated as a base64-encoded PDF rather
/// than inline text. Punctuation like `.` or `,` is not valid base64, so
/// ordinary sentences ("1. Introduction", "Dear Dr. Smith,") stay text.
pub fn looks_like_base64_pdf(content: &str) -> bool {
    if content.starts_with("data:application/pdf;base64,") {
        return true;
    }
    if content.len() <= 100 {
        return false;
    }
    let head: Vec<char> = content.trim().chars().take(20).collect();
    let base64_head = !head.is_empty()
        && head
            .iter()
            .filter(|c| !c.is_ascii_whitespace())
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
    let reads_as_prose = head
        .iter()
        .all(|c| c.is_ascii_alphabetic() || c.is_ascii_whitespace());
    base64_head && !reads_as_prose
}

/// Load every `.pdf` file in a folder and extract its text.
///
/// Returns a name -> text map in filename order. Unreadable or unparsable
/// PDFs are reported to stderr and skipped; they never abort the load.
pub fn load_pdf_folder(folder: &Path) -> Result<BTreeMap<String, String>, ExtractError> {
    if !folder.exists() {
        return Err(ExtractError::Io(format!(
            "folder does not exist: {}",
            folder.display()
        )));
    }

    let mut contents = BTreeMap::new();
    let entries = std::fs::read_dir(folder).map_err(|e| ExtractError::Io(e.to_string()))?;

    for entry in entries {
        let entry = entry.map_err(|e| ExtractError::Io(e.to_string()))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.to_lowercase().ends_with(".pdf") || !path.is_file() {
            continue;
        }

        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("skipping {}: {}", name, e);
                continue;
            }
        };

        match extract_pdf(&bytes) {
            Ok(text) => {
                println!("loaded {} ({} characters)", name, text.len());
                contents.insert(name, text);
            }
            Err(e) => {
                eprintln!("skipping {}: {}", name, e);
            }
        }
    }

    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pdf(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_base64_returns_error() {
        let err = extract_base64_pdf("data:application/pdf;base64,!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, ExtractError::Base64(_)));
    }

    #[test]
    fn data_url_prefix_is_detected() {
        assert!(looks_like_base64_pdf("data:application/pdf;base64,JVBERi0x"));
    }

    #[test]
    fn prose_is_not_mistaken_for_base64() {
        let text = "This proposal describes the methodology we used to evaluate \
                    the three candidate architectures across clarity and cost.";
        assert!(!looks_like_base64_pdf(text));
    }

    #[test]
    fn punctuated_prose_is_not_mistaken_for_base64() {
        let numbered = "1. Introduction\n\nThis section lays out the goals of the project \
                        and the constraints under which it was delivered.";
        assert!(!looks_like_base64_pdf(numbered));

        let letter = "Dear Dr. Smith, thank you for your detailed review of the draft \
                      and for the corrections you suggested throughout.";
        assert!(!looks_like_base64_pdf(letter));
    }

    #[test]
    fn bare_base64_payload_is_detected() {
        // "%PDF-1.4" encoded, padded out past the length floor.
        let payload = format!("JVBERi0xLjQKJcfsj6IK{}", "QUJDREVGR0hJSktMTU5P".repeat(6));
        assert!(looks_like_base64_pdf(&payload));
    }

    #[test]
    fn missing_folder_is_an_error() {
        let err = load_pdf_folder(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn non_pdf_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let contents = load_pdf_folder(dir.path()).unwrap();
        assert!(contents.is_empty());
    }
}
