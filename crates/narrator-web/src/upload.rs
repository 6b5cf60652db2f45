use axum::extract::Multipart;

/// An uploaded file with its data and metadata.
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Parsed form fields from the multipart upload.
pub struct FormFields {
    pub file: UploadedFile,
    pub language: Option<String>,
    pub keywords: Vec<String>,
}

/// Parse a multipart form upload into structured form fields.
pub async fn parse_multipart(mut multipart: Multipart) -> Result<FormFields, String> {
    let mut file: Option<UploadedFile> = None;
    let mut language: Option<String> = None;
    let mut keywords: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Failed to read form field: {}", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "pdf" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| format!("Failed to read file data: {}", e))?
                    .to_vec();

                check_pdf(&filename, &data)?;
                file = Some(UploadedFile { filename, data });
            }
            "language" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read language: {}", e))?;
                if !val.trim().is_empty() {
                    language = Some(val.trim().to_string());
                }
            }
            "keywords" => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| format!("Failed to read keywords: {}", e))?;
                keywords = split_keywords(&val);
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    let file = file.ok_or("No file uploaded")?;

    Ok(FormFields {
        file,
        language,
        keywords,
    })
}

/// Comma-separated keywords, trimmed, blanks dropped.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Accept only PDFs, judged by magic bytes.
fn check_pdf(filename: &str, data: &[u8]) -> Result<(), String> {
    if data.starts_with(b"%PDF-") {
        return Ok(());
    }
    if filename.to_lowercase().ends_with(".pdf") {
        return Err("File has .pdf extension but doesn't appear to be a valid PDF".to_string());
    }
    Err("Unsupported file type. Please upload a PDF.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_magic_is_required() {
        assert!(check_pdf("paper.pdf", b"%PDF-1.7 ...").is_ok());
        assert!(check_pdf("no-extension", b"%PDF-1.4").is_ok());
        assert!(
            check_pdf("paper.pdf", b"PK\x03\x04")
                .unwrap_err()
                .contains("doesn't appear to be a valid PDF")
        );
        assert!(
            check_pdf("notes.txt", b"hello")
                .unwrap_err()
                .contains("Unsupported file type")
        );
    }

    #[test]
    fn keywords_are_trimmed() {
        assert_eq!(split_keywords(" energy, ,cells "), vec!["energy", "cells"]);
        assert!(split_keywords("").is_empty());
    }
}
