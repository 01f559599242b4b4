//! MIME type detection for task attachments.
//!
//! Resolution order: magic bytes, then the multipart part's declared
//! content type, then a guess from the file extension. ZIP and OLE
//! containers are refined with the hint so that `.docx`/`.xlsx` and
//! `.doc`/`.xls` keep their specific types.

pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
const MIME_ZIP: &str = "application/zip";
const MIME_OLE: &str = "application/x-ole-storage";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const MIME_DOC: &str = "application/msword";
const MIME_XLS: &str = "application/vnd.ms-excel";

/// MIME types accepted for uploads
pub const ALLOWED_UPLOAD_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "text/csv",
    MIME_DOC,
    MIME_DOCX,
    MIME_XLS,
    MIME_XLSX,
    MIME_ZIP,
];

/// Detect MIME type from the leading bytes of a file.
///
/// Only recognizes the signatures relevant to attachments. Plain text and
/// CSV have no signature and return `None`.
pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    // ZIP (and ZIP-based: DOCX, XLSX)
    if data.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
        return Some(MIME_ZIP);
    }
    // OLE compound file (legacy DOC, XLS)
    if data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return Some(MIME_OLE);
    }
    // Windows executables are never text, whatever the filename says
    if data.starts_with(b"MZ") || data.starts_with(&[0x7F, b'E', b'L', b'F']) {
        return Some(MIME_OCTET_STREAM);
    }

    None
}

/// Check if a string is a valid MIME type (e.g., "image/png").
pub fn is_valid_mime_type(s: &str) -> bool {
    let Some((type_part, subtype)) = s.split_once('/') else {
        return false;
    };
    if type_part.is_empty() || subtype.is_empty() || subtype.contains('/') {
        return false;
    }
    s.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b == b'/' || b == b'.' || b == b'-' || b == b'+' || b == b'_'
    })
}

/// Whether a resolved MIME type may be stored as an attachment
pub fn is_allowed_upload(mime: &str) -> bool {
    ALLOWED_UPLOAD_MIME_TYPES.contains(&mime)
}

/// Resolve the MIME type of an uploaded file.
pub fn resolve_upload_mime(data: &[u8], declared: Option<&str>, filename: &str) -> String {
    let hint = mime_hint(declared, filename);

    match detect_mime_type(data) {
        Some(MIME_ZIP) => match hint.as_deref() {
            Some(h) if h == MIME_DOCX || h == MIME_XLSX => h.to_string(),
            _ => MIME_ZIP.to_string(),
        },
        Some(MIME_OLE) => match hint.as_deref() {
            Some(h) if h == MIME_DOC || h == MIME_XLS => h.to_string(),
            _ => MIME_OLE.to_string(),
        },
        Some(sniffed) => sniffed.to_string(),
        None => hint.unwrap_or_else(|| MIME_OCTET_STREAM.to_string()),
    }
}

/// Declared content type (parameters stripped) or a guess from the filename
fn mime_hint(declared: Option<&str>, filename: &str) -> Option<String> {
    let declared = declared
        .map(|d| d.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|d| is_valid_mime_type(d) && d != MIME_OCTET_STREAM);

    declared.or_else(|| {
        mime_guess::from_path(filename)
            .first_raw()
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data(header: &[u8], total: usize) -> Vec<u8> {
        let mut d = header.to_vec();
        d.resize(total, 0);
        d
    }

    #[test]
    fn test_images() {
        assert_eq!(
            detect_mime_type(&make_data(&[0xFF, 0xD8, 0xFF, 0xE0], 16)),
            Some("image/jpeg")
        );
        assert_eq!(
            detect_mime_type(&make_data(
                &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
                16
            )),
            Some("image/png")
        );
        assert_eq!(detect_mime_type(&make_data(b"GIF89a", 16)), Some("image/gif"));

        let mut webp = b"RIFF".to_vec();
        webp.extend_from_slice(&[0; 4]);
        webp.extend_from_slice(b"WEBP");
        assert_eq!(detect_mime_type(&webp), Some("image/webp"));
    }

    #[test]
    fn test_short_and_unknown_data() {
        assert_eq!(detect_mime_type(&[0xFF, 0xD8]), None);
        assert_eq!(detect_mime_type(b"name,amount\n"), None);
    }

    #[test]
    fn test_resolve_docx_from_zip_signature() {
        let data = make_data(&[0x50, 0x4B, 0x03, 0x04], 32);
        assert_eq!(resolve_upload_mime(&data, None, "plan.docx"), MIME_DOCX);
        assert_eq!(resolve_upload_mime(&data, None, "archive.zip"), MIME_ZIP);
        assert_eq!(resolve_upload_mime(&data, Some(MIME_XLSX), "x"), MIME_XLSX);
    }

    #[test]
    fn test_resolve_legacy_office() {
        let data = make_data(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1], 32);
        assert_eq!(resolve_upload_mime(&data, None, "budget.xls"), MIME_XLS);
        assert_eq!(resolve_upload_mime(&data, None, "notes.doc"), MIME_DOC);
        assert!(!is_allowed_upload(&resolve_upload_mime(&data, None, "blob")));
    }

    #[test]
    fn test_resolve_text_uses_declared_then_extension() {
        let data = b"a,b,c\n1,2,3\n";
        assert_eq!(
            resolve_upload_mime(data, Some("text/csv; charset=utf-8"), "x.bin"),
            "text/csv"
        );
        assert_eq!(resolve_upload_mime(data, None, "notes.txt"), "text/plain");
        assert_eq!(
            resolve_upload_mime(data, Some(MIME_OCTET_STREAM), "rows.csv"),
            "text/csv"
        );
    }

    #[test]
    fn test_magic_bytes_override_declared() {
        let data = make_data(b"%PDF-1.7", 16);
        assert_eq!(
            resolve_upload_mime(&data, Some("image/png"), "x.png"),
            "application/pdf"
        );

        let exe = make_data(b"MZ\x90\x00", 16);
        let resolved = resolve_upload_mime(&exe, Some("text/plain"), "readme.txt");
        assert!(!is_allowed_upload(&resolved));
    }

    #[test]
    fn test_allow_list() {
        assert!(is_allowed_upload("image/png"));
        assert!(is_allowed_upload(MIME_DOCX));
        assert!(!is_allowed_upload("text/html"));
        assert!(!is_allowed_upload(MIME_OCTET_STREAM));
    }

    #[test]
    fn test_is_valid_mime_type() {
        assert!(is_valid_mime_type("application/vnd.ms-excel"));
        assert!(!is_valid_mime_type("image/png; charset=utf-8"));
        assert!(!is_valid_mime_type("image/"));
        assert!(!is_valid_mime_type("../etc/passwd"));
    }
}
