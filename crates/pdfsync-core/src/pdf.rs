//! Lightweight PDF sniffing.
//!
//! This is not a parser. It answers two questions cheaply so that imported
//! documents get sensible metadata: "is this a PDF?" and "roughly how many
//! pages does it have?".

/// PDF magic: %PDF
const PDF_MAGIC: &[u8] = b"%PDF";

/// Readers accept junk before the header within the first 1024 bytes.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Check if data looks like a PDF.
pub fn is_pdf(data: &[u8]) -> bool {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|w| w == PDF_MAGIC)
}

/// Count page objects (`/Type /Page`, not `/Type /Pages`).
///
/// Returns 0 for anything that is not a PDF. Compressed object streams hide
/// their page dictionaries, so this undercounts for such files.
pub fn count_pages(data: &[u8]) -> u32 {
    if !is_pdf(data) {
        return 0;
    }

    let mut count = 0u32;
    let mut i = 0usize;
    while let Some(offset) = find(&data[i..], b"/Type") {
        let mut pos = i + offset + b"/Type".len();
        while pos < data.len() && data[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if data[pos..].starts_with(b"/Page") {
            let after = pos + b"/Page".len();
            let is_page_tree = data
                .get(after)
                .is_some_and(|b| b.is_ascii_alphanumeric());
            if !is_page_tree {
                count = count.saturating_add(1);
            }
        }
        i = pos;
    }
    count
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.7\n%\xe2\xe3"));
        assert!(is_pdf(b"\r\n  %PDF-1.4"));
        assert!(!is_pdf(b"PK\x03\x04"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn test_count_pages_skips_page_tree() {
        let data = b"%PDF-1.4\n\
            1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
            2 0 obj << /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >> endobj\n\
            3 0 obj << /Type /Page /Parent 2 0 R >> endobj\n\
            4 0 obj << /Type/Page /Parent 2 0 R >> endobj\n";
        assert_eq!(count_pages(data), 2);
    }

    #[test]
    fn test_count_pages_not_pdf() {
        assert_eq!(count_pages(b"/Type /Page"), 0);
    }
}
