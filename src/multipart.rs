//! `multipart/form-data` body parsing.
//!
//! Recovers the first file part of an upload body. The scanner walks the body
//! through four states:
//!
//! ```text
//! Preamble ──delimiter──▶ Headers ──blank line──▶ Body ──delimiter──▶ Headers …
//!                                                   └──close delimiter──▶ Done
//! ```
//!
//! A delimiter (`--` + boundary) is only recognised at the very start of the
//! body or directly after a line break. Boundary-like bytes anywhere else are
//! file content. Content ends at the line break that precedes the next
//! delimiter; that single framing line break is removed and nothing else, so
//! file bytes survive unchanged.

use crate::error::QaError;

/// Message for bodies that contain no part with a usable `filename`.
pub const NO_FILE_PART_MESSAGE: &str = "File part not found in the request";

/// A file recovered from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied filename, quotes stripped, otherwise untouched.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Extracts the `boundary` parameter from a `Content-Type` header value.
///
/// The media type must be `multipart/form-data` (case-insensitive).
pub fn boundary_from_content_type(content_type: &str) -> Result<String, QaError> {
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return Err(QaError::malformed("Content-Type must be multipart/form-data"));
    }

    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| unquote(value.trim()).to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| QaError::malformed("multipart Content-Type is missing a boundary"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    /// Before the first delimiter.
    Preamble,
    /// Just past a delimiter line, at the start of a header block.
    Headers { at: usize },
    /// Inside a part's content.
    Body {
        start: usize,
        filename: Option<String>,
    },
    Done,
}

/// Returns the first part of `body` that carries a `filename` in its
/// `Content-Disposition` header.
///
/// # Errors
///
/// [`QaError::MalformedMultipart`] when a part has no blank line between its
/// headers and content, or when no part names a file.
pub fn extract(body: &[u8], boundary: &[u8]) -> Result<UploadedFile, QaError> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary);

    let mut state = ScanState::Preamble;
    loop {
        state = match state {
            ScanState::Preamble => match find_delimiter(body, &delimiter, 0) {
                Some(found) => after_delimiter(body, found.end),
                None => ScanState::Done,
            },
            ScanState::Headers { at } => {
                // The header block may not run into the next part.
                let next = find_delimiter(body, &delimiter, at);
                let limit = next.as_ref().map_or(body.len(), |d| d.start);
                if body[at..limit].iter().all(u8::is_ascii_whitespace) {
                    // Empty part.
                    next.map_or(ScanState::Done, |found| after_delimiter(body, found.end))
                } else {
                    let (header_end, content_start) =
                        split_headers(&body[..limit], at).ok_or_else(|| {
                            QaError::malformed("multipart part has no header/body separator")
                        })?;
                    let headers = String::from_utf8_lossy(&body[at..header_end]);
                    ScanState::Body {
                        start: content_start,
                        filename: disposition_filename(&headers),
                    }
                }
            }
            ScanState::Body { start, filename } => {
                let next = find_delimiter(body, &delimiter, start);
                if let Some(filename) = filename {
                    let end = match next {
                        Some(found) => found.content_end,
                        None => trim_one_line_break(body, body.len()),
                    };
                    return Ok(UploadedFile {
                        filename,
                        bytes: body[start..end.max(start)].to_vec(),
                    });
                }
                match next {
                    Some(found) => after_delimiter(body, found.end),
                    None => ScanState::Done,
                }
            }
            ScanState::Done => return Err(QaError::malformed(NO_FILE_PART_MESSAGE)),
        };
    }
}

/// A delimiter occurrence.
struct Delimiter {
    /// First byte of the delimiter token.
    start: usize,
    /// Where the preceding part's content ends (before the framing line break).
    content_end: usize,
    /// First byte after the delimiter token.
    end: usize,
}

/// Finds the next delimiter at or after `from` that sits at the body start or
/// right after a line break.
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<Delimiter> {
    let mut pos = from;
    while let Some(offset) = find(&body[pos..], delimiter) {
        let at = pos + offset;
        if at == 0 || body[at - 1] == b'\n' {
            return Some(Delimiter {
                start: at,
                content_end: trim_one_line_break(body, at).max(from),
                end: at + delimiter.len(),
            });
        }
        pos = at + 1;
    }
    None
}

/// Moves past the rest of a delimiter line: the close marker `--`, transport
/// padding, and the line break.
fn after_delimiter(body: &[u8], mut pos: usize) -> ScanState {
    if body[pos..].starts_with(b"--") {
        return ScanState::Done;
    }
    while pos < body.len() && (body[pos] == b' ' || body[pos] == b'\t') {
        pos += 1;
    }
    if body[pos..].starts_with(b"\r\n") {
        pos += 2;
    } else if body[pos..].starts_with(b"\n") {
        pos += 1;
    }
    if pos >= body.len() {
        return ScanState::Done;
    }
    ScanState::Headers { at: pos }
}

/// Locates the blank line ending a header block. Returns the end of the
/// header text and the start of the content.
fn split_headers(body: &[u8], at: usize) -> Option<(usize, usize)> {
    let rest = &body[at..];
    let crlf = find(rest, b"\r\n\r\n").map(|i| (at + i, at + i + 4));
    let lf = find(rest, b"\n\n").map(|i| (at + i, at + i + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Reads the `filename` parameter of the `Content-Disposition` header.
/// An empty filename (a form field with no file chosen) counts as absent.
fn disposition_filename(headers: &str) -> Option<String> {
    headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("content-disposition"))
        .find_map(|(_, value)| {
            value
                .split(';')
                .skip(1)
                .filter_map(|param| param.split_once('='))
                .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
                .map(|(_, v)| unquote(v.trim()).to_string())
        })
        .filter(|name| !name.is_empty())
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Index of `end` minus one trailing CRLF or LF.
fn trim_one_line_break(body: &[u8], end: usize) -> usize {
    if body[..end].ends_with(b"\r\n") {
        end - 2
    } else if body[..end].ends_with(b"\n") {
        end - 1
    } else {
        end
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
