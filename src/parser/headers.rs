//! Header-block parsing: splitting a part's raw header bytes into an
//! ordered, case-insensitive multimap, plus the derived `Content-Disposition`
//! / `Content-Type` views surfaced on [`crate::PartStream`].
//!
//! Thin glue per the crate's scope: none of this drives the boundary state
//! machine, it only turns already-framed header bytes into structured data.

use http::{HeaderMap, HeaderName};

const DEFAULT_PART_CONTENT_TYPE: &str = "application/octet-stream";

/// Ordered, case-insensitive multimap of a part's raw header lines.
///
/// Lines that parsed as `name: value`, with `name` a valid HTTP token, are
/// indexed in an [`http::HeaderMap`] (case-insensitive lookup and duplicate
/// preservation are its own invariants, not hand-rolled here). Lines with no
/// `:`, or whose name isn't a valid [`HeaderName`], are kept in
/// [`RawHeaders::malformed_lines`] instead — per the parser's policy, a
/// malformed header line degrades the part's derived accessors to `None`
/// rather than failing the parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawHeaders {
    map: HeaderMap<String>,
    malformed_lines: Vec<String>,
}

impl RawHeaders {
    /// Returns the first value for `name`, matching case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Returns every value for `name`, in wire order, matching
    /// case-insensitively.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.map.get_all(name).into_iter().map(String::as_str)
    }

    /// Iterates all `(name, value)` pairs, grouped by name with duplicate
    /// names kept together in insertion order (the iteration order
    /// [`http::HeaderMap`] itself provides).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the raw text of every header line that had no `:` separator,
    /// or whose name wasn't a valid HTTP header token.
    pub fn malformed_lines(&self) -> &[String] {
        &self.malformed_lines
    }
}

/// Splits a part's raw header-block bytes (CRLF-separated, with the
/// terminating CRLFCRLF already stripped by the caller) into a
/// [`RawHeaders`] multimap.
///
/// This never fails: a line lacking a `:`, or whose name doesn't parse as an
/// [`HeaderName`] token, is recorded as malformed rather than aborting the
/// parse, and non-UTF-8 bytes are replaced using the standard lossy
/// substitution rather than raising an error, consistent with "malformed
/// headers do not poison the part".
pub fn parse_header_block(block: &[u8]) -> RawHeaders {
    let mut raw = RawHeaders::default();

    for line in split_crlf(block) {
        if line.is_empty() {
            continue;
        }

        let line = String::from_utf8_lossy(line).into_owned();
        match line.split_once(':') {
            Some((name, value)) => match name.trim().parse::<HeaderName>() {
                Ok(name) => {
                    raw.map.append(name, trim_lws(value).to_owned());
                }
                Err(_) => raw.malformed_lines.push(line),
            },
            None => raw.malformed_lines.push(line),
        }
    }

    raw
}

fn split_crlf(block: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while index + 1 < block.len() {
        if block[index] == b'\r' && block[index + 1] == b'\n' {
            lines.push(&block[start..index]);
            index += 2;
            start = index;
            continue;
        }
        index += 1;
    }
    lines.push(&block[start..]);
    lines
}

fn trim_lws(value: &str) -> &str {
    value.trim_matches(|c| c == ' ' || c == '\t')
}

/// Derived `Content-Disposition` view: disposition type plus the `name`,
/// `filename`, and `filename*` parameters, quote-aware and RFC 5987-aware.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentDisposition {
    /// Disposition token (typically `form-data`), lowercased.
    pub disposition: Option<String>,
    /// The `name` parameter.
    pub name: Option<String>,
    /// The `filename` or `filename*` parameter (`filename*` wins if both
    /// are present).
    pub filename: Option<String>,
}

/// Parses a `Content-Disposition` header value.
///
/// Malformed parameters are simply skipped, per the "malformed headers do
/// not poison the part" policy — this never yields a hard error.
pub fn parse_content_disposition(value: &str) -> ContentDisposition {
    let mut segments = split_semicolon_aware(value).into_iter();
    let disposition = segments
        .next()
        .map(|segment| segment.trim().to_ascii_lowercase())
        .filter(|segment| !segment.is_empty());

    let mut name: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut filename_star: Option<String> = None;

    for segment in segments {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = trimmed.split_once('=') else {
            continue;
        };

        let key = raw_key.trim().to_ascii_lowercase();
        let Some(decoded) = parse_parameter_value(raw_value.trim()) else {
            continue;
        };

        match key.as_str() {
            "name" => name = Some(decoded),
            "filename" => filename = Some(decoded),
            "filename*" => filename_star = parse_rfc5987_value(&decoded),
            _ => {}
        }
    }

    ContentDisposition {
        disposition,
        name,
        filename: filename_star.or(filename),
    }
}

/// Parses a part-level `Content-Type` value, defaulting to
/// `application/octet-stream` when absent or invalid, per RFC 7578.
///
/// Validated (not just sniffed) via [`mime::Mime`], matching the teacher's
/// own `raw.parse::<mime::Mime>()` part-content-type handling; the value is
/// otherwise returned verbatim (parameters included) rather than reduced to
/// `mime::Mime::essence_str()`, since a part's `Content-Type` parameters
/// (e.g. `charset`) are part of what the caller asked to see.
pub fn parse_part_content_type(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .filter(|v| v.parse::<mime::Mime>().is_ok())
        .unwrap_or(DEFAULT_PART_CONTENT_TYPE)
        .to_owned()
}

fn parse_parameter_value(raw: &str) -> Option<String> {
    if let Some(stripped) = raw.strip_prefix('"') {
        let stripped = stripped.strip_suffix('"')?;
        return Some(unescape_quoted_string(stripped));
    }

    if raw.contains('"') {
        return None;
    }

    Some(raw.trim().to_owned())
}

fn unescape_quoted_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
                continue;
            }
            break;
        }
        out.push(ch);
    }

    out
}

fn parse_rfc5987_value(value: &str) -> Option<String> {
    let (charset, rest) = value.split_once('\'')?;
    let (_lang, encoded) = rest.split_once('\'')?;

    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }

    percent_decode_utf8(encoded)
}

fn percent_decode_utf8(value: &str) -> Option<String> {
    let raw = value.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut index = 0usize;

    while index < raw.len() {
        if raw[index] == b'%' {
            if index + 2 >= raw.len() {
                return None;
            }
            let hi = hex_value(raw[index + 1])?;
            let lo = hex_value(raw[index + 2])?;
            bytes.push((hi << 4) | lo);
            index += 3;
            continue;
        }

        bytes.push(raw[index]);
        index += 1;
    }

    String::from_utf8(bytes).ok()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn split_semicolon_aware(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ';' if !in_quotes => {
                segments.push(current);
                current = String::new();
            }
            _ => current.push(ch),
        }
    }

    segments.push(current);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_and_value_trimming_lws() {
        let raw = parse_header_block(b"Content-Type:  text/plain \r\nX-Foo:bar");
        assert_eq!(raw.get("content-type"), Some("text/plain"));
        assert_eq!(raw.get("x-foo"), Some("bar"));
    }

    #[test]
    fn keeps_duplicate_names_in_order() {
        let raw = parse_header_block(b"X-Tag: a\r\nX-Tag: b");
        assert_eq!(raw.get_all("x-tag").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn lines_without_colon_are_malformed_not_fatal() {
        let raw = parse_header_block(b"Content-Disposition: form-data; name=\"f\"\r\nBroken Line");
        assert_eq!(raw.get("content-disposition"), Some("form-data; name=\"f\""));
        assert_eq!(raw.malformed_lines(), &["Broken Line".to_owned()]);
    }

    #[test]
    fn invalid_header_name_token_is_malformed_not_fatal() {
        let raw = parse_header_block(b"Content-Disposition: form-data; name=\"f\"\r\nNot A Token: value");
        assert_eq!(raw.get("content-disposition"), Some("form-data; name=\"f\""));
        assert_eq!(raw.malformed_lines(), &["Not A Token: value".to_owned()]);
    }

    #[test]
    fn parses_name_and_filename() {
        let cd = parse_content_disposition(r#"form-data; name="file1"; filename="test.txt""#);
        assert_eq!(cd.disposition.as_deref(), Some("form-data"));
        assert_eq!(cd.name.as_deref(), Some("file1"));
        assert_eq!(cd.filename.as_deref(), Some("test.txt"));
    }

    #[test]
    fn filename_star_wins_over_filename() {
        let cd = parse_content_disposition(
            "form-data; name=\"f\"; filename=\"fallback.txt\"; filename*=UTF-8''caf%C3%A9.txt",
        );
        assert_eq!(cd.filename.as_deref(), Some("café.txt"));
    }

    #[test]
    fn missing_name_parameter_yields_none() {
        let cd = parse_content_disposition("form-data");
        assert_eq!(cd.name, None);
    }

    #[test]
    fn defaults_missing_content_type() {
        assert_eq!(parse_part_content_type(None), "application/octet-stream");
        assert_eq!(parse_part_content_type(Some("text/plain")), "text/plain");
    }

    #[test]
    fn invalid_content_type_falls_back_to_default() {
        assert_eq!(
            parse_part_content_type(Some("not a media type")),
            "application/octet-stream"
        );
    }
}
