//! Thin glue for detecting `multipart/*` requests and extracting the
//! `boundary` parameter from a `Content-Type` header value.
//!
//! Media-type sniffing is delegated to [`mime::Mime`], the same crate the
//! teacher parses `Content-Type` with ([`crate::parser::headers::parse_part_content_type`]
//! does the equivalent for a part's own `Content-Type`). Only the essence
//! (the text before the first `;`) is handed to `mime`, so a malformed or
//! unconventionally-formatted parameter section can never make a
//! structurally valid `multipart/*` type/subtype fail to match.
//!
//! [`get_boundary`]'s own parameter scan stays hand-rolled: RFC 2045
//! `quoted-string` unescaping (`\c` → `c`) and the "unquoted values
//! terminate at `;` or whitespace" rule are specified precisely enough that
//! a hand-rolled scan is both simpler and more exactly correct than
//! adapting `mime`'s parameter model to them.

/// Returns `true` iff `content_type`'s media type begins with `multipart/`,
/// case-insensitively. Parameters (anything from the first `;` onward) are
/// ignored.
pub fn is_multipart(content_type: &str) -> bool {
    essence(content_type)
        .parse::<mime::Mime>()
        .map(|mime| mime.type_() == mime::MULTIPART)
        .unwrap_or(false)
}

/// Returns the `boundary` parameter value from `content_type`, or `None` if
/// absent or if the media type is not `multipart/*`.
///
/// Quoted values follow RFC 2045 `quoted-string` rules (`\c` unescapes to
/// the literal byte `c`); unquoted values terminate at the first `;` or
/// linear-whitespace byte.
pub fn get_boundary(content_type: &str) -> Option<String> {
    if !is_multipart(content_type) {
        return None;
    }

    for param in split_parameters(content_type) {
        let param = param.trim_matches(is_lws);
        let (name, value) = param.split_once('=')?;
        if !name.trim_matches(is_lws).eq_ignore_ascii_case("boundary") {
            continue;
        }

        return Some(parse_parameter_value(value.trim_start_matches(is_lws)));
    }

    None
}

/// The text before the first top-level `;`, trimmed of linear whitespace —
/// the slice `mime::Mime` is asked to validate and classify.
fn essence(content_type: &str) -> &str {
    let first = content_type.split(';').next().unwrap_or(content_type);
    first.trim_matches(is_lws)
}

/// Splits on top-level `;` bytes, skipping over quoted-string spans so a
/// `;` embedded in a quoted parameter value doesn't end the split early.
fn split_parameters(content_type: &str) -> Vec<&str> {
    let Some(rest) = content_type.split_once(';').map(|(_, rest)| rest) else {
        return Vec::new();
    };

    let bytes = rest.as_bytes();
    let mut params = Vec::new();
    let mut start = 0usize;
    let mut in_quotes = false;
    let mut index = 0usize;

    while index < bytes.len() {
        match bytes[index] {
            b'\\' if in_quotes => index += 1,
            b'"' => in_quotes = !in_quotes,
            b';' if !in_quotes => {
                params.push(&rest[start..index]);
                start = index + 1;
            }
            _ => {}
        }
        index += 1;
    }
    params.push(&rest[start..]);
    params
}

fn parse_parameter_value(value: &str) -> String {
    if let Some(quoted) = value.strip_prefix('"') {
        let end = find_unescaped_quote(quoted).unwrap_or(quoted.len());
        return unescape_quoted_string(&quoted[..end]);
    }

    value
        .split(|c| c == ';' || is_lws(c))
        .next()
        .unwrap_or("")
        .to_owned()
}

fn find_unescaped_quote(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    let mut index = 0usize;
    while index < bytes.len() {
        match bytes[index] {
            b'\\' => index += 2,
            b'"' => return Some(index),
            _ => index += 1,
        }
    }
    None
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

fn is_lws(c: char) -> bool {
    c == ' ' || c == '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_multipart_case_insensitively() {
        assert!(is_multipart("Multipart/Form-Data; boundary=X"));
        assert!(is_multipart("multipart/mixed"));
        assert!(!is_multipart("application/json"));
    }

    #[test]
    fn extracts_unquoted_boundary() {
        assert_eq!(
            get_boundary("multipart/form-data; boundary=----WebKitFormBoundaryAbc123"),
            Some("----WebKitFormBoundaryAbc123".to_owned())
        );
    }

    #[test]
    fn extracts_quoted_boundary_with_unescape() {
        assert_eq!(
            get_boundary(r#"multipart/form-data; boundary="a\"b\\c""#),
            Some("a\"b\\c".to_owned())
        );
    }

    #[test]
    fn unquoted_boundary_terminates_at_semicolon() {
        assert_eq!(
            get_boundary("multipart/form-data; boundary=XBOUND; charset=utf-8"),
            Some("XBOUND".to_owned())
        );
    }

    #[test]
    fn returns_none_when_not_multipart() {
        assert_eq!(get_boundary("text/plain; boundary=XBOUND"), None);
    }

    #[test]
    fn returns_none_when_boundary_absent() {
        assert_eq!(get_boundary("multipart/form-data"), None);
    }
}
