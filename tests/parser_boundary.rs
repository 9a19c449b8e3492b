#![allow(missing_docs)]

use multipart_core::{get_boundary, is_multipart};

#[test]
fn recognizes_multipart_media_types_case_insensitively() {
    assert!(is_multipart("multipart/form-data; boundary=abc123"));
    assert!(is_multipart("MULTIPART/Mixed"));
    assert!(!is_multipart("application/json"));
    assert!(!is_multipart("multipartial/made-up"));
}

#[test]
fn extracts_unquoted_boundary() {
    assert_eq!(
        get_boundary("multipart/form-data; boundary=abc123"),
        Some("abc123".to_owned())
    );
}

#[test]
fn extracts_quoted_boundary() {
    assert_eq!(
        get_boundary("multipart/form-data; boundary=\"my-boundary\""),
        Some("my-boundary".to_owned())
    );
}

#[test]
fn unescapes_quoted_boundary_per_rfc2045() {
    assert_eq!(
        get_boundary(r#"multipart/form-data; boundary="a\"b\\c""#),
        Some("a\"b\\c".to_owned())
    );
}

#[test]
fn returns_none_for_non_multipart_content_type() {
    assert_eq!(get_boundary("application/json; boundary=abc123"), None);
}

#[test]
fn returns_none_for_missing_boundary_parameter() {
    assert_eq!(get_boundary("multipart/form-data"), None);
}

#[test]
fn unquoted_boundary_terminates_at_semicolon_or_whitespace() {
    assert_eq!(
        get_boundary("multipart/form-data; boundary=XBOUND; charset=utf-8"),
        Some("XBOUND".to_owned())
    );
    assert_eq!(
        get_boundary("multipart/form-data; boundary=XBOUND charset=utf-8"),
        Some("XBOUND".to_owned())
    );
}

#[test]
fn boundary_comparison_is_case_sensitive_once_located() {
    // §9: the boundary parameter's value is treated as a case-sensitive
    // token once it has been located; only the media type and header name
    // matching fold ASCII case.
    assert_eq!(
        get_boundary("multipart/form-data; boundary=MixedCase"),
        Some("MixedCase".to_owned())
    );
    assert_ne!(get_boundary("multipart/form-data; boundary=MixedCase"), Some("mixedcase".to_owned()));
}

#[test]
fn real_world_webkit_boundary_survives_round_trip() {
    let content_type =
        "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW";
    assert!(is_multipart(content_type));
    assert_eq!(
        get_boundary(content_type),
        Some("----WebKitFormBoundary7MA4YWxkTrZu0gW".to_owned())
    );
}
