// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use proptest::prelude::*;

use super::*;
use crate::error::ErrorCode;
use crate::test_support::make_jwt;

fn code_of(result: Result<String, GatewayError>) -> Option<ErrorCode> {
    result.err().map(|e| e.code)
}

#[test]
fn extracts_jti_from_bearer_header() -> anyhow::Result<()> {
    let jwt = make_jwt(&serde_json::json!({ "jti": "session-123", "sub": "user" }));
    assert_eq!(extract_session_id(&format!("Bearer {jwt}"))?, "session-123");
    Ok(())
}

#[test]
fn accepts_bare_token() -> anyhow::Result<()> {
    let jwt = make_jwt(&serde_json::json!({ "jti": "bare" }));
    assert_eq!(extract_session_id(&jwt)?, "bare");
    Ok(())
}

#[test]
fn accepts_padded_payload() -> anyhow::Result<()> {
    let payload = URL_SAFE.encode(br#"{"jti":"p"}"#);
    assert!(payload.ends_with('='));
    assert_eq!(extract_session_id(&format!("Bearer h.{payload}.s"))?, "p");
    Ok(())
}

#[test]
fn numeric_jti_is_stringified() -> anyhow::Result<()> {
    let jwt = make_jwt(&serde_json::json!({ "jti": 42 }));
    assert_eq!(extract_session_id(&jwt)?, "42");
    Ok(())
}

#[yare::parameterized(
    two_segments = { "Bearer aaa.bbb" },
    four_segments = { "Bearer aaa.bbb.ccc.ddd" },
    empty = { "" },
    scheme_only = { "Bearer " },
)]
fn wrong_segment_count_is_malformed(header: &str) {
    assert_eq!(code_of(extract_session_id(header)), Some(ErrorCode::MalformedCredential));
}

#[test]
fn missing_jti_is_malformed() {
    let jwt = make_jwt(&serde_json::json!({ "sub": "user" }));
    assert_eq!(code_of(extract_session_id(&jwt)), Some(ErrorCode::MalformedCredential));
}

#[test]
fn empty_jti_is_malformed() {
    let jwt = make_jwt(&serde_json::json!({ "jti": "" }));
    assert_eq!(code_of(extract_session_id(&jwt)), Some(ErrorCode::MalformedCredential));
}

#[test]
fn non_json_payload_is_malformed() {
    let payload = URL_SAFE_NO_PAD.encode(b"not json");
    assert_eq!(
        code_of(extract_session_id(&format!("h.{payload}.s"))),
        Some(ErrorCode::MalformedCredential)
    );
}

#[test]
fn signature_is_not_checked() -> anyhow::Result<()> {
    let jwt = make_jwt(&serde_json::json!({ "jti": "unsigned" }));
    let (head, _sig) = jwt.rsplit_once('.').unwrap_or((&jwt, ""));
    assert_eq!(extract_session_id(&format!("{head}.forged-signature"))?, "unsigned");
    Ok(())
}

proptest! {
    #[test]
    fn any_segment_count_but_three_fails(segments in prop::collection::vec("[A-Za-z0-9_-]{1,8}", 0..8usize)) {
        prop_assume!(segments.len() != 3);
        let token = segments.join(".");
        prop_assert_eq!(code_of(extract_session_id(&token)), Some(ErrorCode::MalformedCredential));
    }

    #[test]
    fn any_string_jti_roundtrips(jti in "[A-Za-z0-9-]{1,40}") {
        let jwt = make_jwt(&serde_json::json!({ "jti": jti.clone() }));
        prop_assert_eq!(extract_session_id(&jwt).ok(), Some(jti));
    }
}
