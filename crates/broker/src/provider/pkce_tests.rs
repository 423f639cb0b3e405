// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn code_verifier_is_valid_length() {
    let v = generate_code_verifier();
    assert!(v.len() >= 43 && v.len() <= 128, "verifier length {} out of range", v.len());
}

#[test]
fn code_verifier_is_url_safe() {
    let v = generate_code_verifier();
    assert!(v.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
}

#[test]
fn code_verifiers_are_unique() {
    assert_ne!(generate_code_verifier(), generate_code_verifier());
}

#[test]
fn code_challenge_is_deterministic() {
    let verifier = "test-verifier-string";
    let c1 = compute_code_challenge(verifier);
    let c2 = compute_code_challenge(verifier);
    assert_eq!(c1, c2);
    assert!(!c1.is_empty());
}

#[test]
fn code_challenge_matches_rfc_7636_vector() {
    // RFC 7636 appendix B.
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    assert_eq!(compute_code_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
}

#[test]
fn distinct_verifiers_yield_distinct_challenges() {
    let c1 = compute_code_challenge(&generate_code_verifier());
    let c2 = compute_code_challenge(&generate_code_verifier());
    assert_ne!(c1, c2);
}
