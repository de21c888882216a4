// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn mint_fails_without_secret() {
    assert!(matches!(SecretTokenMinter::new(None).mint(), Err(TokenError::MissingSecret)));
    assert!(matches!(
        SecretTokenMinter::new(Some(String::new())).mint(),
        Err(TokenError::MissingSecret)
    ));
}

#[test]
fn minted_token_is_jwt_shaped() {
    let minter = SecretTokenMinter::new(Some("shared-secret".into()));
    let token = minter.mint().unwrap();

    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3);

    let header = URL_SAFE_NO_PAD.decode(parts[0]).unwrap();
    let header: serde_json::Value = serde_json::from_slice(&header).unwrap();
    assert_eq!(header["alg"], "HS256");

    let claims = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
    let claims: serde_json::Value = serde_json::from_slice(&claims).unwrap();
    assert_eq!(claims["iss"], "quarry");
    assert!(claims["exp"].as_u64().unwrap() > claims["iat"].as_u64().unwrap());
}

#[test]
fn different_secrets_sign_differently() {
    let a = SecretTokenMinter::new(Some("secret-a".into())).mint().unwrap();
    let b = SecretTokenMinter::new(Some("secret-b".into())).mint().unwrap();
    let sig = |t: &str| t.rsplit('.').next().map(str::to_string);
    assert_ne!(sig(&a), sig(&b));
}

#[test]
fn hmac_matches_rfc4231_test_case_2() {
    // RFC 4231 test case 2: key "Jefe", data "what do ya want for nothing?"
    let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
    let hex: String = mac.iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(hex, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
}

#[test]
fn hmac_handles_long_keys() {
    // RFC 4231 test case 6: 131-byte key is hashed down first
    let key = [0xaau8; 131];
    let mac = hmac_sha256(&key, b"Test Using Larger Than Block-Size Key - Hash Key First");
    let hex: String = mac.iter().map(|b| format!("{b:02x}")).collect();
    assert_eq!(hex, "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54");
}

#[test]
fn fake_minter_behaves() {
    assert_eq!(FakeTokenMinter::with_token("t").mint().unwrap(), "t");
    assert!(FakeTokenMinter::failing().mint().is_err());
}
