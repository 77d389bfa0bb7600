//! 集成测试：访问令牌
//!
//! 测试令牌签发、验证以及各类无效令牌的错误分类。

use chrono::Duration;
use marketplace_authz::config::AuthzConfig;
use marketplace_authz::error::{Error, TokenError};
use marketplace_authz::rbac::{AdminRole, Role, Subject, User};
use marketplace_authz::token::{TokenIssuer, TokenVerifier, TokenVerifierConfig};

const SECRET: &[u8] = b"integration-secret-at-least-32-bytes!";

/// 测试签发与验证的基本流程
#[test]
fn test_issue_and_verify() {
    let user = User::admin("u1", "u1@example.com", "U1", AdminRole::UserManager);
    let token = TokenIssuer::new(SECRET)
        .issue_for(&Subject::from(user))
        .unwrap();

    let claims = TokenVerifier::new(SECRET).verify(&token).unwrap();
    assert_eq!(claims.sub, "u1");
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.email.as_deref(), Some("u1@example.com"));
}

/// 测试每个令牌的 ID 唯一
#[test]
fn test_token_ids_are_unique() {
    let issuer = TokenIssuer::new(SECRET);
    let verifier = TokenVerifier::new(SECRET);

    let first = verifier
        .verify(&issuer.issue("u1", Role::Investor).unwrap())
        .unwrap();
    let second = verifier
        .verify(&issuer.issue("u1", Role::Investor).unwrap())
        .unwrap();
    assert_ne!(first.jti, second.jti);
}

/// 测试错误密钥
#[test]
fn test_wrong_secret() {
    let token = TokenIssuer::new(SECRET)
        .issue("u1", Role::Investor)
        .unwrap();

    let err = TokenVerifier::new(b"different-secret-at-least-32-bytes!!")
        .verify(&token)
        .unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::InvalidSignature)));
}

/// 测试过期令牌与时钟偏差
#[test]
fn test_expired_token() {
    let token = TokenIssuer::new(SECRET)
        .with_lifetime(Duration::seconds(-30))
        .issue("u1", Role::Investor)
        .unwrap();

    let err = TokenVerifier::new(SECRET).verify(&token).unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::Expired)));

    let lenient =
        TokenVerifier::with_config(SECRET, TokenVerifierConfig::new().with_leeway(120));
    assert!(lenient.verify(&token).is_ok());

    let unchecked =
        TokenVerifier::with_config(SECRET, TokenVerifierConfig::new().without_exp_validation());
    assert!(unchecked.verify(&token).unwrap().is_expired());
}

/// 测试格式错误的令牌
#[test]
fn test_malformed_token() {
    let err = TokenVerifier::new(SECRET).verify("abc.def").unwrap_err();
    assert!(matches!(err, Error::Token(_)));
    assert_eq!(err.status_code(), 401);
}

/// 测试配置生成的验证器检查签发者
#[test]
fn test_config_verifier_checks_issuer() {
    let config = AuthzConfig::new(String::from_utf8_lossy(SECRET)).with_issuer("marketplace");
    let verifier = config.token_verifier();

    let good = TokenIssuer::new(SECRET)
        .with_issuer("marketplace")
        .issue("u1", Role::ProjectOwner)
        .unwrap();
    assert_eq!(verifier.verify(&good).unwrap().iss.as_deref(), Some("marketplace"));

    let bad = TokenIssuer::new(SECRET)
        .with_issuer("elsewhere")
        .issue("u1", Role::ProjectOwner)
        .unwrap();
    assert!(verifier.verify(&bad).is_err());
}
