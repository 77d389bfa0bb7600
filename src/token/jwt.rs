//! JWT 访问令牌模块
//!
//! 签发与验证登录后携带的访问令牌。令牌中只包含身份信息
//! （用户 ID 和粗粒度角色），具体权限在每次请求时从存储中重新读取。
//!
//! 使用 HMAC-SHA256 签名。
//!
//! ## 示例
//!
//! ```rust
//! use marketplace_authz::rbac::Role;
//! use marketplace_authz::token::{TokenIssuer, TokenVerifier};
//!
//! let secret = b"my-secret-key-at-least-32-bytes!";
//! let issuer = TokenIssuer::new(secret).with_issuer("marketplace");
//! let token = issuer.issue("user-1", Role::Investor).unwrap();
//!
//! let verifier = TokenVerifier::new(secret);
//! let claims = verifier.verify(&token).unwrap();
//! assert_eq!(claims.sub, "user-1");
//! assert_eq!(claims.role, Role::Investor);
//! ```

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, TokenError};
use crate::random::generate_token_id;
use crate::rbac::{Role, Subject};

/// 默认令牌有效期（天）
pub const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 30;

/// 访问令牌 Claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// 用户 ID
    pub sub: String,
    /// 粗粒度角色
    pub role: Role,
    /// 邮箱
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub email: Option<String>,
    /// 签发者
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub iss: Option<String>,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// JWT ID
    pub jti: String,
}

impl AccessClaims {
    /// 检查是否已过期
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

// ============================================================================
// TokenIssuer
// ============================================================================

/// 访问令牌签发器
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    issuer: Option<String>,
    lifetime: Duration,
}

impl TokenIssuer {
    /// 使用密钥创建签发器
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            issuer: None,
            lifetime: Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS),
        }
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// 设置有效期
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// 为用户签发令牌
    pub fn issue(&self, user_id: impl Into<String>, role: Role) -> Result<String> {
        self.sign(user_id.into(), role, None)
    }

    /// 为主体签发令牌（带上邮箱）
    pub fn issue_for(&self, subject: &Subject) -> Result<String> {
        self.sign(
            subject.id().to_string(),
            subject.role(),
            Some(subject.email().to_string()),
        )
    }

    fn sign(&self, sub: String, role: Role, email: Option<String>) -> Result<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub,
            role,
            email,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            jti: generate_token_id()?,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Token(TokenError::EncodingFailed(e.to_string())))
    }
}

// ============================================================================
// TokenVerifier
// ============================================================================

/// 验证器配置
#[derive(Debug, Clone)]
pub struct TokenVerifierConfig {
    /// 验证过期时间
    pub validate_exp: bool,
    /// 期望的签发者
    pub issuer: Option<String>,
    /// 允许的时钟偏差（秒）
    pub leeway: u64,
}

impl Default for TokenVerifierConfig {
    fn default() -> Self {
        Self {
            validate_exp: true,
            issuer: None,
            leeway: 0,
        }
    }
}

impl TokenVerifierConfig {
    /// 创建新的验证器配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置期望的签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// 设置时钟偏差容忍度
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    /// 禁用过期时间验证
    pub fn without_exp_validation(mut self) -> Self {
        self.validate_exp = false;
        self
    }
}

/// 访问令牌验证器
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    config: TokenVerifierConfig,
}

impl TokenVerifier {
    /// 使用密钥创建验证器
    pub fn new(secret: &[u8]) -> Self {
        Self::with_config(secret, TokenVerifierConfig::default())
    }

    /// 使用密钥和配置创建验证器
    pub fn with_config(secret: &[u8], config: TokenVerifierConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            config,
        }
    }

    /// 验证并解码令牌
    pub fn verify(&self, token: &str) -> Result<AccessClaims> {
        let validation = self.build_validation();

        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            let error = match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    TokenError::InvalidFormat("invalid token structure".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    TokenError::InvalidClaim("invalid issuer".to_string())
                }
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                    TokenError::InvalidClaim("token not yet valid".to_string())
                }
                _ => TokenError::DecodingFailed(e.to_string()),
            };
            Error::Token(error)
        })?;

        Ok(data.claims)
    }

    fn build_validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = self.config.validate_exp;
        validation.leeway = self.config.leeway;
        if !self.config.validate_exp {
            validation.required_spec_claims.remove("exp");
        }

        if let Some(ref iss) = self.config.issuer {
            validation.set_issuer(&[iss]);
        }

        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test-secret-key-at-least-32-bytes!";

    #[test]
    fn test_issue_and_verify() {
        let token = TokenIssuer::new(TEST_SECRET)
            .issue("user123", Role::ProjectOwner)
            .unwrap();

        let claims = TokenVerifier::new(TEST_SECRET).verify(&token).unwrap();
        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.role, Role::ProjectOwner);
        assert!(claims.email.is_none());
        assert!(!claims.is_expired());
        assert_eq!(claims.jti.len(), 32);
    }

    #[test]
    fn test_default_lifetime_is_thirty_days() {
        let token = TokenIssuer::new(TEST_SECRET)
            .issue("user123", Role::Investor)
            .unwrap();
        let claims = TokenVerifier::new(TEST_SECRET).verify(&token).unwrap();

        assert_eq!(
            claims.exp - claims.iat,
            Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS).num_seconds()
        );
    }

    #[test]
    fn test_expired_token() {
        let token = TokenIssuer::new(TEST_SECRET)
            .with_lifetime(Duration::seconds(-120))
            .issue("user123", Role::Investor)
            .unwrap();

        let result = TokenVerifier::new(TEST_SECRET).verify(&token);
        assert!(matches!(result, Err(Error::Token(TokenError::Expired))));
    }

    #[test]
    fn test_invalid_signature() {
        let token = TokenIssuer::new(TEST_SECRET)
            .issue("user123", Role::Investor)
            .unwrap();

        let result = TokenVerifier::new(b"wrong-secret-key-at-least-32-bytes!").verify(&token);
        assert!(matches!(
            result,
            Err(Error::Token(TokenError::InvalidSignature))
        ));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = TokenIssuer::new(TEST_SECRET)
            .with_issuer("other-app")
            .issue("user123", Role::Investor)
            .unwrap();

        let verifier = TokenVerifier::with_config(
            TEST_SECRET,
            TokenVerifierConfig::new().with_issuer("marketplace"),
        );
        assert!(matches!(
            verifier.verify(&token),
            Err(Error::Token(TokenError::InvalidClaim(_)))
        ));
    }

    #[test]
    fn test_garbage_token() {
        let result = TokenVerifier::new(TEST_SECRET).verify("not-a-jwt");
        assert!(matches!(result, Err(Error::Token(_))));
    }

    #[test]
    fn test_issue_for_builtin_subject() {
        let token = TokenIssuer::new(TEST_SECRET)
            .issue_for(&Subject::BuiltinSuperAdmin)
            .unwrap();
        let claims = TokenVerifier::new(TEST_SECRET).verify(&token).unwrap();

        assert_eq!(claims.sub, crate::rbac::BUILTIN_ADMIN_ID);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.email.as_deref(), Some(crate::rbac::BUILTIN_ADMIN_EMAIL));
    }
}
