//! 身份守卫
//!
//! 从 `Authorization` 头中取出 Bearer 令牌，验证后解析出 [`Subject`]。
//! 任何一步失败都返回 `Unauthenticated`。

use std::sync::Arc;

use crate::audit::{AuditLogger, NoOpAuditLogger, SecurityEvent};
use crate::config::AuthzConfig;
use crate::error::{Error, Result};
use crate::rbac::{BUILTIN_ADMIN_ID, Role, Subject};
use crate::store::UserStore;
use crate::token::{AccessClaims, TokenVerifier};

/// 从 `Authorization` 头中提取 Bearer 令牌
///
/// 只接受 `Bearer <token>` 形式（scheme 不区分大小写）。
///
/// ```rust
/// use marketplace_authz::guard::extract_bearer;
///
/// assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_bearer("Basic dXNlcjpwYXNz"), None);
/// assert_eq!(extract_bearer("Bearer "), None);
/// ```
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// 身份守卫
pub struct IdentityGuard {
    verifier: TokenVerifier,
    store: Arc<dyn UserStore>,
    builtin_admin_enabled: bool,
    audit: Arc<dyn AuditLogger>,
}

impl IdentityGuard {
    /// 创建身份守卫（默认启用内置超级管理员）
    pub fn new(verifier: TokenVerifier, store: Arc<dyn UserStore>) -> Self {
        Self {
            verifier,
            store,
            builtin_admin_enabled: true,
            audit: Arc::new(NoOpAuditLogger),
        }
    }

    /// 根据配置创建
    pub fn from_config(config: &AuthzConfig, store: Arc<dyn UserStore>) -> Self {
        Self::new(config.token_verifier(), store).with_builtin_admin(config.builtin_admin_enabled)
    }

    /// 启用或禁用内置超级管理员
    pub fn with_builtin_admin(mut self, enabled: bool) -> Self {
        self.builtin_admin_enabled = enabled;
        self
    }

    /// 设置审计日志记录器
    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// 根据 `Authorization` 头解析主体
    pub async fn identify(&self, authorization: Option<&str>) -> Result<Subject> {
        let Some(token) = authorization.and_then(extract_bearer) else {
            return Err(self.reject("access token not found"));
        };
        self.identify_token(token).await
    }

    /// 根据令牌解析主体
    pub async fn identify_token(&self, token: &str) -> Result<Subject> {
        let claims = match self.verifier.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(target: "marketplace_authz::guard", "token rejected: {}", e);
                return Err(self.reject("invalid or expired token"));
            }
        };

        self.resolve_subject(&claims).await
    }

    async fn resolve_subject(&self, claims: &AccessClaims) -> Result<Subject> {
        if self.is_builtin(claims) {
            tracing::debug!(target: "marketplace_authz::guard", "built-in super admin identified");
            return Ok(Subject::BuiltinSuperAdmin);
        }

        match self.store.find_by_id(&claims.sub).await? {
            Some(user) => {
                tracing::debug!(
                    target: "marketplace_authz::guard",
                    "subject identified: id={} role={}", user.id, user.role
                );
                Ok(Subject::Stored(user))
            }
            None => Err(self.reject(format!("user {} not found", claims.sub))),
        }
    }

    fn is_builtin(&self, claims: &AccessClaims) -> bool {
        self.builtin_admin_enabled && claims.sub == BUILTIN_ADMIN_ID && claims.role == Role::Admin
    }

    fn reject(&self, reason: impl Into<String>) -> Error {
        let reason = reason.into();
        tracing::info!(target: "marketplace_authz::guard", "unauthenticated: {}", reason);
        self.audit
            .log(SecurityEvent::authentication_failed(reason.clone()));
        Error::unauthenticated(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLogger;
    use crate::rbac::User;
    use crate::store::InMemoryUserStore;
    use crate::token::TokenIssuer;

    const SECRET: &[u8] = b"identity-guard-secret-32-bytes-long";

    fn guard(store: InMemoryUserStore) -> IdentityGuard {
        IdentityGuard::new(TokenVerifier::new(SECRET), Arc::new(store))
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    #[test]
    fn test_extract_bearer_variants() {
        assert_eq!(extract_bearer("bearer tok"), Some("tok"));
        assert_eq!(extract_bearer("  Bearer   tok  "), Some("tok"));
        assert_eq!(extract_bearer("tok"), None);
        assert_eq!(extract_bearer(""), None);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let logger = InMemoryAuditLogger::new();
        let guard = guard(InMemoryUserStore::new()).with_audit_logger(Arc::new(logger.clone()));

        let err = guard.identify(None).await.unwrap_err();
        assert!(err.is_unauthenticated());
        assert_eq!(logger.event_count(), 1);
    }

    #[tokio::test]
    async fn test_stored_user_identified() {
        let store = InMemoryUserStore::with_users([User::new(
            "u1",
            "u1@example.com",
            "U1",
            Role::Investor,
        )]);
        let token = TokenIssuer::new(SECRET).issue("u1", Role::Investor).unwrap();

        let subject = guard(store).identify(Some(&bearer(&token))).await.unwrap();
        assert_eq!(subject.id(), "u1");
        assert!(!subject.is_builtin());
    }

    #[tokio::test]
    async fn test_unknown_user_is_unauthenticated() {
        let token = TokenIssuer::new(SECRET).issue("ghost", Role::Investor).unwrap();
        let err = guard(InMemoryUserStore::new())
            .identify(Some(&bearer(&token)))
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_builtin_admin_needs_admin_role_claim() {
        let issuer = TokenIssuer::new(SECRET);

        let token = issuer.issue(BUILTIN_ADMIN_ID, Role::Admin).unwrap();
        let subject = guard(InMemoryUserStore::new())
            .identify(Some(&bearer(&token)))
            .await
            .unwrap();
        assert!(subject.is_builtin());

        // 同一 ID 但角色不是 ADMIN 时走普通查找
        let token = issuer.issue(BUILTIN_ADMIN_ID, Role::Investor).unwrap();
        let err = guard(InMemoryUserStore::new())
            .identify(Some(&bearer(&token)))
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_builtin_admin_can_be_disabled() {
        let token = TokenIssuer::new(SECRET).issue(BUILTIN_ADMIN_ID, Role::Admin).unwrap();
        let err = guard(InMemoryUserStore::new())
            .with_builtin_admin(false)
            .identify(Some(&bearer(&token)))
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthenticated() {
        let token = TokenIssuer::new(b"some-other-secret-that-is-32-bytes!!")
            .issue("u1", Role::Investor)
            .unwrap();
        let err = guard(InMemoryUserStore::new())
            .identify(Some(&bearer(&token)))
            .await
            .unwrap_err();
        assert!(err.is_unauthenticated());
        assert_eq!(err.status_code(), 401);
    }
}
