//! 集成测试：授权守卫
//!
//! 从 `Authorization` 头到访问决策的完整流程。

use std::sync::Arc;

use chrono::Duration;
use marketplace_authz::audit::{EventType, InMemoryAuditLogger};
use marketplace_authz::config::{AuthzConfig, UndeclaredPolicy};
use marketplace_authz::guard::{AccessGuard, DecisionReason, GuardState};
use marketplace_authz::rbac::{
    AdminRole, BUILTIN_ADMIN_ID, Permission, PermissionResolver, RequirementTable, Role, User,
};
use marketplace_authz::store::{AuthorizationUpdate, InMemoryUserStore, UserStore};
use marketplace_authz::token::TokenIssuer;

const SECRET: &str = "integration-test-secret-with-32-bytes!";

struct Fixture {
    guard: AccessGuard,
    store: Arc<InMemoryUserStore>,
    audit: InMemoryAuditLogger,
    issuer: TokenIssuer,
}

fn fixture(config: AuthzConfig) -> Fixture {
    let store = Arc::new(InMemoryUserStore::with_users([
        User::new("inv-1", "investor@example.com", "Investor", Role::Investor),
        User::admin("mod-1", "mod@example.com", "Moderator", AdminRole::ContentModerator),
        User::admin("ro-1", "ro@example.com", "Reader", AdminRole::ReadOnlyAdmin),
        User::admin("um-1", "um@example.com", "Users", AdminRole::UserManager),
    ]));
    let audit = InMemoryAuditLogger::new();
    let guard = AccessGuard::from_config(
        &config,
        PermissionResolver::standard(),
        RequirementTable::marketplace(),
        store.clone(),
    )
    .with_audit_logger(Arc::new(audit.clone()));

    Fixture {
        guard,
        store,
        audit,
        issuer: TokenIssuer::new(config.jwt_secret.as_bytes()),
    }
}

fn default_fixture() -> Fixture {
    fixture(AuthzConfig::new(SECRET))
}

fn bearer(issuer: &TokenIssuer, user_id: &str, role: Role) -> String {
    format!("Bearer {}", issuer.issue(user_id, role).unwrap())
}

/// 测试缺少令牌时返回 401
#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let f = default_fixture();

    let err = f
        .guard
        .authorize(None, "admin.users.list")
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());
    assert_eq!(err.status_code(), 401);

    let err = f
        .guard
        .authorize(Some("Basic dXNlcjpwYXNz"), "admin.users.list")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);

    assert_eq!(
        f.audit
            .get_events_by_type(&EventType::AuthenticationFailed)
            .len(),
        2
    );
}

/// 测试无效签名与过期令牌
#[tokio::test]
async fn test_invalid_tokens_are_unauthenticated() {
    let f = default_fixture();

    let forged = TokenIssuer::new(b"another-secret-that-is-long-enough!!");
    let header = bearer(&forged, "mod-1", Role::Admin);
    let err = f
        .guard
        .authorize(Some(&header), "admin.businesses.verify")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);

    let expired = TokenIssuer::new(SECRET.as_bytes()).with_lifetime(Duration::hours(-2));
    let header = bearer(&expired, "mod-1", Role::Admin);
    let err = f
        .guard
        .authorize(Some(&header), "admin.businesses.verify")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);

    let err = f
        .guard
        .authorize(Some("Bearer not-a-jwt"), "admin.businesses.verify")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
}

/// 测试令牌对应的用户不存在时返回 401
#[tokio::test]
async fn test_unknown_user_is_unauthenticated() {
    let f = default_fixture();
    let header = bearer(&f.issuer, "nobody", Role::Admin);

    let err = f
        .guard
        .authorize(Some(&header), "admin.users.list")
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());
}

/// 测试已认证但权限不足时返回 403
#[tokio::test]
async fn test_authenticated_without_permission_is_forbidden() {
    let f = default_fixture();

    let header = bearer(&f.issuer, "inv-1", Role::Investor);
    let err = f
        .guard
        .authorize(Some(&header), "admin.businesses.list")
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    assert_eq!(err.status_code(), 403);

    let header = bearer(&f.issuer, "ro-1", Role::Admin);
    let err = f
        .guard
        .authorize(Some(&header), "admin.businesses.verify")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    let denied = f.audit.get_events_by_type(&EventType::AccessDenied);
    assert_eq!(denied.len(), 2);
    assert_eq!(denied[1].user_id.as_deref(), Some("ro-1"));
    assert_eq!(
        denied[1].operation.as_deref(),
        Some("admin.businesses.verify")
    );
}

/// 测试拒绝时返回以 Denied 结束的状态轨迹
#[tokio::test]
async fn test_denied_request_trace() {
    let f = default_fixture();

    let denied = f
        .guard
        .authorize_traced(None, "admin.users.list")
        .await
        .unwrap_err();
    assert_eq!(denied.error.status_code(), 401);
    assert_eq!(
        denied.trace.history(),
        &[GuardState::Unauthenticated, GuardState::Denied]
    );

    let header = bearer(&f.issuer, "ro-1", Role::Admin);
    let denied = f
        .guard
        .authorize_traced(Some(&header), "admin.businesses.verify")
        .await
        .unwrap_err();
    assert_eq!(denied.error.status_code(), 403);
    assert_eq!(denied.trace.state(), GuardState::Denied);
    assert_eq!(
        denied.trace.history(),
        &[
            GuardState::Unauthenticated,
            GuardState::Identified,
            GuardState::Denied
        ]
    );
}

/// 测试允许访问时的决策与状态轨迹
#[tokio::test]
async fn test_authorized_request() {
    let f = default_fixture();
    let header = bearer(&f.issuer, "mod-1", Role::Admin);

    let request = f
        .guard
        .authorize(Some(&header), "admin.businesses.verify")
        .await
        .unwrap();

    assert_eq!(request.subject.id(), "mod-1");
    assert_eq!(request.decision.reason, DecisionReason::RequirementSatisfied);
    assert_eq!(request.trace.state(), GuardState::Authorized);
    assert_eq!(
        request.trace.history(),
        &[
            GuardState::Unauthenticated,
            GuardState::Identified,
            GuardState::Authorized
        ]
    );
    assert_eq!(
        f.audit.get_events_by_type(&EventType::AccessGranted).len(),
        1
    );
}

/// 测试全部组合：只持有其中一个权限时被拒绝
#[tokio::test]
async fn test_all_combinator_requires_every_permission() {
    let f = default_fixture();
    let header = bearer(&f.issuer, "ro-1", Role::Admin);

    // 只读管理员默认有查看权限，补上审核权限
    f.store
        .apply_authorization(
            "ro-1",
            AuthorizationUpdate::set_permissions([Permission::ReviewInvestmentRequests]),
        )
        .await
        .unwrap();

    let err = f
        .guard
        .authorize(Some(&header), "admin.investment_requests.process")
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    f.store
        .apply_authorization(
            "ro-1",
            AuthorizationUpdate::set_permissions([
                Permission::ReviewInvestmentRequests,
                Permission::ManageInvestmentRequests,
            ]),
        )
        .await
        .unwrap();

    assert!(
        f.guard
            .authorize(Some(&header), "admin.investment_requests.process")
            .await
            .is_ok()
    );
}

/// 测试权限变更无需重新签发令牌即可生效
#[tokio::test]
async fn test_permission_changes_apply_to_existing_tokens() {
    let f = default_fixture();
    let header = bearer(&f.issuer, "um-1", Role::Admin);

    assert!(
        f.guard
            .authorize(Some(&header), "admin.users.update")
            .await
            .is_ok()
    );

    f.store
        .apply_authorization("um-1", AuthorizationUpdate::revoke())
        .await
        .unwrap();

    let err = f
        .guard
        .authorize(Some(&header), "admin.users.update")
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

/// 测试内置超级管理员
#[tokio::test]
async fn test_builtin_super_admin() {
    let f = default_fixture();
    let header = bearer(&f.issuer, BUILTIN_ADMIN_ID, Role::Admin);

    let request = f
        .guard
        .authorize(Some(&header), "admin.roles.revoke_admin")
        .await
        .unwrap();
    assert!(request.subject.is_builtin());
    assert_eq!(request.subject.admin_role(), Some(AdminRole::SuperAdmin));

    // 角色不是 ADMIN 时不识别为内置身份
    let header = bearer(&f.issuer, BUILTIN_ADMIN_ID, Role::Investor);
    let err = f
        .guard
        .authorize(Some(&header), "admin.roles.revoke_admin")
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());
}

/// 测试关闭内置超级管理员
#[tokio::test]
async fn test_builtin_super_admin_disabled() {
    let f = fixture(AuthzConfig::new(SECRET).with_builtin_admin(false));
    let header = bearer(&f.issuer, BUILTIN_ADMIN_ID, Role::Admin);

    let err = f
        .guard
        .authorize(Some(&header), "admin.dashboard")
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());
}

/// 测试未声明操作的两种策略
#[tokio::test]
async fn test_undeclared_operation_policy() {
    let f = default_fixture();
    let header = bearer(&f.issuer, "inv-1", Role::Investor);

    let request = f
        .guard
        .authorize(Some(&header), "marketplace.listings.browse")
        .await
        .unwrap();
    assert_eq!(request.decision.reason, DecisionReason::NoRequirementDeclared);

    let f = fixture(AuthzConfig::new(SECRET).with_undeclared_policy(UndeclaredPolicy::Deny));
    let header = bearer(&f.issuer, "inv-1", Role::Investor);
    let err = f
        .guard
        .authorize(Some(&header), "marketplace.listings.browse")
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

/// 测试签发者校验
#[tokio::test]
async fn test_issuer_mismatch() {
    let f = fixture(AuthzConfig::new(SECRET).with_issuer("marketplace"));

    let header = bearer(&f.issuer, "mod-1", Role::Admin);
    let err = f
        .guard
        .authorize(Some(&header), "admin.businesses.verify")
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());

    let issuer = TokenIssuer::new(SECRET.as_bytes()).with_issuer("marketplace");
    let header = bearer(&issuer, "mod-1", Role::Admin);
    assert!(
        f.guard
            .authorize(Some(&header), "admin.businesses.verify")
            .await
            .is_ok()
    );
}
