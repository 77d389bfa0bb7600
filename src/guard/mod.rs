//! # 授权守卫模块
//!
//! 在请求处理函数之前运行的两道守卫：
//!
//! - **IdentityGuard**: 验证 Bearer 令牌并解析出主体，失败返回 `Unauthenticated`（401）
//! - **PermissionGuard**: 按绑定表检查主体的有效权限，失败返回 `Forbidden`（403）
//!
//! [`AccessGuard`] 把两者串起来，每个请求的状态按
//! `Unauthenticated -> Identified -> Authorized | Denied` 推进。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use marketplace_authz::config::AuthzConfig;
//! use marketplace_authz::guard::AccessGuard;
//! use marketplace_authz::rbac::{AdminRole, PermissionResolver, RequirementTable, Role, User};
//! use marketplace_authz::store::InMemoryUserStore;
//! use marketplace_authz::token::TokenIssuer;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = AuthzConfig::new("example-secret-key-that-is-32-bytes!");
//! let store = Arc::new(InMemoryUserStore::with_users([
//!     User::admin("mod-1", "mod@example.com", "Mod", AdminRole::ContentModerator),
//! ]));
//! let guard = AccessGuard::from_config(
//!     &config,
//!     PermissionResolver::standard(),
//!     RequirementTable::marketplace(),
//!     store,
//! );
//!
//! let token = TokenIssuer::new(config.jwt_secret.as_bytes())
//!     .issue("mod-1", Role::Admin)
//!     .unwrap();
//! let header = format!("Bearer {}", token);
//!
//! let request = guard.authorize(Some(&header), "admin.businesses.verify").await.unwrap();
//! assert_eq!(request.subject.id(), "mod-1");
//!
//! let denied = guard.authorize(Some(&header), "admin.roles.revoke_admin").await;
//! assert!(denied.unwrap_err().is_forbidden());
//!
//! let anonymous = guard.authorize(None, "admin.businesses.verify").await;
//! assert!(anonymous.unwrap_err().is_unauthenticated());
//! # }
//! ```

mod identity;
mod permission;

pub use identity::{IdentityGuard, extract_bearer};
pub use permission::{AccessDecision, DecisionReason, PermissionGuard};

pub use crate::config::UndeclaredPolicy;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::audit::AuditLogger;
use crate::config::AuthzConfig;
use crate::error::{Error, Result};
use crate::rbac::{PermissionResolver, RequirementTable, Subject};
use crate::store::UserStore;

/// 守卫状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardState {
    /// 尚未建立身份
    Unauthenticated,
    /// 身份已确认
    Identified,
    /// 允许访问（终态）
    Authorized,
    /// 拒绝访问（终态）
    Denied,
}

impl GuardState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, GuardState::Authorized | GuardState::Denied)
    }

    /// 检查状态转换是否合法
    pub fn can_transition_to(&self, next: GuardState) -> bool {
        matches!(
            (self, next),
            (GuardState::Unauthenticated, GuardState::Identified)
                | (GuardState::Unauthenticated, GuardState::Denied)
                | (GuardState::Identified, GuardState::Authorized)
                | (GuardState::Identified, GuardState::Denied)
        )
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardState::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            GuardState::Identified => write!(f, "IDENTIFIED"),
            GuardState::Authorized => write!(f, "AUTHORIZED"),
            GuardState::Denied => write!(f, "DENIED"),
        }
    }
}

/// 单个请求的状态跟踪
#[derive(Debug, Clone)]
pub struct GuardTrace {
    operation: String,
    history: Vec<GuardState>,
}

impl GuardTrace {
    fn start(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            history: vec![GuardState::Unauthenticated],
        }
    }

    fn advance(&mut self, next: GuardState) {
        let current = self.state();
        if !current.can_transition_to(next) {
            tracing::warn!(
                target: "marketplace_authz::guard",
                "illegal guard transition {} -> {} for {}", current, next, self.operation
            );
            return;
        }
        tracing::trace!(
            target: "marketplace_authz::guard",
            "{}: {} -> {}", self.operation, current, next
        );
        self.history.push(next);
    }

    /// 当前状态
    pub fn state(&self) -> GuardState {
        self.history
            .last()
            .copied()
            .unwrap_or(GuardState::Unauthenticated)
    }

    /// 经过的所有状态
    pub fn history(&self) -> &[GuardState] {
        &self.history
    }
}

/// 通过守卫的请求
#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    /// 已认证主体
    pub subject: Subject,
    /// 访问决策
    pub decision: AccessDecision,
    /// 状态轨迹
    pub trace: GuardTrace,
}

/// 组合守卫
pub struct AccessGuard {
    identity: IdentityGuard,
    permission: PermissionGuard,
}

impl AccessGuard {
    /// 组合两道守卫
    pub fn new(identity: IdentityGuard, permission: PermissionGuard) -> Self {
        Self {
            identity,
            permission,
        }
    }

    /// 根据配置创建
    pub fn from_config(
        config: &AuthzConfig,
        resolver: PermissionResolver,
        requirements: impl Into<Arc<RequirementTable>>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        let identity = IdentityGuard::from_config(config, store.clone());
        let permission = PermissionGuard::new(resolver, requirements, store)
            .with_undeclared_policy(config.undeclared_policy);
        Self::new(identity, permission)
    }

    /// 为两道守卫设置同一个审计日志记录器
    pub fn with_audit_logger(self, audit: Arc<dyn AuditLogger>) -> Self {
        Self {
            identity: self.identity.with_audit_logger(audit.clone()),
            permission: self.permission.with_audit_logger(audit),
        }
    }

    /// 身份守卫
    pub fn identity(&self) -> &IdentityGuard {
        &self.identity
    }

    /// 权限守卫
    pub fn permission(&self) -> &PermissionGuard {
        &self.permission
    }

    /// 依次执行身份守卫和权限守卫
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        operation: &str,
    ) -> Result<AuthorizedRequest> {
        self.authorize_traced(authorization, operation)
            .await
            .map_err(|denied| denied.error)
    }

    /// 与 [`authorize`](Self::authorize) 相同，拒绝时连同状态轨迹一起返回
    pub async fn authorize_traced(
        &self,
        authorization: Option<&str>,
        operation: &str,
    ) -> std::result::Result<AuthorizedRequest, DeniedRequest> {
        let mut trace = GuardTrace::start(operation);

        let subject = match self.identity.identify(authorization).await {
            Ok(subject) => subject,
            Err(e) => return Err(DeniedRequest::new(trace, e)),
        };
        trace.advance(GuardState::Identified);

        match self.permission.check(&subject, operation).await {
            Ok(decision) => {
                trace.advance(GuardState::Authorized);
                Ok(AuthorizedRequest {
                    subject,
                    decision,
                    trace,
                })
            }
            Err(e) => Err(DeniedRequest::new(trace, e)),
        }
    }
}

/// 被守卫拒绝的请求
#[derive(Debug)]
pub struct DeniedRequest {
    /// 拒绝原因，401 或 403
    pub error: Error,
    /// 以 `Denied` 结束的状态轨迹
    pub trace: GuardTrace,
}

impl DeniedRequest {
    fn new(mut trace: GuardTrace, error: Error) -> Self {
        trace.advance(GuardState::Denied);
        tracing::debug!(
            target: "marketplace_authz::guard",
            "{} denied after {:?}: {}", trace.operation, trace.history(), error
        );
        Self { error, trace }
    }
}

impl fmt::Display for DeniedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.trace.state())
    }
}

impl From<DeniedRequest> for Error {
    fn from(denied: DeniedRequest) -> Self {
        denied.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_state_transitions() {
        use GuardState::*;

        assert!(Unauthenticated.can_transition_to(Identified));
        assert!(Unauthenticated.can_transition_to(Denied));
        assert!(!Unauthenticated.can_transition_to(Authorized));
        assert!(Identified.can_transition_to(Authorized));
        assert!(!Authorized.can_transition_to(Denied));
        assert!(!Denied.can_transition_to(Identified));

        assert!(Authorized.is_terminal());
        assert!(Denied.is_terminal());
        assert!(!Identified.is_terminal());
    }

    #[test]
    fn test_trace_ignores_illegal_transition() {
        let mut trace = GuardTrace::start("admin.users");
        trace.advance(GuardState::Authorized);
        assert_eq!(trace.state(), GuardState::Unauthenticated);

        trace.advance(GuardState::Identified);
        trace.advance(GuardState::Authorized);
        assert_eq!(
            trace.history(),
            &[
                GuardState::Unauthenticated,
                GuardState::Identified,
                GuardState::Authorized
            ]
        );
    }

    #[test]
    fn test_denied_request_ends_in_denied() {
        let mut trace = GuardTrace::start("admin.users");
        trace.advance(GuardState::Identified);

        let denied = DeniedRequest::new(trace, Error::forbidden("nope"));
        assert_eq!(denied.trace.state(), GuardState::Denied);
        assert_eq!(
            denied.trace.history(),
            &[
                GuardState::Unauthenticated,
                GuardState::Identified,
                GuardState::Denied
            ]
        );

        let err: Error = denied.into();
        assert!(err.is_forbidden());
    }
}
