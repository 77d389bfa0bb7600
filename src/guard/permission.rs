//! 权限守卫
//!
//! 查询操作的权限要求，重新读取主体当前的授权三元组，交给解析器判断。

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::audit::{AuditLogger, NoOpAuditLogger, SecurityEvent};
use crate::config::UndeclaredPolicy;
use crate::error::{Error, Result};
use crate::rbac::{AccessProfile, PermissionResolver, Requirement, RequirementTable, Subject};
use crate::store::UserStore;

/// 决策原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// 满足权限要求
    RequirementSatisfied,
    /// 操作未声明权限要求，按策略放行
    NoRequirementDeclared,
    /// 操作未声明权限要求，按策略拒绝
    UndeclaredOperationDenied,
    /// 权限不足
    InsufficientPermissions,
    /// 主体记录已不存在
    SubjectNotFound,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::RequirementSatisfied => write!(f, "requirement satisfied"),
            DecisionReason::NoRequirementDeclared => write!(f, "no requirement declared"),
            DecisionReason::UndeclaredOperationDenied => {
                write!(f, "no requirement declared for operation")
            }
            DecisionReason::InsufficientPermissions => write!(f, "insufficient permissions"),
            DecisionReason::SubjectNotFound => write!(f, "user not found"),
        }
    }
}

/// 访问决策
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    /// 是否允许
    pub allowed: bool,
    /// 原因
    pub reason: DecisionReason,
    /// 操作标识
    pub operation: String,
    /// 生效的权限要求
    pub requirement: Option<Requirement>,
}

impl AccessDecision {
    fn new(
        allowed: bool,
        reason: DecisionReason,
        operation: &str,
        requirement: Option<&Requirement>,
    ) -> Self {
        Self {
            allowed,
            reason,
            operation: operation.to_string(),
            requirement: requirement.cloned(),
        }
    }

    /// 是否允许
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// 是否拒绝
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    /// 拒绝时转换为 `Forbidden` 错误
    pub fn into_result(self) -> Result<Self> {
        if self.allowed {
            return Ok(self);
        }
        let message = match self.requirement {
            Some(ref requirement) => format!(
                "{} for '{}': requires {}",
                self.reason, self.operation, requirement
            ),
            None => format!("{} '{}'", self.reason, self.operation),
        };
        Err(Error::forbidden(message))
    }
}

/// 权限守卫
pub struct PermissionGuard {
    resolver: PermissionResolver,
    requirements: Arc<RequirementTable>,
    store: Arc<dyn UserStore>,
    undeclared: UndeclaredPolicy,
    audit: Arc<dyn AuditLogger>,
}

impl PermissionGuard {
    /// 创建权限守卫
    pub fn new(
        resolver: PermissionResolver,
        requirements: impl Into<Arc<RequirementTable>>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            resolver,
            requirements: requirements.into(),
            store,
            undeclared: UndeclaredPolicy::default(),
            audit: Arc::new(NoOpAuditLogger),
        }
    }

    /// 设置未声明操作的处理方式
    pub fn with_undeclared_policy(mut self, policy: UndeclaredPolicy) -> Self {
        self.undeclared = policy;
        self
    }

    /// 设置审计日志记录器
    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// 绑定表
    pub fn requirements(&self) -> &RequirementTable {
        &self.requirements
    }

    /// 解析器
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    /// 检查访问权限，拒绝时返回 `Forbidden`
    pub async fn check(&self, subject: &Subject, operation: &str) -> Result<AccessDecision> {
        self.evaluate(subject, operation).await?.into_result()
    }

    /// 评估访问决策
    ///
    /// 拒绝不是错误，只有存储不可用时才返回 `Err`。
    pub async fn evaluate(&self, subject: &Subject, operation: &str) -> Result<AccessDecision> {
        let requirement = self.requirements.resolve(operation);

        let decision = match requirement {
            None => match self.undeclared {
                UndeclaredPolicy::Allow => AccessDecision::new(
                    true,
                    DecisionReason::NoRequirementDeclared,
                    operation,
                    None,
                ),
                UndeclaredPolicy::Deny => AccessDecision::new(
                    false,
                    DecisionReason::UndeclaredOperationDenied,
                    operation,
                    None,
                ),
            },
            Some(requirement) => match self.current_profile(subject).await? {
                None => AccessDecision::new(
                    false,
                    DecisionReason::SubjectNotFound,
                    operation,
                    Some(requirement),
                ),
                Some(profile) => {
                    let allowed = self.resolver.satisfies(&profile, requirement);
                    let reason = if allowed {
                        DecisionReason::RequirementSatisfied
                    } else {
                        DecisionReason::InsufficientPermissions
                    };
                    AccessDecision::new(allowed, reason, operation, Some(requirement))
                }
            },
        };

        self.record(subject, &decision);
        Ok(decision)
    }

    /// 读取主体当前的授权三元组
    ///
    /// 存储用户每次都重新读取，令牌签发后的权限变更可以立即生效。
    async fn current_profile(&self, subject: &Subject) -> Result<Option<AccessProfile>> {
        match subject {
            Subject::BuiltinSuperAdmin => Ok(Some(subject.access_profile())),
            Subject::Stored(user) => Ok(self
                .store
                .find_by_id(&user.id)
                .await?
                .map(|current| current.access_profile())),
        }
    }

    fn record(&self, subject: &Subject, decision: &AccessDecision) {
        if decision.allowed {
            tracing::debug!(
                target: "marketplace_authz::guard",
                "access granted: subject={} operation={} reason={}",
                subject.id(), decision.operation, decision.reason
            );
            self.audit
                .log(SecurityEvent::access_granted(subject.id(), &decision.operation));
        } else {
            tracing::info!(
                target: "marketplace_authz::guard",
                "access denied: subject={} operation={} reason={}",
                subject.id(), decision.operation, decision.reason
            );
            self.audit.log(SecurityEvent::access_denied(
                subject.id(),
                &decision.operation,
                decision.reason.to_string(),
            ));
        }
    }
}
