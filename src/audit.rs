//! 审计日志模块
//!
//! 记录授权相关的安全事件：
//!
//! - **访问决策**: 守卫允许或拒绝的每一次请求
//! - **身份失败**: 缺失或无效的凭据
//! - **授权变更**: 角色更换、显式权限更新、提升与撤销管理员
//!
//! ## 使用示例
//!
//! ```rust
//! use marketplace_authz::audit::{AuditLogger, EventType, InMemoryAuditLogger, SecurityEvent};
//! use marketplace_authz::rbac::AdminRole;
//!
//! let logger = InMemoryAuditLogger::new();
//!
//! logger.log(SecurityEvent::access_granted("user1", "admin.businesses.list"));
//! logger.log(SecurityEvent::access_denied("user2", "admin.roles.revoke_admin", "insufficient permissions"));
//! logger.log(SecurityEvent::role_changed("admin-1", "user1", AdminRole::ReadOnlyAdmin));
//!
//! assert_eq!(logger.event_count(), 3);
//! assert_eq!(logger.get_events_by_type(&EventType::AccessDenied).len(), 1);
//! assert_eq!(logger.get_events_by_user("user1").len(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::rbac::{AdminRole, PermissionSet};

/// 事件严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    /// 调试信息
    Debug,
    /// 一般信息
    #[default]
    Info,
    /// 警告
    Warning,
    /// 错误
    Error,
    /// 严重
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Debug => write!(f, "DEBUG"),
            EventSeverity::Info => write!(f, "INFO"),
            EventSeverity::Warning => write!(f, "WARNING"),
            EventSeverity::Error => write!(f, "ERROR"),
            EventSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// 事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// 访问被允许
    AccessGranted,
    /// 访问被拒绝（权限不足）
    AccessDenied,
    /// 身份验证失败
    AuthenticationFailed,
    /// 管理员角色变更
    RoleChanged,
    /// 显式权限变更
    PermissionChanged,
    /// 提升为管理员
    AdminPromoted,
    /// 撤销管理员
    AdminRevoked,
    /// 自定义事件
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::AccessGranted => write!(f, "access_granted"),
            EventType::AccessDenied => write!(f, "access_denied"),
            EventType::AuthenticationFailed => write!(f, "authentication_failed"),
            EventType::RoleChanged => write!(f, "role_changed"),
            EventType::PermissionChanged => write!(f, "permission_changed"),
            EventType::AdminPromoted => write!(f, "admin_promoted"),
            EventType::AdminRevoked => write!(f, "admin_revoked"),
            EventType::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// 安全事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 事件主体（被访问者或被修改者）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// 执行操作的管理员
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// 操作标识
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// 事件消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 额外详情
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// 创建新的安全事件
    pub fn new(event_type: EventType, severity: EventSeverity) -> Self {
        Self {
            id: generate_event_id(),
            event_type,
            severity,
            user_id: None,
            actor_id: None,
            operation: None,
            message: None,
            details: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// 创建自定义事件
    pub fn custom(name: impl Into<String>, severity: EventSeverity) -> Self {
        Self::new(EventType::Custom(name.into()), severity)
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 访问被允许
    pub fn access_granted(user_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::new(EventType::AccessGranted, EventSeverity::Debug)
            .with_user_id(user_id)
            .with_operation(operation)
    }

    /// 访问被拒绝
    pub fn access_denied(
        user_id: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(EventType::AccessDenied, EventSeverity::Warning)
            .with_user_id(user_id)
            .with_operation(operation)
            .with_message(reason)
    }

    /// 身份验证失败
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::new(EventType::AuthenticationFailed, EventSeverity::Warning).with_message(reason)
    }

    /// 管理员角色变更
    pub fn role_changed(
        actor_id: impl Into<String>,
        user_id: impl Into<String>,
        new_role: AdminRole,
    ) -> Self {
        Self::new(EventType::RoleChanged, EventSeverity::Warning)
            .with_actor_id(actor_id)
            .with_user_id(user_id)
            .with_detail("admin_role", new_role.as_str())
            .with_message("admin role changed, explicit permissions cleared")
    }

    /// 显式权限变更
    pub fn permission_changed(
        actor_id: impl Into<String>,
        user_id: impl Into<String>,
        permissions: &PermissionSet,
    ) -> Self {
        Self::new(EventType::PermissionChanged, EventSeverity::Warning)
            .with_actor_id(actor_id)
            .with_user_id(user_id)
            .with_detail("permissions", permissions.to_string_list().join(","))
    }

    /// 提升为管理员
    pub fn admin_promoted(
        actor_id: impl Into<String>,
        user_id: impl Into<String>,
        admin_role: AdminRole,
    ) -> Self {
        Self::new(EventType::AdminPromoted, EventSeverity::Warning)
            .with_actor_id(actor_id)
            .with_user_id(user_id)
            .with_detail("admin_role", admin_role.as_str())
    }

    /// 撤销管理员
    pub fn admin_revoked(actor_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(EventType::AdminRevoked, EventSeverity::Warning)
            .with_actor_id(actor_id)
            .with_user_id(user_id)
    }

    // ========================================================================
    // Builder 方法
    // ========================================================================

    /// 设置用户 ID
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// 设置操作者 ID
    pub fn with_actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// 设置操作标识
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// 设置消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 添加详情
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// 设置严重程度
    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }

    // ========================================================================
    // 查询方法
    // ========================================================================

    /// 获取事件类型名称
    pub fn event_name(&self) -> String {
        self.event_type.to_string()
    }

    /// 检查是否是高严重程度事件
    pub fn is_high_severity(&self) -> bool {
        matches!(
            self.severity,
            EventSeverity::Error | EventSeverity::Critical
        )
    }

    /// 检查是否是授权变更事件
    pub fn is_authorization_change(&self) -> bool {
        matches!(
            self.event_type,
            EventType::RoleChanged
                | EventType::PermissionChanged
                | EventType::AdminPromoted
                | EventType::AdminRevoked
        )
    }
}

/// 生成事件 ID
fn generate_event_id() -> String {
    use crate::random::generate_random_hex;
    format!(
        "evt_{}",
        generate_random_hex(16).unwrap_or_else(|_| "unknown".to_string())
    )
}

// ============================================================================
// AuditLogger Trait
// ============================================================================

/// 审计日志记录器 trait
pub trait AuditLogger: Send + Sync {
    /// 记录安全事件
    fn log(&self, event: SecurityEvent);

    /// 批量记录事件
    fn log_batch(&self, events: Vec<SecurityEvent>) {
        for event in events {
            self.log(event);
        }
    }
}

// ============================================================================
// InMemoryAuditLogger
// ============================================================================

/// 内存审计日志记录器
///
/// 用于测试和开发环境，将事件存储在内存中。克隆共享同一份事件列表。
#[derive(Debug, Default)]
pub struct InMemoryAuditLogger {
    events: Arc<RwLock<Vec<SecurityEvent>>>,
    max_events: Option<usize>,
}

impl InMemoryAuditLogger {
    /// 创建新的内存日志记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有最大事件数限制的日志记录器
    pub fn with_max_events(max: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events: Some(max),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<SecurityEvent>> {
        self.events.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<SecurityEvent>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<SecurityEvent> {
        self.read().clone()
    }

    /// 获取事件数量
    pub fn event_count(&self) -> usize {
        self.read().len()
    }

    /// 按用户 ID 获取事件
    pub fn get_events_by_user(&self, user_id: &str) -> Vec<SecurityEvent> {
        self.filter(|e| e.user_id.as_deref() == Some(user_id))
    }

    /// 按操作者获取事件
    pub fn get_events_by_actor(&self, actor_id: &str) -> Vec<SecurityEvent> {
        self.filter(|e| e.actor_id.as_deref() == Some(actor_id))
    }

    /// 按事件类型获取事件
    pub fn get_events_by_type(&self, event_type: &EventType) -> Vec<SecurityEvent> {
        self.filter(|e| &e.event_type == event_type)
    }

    /// 按严重程度获取事件
    pub fn get_events_by_severity(&self, severity: EventSeverity) -> Vec<SecurityEvent> {
        self.filter(|e| e.severity == severity)
    }

    /// 获取最近 N 个事件
    pub fn get_recent_events(&self, count: usize) -> Vec<SecurityEvent> {
        self.read().iter().rev().take(count).cloned().collect()
    }

    /// 清空所有事件
    pub fn clear(&self) {
        self.write().clear();
    }

    fn filter(&self, predicate: impl Fn(&SecurityEvent) -> bool) -> Vec<SecurityEvent> {
        self.read()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let mut events = self.write();

        // 超出上限时丢弃最旧的事件
        if let Some(max) = self.max_events {
            while !events.is_empty() && events.len() >= max {
                events.remove(0);
            }
        }

        events.push(event);
    }
}

impl Clone for InMemoryAuditLogger {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            max_events: self.max_events,
        }
    }
}

// ============================================================================
// TracingAuditLogger
// ============================================================================

/// 把安全事件转发到 `tracing`
///
/// 严重程度映射到对应的日志级别，事件字段作为结构化字段输出。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl TracingAuditLogger {
    /// 创建新的 tracing 日志记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for TracingAuditLogger {
    fn log(&self, event: SecurityEvent) {
        let name = event.event_name();
        let user = event.user_id.as_deref().unwrap_or("-");
        let actor = event.actor_id.as_deref().unwrap_or("-");
        let operation = event.operation.as_deref().unwrap_or("-");
        let message = event.message.as_deref().unwrap_or("");

        match event.severity {
            EventSeverity::Debug => tracing::debug!(
                target: "marketplace_authz::audit",
                event = %name, event_id = %event.id, user, actor, operation, "{}", message
            ),
            EventSeverity::Info => tracing::info!(
                target: "marketplace_authz::audit",
                event = %name, event_id = %event.id, user, actor, operation, "{}", message
            ),
            EventSeverity::Warning => tracing::warn!(
                target: "marketplace_authz::audit",
                event = %name, event_id = %event.id, user, actor, operation, "{}", message
            ),
            EventSeverity::Error | EventSeverity::Critical => tracing::error!(
                target: "marketplace_authz::audit",
                event = %name, event_id = %event.id, user, actor, operation, "{}", message
            ),
        }
    }
}

// ============================================================================
// NoOpAuditLogger
// ============================================================================

/// 空操作日志记录器
///
/// 不执行任何操作，用于禁用审计日志
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpAuditLogger;

impl NoOpAuditLogger {
    /// 创建新的空操作日志记录器
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for NoOpAuditLogger {
    fn log(&self, _event: SecurityEvent) {}
}

// ============================================================================
// 测试
// ============================================================================
