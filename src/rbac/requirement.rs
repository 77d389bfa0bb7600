//! 权限要求绑定模块
//!
//! 把操作标识映射到权限要求 `{permissions, combinator}`。
//! 绑定保存在显式可检查的 [`RequirementTable`] 中，由守卫在处理函数之前统一查询。
//!
//! ## 作用域
//!
//! 操作标识使用点分作用域，例如 `admin.roles.promote_to_admin`。
//! 查询时从完整标识开始逐级向外查找，最内层的绑定生效：
//!
//! ```rust
//! use marketplace_authz::rbac::{Permission, Requirement, RequirementTable};
//!
//! let table = RequirementTable::new()
//!     .with("admin.businesses", Requirement::business_view())
//!     .with("admin.businesses.verify", Requirement::business_verification());
//!
//! let list = table.resolve("admin.businesses.list").unwrap();
//! assert_eq!(list.permissions(), &[Permission::ViewBusinesses]);
//!
//! let verify = table.resolve("admin.businesses.verify").unwrap();
//! assert_eq!(verify.permissions(), &[Permission::VerifyBusinesses]);
//!
//! assert!(table.resolve("public.health").is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::permission::Permission;
use crate::error::{Result, ValidationError};

/// 多个权限的组合方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    /// 必须拥有全部权限
    All,
    /// 拥有任一权限即可
    #[default]
    Any,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::All => write!(f, "ALL"),
            Combinator::Any => write!(f, "ANY"),
        }
    }
}

// ============================================================================
// Requirement
// ============================================================================

/// 操作的权限要求
///
/// 权限列表保证非空，反序列化时同样校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RequirementRepr")]
pub struct Requirement {
    permissions: Vec<Permission>,
    combinator: Combinator,
}

#[derive(Deserialize)]
struct RequirementRepr {
    permissions: Vec<Permission>,
    #[serde(default)]
    combinator: Combinator,
}

impl TryFrom<RequirementRepr> for Requirement {
    type Error = crate::Error;

    fn try_from(repr: RequirementRepr) -> Result<Self> {
        Requirement::new(repr.permissions, repr.combinator)
    }
}

impl Requirement {
    /// 创建权限要求（空列表返回验证错误）
    pub fn new(
        permissions: impl IntoIterator<Item = Permission>,
        combinator: Combinator,
    ) -> Result<Self> {
        let mut list: Vec<Permission> = Vec::new();
        for permission in permissions {
            if !list.contains(&permission) {
                list.push(permission);
            }
        }

        if list.is_empty() {
            return Err(ValidationError::EmptyRequirement.into());
        }

        Ok(Self {
            permissions: list,
            combinator,
        })
    }

    /// 单个权限
    pub fn single(permission: Permission) -> Self {
        Self {
            permissions: vec![permission],
            combinator: Combinator::Any,
        }
    }

    /// 任一权限
    pub fn any(permissions: impl IntoIterator<Item = Permission>) -> Result<Self> {
        Self::new(permissions, Combinator::Any)
    }

    /// 全部权限
    pub fn all(permissions: impl IntoIterator<Item = Permission>) -> Result<Self> {
        Self::new(permissions, Combinator::All)
    }

    /// 创建构建器
    pub fn builder() -> RequirementBuilder {
        RequirementBuilder::new()
    }

    /// 要求的权限
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// 组合方式
    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    // ------------------------------------------------------------------------
    // 预设
    // ------------------------------------------------------------------------

    fn preset(permissions: Vec<Permission>, combinator: Combinator) -> Self {
        Self {
            permissions,
            combinator,
        }
    }

    /// 管理商业项目
    pub fn business_management() -> Self {
        Self::single(Permission::ManageBusinesses)
    }

    /// 查看商业项目
    pub fn business_view() -> Self {
        Self::single(Permission::ViewBusinesses)
    }

    /// 审核商业项目
    pub fn business_verification() -> Self {
        Self::single(Permission::VerifyBusinesses)
    }

    /// 管理投资请求
    pub fn investment_management() -> Self {
        Self::single(Permission::ManageInvestmentRequests)
    }

    /// 审阅投资请求
    pub fn investment_review() -> Self {
        Self::single(Permission::ReviewInvestmentRequests)
    }

    /// 查看投资请求
    pub fn investment_view() -> Self {
        Self::single(Permission::ViewInvestmentRequests)
    }

    /// 管理用户
    pub fn user_management() -> Self {
        Self::single(Permission::ManageUsers)
    }

    /// 查看用户
    pub fn user_view() -> Self {
        Self::single(Permission::ViewUsers)
    }

    /// 管理管理员
    pub fn admin_management() -> Self {
        Self::single(Permission::ManageAdmins)
    }

    /// 分配管理员角色
    pub fn role_assignment() -> Self {
        Self::single(Permission::AssignAdminRoles)
    }

    /// 管理系统设置
    pub fn settings_management() -> Self {
        Self::single(Permission::ManageSettings)
    }

    /// 查看统计分析
    pub fn analytics_view() -> Self {
        Self::single(Permission::ViewAnalytics)
    }

    /// 查看商业项目或投资请求
    pub fn business_or_investment_view() -> Self {
        Self::preset(
            vec![Permission::ViewBusinesses, Permission::ViewInvestmentRequests],
            Combinator::Any,
        )
    }

    /// 内容审核：同时需要管理和审核商业项目
    ///
    /// 组合方式固定为 ALL，只持有其中一个权限不满足。
    pub fn content_moderation() -> Self {
        Self::preset(
            vec![Permission::ManageBusinesses, Permission::VerifyBusinesses],
            Combinator::All,
        )
    }

    /// 完整的投资请求处理权限，两个权限都要持有（ALL）
    pub fn full_investment_access() -> Self {
        Self::preset(
            vec![
                Permission::ManageInvestmentRequests,
                Permission::ReviewInvestmentRequests,
            ],
            Combinator::All,
        )
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.permissions.iter().map(|p| p.as_str()).collect();
        write!(f, "{}({})", self.combinator, names.join(", "))
    }
}

/// 权限要求构建器
#[derive(Debug, Default)]
pub struct RequirementBuilder {
    permissions: Vec<Permission>,
    combinator: Combinator,
}

impl RequirementBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加权限
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// 添加多个权限
    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    /// 要求全部权限
    pub fn require_all(mut self) -> Self {
        self.combinator = Combinator::All;
        self
    }

    /// 要求任一权限
    pub fn require_any(mut self) -> Self {
        self.combinator = Combinator::Any;
        self
    }

    /// 构建
    pub fn build(self) -> Result<Requirement> {
        Requirement::new(self.permissions, self.combinator)
    }
}

// ============================================================================
// RequirementTable
// ============================================================================

/// 操作到权限要求的绑定表
#[derive(Debug, Clone, Default)]
pub struct RequirementTable {
    bindings: BTreeMap<String, Requirement>,
}

impl RequirementTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定作用域（已存在时覆盖）
    pub fn bind(&mut self, scope: impl Into<String>, requirement: Requirement) {
        self.bindings.insert(scope.into(), requirement);
    }

    /// 链式绑定
    pub fn with(mut self, scope: impl Into<String>, requirement: Requirement) -> Self {
        self.bind(scope, requirement);
        self
    }

    /// 移除绑定
    pub fn unbind(&mut self, scope: &str) -> Option<Requirement> {
        self.bindings.remove(scope)
    }

    /// 查询操作的权限要求
    ///
    /// 从完整标识开始逐级去掉最后一段，返回第一个命中的绑定；
    /// 没有任何绑定时返回 `None`。
    pub fn resolve(&self, operation: &str) -> Option<&Requirement> {
        let mut scope = operation;
        loop {
            if let Some(requirement) = self.bindings.get(scope) {
                return Some(requirement);
            }
            match scope.rfind('.') {
                Some(idx) => scope = &scope[..idx],
                None => return None,
            }
        }
    }

    /// 作用域本身是否有绑定
    pub fn is_bound(&self, scope: &str) -> bool {
        self.bindings.contains_key(scope)
    }

    /// 绑定数量
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 遍历所有绑定（按作用域排序）
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Requirement)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 市场后台的标准绑定
    pub fn marketplace() -> Self {
        Self::new()
            // 管理员与角色
            .with("admin.roles", Requirement::role_assignment())
            .with("admin.roles.admin_users", Requirement::admin_management())
            .with("admin.roles.promote_to_admin", Requirement::admin_management())
            .with("admin.roles.revoke_admin", Requirement::admin_management())
            .with("admin.roles.users", Requirement::user_view())
            // 商业项目
            .with("admin.businesses", Requirement::business_view())
            .with("admin.businesses.update", Requirement::business_management())
            .with("admin.businesses.delete", Requirement::business_management())
            .with("admin.businesses.verify", Requirement::business_verification())
            .with("admin.businesses.moderate", Requirement::content_moderation())
            // 投资请求
            .with("admin.investment_requests", Requirement::investment_view())
            .with(
                "admin.investment_requests.review",
                Requirement::investment_review(),
            )
            .with(
                "admin.investment_requests.update",
                Requirement::investment_management(),
            )
            .with(
                "admin.investment_requests.process",
                Requirement::full_investment_access(),
            )
            // 用户
            .with("admin.users", Requirement::user_view())
            .with("admin.users.update", Requirement::user_management())
            .with("admin.users.delete", Requirement::user_management())
            // 仪表盘与日志
            .with("admin.dashboard", Requirement::analytics_view())
            .with(
                "admin.dashboard.overview",
                Requirement::business_or_investment_view(),
            )
            .with("admin.activity_logs", Requirement::analytics_view())
            .with(
                "admin.activity_logs.cleanup",
                Requirement::settings_management(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_requirement_rejected() {
        let err = Requirement::any([]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Validation(ValidationError::EmptyRequirement)
        ));
        assert!(Requirement::builder().require_all().build().is_err());
    }

    #[test]
    fn test_default_combinator_is_any() {
        let req = Requirement::builder()
            .permission(Permission::ViewUsers)
            .permission(Permission::ViewUsers)
            .build()
            .unwrap();

        assert_eq!(req.combinator(), Combinator::Any);
        assert_eq!(req.permissions(), &[Permission::ViewUsers]);
    }

    #[test]
    fn test_requirement_display() {
        assert_eq!(
            Requirement::content_moderation().to_string(),
            "ALL(MANAGE_BUSINESSES, VERIFY_BUSINESSES)"
        );
    }

    #[test]
    fn test_combined_presets_require_all() {
        for req in [
            Requirement::content_moderation(),
            Requirement::full_investment_access(),
        ] {
            assert_eq!(req.combinator(), Combinator::All);
            assert_eq!(req.permissions().len(), 2);
        }
    }

    #[test]
    fn test_innermost_binding_wins() {
        let table = RequirementTable::new()
            .with("admin", Requirement::analytics_view())
            .with("admin.roles", Requirement::role_assignment())
            .with("admin.roles.revoke_admin", Requirement::admin_management());

        assert_eq!(
            table.resolve("admin.roles.revoke_admin"),
            Some(&Requirement::admin_management())
        );
        assert_eq!(
            table.resolve("admin.roles.update_role"),
            Some(&Requirement::role_assignment())
        );
        assert_eq!(
            table.resolve("admin.settings"),
            Some(&Requirement::analytics_view())
        );
        assert_eq!(table.resolve("auth.login"), None);
    }

    #[test]
    fn test_prefix_match_respects_segments() {
        let table = RequirementTable::new().with("admin.users", Requirement::user_view());

        // `admin.users_export` 不是 `admin.users` 的子作用域
        assert!(table.resolve("admin.users_export").is_none());
        assert!(table.resolve("admin.users.list").is_some());
    }

    #[test]
    fn test_unbind() {
        let mut table = RequirementTable::marketplace();
        assert!(table.is_bound("admin.activity_logs.cleanup"));

        table.unbind("admin.activity_logs.cleanup");
        assert_eq!(
            table.resolve("admin.activity_logs.cleanup"),
            Some(&Requirement::analytics_view())
        );
    }

    #[test]
    fn test_requirement_deserialize() {
        let req: Requirement =
            serde_json::from_str(r#"{"permissions":["VIEW_USERS","MANAGE_USERS"]}"#).unwrap();
        assert_eq!(req.combinator(), Combinator::Any);
        assert_eq!(req.permissions().len(), 2);

        let empty = serde_json::from_str::<Requirement>(r#"{"permissions":[]}"#);
        assert!(empty.is_err());
    }
}
