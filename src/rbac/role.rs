//! 角色定义模块
//!
//! 提供粗粒度角色 [`Role`]、管理员角色 [`AdminRole`] 以及
//! 管理员角色到默认权限集合的只读目录 [`RoleCatalog`]。

use super::permission::{Permission, PermissionSet};
use crate::error::{Error, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// 粗粒度角色
///
/// 只有 `Admin` 属于管理类主体，能持有管理员角色或任何权限。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// 投资者
    Investor,
    /// 项目方
    ProjectOwner,
    /// 管理员
    Admin,
}

impl Role {
    /// 所有粗粒度角色
    pub const ALL: [Role; 3] = [Role::Investor, Role::ProjectOwner, Role::Admin];

    /// 是否为管理类角色
    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// 获取角色标识名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Investor => "INVESTOR",
            Role::ProjectOwner => "PROJECT_OWNER",
            Role::Admin => "ADMIN",
        }
    }

    /// 从字符串解析（忽略大小写）
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|r| r.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::Validation(ValidationError::UnknownRole(s.to_string())))
    }
}

// ============================================================================
// AdminRole
// ============================================================================

/// 管理员角色
///
/// 每个管理员角色在 [`RoleCatalog`] 中对应一组默认权限。
/// `SuperAdmin` 是最高角色，可以分配任何角色与权限。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminRole {
    /// 超级管理员
    SuperAdmin,
    /// 内容审核员
    ContentModerator,
    /// 投资审核员
    InvestmentModerator,
    /// 用户管理员
    UserManager,
    /// 只读管理员
    ReadOnlyAdmin,
}

impl AdminRole {
    /// 所有管理员角色（声明顺序）
    pub const ALL: [AdminRole; 5] = [
        AdminRole::SuperAdmin,
        AdminRole::ContentModerator,
        AdminRole::InvestmentModerator,
        AdminRole::UserManager,
        AdminRole::ReadOnlyAdmin,
    ];

    /// 遍历所有管理员角色
    pub fn all() -> impl Iterator<Item = AdminRole> {
        Self::ALL.into_iter()
    }

    /// 是否为最高角色
    pub fn is_top(&self) -> bool {
        matches!(self, AdminRole::SuperAdmin)
    }

    /// 获取角色标识名称
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "SUPER_ADMIN",
            AdminRole::ContentModerator => "CONTENT_MODERATOR",
            AdminRole::InvestmentModerator => "INVESTMENT_MODERATOR",
            AdminRole::UserManager => "USER_MANAGER",
            AdminRole::ReadOnlyAdmin => "READ_ONLY_ADMIN",
        }
    }

    /// 获取展示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            AdminRole::SuperAdmin => "Super Admin",
            AdminRole::ContentModerator => "Content Moderator",
            AdminRole::InvestmentModerator => "Investment Moderator",
            AdminRole::UserManager => "User Manager",
            AdminRole::ReadOnlyAdmin => "Read-Only Admin",
        }
    }

    /// 从字符串解析（忽略大小写）
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for AdminRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRole {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| Error::Validation(ValidationError::UnknownAdminRole(s.to_string())))
    }
}

// ============================================================================
// RoleCatalog
// ============================================================================

/// 管理员角色目录
///
/// 管理员角色到默认权限集合的不可变映射。进程启动时构建一次，
/// 之后以 `Arc` 注入到解析器中，测试可以注入替代目录。
///
/// # 示例
///
/// ```rust
/// use marketplace_authz::rbac::{AdminRole, Permission, RoleCatalog};
///
/// let catalog = RoleCatalog::standard();
/// let defaults = catalog.default_permissions(AdminRole::UserManager);
/// assert!(defaults.contains(&Permission::ManageUsers));
/// assert!(!defaults.contains(&Permission::ManageBusinesses));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleCatalog {
    defaults: BTreeMap<AdminRole, PermissionSet>,
}

impl RoleCatalog {
    /// 市场后台使用的标准目录
    pub fn standard() -> Self {
        use Permission::*;

        RoleCatalogBuilder::new()
            .role(AdminRole::SuperAdmin, Permission::all())
            .role(
                AdminRole::ContentModerator,
                [
                    ManageBusinesses,
                    VerifyBusinesses,
                    ViewBusinesses,
                    ViewAnalytics,
                    ManageContent,
                ],
            )
            .role(
                AdminRole::InvestmentModerator,
                [
                    ManageInvestmentRequests,
                    ReviewInvestmentRequests,
                    ViewInvestmentRequests,
                    ViewBusinesses,
                    ViewAnalytics,
                ],
            )
            .role(
                AdminRole::UserManager,
                [ManageUsers, ViewUsers, ViewAnalytics],
            )
            .role(
                AdminRole::ReadOnlyAdmin,
                [
                    ViewBusinesses,
                    ViewInvestmentRequests,
                    ViewUsers,
                    ViewAnalytics,
                ],
            )
            .build()
    }

    /// 创建目录构建器
    pub fn builder() -> RoleCatalogBuilder {
        RoleCatalogBuilder::new()
    }

    /// 从 JSON 对象加载目录
    ///
    /// 格式：`{ "USER_MANAGER": ["MANAGE_USERS", "VIEW_USERS"] }`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(json)?;

        let mut builder = RoleCatalogBuilder::new();
        for (role_name, permission_names) in raw {
            let role: AdminRole = role_name.parse()?;
            let permissions = permission_names
                .iter()
                .map(|name| name.parse::<Permission>())
                .collect::<Result<Vec<_>>>()?;
            builder = builder.role(role, permissions);
        }
        Ok(builder.build())
    }

    /// 获取管理员角色的默认权限
    ///
    /// 目录中没有映射的角色返回空集合，不会报错。
    pub fn default_permissions(&self, role: AdminRole) -> PermissionSet {
        self.defaults.get(&role).cloned().unwrap_or_default()
    }

    /// 检查默认权限集合中是否包含某个权限（不分配新集合）
    pub fn grants_by_default(&self, role: AdminRole, permission: Permission) -> bool {
        self.defaults
            .get(&role)
            .is_some_and(|set| set.contains(&permission))
    }

    /// 目录是否为该角色定义了默认权限
    pub fn contains_role(&self, role: AdminRole) -> bool {
        self.defaults.contains_key(&role)
    }

    /// 遍历目录中的所有映射
    pub fn iter(&self) -> impl Iterator<Item = (&AdminRole, &PermissionSet)> {
        self.defaults.iter()
    }

    /// 目录中的角色数量
    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    /// 目录是否为空
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }
}

// ============================================================================
// RoleCatalogBuilder
// ============================================================================

/// 角色目录构建器
///
/// ```rust
/// use marketplace_authz::rbac::{AdminRole, Permission, RoleCatalog};
///
/// let catalog = RoleCatalog::builder()
///     .role(AdminRole::ReadOnlyAdmin, [Permission::ViewUsers])
///     .grant(AdminRole::ReadOnlyAdmin, Permission::ViewAnalytics)
///     .build();
///
/// assert_eq!(catalog.default_permissions(AdminRole::ReadOnlyAdmin).len(), 2);
/// assert!(catalog.default_permissions(AdminRole::SuperAdmin).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RoleCatalogBuilder {
    defaults: BTreeMap<AdminRole, PermissionSet>,
}

impl RoleCatalogBuilder {
    /// 创建空的构建器
    pub fn new() -> Self {
        Self {
            defaults: BTreeMap::new(),
        }
    }

    /// 设置角色的默认权限（覆盖之前的设置）
    pub fn role(
        mut self,
        role: AdminRole,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        self.defaults
            .insert(role, PermissionSet::from_permissions(permissions));
        self
    }

    /// 为角色追加一个默认权限
    pub fn grant(mut self, role: AdminRole, permission: Permission) -> Self {
        self.defaults.entry(role).or_default().add(permission);
        self
    }

    /// 构建目录
    pub fn build(self) -> RoleCatalog {
        RoleCatalog {
            defaults: self.defaults,
        }
    }
}
