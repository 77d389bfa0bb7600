//! 权限定义模块
//!
//! 提供权限目录（封闭枚举）与权限集合。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ValidationError};

/// 细粒度权限
///
/// 权限集合在编译期确定，运行时不会新增或删除。序列化时使用
/// `SCREAMING_SNAKE_CASE`，与数据库中的枚举值一致。
///
/// ## 示例
///
/// ```rust
/// use marketplace_authz::rbac::Permission;
///
/// let perm: Permission = "MANAGE_USERS".parse().unwrap();
/// assert_eq!(perm, Permission::ManageUsers);
/// assert_eq!(perm.to_string(), "MANAGE_USERS");
/// assert_eq!(Permission::all().count(), 14);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    /// 管理商业项目
    ManageBusinesses,
    /// 审核认证商业项目
    VerifyBusinesses,
    /// 查看商业项目
    ViewBusinesses,
    /// 管理投资请求
    ManageInvestmentRequests,
    /// 审阅投资请求
    ReviewInvestmentRequests,
    /// 查看投资请求
    ViewInvestmentRequests,
    /// 管理用户
    ManageUsers,
    /// 查看用户
    ViewUsers,
    /// 分配普通角色
    AssignRoles,
    /// 管理系统设置
    ManageSettings,
    /// 查看统计分析
    ViewAnalytics,
    /// 管理内容
    ManageContent,
    /// 管理管理员（提升/撤销）
    ManageAdmins,
    /// 分配管理员角色与显式权限
    AssignAdminRoles,
}

impl Permission {
    /// 完整的权限目录（声明顺序）
    pub const ALL: [Permission; 14] = [
        Permission::ManageBusinesses,
        Permission::VerifyBusinesses,
        Permission::ViewBusinesses,
        Permission::ManageInvestmentRequests,
        Permission::ReviewInvestmentRequests,
        Permission::ViewInvestmentRequests,
        Permission::ManageUsers,
        Permission::ViewUsers,
        Permission::AssignRoles,
        Permission::ManageSettings,
        Permission::ViewAnalytics,
        Permission::ManageContent,
        Permission::ManageAdmins,
        Permission::AssignAdminRoles,
    ];

    /// 遍历完整的权限目录
    pub fn all() -> impl Iterator<Item = Permission> {
        Self::ALL.into_iter()
    }

    /// 获取权限的标识名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageBusinesses => "MANAGE_BUSINESSES",
            Permission::VerifyBusinesses => "VERIFY_BUSINESSES",
            Permission::ViewBusinesses => "VIEW_BUSINESSES",
            Permission::ManageInvestmentRequests => "MANAGE_INVESTMENT_REQUESTS",
            Permission::ReviewInvestmentRequests => "REVIEW_INVESTMENT_REQUESTS",
            Permission::ViewInvestmentRequests => "VIEW_INVESTMENT_REQUESTS",
            Permission::ManageUsers => "MANAGE_USERS",
            Permission::ViewUsers => "VIEW_USERS",
            Permission::AssignRoles => "ASSIGN_ROLES",
            Permission::ManageSettings => "MANAGE_SETTINGS",
            Permission::ViewAnalytics => "VIEW_ANALYTICS",
            Permission::ManageContent => "MANAGE_CONTENT",
            Permission::ManageAdmins => "MANAGE_ADMINS",
            Permission::AssignAdminRoles => "ASSIGN_ADMIN_ROLES",
        }
    }

    /// 获取权限描述
    pub fn description(&self) -> &'static str {
        match self {
            Permission::ManageBusinesses => "Create, edit and remove business listings",
            Permission::VerifyBusinesses => "Approve or reject business verification",
            Permission::ViewBusinesses => "Read business listings in the admin panel",
            Permission::ManageInvestmentRequests => "Edit and close investment requests",
            Permission::ReviewInvestmentRequests => "Accept or reject investment requests",
            Permission::ViewInvestmentRequests => "Read investment requests",
            Permission::ManageUsers => "Change user status and profile data",
            Permission::ViewUsers => "Read user accounts",
            Permission::AssignRoles => "Change the coarse role of ordinary users",
            Permission::ManageSettings => "Change platform settings and maintenance jobs",
            Permission::ViewAnalytics => "Read dashboards and statistics",
            Permission::ManageContent => "Moderate published content",
            Permission::ManageAdmins => "Promote users to admin and revoke admin access",
            Permission::AssignAdminRoles => "Assign admin roles and explicit permissions",
        }
    }

    /// 从字符串解析权限（忽略大小写）
    ///
    /// # 示例
    ///
    /// ```rust
    /// use marketplace_authz::rbac::Permission;
    ///
    /// assert_eq!(Permission::parse("view_users"), Some(Permission::ViewUsers));
    /// assert!(Permission::parse("FLY").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| Error::Validation(ValidationError::UnknownPermission(s.to_string())))
    }
}

// ============================================================================
// PermissionSet 类型
// ============================================================================

/// 权限集合
///
/// 有序且去重，序列化为 JSON 数组。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet {
    permissions: BTreeSet<Permission>,
}

impl PermissionSet {
    /// 创建空的权限集合
    pub fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// 包含整个权限目录的集合
    pub fn full() -> Self {
        Permission::all().collect()
    }

    /// 从权限列表创建
    pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            permissions: permissions.into_iter().collect(),
        }
    }

    /// 添加权限，返回是否为新增
    pub fn add(&mut self, permission: Permission) -> bool {
        self.permissions.insert(permission)
    }

    /// 移除权限
    pub fn remove(&mut self, permission: &Permission) -> bool {
        self.permissions.remove(permission)
    }

    /// 检查是否包含特定权限
    pub fn contains(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// 检查是否包含所有指定权限（空列表为 true）
    pub fn contains_all(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.contains(p))
    }

    /// 检查是否包含任意一个指定权限（空列表为 false）
    pub fn contains_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.contains(p))
    }

    /// 获取权限数量
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// 获取所有权限的迭代器（目录顺序）
    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    /// 合并另一个权限集合
    pub fn merge(&mut self, other: &PermissionSet) {
        self.permissions.extend(other.permissions.iter().copied());
    }

    /// 返回两个集合的并集
    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// 检查是否为另一个集合的超集
    pub fn is_superset(&self, other: &PermissionSet) -> bool {
        self.permissions.is_superset(&other.permissions)
    }

    /// 转换为权限列表
    pub fn to_vec(&self) -> Vec<Permission> {
        self.permissions.iter().copied().collect()
    }

    /// 获取权限的字符串列表
    pub fn to_string_list(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.to_string()).collect()
    }

    /// 清空所有权限
    pub fn clear(&mut self) {
        self.permissions.clear();
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = std::collections::btree_set::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.into_iter()
    }
}

impl<'a> IntoIterator for &'a PermissionSet {
    type Item = &'a Permission;
    type IntoIter = std::collections::btree_set::Iter<'a, Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.iter()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<T: IntoIterator<Item = Permission>>(&mut self, iter: T) {
        self.permissions.extend(iter);
    }
}

impl<const N: usize> From<[Permission; N]> for PermissionSet {
    fn from(permissions: [Permission; N]) -> Self {
        Self::from_permissions(permissions)
    }
}
