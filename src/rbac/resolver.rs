//! 权限解析器模块
//!
//! 根据授权三元组 `(role, admin_role, explicit_permissions)` 计算有效权限，
//! 回答单个/任一/全部权限查询，并计算委派场景下可分配的角色和可授予的权限。
//!
//! 解析器是纯计算组件：不做 I/O，不持有可变状态，可以在任意线程中并发调用。
//!
//! ## 示例
//!
//! ```rust
//! use marketplace_authz::rbac::{AccessProfile, AdminRole, Permission, PermissionResolver};
//!
//! let resolver = PermissionResolver::standard();
//! let manager = AccessProfile::admin(AdminRole::UserManager);
//!
//! assert!(resolver.has_permission(&manager, Permission::ManageUsers));
//! assert!(!resolver.has_permission(&manager, Permission::ManageBusinesses));
//!
//! let manager = manager.with_permission(Permission::ManageBusinesses);
//! assert!(resolver.has_permission(&manager, Permission::ManageBusinesses));
//! ```

use std::sync::Arc;

use super::permission::{Permission, PermissionSet};
use super::requirement::{Combinator, Requirement};
use super::role::{AdminRole, RoleCatalog};
use super::subject::AccessProfile;

/// 权限解析器
///
/// 持有注入的 [`RoleCatalog`]，克隆只复制 `Arc`。
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    catalog: Arc<RoleCatalog>,
}

impl PermissionResolver {
    /// 使用指定的角色目录创建解析器
    pub fn new(catalog: impl Into<Arc<RoleCatalog>>) -> Self {
        Self {
            catalog: catalog.into(),
        }
    }

    /// 使用市场默认角色目录创建解析器
    pub fn standard() -> Self {
        Self::new(RoleCatalog::standard())
    }

    /// 获取角色目录
    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// 检查是否拥有某个权限
    ///
    /// 非管理类角色或没有管理员角色的主体永远返回 `false`，
    /// 即使显式权限中包含该权限。
    pub fn has_permission(&self, profile: &AccessProfile, permission: Permission) -> bool {
        let Some(admin_role) = Self::active_admin_role(profile) else {
            return false;
        };

        profile.explicit_permissions.contains(&permission)
            || self.catalog.grants_by_default(admin_role, permission)
    }

    /// 检查是否拥有任一权限（空列表返回 `false`）
    pub fn has_any_permission(&self, profile: &AccessProfile, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .any(|permission| self.has_permission(profile, *permission))
    }

    /// 检查是否拥有全部权限（空列表返回 `true`）
    pub fn has_all_permissions(&self, profile: &AccessProfile, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .all(|permission| self.has_permission(profile, *permission))
    }

    /// 计算有效权限集合
    ///
    /// 角色默认权限与显式权限的并集；非管理类主体返回空集。
    pub fn get_all_user_permissions(&self, profile: &AccessProfile) -> PermissionSet {
        match Self::active_admin_role(profile) {
            Some(admin_role) => self
                .catalog
                .default_permissions(admin_role)
                .union(&profile.explicit_permissions),
            None => PermissionSet::new(),
        }
    }

    /// 获取管理员角色的默认权限（目录中缺失时返回空集）
    pub fn get_default_permissions(&self, admin_role: AdminRole) -> PermissionSet {
        self.catalog.default_permissions(admin_role)
    }

    /// 检查 `actor` 能否把 `target` 角色分配给他人
    ///
    /// 必须持有 `ASSIGN_ADMIN_ROLES`；超级管理员可分配任意角色，
    /// 其他管理员不能分配超级管理员。
    pub fn can_assign_role(&self, actor: &AccessProfile, target: AdminRole) -> bool {
        if !self.has_permission(actor, Permission::AssignAdminRoles) {
            return false;
        }

        if Self::is_top(actor) {
            return true;
        }

        !target.is_top()
    }

    /// 检查 `granter` 能否授予 `permission`
    ///
    /// 非超级管理员只能授予自己当前持有的权限。
    pub fn can_grant_permission(&self, granter: &AccessProfile, permission: Permission) -> bool {
        if !self.has_permission(granter, Permission::AssignAdminRoles) {
            return false;
        }

        if Self::is_top(granter) {
            return true;
        }

        self.has_permission(granter, permission)
    }

    /// 可分配的管理员角色（按目录声明顺序）
    pub fn get_assignable_roles(&self, actor: &AccessProfile) -> Vec<AdminRole> {
        AdminRole::all()
            .filter(|role| self.can_assign_role(actor, *role))
            .collect()
    }

    /// 可授予的权限
    pub fn get_grantable_permissions(&self, granter: &AccessProfile) -> PermissionSet {
        Permission::all()
            .filter(|permission| self.can_grant_permission(granter, *permission))
            .collect()
    }

    /// 检查是否满足权限要求
    pub fn satisfies(&self, profile: &AccessProfile, requirement: &Requirement) -> bool {
        match requirement.combinator() {
            Combinator::All => self.has_all_permissions(profile, requirement.permissions()),
            Combinator::Any => self.has_any_permission(profile, requirement.permissions()),
        }
    }

    fn active_admin_role(profile: &AccessProfile) -> Option<AdminRole> {
        if profile.role.is_administrative() {
            profile.admin_role
        } else {
            None
        }
    }

    fn is_top(profile: &AccessProfile) -> bool {
        Self::active_admin_role(profile).is_some_and(|role| role.is_top())
    }
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self::standard()
    }
}
