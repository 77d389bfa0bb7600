//! 管理员角色服务
//!
//! 在修改目标用户的授权属性之前，先用解析器校验操作者的委派能力，
//! 再检查与身份相关的前提（不能降级自己、不能撤销自己）。
//!
//! 操作者是身份守卫产出的 [`Subject`]。存储用户的授权三元组在每次调用时重新读取。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use marketplace_authz::admin::AdminRoleService;
//! use marketplace_authz::rbac::{AdminRole, PermissionResolver, Role, Subject, User};
//! use marketplace_authz::store::InMemoryUserStore;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryUserStore::with_users([
//!     User::new("owner-1", "owner@example.com", "Owner", Role::ProjectOwner),
//! ]));
//! let service = AdminRoleService::new(PermissionResolver::standard(), store);
//! let root = Subject::BuiltinSuperAdmin;
//!
//! let promoted = service
//!     .promote_to_admin(&root, "owner-1", AdminRole::ReadOnlyAdmin)
//!     .await
//!     .unwrap();
//! assert_eq!(promoted.role, Role::Admin);
//! assert!(promoted.permissions.is_empty());
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::audit::{AuditLogger, NoOpAuditLogger, SecurityEvent};
use crate::error::{Error, Result, ValidationError};
use crate::rbac::{
    AccessProfile, AdminRole, Permission, PermissionResolver, PermissionSet, Role, Subject, User,
};
use crate::store::{AuthorizationUpdate, UserStore};

/// 管理员列表项
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserView {
    /// 用户 ID
    pub id: String,
    /// 名称
    pub name: String,
    /// 邮箱
    pub email: String,
    /// 管理员角色
    pub admin_role: Option<AdminRole>,
    /// 显式权限
    pub permissions: PermissionSet,
    /// 有效权限
    pub effective_permissions: PermissionSet,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 用户权限明细
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsView {
    /// 显式权限
    pub explicit_permissions: PermissionSet,
    /// 有效权限
    pub effective_permissions: PermissionSet,
    /// 管理员角色的默认权限
    pub default_role_permissions: PermissionSet,
}

/// 管理员角色服务
pub struct AdminRoleService {
    resolver: PermissionResolver,
    store: Arc<dyn UserStore>,
    audit: Arc<dyn AuditLogger>,
}

impl AdminRoleService {
    /// 创建服务
    pub fn new(resolver: PermissionResolver, store: Arc<dyn UserStore>) -> Self {
        Self {
            resolver,
            store,
            audit: Arc::new(NoOpAuditLogger),
        }
    }

    /// 设置审计日志记录器
    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// 列出所有管理员及其有效权限
    pub async fn admin_users(&self, actor: &Subject) -> Result<Vec<AdminUserView>> {
        self.require_admin(actor, "Only admins can view admin users")
            .await?;

        let admins = self.store.list_admins().await?;
        Ok(admins
            .into_iter()
            .map(|user| {
                let effective = self.resolver.get_all_user_permissions(&user.access_profile());
                AdminUserView {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    admin_role: user.admin_role,
                    permissions: user.permissions,
                    effective_permissions: effective,
                    created_at: user.created_at,
                    updated_at: user.updated_at,
                }
            })
            .collect())
    }

    /// 操作者可以分配的角色
    pub async fn available_roles(&self, actor: &Subject) -> Result<Vec<AdminRole>> {
        let profile = self
            .require_admin(actor, "Only admins can view available roles")
            .await?;
        Ok(self.resolver.get_assignable_roles(&profile))
    }

    /// 操作者可以授予的权限
    pub async fn available_permissions(&self, actor: &Subject) -> Result<PermissionSet> {
        let profile = self
            .require_admin(actor, "Only admins can view available permissions")
            .await?;
        Ok(self.resolver.get_grantable_permissions(&profile))
    }

    /// 查看目标用户的权限明细
    pub async fn user_permissions(
        &self,
        actor: &Subject,
        target_id: &str,
    ) -> Result<UserPermissionsView> {
        self.require_admin(actor, "Only admins can view user permissions")
            .await?;

        let target = self.find_target(target_id).await?;
        let profile = target.access_profile();

        Ok(UserPermissionsView {
            default_role_permissions: target
                .admin_role
                .map(|role| self.resolver.get_default_permissions(role))
                .unwrap_or_default(),
            effective_permissions: self.resolver.get_all_user_permissions(&profile),
            explicit_permissions: target.permissions,
        })
    }

    /// 更换目标管理员的角色，显式权限同时清空
    pub async fn update_user_role(
        &self,
        actor: &Subject,
        target_id: &str,
        new_role: AdminRole,
    ) -> Result<User> {
        let profile = self
            .require_admin(actor, "Only admins can update user roles")
            .await?;

        if !self.resolver.can_assign_role(&profile, new_role) {
            return Err(Error::forbidden("You cannot assign this role"));
        }

        let target = self.find_target(target_id).await?;
        if !target.role.is_administrative() {
            return Err(invalid_target("User must be an admin to assign admin roles"));
        }

        if actor.id() == target.id
            && profile.admin_role == Some(AdminRole::SuperAdmin)
            && new_role != AdminRole::SuperAdmin
        {
            return Err(Error::forbidden("Cannot demote yourself from Super Admin"));
        }

        let updated = self
            .store
            .apply_authorization(&target.id, AuthorizationUpdate::change_admin_role(new_role))
            .await?;

        tracing::info!(
            target: "marketplace_authz::admin",
            "admin role changed: actor={} target={} role={}", actor.id(), updated.id, new_role
        );
        self.audit
            .log(SecurityEvent::role_changed(actor.id(), &updated.id, new_role));
        Ok(updated)
    }

    /// 替换目标管理员的显式权限
    ///
    /// 每个权限都必须能由操作者授予；清空权限同样要求 `ASSIGN_ADMIN_ROLES`。
    pub async fn update_user_permissions(
        &self,
        actor: &Subject,
        target_id: &str,
        permissions: PermissionSet,
    ) -> Result<User> {
        let profile = self
            .require_admin(actor, "Only admins can update user permissions")
            .await?;

        if !self
            .resolver
            .has_permission(&profile, Permission::AssignAdminRoles)
        {
            return Err(Error::forbidden("You cannot update user permissions"));
        }

        let target = self.find_target(target_id).await?;
        if !target.role.is_administrative() {
            return Err(invalid_target("User must be an admin to have permissions"));
        }

        if let Some(denied) = permissions
            .iter()
            .find(|p| !self.resolver.can_grant_permission(&profile, **p))
        {
            return Err(Error::forbidden(format!(
                "You cannot grant the permission: {}",
                denied
            )));
        }

        // 只写显式权限；存储在写入时再次确认目标仍是管理员
        let updated = self
            .store
            .apply_authorization(&target.id, AuthorizationUpdate::set_permissions(permissions))
            .await?;

        tracing::info!(
            target: "marketplace_authz::admin",
            "explicit permissions replaced: actor={} target={} count={}",
            actor.id(), updated.id, updated.permissions.len()
        );
        self.audit.log(SecurityEvent::permission_changed(
            actor.id(),
            &updated.id,
            &updated.permissions,
        ));
        Ok(updated)
    }

    /// 把普通用户提升为管理员
    pub async fn promote_to_admin(
        &self,
        actor: &Subject,
        target_id: &str,
        admin_role: AdminRole,
    ) -> Result<User> {
        let profile = self
            .require_admin(actor, "Only admins can promote users")
            .await?;

        if !self
            .resolver
            .has_permission(&profile, Permission::ManageAdmins)
        {
            return Err(Error::forbidden("You cannot promote users to admin"));
        }

        let target = self.find_target(target_id).await?;
        if target.role.is_administrative() {
            return Err(invalid_target("User is already an admin"));
        }

        if !self.resolver.can_assign_role(&profile, admin_role) {
            return Err(Error::forbidden("You cannot assign this admin role"));
        }

        let updated = self
            .store
            .apply_authorization(&target.id, AuthorizationUpdate::promote(admin_role))
            .await?;

        tracing::info!(
            target: "marketplace_authz::admin",
            "user promoted: actor={} target={} role={}", actor.id(), updated.id, admin_role
        );
        self.audit
            .log(SecurityEvent::admin_promoted(actor.id(), &updated.id, admin_role));
        Ok(updated)
    }

    /// 撤销目标用户的管理员身份，降为项目方
    pub async fn revoke_admin_access(&self, actor: &Subject, target_id: &str) -> Result<User> {
        let profile = self
            .require_admin(actor, "Only admins can revoke admin access")
            .await?;

        if !self
            .resolver
            .has_permission(&profile, Permission::ManageAdmins)
        {
            return Err(Error::forbidden("You cannot revoke admin access"));
        }

        let target = self.find_target(target_id).await?;
        if !target.role.is_administrative() {
            return Err(invalid_target("User is not an admin"));
        }

        if actor.id() == target.id {
            return Err(Error::forbidden("Cannot revoke your own admin access"));
        }

        let updated = self
            .store
            .apply_authorization(&target.id, AuthorizationUpdate::revoke())
            .await?;

        tracing::info!(
            target: "marketplace_authz::admin",
            "admin access revoked: actor={} target={}", actor.id(), updated.id
        );
        self.audit
            .log(SecurityEvent::admin_revoked(actor.id(), &updated.id));
        Ok(updated)
    }

    /// 按名称查询管理员角色的默认权限
    pub fn role_permissions(&self, role_name: &str) -> Result<PermissionSet> {
        let role = AdminRole::parse(role_name).ok_or_else(|| {
            Error::Validation(ValidationError::UnknownAdminRole(role_name.to_string()))
        })?;
        Ok(self.resolver.get_default_permissions(role))
    }

    /// 确认操作者是管理员并返回其当前的授权三元组
    async fn require_admin(&self, actor: &Subject, message: &str) -> Result<AccessProfile> {
        let profile = match actor {
            Subject::BuiltinSuperAdmin => actor.access_profile(),
            Subject::Stored(user) => match self.store.find_by_id(&user.id).await? {
                Some(current) => current.access_profile(),
                None => return Err(Error::forbidden(message)),
            },
        };

        if profile.role != Role::Admin {
            return Err(Error::forbidden(message));
        }
        Ok(profile)
    }

    async fn find_target(&self, target_id: &str) -> Result<User> {
        self.store
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| Error::not_found("User not found"))
    }
}

fn invalid_target(message: &str) -> Error {
    Error::Validation(ValidationError::InvalidTarget(message.to_string()))
}
