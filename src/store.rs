//! 用户存储模块
//!
//! 授权守卫和管理服务通过 [`UserStore`] 读取与修改用户的授权属性。
//! 每次修改由一个 [`AuthorizationUpdate`] 表示，只写入它负责的字段，
//! 并在存储的写锁内检查目标当前是否仍满足前提（例如仍是管理员）。
//! 读取目标与写入之间发生的撤销因此不会被覆盖。

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result, StorageError, ValidationError};
use crate::rbac::{AdminRole, PermissionSet, Role, User};

/// 授权属性的单次更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationUpdate {
    /// 更换管理员角色并清空显式权限，粗粒度角色不变
    ChangeAdminRole(AdminRole),
    /// 替换显式权限，角色不变
    SetPermissions(PermissionSet),
    /// 提升为管理员
    Promote(AdminRole),
    /// 撤销管理员，降为项目方
    Revoke,
}

impl AuthorizationUpdate {
    /// 更换管理员角色，显式权限同时清空
    pub fn change_admin_role(admin_role: AdminRole) -> Self {
        AuthorizationUpdate::ChangeAdminRole(admin_role)
    }

    /// 替换显式权限
    pub fn set_permissions(permissions: impl Into<PermissionSet>) -> Self {
        AuthorizationUpdate::SetPermissions(permissions.into())
    }

    /// 提升为管理员
    pub fn promote(admin_role: AdminRole) -> Self {
        AuthorizationUpdate::Promote(admin_role)
    }

    /// 撤销管理员权限
    pub fn revoke() -> Self {
        AuthorizationUpdate::Revoke
    }

    /// 检查目标的当前状态是否允许此更新
    ///
    /// 实现 [`UserStore`] 时应在写入所在的同一临界区（或事务）内调用。
    pub fn check(&self, user: &User) -> Result<()> {
        let administrative = user.role.is_administrative();
        let message = match self {
            AuthorizationUpdate::ChangeAdminRole(_) if !administrative => {
                "User must be an admin to assign admin roles"
            }
            AuthorizationUpdate::SetPermissions(_) if !administrative => {
                "User must be an admin to have permissions"
            }
            AuthorizationUpdate::Promote(_) if administrative => "User is already an admin",
            AuthorizationUpdate::Revoke if !administrative => "User is not an admin",
            _ => return Ok(()),
        };
        Err(Error::Validation(ValidationError::InvalidTarget(
            message.to_string(),
        )))
    }

    /// 检查前提并写入
    pub fn apply_to(self, user: &mut User) -> Result<()> {
        self.check(user)?;
        match self {
            AuthorizationUpdate::ChangeAdminRole(admin_role) => {
                user.admin_role = Some(admin_role);
                user.permissions.clear();
            }
            AuthorizationUpdate::SetPermissions(permissions) => {
                user.permissions = permissions;
            }
            AuthorizationUpdate::Promote(admin_role) => {
                user.role = Role::Admin;
                user.admin_role = Some(admin_role);
                user.permissions.clear();
            }
            AuthorizationUpdate::Revoke => {
                user.role = Role::ProjectOwner;
                user.admin_role = None;
                user.permissions.clear();
            }
        }
        user.updated_at = Utc::now();
        Ok(())
    }
}

/// 用户存储 trait
///
/// 实现此 trait 以接入持久化存储
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;

    /// 插入新用户（ID 已存在时返回错误）
    async fn insert(&self, user: User) -> Result<()>;

    /// 列出所有管理员（按创建时间倒序）
    async fn list_admins(&self) -> Result<Vec<User>>;

    /// 原子地检查前提并写入授权属性，返回更新后的用户
    ///
    /// 前提不满足时返回验证错误，用户记录保持不变。
    async fn apply_authorization(&self, id: &str, update: AuthorizationUpdate) -> Result<User>;
}

/// 内存存储实现
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始用户创建存储
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// 用户数量
    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;
        Ok(users.get(id).cloned())
    }

    async fn insert(&self, user: User) -> Result<()> {
        let mut users = self.users.write().map_err(|_| lock_poisoned())?;
        if users.contains_key(&user.id) {
            return Err(Error::Storage(StorageError::AlreadyExists(format!(
                "user {}",
                user.id
            ))));
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<User>> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;
        let mut admins: Vec<User> = users
            .values()
            .filter(|u| u.role.is_administrative())
            .cloned()
            .collect();
        admins.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(admins)
    }

    async fn apply_authorization(&self, id: &str, update: AuthorizationUpdate) -> Result<User> {
        let mut users = self.users.write().map_err(|_| lock_poisoned())?;
        let user = users
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("user {}", id)))?;
        update.apply_to(user)?;
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Permission;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::new();
        store
            .insert(User::new("u1", "a@example.com", "A", Role::Investor))
            .await
            .unwrap();

        assert!(store.find_by_id("u1").await.unwrap().is_some());
        assert!(store.find_by_id("missing").await.unwrap().is_none());

        let err = store
            .insert(User::new("u1", "b@example.com", "B", Role::Investor))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_change_admin_role_clears_permissions() {
        let user = User::admin("a1", "a@example.com", "A", AdminRole::UserManager)
            .with_permissions([Permission::ManageBusinesses]);
        let store = InMemoryUserStore::with_users([user]);

        let updated = store
            .apply_authorization(
                "a1",
                AuthorizationUpdate::change_admin_role(AdminRole::ReadOnlyAdmin),
            )
            .await
            .unwrap();

        assert_eq!(updated.admin_role, Some(AdminRole::ReadOnlyAdmin));
        assert!(updated.permissions.is_empty());

        let stored = store.find_by_id("a1").await.unwrap().unwrap();
        assert!(stored.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_revoke() {
        let store = InMemoryUserStore::with_users([User::admin(
            "a1",
            "a@example.com",
            "A",
            AdminRole::ContentModerator,
        )]);

        let updated = store
            .apply_authorization("a1", AuthorizationUpdate::revoke())
            .await
            .unwrap();
        assert_eq!(updated.role, Role::ProjectOwner);
        assert_eq!(updated.admin_role, None);
        assert!(store.list_admins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_permissions_keeps_role() {
        let store = InMemoryUserStore::with_users([User::admin(
            "a1",
            "a@example.com",
            "A",
            AdminRole::UserManager,
        )]);

        let updated = store
            .apply_authorization(
                "a1",
                AuthorizationUpdate::set_permissions([Permission::ManageBusinesses]),
            )
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.admin_role, Some(AdminRole::UserManager));
        assert!(updated.permissions.contains(&Permission::ManageBusinesses));
    }

    #[tokio::test]
    async fn test_preconditions_checked_under_lock() {
        let owner = User::new("p1", "p@example.com", "P", Role::ProjectOwner)
            .with_permissions([Permission::ViewUsers]);
        let store = InMemoryUserStore::with_users([
            owner,
            User::admin("a1", "a@example.com", "A", AdminRole::ReadOnlyAdmin),
        ]);

        for update in [
            AuthorizationUpdate::change_admin_role(AdminRole::UserManager),
            AuthorizationUpdate::set_permissions([Permission::ManageAdmins]),
            AuthorizationUpdate::revoke(),
        ] {
            let err = store.apply_authorization("p1", update).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Validation(ValidationError::InvalidTarget(_))
            ));
        }

        let err = store
            .apply_authorization("a1", AuthorizationUpdate::promote(AdminRole::SuperAdmin))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        // 失败的更新不修改记录
        let p1 = store.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p1.role, Role::ProjectOwner);
        assert_eq!(p1.admin_role, None);
        assert_eq!(
            p1.permissions,
            PermissionSet::from_permissions([Permission::ViewUsers])
        );
        let a1 = store.find_by_id("a1").await.unwrap().unwrap();
        assert_eq!(a1.admin_role, Some(AdminRole::ReadOnlyAdmin));
    }

    #[tokio::test]
    async fn test_poisoned_lock() {
        let store = std::sync::Arc::new(InMemoryUserStore::with_users([User::new(
            "u1",
            "u@example.com",
            "U",
            Role::Investor,
        )]));

        let inner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = inner.users.write().unwrap();
            panic!("writer panicked");
        })
        .join();

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());

        let err = store.find_by_id("u1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::OperationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_to_missing_user() {
        let store = InMemoryUserStore::new();
        let err = store
            .apply_authorization("ghost", AuthorizationUpdate::revoke())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
