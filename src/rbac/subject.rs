//! 授权主体模块
//!
//! 定义解析器使用的授权三元组 [`AccessProfile`]、存储中的用户记录 [`User`]，
//! 以及身份守卫产出的主体 [`Subject`]。

use super::permission::PermissionSet;
use super::role::{AdminRole, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 内置超级管理员的固定 ID
pub const BUILTIN_ADMIN_ID: &str = "ADMIN-001";

/// 内置超级管理员的邮箱
pub const BUILTIN_ADMIN_EMAIL: &str = "ADMIN@baab.iq";

/// 内置超级管理员的显示名称
pub const BUILTIN_ADMIN_NAME: &str = "Administrator";

/// 授权三元组
///
/// `(role, admin_role, explicit_permissions)`，解析器的全部输入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessProfile {
    /// 粗粒度角色
    pub role: Role,
    /// 管理员角色（仅管理类主体可能非空）
    #[serde(default)]
    pub admin_role: Option<AdminRole>,
    /// 显式授予的权限
    #[serde(default)]
    pub explicit_permissions: PermissionSet,
}

impl AccessProfile {
    /// 创建没有管理员角色和显式权限的三元组
    pub fn new(role: Role) -> Self {
        Self {
            role,
            admin_role: None,
            explicit_permissions: PermissionSet::new(),
        }
    }

    /// 创建管理员三元组
    pub fn admin(admin_role: AdminRole) -> Self {
        Self {
            role: Role::Admin,
            admin_role: Some(admin_role),
            explicit_permissions: PermissionSet::new(),
        }
    }

    /// 设置管理员角色
    pub fn with_admin_role(mut self, admin_role: Option<AdminRole>) -> Self {
        self.admin_role = admin_role;
        self
    }

    /// 添加一个显式权限
    pub fn with_permission(mut self, permission: super::Permission) -> Self {
        self.explicit_permissions.add(permission);
        self
    }

    /// 添加多个显式权限
    pub fn with_permissions(
        mut self,
        permissions: impl IntoIterator<Item = super::Permission>,
    ) -> Self {
        self.explicit_permissions.extend(permissions);
        self
    }

    /// 是否为管理类主体且持有管理员角色
    pub fn is_active_admin(&self) -> bool {
        self.role.is_administrative() && self.admin_role.is_some()
    }
}

// ============================================================================
// User
// ============================================================================

/// 存储中的用户记录（仅包含与授权相关的字段）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户 ID
    pub id: String,
    /// 邮箱
    pub email: String,
    /// 名称
    pub name: String,
    /// 粗粒度角色
    pub role: Role,
    /// 管理员角色
    #[serde(default)]
    pub admin_role: Option<AdminRole>,
    /// 显式权限
    #[serde(default)]
    pub permissions: PermissionSet,
    /// 邮箱是否已验证
    #[serde(default)]
    pub email_verified: bool,
    /// 手机是否已验证
    #[serde(default)]
    pub phone_verified: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// 创建新用户
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            role,
            admin_role: None,
            permissions: PermissionSet::new(),
            email_verified: false,
            phone_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 创建管理员用户
    pub fn admin(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        admin_role: AdminRole,
    ) -> Self {
        let mut user = Self::new(id, email, name, Role::Admin);
        user.admin_role = Some(admin_role);
        user
    }

    /// 设置显式权限
    pub fn with_permissions(
        mut self,
        permissions: impl IntoIterator<Item = super::Permission>,
    ) -> Self {
        self.permissions = PermissionSet::from_permissions(permissions);
        self
    }

    /// 取出授权三元组
    pub fn access_profile(&self) -> AccessProfile {
        AccessProfile {
            role: self.role,
            admin_role: self.admin_role,
            explicit_permissions: self.permissions.clone(),
        }
    }
}

// ============================================================================
// Subject
// ============================================================================

/// 已认证主体
///
/// 内置超级管理员没有存储记录，用独立变体表示，避免散落的字符串 ID 比较。
#[derive(Debug, Clone)]
pub enum Subject {
    /// 存储中的用户
    Stored(User),
    /// 内置超级管理员
    BuiltinSuperAdmin,
}

impl Subject {
    /// 主体 ID
    pub fn id(&self) -> &str {
        match self {
            Subject::Stored(user) => &user.id,
            Subject::BuiltinSuperAdmin => BUILTIN_ADMIN_ID,
        }
    }

    /// 主体邮箱
    pub fn email(&self) -> &str {
        match self {
            Subject::Stored(user) => &user.email,
            Subject::BuiltinSuperAdmin => BUILTIN_ADMIN_EMAIL,
        }
    }

    /// 粗粒度角色
    pub fn role(&self) -> Role {
        match self {
            Subject::Stored(user) => user.role,
            Subject::BuiltinSuperAdmin => Role::Admin,
        }
    }

    /// 管理员角色
    pub fn admin_role(&self) -> Option<AdminRole> {
        match self {
            Subject::Stored(user) => user.admin_role,
            Subject::BuiltinSuperAdmin => Some(AdminRole::SuperAdmin),
        }
    }

    /// 是否为内置超级管理员
    pub fn is_builtin(&self) -> bool {
        matches!(self, Subject::BuiltinSuperAdmin)
    }

    /// 授权三元组
    ///
    /// 内置超级管理员持有整个权限目录。
    pub fn access_profile(&self) -> AccessProfile {
        match self {
            Subject::Stored(user) => user.access_profile(),
            Subject::BuiltinSuperAdmin => AccessProfile {
                role: Role::Admin,
                admin_role: Some(AdminRole::SuperAdmin),
                explicit_permissions: PermissionSet::full(),
            },
        }
    }

    /// 存储中的用户记录
    pub fn as_user(&self) -> Option<&User> {
        match self {
            Subject::Stored(user) => Some(user),
            Subject::BuiltinSuperAdmin => None,
        }
    }
}

impl From<User> for Subject {
    fn from(user: User) -> Self {
        Subject::Stored(user)
    }
}
