//! # RBAC（基于角色的访问控制）模块
//!
//! 市场后台的两层授权模型：
//!
//! - **Role（粗粒度角色）**: 普通用户（投资者、项目方）与管理员
//! - **AdminRole（管理员角色）**: 五种管理员角色，每种对应固定的默认权限集合
//! - **显式权限**: 在管理员角色默认集合之外单独授予的权限
//!
//! 有效权限 = 管理员角色默认权限 ∪ 显式权限，非管理类主体恒为空集。
//!
//! ## 基本权限检查
//!
//! ```rust
//! use marketplace_authz::rbac::{AccessProfile, AdminRole, Permission, PermissionResolver, Role};
//!
//! let resolver = PermissionResolver::standard();
//!
//! let manager = AccessProfile::admin(AdminRole::UserManager);
//! assert!(resolver.has_permission(&manager, Permission::ManageUsers));
//! assert!(!resolver.has_permission(&manager, Permission::ManageBusinesses));
//!
//! // 非管理类主体的显式权限不生效
//! let investor = AccessProfile::new(Role::Investor).with_permission(Permission::ManageUsers);
//! assert!(!resolver.has_permission(&investor, Permission::ManageUsers));
//! ```
//!
//! ## 委派
//!
//! ```rust
//! use marketplace_authz::rbac::{AccessProfile, AdminRole, Permission, PermissionResolver};
//!
//! let resolver = PermissionResolver::standard();
//! let moderator = AccessProfile::admin(AdminRole::ContentModerator)
//!     .with_permission(Permission::AssignAdminRoles);
//!
//! assert!(!resolver.can_assign_role(&moderator, AdminRole::SuperAdmin));
//! assert!(resolver.can_assign_role(&moderator, AdminRole::ReadOnlyAdmin));
//! assert!(!resolver.can_grant_permission(&moderator, Permission::ManageUsers));
//! ```

mod permission;
mod requirement;
mod resolver;
mod role;
mod subject;

pub use permission::{Permission, PermissionSet};
pub use requirement::{Combinator, Requirement, RequirementBuilder, RequirementTable};
pub use resolver::PermissionResolver;
pub use role::{AdminRole, Role, RoleCatalog, RoleCatalogBuilder};
pub use subject::{
    AccessProfile, BUILTIN_ADMIN_EMAIL, BUILTIN_ADMIN_ID, BUILTIN_ADMIN_NAME, Subject, User,
};
