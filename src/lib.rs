//! # marketplace-authz
//!
//! 商业项目交易市场后台的两层授权引擎。
//!
//! ## 功能特性
//!
//! - **权限目录**: 封闭的细粒度权限枚举
//! - **角色目录**: 五种管理员角色及其默认权限，作为不可变配置注入
//! - **权限解析器**: 计算有效权限，回答单个/任一/全部查询与委派查询
//! - **权限要求绑定**: 显式的操作到权限要求映射表，最内层作用域生效
//! - **授权守卫**: 身份守卫（401）与权限守卫（403）
//! - **管理员服务**: 角色更换、权限更新、提升与撤销管理员
//! - **审计日志**: 授权决策与授权变更事件
//!
//! ## 权限解析示例
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
//! // 空列表：任一为假，全部为真
//! assert!(!resolver.has_any_permission(&manager, &[]));
//! assert!(resolver.has_all_permissions(&manager, &[]));
//!
//! // 非管理类主体没有任何权限
//! let investor = AccessProfile::new(Role::Investor).with_permission(Permission::ManageUsers);
//! assert!(resolver.get_all_user_permissions(&investor).is_empty());
//! ```
//!
//! ## 权限要求绑定示例
//!
//! ```rust
//! use marketplace_authz::rbac::{Combinator, Permission, Requirement, RequirementTable};
//!
//! let table = RequirementTable::new()
//!     .with("admin.investment_requests", Requirement::investment_view())
//!     .with("admin.investment_requests.process", Requirement::full_investment_access());
//!
//! let process = table.resolve("admin.investment_requests.process").unwrap();
//! assert_eq!(process.combinator(), Combinator::All);
//!
//! let list = table.resolve("admin.investment_requests.list").unwrap();
//! assert_eq!(list.permissions(), &[Permission::ViewInvestmentRequests]);
//! ```

pub mod admin;
pub mod audit;
pub mod config;
pub mod error;
pub mod guard;
pub mod random;
pub mod rbac;
pub mod store;
pub mod token;

pub use error::{Error, Result};

// ============================================================================
// RBAC 相关导出
// ============================================================================

pub use rbac::{
    AccessProfile, AdminRole, Combinator, Permission, PermissionResolver, PermissionSet,
    Requirement, RequirementTable, Role, RoleCatalog, Subject, User,
};

// ============================================================================
// 守卫与服务导出
// ============================================================================

pub use admin::{AdminRoleService, AdminUserView, UserPermissionsView};
pub use config::{AuthzConfig, UndeclaredPolicy};
pub use guard::{
    AccessDecision, AccessGuard, AuthorizedRequest, DecisionReason, DeniedRequest, GuardState,
    IdentityGuard, PermissionGuard,
};
pub use store::{AuthorizationUpdate, InMemoryUserStore, UserStore};

// ============================================================================
// Token 相关导出
// ============================================================================

pub use token::{AccessClaims, TokenIssuer, TokenVerifier};
