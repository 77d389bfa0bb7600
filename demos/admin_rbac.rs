//! 后台权限管理示例
//!
//! 展示权限解析、授权守卫和管理员角色服务的完整流程。
//!
//! 运行: RUST_LOG=marketplace_authz=debug cargo run --example admin_rbac

use std::sync::Arc;

use marketplace_authz::admin::AdminRoleService;
use marketplace_authz::audit::{AuditLogger, InMemoryAuditLogger, TracingAuditLogger};
use marketplace_authz::config::AuthzConfig;
use marketplace_authz::guard::AccessGuard;
use marketplace_authz::rbac::{
    AccessProfile, AdminRole, BUILTIN_ADMIN_ID, Permission, PermissionResolver, RequirementTable,
    Role, Subject, User,
};
use marketplace_authz::store::{InMemoryUserStore, UserStore};
use marketplace_authz::token::TokenIssuer;

/// 同时写入内存和 tracing 的审计记录器
struct DemoAuditLogger {
    memory: InMemoryAuditLogger,
    tracing: TracingAuditLogger,
}

impl AuditLogger for DemoAuditLogger {
    fn log(&self, event: marketplace_authz::audit::SecurityEvent) {
        self.tracing.log(event.clone());
        self.memory.log(event);
    }
}

/// 演示权限解析
fn demo_resolver(resolver: &PermissionResolver) {
    println!("📚 权限解析\n");

    let manager = AccessProfile::admin(AdminRole::UserManager);
    println!("   用户管理员（无显式权限）");
    println!(
        "   - MANAGE_USERS: {}",
        bool_emoji(resolver.has_permission(&manager, Permission::ManageUsers))
    );
    println!(
        "   - MANAGE_BUSINESSES: {}",
        bool_emoji(resolver.has_permission(&manager, Permission::ManageBusinesses))
    );

    let manager = manager.with_permission(Permission::ManageBusinesses);
    println!("   用户管理员（显式授予 MANAGE_BUSINESSES）");
    println!(
        "   - MANAGE_BUSINESSES: {}",
        bool_emoji(resolver.has_permission(&manager, Permission::ManageBusinesses))
    );

    let investor = AccessProfile::new(Role::Investor).with_permission(Permission::ManageUsers);
    println!("   投资者（数据中残留 MANAGE_USERS）");
    println!(
        "   - MANAGE_USERS: {}",
        bool_emoji(resolver.has_permission(&investor, Permission::ManageUsers))
    );

    let moderator = AccessProfile::admin(AdminRole::ContentModerator)
        .with_permission(Permission::AssignAdminRoles);
    println!(
        "   内容审核员可分配的角色: {:?}",
        resolver.get_assignable_roles(&moderator)
    );
    println!();
}

/// 演示授权守卫
async fn demo_guard(guard: &AccessGuard, issuer: &TokenIssuer) {
    println!("🛡️  授权守卫\n");

    let cases = [
        (None, "admin.businesses.verify"),
        (Some(("mod-1", Role::Admin)), "admin.businesses.verify"),
        (Some(("mod-1", Role::Admin)), "admin.roles.revoke_admin"),
        (Some(("owner-1", Role::ProjectOwner)), "admin.dashboard"),
        (Some((BUILTIN_ADMIN_ID, Role::Admin)), "admin.activity_logs.cleanup"),
    ];

    for (identity, operation) in cases {
        let header = match identity {
            Some((id, role)) => match issuer.issue(id, role) {
                Ok(token) => Some(format!("Bearer {}", token)),
                Err(e) => {
                    println!("   ❌ 签发令牌失败: {}", e);
                    continue;
                }
            },
            None => None,
        };

        let who = identity.map(|(id, _)| id).unwrap_or("匿名");
        match guard.authorize(header.as_deref(), operation).await {
            Ok(request) => println!(
                "   ✅ {} -> {} ({})",
                who, operation, request.decision.reason
            ),
            Err(e) => println!("   ❌ {} -> {} [{}] {}", who, operation, e.status_code(), e),
        }
    }
    println!();
}

/// 演示管理员角色服务
async fn demo_admin_service(service: &AdminRoleService, store: &InMemoryUserStore) {
    println!("👥 管理员角色服务\n");

    let root = Subject::BuiltinSuperAdmin;

    match service
        .promote_to_admin(&root, "owner-1", AdminRole::ReadOnlyAdmin)
        .await
    {
        Ok(user) => println!("   ✅ 提升 owner-1 为 {:?}", user.admin_role),
        Err(e) => println!("   ❌ 提升失败: {}", e),
    }

    let moderator: Subject = match store.find_by_id("mod-1").await {
        Ok(Some(user)) => user.into(),
        _ => {
            println!("   ❌ 找不到 mod-1");
            return;
        }
    };

    match service
        .update_user_permissions(
            &moderator,
            "owner-1",
            [Permission::VerifyBusinesses, Permission::ManageUsers].into(),
        )
        .await
    {
        Ok(_) => println!("   ✅ mod-1 授予了 MANAGE_USERS"),
        Err(e) => println!("   ❌ mod-1 越权授予被拒绝: {}", e),
    }

    match service
        .update_user_permissions(&moderator, "owner-1", [Permission::VerifyBusinesses].into())
        .await
    {
        Ok(user) => println!("   ✅ owner-1 的显式权限: {:?}", user.permissions.to_string_list()),
        Err(e) => println!("   ❌ 更新失败: {}", e),
    }

    match service
        .update_user_role(&root, "owner-1", AdminRole::InvestmentModerator)
        .await
    {
        Ok(user) => println!(
            "   ✅ owner-1 改为 {:?}，显式权限数量: {}",
            user.admin_role,
            user.permissions.len()
        ),
        Err(e) => println!("   ❌ 更换角色失败: {}", e),
    }

    match service.revoke_admin_access(&root, "owner-1").await {
        Ok(user) => println!("   ✅ 撤销 owner-1，当前角色: {}", user.role),
        Err(e) => println!("   ❌ 撤销失败: {}", e),
    }
    println!();
}

fn bool_emoji(value: bool) -> &'static str {
    if value { "✅" } else { "❌" }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    println!("=== 后台权限管理示例 ===\n");

    let config = AuthzConfig::new("demo-secret-key-that-is-at-least-32-bytes");
    if let Err(e) = config.validate() {
        println!("❌ 配置无效: {}", e);
        return;
    }

    let store = Arc::new(InMemoryUserStore::with_users([
        User::admin("mod-1", "mod@example.com", "Moderator", AdminRole::ContentModerator)
            .with_permissions([Permission::AssignAdminRoles]),
        User::new("owner-1", "owner@example.com", "Owner", Role::ProjectOwner),
    ]));
    let memory = InMemoryAuditLogger::new();
    let audit: Arc<dyn AuditLogger> = Arc::new(DemoAuditLogger {
        memory: memory.clone(),
        tracing: TracingAuditLogger::new(),
    });

    let resolver = PermissionResolver::standard();
    let guard = AccessGuard::from_config(
        &config,
        resolver.clone(),
        RequirementTable::marketplace(),
        store.clone(),
    )
    .with_audit_logger(audit.clone());
    let service = AdminRoleService::new(resolver.clone(), store.clone()).with_audit_logger(audit);
    let issuer = TokenIssuer::new(config.jwt_secret.as_bytes());

    demo_resolver(&resolver);
    println!("{}\n", "=".repeat(50));

    demo_guard(&guard, &issuer).await;
    println!("{}\n", "=".repeat(50));

    demo_admin_service(&service, &store).await;
    println!("{}\n", "=".repeat(50));

    println!("📝 审计事件 ({} 条)", memory.event_count());
    for event in memory.get_events() {
        println!(
            "   - {} user={} actor={}",
            event.event_name(),
            event.user_id.as_deref().unwrap_or("-"),
            event.actor_id.as_deref().unwrap_or("-")
        );
    }

    println!("\n=== 示例结束 ===");
}
