//! 配置模块
//!
//! [`AuthzConfig`] 汇总令牌验证与守卫行为的配置，可以通过 `with_*` 方法构建，
//! 也可以从环境变量或 JSON 加载。
//!
//! | 环境变量 | 字段 |
//! |----------|------|
//! | `JWT_SECRET` | `jwt_secret`（必需） |
//! | `JWT_ISSUER` | `jwt_issuer` |
//! | `JWT_LEEWAY_SECS` | `jwt_leeway_secs` |
//! | `AUTHZ_BUILTIN_ADMIN` | `builtin_admin_enabled`（`true`/`false`） |
//! | `AUTHZ_UNDECLARED_POLICY` | `undeclared_policy`（`allow`/`deny`） |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, Error, Result};
use crate::token::{TokenVerifier, TokenVerifierConfig};

/// JWT 密钥的最小长度（字节）
pub const MIN_SECRET_LENGTH: usize = 32;

/// 没有声明权限要求的操作如何处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndeclaredPolicy {
    /// 直接放行
    #[default]
    Allow,
    /// 拒绝，需要显式声明
    Deny,
}

impl fmt::Display for UndeclaredPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndeclaredPolicy::Allow => write!(f, "allow"),
            UndeclaredPolicy::Deny => write!(f, "deny"),
        }
    }
}

impl FromStr for UndeclaredPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(UndeclaredPolicy::Allow),
            "deny" => Ok(UndeclaredPolicy::Deny),
            other => Err(invalid("AUTHZ_UNDECLARED_POLICY", format!(
                "expected 'allow' or 'deny', got '{}'",
                other
            ))),
        }
    }
}

/// 授权配置
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// JWT 签名密钥
    pub jwt_secret: String,
    /// 期望的签发者
    pub jwt_issuer: Option<String>,
    /// 允许的时钟偏差（秒）
    pub jwt_leeway_secs: u64,
    /// 是否启用内置超级管理员身份
    pub builtin_admin_enabled: bool,
    /// 未声明权限要求时的处理方式
    pub undeclared_policy: UndeclaredPolicy,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: None,
            jwt_leeway_secs: 0,
            builtin_admin_enabled: true,
            undeclared_policy: UndeclaredPolicy::Allow,
        }
    }
}

impl fmt::Debug for AuthzConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthzConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("builtin_admin_enabled", &self.builtin_admin_enabled)
            .field("undeclared_policy", &self.undeclared_policy)
            .finish()
    }
}

impl AuthzConfig {
    /// 使用密钥创建配置
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ..Default::default()
        }
    }

    /// 设置签发者
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.jwt_issuer = Some(issuer.into());
        self
    }

    /// 设置时钟偏差
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.jwt_leeway_secs = secs;
        self
    }

    /// 启用或禁用内置超级管理员
    pub fn with_builtin_admin(mut self, enabled: bool) -> Self {
        self.builtin_admin_enabled = enabled;
        self
    }

    /// 设置未声明操作的处理方式
    pub fn with_undeclared_policy(mut self, policy: UndeclaredPolicy) -> Self {
        self.undeclared_policy = policy;
        self
    }

    /// 从环境变量加载
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过查找函数加载
    ///
    /// 便于测试时注入变量而不修改进程环境。
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .ok_or_else(|| Error::Config(ConfigError::MissingRequired("JWT_SECRET".into())))?;

        let mut config = Self::new(jwt_secret);

        if let Some(issuer) = lookup("JWT_ISSUER").filter(|s| !s.trim().is_empty()) {
            config.jwt_issuer = Some(issuer);
        }

        if let Some(raw) = lookup("JWT_LEEWAY_SECS") {
            config.jwt_leeway_secs = raw
                .trim()
                .parse()
                .map_err(|e| invalid("JWT_LEEWAY_SECS", format!("{}", e)))?;
        }

        if let Some(raw) = lookup("AUTHZ_BUILTIN_ADMIN") {
            config.builtin_admin_enabled = parse_bool("AUTHZ_BUILTIN_ADMIN", &raw)?;
        }

        if let Some(raw) = lookup("AUTHZ_UNDECLARED_POLICY") {
            config.undeclared_policy = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 加载
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(Error::Config(ConfigError::MissingRequired(
                "JWT_SECRET".into(),
            )));
        }
        if self.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(invalid(
                "JWT_SECRET",
                format!("must be at least {} bytes", MIN_SECRET_LENGTH),
            ));
        }
        Ok(())
    }

    /// 根据配置创建令牌验证器
    pub fn token_verifier(&self) -> TokenVerifier {
        let mut config = TokenVerifierConfig::new().with_leeway(self.jwt_leeway_secs);
        if let Some(ref issuer) = self.jwt_issuer {
            config = config.with_issuer(issuer.clone());
        }
        TokenVerifier::with_config(self.jwt_secret.as_bytes(), config)
    }
}

fn invalid(key: &str, message: impl Into<String>) -> Error {
    Error::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(key, format!("expected a boolean, got '{}'", other))),
    }
}
