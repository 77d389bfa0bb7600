//! 统一错误类型模块
//!
//! 提供 marketplace-authz 中所有操作的错误类型定义。
//!
//! 身份失败（`Unauthenticated`）与权限不足（`Forbidden`）是两个不同的变体，
//! 调用方可以据此区分"未登录"和"已登录但权限不足"。

use std::fmt;

/// marketplace-authz 的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// marketplace-authz 的错误类型
#[derive(Debug)]
pub enum Error {
    /// 访问控制拒绝
    Access(AccessError),

    /// Token 相关错误
    Token(TokenError),

    /// 验证错误
    Validation(ValidationError),

    /// 配置错误
    Config(ConfigError),

    /// 存储错误
    Storage(StorageError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个未认证错误
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Error::Access(AccessError::Unauthenticated(reason.into()))
    }

    /// 创建一个权限不足错误
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Error::Access(AccessError::Forbidden(reason.into()))
    }

    /// 创建一个验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(ValidationError::Custom(msg.into()))
    }

    /// 创建一个记录未找到错误
    pub fn not_found(item: impl Into<String>) -> Self {
        Error::Storage(StorageError::NotFound(item.into()))
    }

    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 是否为未认证错误
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Access(AccessError::Unauthenticated(_)))
    }

    /// 是否为权限不足错误
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Error::Access(AccessError::Forbidden(_)))
    }

    /// 是否为记录未找到错误
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(StorageError::NotFound(_)))
    }

    /// 映射到 HTTP 状态码，供 Web 层使用
    ///
    /// | 错误 | 状态码 |
    /// |------|--------|
    /// | `Unauthenticated` / `Token` | 401 |
    /// | `Forbidden` | 403 |
    /// | `Validation` | 400 |
    /// | `Storage::NotFound` | 404 |
    /// | 其他 | 500 |
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Access(AccessError::Unauthenticated(_)) | Error::Token(_) => 401,
            Error::Access(AccessError::Forbidden(_)) => 403,
            Error::Validation(_) => 400,
            Error::Storage(StorageError::NotFound(_)) => 404,
            Error::Storage(_) | Error::Config(_) | Error::Internal(_) => 500,
        }
    }
}

/// 访问控制错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// 无法建立有效身份
    Unauthenticated(String),
    /// 身份有效但权限不足
    Forbidden(String),
}

/// Token 相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token 已过期
    Expired,
    /// Token 格式无效
    InvalidFormat(String),
    /// Token 签名无效
    InvalidSignature,
    /// Token 编码失败
    EncodingFailed(String),
    /// Token 解码失败
    DecodingFailed(String),
    /// 无效的 claim 值
    InvalidClaim(String),
}

/// 验证相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 未知的权限名称
    UnknownPermission(String),
    /// 未知的角色名称
    UnknownRole(String),
    /// 未知的管理员角色名称
    UnknownAdminRole(String),
    /// 权限要求为空
    EmptyRequirement,
    /// 目标用户状态不满足操作前提
    InvalidTarget(String),
    /// 自定义验证错误
    Custom(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 记录未找到
    NotFound(String),
    /// 记录已存在
    AlreadyExists(String),
    /// 操作失败
    OperationFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Access(e) => write!(f, "Access denied: {}", e),
            Error::Token(e) => write!(f, "Token error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::Unauthenticated(reason) => write!(f, "unauthenticated: {}", reason),
            AccessError::Forbidden(reason) => write!(f, "forbidden: {}", reason),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Expired => write!(f, "token has expired"),
            TokenError::InvalidFormat(msg) => write!(f, "invalid token format: {}", msg),
            TokenError::InvalidSignature => write!(f, "invalid token signature"),
            TokenError::EncodingFailed(msg) => write!(f, "token encoding failed: {}", msg),
            TokenError::DecodingFailed(msg) => write!(f, "token decoding failed: {}", msg),
            TokenError::InvalidClaim(msg) => write!(f, "invalid claim value: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownPermission(name) => write!(f, "unknown permission: {}", name),
            ValidationError::UnknownRole(name) => write!(f, "unknown role: {}", name),
            ValidationError::UnknownAdminRole(name) => {
                write!(f, "unknown admin role: {}", name)
            }
            ValidationError::EmptyRequirement => {
                write!(f, "a requirement must list at least one permission")
            }
            ValidationError::InvalidTarget(msg) => write!(f, "invalid target: {}", msg),
            ValidationError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => {
                write!(f, "missing required configuration: {}", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::AlreadyExists(item) => write!(f, "already exists: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Access(e) => Some(e),
            Error::Token(e) => Some(e),
            Error::Validation(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::Internal(_) => None,
        }
    }
}

impl std::error::Error for AccessError {}
impl std::error::Error for TokenError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

// ============================================================================
// From 实现
// ============================================================================

impl From<AccessError> for Error {
    fn from(err: AccessError) -> Self {
        Error::Access(err)
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::Custom(format!("invalid JSON: {}", err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_error_display() {
        let err = Error::forbidden("insufficient permissions");
        assert_eq!(
            err.to_string(),
            "Access denied: forbidden: insufficient permissions"
        );
    }

    #[test]
    fn test_unauthenticated_and_forbidden_are_distinct() {
        let unauthenticated = Error::unauthenticated("access token not found");
        let forbidden = Error::forbidden("nope");

        assert!(unauthenticated.is_unauthenticated());
        assert!(!unauthenticated.is_forbidden());
        assert!(forbidden.is_forbidden());
        assert!(!forbidden.is_unauthenticated());
        assert_ne!(unauthenticated.status_code(), forbidden.status_code());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::unauthenticated("x").status_code(), 401);
        assert_eq!(Error::Token(TokenError::Expired).status_code(), 401);
        assert_eq!(Error::forbidden("x").status_code(), 403);
        assert_eq!(Error::validation("x").status_code(), 400);
        assert_eq!(Error::not_found("user u1").status_code(), 404);
        assert_eq!(Error::internal("x").status_code(), 500);
    }

    #[test]
    fn test_error_from_token() {
        let err: Error = TokenError::InvalidSignature.into();
        assert!(matches!(err, Error::Token(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::UnknownPermission("FLY".to_string());
        assert_eq!(err.to_string(), "unknown permission: FLY");
    }
}
