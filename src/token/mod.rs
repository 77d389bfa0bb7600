//! Token 模块
//!
//! 访问令牌由登录流程签发，身份守卫在每次请求时验证。
//!
//! ## 子模块
//!
//! - **jwt**: 访问令牌的签发与验证

pub mod jwt;

pub use jwt::{
    AccessClaims, DEFAULT_TOKEN_LIFETIME_DAYS, TokenIssuer, TokenVerifier, TokenVerifierConfig,
};
