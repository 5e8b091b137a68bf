//! Authentication module for the attendance server
//!
//! This module handles token issuance and rotation, session extraction,
//! role gating and login rate limiting.

pub mod handlers;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod roles;
pub mod service;
pub mod tokens;

pub use middleware::Authenticated;
pub use rate_limit::{RateLimiter, RateLimitConfig};
pub use roles::{Identity, RoleGate, ANY_ROLE, STUDENT_ONLY, TEACHER_ONLY};
pub use service::{AuthService, LoginOutcome, NewUser};
pub use tokens::{Claims, TokenConfig, TokenError, TokenKind, TokenPair, TokenService};
