//! 公开 API（无需登录）

pub mod handlers;
mod router;

pub use router::create_public_router;
