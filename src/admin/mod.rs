//! 管理后台 API
//!
//! 工具、用户、设置、友链、反馈、邮件配置与模板的管理端点，全部需要管理员权限。

mod handlers;
mod router;
pub mod service;
pub mod types;

pub use router::create_admin_router;
