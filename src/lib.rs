//! 爱奇吉工具箱后端
//!
//! 工具导航目录、友链申请与审核、用户反馈以及管理后台 REST API。

pub mod admin;
pub mod auth;
pub mod avatar;
pub mod common;
pub mod db;
pub mod error;
pub mod http_client;
pub mod icon;
pub mod maintenance;
pub mod model;
pub mod notification;
pub mod public;
pub mod search;
pub mod seed;
pub mod seo;
pub mod server;
pub mod state;
