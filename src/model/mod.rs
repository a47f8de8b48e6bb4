//! 数据模型

pub mod config;
pub mod feedback;
pub mod friend_link;
pub mod setting;
pub mod tool;
pub mod user;

use serde::{Deserialize, Serialize};

/// 分页查询参数
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// 返回 (page, page_size)，page 从 1 开始，page_size 限制在 1..=100
    pub fn resolve(self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        (page, page_size)
    }

    pub fn offset(self) -> u64 {
        let (page, page_size) = self.resolve();
        u64::from(page - 1) * u64::from(page_size)
    }
}

/// 分页响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// 对内存中的完整列表分页
    pub fn slice(all: Vec<T>, pagination: Pagination) -> Self {
        let (page, page_size) = pagination.resolve();
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(page_size as usize)
            .collect();
        Self {
            total,
            page,
            page_size,
            items,
        }
    }
}
