//! 节点可以访问的外部协作者：键控缓存和内存预算
//!
//! 由图在构建时创建、随图一起销毁，通过上下文注入给节点

pub mod budget;
pub mod cache;

use crate::resource::native::NativeHandle;
use crate::services::budget::ResourceBudgetManager;
use crate::services::cache::KeyedCache;

/// 图持有的服务集合
///
/// 缓存中的句柄仍归写入它的节点所有，由节点决定何时 `invalidate` 并销毁
#[derive(Debug, Default)]
pub struct GraphServices {
    pub cache: KeyedCache<u64, NativeHandle>,
    pub budget: ResourceBudgetManager,
}

impl GraphServices {
    pub fn new(budget: ResourceBudgetManager) -> Self {
        Self {
            cache: KeyedCache::new(),
            budget,
        }
    }
}
