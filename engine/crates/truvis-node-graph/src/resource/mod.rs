//! Resource：一个原生句柄 + 描述 + 生命周期标记

pub mod description;
pub mod native;
pub mod pool;
#[allow(clippy::module_inception)]
pub mod resource;
pub mod types;

use slotmap::SlotMap;

use crate::handles::ResourceHandle;

/// 图持有的全部 Resource
pub type ResourceArena = SlotMap<ResourceHandle, resource::Resource>;
