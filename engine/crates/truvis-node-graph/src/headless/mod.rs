//! 不依赖 GPU 的假设备和参考节点
//!
//! 假设备记录每一次创建和销毁，用于验证资源的销毁顺序和次数，
//! 也是 `headless_frames` 示例的后端

pub mod device;
pub mod nodes;
