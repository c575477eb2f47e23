//! 节点实例及其四阶段生命周期

pub mod behavior;
pub mod context;
pub mod hooks;
pub mod instance;
pub mod state;
