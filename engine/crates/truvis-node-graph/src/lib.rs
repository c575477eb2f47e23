//! Truvis 节点图
//!
//! 节点通过带类型的槽位交换原生资源句柄，图负责：
//! - 连线时检查资源类型和生命周期是否兼容
//! - 按依赖顺序 Setup / Compile，每帧按相同顺序 Execute
//! - 通过 [`graph::cleanup_stack::CleanupStack`] 以相反的依赖顺序销毁资源，每个节点最多一次
//!
//! 节点类型既可以用 [`schema::node_type::NodeType`] 动态注册槽位，
//! 也可以用 [`node_config!`] 声明静态类型的配置，两条路径走同一套连线规则。
//!
//! [`headless`] 提供一个不接触 GPU 的假设备和 Device/CommandPool/Buffer/Swapchain 节点，
//! 用于演示和测试。

pub mod config;
pub mod error;
pub mod graph;
pub mod handles;
pub mod headless;
pub mod node;
pub mod resource;
pub mod schema;
pub mod services;


pub use config::GraphConfig;
pub use error::{NativeError, NodeError, NodeGraphError, NodeGraphResult, NodeResult};
pub use graph::frame_counter::{FrameContext, FrameCounter};
pub use graph::node_graph::{NodeGraph, RecompileReport};
pub use handles::{NodeHandle, ResourceHandle};
pub use node::behavior::NodeBehavior;
pub use node::context::{CleanupContext, CompileContext, ExecuteContext, SetupContext};
