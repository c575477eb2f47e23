//! 节点图编排：拓扑排序、四阶段调度和依赖有序的清理

pub mod cleanup_stack;
pub mod frame_counter;
pub mod node_graph;
pub mod topology;
