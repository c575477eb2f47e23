//! 节点类型的 schema：槽位、参数、注册表和静态类型配置

pub mod node_type;
pub mod param;
pub mod registry;
pub mod slot;
pub mod typed;
