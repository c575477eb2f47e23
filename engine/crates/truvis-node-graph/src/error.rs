//! 节点图的错误类型
//!
//! - [`NodeGraphError`]：图构建、连线、编译、执行阶段返回给调用者的错误，
//!   涉及具体节点的错误都带上实例名和槽位/参数名
//! - [`NativeError`]：节点内部调用原生图形 API 失败
//! - [`NodeError`]：节点行为实现返回的错误，图负责补上阶段和实例名

use std::fmt;

use ash::vk;

use crate::handles::NodeHandle;
use crate::node::state::NodeState;
use crate::resource::types::{ResourceLifetime, ResourceType};
use crate::schema::param::ParamKind;

/// 节点生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePhase {
    Setup,
    Compile,
    Execute,
    Cleanup,
}

impl fmt::Display for NodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodePhase::Setup => "Setup",
            NodePhase::Compile => "Compile",
            NodePhase::Execute => "Execute",
            NodePhase::Cleanup => "Cleanup",
        };
        f.write_str(name)
    }
}

/// 槽位方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotDirection {
    Input,
    Output,
}

impl fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotDirection::Input => f.write_str("input"),
            SlotDirection::Output => f.write_str("output"),
        }
    }
}

/// 原生图形 API 的失败
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    #[error("{operation} failed: {reason}")]
    CreationFailed { operation: String, reason: String },

    #[error("Vk error: {0}")]
    Vk(vk::Result),

    #[error("device lost")]
    DeviceLost,

    #[error("surface out of date")]
    OutOfDate,

    #[error("wait timed out after {0} ns")]
    Timeout(u64),

    #[error("handle {raw:#x} ({kind}) destroyed twice")]
    DoubleDestroy { kind: &'static str, raw: u64 },

    #[error("handle {raw:#x} ({kind}) used after its device was destroyed")]
    UseAfterDestroy { kind: &'static str, raw: u64 },

    #[error("pool exhausted: all {capacity} entries are in use")]
    PoolExhausted { capacity: usize },
}

impl NativeError {
    pub fn creation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

impl From<vk::Result> for NativeError {
    fn from(value: vk::Result) -> Self {
        match value {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_OUT_OF_DATE_KHR => Self::OutOfDate,
            other => Self::Vk(other),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum NodeGraphError {
    // ---------------- 配置错误 ----------------
    #[error("[{phase}] node '{instance}': required input slot '{slot}' is not connected at index {index}")]
    MissingInput {
        phase: NodePhase,
        instance: String,
        slot: String,
        index: usize,
    },

    #[error("[{phase}] node '{instance}': input slot '{slot}'[{index}] holds a null resource")]
    NullInput {
        phase: NodePhase,
        instance: String,
        slot: String,
        index: usize,
    },

    #[error("[{phase}] node '{instance}': required parameter '{parameter}' is missing")]
    MissingParameter {
        phase: NodePhase,
        instance: String,
        parameter: String,
    },

    #[error("[{phase}] node '{instance}': parameter '{parameter}' expects {expected:?}, got {actual:?}")]
    ParameterTypeMismatch {
        phase: NodePhase,
        instance: String,
        parameter: String,
        expected: ParamKind,
        actual: ParamKind,
    },

    #[error("node type '{type_name}': parameter '{parameter}' is registered twice")]
    DuplicateParameter { type_name: String, parameter: String },

    #[error("node type '{type_name}': {direction} slot '{slot}' is registered twice")]
    DuplicateSlot {
        type_name: String,
        direction: SlotDirection,
        slot: String,
    },

    #[error("node type name must not be empty")]
    EmptyTypeName,

    #[error("node type '{type_name}': {direction} slot '{slot}' declared at index {declared}, expected {expected}")]
    SlotCountMismatch {
        type_name: String,
        direction: SlotDirection,
        slot: String,
        declared: usize,
        expected: usize,
    },

    #[error("node type '{type_name}' is already registered")]
    DuplicateNodeType { type_name: String },

    #[error("node type '{type_name}' is not registered")]
    UnknownNodeType { type_name: String },

    #[error("node instance '{instance}' already exists")]
    DuplicateInstance { instance: String },

    #[error("node type '{type_name}' allows at most {max} instances")]
    MaxInstancesReached { type_name: String, max: u32 },

    #[error("[{phase}] node '{instance}': output slot '{slot}'[{index}] was not populated")]
    OutputNotPopulated {
        phase: NodePhase,
        instance: String,
        slot: String,
        index: usize,
    },

    #[error("[{phase}] node '{instance}': output slot '{slot}'[{index}] already holds a live handle")]
    HandleAlreadyLive {
        phase: NodePhase,
        instance: String,
        slot: String,
        index: usize,
    },

    #[error("[{phase}] node '{instance}': output slot '{slot}' is {expected:?}, got a {actual} handle or description")]
    ResourceKindMismatch {
        phase: NodePhase,
        instance: String,
        slot: String,
        expected: ResourceType,
        actual: String,
    },

    #[error("[{phase}] node '{instance}': slot '{slot}' is read-only")]
    ReadOnlySlot {
        phase: NodePhase,
        instance: String,
        slot: String,
    },

    #[error("[{phase}] node '{instance}' is {state:?}")]
    InvalidState {
        phase: NodePhase,
        instance: String,
        state: NodeState,
    },

    // ---------------- 连线错误 ----------------
    #[error("node '{instance}': {direction} slot {slot_index} not found")]
    SlotNotFound {
        instance: String,
        direction: SlotDirection,
        slot_index: usize,
    },

    #[error(
        "cannot connect '{producer}.{output_slot}' ({output_type:?}, {output_lifetime:?}) to \
         '{consumer}.{input_slot}' ({input_type:?}, {input_lifetime:?}): type/lifetime incompatible"
    )]
    IncompatibleSlots {
        producer: String,
        output_slot: String,
        output_type: ResourceType,
        output_lifetime: ResourceLifetime,
        consumer: String,
        input_slot: String,
        input_type: ResourceType,
        input_lifetime: ResourceLifetime,
    },

    #[error("node '{instance}': index {index} exceeds the bound {max} of {direction} slot '{slot}'")]
    ArrayBoundExceeded {
        instance: String,
        direction: SlotDirection,
        slot: String,
        index: usize,
        max: usize,
    },

    #[error("node '{instance}' cannot be connected to itself")]
    SelfConnection { instance: String },

    // ---------------- 原生资源错误 ----------------
    #[error("[{phase}] node '{instance}': {source}")]
    Native {
        phase: NodePhase,
        instance: String,
        source: NativeError,
    },

    #[error("[{phase}] node '{instance}': budget '{budget}' rejected {bytes} bytes for slot '{slot}'")]
    BudgetExceeded {
        phase: NodePhase,
        instance: String,
        slot: String,
        budget: String,
        bytes: u64,
    },

    // ---------------- 图状态 ----------------
    #[error("node handle {0:?} does not refer to a live node")]
    InvalidNode(NodeHandle),

    #[error("dependency cycle detected between nodes: {}", .nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    #[error("graph must be compiled before execute")]
    NotCompiled,
}

// getters
impl NodeGraphError {
    /// 出错的节点实例名
    pub fn instance(&self) -> Option<&str> {
        match self {
            Self::MissingInput { instance, .. }
            | Self::NullInput { instance, .. }
            | Self::MissingParameter { instance, .. }
            | Self::ParameterTypeMismatch { instance, .. }
            | Self::DuplicateInstance { instance }
            | Self::OutputNotPopulated { instance, .. }
            | Self::HandleAlreadyLive { instance, .. }
            | Self::ResourceKindMismatch { instance, .. }
            | Self::ReadOnlySlot { instance, .. }
            | Self::InvalidState { instance, .. }
            | Self::SlotNotFound { instance, .. }
            | Self::ArrayBoundExceeded { instance, .. }
            | Self::SelfConnection { instance }
            | Self::Native { instance, .. }
            | Self::BudgetExceeded { instance, .. } => Some(instance),
            Self::IncompatibleSlots { consumer, .. } => Some(consumer),
            _ => None,
        }
    }

    /// 出错的生命周期阶段，连线和注册错误没有阶段
    pub fn phase(&self) -> Option<NodePhase> {
        match self {
            Self::MissingInput { phase, .. }
            | Self::NullInput { phase, .. }
            | Self::MissingParameter { phase, .. }
            | Self::ParameterTypeMismatch { phase, .. }
            | Self::OutputNotPopulated { phase, .. }
            | Self::HandleAlreadyLive { phase, .. }
            | Self::ResourceKindMismatch { phase, .. }
            | Self::ReadOnlySlot { phase, .. }
            | Self::InvalidState { phase, .. }
            | Self::Native { phase, .. }
            | Self::BudgetExceeded { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    #[inline]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::SlotNotFound { .. }
                | Self::IncompatibleSlots { .. }
                | Self::ArrayBoundExceeded { .. }
                | Self::SelfConnection { .. }
        )
    }

    /// 如果是原生 API 错误，返回内部的 [`NativeError`]
    #[inline]
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Self::Native { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type NodeGraphResult<T> = Result<T, NodeGraphError>;

/// 节点行为返回的错误
///
/// 上下文访问失败已经是完整的 [`NodeGraphError`]；原生 API 失败由图补上阶段和实例名
#[derive(thiserror::Error, Debug, Clone)]
pub enum NodeError {
    #[error(transparent)]
    Graph(#[from] NodeGraphError),

    #[error(transparent)]
    Native(#[from] NativeError),
}

impl NodeError {
    pub(crate) fn into_graph_error(self, phase: NodePhase, instance: &str) -> NodeGraphError {
        match self {
            NodeError::Graph(err) => err,
            NodeError::Native(source) => NodeGraphError::Native {
                phase,
                instance: instance.to_string(),
                source,
            },
        }
    }
}

pub type NodeResult<T> = Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_instance_and_slot() {
        let err = NodeGraphError::MissingInput {
            phase: NodePhase::Compile,
            instance: "pool".to_string(),
            slot: "DEVICE".to_string(),
            index: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("pool"));
        assert!(msg.contains("DEVICE"));
        assert!(msg.contains("Compile"));
        assert_eq!(err.instance(), Some("pool"));
        assert_eq!(err.phase(), Some(NodePhase::Compile));
    }

    #[test]
    fn test_native_error_wrapped_with_phase() {
        let err = NodeError::from(NativeError::DeviceLost).into_graph_error(NodePhase::Execute, "swapchain");
        assert_eq!(err.phase(), Some(NodePhase::Execute));
        assert_eq!(err.instance(), Some("swapchain"));
        assert_eq!(err.native(), Some(&NativeError::DeviceLost));
    }

    #[test]
    fn test_vk_result_mapping() {
        assert_eq!(NativeError::from(vk::Result::ERROR_DEVICE_LOST), NativeError::DeviceLost);
        assert_eq!(NativeError::from(vk::Result::ERROR_OUT_OF_DATE_KHR), NativeError::OutOfDate);
        assert_eq!(
            NativeError::from(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            NativeError::Vk(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        );
    }
}
