use crate::resource::types::{ResourceLifetime, ResourceType};

bitflags::bitflags! {
    /// 槽位在节点生命周期中的用途
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlotRole: u8 {
        /// 编译期依赖，参与拓扑排序
        const DEPENDENCY = 1 << 0;
        /// 每帧 Execute 读取
        const EXECUTE = 1 << 1;
        /// 只在 Cleanup 中使用
        const CLEANUP_ONLY = 1 << 2;
        /// 节点产出
        const OUTPUT = 1 << 3;
        /// 调试可视化
        const DEBUG = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotNullability {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotMutability {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotArrayMode {
    Single,
    /// `max == 0` 表示不限数量
    Array { max: usize },
}

impl SlotArrayMode {
    /// 数组上界，None 表示不限
    #[inline]
    pub fn bound(self) -> Option<usize> {
        match self {
            SlotArrayMode::Single => Some(1),
            SlotArrayMode::Array { max: 0 } => None,
            SlotArrayMode::Array { max } => Some(max),
        }
    }

    #[inline]
    pub fn allows_index(self, index: usize) -> bool {
        self.bound().is_none_or(|bound| index < bound)
    }
}

/// 槽位描述，NodeType 构造完成后不再改变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub name: String,
    pub resource_type: ResourceType,
    pub lifetime: ResourceLifetime,
    pub nullability: SlotNullability,
    pub mutability: SlotMutability,
    pub role: SlotRole,
    pub array_mode: SlotArrayMode,
    pub description: String,
}

// new & init
impl SlotDescriptor {
    /// 默认：必需、只读、编译期依赖、单个
    pub fn input(name: impl Into<String>, resource_type: ResourceType, lifetime: ResourceLifetime) -> Self {
        Self {
            name: name.into(),
            resource_type,
            lifetime,
            nullability: SlotNullability::Required,
            mutability: SlotMutability::ReadOnly,
            role: SlotRole::DEPENDENCY,
            array_mode: SlotArrayMode::Single,
            description: String::new(),
        }
    }

    /// 默认：必需、只写、产出、单个
    pub fn output(name: impl Into<String>, resource_type: ResourceType, lifetime: ResourceLifetime) -> Self {
        Self {
            name: name.into(),
            resource_type,
            lifetime,
            nullability: SlotNullability::Required,
            mutability: SlotMutability::WriteOnly,
            role: SlotRole::OUTPUT,
            array_mode: SlotArrayMode::Single,
            description: String::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.nullability = SlotNullability::Optional;
        self
    }

    pub fn with_mutability(mut self, mutability: SlotMutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn with_role(mut self, role: SlotRole) -> Self {
        self.role = role;
        self
    }

    pub fn array(mut self, max: usize) -> Self {
        self.array_mode = SlotArrayMode::Array { max };
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// getters
impl SlotDescriptor {
    #[inline]
    pub fn is_required(&self) -> bool {
        self.nullability == SlotNullability::Required
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self.array_mode, SlotArrayMode::Array { .. })
    }

    /// 连线兼容规则：类型相同，且不是 Transient 输出接 Persistent 输入
    #[inline]
    pub fn can_feed(&self, input: &SlotDescriptor) -> bool {
        self.resource_type == input.resource_type && self.lifetime.can_feed(input.lifetime)
    }
}
