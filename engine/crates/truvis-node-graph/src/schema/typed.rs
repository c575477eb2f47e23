//! 静态类型的槽位配置
//!
//! 用 [`crate::node_config!`] 声明的节点类型，每个槽位都是一个带类型参数的常量：
//! - `InputSlot<Config, Kind, Lifetime, INDEX>` / `OutputSlot<...>`
//! - 资源种类不同的两个槽位无法传给 [`crate::graph::node_graph::NodeGraph::connect_typed`]
//! - Transient 输出接 Persistent 输入不满足 [`FeedsInto`]，同样编译不过
//! - 槽位下标必须按声明顺序从 0 递增，在常量求值时检查
//!
//! 静态配置最终也生成普通的 [`SlotDescriptor`]，运行时和动态注册的类型共用同一个 `can_connect`

use std::fmt;
use std::marker::PhantomData;

use ash::vk;

use crate::handles::NodeHandle;
use crate::resource::native::NativeHandle;
use crate::resource::types::{ResourceLifetime, ResourceType};
use crate::schema::param::ParameterDefinition;
use crate::schema::slot::{SlotArrayMode, SlotDescriptor, SlotMutability, SlotNullability, SlotRole};

/// 资源种类：语义类型 + 对应的原生句柄类型
pub trait ResourceKind: 'static {
    const RESOURCE_TYPE: ResourceType;
    type Native: Copy;

    fn wrap(native: Self::Native) -> NativeHandle;
    /// 句柄为空或种类不符时返回 None
    fn unwrap(handle: NativeHandle) -> Option<Self::Native>;
}

macro_rules! resource_kinds {
    ($($kind:ident => $ty:ident, $native:ty, $variant:ident;)*) => {
        $(
            pub struct $kind;

            impl ResourceKind for $kind {
                const RESOURCE_TYPE: ResourceType = ResourceType::$ty;
                type Native = $native;

                #[inline]
                fn wrap(native: $native) -> NativeHandle {
                    NativeHandle::$variant(native)
                }

                #[inline]
                fn unwrap(handle: NativeHandle) -> Option<$native> {
                    match handle {
                        NativeHandle::$variant(native) if !handle.is_null() => Some(native),
                        _ => None,
                    }
                }
            }
        )*
    };
}

pub mod kinds {
    use super::*;

    resource_kinds! {
        Image => Image, vk::Image, Image;
        Image3D => Image3D, vk::Image, Image;
        CubeMap => CubeMap, vk::Image, Image;
        Buffer => Buffer, vk::Buffer, Buffer;
        CommandPool => CommandPool, vk::CommandPool, CommandPool;
        Device => Device, vk::Device, Device;
        Swapchain => Swapchain, vk::SwapchainKHR, Swapchain;
        Pipeline => Pipeline, vk::Pipeline, Pipeline;
        DescriptorSet => DescriptorSet, vk::DescriptorSet, DescriptorSet;
        RenderPass => RenderPass, vk::RenderPass, RenderPass;
        Framebuffer => Framebuffer, vk::Framebuffer, Framebuffer;
        Semaphore => Semaphore, vk::Semaphore, Semaphore;
        Fence => Fence, vk::Fence, Fence;
        ShaderModule => ShaderModule, vk::ShaderModule, ShaderModule;
    }
}

pub trait LifetimeClass: 'static {
    const LIFETIME: ResourceLifetime;
}

pub mod lifetimes {
    use super::*;

    pub struct Transient;
    pub struct Persistent;
    pub struct GraphLocal;

    impl LifetimeClass for Transient {
        const LIFETIME: ResourceLifetime = ResourceLifetime::Transient;
    }
    impl LifetimeClass for Persistent {
        const LIFETIME: ResourceLifetime = ResourceLifetime::Persistent;
    }
    impl LifetimeClass for GraphLocal {
        const LIFETIME: ResourceLifetime = ResourceLifetime::GraphLocal;
    }
}

/// `Self` 生命周期的输出可以接到 `Input` 生命周期的输入
///
/// 和 [`ResourceLifetime::can_feed`] 一致：除了 Transient -> Persistent 都实现
pub trait FeedsInto<Input: LifetimeClass>: LifetimeClass {}

impl FeedsInto<lifetimes::Transient> for lifetimes::Transient {}
impl FeedsInto<lifetimes::GraphLocal> for lifetimes::Transient {}
impl FeedsInto<lifetimes::Transient> for lifetimes::Persistent {}
impl FeedsInto<lifetimes::Persistent> for lifetimes::Persistent {}
impl FeedsInto<lifetimes::GraphLocal> for lifetimes::Persistent {}
impl FeedsInto<lifetimes::Transient> for lifetimes::GraphLocal {}
impl FeedsInto<lifetimes::Persistent> for lifetimes::GraphLocal {}
impl FeedsInto<lifetimes::GraphLocal> for lifetimes::GraphLocal {}

/// 静态输入槽
pub struct InputSlot<C, K, L, const INDEX: usize> {
    name: &'static str,
    nullability: SlotNullability,
    mutability: SlotMutability,
    role: SlotRole,
    array_mode: SlotArrayMode,
    _marker: PhantomData<fn() -> (C, K, L)>,
}

/// 静态输出槽
pub struct OutputSlot<C, K, L, const INDEX: usize> {
    name: &'static str,
    nullability: SlotNullability,
    mutability: SlotMutability,
    role: SlotRole,
    array_mode: SlotArrayMode,
    _marker: PhantomData<fn() -> (C, K, L)>,
}

macro_rules! impl_static_slot {
    ($slot:ident, $mutability:expr, $role:expr, $ctor:ident) => {
        impl<C, K, L, const INDEX: usize> Clone for $slot<C, K, L, INDEX> {
            fn clone(&self) -> Self {
                *self
            }
        }
        impl<C, K, L, const INDEX: usize> Copy for $slot<C, K, L, INDEX> {}

        impl<C, K, L, const INDEX: usize> fmt::Debug for $slot<C, K, L, INDEX> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}@{})", stringify!($slot), self.name, INDEX)
            }
        }

        // new & init
        impl<C, K, L, const INDEX: usize> $slot<C, K, L, INDEX> {
            pub const fn new(name: &'static str) -> Self {
                Self {
                    name,
                    nullability: SlotNullability::Required,
                    mutability: $mutability,
                    role: $role,
                    array_mode: SlotArrayMode::Single,
                    _marker: PhantomData,
                }
            }

            pub const fn optional(self) -> Self {
                Self {
                    nullability: SlotNullability::Optional,
                    ..self
                }
            }

            pub const fn array(self, max: usize) -> Self {
                Self {
                    array_mode: SlotArrayMode::Array { max },
                    ..self
                }
            }

            pub const fn with_role(self, role: SlotRole) -> Self {
                Self { role, ..self }
            }

            pub const fn with_mutability(self, mutability: SlotMutability) -> Self {
                Self { mutability, ..self }
            }

            #[inline]
            pub const fn index(&self) -> usize {
                INDEX
            }

            #[inline]
            pub const fn name(&self) -> &'static str {
                self.name
            }
        }

        impl<C, K: ResourceKind, L: LifetimeClass, const INDEX: usize> $slot<C, K, L, INDEX> {
            pub fn descriptor(&self) -> SlotDescriptor {
                SlotDescriptor {
                    nullability: self.nullability,
                    mutability: self.mutability,
                    role: self.role,
                    array_mode: self.array_mode,
                    ..SlotDescriptor::$ctor(self.name, K::RESOURCE_TYPE, L::LIFETIME)
                }
            }
        }
    };
}

impl_static_slot!(InputSlot, SlotMutability::ReadOnly, SlotRole::DEPENDENCY, input);
impl_static_slot!(OutputSlot, SlotMutability::WriteOnly, SlotRole::OUTPUT, output);

/// 静态类型节点的 schema，通常由 [`crate::node_config!`] 生成
pub trait TypedNodeConfig: 'static {
    const TYPE_NAME: &'static str;

    /// (声明的下标, 槽位描述)，按声明顺序
    fn input_slots() -> Vec<(usize, SlotDescriptor)>;
    fn output_slots() -> Vec<(usize, SlotDescriptor)>;
    fn parameters() -> Vec<ParameterDefinition> {
        Vec::new()
    }
}

/// 知道自己配置类型的节点句柄
pub struct TypedNodeHandle<C> {
    handle: NodeHandle,
    _marker: PhantomData<fn() -> C>,
}

impl<C> TypedNodeHandle<C> {
    #[inline]
    pub(crate) fn new(handle: NodeHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }
}

impl<C> Clone for TypedNodeHandle<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for TypedNodeHandle<C> {}

impl<C> PartialEq for TypedNodeHandle<C> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}
impl<C> Eq for TypedNodeHandle<C> {}

impl<C> fmt::Debug for TypedNodeHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedNodeHandle({:?})", self.handle)
    }
}

impl<C> From<TypedNodeHandle<C>> for NodeHandle {
    fn from(value: TypedNodeHandle<C>) -> Self {
        value.handle
    }
}

/// 声明一个静态类型的节点配置
///
/// ```ignore
/// node_config! {
///     pub struct CommandPoolConfig("CommandPool") {
///         inputs {
///             DEVICE[0]: Device, Persistent;
///         }
///         outputs {
///             COMMAND_POOL[0]: CommandPool, Persistent;
///         }
///         parameters {
///             ParameterDefinition::optional("queue_family_index", 0u32),
///         }
///     }
/// }
/// ```
///
/// 槽位后可以链式追加 `.optional()`、`.array(max)`、`.with_role(..)`、`.with_mutability(..)`
#[macro_export]
macro_rules! node_config {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident ($type_name:expr) {
            inputs {
                $( $in_slot:ident [$in_idx:literal] : $in_kind:ident, $in_life:ident
                    $( . $in_m:ident ( $($in_a:expr),* ) )* ; )*
            }
            outputs {
                $( $out_slot:ident [$out_idx:literal] : $out_kind:ident, $out_life:ident
                    $( . $out_m:ident ( $($out_a:expr),* ) )* ; )*
            }
            $( parameters { $( $param:expr ),* $(,)? } )?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name;

        #[allow(dead_code)]
        impl $name {
            $(
                pub const $in_slot: $crate::schema::typed::InputSlot<
                    $name,
                    $crate::schema::typed::kinds::$in_kind,
                    $crate::schema::typed::lifetimes::$in_life,
                    $in_idx,
                > = $crate::schema::typed::InputSlot::new(stringify!($in_slot)) $( .$in_m($($in_a),*) )*;
            )*
            $(
                pub const $out_slot: $crate::schema::typed::OutputSlot<
                    $name,
                    $crate::schema::typed::kinds::$out_kind,
                    $crate::schema::typed::lifetimes::$out_life,
                    $out_idx,
                > = $crate::schema::typed::OutputSlot::new(stringify!($out_slot)) $( .$out_m($($out_a),*) )*;
            )*
        }

        const _: () = {
            let declared: &[usize] = &[$($in_idx),*];
            let mut i = 0;
            while i < declared.len() {
                assert!(declared[i] == i, "input slot indices must count up from 0 in declaration order");
                i += 1;
            }
            let declared: &[usize] = &[$($out_idx),*];
            let mut i = 0;
            while i < declared.len() {
                assert!(declared[i] == i, "output slot indices must count up from 0 in declaration order");
                i += 1;
            }
        };

        impl $crate::schema::typed::TypedNodeConfig for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn input_slots() -> Vec<(usize, $crate::schema::slot::SlotDescriptor)> {
                vec![$( ($in_idx, $name::$in_slot.descriptor()) ),*]
            }

            fn output_slots() -> Vec<(usize, $crate::schema::slot::SlotDescriptor)> {
                vec![$( ($out_idx, $name::$out_slot.descriptor()) ),*]
            }

            fn parameters() -> Vec<$crate::schema::param::ParameterDefinition> {
                vec![$($($param),*)?]
            }
        }
    };
}
