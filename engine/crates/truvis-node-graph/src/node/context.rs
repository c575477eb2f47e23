//! 节点各阶段能看到的上下文
//!
//! 每个阶段的权限由上下文本身限定：
//! - [`SetupContext`]：只有参数和服务，不能读输入也不能写输出
//! - [`CompileContext`]：唯一可以读取输入资源、创建输出资源的阶段
//! - [`ExecuteContext`]：只读输入输出，最多修改资源的 layout，不能创建资源
//! - [`CleanupContext`]：释放自己的输出句柄，输入仍然存活可读

use ash::vk;

use crate::error::{NodeGraphError, NodeGraphResult, NodePhase, SlotDirection};
use crate::graph::frame_counter::FrameContext;
use crate::handles::{NodeHandle, ResourceHandle};
use crate::resource::ResourceArena;
use crate::resource::description::ResourceDescription;
use crate::resource::native::NativeHandle;
use crate::resource::resource::Resource;
use crate::schema::node_type::NodeType;
use crate::schema::param::{FromParamValue, ParameterSet};
use crate::schema::slot::{SlotDescriptor, SlotMutability};
use crate::schema::typed::{InputSlot, OutputSlot, ResourceKind};
use crate::services::GraphServices;
use crate::services::budget::BudgetResourceType;

/// 输入槽：每个下标上最多一个生产者的 Resource
pub type InputBindings = Vec<Vec<Option<ResourceHandle>>>;
/// 输出槽：每个下标上一个自己拥有的 Resource
pub type OutputBindings = Vec<Vec<ResourceHandle>>;

/// 所有上下文共享的只读视图
#[derive(Clone, Copy)]
pub(crate) struct NodeView<'a> {
    pub handle: NodeHandle,
    pub instance: &'a str,
    pub node_type: &'a NodeType,
    pub parameters: &'a ParameterSet,
}

impl<'a> NodeView<'a> {
    fn parameter<T: FromParamValue>(&self, phase: NodePhase, name: &str) -> NodeGraphResult<T> {
        let value = self
            .parameters
            .get(name)
            .or_else(|| self.node_type.parameter_definition(name).and_then(|def| def.default.as_ref()))
            .ok_or_else(|| NodeGraphError::MissingParameter {
                phase,
                instance: self.instance.to_string(),
                parameter: name.to_string(),
            })?;
        T::from_param(value).ok_or_else(|| NodeGraphError::ParameterTypeMismatch {
            phase,
            instance: self.instance.to_string(),
            parameter: name.to_string(),
            expected: T::KIND,
            actual: value.kind(),
        })
    }

    fn input_descriptor(&self, slot: usize) -> NodeGraphResult<&'a SlotDescriptor> {
        self.node_type.input_descriptor(slot).ok_or_else(|| NodeGraphError::SlotNotFound {
            instance: self.instance.to_string(),
            direction: SlotDirection::Input,
            slot_index: slot,
        })
    }

    fn output_descriptor(&self, slot: usize) -> NodeGraphResult<&'a SlotDescriptor> {
        self.node_type.output_descriptor(slot).ok_or_else(|| NodeGraphError::SlotNotFound {
            instance: self.instance.to_string(),
            direction: SlotDirection::Output,
            slot_index: slot,
        })
    }

    /// 已连接且句柄存活的输入
    fn input<'r>(
        &self,
        phase: NodePhase,
        inputs: &InputBindings,
        resources: &'r ResourceArena,
        slot: usize,
        index: usize,
    ) -> NodeGraphResult<&'r Resource> {
        let descriptor = self.input_descriptor(slot)?;
        let resource = inputs
            .get(slot)
            .and_then(|entries| entries.get(index))
            .copied()
            .flatten()
            .and_then(|handle| resources.get(handle))
            .ok_or_else(|| NodeGraphError::MissingInput {
                phase,
                instance: self.instance.to_string(),
                slot: descriptor.name.clone(),
                index,
            })?;
        if !resource.is_live() {
            return Err(NodeGraphError::NullInput {
                phase,
                instance: self.instance.to_string(),
                slot: descriptor.name.clone(),
                index,
            });
        }
        Ok(resource)
    }

    fn kind_mismatch(
        &self,
        phase: NodePhase,
        descriptor: &SlotDescriptor,
        actual: &'static str,
    ) -> NodeGraphError {
        NodeGraphError::ResourceKindMismatch {
            phase,
            instance: self.instance.to_string(),
            slot: descriptor.name.clone(),
            expected: descriptor.resource_type,
            actual: actual.to_string(),
        }
    }

    fn input_native<K: ResourceKind>(
        &self,
        phase: NodePhase,
        inputs: &InputBindings,
        resources: &ResourceArena,
        slot: usize,
        index: usize,
    ) -> NodeGraphResult<K::Native> {
        let handle = self.input(phase, inputs, resources, slot, index)?.handle();
        K::unwrap(handle).ok_or_else(|| self.kind_mismatch(phase, &self.node_type.inputs()[slot], handle.kind_name()))
    }
}

fn output_resource<'r>(
    outputs: &OutputBindings,
    resources: &'r ResourceArena,
    slot: usize,
    index: usize,
) -> Option<&'r Resource> {
    outputs.get(slot).and_then(|entries| entries.get(index)).and_then(|handle| resources.get(*handle))
}

/// 取得输出槽 `slot` 在 `index` 上的 Resource，不存在时按槽位描述创建空 Resource
pub(crate) fn ensure_output_resource(
    outputs: &mut OutputBindings,
    resources: &mut ResourceArena,
    owner: NodeHandle,
    descriptor: &SlotDescriptor,
    slot: usize,
    index: usize,
) -> ResourceHandle {
    let entries = &mut outputs[slot];
    while entries.len() <= index {
        entries.push(resources.insert(Resource::empty(descriptor.resource_type, descriptor.lifetime, Some(owner))));
    }
    entries[index]
}

/// 释放一个输出句柄并归还预算
pub(crate) fn release_output_resource(
    resources: &mut ResourceArena,
    services: &mut GraphServices,
    handle: ResourceHandle,
) -> Option<NativeHandle> {
    let resource = resources.get_mut(handle)?;
    let native = resource.release()?;
    let bytes = resource.description().memory_footprint();
    if bytes > 0 {
        services.budget.record_deallocation(BudgetResourceType::for_resource(resource.resource_type()), bytes);
    }
    Some(native)
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct SetupContext<'a> {
    pub(crate) view: NodeView<'a>,
    pub(crate) services: &'a mut GraphServices,
}

impl SetupContext<'_> {
    #[inline]
    pub fn instance_name(&self) -> &str {
        self.view.instance
    }
    #[inline]
    pub fn handle(&self) -> NodeHandle {
        self.view.handle
    }
    #[inline]
    pub fn node_type(&self) -> &NodeType {
        self.view.node_type
    }

    pub fn parameter<T: FromParamValue>(&self, name: &str) -> NodeGraphResult<T> {
        self.view.parameter(NodePhase::Setup, name)
    }

    #[inline]
    pub fn services(&mut self) -> &mut GraphServices {
        self.services
    }
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct CompileContext<'a> {
    pub(crate) view: NodeView<'a>,
    pub(crate) inputs: &'a InputBindings,
    pub(crate) outputs: &'a mut OutputBindings,
    pub(crate) resources: &'a mut ResourceArena,
    pub(crate) services: &'a mut GraphServices,
    pub(crate) cache_key: u64,
    pub(crate) frames_in_flight: usize,
}

// getters
impl CompileContext<'_> {
    #[inline]
    pub fn instance_name(&self) -> &str {
        self.view.instance
    }
    #[inline]
    pub fn handle(&self) -> NodeHandle {
        self.view.handle
    }
    /// 参数和输入连接的哈希，编译前由图计算，不会是 0
    #[inline]
    pub fn cache_key(&self) -> u64 {
        self.cache_key
    }
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
    #[inline]
    pub fn services(&mut self) -> &mut GraphServices {
        self.services
    }

    pub fn parameter<T: FromParamValue>(&self, name: &str) -> NodeGraphResult<T> {
        self.view.parameter(NodePhase::Compile, name)
    }
}

// inputs
impl CompileContext<'_> {
    pub fn input(&self, slot: usize, index: usize) -> NodeGraphResult<&Resource> {
        self.view.input(NodePhase::Compile, self.inputs, self.resources, slot, index)
    }

    /// 未连接或为空时返回 None，用于可选输入
    pub fn input_opt(&self, slot: usize, index: usize) -> Option<&Resource> {
        self.input(slot, index).ok()
    }

    /// 槽位当前的数组宽度
    pub fn input_count(&self, slot: usize) -> usize {
        self.inputs.get(slot).map_or(0, |entries| entries.len())
    }

    pub fn input_handle(&self, slot: usize, index: usize) -> NodeGraphResult<NativeHandle> {
        self.input(slot, index).map(|resource| resource.handle())
    }

    pub fn input_native<C, K: ResourceKind, L, const I: usize>(
        &self,
        slot: InputSlot<C, K, L, I>,
    ) -> NodeGraphResult<K::Native> {
        self.input_native_at(slot, 0)
    }

    pub fn input_native_at<C, K: ResourceKind, L, const I: usize>(
        &self,
        _slot: InputSlot<C, K, L, I>,
        index: usize,
    ) -> NodeGraphResult<K::Native> {
        self.view.input_native::<K>(NodePhase::Compile, self.inputs, self.resources, I, index)
    }
}

// outputs
impl CompileContext<'_> {
    /// 填充输出槽
    ///
    /// 数组槽会按需增长（受声明上界限制）；已经存活的句柄不会被覆盖
    pub fn set_output(
        &mut self,
        slot: usize,
        index: usize,
        handle: NativeHandle,
        description: ResourceDescription,
    ) -> NodeGraphResult<()> {
        let phase = NodePhase::Compile;
        let descriptor = self.view.output_descriptor(slot)?;

        if !descriptor.array_mode.allows_index(index) {
            return Err(NodeGraphError::ArrayBoundExceeded {
                instance: self.view.instance.to_string(),
                direction: SlotDirection::Output,
                slot: descriptor.name.clone(),
                index,
                max: descriptor.array_mode.bound().unwrap_or(usize::MAX),
            });
        }
        if handle.is_null() || !handle.fits(descriptor.resource_type) {
            return Err(self.view.kind_mismatch(phase, descriptor, handle.kind_name()));
        }
        if !description.accepts(descriptor.resource_type) {
            return Err(self.view.kind_mismatch(phase, descriptor, description.kind_name()));
        }

        let resource_handle =
            ensure_output_resource(self.outputs, self.resources, self.view.handle, descriptor, slot, index);
        if self.resources[resource_handle].is_live() {
            return Err(NodeGraphError::HandleAlreadyLive {
                phase,
                instance: self.view.instance.to_string(),
                slot: descriptor.name.clone(),
                index,
            });
        }

        let bytes = description.memory_footprint();
        let budget_type = BudgetResourceType::for_resource(descriptor.resource_type);
        if bytes > 0 {
            if !self.services.budget.try_allocate(budget_type, bytes) {
                return Err(NodeGraphError::BudgetExceeded {
                    phase,
                    instance: self.view.instance.to_string(),
                    slot: descriptor.name.clone(),
                    budget: budget_type.name().to_string(),
                    bytes,
                });
            }
            self.services.budget.record_allocation(budget_type, bytes);
        }

        // 上面已经检查过存活，这里不会失败
        let _ = self.resources[resource_handle].set_handle(handle, description);
        log::trace!(
            "[Compile] '{}'.{}[{}] <- {} {:#x}",
            self.view.instance,
            descriptor.name,
            index,
            handle.kind_name(),
            handle.as_raw()
        );
        Ok(())
    }

    pub fn set_output_native<C, K: ResourceKind, L, const O: usize>(
        &mut self,
        slot: OutputSlot<C, K, L, O>,
        native: K::Native,
        description: ResourceDescription,
    ) -> NodeGraphResult<()> {
        self.set_output_native_at(slot, 0, native, description)
    }

    pub fn set_output_native_at<C, K: ResourceKind, L, const O: usize>(
        &mut self,
        _slot: OutputSlot<C, K, L, O>,
        index: usize,
        native: K::Native,
        description: ResourceDescription,
    ) -> NodeGraphResult<()> {
        self.set_output(O, index, K::wrap(native), description)
    }

    pub fn output(&self, slot: usize, index: usize) -> Option<&Resource> {
        output_resource(self.outputs, self.resources, slot, index)
    }
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct ExecuteContext<'a> {
    pub(crate) view: NodeView<'a>,
    pub(crate) inputs: &'a InputBindings,
    pub(crate) outputs: &'a OutputBindings,
    pub(crate) resources: &'a mut ResourceArena,
    pub(crate) frame: &'a FrameContext,
}

impl ExecuteContext<'_> {
    #[inline]
    pub fn instance_name(&self) -> &str {
        self.view.instance
    }
    #[inline]
    pub fn frame(&self) -> &FrameContext {
        self.frame
    }

    pub fn parameter<T: FromParamValue>(&self, name: &str) -> NodeGraphResult<T> {
        self.view.parameter(NodePhase::Execute, name)
    }

    pub fn input(&self, slot: usize, index: usize) -> NodeGraphResult<&Resource> {
        self.view.input(NodePhase::Execute, self.inputs, self.resources, slot, index)
    }

    pub fn input_native<C, K: ResourceKind, L, const I: usize>(
        &self,
        _slot: InputSlot<C, K, L, I>,
    ) -> NodeGraphResult<K::Native> {
        self.view.input_native::<K>(NodePhase::Execute, self.inputs, self.resources, I, 0)
    }

    pub fn output(&self, slot: usize, index: usize) -> Option<&Resource> {
        output_resource(self.outputs, self.resources, slot, index)
    }

    pub fn output_native<C, K: ResourceKind, L, const O: usize>(&self, _slot: OutputSlot<C, K, L, O>) -> Option<K::Native> {
        self.output(O, 0).and_then(|resource| K::unwrap(resource.handle()))
    }

    /// 记录自己输出的 layout 变化，不改变句柄
    pub fn set_output_layout(&mut self, slot: usize, index: usize, layout: vk::ImageLayout) -> NodeGraphResult<()> {
        let handle = self.outputs.get(slot).and_then(|entries| entries.get(index)).copied().ok_or_else(|| {
            NodeGraphError::SlotNotFound {
                instance: self.view.instance.to_string(),
                direction: SlotDirection::Output,
                slot_index: slot,
            }
        })?;
        if let Some(resource) = self.resources.get_mut(handle) {
            resource.set_current_layout(layout);
        }
        Ok(())
    }

    /// 可写输入槽上记录 layout 变化；只读槽拒绝
    pub fn set_input_layout(&mut self, slot: usize, index: usize, layout: vk::ImageLayout) -> NodeGraphResult<()> {
        let descriptor = self.view.input_descriptor(slot)?;
        if descriptor.mutability == SlotMutability::ReadOnly {
            return Err(NodeGraphError::ReadOnlySlot {
                phase: NodePhase::Execute,
                instance: self.view.instance.to_string(),
                slot: descriptor.name.clone(),
            });
        }
        self.view.input(NodePhase::Execute, self.inputs, self.resources, slot, index)?;
        if let Some(handle) = self.inputs[slot][index] {
            self.resources[handle].set_current_layout(layout);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct CleanupContext<'a> {
    pub(crate) view: NodeView<'a>,
    pub(crate) inputs: &'a InputBindings,
    pub(crate) outputs: &'a OutputBindings,
    pub(crate) resources: &'a mut ResourceArena,
    pub(crate) services: &'a mut GraphServices,
}

impl CleanupContext<'_> {
    #[inline]
    pub fn instance_name(&self) -> &str {
        self.view.instance
    }
    #[inline]
    pub fn services(&mut self) -> &mut GraphServices {
        self.services
    }

    /// 依赖总是晚于自己清理，所以输入在这里仍然可读
    pub fn input_opt(&self, slot: usize, index: usize) -> Option<&Resource> {
        self.view.input(NodePhase::Cleanup, self.inputs, self.resources, slot, index).ok()
    }

    pub fn input_native<C, K: ResourceKind, L, const I: usize>(
        &self,
        _slot: InputSlot<C, K, L, I>,
    ) -> Option<K::Native> {
        self.view.input_native::<K>(NodePhase::Cleanup, self.inputs, self.resources, I, 0).ok()
    }

    pub fn output(&self, slot: usize, index: usize) -> Option<&Resource> {
        output_resource(self.outputs, self.resources, slot, index)
    }

    /// 交出输出句柄由节点销毁；已经释放过的返回 None
    pub fn release_output(&mut self, slot: usize, index: usize) -> Option<NativeHandle> {
        let handle = *self.outputs.get(slot)?.get(index)?;
        release_output_resource(self.resources, self.services, handle)
    }

    pub fn release_output_native<C, K: ResourceKind, L, const O: usize>(
        &mut self,
        _slot: OutputSlot<C, K, L, O>,
    ) -> Option<K::Native> {
        self.release_output(O, 0).and_then(K::unwrap)
    }

    /// 按槽位顺序交出所有存活的输出句柄
    pub fn release_outputs(&mut self) -> Vec<NativeHandle> {
        let handles: Vec<ResourceHandle> = self.outputs.iter().flatten().copied().collect();
        handles
            .into_iter()
            .filter_map(|handle| release_output_resource(self.resources, self.services, handle))
            .collect()
    }
}
