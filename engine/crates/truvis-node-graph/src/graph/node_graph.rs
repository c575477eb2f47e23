//! 节点图
//!
//! 负责实例化节点、校验连线、按拓扑序驱动 Setup/Compile/Execute，
//! 并通过 [`CleanupStack`] 以相反的依赖顺序销毁资源。

use std::collections::{HashMap, HashSet};

use itertools::Itertools;

use crate::config::GraphConfig;
use crate::error::{NodeGraphError, NodeGraphResult, NodePhase, SlotDirection};
use crate::graph::cleanup_stack::CleanupStack;
use crate::graph::frame_counter::FrameContext;
use crate::graph::topology::DependencyGraph;
use crate::handles::{NodeHandle, NodeTypeId, ResourceHandle};
use crate::node::context::{
    CleanupContext, CompileContext, ExecuteContext, SetupContext, ensure_output_resource, release_output_resource,
};
use crate::node::hooks::{LifecycleHooks, NodeLifecyclePhase};
use crate::node::instance::NodeInstance;
use crate::node::state::NodeState;
use crate::resource::ResourceArena;
use crate::resource::resource::Resource;
use crate::schema::param::ParamValue;
use crate::schema::registry::NodeTypeRegistry;
use crate::schema::typed::{FeedsInto, InputSlot, LifetimeClass, OutputSlot, ResourceKind, TypedNodeConfig, TypedNodeHandle};
use crate::services::GraphServices;
use crate::services::budget::{BudgetResourceType, ResourceBudgetManager};

/// 节点和资源的存储，清理回调通过它访问节点
pub struct GraphState {
    nodes: slotmap::SlotMap<NodeHandle, NodeInstance>,
    resources: ResourceArena,
    services: GraphServices,
    hooks: LifecycleHooks,
    frames_in_flight: usize,
}

// lifecycle
impl GraphState {
    fn node_mut(&mut self, handle: NodeHandle) -> NodeGraphResult<&mut NodeInstance> {
        self.nodes.get_mut(handle).ok_or(NodeGraphError::InvalidNode(handle))
    }

    /// 只对 Created/CleanedUp 的节点执行
    fn setup_node(&mut self, handle: NodeHandle) -> NodeGraphResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(NodeGraphError::InvalidNode(handle))?;
        if !node.state.needs_setup() {
            return Ok(());
        }
        self.hooks.run(NodeLifecyclePhase::PreSetup, handle, node.name());

        let parts = node.parts();
        let mut ctx = SetupContext {
            view: parts.view,
            services: &mut self.services,
        };
        parts
            .behavior
            .setup(&mut ctx)
            .map_err(|err| err.into_graph_error(NodePhase::Setup, parts.view.instance))?;

        node.state = NodeState::SetupDone;
        node.cleaned_up = false;
        log::debug!("[Setup] '{}'", node.name());
        self.hooks.run(NodeLifecyclePhase::PostSetup, handle, node.name());
        Ok(())
    }

    /// 必填输入已连接且非空，参数齐全且类型正确
    fn validate_for_compile(&self, handle: NodeHandle) -> NodeGraphResult<()> {
        let node = self.nodes.get(handle).ok_or(NodeGraphError::InvalidNode(handle))?;
        let phase = NodePhase::Compile;
        if node.state != NodeState::SetupDone {
            return Err(NodeGraphError::InvalidState {
                phase,
                instance: node.name().to_string(),
                state: node.state,
            });
        }

        for (slot, descriptor) in node.node_type().inputs().iter().enumerate() {
            if !descriptor.is_required() {
                continue;
            }
            let entries = &node.inputs[slot];
            if entries.is_empty() {
                return Err(NodeGraphError::MissingInput {
                    phase,
                    instance: node.name().to_string(),
                    slot: descriptor.name.clone(),
                    index: 0,
                });
            }
            for (index, entry) in entries.iter().enumerate() {
                let Some(resource) = entry.and_then(|handle| self.resources.get(handle)) else {
                    return Err(NodeGraphError::MissingInput {
                        phase,
                        instance: node.name().to_string(),
                        slot: descriptor.name.clone(),
                        index,
                    });
                };
                if !resource.is_live() {
                    return Err(NodeGraphError::NullInput {
                        phase,
                        instance: node.name().to_string(),
                        slot: descriptor.name.clone(),
                        index,
                    });
                }
            }
        }

        for definition in node.node_type().parameters() {
            match node.parameter(&definition.name) {
                Some(value) if value.kind() != definition.kind => {
                    return Err(NodeGraphError::ParameterTypeMismatch {
                        phase,
                        instance: node.name().to_string(),
                        parameter: definition.name.clone(),
                        expected: definition.kind,
                        actual: value.kind(),
                    });
                }
                None if definition.required && definition.default.is_none() => {
                    return Err(NodeGraphError::MissingParameter {
                        phase,
                        instance: node.name().to_string(),
                        parameter: definition.name.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 失败时先清理节点已创建的部分资源，再返回错误
    fn compile_node(&mut self, handle: NodeHandle) -> NodeGraphResult<()> {
        self.validate_for_compile(handle)?;
        if let Err(err) = self.run_compile(handle) {
            log::error!("{}", err);
            self.cleanup_node(handle);
            return Err(err);
        }

        let node = self.nodes.get_mut(handle).ok_or(NodeGraphError::InvalidNode(handle))?;
        node.state = NodeState::Compiled;
        node.needs_recompile = false;
        node.cleaned_up = false;
        log::debug!("[Compile] '{}' cache key {:#018x}", node.name(), node.cache_key());
        self.hooks.run(NodeLifecyclePhase::PostCompile, handle, node.name());
        Ok(())
    }

    fn run_compile(&mut self, handle: NodeHandle) -> NodeGraphResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(NodeGraphError::InvalidNode(handle))?;
        self.hooks.run(NodeLifecyclePhase::PreCompile, handle, node.name());
        let cache_key = node.compute_cache_key(&self.resources);

        let parts = node.parts();
        let instance = parts.view.instance;
        let mut ctx = CompileContext {
            view: parts.view,
            inputs: parts.inputs,
            outputs: parts.outputs,
            resources: &mut self.resources,
            services: &mut self.services,
            cache_key,
            frames_in_flight: self.frames_in_flight,
        };
        parts
            .behavior
            .compile(&mut ctx)
            .map_err(|err| err.into_graph_error(NodePhase::Compile, instance))?;

        // 必填的单个输出必须被填充
        for (slot, descriptor) in node.node_type().outputs().iter().enumerate() {
            if !descriptor.is_required() || descriptor.is_array() {
                continue;
            }
            let populated = node.output(slot, 0).and_then(|h| self.resources.get(h)).is_some_and(Resource::is_live);
            if !populated {
                return Err(NodeGraphError::OutputNotPopulated {
                    phase: NodePhase::Compile,
                    instance: node.name().to_string(),
                    slot: descriptor.name.clone(),
                    index: 0,
                });
            }
        }
        Ok(())
    }

    fn execute_node(&mut self, handle: NodeHandle, frame: &FrameContext) -> NodeGraphResult<()> {
        let node = self.nodes.get_mut(handle).ok_or(NodeGraphError::InvalidNode(handle))?;
        if node.state != NodeState::Compiled {
            return Err(NodeGraphError::InvalidState {
                phase: NodePhase::Execute,
                instance: node.name().to_string(),
                state: node.state,
            });
        }
        node.state = NodeState::Executing;
        self.hooks.run(NodeLifecyclePhase::PreExecute, handle, node.name());

        let parts = node.parts();
        let mut ctx = ExecuteContext {
            view: parts.view,
            inputs: parts.inputs,
            outputs: &*parts.outputs,
            resources: &mut self.resources,
            frame,
        };
        let result =
            parts.behavior.execute(&mut ctx).map_err(|err| err.into_graph_error(NodePhase::Execute, parts.view.instance));

        node.state = NodeState::Compiled;
        log::trace!("[Execute] {} '{}'", frame.frame_name(), node.name());
        self.hooks.run(NodeLifecyclePhase::PostExecute, handle, node.name());
        result
    }

    /// 幂等：已经清理过或从未 Setup 的节点直接跳过
    ///
    /// 节点行为返回的错误只记录日志，不会中断其他节点的清理
    pub(crate) fn cleanup_node(&mut self, handle: NodeHandle) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        if node.cleaned_up || node.state == NodeState::Created {
            return;
        }
        self.hooks.run(NodeLifecyclePhase::PreCleanup, handle, node.name());

        let parts = node.parts();
        let mut ctx = CleanupContext {
            view: parts.view,
            inputs: parts.inputs,
            outputs: &*parts.outputs,
            resources: &mut self.resources,
            services: &mut self.services,
        };
        if let Err(err) = parts.behavior.cleanup(&mut ctx) {
            log::error!("{}", err.into_graph_error(NodePhase::Cleanup, parts.view.instance));
        }

        for &resource in node.outputs.iter().flatten() {
            if let Some(leaked) = release_output_resource(&mut self.resources, &mut self.services, resource) {
                log::error!(
                    "[Cleanup] node '{}' did not release {} {:#x}",
                    node.name(),
                    leaked.kind_name(),
                    leaked.as_raw()
                );
            }
        }

        node.state = NodeState::CleanedUp;
        node.cleaned_up = true;
        log::debug!("[Cleanup] '{}'", node.name());
        node.invalidate_cache();
        self.hooks.run(NodeLifecyclePhase::PostCleanup, handle, node.name());
    }
}

/// [`NodeGraph::recompile_dirty_nodes`] 的结果
#[derive(Debug, Default)]
pub struct RecompileReport {
    pub recompiled: Vec<String>,
    pub failed: Vec<(String, NodeGraphError)>,
    /// 依赖编译失败而跳过的节点
    pub skipped: Vec<String>,
}

impl RecompileReport {
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub struct NodeGraph {
    registry: NodeTypeRegistry,
    state: GraphState,
    cleanup_stack: CleanupStack<NodeHandle, GraphState>,

    /// 加入顺序，排序时入度相同的节点保持这个顺序
    insertion_order: Vec<NodeHandle>,
    names: HashMap<String, NodeHandle>,
    instance_counts: HashMap<NodeTypeId, u32>,
    next_instance_id: u64,

    execution_order: Vec<NodeHandle>,
    compiled: bool,
    print_plan: bool,
    destroyed: bool,
}

// new & init
impl NodeGraph {
    pub fn new(registry: NodeTypeRegistry) -> Self {
        Self::with_config(registry, &GraphConfig::default())
    }

    pub fn with_config(registry: NodeTypeRegistry, config: &GraphConfig) -> Self {
        let mut budget = ResourceBudgetManager::new();
        budget.set_budget(BudgetResourceType::HostMemory, config.budget.host_memory);
        budget.set_budget(BudgetResourceType::DeviceMemory, config.budget.device_memory);

        Self {
            registry,
            state: GraphState {
                nodes: slotmap::SlotMap::with_key(),
                resources: ResourceArena::with_key(),
                services: GraphServices::new(budget),
                hooks: LifecycleHooks::default(),
                frames_in_flight: config.frames_in_flight.max(1),
            },
            cleanup_stack: CleanupStack::new(),
            insertion_order: Vec::new(),
            names: HashMap::new(),
            instance_counts: HashMap::new(),
            next_instance_id: 0,
            execution_order: Vec::new(),
            compiled: false,
            print_plan: config.print_execution_plan,
            destroyed: false,
        }
    }
}

// build
impl NodeGraph {
    pub fn add_node(&mut self, type_name: &str, instance_name: impl Into<String>) -> NodeGraphResult<NodeHandle> {
        let instance_name = instance_name.into();
        if self.names.contains_key(&instance_name) {
            return Err(NodeGraphError::DuplicateInstance {
                instance: instance_name,
            });
        }
        let (type_id, node_type) = self.registry.get_by_name(type_name).ok_or_else(|| {
            NodeGraphError::UnknownNodeType {
                type_name: type_name.to_string(),
            }
        })?;
        let node_type = node_type.clone();

        let count = self.instance_counts.entry(type_id).or_default();
        if node_type.max_instances() != 0 && *count >= node_type.max_instances() {
            return Err(NodeGraphError::MaxInstancesReached {
                type_name: type_name.to_string(),
                max: node_type.max_instances(),
            });
        }
        *count += 1;

        let instance_id = self.next_instance_id;
        self.next_instance_id += 1;
        let handle = self.state.nodes.insert_with_key(|handle| {
            NodeInstance::new(handle, instance_id, instance_name.clone(), node_type.clone())
        });

        // 单个输出槽先准备好空 Resource
        let node = &mut self.state.nodes[handle];
        for (slot, descriptor) in node_type.outputs().iter().enumerate() {
            if !descriptor.is_array() {
                ensure_output_resource(&mut node.outputs, &mut self.state.resources, handle, descriptor, slot, 0);
            }
        }

        log::debug!("add node '{}' ({}) as #{}", instance_name, type_name, instance_id);
        self.names.insert(instance_name, handle);
        self.insertion_order.push(handle);
        self.compiled = false;
        Ok(handle)
    }

    pub fn add_typed_node<C: TypedNodeConfig>(
        &mut self,
        instance_name: impl Into<String>,
    ) -> NodeGraphResult<TypedNodeHandle<C>> {
        self.add_node(C::TYPE_NAME, instance_name).map(TypedNodeHandle::new)
    }

    /// 把 `producer` 的输出槽连到 `consumer` 的输入槽
    ///
    /// 所有检查都在修改之前完成，失败时图保持不变
    pub fn connect(
        &mut self,
        producer: NodeHandle,
        output_slot: usize,
        output_index: usize,
        consumer: NodeHandle,
        input_slot: usize,
        input_index: usize,
    ) -> NodeGraphResult<()> {
        let producer_node = self.state.nodes.get(producer).ok_or(NodeGraphError::InvalidNode(producer))?;
        let consumer_node = self.state.nodes.get(consumer).ok_or(NodeGraphError::InvalidNode(consumer))?;
        if producer == consumer {
            return Err(NodeGraphError::SelfConnection {
                instance: producer_node.name().to_string(),
            });
        }

        let producer_type = producer_node.node_type_rc();
        let consumer_type = consumer_node.node_type_rc();
        let output = producer_type.output_descriptor(output_slot).ok_or_else(|| NodeGraphError::SlotNotFound {
            instance: producer_node.name().to_string(),
            direction: SlotDirection::Output,
            slot_index: output_slot,
        })?;
        let input = consumer_type.input_descriptor(input_slot).ok_or_else(|| NodeGraphError::SlotNotFound {
            instance: consumer_node.name().to_string(),
            direction: SlotDirection::Input,
            slot_index: input_slot,
        })?;

        if !producer_type.can_connect(output_slot, &consumer_type, input_slot) {
            return Err(NodeGraphError::IncompatibleSlots {
                producer: producer_node.name().to_string(),
                output_slot: output.name.clone(),
                output_type: output.resource_type,
                output_lifetime: output.lifetime,
                consumer: consumer_node.name().to_string(),
                input_slot: input.name.clone(),
                input_type: input.resource_type,
                input_lifetime: input.lifetime,
            });
        }
        for (node, direction, descriptor, index) in [
            (producer_node, SlotDirection::Output, output, output_index),
            (consumer_node, SlotDirection::Input, input, input_index),
        ] {
            if !descriptor.array_mode.allows_index(index) {
                return Err(NodeGraphError::ArrayBoundExceeded {
                    instance: node.name().to_string(),
                    direction,
                    slot: descriptor.name.clone(),
                    index,
                    max: descriptor.array_mode.bound().unwrap_or(usize::MAX),
                });
            }
        }

        // 生产者的输出数组按需增长，新下标需要生产者重新编译
        let producer_node = &mut self.state.nodes[producer];
        let before = producer_node.output_count(output_slot);
        let resource = ensure_output_resource(
            &mut producer_node.outputs,
            &mut self.state.resources,
            producer,
            output,
            output_slot,
            output_index,
        );
        if producer_node.output_count(output_slot) != before && producer_node.state == NodeState::Compiled {
            producer_node.needs_recompile = true;
        }

        let consumer_node = &mut self.state.nodes[consumer];
        let previous = consumer_node.set_input(input_slot, input_index, Some(resource));
        consumer_node.add_dependency(producer);
        consumer_node.invalidate_cache();
        if consumer_node.state == NodeState::Compiled {
            consumer_node.needs_recompile = true;
        }

        // 被替换的旧生产者如果不再被读取，移除依赖
        let old_producer = previous
            .filter(|previous| *previous != resource)
            .and_then(|previous| self.state.resources.get(previous))
            .and_then(Resource::owner)
            .filter(|owner| *owner != producer);
        if let Some(old_producer) = old_producer {
            if !consumer_node.reads_from(old_producer, &self.state.resources) {
                consumer_node.remove_dependency(old_producer);
            }
        }

        log::debug!(
            "connect '{}'.{}[{}] -> '{}'.{}[{}]",
            self.state.nodes[producer].name(),
            output.name,
            output_index,
            self.state.nodes[consumer].name(),
            input.name,
            input_index
        );
        self.compiled = false;
        Ok(())
    }

    /// 编译期检查资源类型和生命周期的连线
    pub fn connect_typed<CP, CC, K, LO, LI, const O: usize, const I: usize>(
        &mut self,
        producer: TypedNodeHandle<CP>,
        output: OutputSlot<CP, K, LO, O>,
        consumer: TypedNodeHandle<CC>,
        input: InputSlot<CC, K, LI, I>,
    ) -> NodeGraphResult<()>
    where
        K: ResourceKind,
        LO: FeedsInto<LI>,
        LI: LifetimeClass,
    {
        self.connect_typed_at(producer, output, 0, consumer, input, 0)
    }

    pub fn connect_typed_at<CP, CC, K, LO, LI, const O: usize, const I: usize>(
        &mut self,
        producer: TypedNodeHandle<CP>,
        _output: OutputSlot<CP, K, LO, O>,
        output_index: usize,
        consumer: TypedNodeHandle<CC>,
        _input: InputSlot<CC, K, LI, I>,
        input_index: usize,
    ) -> NodeGraphResult<()>
    where
        K: ResourceKind,
        LO: FeedsInto<LI>,
        LI: LifetimeClass,
    {
        self.connect(producer.handle(), O, output_index, consumer.handle(), I, input_index)
    }

    /// 已编译的节点会被标记为需要重新编译
    pub fn set_parameter(
        &mut self,
        node: NodeHandle,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> NodeGraphResult<()> {
        let instance = self.state.node_mut(node)?;
        if instance.node_type().parameter_definition(name).is_none() {
            log::warn!("node '{}' ({}) has no parameter '{}'", instance.name(), instance.node_type().type_name(), name);
        }
        instance.set_parameter(name, value);
        if instance.state == NodeState::Compiled {
            instance.needs_recompile = true;
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, node: NodeHandle) -> NodeGraphResult<()> {
        let instance = self.state.node_mut(node)?;
        instance.needs_recompile = true;
        instance.invalidate_cache();
        Ok(())
    }

    pub fn hooks_mut(&mut self) -> &mut LifecycleHooks {
        &mut self.state.hooks
    }
}

// getters
impl NodeGraph {
    #[inline]
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }
    #[inline]
    pub fn node(&self, node: NodeHandle) -> Option<&NodeInstance> {
        self.state.nodes.get(node)
    }
    #[inline]
    pub fn node_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).copied()
    }
    #[inline]
    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }
    #[inline]
    pub fn resource(&self, resource: ResourceHandle) -> Option<&Resource> {
        self.state.resources.get(resource)
    }
    /// 节点输出槽 `slot` 在 `index` 上的 Resource
    pub fn output_resource(&self, node: NodeHandle, slot: usize, index: usize) -> Option<&Resource> {
        self.node(node)?.output(slot, index).and_then(|resource| self.resource(resource))
    }
    pub fn parameter(&self, node: NodeHandle, name: &str) -> Option<&ParamValue> {
        self.node(node)?.parameter(name)
    }
    #[inline]
    pub fn execution_order(&self) -> &[NodeHandle] {
        &self.execution_order
    }
    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }
    #[inline]
    pub fn services(&self) -> &GraphServices {
        &self.state.services
    }
    #[inline]
    pub fn services_mut(&mut self) -> &mut GraphServices {
        &mut self.state.services
    }
    #[inline]
    pub fn cleanup_stack(&self) -> &CleanupStack<NodeHandle, GraphState> {
        &self.cleanup_stack
    }
}

// compile
impl NodeGraph {
    /// 按加入顺序做拓扑排序
    fn sort(&self) -> NodeGraphResult<Vec<NodeHandle>> {
        let index_of: HashMap<NodeHandle, usize> =
            self.insertion_order.iter().enumerate().map(|(index, handle)| (*handle, index)).collect();

        let mut graph = DependencyGraph::new(self.insertion_order.len());
        for (consumer, handle) in self.insertion_order.iter().enumerate() {
            for dependency in self.state.nodes[*handle].dependencies() {
                if let Some(&producer) = index_of.get(dependency) {
                    graph.add_edge(producer, consumer);
                }
            }
        }

        graph
            .topological_sort()
            .map(|order| order.into_iter().map(|index| self.insertion_order[index]).collect())
            .map_err(|remaining| NodeGraphError::CycleDetected {
                nodes: remaining
                    .into_iter()
                    .map(|index| self.state.nodes[self.insertion_order[index]].name().to_string())
                    .collect(),
            })
    }

    /// 需要重新编译的节点及所有（传递地）依赖它们的节点
    fn dirty_closure(&self, order: &[NodeHandle]) -> HashSet<NodeHandle> {
        let mut dirty: HashSet<NodeHandle> = order
            .iter()
            .copied()
            .filter(|handle| {
                let node = &self.state.nodes[*handle];
                node.needs_recompile || node.state != NodeState::Compiled
            })
            .collect();

        let seeds: Vec<NodeHandle> = dirty.iter().copied().collect();
        for seed in seeds {
            dirty.extend(self.cleanup_stack.all_dependents(seed));
        }
        // 新连上、还没有注册清理的依赖
        for handle in order {
            if !dirty.contains(handle) && self.state.nodes[*handle].dependencies().iter().any(|dep| dirty.contains(dep)) {
                dirty.insert(*handle);
            }
        }
        dirty.retain(|handle| self.state.nodes.contains_key(*handle));
        dirty
    }

    fn register_cleanup(&mut self, handle: NodeHandle) {
        let node = &self.state.nodes[handle];
        let dependencies = node.dependencies().to_vec();
        self.cleanup_stack.register(
            handle,
            format!("{}_Cleanup", node.name()),
            move |state: &mut GraphState| state.cleanup_node(handle),
            &dependencies,
        );
        self.cleanup_stack.reset_executed(handle);
    }

    fn record_failure(&mut self, handle: NodeHandle, err: NodeGraphError, report: &mut RecompileReport) {
        let node = &mut self.state.nodes[handle];
        log::warn!("recompile of '{}' failed: {}", node.name(), err);
        node.needs_recompile = true;
        report.failed.push((node.name().to_string(), err));
    }

    /// 重新 Setup/Compile 所有脏节点
    ///
    /// `stop_on_error` 时第一个错误直接返回；否则记录失败，跳过依赖失败节点的节点
    fn rebuild(&mut self, stop_on_error: bool) -> NodeGraphResult<RecompileReport> {
        let order = self.sort()?;
        let dirty = self.dirty_closure(&order);
        let mut report = RecompileReport::default();

        // 消费者先于生产者清理
        for handle in order.iter().rev() {
            if dirty.contains(handle) && self.state.nodes[*handle].state.holds_resources() {
                self.state.cleanup_node(*handle);
            }
        }

        let mut failed: HashSet<NodeHandle> = HashSet::new();

        for handle in order.iter().copied().filter(|handle| dirty.contains(handle)) {
            if let Err(err) = self.state.setup_node(handle) {
                if stop_on_error {
                    self.compiled = false;
                    return Err(err);
                }
                self.record_failure(handle, err, &mut report);
                failed.insert(handle);
            }
        }

        for handle in order.iter().copied().filter(|handle| dirty.contains(handle)) {
            let node = &mut self.state.nodes[handle];
            if node.state != NodeState::SetupDone {
                // Setup 失败的节点已经记录过
                continue;
            }
            if node.dependencies().iter().any(|dep| failed.contains(dep)) {
                log::warn!("skip '{}': a dependency failed to compile", node.name());
                node.needs_recompile = true;
                report.skipped.push(node.name().to_string());
                failed.insert(handle);
                continue;
            }

            match self.state.compile_node(handle) {
                Ok(()) => {
                    self.register_cleanup(handle);
                    report.recompiled.push(self.state.nodes[handle].name().to_string());
                }
                Err(err) if stop_on_error => {
                    self.compiled = false;
                    return Err(err);
                }
                Err(err) => {
                    self.record_failure(handle, err, &mut report);
                    failed.insert(handle);
                }
            }
        }

        for (index, handle) in order.iter().enumerate() {
            self.state.nodes[*handle].execution_index = Some(index);
        }
        self.execution_order = order;
        self.compiled = report.is_success();
        Ok(report)
    }

    /// 排序并编译整张图
    ///
    /// 任何节点失败都会中止编译；失败节点已创建的资源在返回前被清理
    pub fn compile(&mut self) -> NodeGraphResult<()> {
        let report = self.rebuild(true)?;
        log::info!(
            "node graph compiled: {} nodes, {} (re)compiled",
            self.execution_order.len(),
            report.recompiled.len()
        );
        if self.print_plan {
            self.print_execution_plan();
        }
        Ok(())
    }

    /// 重新编译被标记的节点以及所有依赖它们的节点
    ///
    /// 失败不会中止，结果中列出失败和被跳过的节点，它们保持脏标记等待下次重试
    pub fn recompile_dirty_nodes(&mut self) -> NodeGraphResult<RecompileReport> {
        let report = self.rebuild(false)?;
        if report.is_success() {
            log::info!("recompiled {} nodes: [{}]", report.recompiled.len(), report.recompiled.join(", "));
        } else {
            log::warn!(
                "recompiled {} nodes, {} failed, {} skipped",
                report.recompiled.len(),
                report.failed.len(),
                report.skipped.len()
            );
        }
        Ok(report)
    }

    /// 只重新编译一个节点，依赖它的节点保留现有句柄
    ///
    /// 旧句柄在新句柄创建之前销毁；直接消费者的缓存键失效
    pub fn recompile_node(&mut self, node: NodeHandle) -> NodeGraphResult<()> {
        self.state.node_mut(node)?;
        self.state.cleanup_node(node);
        self.cleanup_stack.reset_executed(node);

        let result = self.state.setup_node(node).and_then(|()| self.state.compile_node(node));
        if let Err(err) = result {
            self.compiled = false;
            return Err(err);
        }
        self.register_cleanup(node);

        for consumer in self.state.nodes.values_mut().filter(|consumer| consumer.depends_on(node)) {
            consumer.invalidate_cache();
        }
        Ok(())
    }
}

// execute
impl NodeGraph {
    /// 按编译顺序执行所有节点；原生 API 错误原样返回，不重试
    pub fn execute(&mut self, frame: &FrameContext) -> NodeGraphResult<()> {
        if !self.compiled {
            return Err(NodeGraphError::NotCompiled);
        }
        for &handle in &self.execution_order {
            self.state.execute_node(handle, frame)?;
        }
        Ok(())
    }
}

// cleanup
impl NodeGraph {
    /// 清理一个节点以及所有（传递地）依赖它的节点，依赖者先清理
    ///
    /// 重复调用没有效果；被清理的节点在下次 [`Self::recompile_dirty_nodes`] 时重新编译
    pub fn cleanup_node(&mut self, node: NodeHandle) -> NodeGraphResult<()> {
        self.state.node_mut(node)?;
        self.cleanup_stack.execute_from(node, &mut self.state);
        // 没有注册清理的节点（Setup 过但未编译成功）
        self.state.cleanup_node(node);
        self.compiled = false;
        Ok(())
    }

    /// 按依赖的相反顺序清理所有节点
    pub fn teardown(&mut self) {
        self.cleanup_stack.execute_all(&mut self.state);

        // 没有注册清理的节点（Setup 过但未编译成功）
        let order = self.sort().unwrap_or_else(|_| self.insertion_order.clone());
        for handle in order.into_iter().rev() {
            self.state.cleanup_node(handle);
        }
        self.compiled = false;
    }

    pub fn destroy(mut self) {
        self.teardown();
        self.destroyed = true;
    }
}

impl Drop for NodeGraph {
    fn drop(&mut self) {
        if !self.destroyed {
            self.teardown();
        }
    }
}

// tools
impl NodeGraph {
    pub fn print_execution_plan(&self) {
        let name_of = |handle: &NodeHandle| self.state.nodes.get(*handle).map_or("<unknown>", |node| node.name());

        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              NodeGraph Execution Plan                            ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Total Nodes: {}  |  Execution Order: [{}]",
            self.execution_order.len(),
            self.execution_order.iter().map(name_of).join(" → ")
        );
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for (order, handle) in self.execution_order.iter().enumerate() {
            let Some(node) = self.state.nodes.get(*handle) else {
                continue;
            };
            let node_type = node.node_type();

            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!(
                "│ [{}/{}] Node: \"{}\" ({}) {:?}",
                order + 1,
                self.execution_order.len(),
                node.name(),
                node_type.type_name(),
                node.state()
            );
            log::info!("├─────────────────────────────────────────────────────────────────┤");

            if !node.dependencies().is_empty() {
                log::info!("│ Depends On: {}", node.dependencies().iter().map(name_of).join(", "));
            }

            if node_type.input_count() > 0 {
                log::info!("│ Inputs:");
                for (slot, descriptor) in node_type.inputs().iter().enumerate() {
                    for index in 0..node.inputs[slot].len().max(1) {
                        match node.input(slot, index).and_then(|h| self.resource(h)) {
                            Some(resource) => log::info!(
                                "│   📖 {}[{}] <- \"{}\" {:?} {:#x}",
                                descriptor.name,
                                index,
                                resource.owner().as_ref().map_or("<external>", name_of),
                                resource.resource_type(),
                                resource.handle().as_raw()
                            ),
                            None => log::info!("│   📖 {}[{}] <not connected>", descriptor.name, index),
                        }
                    }
                }
            }

            if node_type.output_count() > 0 {
                log::info!("│ Outputs:");
                for (slot, descriptor) in node_type.outputs().iter().enumerate() {
                    for index in 0..node.output_count(slot) {
                        if let Some(resource) = self.output_resource(*handle, slot, index) {
                            log::info!(
                                "│   ✏️  {}[{}] {:?} {:?} {:#x}",
                                descriptor.name,
                                index,
                                resource.resource_type(),
                                resource.lifetime(),
                                resource.handle().as_raw()
                            );
                        }
                    }
                }
            }

            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }
    }
}
