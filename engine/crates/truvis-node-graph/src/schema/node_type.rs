use indexmap::IndexMap;

use crate::error::{NodeGraphError, NodeGraphResult, SlotDirection};
use crate::node::behavior::NodeBehavior;
use crate::schema::param::ParameterDefinition;
use crate::schema::slot::SlotDescriptor;
use crate::schema::typed::TypedNodeConfig;

/// 创建节点行为的工厂
pub type BehaviorFactory = Box<dyn Fn() -> Box<dyn NodeBehavior>>;

/// 节点类型的开销估计，只用于调度和工具展示
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadMetrics {
    pub estimated_memory_bytes: u64,
    pub estimated_compute_cost: f32,
    pub estimated_bandwidth_cost: f32,
    pub can_run_parallel: bool,
}

impl Default for WorkloadMetrics {
    fn default() -> Self {
        Self {
            estimated_memory_bytes: 0,
            estimated_compute_cost: 1.0,
            estimated_bandwidth_cost: 1.0,
            can_run_parallel: true,
        }
    }
}

/// 一类节点的不可变契约：槽位、参数、工厂
///
/// 注册到 [`crate::schema::registry::NodeTypeRegistry`] 之后不再修改。
/// 实例由 [`crate::graph::node_graph::NodeGraph::add_node`] 创建：它检查实例上限，
/// 再由 `NodeInstance::new` 通过 [`Self::create_behavior`] 取得新的节点行为
pub struct NodeType {
    type_name: String,
    inputs: Vec<SlotDescriptor>,
    outputs: Vec<SlotDescriptor>,
    parameters: IndexMap<String, ParameterDefinition>,
    workload: WorkloadMetrics,
    /// 0 表示不限
    max_instances: u32,
    factory: BehaviorFactory,
}

// new & init
impl NodeType {
    pub fn new(
        type_name: impl Into<String>,
        factory: impl Fn() -> Box<dyn NodeBehavior> + 'static,
    ) -> NodeGraphResult<Self> {
        let type_name = type_name.into();
        if type_name.trim().is_empty() {
            return Err(NodeGraphError::EmptyTypeName);
        }
        Ok(Self {
            type_name,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: IndexMap::new(),
            workload: WorkloadMetrics::default(),
            max_instances: 0,
            factory: Box::new(factory),
        })
    }

    /// 由静态类型配置生成 schema，和动态注册走同一套校验
    pub fn from_config<C: TypedNodeConfig>(
        factory: impl Fn() -> Box<dyn NodeBehavior> + 'static,
    ) -> NodeGraphResult<Self> {
        let mut node_type = Self::new(C::TYPE_NAME, factory)?;
        for (expected, (declared, slot)) in C::input_slots().into_iter().enumerate() {
            node_type.check_declared_index(SlotDirection::Input, &slot, declared, expected)?;
            node_type.register_input_slot(slot)?;
        }
        for (expected, (declared, slot)) in C::output_slots().into_iter().enumerate() {
            node_type.check_declared_index(SlotDirection::Output, &slot, declared, expected)?;
            node_type.register_output_slot(slot)?;
        }
        for param in C::parameters() {
            node_type.register_parameter(param)?;
        }
        Ok(node_type)
    }

    fn check_declared_index(
        &self,
        direction: SlotDirection,
        slot: &SlotDescriptor,
        declared: usize,
        expected: usize,
    ) -> NodeGraphResult<()> {
        if declared == expected {
            return Ok(());
        }
        Err(NodeGraphError::SlotCountMismatch {
            type_name: self.type_name.clone(),
            direction,
            slot: slot.name.clone(),
            declared,
            expected,
        })
    }

    pub fn with_max_instances(mut self, max_instances: u32) -> Self {
        self.max_instances = max_instances;
        self
    }

    pub fn with_workload(mut self, workload: WorkloadMetrics) -> Self {
        self.workload = workload;
        self
    }
}

// register
impl NodeType {
    /// 返回新槽位的下标
    pub fn register_input_slot(&mut self, descriptor: SlotDescriptor) -> NodeGraphResult<usize> {
        Self::push_slot(&self.type_name, SlotDirection::Input, &mut self.inputs, descriptor)
    }

    pub fn register_output_slot(&mut self, descriptor: SlotDescriptor) -> NodeGraphResult<usize> {
        Self::push_slot(&self.type_name, SlotDirection::Output, &mut self.outputs, descriptor)
    }

    fn push_slot(
        type_name: &str,
        direction: SlotDirection,
        slots: &mut Vec<SlotDescriptor>,
        descriptor: SlotDescriptor,
    ) -> NodeGraphResult<usize> {
        if slots.iter().any(|slot| slot.name == descriptor.name) {
            return Err(NodeGraphError::DuplicateSlot {
                type_name: type_name.to_string(),
                direction,
                slot: descriptor.name,
            });
        }
        slots.push(descriptor);
        Ok(slots.len() - 1)
    }

    pub fn register_parameter(&mut self, definition: ParameterDefinition) -> NodeGraphResult<()> {
        if self.parameters.contains_key(&definition.name) {
            return Err(NodeGraphError::DuplicateParameter {
                type_name: self.type_name.clone(),
                parameter: definition.name,
            });
        }
        self.parameters.insert(definition.name.clone(), definition);
        Ok(())
    }
}

// getters
impl NodeType {
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
    #[inline]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }
    #[inline]
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
    #[inline]
    pub fn input_descriptor(&self, index: usize) -> Option<&SlotDescriptor> {
        self.inputs.get(index)
    }
    #[inline]
    pub fn output_descriptor(&self, index: usize) -> Option<&SlotDescriptor> {
        self.outputs.get(index)
    }
    #[inline]
    pub fn inputs(&self) -> &[SlotDescriptor] {
        &self.inputs
    }
    #[inline]
    pub fn outputs(&self) -> &[SlotDescriptor] {
        &self.outputs
    }
    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|slot| slot.name == name)
    }
    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|slot| slot.name == name)
    }
    #[inline]
    pub fn parameter_definition(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.get(name)
    }
    #[inline]
    pub fn parameter_definition_at(&self, index: usize) -> Option<&ParameterDefinition> {
        self.parameters.get_index(index).map(|(_, def)| def)
    }
    #[inline]
    pub fn parameters(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.parameters.values()
    }
    #[inline]
    pub fn workload(&self) -> &WorkloadMetrics {
        &self.workload
    }
    #[inline]
    pub fn max_instances(&self) -> u32 {
        self.max_instances
    }
}

// tools
impl NodeType {
    /// 连线的唯一兼容性判定，无副作用
    ///
    /// 下标越界、资源类型不同、Transient 输出接 Persistent 输入时返回 false
    pub fn can_connect(&self, output_index: usize, target: &NodeType, input_index: usize) -> bool {
        match (self.output_descriptor(output_index), target.input_descriptor(input_index)) {
            (Some(output), Some(input)) => output.can_feed(input),
            _ => false,
        }
    }

    /// 每次调用都产生一个全新的节点行为
    pub fn create_behavior(&self) -> Box<dyn NodeBehavior> {
        (self.factory)()
    }
}

impl std::fmt::Debug for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeType")
            .field("type_name", &self.type_name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .field("max_instances", &self.max_instances)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::behavior::tests::NoopBehavior;
    use crate::resource::types::{ResourceLifetime, ResourceType};
    use crate::schema::param::ParamKind;

    fn noop_type(name: &str) -> NodeType {
        NodeType::new(name, || Box::new(NoopBehavior)).unwrap()
    }

    #[test]
    fn test_empty_type_name() {
        let err = NodeType::new("  ", || Box::new(NoopBehavior)).unwrap_err();
        assert!(matches!(err, NodeGraphError::EmptyTypeName));
    }

    #[test]
    fn test_duplicate_parameter() {
        let mut node_type = noop_type("Swapchain");
        node_type.register_parameter(ParameterDefinition::required("width", ParamKind::UInt)).unwrap();
        let err = node_type
            .register_parameter(ParameterDefinition::required("width", ParamKind::UInt))
            .unwrap_err();
        assert!(matches!(err, NodeGraphError::DuplicateParameter { ref parameter, .. } if parameter == "width"));
    }

    #[test]
    fn test_duplicate_slot_same_direction_only() {
        let mut node_type = noop_type("Pass");
        node_type
            .register_input_slot(SlotDescriptor::input("COLOR", ResourceType::Image, ResourceLifetime::Transient))
            .unwrap();
        // 输入和输出可以同名
        node_type
            .register_output_slot(SlotDescriptor::output("COLOR", ResourceType::Image, ResourceLifetime::Transient))
            .unwrap();
        assert!(
            node_type
                .register_input_slot(SlotDescriptor::input("COLOR", ResourceType::Image, ResourceLifetime::Transient))
                .is_err()
        );
    }

    #[test]
    fn test_can_connect() {
        let mut producer = noop_type("Producer");
        producer
            .register_output_slot(SlotDescriptor::output("T", ResourceType::Buffer, ResourceLifetime::Transient))
            .unwrap();
        producer
            .register_output_slot(SlotDescriptor::output("P", ResourceType::Buffer, ResourceLifetime::Persistent))
            .unwrap();

        let mut consumer = noop_type("Consumer");
        consumer
            .register_input_slot(SlotDescriptor::input("T", ResourceType::Buffer, ResourceLifetime::Transient))
            .unwrap();
        consumer
            .register_input_slot(SlotDescriptor::input("P", ResourceType::Buffer, ResourceLifetime::Persistent))
            .unwrap();
        consumer
            .register_input_slot(SlotDescriptor::input("I", ResourceType::Image, ResourceLifetime::Transient))
            .unwrap();

        assert!(producer.can_connect(0, &consumer, 0));
        assert!(!producer.can_connect(0, &consumer, 1));
        assert!(producer.can_connect(1, &consumer, 0));
        assert!(producer.can_connect(1, &consumer, 1));
        // 类型不同
        assert!(!producer.can_connect(1, &consumer, 2));
        // 越界
        assert!(!producer.can_connect(2, &consumer, 0));
        assert!(!producer.can_connect(0, &consumer, 3));
    }

    #[test]
    fn test_workload_and_instance_limit() {
        let node_type = noop_type("Blur")
            .with_workload(WorkloadMetrics {
                estimated_memory_bytes: 4 << 20,
                can_run_parallel: false,
                ..Default::default()
            })
            .with_max_instances(2);
        assert_eq!(node_type.workload().estimated_memory_bytes, 4 << 20);
        assert!(!node_type.workload().can_run_parallel);
        assert_eq!(node_type.workload().estimated_compute_cost, 1.0);
        assert_eq!(node_type.max_instances(), 2);
    }

    #[test]
    fn test_parameter_lookup_by_index() {
        let mut node_type = noop_type("Buffer");
        node_type.register_parameter(ParameterDefinition::required("size", ParamKind::UInt)).unwrap();
        node_type.register_parameter(ParameterDefinition::optional("label", "vertices")).unwrap();
        assert_eq!(node_type.parameter_definition_at(1).map(|d| d.name.as_str()), Some("label"));
        assert!(node_type.parameter_definition("size").is_some_and(|d| d.required));
        assert!(node_type.parameter_definition_at(2).is_none());
    }
}
