use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::handles::{NodeHandle, ResourceHandle};
use crate::node::behavior::NodeBehavior;
use crate::node::context::{InputBindings, NodeView, OutputBindings};
use crate::node::state::NodeState;
use crate::resource::ResourceArena;
use crate::schema::node_type::NodeType;
use crate::schema::param::{ParamValue, ParameterSet};

/// 图中的一个节点
///
/// 输入槽只记录生产者输出 Resource 的句柄，输出槽的 Resource 归自己所有
pub struct NodeInstance {
    handle: NodeHandle,
    instance_id: u64,
    name: String,
    node_type: Rc<NodeType>,

    pub(crate) inputs: InputBindings,
    pub(crate) outputs: OutputBindings,
    parameters: ParameterSet,

    /// 有序、无重复、不含自己
    dependencies: Vec<NodeHandle>,

    pub(crate) state: NodeState,
    /// 0 表示需要重新计算
    cache_key: u64,
    pub(crate) cleaned_up: bool,
    pub(crate) needs_recompile: bool,
    pub(crate) execution_index: Option<usize>,

    pub(crate) behavior: Box<dyn NodeBehavior>,
}

// new & init
impl NodeInstance {
    pub(crate) fn new(handle: NodeHandle, instance_id: u64, name: String, node_type: Rc<NodeType>) -> Self {
        let behavior = node_type.create_behavior();
        Self {
            handle,
            instance_id,
            name,
            inputs: vec![Vec::new(); node_type.input_count()],
            outputs: vec![Vec::new(); node_type.output_count()],
            node_type,
            parameters: ParameterSet::new(),
            dependencies: Vec::new(),
            state: NodeState::Created,
            cache_key: 0,
            cleaned_up: false,
            needs_recompile: false,
            execution_index: None,
            behavior,
        }
    }
}

// getters
impl NodeInstance {
    #[inline]
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }
    #[inline]
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }
    #[inline]
    pub(crate) fn node_type_rc(&self) -> Rc<NodeType> {
        self.node_type.clone()
    }
    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }
    #[inline]
    pub fn dependencies(&self) -> &[NodeHandle] {
        &self.dependencies
    }
    #[inline]
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }
    #[inline]
    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }
    #[inline]
    pub fn needs_recompile(&self) -> bool {
        self.needs_recompile
    }
    #[inline]
    pub fn execution_index(&self) -> Option<usize> {
        self.execution_index
    }

    /// 输入槽 `slot` 的 `index` 上连接的 Resource
    pub fn input(&self, slot: usize, index: usize) -> Option<ResourceHandle> {
        self.inputs.get(slot).and_then(|entries| entries.get(index)).copied().flatten()
    }

    pub fn output(&self, slot: usize, index: usize) -> Option<ResourceHandle> {
        self.outputs.get(slot).and_then(|entries| entries.get(index)).copied()
    }

    pub fn output_count(&self, slot: usize) -> usize {
        self.outputs.get(slot).map_or(0, |entries| entries.len())
    }

    /// 是否还有输入连到 `producer` 的输出
    pub(crate) fn reads_from(&self, producer: NodeHandle, resources: &ResourceArena) -> bool {
        self.inputs
            .iter()
            .flatten()
            .flatten()
            .any(|resource| resources.get(*resource).and_then(|r| r.owner()) == Some(producer))
    }
}

// dependencies
impl NodeInstance {
    /// 自依赖和重复依赖都被忽略，返回是否新增
    pub fn add_dependency(&mut self, dependency: NodeHandle) -> bool {
        if dependency == self.handle || self.dependencies.contains(&dependency) {
            return false;
        }
        self.dependencies.push(dependency);
        true
    }

    pub fn remove_dependency(&mut self, dependency: NodeHandle) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|dep| *dep != dependency);
        before != self.dependencies.len()
    }

    #[inline]
    pub fn depends_on(&self, node: NodeHandle) -> bool {
        self.dependencies.contains(&node)
    }
}

// parameters
impl NodeInstance {
    /// 修改参数会使缓存键失效
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.cache_key = 0;
        self.parameters.set(name, value)
    }

    #[inline]
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }
}

// cache key
impl NodeInstance {
    #[inline]
    pub fn cache_key(&self) -> u64 {
        self.cache_key
    }

    #[inline]
    pub fn invalidate_cache(&mut self) {
        self.cache_key = 0;
    }

    /// 由类型名、参数、输入连接及输入句柄计算缓存键，结果不会是 0
    pub(crate) fn compute_cache_key(&mut self, resources: &ResourceArena) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.node_type.type_name().hash(&mut hasher);
        for (name, value) in self.parameters.iter() {
            name.hash(&mut hasher);
            value.hash_into(&mut hasher);
        }
        for (slot, entries) in self.inputs.iter().enumerate() {
            for (index, entry) in entries.iter().enumerate() {
                let Some(resource) = entry else { continue };
                (slot, index).hash(&mut hasher);
                resource.hash(&mut hasher);
                if let Some(resource) = resources.get(*resource) {
                    resource.handle().as_raw().hash(&mut hasher);
                }
            }
        }
        self.cache_key = hasher.finish().max(1);
        self.cache_key
    }
}

/// 调用节点行为时需要的分离借用
pub(crate) struct NodeParts<'a> {
    pub view: NodeView<'a>,
    pub inputs: &'a InputBindings,
    pub outputs: &'a mut OutputBindings,
    pub behavior: &'a mut Box<dyn NodeBehavior>,
}

// tools
impl NodeInstance {
    pub(crate) fn parts(&mut self) -> NodeParts<'_> {
        NodeParts {
            view: NodeView {
                handle: self.handle,
                instance: &self.name,
                node_type: &self.node_type,
                parameters: &self.parameters,
            },
            inputs: &self.inputs,
            outputs: &mut self.outputs,
            behavior: &mut self.behavior,
        }
    }

    /// 设置输入槽的某个下标，返回原来的连接
    pub(crate) fn set_input(
        &mut self,
        slot: usize,
        index: usize,
        resource: Option<ResourceHandle>,
    ) -> Option<ResourceHandle> {
        let entries = &mut self.inputs[slot];
        if entries.len() <= index {
            entries.resize(index + 1, None);
        }
        std::mem::replace(&mut entries[index], resource)
    }
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("name", &self.name)
            .field("type", &self.node_type.type_name())
            .field("state", &self.state)
            .field("dependencies", &self.dependencies)
            .field("cache_key", &self.cache_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;
    use crate::node::behavior::tests::NoopBehavior;
    use crate::resource::resource::Resource;
    use crate::resource::types::{ResourceLifetime, ResourceType};
    use crate::schema::slot::SlotDescriptor;

    fn instance(nodes: &mut SlotMap<NodeHandle, ()>) -> NodeInstance {
        let mut node_type = NodeType::new("Pass", || Box::new(NoopBehavior)).unwrap();
        node_type
            .register_input_slot(SlotDescriptor::input("IN", ResourceType::Buffer, ResourceLifetime::Transient))
            .unwrap();
        NodeInstance::new(nodes.insert(()), 0, "pass".to_string(), Rc::new(node_type))
    }

    #[test]
    fn test_dependencies_deduplicated() {
        let mut nodes = SlotMap::with_key();
        let mut node = instance(&mut nodes);
        let other = nodes.insert(());

        assert!(node.add_dependency(other));
        assert!(!node.add_dependency(other));
        assert!(!node.add_dependency(node.handle()));
        assert_eq!(node.dependencies(), &[other]);

        assert!(node.remove_dependency(other));
        assert!(!node.depends_on(other));
    }

    #[test]
    fn test_cache_key_tracks_parameters_and_inputs() {
        let mut nodes = SlotMap::with_key();
        let mut node = instance(&mut nodes);
        let mut resources = ResourceArena::with_key();

        let base = node.compute_cache_key(&resources);
        assert_ne!(base, 0);
        assert_eq!(node.compute_cache_key(&resources), base);

        node.set_parameter("size", 64u64);
        assert_eq!(node.cache_key(), 0);
        let with_param = node.compute_cache_key(&resources);
        assert_ne!(with_param, base);

        let buffer = resources.insert(Resource::empty(ResourceType::Buffer, ResourceLifetime::Transient, None));
        assert_eq!(node.set_input(0, 2, Some(buffer)), None);
        assert_eq!(node.inputs[0].len(), 3);
        assert_eq!(node.input(0, 2), Some(buffer));
        assert!(!node.reads_from(node.handle(), &resources));
        assert_ne!(node.compute_cache_key(&resources), with_param);
    }
}
