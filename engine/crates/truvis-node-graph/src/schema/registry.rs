use std::collections::HashMap;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::error::{NodeGraphError, NodeGraphResult};
use crate::handles::NodeTypeId;
use crate::schema::node_type::NodeType;

/// 节点类型注册表
///
/// 每个 NodeType 只注册一次，实例通过 `Rc` 共享同一份 schema
#[derive(Default)]
pub struct NodeTypeRegistry {
    types: SlotMap<NodeTypeId, Rc<NodeType>>,
    by_name: HashMap<String, NodeTypeId>,
}

// new & init
impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

// register
impl NodeTypeRegistry {
    pub fn register(&mut self, node_type: NodeType) -> NodeGraphResult<NodeTypeId> {
        if self.by_name.contains_key(node_type.type_name()) {
            return Err(NodeGraphError::DuplicateNodeType {
                type_name: node_type.type_name().to_string(),
            });
        }
        let name = node_type.type_name().to_string();
        let id = self.types.insert(Rc::new(node_type));
        self.by_name.insert(name, id);
        log::debug!("register node type '{}'", self.types[id].type_name());
        Ok(id)
    }
}

// getter & iter
impl NodeTypeRegistry {
    #[inline]
    pub fn get(&self, id: NodeTypeId) -> Option<&Rc<NodeType>> {
        self.types.get(id)
    }

    #[inline]
    pub fn id_of(&self, type_name: &str) -> Option<NodeTypeId> {
        self.by_name.get(type_name).copied()
    }

    pub fn get_by_name(&self, type_name: &str) -> Option<(NodeTypeId, &Rc<NodeType>)> {
        let id = self.id_of(type_name)?;
        self.types.get(id).map(|node_type| (id, node_type))
    }

    #[inline]
    pub fn contains(&self, type_name: &str) -> bool {
        self.by_name.contains_key(type_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeTypeId, &NodeType)> {
        self.types.iter().map(|(id, node_type)| (id, node_type.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::behavior::tests::NoopBehavior;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = NodeTypeRegistry::new();
        let id = registry.register(NodeType::new("Device", || Box::new(NoopBehavior)).unwrap()).unwrap();

        assert_eq!(registry.id_of("Device"), Some(id));
        assert!(registry.get_by_name("Device").is_some());
        assert!(registry.get_by_name("Swapchain").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_type_name() {
        let mut registry = NodeTypeRegistry::new();
        registry.register(NodeType::new("Device", || Box::new(NoopBehavior)).unwrap()).unwrap();
        let err = registry.register(NodeType::new("Device", || Box::new(NoopBehavior)).unwrap()).unwrap_err();
        assert!(matches!(err, NodeGraphError::DuplicateNodeType { .. }));
    }
}
