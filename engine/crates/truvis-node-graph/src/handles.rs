//! 图内部使用的句柄
//!
//! 节点之间只通过句柄互相引用，节点容器扩容或删除元素都不会让句柄悬空。

slotmap::new_key_type! {
    /// 图中的节点实例
    pub struct NodeHandle;
    /// 注册表中的节点类型
    pub struct NodeTypeId;
    /// 图持有的 Resource
    pub struct ResourceHandle;
}
