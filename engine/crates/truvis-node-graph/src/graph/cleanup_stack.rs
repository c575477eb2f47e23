//! 依赖有序的清理栈
//!
//! 每个清理节点记录"依赖我的节点"（dependents）。清理一个节点之前，
//! 先递归清理它的全部 dependents，所以被依赖的资源总是最后销毁。
//!
//! 节点之间只用键引用，不持有指针；回调通过上下文参数 `C` 访问外部状态。

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;

type CleanupCallback<C> = Box<dyn FnMut(&mut C)>;

struct CleanupNode<K, C> {
    name: String,
    /// 占位节点没有回调
    callback: Option<CleanupCallback<C>>,
    /// 必须先于自己清理的节点
    dependents: Vec<K>,
    /// 最近一次注册时的依赖，重新注册时用来撤掉旧的反向边
    dependencies: Vec<K>,
    executed: bool,
}

impl<K, C> CleanupNode<K, C> {
    fn placeholder() -> Self {
        Self {
            name: String::new(),
            callback: None,
            dependents: Vec::new(),
            dependencies: Vec::new(),
            executed: false,
        }
    }
}

pub struct CleanupStack<K, C> {
    nodes: IndexMap<K, CleanupNode<K, C>>,
}

impl<K, C> Default for CleanupStack<K, C> {
    fn default() -> Self {
        Self { nodes: IndexMap::new() }
    }
}

// new & init
impl<K: Copy + Eq + Hash + Debug, C> CleanupStack<K, C> {
    pub fn new() -> Self {
        Self::default()
    }
}

// register
impl<K: Copy + Eq + Hash + Debug, C> CleanupStack<K, C> {
    /// 注册或更新 `handle` 的清理回调
    ///
    /// `dependencies` 是 `handle` 依赖的节点：它们会把 `handle` 记为自己的 dependent，
    /// 尚未注册的依赖先创建占位节点，之后注册时补上回调。
    /// 重新注册时，不再依赖的节点不再把 `handle` 记为 dependent
    pub fn register(
        &mut self,
        handle: K,
        name: impl Into<String>,
        callback: impl FnMut(&mut C) + 'static,
        dependencies: &[K],
    ) {
        let dependencies: Vec<K> = dependencies.iter().copied().filter(|dependency| *dependency != handle).collect();

        let node = self.nodes.entry(handle).or_insert_with(CleanupNode::placeholder);
        node.name = name.into();
        node.callback = Some(Box::new(callback));
        let previous = std::mem::replace(&mut node.dependencies, dependencies.clone());

        for stale in previous.iter().filter(|previous| !dependencies.contains(*previous)) {
            if let Some(stale_node) = self.nodes.get_mut(stale) {
                stale_node.dependents.retain(|dependent| *dependent != handle);
            }
        }

        for &dependency in &dependencies {
            let dep_node = self.nodes.entry(dependency).or_insert_with(CleanupNode::placeholder);
            if !dep_node.dependents.contains(&handle) {
                dep_node.dependents.push(handle);
            }
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

// execute
impl<K: Copy + Eq + Hash + Debug, C> CleanupStack<K, C> {
    /// 先递归清理 dependents，再执行自己的回调
    ///
    /// `visited` 在一次遍历内共享，菱形依赖中的公共节点只会执行一次；
    /// `executed` 标记保证跨多次遍历也不会重复执行
    pub fn execute_cleanup(&mut self, handle: K, visited: &mut HashSet<K>, ctx: &mut C) {
        if !visited.insert(handle) {
            return;
        }
        let dependents = match self.nodes.get(&handle) {
            Some(node) if !node.executed => node.dependents.clone(),
            // 未注册或已经执行过
            _ => return,
        };

        for dependent in dependents {
            self.execute_cleanup(dependent, visited, ctx);
        }

        let Some(node) = self.nodes.get_mut(&handle) else {
            return;
        };
        node.executed = true;
        match node.callback.as_mut() {
            Some(callback) => {
                log::debug!("cleanup '{}' ({:?})", node.name, handle);
                callback(ctx);
            }
            None => log::trace!("cleanup placeholder {:?} has no callback", handle),
        }
    }

    /// 清理全部节点，之后清空注册表
    pub fn execute_all(&mut self, ctx: &mut C) {
        let mut visited = HashSet::new();
        let handles: Vec<K> = self.nodes.keys().copied().collect();
        for handle in handles {
            self.execute_cleanup(handle, &mut visited, ctx);
        }
        self.nodes.clear();
    }

    /// 只清理 `handle` 以及所有（传递地）依赖它的节点
    pub fn execute_from(&mut self, handle: K, ctx: &mut C) {
        let mut visited = HashSet::new();
        self.execute_cleanup(handle, &mut visited, ctx);
    }

    /// 重新编译之后重新启用，下次清理会执行新的回调
    pub fn reset_executed(&mut self, handle: K) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.executed = false;
        }
    }
}

// getters
impl<K: Copy + Eq + Hash + Debug, C> CleanupStack<K, C> {
    /// 所有（传递地）依赖 `handle` 的节点，不含它自己
    pub fn all_dependents(&self, handle: K) -> HashSet<K> {
        let mut result = HashSet::new();
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for &dependent in &node.dependents {
                if dependent != handle && result.insert(dependent) {
                    stack.push(dependent);
                }
            }
        }
        result
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    /// 有回调的节点才算注册，占位节点不算
    pub fn is_registered(&self, handle: K) -> bool {
        self.nodes.get(&handle).is_some_and(|node| node.callback.is_some())
    }
    pub fn is_executed(&self, handle: K) -> bool {
        self.nodes.get(&handle).is_some_and(|node| node.executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Vec<&'static str>;

    fn push(name: &'static str) -> impl FnMut(&mut Log) + 'static {
        move |log: &mut Log| log.push(name)
    }

    #[test]
    fn test_chain_cleans_dependents_first() {
        // C 依赖 B，B 依赖 A
        let mut stack: CleanupStack<u32, Log> = CleanupStack::new();
        stack.register(0, "A", push("A"), &[]);
        stack.register(1, "B", push("B"), &[0]);
        stack.register(2, "C", push("C"), &[1]);

        let mut log = Log::new();
        stack.execute_all(&mut log);
        assert_eq!(log, vec!["C", "B", "A"]);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_diamond_runs_shared_dependency_once() {
        // D、E 都依赖 A，F 依赖 D 和 E
        let mut stack: CleanupStack<u32, Log> = CleanupStack::new();
        stack.register(1, "D", push("D"), &[0]);
        stack.register(2, "E", push("E"), &[0]);
        stack.register(3, "F", push("F"), &[1, 2]);
        stack.register(0, "A", push("A"), &[]);

        let mut log = Log::new();
        stack.execute_all(&mut log);
        assert_eq!(log.iter().filter(|n| **n == "A").count(), 1);
        assert_eq!(log.iter().filter(|n| **n == "F").count(), 1);
        assert_eq!(log.last(), Some(&"A"));
        let pos = |name| log.iter().position(|n| *n == name).unwrap();
        assert!(pos("F") < pos("D"));
        assert!(pos("F") < pos("E"));
    }

    #[test]
    fn test_placeholder_before_register() {
        let mut stack: CleanupStack<u32, Log> = CleanupStack::new();
        // 依赖还没注册
        stack.register(1, "buffer", push("buffer"), &[0]);
        assert!(!stack.is_registered(0));
        assert_eq!(stack.len(), 2);

        stack.register(0, "pool", push("pool"), &[]);
        assert!(stack.is_registered(0));

        let mut log = Log::new();
        stack.execute_all(&mut log);
        assert_eq!(log, vec!["buffer", "pool"]);
    }

    #[test]
    fn test_execute_from_is_partial() {
        let mut stack: CleanupStack<u32, Log> = CleanupStack::new();
        stack.register(0, "device", push("device"), &[]);
        stack.register(1, "pool", push("pool"), &[0]);
        stack.register(2, "buffer", push("buffer"), &[1]);
        stack.register(3, "swapchain", push("swapchain"), &[0]);

        let mut log = Log::new();
        stack.execute_from(1, &mut log);
        assert_eq!(log, vec!["buffer", "pool"]);
        assert!(stack.is_executed(1));
        assert!(!stack.is_executed(0));

        assert_eq!(stack.all_dependents(0), HashSet::from([1, 2, 3]));
        assert_eq!(stack.all_dependents(1), HashSet::from([2]));

        // 已执行的不会再执行
        log.clear();
        stack.execute_all(&mut log);
        assert_eq!(log, vec!["swapchain", "device"]);
    }

    #[test]
    fn test_reregister_drops_stale_dependents() {
        let mut stack: CleanupStack<u32, Log> = CleanupStack::new();
        stack.register(0, "a", push("a"), &[]);
        stack.register(1, "b", push("b"), &[0]);

        // 连线反转：a 改为依赖 b，b 不再依赖任何节点
        stack.register(1, "b", push("b"), &[]);
        stack.register(0, "a", push("a"), &[1]);
        assert!(stack.all_dependents(0).is_empty());
        assert_eq!(stack.all_dependents(1), HashSet::from([0]));

        let mut log = Log::new();
        stack.execute_all(&mut log);
        assert_eq!(log, vec!["a", "b"]);
    }

    #[test]
    fn test_reset_executed_rearms() {
        let mut stack: CleanupStack<u32, Log> = CleanupStack::new();
        stack.register(0, "pool", push("pool_v1"), &[]);

        let mut log = Log::new();
        stack.execute_from(0, &mut log);
        stack.execute_from(0, &mut log);
        assert_eq!(log, vec!["pool_v1"]);

        // 重新编译：更新回调并重新启用
        stack.register(0, "pool", push("pool_v2"), &[]);
        stack.reset_executed(0);
        stack.execute_all(&mut log);
        assert_eq!(log, vec!["pool_v1", "pool_v2"]);
    }
}
