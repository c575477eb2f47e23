use crate::handles::NodeHandle;

/// 节点生命周期回调的时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLifecyclePhase {
    PreSetup,
    PostSetup,
    PreCompile,
    PostCompile,
    PreExecute,
    PostExecute,
    PreCleanup,
    PostCleanup,
}

type NodeHook = Box<dyn FnMut(NodeLifecyclePhase, NodeHandle, &str)>;

/// 节点生命周期回调
///
/// 回调只用于观察（日志、调试、统计），不能修改图
#[derive(Default)]
pub struct LifecycleHooks {
    /// 所有阶段都会调用
    node_hooks: Vec<NodeHook>,
    phase_hooks: Vec<(NodeLifecyclePhase, NodeHook)>,
}

// register
impl LifecycleHooks {
    pub fn add_node_hook(&mut self, hook: impl FnMut(NodeLifecyclePhase, NodeHandle, &str) + 'static) {
        self.node_hooks.push(Box::new(hook));
    }

    pub fn add_phase_hook(
        &mut self,
        phase: NodeLifecyclePhase,
        hook: impl FnMut(NodeLifecyclePhase, NodeHandle, &str) + 'static,
    ) {
        self.phase_hooks.push((phase, Box::new(hook)));
    }

    pub fn clear(&mut self) {
        self.node_hooks.clear();
        self.phase_hooks.clear();
    }
}

// update
impl LifecycleHooks {
    pub fn run(&mut self, phase: NodeLifecyclePhase, handle: NodeHandle, instance: &str) {
        for hook in &mut self.node_hooks {
            hook(phase, handle, instance);
        }
        for (hook_phase, hook) in &mut self.phase_hooks {
            if *hook_phase == phase {
                hook(phase, handle, instance);
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_hooks.is_empty() && self.phase_hooks.is_empty()
    }
}
