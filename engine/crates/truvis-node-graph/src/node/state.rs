/// 节点生命周期状态
///
/// `Created -> SetupDone -> Compiled -> (Executing)* -> CleanedUp`，
/// CleanedUp 之后可以重新 Setup 再 Compile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Created,
    SetupDone,
    Compiled,
    Executing,
    CleanedUp,
}

impl NodeState {
    /// 是否需要先 Setup
    #[inline]
    pub fn needs_setup(self) -> bool {
        matches!(self, NodeState::Created | NodeState::CleanedUp)
    }

    /// Setup 或 Compile 之后才可能持有资源
    #[inline]
    pub fn holds_resources(self) -> bool {
        matches!(self, NodeState::SetupDone | NodeState::Compiled | NodeState::Executing)
    }
}
