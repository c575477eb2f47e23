use crate::error::NodeResult;
use crate::node::context::{CleanupContext, CompileContext, ExecuteContext, SetupContext};

/// 节点的四阶段行为
///
/// - Setup：读取参数、准备不依赖输入的状态，不能访问槽位
/// - Compile：读取输入、创建并填充输出，是唯一允许创建资源的阶段
/// - Execute：每帧调用，只能使用已有资源
/// - Cleanup：销毁自己输出的句柄，必须可以重复调用
///
/// Cleanup 由图保证在所有消费者之后、所有依赖之前执行
pub trait NodeBehavior {
    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> NodeResult<()> {
        let _ = ctx;
        Ok(())
    }

    fn compile(&mut self, ctx: &mut CompileContext<'_>) -> NodeResult<()>;

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> NodeResult<()> {
        let _ = ctx;
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut CleanupContext<'_>) -> NodeResult<()>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 什么都不做的节点
    pub struct NoopBehavior;

    impl NodeBehavior for NoopBehavior {
        fn compile(&mut self, _ctx: &mut CompileContext<'_>) -> NodeResult<()> {
            Ok(())
        }

        fn cleanup(&mut self, _ctx: &mut CleanupContext<'_>) -> NodeResult<()> {
            Ok(())
        }
    }
}
