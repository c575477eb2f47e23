//! 在假设备上跑一个完整的节点图
//!
//! Device -> CommandPool -> Buffer，再加一个 Swapchain；
//! 编译、执行若干帧、模拟一次窗口尺寸变化，最后按依赖的相反顺序销毁

use anyhow::Context;
use ash::vk;

use truvis_crate_tools::init_log::init_log_with_filter;
use truvis_crate_tools::resource::TruvisPath;
use truvis_node_graph::headless::device::{HeadlessDevice, NativeEventKind};
use truvis_node_graph::headless::nodes::{
    BufferConfig, CommandPoolConfig, DeviceConfig, SwapchainConfig, register_headless_types,
};
use truvis_node_graph::schema::registry::NodeTypeRegistry;
use truvis_node_graph::{FrameCounter, GraphConfig, NodeGraph};

const FRAMES_PER_SIZE: u64 = 4;

fn load_config() -> anyhow::Result<GraphConfig> {
    let path = TruvisPath::config_path("node_graph.toml");
    if path.exists() {
        GraphConfig::from_file(&path)
    } else {
        Ok(GraphConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_log_with_filter(config.log_filter());

    let gpu = HeadlessDevice::new();
    let mut registry = NodeTypeRegistry::new();
    register_headless_types(&mut registry, &gpu).context("注册节点类型失败")?;

    let mut graph = NodeGraph::with_config(registry, &config);
    let device = graph.add_typed_node::<DeviceConfig>("device")?;
    let pool = graph.add_typed_node::<CommandPoolConfig>("upload_pool")?;
    let buffer = graph.add_typed_node::<BufferConfig>("vertex_buffer")?;
    let swapchain = graph.add_typed_node::<SwapchainConfig>("swapchain")?;

    graph.connect_typed(device, DeviceConfig::DEVICE, pool, CommandPoolConfig::DEVICE)?;
    graph.connect_typed(device, DeviceConfig::DEVICE, buffer, BufferConfig::DEVICE)?;
    graph.connect_typed(pool, CommandPoolConfig::COMMAND_POOL, buffer, BufferConfig::COMMAND_POOL)?;
    graph.connect_typed(device, DeviceConfig::DEVICE, swapchain, SwapchainConfig::DEVICE)?;

    graph.set_parameter(buffer.handle(), "size", 64u64 * 1024)?;
    graph.set_parameter(swapchain.handle(), "extent", vk::Extent2D { width: 1280, height: 720 })?;

    graph.compile().context("节点图编译失败")?;

    let mut frames = FrameCounter::new(0, config.frames_in_flight);
    for extent in [vk::Extent2D { width: 1920, height: 1080 }, vk::Extent2D { width: 800, height: 600 }] {
        for _ in 0..FRAMES_PER_SIZE {
            graph.execute(&frames.frame_context())?;
            frames.next_frame();
        }

        log::info!("resize swapchain to {}x{}", extent.width, extent.height);
        graph.set_parameter(swapchain.handle(), "extent", extent)?;
        let report = graph.recompile_dirty_nodes()?;
        if !report.is_success() {
            for (name, err) in &report.failed {
                log::error!("'{}': {}", name, err);
            }
            anyhow::bail!("交换链重建失败");
        }
    }
    graph.execute(&frames.frame_context())?;

    graph.destroy();
    log::info!(
        "{} native handles created, {} destroyed, {} still alive",
        gpu.labels(NativeEventKind::Created).len(),
        gpu.labels(NativeEventKind::Destroyed).len(),
        gpu.live_count()
    );
    Ok(())
}
