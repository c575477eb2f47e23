use ash::vk;

use crate::error::{NodeGraphResult, NodeResult};
use crate::headless::device::HeadlessDevice;
use crate::node::behavior::NodeBehavior;
use crate::node::context::{CleanupContext, CompileContext, ExecuteContext};
use crate::node_config;
use crate::resource::description::{
    BufferDescription, CommandPoolDescription, DeviceDescription, ResourceDescription, SwapchainDescription,
};
use crate::resource::native::NativeHandle;
use crate::resource::pool::FixedPool;
use crate::schema::node_type::NodeType;
use crate::schema::param::{ParamKind, ParameterDefinition};
use crate::schema::registry::NodeTypeRegistry;

node_config! {
    pub struct DeviceConfig("Device") {
        inputs {}
        outputs {
            DEVICE[0]: Device, Persistent;
        }
        parameters {
            ParameterDefinition::optional("name", "headless"),
        }
    }
}

node_config! {
    pub struct CommandPoolConfig("CommandPool") {
        inputs {
            DEVICE[0]: Device, Persistent;
        }
        outputs {
            COMMAND_POOL[0]: CommandPool, Persistent;
        }
        parameters {
            ParameterDefinition::optional("queue_family_index", 0u32),
        }
    }
}

node_config! {
    pub struct BufferConfig("Buffer") {
        inputs {
            DEVICE[0]: Device, Persistent;
            COMMAND_POOL[1]: CommandPool, Persistent;
        }
        outputs {
            BUFFER[0]: Buffer, Persistent;
        }
        parameters {
            ParameterDefinition::required("size", ParamKind::UInt).with_description("字节数"),
        }
    }
}

node_config! {
    pub struct SwapchainConfig("Swapchain") {
        inputs {
            DEVICE[0]: Device, Persistent;
        }
        outputs {
            SWAPCHAIN[0]: Swapchain, Persistent;
        }
        parameters {
            ParameterDefinition::required("extent", ParamKind::Extent2D),
            ParameterDefinition::optional("image_count", 3u32),
            ParameterDefinition::optional("format", vk::Format::B8G8R8A8_UNORM),
        }
    }
}

/// 注册 Device、CommandPool、Buffer、Swapchain 四种节点类型
pub fn register_headless_types(registry: &mut NodeTypeRegistry, gpu: &HeadlessDevice) -> NodeGraphResult<()> {
    let device = gpu.clone();
    registry.register(NodeType::from_config::<DeviceConfig>(move || {
        Box::new(DeviceNode { gpu: device.clone() })
    })?)?;

    let device = gpu.clone();
    registry.register(NodeType::from_config::<CommandPoolConfig>(move || {
        Box::new(CommandPoolNode { gpu: device.clone() })
    })?)?;

    let device = gpu.clone();
    registry.register(NodeType::from_config::<BufferConfig>(move || Box::new(BufferNode { gpu: device.clone() }))?)?;

    let device = gpu.clone();
    registry.register(
        NodeType::from_config::<SwapchainConfig>(move || Box::new(SwapchainNode::new(device.clone())))?
            .with_max_instances(1),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct DeviceNode {
    gpu: HeadlessDevice,
}

impl NodeBehavior for DeviceNode {
    fn compile(&mut self, ctx: &mut CompileContext<'_>) -> NodeResult<()> {
        let name: String = ctx.parameter("name")?;
        let device = self.gpu.create_device(ctx.instance_name())?;
        ctx.set_output_native(DeviceConfig::DEVICE, device, ResourceDescription::Device(DeviceDescription { name }))?;
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut CleanupContext<'_>) -> NodeResult<()> {
        if let Some(device) = ctx.release_output_native(DeviceConfig::DEVICE) {
            self.gpu.destroy(NativeHandle::Device(device))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct CommandPoolNode {
    gpu: HeadlessDevice,
}

impl NodeBehavior for CommandPoolNode {
    fn compile(&mut self, ctx: &mut CompileContext<'_>) -> NodeResult<()> {
        let device = ctx.input_native(CommandPoolConfig::DEVICE)?;
        let queue_family_index: u32 = ctx.parameter("queue_family_index")?;
        let pool = self.gpu.create_command_pool(device, ctx.instance_name())?;
        ctx.set_output_native(
            CommandPoolConfig::COMMAND_POOL,
            pool,
            ResourceDescription::CommandPool(CommandPoolDescription {
                queue_family_index,
                flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            }),
        )?;
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut CleanupContext<'_>) -> NodeResult<()> {
        if let Some(pool) = ctx.release_output_native(CommandPoolConfig::COMMAND_POOL) {
            self.gpu.destroy(NativeHandle::CommandPool(pool))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------------------------------

pub struct BufferNode {
    gpu: HeadlessDevice,
}

impl NodeBehavior for BufferNode {
    fn compile(&mut self, ctx: &mut CompileContext<'_>) -> NodeResult<()> {
        let device = ctx.input_native(BufferConfig::DEVICE)?;
        // 上传用的命令池，只要求它存在
        ctx.input_native(BufferConfig::COMMAND_POOL)?;
        let size: u64 = ctx.parameter("size")?;

        let buffer = self.gpu.create_buffer(device, ctx.instance_name())?;
        let description = ResourceDescription::Buffer(BufferDescription {
            size,
            usage: vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
        });
        if let Err(err) = ctx.set_output_native(BufferConfig::BUFFER, buffer, description) {
            // 句柄没有交给图，自己销毁
            if let Err(destroy_err) = self.gpu.destroy(NativeHandle::Buffer(buffer)) {
                log::error!("failed to destroy rejected buffer: {}", destroy_err);
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut CleanupContext<'_>) -> NodeResult<()> {
        for handle in ctx.release_outputs() {
            self.gpu.destroy(handle)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------------------------------------------------

/// 交换链；图像数量在 Compile 中确定，Execute 只在固定的池中轮转
pub struct SwapchainNode {
    gpu: HeadlessDevice,
    device: Option<vk::Device>,
    images: FixedPool,
    current_image: Option<usize>,
}

impl SwapchainNode {
    pub fn new(gpu: HeadlessDevice) -> Self {
        Self {
            gpu,
            device: None,
            images: FixedPool::default(),
            current_image: None,
        }
    }
}

impl NodeBehavior for SwapchainNode {
    fn compile(&mut self, ctx: &mut CompileContext<'_>) -> NodeResult<()> {
        let device = ctx.input_native(SwapchainConfig::DEVICE)?;
        let extent: vk::Extent2D = ctx.parameter("extent")?;
        let image_count: u32 = ctx.parameter("image_count")?;
        let format: vk::Format = ctx.parameter("format")?;

        let swapchain = self.gpu.create_swapchain(device, ctx.instance_name())?;
        let description = ResourceDescription::Swapchain(SwapchainDescription {
            extent,
            image_count,
            format,
        });
        if let Err(err) = ctx.set_output_native(SwapchainConfig::SWAPCHAIN, swapchain, description) {
            if let Err(destroy_err) = self.gpu.destroy(NativeHandle::Swapchain(swapchain)) {
                log::error!("failed to destroy rejected swapchain: {}", destroy_err);
            }
            return Err(err.into());
        }

        self.device = Some(device);
        self.images = FixedPool::new(image_count as usize);
        self.current_image = None;
        log::info!(
            "swapchain '{}' {}x{} with {} images",
            ctx.instance_name(),
            extent.width,
            extent.height,
            image_count
        );
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecuteContext<'_>) -> NodeResult<()> {
        if let Some(device) = self.device {
            self.gpu.check_device(device)?;
        }
        // 上一帧的图像已经呈现
        if let Some(previous) = self.current_image.take() {
            self.images.release(previous);
        }
        let image = self.images.acquire()?;
        self.current_image = Some(image);
        log::trace!("{} '{}' acquired image {}", ctx.frame().frame_name(), ctx.instance_name(), image);
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut CleanupContext<'_>) -> NodeResult<()> {
        self.images.reset();
        self.current_image = None;
        self.device = None;
        if let Some(swapchain) = ctx.release_output_native(SwapchainConfig::SWAPCHAIN) {
            self.gpu.destroy(NativeHandle::Swapchain(swapchain))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::typed::TypedNodeConfig;

    #[test]
    fn test_register_headless_types() {
        let gpu = HeadlessDevice::new();
        let mut registry = NodeTypeRegistry::new();
        register_headless_types(&mut registry, &gpu).unwrap();

        assert_eq!(registry.len(), 4);
        let (_, buffer) = registry.get_by_name(BufferConfig::TYPE_NAME).unwrap();
        assert_eq!(buffer.input_count(), 2);
        assert_eq!(buffer.find_input("COMMAND_POOL"), Some(1));
        assert!(buffer.parameter_definition("size").is_some_and(|def| def.required));

        let (_, swapchain) = registry.get_by_name("Swapchain").unwrap();
        assert_eq!(swapchain.max_instances(), 1);

        // 同一个 registry 不能重复注册
        assert!(register_headless_types(&mut registry, &gpu).is_err());
    }
}
