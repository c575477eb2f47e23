use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ash::vk::{self, Handle};

use crate::error::NativeError;
use crate::resource::native::NativeHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEventKind {
    Created,
    Destroyed,
}

/// 一次创建或销毁
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEvent {
    pub kind: NativeEventKind,
    pub resource: &'static str,
    pub raw: u64,
    pub label: String,
}

#[derive(Debug)]
struct HandleRecord {
    resource: &'static str,
    label: String,
    /// 创建它的设备，设备本身为 None
    device: Option<u64>,
    alive: bool,
}

#[derive(Debug)]
struct Journal {
    next_raw: u64,
    handles: HashMap<u64, HandleRecord>,
    events: Vec<NativeEvent>,
    fail_next: Option<String>,
    device_lost: bool,
}

/// 不接触 GPU 的假设备
///
/// 句柄从计数器分配，所有创建和销毁都记入日志；
/// 重复销毁、销毁未知句柄、在设备销毁后销毁子资源都会返回错误
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    journal: Rc<RefCell<Journal>>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            journal: Rc::new(RefCell::new(Journal {
                next_raw: 0x1000,
                handles: HashMap::new(),
                events: Vec::new(),
                fail_next: None,
                device_lost: false,
            })),
        }
    }

    /// 下一次创建 `operation` 时失败
    pub fn fail_next_creation(&self, operation: impl Into<String>) {
        self.journal.borrow_mut().fail_next = Some(operation.into());
    }

    pub fn set_device_lost(&self, lost: bool) {
        self.journal.borrow_mut().device_lost = lost;
    }
}

// create
impl HeadlessDevice {
    fn create(&self, resource: &'static str, device: Option<u64>, label: &str) -> Result<u64, NativeError> {
        let mut journal = self.journal.borrow_mut();
        if journal.fail_next.as_deref() == Some(resource) {
            journal.fail_next = None;
            return Err(NativeError::creation(format!("create {resource}"), "injected failure"));
        }
        if let Some(device) = device {
            if !journal.handles.get(&device).is_some_and(|record| record.alive) {
                return Err(NativeError::UseAfterDestroy {
                    kind: "Device",
                    raw: device,
                });
            }
        }

        let raw = journal.next_raw;
        journal.next_raw += 1;
        journal.handles.insert(
            raw,
            HandleRecord {
                resource,
                label: label.to_string(),
                device,
                alive: true,
            },
        );
        journal.events.push(NativeEvent {
            kind: NativeEventKind::Created,
            resource,
            raw,
            label: label.to_string(),
        });
        log::trace!("create {} '{}' {:#x}", resource, label, raw);
        Ok(raw)
    }

    pub fn create_device(&self, label: &str) -> Result<vk::Device, NativeError> {
        self.create("Device", None, label).map(vk::Device::from_raw)
    }

    pub fn create_command_pool(&self, device: vk::Device, label: &str) -> Result<vk::CommandPool, NativeError> {
        self.create("CommandPool", Some(device.as_raw()), label).map(vk::CommandPool::from_raw)
    }

    pub fn create_buffer(&self, device: vk::Device, label: &str) -> Result<vk::Buffer, NativeError> {
        self.create("Buffer", Some(device.as_raw()), label).map(vk::Buffer::from_raw)
    }

    pub fn create_swapchain(&self, device: vk::Device, label: &str) -> Result<vk::SwapchainKHR, NativeError> {
        self.create("Swapchain", Some(device.as_raw()), label).map(vk::SwapchainKHR::from_raw)
    }

    /// 设备丢失时返回 [`NativeError::DeviceLost`]
    pub fn check_device(&self, device: vk::Device) -> Result<(), NativeError> {
        let journal = self.journal.borrow();
        if journal.device_lost {
            return Err(NativeError::DeviceLost);
        }
        match journal.handles.get(&device.as_raw()) {
            Some(record) if record.alive => Ok(()),
            _ => Err(NativeError::UseAfterDestroy {
                kind: "Device",
                raw: device.as_raw(),
            }),
        }
    }
}

// destroy
impl HeadlessDevice {
    pub fn destroy(&self, handle: NativeHandle) -> Result<(), NativeError> {
        let raw = handle.as_raw();
        let mut journal = self.journal.borrow_mut();

        let Some(record) = journal.handles.get(&raw) else {
            return Err(NativeError::UseAfterDestroy {
                kind: handle.kind_name(),
                raw,
            });
        };
        if !record.alive {
            return Err(NativeError::DoubleDestroy {
                kind: record.resource,
                raw,
            });
        }
        if let Some(device) = record.device {
            if !journal.handles.get(&device).is_some_and(|device| device.alive) {
                return Err(NativeError::UseAfterDestroy {
                    kind: "Device",
                    raw: device,
                });
            }
        }

        let Some(record) = journal.handles.get_mut(&raw) else {
            return Ok(());
        };
        record.alive = false;
        let event = NativeEvent {
            kind: NativeEventKind::Destroyed,
            resource: record.resource,
            raw,
            label: record.label.clone(),
        };
        log::trace!("destroy {} '{}' {:#x}", event.resource, event.label, raw);
        journal.events.push(event);
        Ok(())
    }
}

// getters
impl HeadlessDevice {
    pub fn events(&self) -> Vec<NativeEvent> {
        self.journal.borrow().events.clone()
    }

    /// 按发生顺序列出某类事件的标签
    pub fn labels(&self, kind: NativeEventKind) -> Vec<String> {
        self.journal
            .borrow()
            .events
            .iter()
            .filter(|event| event.kind == kind)
            .map(|event| event.label.clone())
            .collect()
    }

    pub fn is_alive(&self, raw: u64) -> bool {
        self.journal.borrow().handles.get(&raw).is_some_and(|record| record.alive)
    }

    pub fn live_count(&self) -> usize {
        self.journal.borrow().handles.values().filter(|record| record.alive).count()
    }

    pub fn destroy_count(&self, raw: u64) -> usize {
        self.journal
            .borrow()
            .events
            .iter()
            .filter(|event| event.kind == NativeEventKind::Destroyed && event.raw == raw)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_destroy_journaled() {
        let gpu = HeadlessDevice::new();
        let device = gpu.create_device("device").unwrap();
        let buffer = gpu.create_buffer(device, "vertices").unwrap();
        assert_ne!(buffer.as_raw(), 0);
        assert_eq!(gpu.live_count(), 2);

        gpu.destroy(NativeHandle::Buffer(buffer)).unwrap();
        assert_eq!(
            gpu.destroy(NativeHandle::Buffer(buffer)),
            Err(NativeError::DoubleDestroy {
                kind: "Buffer",
                raw: buffer.as_raw()
            })
        );
        gpu.destroy(NativeHandle::Device(device)).unwrap();
        assert_eq!(gpu.labels(NativeEventKind::Destroyed), vec!["vertices", "device"]);
        assert_eq!(gpu.destroy_count(buffer.as_raw()), 1);
    }

    #[test]
    fn test_child_after_device_rejected() {
        let gpu = HeadlessDevice::new();
        let device = gpu.create_device("device").unwrap();
        let pool = gpu.create_command_pool(device, "pool").unwrap();
        gpu.destroy(NativeHandle::Device(device)).unwrap();

        assert!(matches!(
            gpu.destroy(NativeHandle::CommandPool(pool)),
            Err(NativeError::UseAfterDestroy { kind: "Device", .. })
        ));
        assert!(gpu.create_buffer(device, "late").is_err());
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let gpu = HeadlessDevice::new();
        gpu.fail_next_creation("Device");
        assert!(matches!(gpu.create_device("a"), Err(NativeError::CreationFailed { .. })));
        assert!(gpu.create_device("b").is_ok());
    }
}
