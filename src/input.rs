//! Input device classification glue
//!
//! The composition core does not enumerate input hardware, but it
//! does need to know what kind of device a native handle refers to
//! and which seat is routing it. This module maps native device
//! kind ids onto a closed set of categories and keeps a process-wide
//! registry of device identities.
//!
//! Identities are opaque integers minted from `DEVICE_ID_BASE`
//! upward. Values below the base are reserved and never correspond
//! to a registered device, so resolving one of them fails cleanly
//! instead of guessing.
// Austin Shafer - 2024
use utils::log;

use lazy_static::lazy_static;
use std::sync::{Arc, Mutex, RwLock, Weak};

// Native device kind ids, following the kernel input stack ordering
pub const DEVICE_KIND_KEYBOARD: u32 = 0;
pub const DEVICE_KIND_POINTER: u32 = 1;
pub const DEVICE_KIND_TOUCH: u32 = 2;
pub const DEVICE_KIND_TABLET: u32 = 3;
pub const DEVICE_KIND_TABLET_PAD: u32 = 4;
pub const DEVICE_KIND_SWITCH: u32 = 5;

/// Identities below this value are reserved and never resolve to a
/// registered device
pub const DEVICE_ID_BASE: u64 = 65536;

/// Category of one input device
///
/// An unrecognized native kind classifies as `Unknown`. That is a
/// logged degradation, not an error: the device stays usable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceType {
    Keyboard,
    Pointer,
    Touch,
    Tablet,
    TabletPad,
    Switch,
    Unknown,
}

pub(crate) struct SeatState {
    se_name: String,
    se_devices: Vec<InputDevice>,
}

/// An input routing collaborator
///
/// Devices hold a back-reference to the seat routing them. The seat
/// is independent of its devices: dropping every device handle does
/// not keep a seat alive and vice versa.
#[derive(Clone)]
pub struct Seat {
    se_internal: Arc<RwLock<SeatState>>,
}

impl PartialEq for Seat {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.se_internal, &other.se_internal)
    }
}

impl Seat {
    pub fn new(name: &str) -> Seat {
        Seat {
            se_internal: Arc::new(RwLock::new(SeatState {
                se_name: name.to_string(),
                se_devices: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> String {
        self.se_internal.read().unwrap().se_name.clone()
    }

    /// Route a device through this seat
    ///
    /// This records the device and points its seat back-reference
    /// here.
    pub fn attach_device(&self, device: &InputDevice) {
        {
            let mut internal = self.se_internal.write().unwrap();
            if internal.se_devices.iter().any(|d| d == device) {
                return;
            }
            internal.se_devices.push(device.clone());
        }
        device.set_seat(Some(self));
    }

    /// Stop routing a device through this seat
    pub fn detach_device(&self, device: &InputDevice) {
        {
            let mut internal = self.se_internal.write().unwrap();
            internal.se_devices.retain(|d| d != device);
        }
        device.set_seat(None);
    }

    pub fn device_count(&self) -> usize {
        self.se_internal.read().unwrap().se_devices.len()
    }
}

struct InputDeviceState {
    /// The native kind id this device was created with
    id_kind: u32,
    id_name: String,
    /// Registry identity, always >= DEVICE_ID_BASE
    id_identity: u64,
    /// Back-reference to the routing seat. Weak: the seat owns its
    /// device list, devices never own their seat.
    id_seat: Weak<RwLock<SeatState>>,
}

/// A handle to one input device
#[derive(Clone)]
pub struct InputDevice {
    id_internal: Arc<RwLock<InputDeviceState>>,
}

impl PartialEq for InputDevice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.id_internal, &other.id_internal)
    }
}

struct DeviceRegistry {
    dr_next_id: u64,
    dr_devices: Vec<(u64, InputDevice)>,
}

lazy_static! {
    static ref DEVICE_REGISTRY: Mutex<DeviceRegistry> = Mutex::new(DeviceRegistry {
        dr_next_id: DEVICE_ID_BASE,
        dr_devices: Vec::new(),
    });
}

impl InputDevice {
    /// Create a device for a native handle and register its identity
    pub fn new(kind: u32, name: &str) -> InputDevice {
        let mut registry = DEVICE_REGISTRY.lock().unwrap();
        let identity = registry.dr_next_id;
        registry.dr_next_id += 1;

        let device = InputDevice {
            id_internal: Arc::new(RwLock::new(InputDeviceState {
                id_kind: kind,
                id_name: name.to_string(),
                id_identity: identity,
                id_seat: Weak::new(),
            })),
        };
        registry.dr_devices.push((identity, device.clone()));

        device
    }

    /// Resolve an opaque identity back to a live device
    ///
    /// Identities in the reserved range never resolve. An identity
    /// that was never minted (or whose device was destroyed) returns
    /// None rather than a guess.
    pub fn from_identity(identity: u64) -> Option<InputDevice> {
        if identity < DEVICE_ID_BASE {
            log::debug!(
                "Identity {} is below the reserved device range, not a real handle",
                identity
            );
            return None;
        }

        let registry = DEVICE_REGISTRY.lock().unwrap();
        registry
            .dr_devices
            .iter()
            .find(|(id, _)| *id == identity)
            .map(|(_, device)| device.clone())
    }

    pub fn identity(&self) -> u64 {
        self.id_internal.read().unwrap().id_identity
    }

    pub fn name(&self) -> String {
        self.id_internal.read().unwrap().id_name.clone()
    }

    /// Classify this device's native kind
    pub fn device_type(&self) -> DeviceType {
        let kind = self.id_internal.read().unwrap().id_kind;
        match kind {
            DEVICE_KIND_KEYBOARD => DeviceType::Keyboard,
            DEVICE_KIND_POINTER => DeviceType::Pointer,
            DEVICE_KIND_TOUCH => DeviceType::Touch,
            DEVICE_KIND_TABLET => DeviceType::Tablet,
            DEVICE_KIND_TABLET_PAD => DeviceType::TabletPad,
            DEVICE_KIND_SWITCH => DeviceType::Switch,
            kind => {
                log::error!("Unknown input device type {}", kind);
                DeviceType::Unknown
            }
        }
    }

    /// Point this device's back-reference at a seat
    pub fn set_seat(&self, seat: Option<&Seat>) {
        let mut internal = self.id_internal.write().unwrap();
        internal.id_seat = match seat {
            Some(seat) => Arc::downgrade(&seat.se_internal),
            None => Weak::new(),
        };
    }

    /// The seat currently routing this device, if it is still alive
    pub fn seat(&self) -> Option<Seat> {
        self.id_internal
            .read()
            .unwrap()
            .id_seat
            .upgrade()
            .map(|internal| Seat {
                se_internal: internal,
            })
    }

    /// Unregister this device
    ///
    /// Detaches from the routing seat and removes the identity from
    /// the registry, so `from_identity` no longer resolves it.
    pub fn destroy(&self) {
        if let Some(seat) = self.seat() {
            seat.detach_device(self);
        }

        let identity = self.identity();
        let mut registry = DEVICE_REGISTRY.lock().unwrap();
        registry.dr_devices.retain(|(id, _)| *id != identity);
    }
}
