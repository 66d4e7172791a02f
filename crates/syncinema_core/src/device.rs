//! Audio Device Enumeration and Catalog

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::host::DeviceHost;

/// Kind of audio endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
}

/// Read-only snapshot of one host audio endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDevice {
    /// Identifier passed to sink selection
    pub device_id: String,

    /// Human-readable name; empty until label permission is granted
    pub label: String,

    pub kind: DeviceKind,
}

impl AudioDevice {
    pub fn output(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind: DeviceKind::AudioOutput,
        }
    }

    /// Label for display, falling back to the id when labels are locked
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.device_id
        } else {
            &self.label
        }
    }
}

/// Cached list of output devices
///
/// Read-mostly: readers get the last completed refresh as a cheap `Arc`
/// clone, and a refresh swaps the whole list at once.
pub struct DeviceCatalog {
    host: Arc<dyn DeviceHost>,
    devices: RwLock<Arc<Vec<AudioDevice>>>,
    permission_granted: AtomicBool,
    changes: Option<Receiver<()>>,
}

impl DeviceCatalog {
    pub fn new(host: Arc<dyn DeviceHost>) -> Self {
        let changes = host.change_notifications();
        Self {
            host,
            devices: RwLock::new(Arc::new(Vec::new())),
            permission_granted: AtomicBool::new(false),
            changes,
        }
    }

    /// Re-list output devices
    ///
    /// The label permission is requested only until it has been granted once.
    /// A denial is logged and enumeration continues with whatever labels the
    /// host exposes.
    pub fn refresh(&self) -> EngineResult<()> {
        if !self.permission_granted.load(Ordering::Acquire) {
            match self.host.request_label_permission() {
                Ok(()) => {
                    self.permission_granted.store(true, Ordering::Release);
                    info!("Device label permission granted");
                }
                Err(e) => warn!("Device label permission not granted: {}", e),
            }
        }

        let outputs: Vec<AudioDevice> = self
            .host
            .enumerate()?
            .into_iter()
            .filter(|d| d.kind == DeviceKind::AudioOutput)
            .collect();

        debug!("Found {} output devices", outputs.len());
        *self.devices.write() = Arc::new(outputs);
        Ok(())
    }

    /// Drain pending hot-plug notifications, re-listing once if any arrived
    ///
    /// Returns true if the list was refreshed.
    pub fn poll_changes(&self) -> bool {
        let Some(changes) = &self.changes else {
            return false;
        };
        if changes.try_iter().count() == 0 {
            return false;
        }

        info!("Audio device change detected");
        if let Err(e) = self.refresh() {
            warn!("Error fetching devices: {}", e);
        }
        true
    }

    pub fn list(&self) -> Arc<Vec<AudioDevice>> {
        Arc::clone(&self.devices.read())
    }

    pub fn permission_granted(&self) -> bool {
        self.permission_granted.load(Ordering::Acquire)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.read().iter().any(|d| d.device_id == device_id)
    }

    /// Map a logical selection to the sink id handed to the router
    ///
    /// A selection that has vanished from a populated catalog routes to the
    /// system default. Before the first successful refresh every id is
    /// passed through untouched.
    pub fn resolve(&self, device_id: &str) -> String {
        if device_id.is_empty() {
            return String::new();
        }

        let devices = self.devices.read();
        if devices.is_empty() || devices.iter().any(|d| d.device_id == device_id) {
            device_id.to_string()
        } else {
            warn!("Output device {} not available, using system default", device_id);
            String::new()
        }
    }
}

/// `DeviceHost` backed by the platform audio API through cpal
///
/// Desktop hosts always expose device names, so the label permission is
/// granted without a prompt. cpal has no hot-plug callback.
#[derive(Debug, Default)]
pub struct CpalDeviceHost;

impl CpalDeviceHost {
    pub fn new() -> Self {
        Self
    }

    fn describe(device: &cpal::Device, kind: DeviceKind) -> EngineResult<AudioDevice> {
        let name = device
            .name()
            .map_err(|e| EngineError::DeviceEnumeration(e.to_string()))?;

        // cpal has no separate stable id
        Ok(AudioDevice {
            device_id: name.clone(),
            label: name,
            kind,
        })
    }
}

impl DeviceHost for CpalDeviceHost {
    fn request_label_permission(&self) -> EngineResult<()> {
        Ok(())
    }

    fn enumerate(&self) -> EngineResult<Vec<AudioDevice>> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        let outputs = host
            .output_devices()
            .map_err(|e| EngineError::DeviceEnumeration(e.to_string()))?;
        for device in outputs {
            match Self::describe(&device, DeviceKind::AudioOutput) {
                Ok(d) => devices.push(d),
                Err(e) => debug!("Skipping output device: {}", e),
            }
        }

        if let Ok(inputs) = host.input_devices() {
            for device in inputs {
                if let Ok(d) = Self::describe(&device, DeviceKind::AudioInput) {
                    devices.push(d);
                }
            }
        }

        Ok(devices)
    }
}
