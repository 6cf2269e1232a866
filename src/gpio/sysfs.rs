//! Linux sysfs GPIO backend.
//!
//! Uses the legacy `/sys/class/gpio` interface: the pin is exported once,
//! then direction and value are plain text files. This is slow compared to
//! memory-mapped register access, which only shifts the raw pulse counts of
//! the light sensor; the configured calibration factor absorbs that.

use super::{GpioError, GpioPin, Level, validate_pin};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

const SYSFS_ROOT: &str = "/sys/class/gpio";

/// udev needs a moment to fix permissions after an export.
const EXPORT_SETTLE: Duration = Duration::from_millis(100);

/// A GPIO pin driven through sysfs.
pub struct SysfsPin {
    number: u8,
    root: PathBuf,
    exported_by_us: bool,
}

impl SysfsPin {
    /// Export the pin (if not exported yet) and return a handle to it.
    pub fn open(number: u8) -> Result<Self, GpioError> {
        Self::open_at(number, Path::new(SYSFS_ROOT))
    }

    /// Open a pin below an alternative sysfs root.
    pub fn open_at(number: u8, root: &Path) -> Result<Self, GpioError> {
        validate_pin(number)?;
        let mut pin = Self {
            number,
            root: root.to_path_buf(),
            exported_by_us: false,
        };

        if !pin.pin_dir().exists() {
            pin.write(&root.join("export"), &number.to_string())?;
            pin.exported_by_us = true;
            thread::sleep(EXPORT_SETTLE);
            debug!("[GPIO] Exported pin {}", number);
        }

        Ok(pin)
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.number))
    }

    fn write(&self, path: &Path, value: &str) -> Result<(), GpioError> {
        fs::write(path, value).map_err(|source| GpioError::Io {
            pin: self.number,
            source,
        })
    }

    fn write_attr(&self, attr: &str, value: &str) -> Result<(), GpioError> {
        self.write(&self.pin_dir().join(attr), value)
    }
}

impl GpioPin for SysfsPin {
    fn number(&self) -> u8 {
        self.number
    }

    fn set_output(&mut self) -> Result<(), GpioError> {
        self.write_attr("direction", "out")
    }

    fn set_input(&mut self) -> Result<(), GpioError> {
        self.write_attr("direction", "in")
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        self.write_attr("value", "1")
    }

    fn set_low(&mut self) -> Result<(), GpioError> {
        self.write_attr("value", "0")
    }

    fn read_level(&mut self) -> Result<Level, GpioError> {
        let raw = fs::read_to_string(self.pin_dir().join("value")).map_err(|source| {
            GpioError::Io {
                pin: self.number,
                source,
            }
        })?;
        match raw.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(GpioError::UnexpectedValue {
                pin: self.number,
                value: other.to_string(),
            }),
        }
    }

    fn release(&mut self) -> Result<(), GpioError> {
        if !self.exported_by_us {
            return Ok(());
        }
        self.write(&self.root.join("unexport"), &self.number.to_string())?;
        self.exported_by_us = false;
        debug!("[GPIO] Unexported pin {}", self.number);
        Ok(())
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("[GPIO] Failed to release pin {}: {}", self.number, e);
        }
    }
}
