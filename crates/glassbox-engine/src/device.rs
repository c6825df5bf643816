//! Compute device selection.

/// The device inference runs on, fixed when the engine is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    #[cfg(feature = "metal")]
    Metal,
}

impl Device {
    /// Pick the best device available to this build and platform.
    pub fn auto() -> Self {
        #[cfg(feature = "metal")]
        {
            if cfg!(target_os = "macos") {
                return Device::Metal;
            }
        }
        Device::Cpu
    }

    pub fn name(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            #[cfg(feature = "metal")]
            Device::Metal => "metal",
        }
    }
}
