use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configured device selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePolicy {
    Cpu,
    Cuda,
    #[default]
    Auto,
}

impl FromStr for DevicePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DevicePolicy::Cpu),
            "cuda" => Ok(DevicePolicy::Cuda),
            "auto" => Ok(DevicePolicy::Auto),
            other => Err(format!("device must be one of cpu, cuda, auto (got {:?})", other)),
        }
    }
}

/// Device the policy is bound to for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DevicePolicy {
    /// Resolve the policy to a concrete device. The probe only runs for `Auto`.
    pub fn resolve<F>(self, accelerator_available: F) -> Device
    where
        F: FnOnce() -> bool,
    {
        match self {
            DevicePolicy::Cpu => Device::Cpu,
            DevicePolicy::Cuda => Device::Cuda,
            DevicePolicy::Auto => {
                if accelerator_available() {
                    Device::Cuda
                } else {
                    Device::Cpu
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy() {
        assert_eq!("cpu".parse::<DevicePolicy>().unwrap(), DevicePolicy::Cpu);
        assert_eq!(" CUDA ".parse::<DevicePolicy>().unwrap(), DevicePolicy::Cuda);
        assert_eq!("auto".parse::<DevicePolicy>().unwrap(), DevicePolicy::Auto);
        assert!("tpu".parse::<DevicePolicy>().is_err());
    }

    #[test]
    fn test_forced_policies_skip_probe() {
        let device = DevicePolicy::Cpu.resolve(|| panic!("probe must not run"));
        assert_eq!(device, Device::Cpu);

        let device = DevicePolicy::Cuda.resolve(|| panic!("probe must not run"));
        assert_eq!(device, Device::Cuda);
    }

    #[test]
    fn test_auto_prefers_accelerator() {
        assert_eq!(DevicePolicy::Auto.resolve(|| true), Device::Cuda);
        assert_eq!(DevicePolicy::Auto.resolve(|| false), Device::Cpu);
    }

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda.as_str(), "cuda");
    }
}
