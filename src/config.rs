//! Server and device configuration: loaded once at startup and immutable
//! for the lifetime of the listener; changes take effect on restart.

use std::collections::HashSet;

use serde::Deserialize;

use crate::crypto::KEY_LEN;
use crate::result::{VdsError, VdsResult};

fn default_port() -> u16 {
    4100
}

fn default_polling_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub identity: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub key_id: u16,
    #[serde(default)]
    pub key_hex: Option<String>,
    #[serde(default)]
    pub test_interval_minutes: u32,
    #[serde(default = "default_device")]
    pub vds_device: u8,
    #[serde(default = "default_area")]
    pub vds_area: u8,
}

fn default_device() -> u8 {
    1
}

fn default_area() -> u8 {
    1
}

impl DeviceConfig {
    /// Decodes and validates `key_hex` into a 16-byte AES key. Returns
    /// `Ok(None)` for unencrypted devices.
    pub fn key_bytes(&self) -> VdsResult<Option<[u8; KEY_LEN]>> {
        if !self.encrypted {
            return Ok(None);
        }
        let hex_str = self.key_hex.as_deref().ok_or_else(|| {
            VdsError::Config(format!(
                "device {:?} is marked encrypted but has no key_hex",
                self.identity
            ))
        })?;
        let bytes = hex::decode(hex_str).map_err(|e| {
            VdsError::Config(format!(
                "device {:?} key_hex is not valid hex: {e}",
                self.identity
            ))
        })?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            VdsError::Config(format!(
                "device {:?} key must decode to {KEY_LEN} bytes, got {}",
                self.identity,
                v.len()
            ))
        })?;
        Ok(Some(key))
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> VdsResult<Self> {
        let config: ServerConfig =
            toml::from_str(s).map_err(|e| VdsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VdsResult<()> {
        let mut identities = HashSet::new();
        let mut key_ids = HashSet::new();

        for device in &self.devices {
            if !identities.insert(device.identity.clone()) {
                return Err(VdsError::Config(format!(
                    "duplicate device identity {:?}",
                    device.identity
                )));
            }
            if device.encrypted {
                device.key_bytes()?;
                if device.key_id != 0 && !key_ids.insert(device.key_id) {
                    return Err(VdsError::Config(format!(
                        "duplicate key_id {}",
                        device.key_id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn find_by_key_id(&self, key_id: u16) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.key_id == key_id)
    }

    pub fn find_by_identity(&self, identity: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.identity == identity)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_toml() -> &'static str {
        r#"
            bind_addr = "0.0.0.0"
            port = 4100
            polling_interval_secs = 5

            [[devices]]
            identity = "123456789"
            encrypted = true
            key_id = 1
            key_hex = "000102030405060708090a0b0c0d0e0f"
            test_interval_minutes = 15
        "#
    }

    #[test]
    fn parses_and_validates_a_well_formed_config() {
        let config = ServerConfig::from_toml_str(sample_toml()).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.port, 4100);
        let device = &config.devices[0];
        assert_eq!(device.key_bytes().unwrap().unwrap().len(), 16);
    }

    #[test]
    fn rejects_non_hex_key() {
        let device = DeviceConfig {
            identity: "1".into(),
            encrypted: true,
            key_id: 1,
            key_hex: Some("not-hex-zz".into()),
            test_interval_minutes: 0,
            vds_device: 1,
            vds_area: 1,
        };
        assert!(device.key_bytes().is_err());
    }

    #[test]
    fn rejects_wrong_length_key() {
        let device = DeviceConfig {
            identity: "1".into(),
            encrypted: true,
            key_id: 1,
            key_hex: Some("aabb".into()),
            test_interval_minutes: 0,
            vds_device: 1,
            vds_area: 1,
        };
        assert!(device.key_bytes().is_err());
    }

    #[test]
    fn rejects_duplicate_identity() {
        let toml = format!("{}\n{}", sample_toml(), sample_toml());
        assert!(ServerConfig::from_toml_str(&toml).is_err());
    }
}
