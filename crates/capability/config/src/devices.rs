//! 设备描述文件加载与校验。

use crate::ConfigError;
use domain::DeviceDescriptor;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// 设备描述文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFormat {
    Yaml,
    Json,
}

impl DeviceFormat {
    /// 按扩展名判断；`.json` 为 JSON，其余按 YAML 处理
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<DeviceDescriptor>,
}

/// 顶层既可以直接是 `devices`，也可以嵌在 `plc` 下
#[derive(Debug, Deserialize)]
struct DeviceFile {
    #[serde(default)]
    devices: Vec<DeviceDescriptor>,
    #[serde(default)]
    plc: Option<DeviceList>,
}

impl DeviceFile {
    fn into_devices(self) -> Vec<DeviceDescriptor> {
        let mut devices = self.devices;
        if let Some(plc) = self.plc {
            devices.extend(plc.devices);
        }
        devices
    }
}

/// 读取并校验设备描述文件。
pub fn load_devices(path: impl AsRef<Path>) -> Result<Vec<DeviceDescriptor>, ConfigError> {
    let path = path.as_ref();
    let path_text = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path_text.clone(),
        source,
    })?;
    let devices = parse_devices(&text, DeviceFormat::from_path(path)).map_err(|e| match e {
        ConfigError::Parse { reason, .. } => ConfigError::Parse {
            path: path_text.clone(),
            reason,
        },
        other => other,
    })?;
    info!(
        path = %path_text,
        devices = devices.len(),
        points = devices.iter().map(|d| d.points.len()).sum::<usize>(),
        "loaded device descriptors"
    );
    Ok(devices)
}

/// 解析设备描述文本并校验名称唯一性。
pub fn parse_devices(text: &str, format: DeviceFormat) -> Result<Vec<DeviceDescriptor>, ConfigError> {
    let file: DeviceFile = match format {
        DeviceFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?,
        DeviceFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?,
    };
    let devices = file.into_devices();
    validate(&devices)?;
    Ok(devices)
}

fn parse_error(reason: String) -> ConfigError {
    ConfigError::Parse {
        path: "<inline>".to_string(),
        reason,
    }
}

fn validate(devices: &[DeviceDescriptor]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for device in devices {
        if device.name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "devices[].name".to_string(),
                "device name is empty".to_string(),
            ));
        }
        if !names.insert(device.name.as_str()) {
            return Err(ConfigError::Invalid(
                "devices[].name".to_string(),
                format!("duplicate device name: {}", device.name),
            ));
        }

        let mut points = HashSet::new();
        for point in &device.points {
            if !points.insert(point.name.as_str()) {
                return Err(ConfigError::Invalid(
                    format!("devices[{}].points[].name", device.name),
                    format!("duplicate point name: {}", point.name),
                ));
            }
        }
    }
    Ok(())
}
