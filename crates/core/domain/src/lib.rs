pub mod data;
pub mod device;

pub use data::{DeviceSnapshot, PointValueData, ValueMap, now_epoch_ms};
pub use device::{DataPoint, DataType, DeviceDescriptor};
