#![allow(dead_code)]

use async_trait::async_trait;
use domain::{DataPoint, DataType, DeviceDescriptor, PointValueData, ValueMap};
use plc_protocol::{AdapterFactory, BoxedAdapter, ProtocolAdapter, ProtocolError, ProtocolKind};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// 各假适配器共享的计数器
#[derive(Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub connected: AtomicUsize,
    pub disconnected: AtomicUsize,
    pub reads: AtomicUsize,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// 假适配器：每个点位返回所属实例的编号
pub struct FakeAdapter {
    instance: usize,
    fail_reads: bool,
    connect_delay: Duration,
    drop_link_on_failure: bool,
    connected: bool,
    counters: Arc<Counters>,
}

#[async_trait]
impl ProtocolAdapter for FakeAdapter {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::SerialRegister
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        self.counters.connected.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.connected = false;
        self.counters.disconnected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_data_points(&mut self, points: &[DataPoint]) -> Result<ValueMap, ProtocolError> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            if self.drop_link_on_failure {
                self.connected = false;
            }
            let name = points.first().map(|p| p.name.as_str()).unwrap_or("-");
            return Err(ProtocolError::at_point(name, ProtocolError::NoResponse));
        }
        Ok(points
            .iter()
            .map(|p| (p.name.clone(), PointValueData::I64(self.instance as i64)))
            .collect())
    }
}

/// 假工厂：可指定读取失败的设备、连接失败开关与连接耗时
#[derive(Default)]
pub struct FakeFactory {
    pub counters: Arc<Counters>,
    pub failing_devices: HashSet<String>,
    pub refuse_connect: AtomicBool,
    pub connect_delay: Duration,
    /// 读取失败时适配器同时丢失连接
    pub drop_link_on_failure: bool,
}

impl FakeFactory {
    pub fn failing(devices: &[&str]) -> Self {
        Self {
            failing_devices: devices.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }
}

struct RefusingAdapter;

#[async_trait]
impl ProtocolAdapter for RefusingAdapter {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::BlockMemory
    }

    async fn connect(&mut self) -> Result<(), ProtocolError> {
        Err(ProtocolError::Connection("connection refused".to_string()))
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        Ok(())
    }

    async fn read_data_points(&mut self, _points: &[DataPoint]) -> Result<ValueMap, ProtocolError> {
        Err(ProtocolError::NotConnected)
    }
}

impl AdapterFactory for FakeFactory {
    fn create(&self, device: &DeviceDescriptor) -> Result<BoxedAdapter, ProtocolError> {
        let instance = self.counters.created.fetch_add(1, Ordering::SeqCst) + 1;
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Ok(Box::new(RefusingAdapter));
        }
        Ok(Box::new(FakeAdapter {
            instance,
            fail_reads: self.failing_devices.contains(&device.name),
            connect_delay: self.connect_delay,
            drop_link_on_failure: self.drop_link_on_failure,
            connected: false,
            counters: self.counters.clone(),
        }))
    }
}

pub fn device(name: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(name, "modbus")
        .with_serial("/dev/ttyUSB0", 9600, 1)
        .with_point(DataPoint::new("温度", "100", DataType::Int))
        .with_point(DataPoint::new("压力", "101", DataType::Int))
}
