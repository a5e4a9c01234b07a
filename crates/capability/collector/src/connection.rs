//! 连接管理：每台设备缓存一个已连接的适配器。

use plc_protocol::{AdapterFactory, BoxedAdapter, ProtocolError};
use domain::DeviceDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// 共享的适配器句柄；同一时刻只允许一个调用方操作
pub type SharedAdapter = Arc<Mutex<BoxedAdapter>>;

struct CacheEntry {
    adapter: SharedAdapter,
    created_at: Instant,
}

impl CacheEntry {
    fn is_healthy(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// 连接管理器
///
/// - 以设备名为键缓存适配器，存活时间达到 TTL 后重建（不做探活）
/// - 适配器自身报告连接已丢失（超时、传输错误）时提前重建
/// - 同一设备的创建过程按键串行，不会同时打开两条连接
/// - 重建前先断开旧适配器；串口同一时刻只能被打开一次
/// - 连接失败不缓存，下一次请求重新尝试
pub struct ConnectionManager {
    factory: Arc<dyn AdapterFactory>,
    ttl: Duration,
    slots: std::sync::Mutex<HashMap<String, Slot>>,
}

impl ConnectionManager {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(factory: Arc<dyn AdapterFactory>) -> Self {
        Self::with_ttl(factory, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(factory: Arc<dyn AdapterFactory>, ttl: Duration) -> Self {
        Self {
            factory,
            ttl,
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 获取设备的已连接适配器，必要时新建或重建。
    pub async fn get_connection(&self, device: &DeviceDescriptor) -> Result<SharedAdapter, ProtocolError> {
        let slot = self.slot(&device.name);
        let mut entry = slot.lock().await;

        let now = Instant::now();
        if let Some(cached) = entry.as_ref() {
            if cached.is_healthy(self.ttl, now) && cached.adapter.lock().await.is_connected() {
                return Ok(cached.adapter.clone());
            }
        }

        let recycled = match entry.take() {
            Some(stale) => {
                let reason = if stale.is_healthy(self.ttl, now) { "lost" } else { "expired" };
                info!(
                    target: "plc.connection",
                    device = %device.name,
                    age_ms = now.saturating_duration_since(stale.created_at).as_millis() as u64,
                    reason,
                    "recreating connection"
                );
                close(&device.name, &stale.adapter).await;
                true
            }
            None => false,
        };

        let mut adapter = self.factory.create(device)?;
        adapter.connect().await?;

        let shared: SharedAdapter = Arc::new(Mutex::new(adapter));
        *entry = Some(CacheEntry {
            adapter: shared.clone(),
            created_at: Instant::now(),
        });

        plc_telemetry::record_connection_opened();
        if recycled {
            plc_telemetry::record_connection_recycled();
        }
        info!(target: "plc.connection", device = %device.name, protocol = %device.protocol, "connection established");
        Ok(shared)
    }

    /// 断开并清空所有缓存的适配器。
    pub async fn shutdown(&self) {
        let slots: Vec<(String, Slot)> = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            slots.drain().collect()
        };
        for (name, slot) in slots {
            if let Some(entry) = slot.lock().await.take() {
                close(&name, &entry.adapter).await;
            }
        }
    }

    fn slot(&self, device_name: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(device_name.to_string()).or_default().clone()
    }
}

async fn close(device_name: &str, adapter: &SharedAdapter) {
    if let Err(err) = adapter.lock().await.disconnect().await {
        warn!(target: "plc.connection", device = %device_name, error = %err, "failed to disconnect adapter");
    }
}
