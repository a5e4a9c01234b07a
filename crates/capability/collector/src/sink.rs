//! 采集结果下游。

use async_trait::async_trait;
use domain::DeviceSnapshot;
use tokio::sync::mpsc;
use tracing::info;

/// 下游写入错误。
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,
}

/// 采集结果下游抽象（缓存、推送、持久化等由外部实现）。
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn publish(&self, snapshot: DeviceSnapshot) -> Result<(), SinkError>;
}

/// 仅输出日志。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl SnapshotSink for LogSink {
    async fn publish(&self, snapshot: DeviceSnapshot) -> Result<(), SinkError> {
        info!(
            target: "plc.collector",
            device = %snapshot.device_name,
            values = ?snapshot.values,
            "collected device data"
        );
        Ok(())
    }
}

/// 通过 mpsc 通道交给下游任务。
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<DeviceSnapshot>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<DeviceSnapshot>) -> Self {
        Self { tx }
    }

    /// 创建通道并返回接收端。
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DeviceSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl SnapshotSink for ChannelSink {
    async fn publish(&self, snapshot: DeviceSnapshot) -> Result<(), SinkError> {
        self.tx.send(snapshot).await.map_err(|_| SinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{PointValueData, ValueMap};

    #[tokio::test]
    async fn test_channel_sink_delivers_and_reports_closed() {
        let (sink, mut rx) = ChannelSink::channel(4);
        let mut values = ValueMap::new();
        values.insert("温度".to_string(), PointValueData::I64(25));

        sink.publish(DeviceSnapshot::new("boiler", values)).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.device_name, "boiler");
        assert_eq!(received.values["温度"], PointValueData::I64(25));

        drop(rx);
        let err = sink
            .publish(DeviceSnapshot::new("boiler", ValueMap::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }
}
