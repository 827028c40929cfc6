//! Ingestion 错误类型

use thiserror::Error;

/// 视觉与时钟适配器错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 视觉 socket 绑定失败
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// 加入组播组失败
    #[error("failed to join multicast group {group}: {source}")]
    JoinMulticast {
        group: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置的地址不是 IPv4 `group:port`
    #[error("invalid vision address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    /// 数据报解码失败
    #[error("failed to decode datagram from {sender}: {message}")]
    Decode { sender: String, message: String },

    /// 下游通道已关闭
    #[error("event channel closed")]
    ChannelClosed,

    /// socket 读取失败
    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
