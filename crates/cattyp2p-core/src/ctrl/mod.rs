//! 控制通道抽象
//!
//! 实际的 wpa_supplicant 控制 socket（Unix datagram、attach/detach 语义）
//! 由调用方提供，驱动只依赖这里的 trait。请求通道是严格的一问一答；
//! 通知通道是只追加、破坏性消费的事件流，读出的事件无法重放。

use async_trait::async_trait;

/// wpa_supplicant 控制接口端口
///
/// 请求通道和通知通道是两条独立的连接：命令响应永远不会
/// 出现在事件流里，反之亦然。
#[async_trait]
pub trait ControlPort: Send + Sync {
    /// 发送一条命令并返回响应文本
    ///
    /// 响应要么是多行 `key=value` 状态块，要么是动作命令的
    /// `OK` / `FAIL` 确认。
    async fn request(&self, cmd: &str) -> anyhow::Result<String>;

    /// 通知队列中是否有待处理事件（非阻塞探测）
    async fn pending(&self) -> anyhow::Result<bool>;

    /// 取出最旧的一条事件
    ///
    /// 仅当 [`pending`](ControlPort::pending) 返回 true 后调用。
    async fn recv(&self) -> anyhow::Result<String>;
}
