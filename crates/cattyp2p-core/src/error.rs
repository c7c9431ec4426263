//! 错误分类
//!
//! 所有分支都作为可检查的独立结果上报给调用方；只有未识别的
//! 事件行和发现轮询中的"尚未发现"会被低级别日志吞掉。

use crate::driver::Expectation;
use crate::events::ParseError;

/// P2P 驱动错误
#[derive(Debug, thiserror::Error)]
pub enum P2pError {
    /// 发现超时，对端始终未进入对端表
    #[error("peer {0} not found within discovery deadline")]
    PeerNotFound(String),

    /// 动作命令未得到 OK 确认（终态，不会进入事件等待）
    #[error("command rejected: `{cmd}` -> {response}")]
    CommandRejected { cmd: String, response: String },

    /// 截止时间内没有终结事件（期待成功时为致命错误）
    #[error("no terminal negotiation event within deadline")]
    NegotiationTimedOut,

    /// 观察到明确的 GO 协商失败事件
    #[error("GO negotiation failed with status {0}")]
    NegotiationFailed(u32),

    /// 标签已识别但事件载荷不符合文法
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// 观察到与期望相反的终结事件
    #[error("unexpected outcome while expecting {expected:?}: {line}")]
    UnexpectedOutcome { expected: Expectation, line: String },

    /// 控制通道传输失败
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
