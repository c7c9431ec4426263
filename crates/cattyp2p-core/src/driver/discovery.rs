//! 对端发现
//!
//! 发现是后台无线扫描，没有单一的"找到了"终结事件；对端出现在
//! 内部对端表里是唯一可观察信号。所以这里不等事件，而是对
//! `P2P_PEER` 谓词做 1 秒粒度的有界轮询。

use std::time::Duration;

use log::info;

use crate::ctrl::ControlPort;
use crate::driver::P2pDevice;
use crate::error::P2pError;

impl<P: ControlPort> P2pDevice<P> {
    /// 启动对端发现
    pub async fn p2p_find(&self, social: bool) -> Result<(), P2pError> {
        if social {
            self.ok_command("P2P_FIND type=social").await
        } else {
            self.ok_command("P2P_FIND").await
        }
    }

    pub async fn p2p_stop_find(&self) -> Result<(), P2pError> {
        self.ok_command("P2P_STOP_FIND").await
    }

    pub async fn p2p_listen(&self) -> Result<(), P2pError> {
        self.ok_command("P2P_LISTEN").await
    }

    /// 对端是否已在设备的对端表中
    ///
    /// `full` 要求对端经过完整的发现交换：只出现在 probe 请求中
    /// （`[PROBE_REQ_ONLY]` 标志）的对端不算。
    pub async fn peer_known(&self, peer: &str, full: bool) -> Result<bool, P2pError> {
        let response = self.request(&format!("P2P_PEER {peer}")).await?;
        if !response.to_lowercase().contains(&peer.to_lowercase()) {
            return Ok(false);
        }
        if !full {
            return Ok(true);
        }
        Ok(!response.contains("[PROBE_REQ_ONLY]"))
    }

    /// 发现指定对端，截止时间内未出现返回 `Ok(false)`（非错误）
    ///
    /// 对端已知时直接短路成功，不再发起新的扫描；否则发一次
    /// `P2P_FIND`，然后每秒查询一次对端表直到超时。
    ///
    /// 超时结果不区分"从未出现"与"只以 probe 形式出现"。
    pub async fn discover_peer(
        &self,
        peer: &str,
        full: bool,
        timeout_secs: u64,
    ) -> Result<bool, P2pError> {
        info!("{}: trying to discover peer {}", self.ifname(), peer);
        if self.peer_known(peer, full).await? {
            return Ok(true);
        }

        self.p2p_find(false).await?;
        for _ in 0..timeout_secs {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if self.peer_known(peer, full).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
