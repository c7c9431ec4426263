//! P2P 协商驱动
//!
//! 按控制接口的命令序列编排各个协商流程：
//!
//! 1. 发现对端（`P2P_FIND` + `P2P_PEER` 轮询，见 [`discovery`]）
//! 2. 发出 `P2P_CONNECT` / `P2P_GROUP_ADD` 等动作命令
//! 3. 在事件流上等待 `P2P-GROUP-STARTED` / `P2P-GO-NEG-FAILURE` 终结事件
//!
//! 事件流是共享且破坏性消费的，并不按请求划分作用域。每次发出
//! 会跟随事件等待的命令前，必须先清空残留事件 (drain)，否则上一次
//! 操作遗留的事件会被误认为本次结果；匹配成功后同样清空一次。

use std::time::Duration;

use log::{debug, info};

use crate::config::DriverSettings;
use crate::ctrl::ControlPort;
use crate::error::P2pError;
use crate::events::{self, GO_NEG_FAILURE_TAG, GROUP_STARTED_TAG, GroupStarted, P2pEvent};

mod discovery;

/// 协商等待的期望结果
///
/// 显式区分"期待成功"与"故意验证失败路径"：超时在后者中是
/// 可接受分支，在前者中是致命错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Success,
    Failure,
}

/// 一次协商尝试的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationResult {
    /// 组建成功
    Formed(GroupStarted),
    /// GO 协商明确失败，status 码来自事件
    GoNegFailed(u32),
    /// 截止时间内无终结事件（仅在 [`Expectation::Failure`] 下出现）
    TimedOut,
}

impl NegotiationResult {
    /// 只保留成功组建，把失败分支升级为对应错误
    pub fn expect_formed(self) -> Result<GroupStarted, P2pError> {
        match self {
            NegotiationResult::Formed(group) => Ok(group),
            NegotiationResult::GoNegFailed(status) => Err(P2pError::NegotiationFailed(status)),
            NegotiationResult::TimedOut => Err(P2pError::NegotiationTimedOut),
        }
    }
}

/// 会话状态，随设备句柄存续
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    last_pin: Option<String>,
    group_ifname: Option<String>,
}

impl SessionState {
    /// 最近一次生成的 WPS PIN
    pub fn last_pin(&self) -> Option<&str> {
        self.last_pin.as_deref()
    }

    /// 当前关联的组接口名
    pub fn group_ifname(&self) -> Option<&str> {
        self.group_ifname.as_deref()
    }
}

/// 将匹配到的终结事件行按期望分类
///
/// 与期望相反的终结事件（期待失败却组建成功，或反之）是
/// [`P2pError::UnexpectedOutcome`]。
pub fn group_form_result(
    line: &str,
    expectation: Expectation,
) -> Result<NegotiationResult, P2pError> {
    match (expectation, events::classify(line)?) {
        (Expectation::Success, Some(P2pEvent::GroupStarted(group))) => {
            Ok(NegotiationResult::Formed(group))
        }
        (Expectation::Failure, Some(P2pEvent::GoNegFailure { status })) => {
            Ok(NegotiationResult::GoNegFailed(status))
        }
        (expected, _) => Err(P2pError::UnexpectedOutcome {
            expected,
            line: line.to_string(),
        }),
    }
}

/// 单个 wpa_supplicant 设备句柄上的 P2P 驱动
///
/// 同一句柄上所有操作串行执行；事件流只有一个消费者，
/// 不允许并发的等待。
pub struct P2pDevice<P: ControlPort> {
    port: P,
    settings: DriverSettings,
    session: SessionState,
}

impl<P: ControlPort> P2pDevice<P> {
    pub fn new(port: P, interface: &str) -> Self {
        let settings = DriverSettings {
            interface: interface.to_string(),
            ..DriverSettings::default()
        };
        Self::with_settings(port, settings)
    }

    pub fn with_settings(port: P, settings: DriverSettings) -> Self {
        Self {
            port,
            settings,
            session: SessionState::default(),
        }
    }

    pub fn ifname(&self) -> &str {
        &self.settings.interface
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub(crate) async fn request(&self, cmd: &str) -> Result<String, P2pError> {
        debug!("{}: CTRL: {}", self.ifname(), cmd);
        Ok(self.port.request(cmd).await?)
    }

    /// 发送动作命令；响应不含 `OK` 即视为拒绝
    pub(crate) async fn ok_command(&self, cmd: &str) -> Result<(), P2pError> {
        let response = self.request(cmd).await?;
        if response.contains("OK") {
            Ok(())
        } else {
            Err(P2pError::CommandRejected {
                cmd: cmd.to_string(),
                response: response.trim().to_string(),
            })
        }
    }

    pub async fn ping(&self) -> Result<bool, P2pError> {
        Ok(self.request("PING").await?.contains("PONG"))
    }

    /// 批量复位：停止发现、清空对端表、移除所有组/网络/凭据
    pub async fn reset(&mut self) -> Result<(), P2pError> {
        self.request("P2P_STOP_FIND").await?;
        self.request("P2P_FLUSH").await?;
        self.request("P2P_GROUP_REMOVE *").await?;
        self.request("REMOVE_NETWORK *").await?;
        self.request("REMOVE_CRED *").await?;
        self.session = SessionState::default();
        Ok(())
    }

    /// 从 `STATUS` 的 key=value 块中取出一个字段
    pub async fn status_field(&self, field: &str) -> Result<Option<String>, P2pError> {
        let response = self.request("STATUS").await?;
        for line in response.lines() {
            if let Some((name, value)) = line.split_once('=')
                && name == field
            {
                return Ok(Some(value.to_string()));
            }
        }
        Ok(None)
    }

    /// 本端的 P2P 设备地址
    pub async fn p2p_dev_addr(&self) -> Result<Option<String>, P2pError> {
        self.status_field("p2p_device_address").await
    }

    /// 生成带校验位的随机 8 位 WPS PIN 并记入会话状态
    pub fn wps_pin(&mut self) -> String {
        let body: u32 = rand::random::<u32>() % 10_000_000;
        let pin = format!("{:07}{}", body, wps_pin_checksum(body));
        self.session.last_pin = Some(pin.clone());
        pin
    }

    /// 清空并丢弃所有排队的通知
    pub async fn drain_events(&self) -> Result<(), P2pError> {
        while self.port.pending().await? {
            let ev = self.port.recv().await?;
            debug!("{}: {}", self.ifname(), ev);
        }
        Ok(())
    }

    /// 在截止时间内等待第一条包含任一标签的事件
    ///
    /// 事件按到达顺序匹配，先到先赢；不匹配的行记 debug 后丢弃。
    pub async fn wait_event(
        &self,
        tags: &[&str],
        timeout: Duration,
    ) -> Result<Option<String>, P2pError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            while self.port.pending().await? {
                let ev = self.port.recv().await?;
                debug!("{}: {}", self.ifname(), ev);
                if tags.iter().any(|tag| ev.contains(tag)) {
                    return Ok(Some(ev));
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(self.settings.poll_interval_ms)).await;
        }
    }

    /// 等待协商终结事件并分类
    ///
    /// 超时只有在 [`Expectation::Failure`] 下返回
    /// [`NegotiationResult::TimedOut`]，否则升级为
    /// [`P2pError::NegotiationTimedOut`]。
    pub async fn go_neg_result(
        &mut self,
        timeout: Duration,
        expectation: Expectation,
    ) -> Result<NegotiationResult, P2pError> {
        let Some(ev) = self
            .wait_event(&[GROUP_STARTED_TAG, GO_NEG_FAILURE_TAG], timeout)
            .await?
        else {
            return match expectation {
                Expectation::Failure => Ok(NegotiationResult::TimedOut),
                Expectation::Success => Err(P2pError::NegotiationTimedOut),
            };
        };
        self.drain_events().await?;

        let result = group_form_result(&ev, expectation)?;
        if let NegotiationResult::Formed(group) = &result {
            self.session.group_ifname = Some(group.ifname.clone());
        }
        Ok(result)
    }

    /// 预授权连接：不发起协商，只登记 peer+PIN+method
    ///
    /// 命令得到确认即返回，不等待终结事件。
    pub async fn go_neg_auth(
        &mut self,
        peer: &str,
        pin: &str,
        method: &str,
        go_intent: Option<u8>,
    ) -> Result<(), P2pError> {
        if !self
            .discover_peer(peer, true, self.settings.discovery_timeout_secs)
            .await?
        {
            return Err(P2pError::PeerNotFound(peer.to_string()));
        }
        self.drain_events().await?;

        let mut cmd = format!("P2P_CONNECT {peer} {pin} {method} auth");
        if let Some(intent) = go_intent {
            cmd.push_str(&format!(" go_intent={intent}"));
        }
        self.ok_command(&cmd).await
    }

    /// 发起完整 GO 协商
    ///
    /// `timeout` 为零表示只发命令不等待（fire-and-forget，
    /// 不消费任何已排队事件），返回 `Ok(None)`。
    pub async fn go_neg_init(
        &mut self,
        peer: &str,
        pin: &str,
        method: &str,
        timeout: Duration,
        go_intent: Option<u8>,
        expectation: Expectation,
    ) -> Result<Option<NegotiationResult>, P2pError> {
        if !self
            .discover_peer(peer, true, self.settings.discovery_timeout_secs)
            .await?
        {
            return Err(P2pError::PeerNotFound(peer.to_string()));
        }
        // 只有命令后跟随事件等待时才需要清残留；
        // fire-and-forget 不碰事件队列
        if !timeout.is_zero() {
            self.drain_events().await?;
        }

        let mut cmd = format!("P2P_CONNECT {peer} {pin} {method}");
        if let Some(intent) = go_intent {
            cmd.push_str(&format!(" go_intent={intent}"));
        }
        self.ok_command(&cmd).await?;

        if timeout.is_zero() {
            return Ok(None);
        }
        self.go_neg_result(timeout, expectation).await.map(Some)
    }

    /// 自建组并成为 GO
    ///
    /// 没有对端协商，这条路径上不存在失败事件，只等组建成功；
    /// 超时是致命错误。
    pub async fn start_go(&mut self) -> Result<GroupStarted, P2pError> {
        self.drain_events().await?;
        self.ok_command("P2P_GROUP_ADD").await?;

        let timeout = Duration::from_secs(self.settings.formation_timeout_secs);
        let Some(ev) = self.wait_event(&[GROUP_STARTED_TAG], timeout).await? else {
            return Err(P2pError::NegotiationTimedOut);
        };
        self.drain_events().await?;

        let group = group_form_result(&ev, Expectation::Success)?.expect_formed()?;
        self.session.group_ifname = Some(group.ifname.clone());
        info!(
            "{}: ✅ group started on {} as {}",
            self.ifname(),
            group.ifname,
            group.role
        );
        Ok(group)
    }

    /// GO 侧带外登记客户端 PIN（`WPS_PIN any`）
    ///
    /// 只检查命令被接受，不等待事件。
    pub async fn authorize_client(&self, pin: &str) -> Result<(), P2pError> {
        let cmd = format!("WPS_PIN any {pin}");
        let response = self.request(&cmd).await?;
        if response.contains("FAIL") {
            return Err(P2pError::CommandRejected {
                cmd,
                response: response.trim().to_string(),
            });
        }
        Ok(())
    }

    /// 加入已有的组（`join` 限定符，不触发 GO 协商）
    pub async fn connect_group(
        &mut self,
        go_addr: &str,
        pin: &str,
        timeout: Duration,
    ) -> Result<Option<GroupStarted>, P2pError> {
        if !self
            .discover_peer(go_addr, true, self.settings.discovery_timeout_secs)
            .await?
        {
            return Err(P2pError::PeerNotFound(go_addr.to_string()));
        }
        if !timeout.is_zero() {
            self.drain_events().await?;
        }

        self.ok_command(&format!("P2P_CONNECT {go_addr} {pin} join"))
            .await?;
        if timeout.is_zero() {
            return Ok(None);
        }

        let Some(ev) = self.wait_event(&[GROUP_STARTED_TAG], timeout).await? else {
            return Err(P2pError::NegotiationTimedOut);
        };
        self.drain_events().await?;

        let group = group_form_result(&ev, Expectation::Success)?.expect_formed()?;
        self.session.group_ifname = Some(group.ifname.clone());
        Ok(Some(group))
    }

    /// 移除组；缺省目标为会话中记录的组接口，其次是设备接口
    pub async fn remove_group(&mut self, ifname: Option<&str>) -> Result<(), P2pError> {
        let target = ifname
            .map(str::to_string)
            .or_else(|| self.session.group_ifname.clone())
            .unwrap_or_else(|| self.ifname().to_string());
        self.ok_command(&format!("P2P_GROUP_REMOVE {target}")).await?;
        self.session.group_ifname = None;
        Ok(())
    }
}

/// WPS PIN 校验位（权重 3/1 交替的模 10 校验）
fn wps_pin_checksum(mut body: u32) -> u32 {
    let mut accum = 0;
    while body != 0 {
        accum += 3 * (body % 10);
        body /= 10;
        accum += body % 10;
        body /= 10;
    }
    (10 - accum % 10) % 10
}
