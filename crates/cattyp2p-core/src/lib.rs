//! Cattyp2p Core Library
//!
//! wpa_supplicant 控制接口的 Wi-Fi Direct (P2P) 协商驱动。
//! 负责把多步协商流程（对端发现、GO 协商、WPS 授权、入组）驱动到
//! 终态：发命令、在事件流上等待终结事件、解析为结构化结果。
//!
//! 传输层本身（Unix datagram socket、attach/detach）不在本 crate
//! 范围内，由调用方实现 [`ControlPort`] 提供；测试里用脚本化的
//! mock 端口代替。
//!
//! # 模块
//!
//! - **ctrl**: 控制通道 trait（请求/响应 + 可轮询的事件流）
//! - **events**: 通知文本到类型化事件的解析
//! - **driver**: 发现控制、协商编排和会话状态
//! - **config**: 驱动设置的存储和读取
//!
//! # 使用示例
//!
//! ```ignore
//! use cattyp2p_core::{Expectation, P2pDevice};
//! use std::time::Duration;
//!
//! let mut dev = P2pDevice::new(port, "wlan0");
//! let pin = dev.wps_pin();
//! let result = dev
//!     .go_neg_init(
//!         "02:00:00:00:01:00",
//!         &pin,
//!         "display",
//!         Duration::from_secs(15),
//!         Some(7),
//!         Expectation::Success,
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod ctrl;
pub mod driver;
pub mod error;
pub mod events;

pub use config::DriverSettings;
pub use ctrl::ControlPort;
pub use driver::{Expectation, NegotiationResult, P2pDevice, SessionState, group_form_result};
pub use error::P2pError;
pub use events::{GroupCredential, GroupRole, GroupStarted, P2pEvent, ParseError};
