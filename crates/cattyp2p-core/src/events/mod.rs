//! 控制接口事件解析
//!
//! 通知行形如 `<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid="DIRECT-ab" ...`，
//! `<n>` 是 syslog 风格的级别前缀。先做廉价的标签子串过滤，命中后再做
//! 严格的字段提取。标签命中但字段不全是协议违例 ([`ParseError`])，
//! 必须上报而不能静默丢弃；不含已知标签的行不产生事件。

use std::sync::LazyLock;

use regex::Regex;

/// 组建成功的终结事件标签
pub const GROUP_STARTED_TAG: &str = "P2P-GROUP-STARTED";
/// GO 协商失败的终结事件标签
pub const GO_NEG_FAILURE_TAG: &str = "P2P-GO-NEG-FAILURE";

static STATUS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"status=([0-9]+)").unwrap());
static DEV_ADDR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{2}(:[0-9a-f]{2}){5}$").unwrap());
static PSK_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]+$").unwrap());

/// 事件解析错误
///
/// 只在标签已识别、但载荷不符合事件文法时产生。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed P2P-GROUP-STARTED event ({reason}): {line}")]
    MalformedGroupStarted { line: String, reason: &'static str },

    #[error("P2P-GO-NEG-FAILURE event without status code: {line}")]
    MalformedGoNegFailure { line: String },
}

/// 组内角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    /// `GO` — 本端是组长（AP 等价角色）
    GroupOwner,
    /// `client` — 本端加入他人的组
    Client,
}

impl GroupRole {
    /// 事件文本中的角色记号
    pub fn token(&self) -> &'static str {
        match self {
            GroupRole::GroupOwner => "GO",
            GroupRole::Client => "client",
        }
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// 组凭据：psk 十六进制与 passphrase 明文二选一
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCredential {
    Psk(String),
    Passphrase(String),
}

/// `P2P-GROUP-STARTED` 事件的结构化字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStarted {
    /// 组接口名（如 p2p-wlan0-0）
    pub ifname: String,
    pub role: GroupRole,
    /// SSID 原文，可包含除结束引号外的任意字节
    pub ssid: String,
    pub freq: u32,
    pub credential: GroupCredential,
    /// GO 的设备地址（MAC 形式）
    pub go_dev_addr: String,
}

/// 已识别的终结事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum P2pEvent {
    GroupStarted(GroupStarted),
    GoNegFailure { status: u32 },
}

/// 将一行通知文本分类为类型化事件
///
/// - 不含已知标签 → `Ok(None)`（调用方按 debug 级别记录后丢弃）
/// - 标签命中且载荷完整 → `Ok(Some(..))`
/// - 标签命中但载荷畸形 → `Err(ParseError)`
pub fn classify(line: &str) -> Result<Option<P2pEvent>, ParseError> {
    if let Some(idx) = line.find(GROUP_STARTED_TAG) {
        return parse_group_started(line, idx).map(|g| Some(P2pEvent::GroupStarted(g)));
    }
    if let Some(idx) = line.find(GO_NEG_FAILURE_TAG) {
        return parse_go_neg_failure(line, idx).map(Some);
    }
    Ok(None)
}

fn malformed(line: &str, reason: &'static str) -> ParseError {
    ParseError::MalformedGroupStarted {
        line: line.to_string(),
        reason,
    }
}

/// 提取一个以空格结尾的记号
fn take_token(rest: &str) -> Option<(&str, &str)> {
    let (token, rest) = rest.split_once(' ')?;
    if token.is_empty() { None } else { Some((token, rest)) }
}

fn parse_group_started(line: &str, tag_idx: usize) -> Result<GroupStarted, ParseError> {
    // 标签前的级别前缀 (<3> 等) 不参与解析
    let rest = &line[tag_idx + GROUP_STARTED_TAG.len()..];
    let rest = rest
        .strip_prefix(' ')
        .ok_or_else(|| malformed(line, "missing payload"))?;

    let (ifname, rest) = take_token(rest).ok_or_else(|| malformed(line, "missing ifname"))?;
    let (role_token, rest) = take_token(rest).ok_or_else(|| malformed(line, "missing role"))?;
    let role = match role_token {
        "GO" => GroupRole::GroupOwner,
        "client" => GroupRole::Client,
        _ => return Err(malformed(line, "unknown role token")),
    };

    let rest = rest
        .strip_prefix("ssid=\"")
        .ok_or_else(|| malformed(line, "missing ssid"))?;
    let (ssid, rest) = rest
        .split_once('"')
        .ok_or_else(|| malformed(line, "unterminated ssid"))?;

    let rest = rest
        .strip_prefix(" freq=")
        .ok_or_else(|| malformed(line, "missing freq"))?;
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, rest) = rest.split_at(digits_end);
    let freq: u32 = digits
        .parse()
        .map_err(|_| malformed(line, "invalid freq"))?;

    // 凭据二选一：psk=<hex> 或 passphrase="<str>"
    let rest = rest
        .strip_prefix(' ')
        .ok_or_else(|| malformed(line, "missing credential"))?;
    let (credential, rest) = if let Some(r) = rest.strip_prefix("psk=") {
        let end = r
            .find(' ')
            .ok_or_else(|| malformed(line, "missing go_dev_addr"))?;
        let (hex, r) = r.split_at(end);
        if !PSK_PATTERN.is_match(hex) {
            return Err(malformed(line, "invalid psk"));
        }
        (GroupCredential::Psk(hex.to_string()), r)
    } else if let Some(r) = rest.strip_prefix("passphrase=\"") {
        let (passphrase, r) = r
            .split_once('"')
            .ok_or_else(|| malformed(line, "unterminated passphrase"))?;
        (GroupCredential::Passphrase(passphrase.to_string()), r)
    } else {
        return Err(malformed(line, "missing credential"));
    };

    let rest = rest
        .strip_prefix(" go_dev_addr=")
        .ok_or_else(|| malformed(line, "missing go_dev_addr"))?;
    let addr_end = rest.find(' ').unwrap_or(rest.len());
    let go_dev_addr = &rest[..addr_end];
    if !DEV_ADDR_PATTERN.is_match(go_dev_addr) {
        return Err(malformed(line, "invalid go_dev_addr"));
    }
    // go_dev_addr 之后允许出现 [PERSISTENT] 等附加标志，忽略

    Ok(GroupStarted {
        ifname: ifname.to_string(),
        role,
        ssid: ssid.to_string(),
        freq,
        credential,
        go_dev_addr: go_dev_addr.to_string(),
    })
}

fn parse_go_neg_failure(line: &str, tag_idx: usize) -> Result<P2pEvent, ParseError> {
    let rest = &line[tag_idx + GO_NEG_FAILURE_TAG.len()..];
    let status = STATUS_PATTERN
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(|| ParseError::MalformedGoNegFailure {
            line: line.to_string(),
        })?;
    Ok(P2pEvent::GoNegFailure { status })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STARTED_PASSPHRASE: &str = "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-ab\" freq=2412 passphrase=\"12345678\" go_dev_addr=02:00:00:00:01:00";
    const STARTED_PSK: &str = "<3>P2P-GROUP-STARTED p2p-wlan0-1 client ssid=\"DIRECT-xy\" freq=5180 psk=6e1f5a0c9b6e1f5a0c9b6e1f5a0c9b6e1f5a0c9b6e1f5a0c9b6e1f5a0c9b6e1f go_dev_addr=02:00:00:00:02:00";

    /// 不含已知标签的行不产生事件也不报错
    #[test]
    fn test_unrecognized_lines_skipped() {
        assert_eq!(classify("<3>CTRL-EVENT-SCAN-RESULTS").unwrap(), None);
        assert_eq!(classify("<3>P2P-DEVICE-FOUND 02:00:00:00:01:00").unwrap(), None);
        assert_eq!(classify("").unwrap(), None);
    }

    #[test]
    fn test_group_started_passphrase() {
        let ev = classify(STARTED_PASSPHRASE).unwrap().unwrap();
        let P2pEvent::GroupStarted(group) = ev else {
            panic!("expected GroupStarted");
        };

        assert_eq!(group.ifname, "p2p-wlan0-0");
        assert_eq!(group.role, GroupRole::GroupOwner);
        assert_eq!(group.ssid, "DIRECT-ab");
        assert_eq!(group.freq, 2412);
        assert_eq!(
            group.credential,
            GroupCredential::Passphrase("12345678".to_string())
        );
        assert_eq!(group.go_dev_addr, "02:00:00:00:01:00");
    }

    #[test]
    fn test_group_started_psk() {
        let ev = classify(STARTED_PSK).unwrap().unwrap();
        let P2pEvent::GroupStarted(group) = ev else {
            panic!("expected GroupStarted");
        };

        assert_eq!(group.role, GroupRole::Client);
        assert!(matches!(group.credential, GroupCredential::Psk(_)));
    }

    /// 同一行重复解析结果一致
    #[test]
    fn test_parse_idempotent() {
        let first = classify(STARTED_PASSPHRASE).unwrap();
        let second = classify(STARTED_PASSPHRASE).unwrap();
        assert_eq!(first, second);
    }

    /// SSID 可以包含空格等任意字节（结束引号除外）
    #[test]
    fn test_group_started_ssid_with_spaces() {
        let line = "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-ab some name\" freq=2412 passphrase=\"12345678\" go_dev_addr=02:00:00:00:01:00";
        let ev = classify(line).unwrap().unwrap();
        let P2pEvent::GroupStarted(group) = ev else {
            panic!("expected GroupStarted");
        };
        assert_eq!(group.ssid, "DIRECT-ab some name");
    }

    /// go_dev_addr 之后的附加标志被忽略
    #[test]
    fn test_group_started_trailing_flags() {
        let line = format!("{STARTED_PASSPHRASE} [PERSISTENT]");
        let ev = classify(&line).unwrap().unwrap();
        assert!(matches!(ev, P2pEvent::GroupStarted(_)));
    }

    /// 凭据缺失或两种形式同时出现都是解析错误
    #[test]
    fn test_group_started_credential_exclusive() {
        let neither = "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-ab\" freq=2412 go_dev_addr=02:00:00:00:01:00";
        assert!(matches!(
            classify(neither),
            Err(ParseError::MalformedGroupStarted { .. })
        ));

        let both = "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-ab\" freq=2412 psk=00ff passphrase=\"x\" go_dev_addr=02:00:00:00:01:00";
        assert!(matches!(
            classify(both),
            Err(ParseError::MalformedGroupStarted { .. })
        ));
    }

    /// 标签命中但字段不全必须报错，不能静默跳过
    #[test]
    fn test_group_started_missing_fields() {
        for line in [
            "<3>P2P-GROUP-STARTED",
            "<3>P2P-GROUP-STARTED p2p-wlan0-0",
            "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO freq=2412",
            "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-ab\" passphrase=\"x\" go_dev_addr=02:00:00:00:01:00",
            "<3>P2P-GROUP-STARTED p2p-wlan0-0 owner ssid=\"DIRECT-ab\" freq=2412 passphrase=\"x\" go_dev_addr=02:00:00:00:01:00",
            "<3>P2P-GROUP-STARTED p2p-wlan0-0 GO ssid=\"DIRECT-ab\" freq=2412 passphrase=\"x\" go_dev_addr=not-a-mac",
        ] {
            assert!(
                matches!(classify(line), Err(ParseError::MalformedGroupStarted { .. })),
                "line should fail: {line}"
            );
        }
    }

    /// 角色记号与事件文本中的写法一致
    #[test]
    fn test_group_role_token() {
        assert_eq!(GroupRole::GroupOwner.token(), "GO");
        assert_eq!(GroupRole::Client.token(), "client");
        assert_eq!(GroupRole::GroupOwner.to_string(), "GO");
    }

    #[test]
    fn test_go_neg_failure() {
        let ev = classify("<3>P2P-GO-NEG-FAILURE status=2").unwrap().unwrap();
        assert_eq!(ev, P2pEvent::GoNegFailure { status: 2 });
    }

    #[test]
    fn test_go_neg_failure_missing_status() {
        assert!(matches!(
            classify("<3>P2P-GO-NEG-FAILURE"),
            Err(ParseError::MalformedGoNegFailure { .. })
        ));
    }
}
