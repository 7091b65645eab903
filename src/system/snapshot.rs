use std::fmt;
use std::net::SocketAddr;

use serde::de::{self, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::platform;

/// One persisted capture. Field names are the on-disk format shared with
/// snapshots written by earlier versions of the tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub processes: Vec<ProcessEntry>,
    pub memory: MemoryStats,
    pub connections: Vec<ConnectionEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cmdline: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: u64,
    pub available: u64,
    pub percent: f64,
    pub used: u64,
    pub free: u64,
}

impl MemoryStats {
    /// Percentage of memory in use, rounded to one decimal.
    pub fn usage_percent(total: u64, available: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let used = total.saturating_sub(available) as f64;
        (used / total as f64 * 1000.0).round() / 10.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub fd: i32,
    pub family: SocketFamily,
    #[serde(rename = "type")]
    pub kind: SocketKind,
    #[serde(with = "endpoint")]
    pub laddr: Option<SocketAddr>,
    #[serde(with = "endpoint")]
    pub raddr: Option<SocketAddr>,
    pub status: ConnectionStatus,
}

/// Address family, stored as the platform's numeric `AF_*` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketFamily {
    Inet,
    Inet6,
}

impl SocketFamily {
    pub fn as_raw(self) -> i32 {
        match self {
            SocketFamily::Inet => platform::AF_INET,
            SocketFamily::Inet6 => platform::af_inet6(),
        }
    }

    /// Accepts the `AF_INET6` value of every supported platform so snapshots
    /// written on one OS still load on another.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            2 => Some(SocketFamily::Inet),
            10 | 23 | 30 => Some(SocketFamily::Inet6),
            _ => None,
        }
    }
}

impl Serialize for SocketFamily {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_raw())
    }
}

impl<'de> Deserialize<'de> for SocketFamily {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        SocketFamily::from_raw(raw)
            .ok_or_else(|| de::Error::custom(format!("unknown address family {raw}")))
    }
}

/// Socket type, stored as `SOCK_STREAM` (1) or `SOCK_DGRAM` (2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Stream,
    Datagram,
}

impl Serialize for SocketKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = match self {
            SocketKind::Stream => 1,
            SocketKind::Datagram => 2,
        };
        serializer.serialize_i32(raw)
    }
}

impl<'de> Deserialize<'de> for SocketKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match i64::deserialize(deserializer)? {
            1 => Ok(SocketKind::Stream),
            2 => Ok(SocketKind::Datagram),
            other => Err(de::Error::custom(format!("unknown socket type {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    DeleteTcb,
    Idle,
    Bound,
    None,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Established => "ESTABLISHED",
            ConnectionStatus::SynSent => "SYN_SENT",
            ConnectionStatus::SynRecv => "SYN_RECV",
            ConnectionStatus::FinWait1 => "FIN_WAIT1",
            ConnectionStatus::FinWait2 => "FIN_WAIT2",
            ConnectionStatus::TimeWait => "TIME_WAIT",
            ConnectionStatus::Close => "CLOSE",
            ConnectionStatus::CloseWait => "CLOSE_WAIT",
            ConnectionStatus::LastAck => "LAST_ACK",
            ConnectionStatus::Listen => "LISTEN",
            ConnectionStatus::Closing => "CLOSING",
            ConnectionStatus::DeleteTcb => "DELETE_TCB",
            ConnectionStatus::Idle => "IDLE",
            ConnectionStatus::Bound => "BOUND",
            ConnectionStatus::None => "NONE",
        };
        f.write_str(label)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `[ip, port]` pairs, with `[]` standing for "no address".
mod endpoint {
    use super::*;

    pub fn serialize<S: Serializer>(
        addr: &Option<SocketAddr>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match addr {
            Some(addr) => (addr.ip().to_string(), addr.port()).serialize(serializer),
            None => <[u8; 0]>::default().serialize(serializer),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Pair(String, u16),
        Other(Vec<IgnoredAny>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SocketAddr>, D::Error> {
        match Wire::deserialize(deserializer)? {
            Wire::Pair(ip, port) => {
                let ip = ip
                    .parse()
                    .map_err(|_| de::Error::custom(format!("invalid ip address {ip:?}")))?;
                Ok(Some(SocketAddr::new(ip, port)))
            }
            Wire::Other(items) if items.is_empty() => Ok(None),
            Wire::Other(items) => Err(de::Error::invalid_length(
                items.len(),
                &"an [ip, port] pair or an empty list",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_percent_rounds_to_one_decimal() {
        assert_eq!(MemoryStats::usage_percent(3, 2), 33.3);
        assert_eq!(MemoryStats::usage_percent(1000, 0), 100.0);
        assert_eq!(MemoryStats::usage_percent(0, 0), 0.0);
    }

    #[test]
    fn null_name_and_cmdline_load_as_empty() {
        let entry: ProcessEntry =
            serde_json::from_str(r#"{"pid": 2, "name": null, "cmdline": null}"#).unwrap();
        assert_eq!(entry.pid, 2);
        assert!(entry.name.is_empty());
        assert!(entry.cmdline.is_empty());
    }

    #[test]
    fn connection_uses_legacy_field_layout() {
        let json = r#"{"fd": -1, "family": 2, "type": 1,
            "laddr": ["127.0.0.1", 8080], "raddr": [], "status": "LISTEN"}"#;
        let conn: ConnectionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(conn.family, SocketFamily::Inet);
        assert_eq!(conn.kind, SocketKind::Stream);
        assert_eq!(conn.laddr, Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(conn.raddr, None);
        assert_eq!(conn.status, ConnectionStatus::Listen);

        let value = serde_json::to_value(&conn).unwrap();
        assert_eq!(value["raddr"], serde_json::json!([]));
        assert_eq!(value["laddr"], serde_json::json!(["127.0.0.1", 8080]));
        assert_eq!(value["type"], serde_json::json!(1));
    }

    #[test]
    fn status_names_match_tcp_state_labels() {
        let json = serde_json::to_string(&ConnectionStatus::FinWait1).unwrap();
        assert_eq!(json, "\"FIN_WAIT1\"");
        assert_eq!(ConnectionStatus::TimeWait.to_string(), "TIME_WAIT");
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        let json = r#"{"fd": 3, "family": 2, "type": 2,
            "laddr": ["not-an-ip", 53], "raddr": [], "status": "NONE"}"#;
        assert!(serde_json::from_str::<ConnectionEntry>(json).is_err());

        let json = r#"{"fd": 3, "family": 2, "type": 2,
            "laddr": ["10.0.0.1"], "raddr": [], "status": "NONE"}"#;
        assert!(serde_json::from_str::<ConnectionEntry>(json).is_err());
    }

    #[test]
    fn unknown_family_is_rejected() {
        let json = r#"{"fd": 3, "family": 1, "type": 1,
            "laddr": [], "raddr": [], "status": "NONE"}"#;
        assert!(serde_json::from_str::<ConnectionEntry>(json).is_err());
    }
}
