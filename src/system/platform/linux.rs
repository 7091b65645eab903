use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use super::PlatformExtensions;
use crate::system::snapshot::{ConnectionEntry, ConnectionStatus, SocketFamily, SocketKind};

pub struct Platform;

const PROC_NET_TABLES: [(&str, SocketFamily, SocketKind); 4] = [
    ("/proc/net/tcp", SocketFamily::Inet, SocketKind::Stream),
    ("/proc/net/tcp6", SocketFamily::Inet6, SocketKind::Stream),
    ("/proc/net/udp", SocketFamily::Inet, SocketKind::Datagram),
    ("/proc/net/udp6", SocketFamily::Inet6, SocketKind::Datagram),
];

impl PlatformExtensions for Platform {
    const AF_INET6: i32 = 10;

    fn inet_connections(fd_budget: Duration) -> Vec<ConnectionEntry> {
        let fds = socket_fds(Instant::now() + fd_budget);
        let mut connections = Vec::new();
        for (path, family, kind) in PROC_NET_TABLES {
            // Missing tables (no IPv6, restricted sandbox) are skipped.
            let Ok(contents) = std::fs::read_to_string(path) else {
                continue;
            };
            for row in parse_table(&contents, family, kind) {
                let fd = fds.get(&row.inode).copied().unwrap_or(-1);
                connections.push(ConnectionEntry {
                    fd,
                    family,
                    kind,
                    laddr: row.laddr,
                    raddr: row.raddr,
                    status: row.status,
                });
            }
        }
        connections
    }

    fn detach(command: &mut Command) {
        command.process_group(0);
    }

    fn snapshot_base_dir() -> Option<PathBuf> {
        dirs::home_dir()
    }
}

#[derive(Debug, PartialEq)]
struct SocketRow {
    laddr: Option<SocketAddr>,
    raddr: Option<SocketAddr>,
    status: ConnectionStatus,
    inode: u64,
}

fn parse_table(contents: &str, family: SocketFamily, kind: SocketKind) -> Vec<SocketRow> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| parse_row(line, family, kind))
        .collect()
}

fn parse_row(line: &str, family: SocketFamily, kind: SocketKind) -> Option<SocketRow> {
    // sl local_address rem_address st tx:rx tr:when retrnsmt uid timeout inode
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }
    let status = match kind {
        SocketKind::Stream => tcp_state(fields[3])?,
        SocketKind::Datagram => ConnectionStatus::None,
    };
    Some(SocketRow {
        laddr: decode_address(fields[1], family)?,
        raddr: decode_address(fields[2], family)?,
        status,
        inode: fields[9].parse().ok()?,
    })
}

/// Decodes `HEXIP:HEXPORT`. The outer `Option` is a parse failure, the inner
/// one an unbound endpoint (port 0).
fn decode_address(field: &str, family: SocketFamily) -> Option<Option<SocketAddr>> {
    let (ip_hex, port_hex) = field.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;
    if port == 0 {
        return Some(None);
    }
    // The kernel prints each 32-bit word of the address in host byte order.
    let ip = match family {
        SocketFamily::Inet => {
            if ip_hex.len() != 8 {
                return None;
            }
            let word = u32::from_str_radix(ip_hex, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        SocketFamily::Inet6 => {
            if ip_hex.len() != 32 {
                return None;
            }
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(&ip_hex[i * 8..i * 8 + 8], 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    };
    Some(Some(SocketAddr::new(ip, port)))
}

fn tcp_state(code: &str) -> Option<ConnectionStatus> {
    let status = match u8::from_str_radix(code, 16).ok()? {
        0x01 => ConnectionStatus::Established,
        0x02 => ConnectionStatus::SynSent,
        0x03 => ConnectionStatus::SynRecv,
        0x04 => ConnectionStatus::FinWait1,
        0x05 => ConnectionStatus::FinWait2,
        0x06 => ConnectionStatus::TimeWait,
        0x07 => ConnectionStatus::Close,
        0x08 => ConnectionStatus::CloseWait,
        0x09 => ConnectionStatus::LastAck,
        0x0A => ConnectionStatus::Listen,
        0x0B => ConnectionStatus::Closing,
        _ => return None,
    };
    Some(status)
}

/// Maps socket inodes to the descriptor number that holds them, walking
/// `/proc/<pid>/fd` until `deadline`. Processes we may not inspect are skipped.
fn socket_fds(deadline: Instant) -> HashMap<u64, i32> {
    let mut map = HashMap::new();
    let Ok(procs) = std::fs::read_dir("/proc") else {
        return map;
    };
    for proc_entry in procs.flatten() {
        if Instant::now() >= deadline {
            break;
        }
        let file_name = proc_entry.file_name();
        let Some(pid) = file_name.to_str() else {
            continue;
        };
        if !pid.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        let Ok(fds) = std::fs::read_dir(proc_entry.path().join("fd")) else {
            continue;
        };
        for fd_entry in fds.flatten() {
            let Ok(target) = std::fs::read_link(fd_entry.path()) else {
                continue;
            };
            let Some(inode) = target.to_str().and_then(socket_inode) else {
                continue;
            };
            let Some(fd) = fd_entry.file_name().to_str().and_then(|s| s.parse().ok()) else {
                continue;
            };
            map.entry(inode).or_insert(fd);
        }
    }
    map
}

fn socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_TABLE: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 4242 1 0000000000000000 100 0 0 10 0
   1: 0100007F:A2C4 0100007F:1F90 01 00000000:00000000 00:00000000 00000000  1000        0 4343 1 0000000000000000 20 4 30 10 -1
";

    #[test]
    fn parses_ipv4_tcp_rows() {
        let rows = parse_table(TCP_TABLE, SocketFamily::Inet, SocketKind::Stream);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].laddr, Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(rows[0].raddr, None);
        assert_eq!(rows[0].status, ConnectionStatus::Listen);
        assert_eq!(rows[0].inode, 4242);

        assert_eq!(rows[1].laddr, Some("127.0.0.1:41668".parse().unwrap()));
        assert_eq!(rows[1].raddr, Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(rows[1].status, ConnectionStatus::Established);
    }

    #[test]
    fn parses_ipv6_loopback() {
        let addr = decode_address(
            "00000000000000000000000001000000:0035",
            SocketFamily::Inet6,
        )
        .unwrap();
        assert_eq!(addr, Some("[::1]:53".parse().unwrap()));
    }

    #[test]
    fn udp_rows_have_no_status() {
        let line = "  7: 00000000:0044 00000000:0000 07 00000000:00000000 00:00000000 00000000     0        0 999 2 0000000000000000 0";
        let row = parse_row(line, SocketFamily::Inet, SocketKind::Datagram).unwrap();
        assert_eq!(row.status, ConnectionStatus::None);
        assert_eq!(row.laddr.map(|a| a.port()), Some(68));
    }

    #[test]
    fn malformed_rows_are_dropped() {
        assert!(parse_row("garbage", SocketFamily::Inet, SocketKind::Stream).is_none());
        assert!(decode_address("XYZ:0050", SocketFamily::Inet).is_none());
    }

    #[test]
    fn socket_links_yield_inodes() {
        assert_eq!(socket_inode("socket:[12345]"), Some(12345));
        assert_eq!(socket_inode("pipe:[12345]"), None);
        assert_eq!(socket_inode("/dev/null"), None);
    }
}
