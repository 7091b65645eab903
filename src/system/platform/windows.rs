use std::ffi::c_void;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::windows::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use windows_sys::Win32::Foundation::{ERROR_INSUFFICIENT_BUFFER, NO_ERROR};
use windows_sys::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, GetExtendedUdpTable, MIB_TCP6ROW_OWNER_PID, MIB_TCPROW_OWNER_PID,
    MIB_UDP6ROW_OWNER_PID, MIB_UDPROW_OWNER_PID, TCP_TABLE_OWNER_PID_ALL, UDP_TABLE_OWNER_PID,
};
use windows_sys::Win32::Networking::WinSock::{AF_INET, AF_INET6};
use windows_sys::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS};

use super::PlatformExtensions;
use crate::system::snapshot::{ConnectionEntry, ConnectionStatus, SocketFamily, SocketKind};

pub struct Platform;

/// Windows has no per-process descriptor numbers for sockets.
const NO_FD: i32 = -1;

impl PlatformExtensions for Platform {
    const AF_INET6: i32 = 23;

    fn inet_connections(_fd_budget: Duration) -> Vec<ConnectionEntry> {
        let mut connections = Vec::new();

        if let Some(table) = fetch_table(|buf, size| unsafe {
            GetExtendedTcpTable(buf, size, 0, u32::from(AF_INET), TCP_TABLE_OWNER_PID_ALL, 0)
        }) {
            for row in unsafe { rows::<MIB_TCPROW_OWNER_PID>(&table) } {
                let Some(status) = tcp_state(row.dwState) else {
                    continue;
                };
                connections.push(ConnectionEntry {
                    fd: NO_FD,
                    family: SocketFamily::Inet,
                    kind: SocketKind::Stream,
                    laddr: v4_endpoint(row.dwLocalAddr, row.dwLocalPort),
                    raddr: v4_endpoint(row.dwRemoteAddr, row.dwRemotePort),
                    status,
                });
            }
        }

        if let Some(table) = fetch_table(|buf, size| unsafe {
            GetExtendedTcpTable(buf, size, 0, u32::from(AF_INET6), TCP_TABLE_OWNER_PID_ALL, 0)
        }) {
            for row in unsafe { rows::<MIB_TCP6ROW_OWNER_PID>(&table) } {
                let Some(status) = tcp_state(row.dwState) else {
                    continue;
                };
                connections.push(ConnectionEntry {
                    fd: NO_FD,
                    family: SocketFamily::Inet6,
                    kind: SocketKind::Stream,
                    laddr: v6_endpoint(row.ucLocalAddr, row.dwLocalPort),
                    raddr: v6_endpoint(row.ucRemoteAddr, row.dwRemotePort),
                    status,
                });
            }
        }

        if let Some(table) = fetch_table(|buf, size| unsafe {
            GetExtendedUdpTable(buf, size, 0, u32::from(AF_INET), UDP_TABLE_OWNER_PID, 0)
        }) {
            for row in unsafe { rows::<MIB_UDPROW_OWNER_PID>(&table) } {
                connections.push(ConnectionEntry {
                    fd: NO_FD,
                    family: SocketFamily::Inet,
                    kind: SocketKind::Datagram,
                    laddr: v4_endpoint(row.dwLocalAddr, row.dwLocalPort),
                    raddr: None,
                    status: ConnectionStatus::None,
                });
            }
        }

        if let Some(table) = fetch_table(|buf, size| unsafe {
            GetExtendedUdpTable(buf, size, 0, u32::from(AF_INET6), UDP_TABLE_OWNER_PID, 0)
        }) {
            for row in unsafe { rows::<MIB_UDP6ROW_OWNER_PID>(&table) } {
                connections.push(ConnectionEntry {
                    fd: NO_FD,
                    family: SocketFamily::Inet6,
                    kind: SocketKind::Datagram,
                    laddr: v6_endpoint(row.ucLocalAddr, row.dwLocalPort),
                    raddr: None,
                    status: ConnectionStatus::None,
                });
            }
        }

        connections
    }

    fn detach(command: &mut Command) {
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    fn snapshot_base_dir() -> Option<PathBuf> {
        // %APPDATA%, i.e. the roaming profile.
        dirs::config_dir()
    }
}

/// Runs one IP Helper table query, growing the buffer until the table fits.
/// The buffer is `u32`-backed so rows are suitably aligned.
fn fetch_table(query: impl Fn(*mut c_void, *mut u32) -> u32) -> Option<Vec<u32>> {
    let mut buf: Vec<u32> = Vec::new();
    let mut size: u32 = 0;
    // The table can grow between the sizing call and the read.
    for _ in 0..4 {
        let ptr = if buf.is_empty() {
            std::ptr::null_mut()
        } else {
            buf.as_mut_ptr().cast::<c_void>()
        };
        match query(ptr, &mut size) {
            NO_ERROR if !buf.is_empty() => return Some(buf),
            NO_ERROR => return None,
            ERROR_INSUFFICIENT_BUFFER => buf = vec![0u32; (size as usize).div_ceil(4)],
            code => {
                tracing::debug!(code, "connection table query failed");
                return None;
            }
        }
    }
    None
}

/// Rows of a `MIB_*TABLE_OWNER_PID`: a `u32` entry count followed by the rows.
///
/// # Safety
/// `table` must hold a table whose rows are of type `T`.
unsafe fn rows<T: Copy>(table: &[u32]) -> Vec<T> {
    let Some(&count) = table.first() else {
        return Vec::new();
    };
    let capacity = (table.len() - 1) * size_of::<u32>() / size_of::<T>();
    let count = (count as usize).min(capacity);
    let first = unsafe { table.as_ptr().add(1).cast::<T>() };
    (0..count)
        .map(|i| unsafe { first.add(i).read_unaligned() })
        .collect()
}

/// Ports sit in the low 16 bits in network byte order; port 0 is unbound.
fn port(raw: u32) -> Option<u16> {
    match u16::from_be(raw as u16) {
        0 => None,
        port => Some(port),
    }
}

fn v4_endpoint(addr: u32, raw_port: u32) -> Option<SocketAddr> {
    let port = port(raw_port)?;
    Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(addr.to_ne_bytes())), port))
}

fn v6_endpoint(addr: [u8; 16], raw_port: u32) -> Option<SocketAddr> {
    let port = port(raw_port)?;
    Some(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(addr)), port))
}

/// `MIB_TCP_STATE` values.
fn tcp_state(code: u32) -> Option<ConnectionStatus> {
    let status = match code {
        1 => ConnectionStatus::Close,
        2 => ConnectionStatus::Listen,
        3 => ConnectionStatus::SynSent,
        4 => ConnectionStatus::SynRecv,
        5 => ConnectionStatus::Established,
        6 => ConnectionStatus::FinWait1,
        7 => ConnectionStatus::FinWait2,
        8 => ConnectionStatus::CloseWait,
        9 => ConnectionStatus::Closing,
        10 => ConnectionStatus::LastAck,
        11 => ConnectionStatus::TimeWait,
        12 => ConnectionStatus::DeleteTcb,
        _ => return None,
    };
    Some(status)
}
