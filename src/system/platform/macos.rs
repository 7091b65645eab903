use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use libproc::libproc::bsd_info::BSDInfo;
use libproc::libproc::file_info::{ListFDs, ProcFDType, pidfdinfo};
use libproc::libproc::net_info::{InSockInfo, SocketFDInfo, SocketInfoKind};
use libproc::libproc::proc_pid::{listpidinfo, pidinfo};
use libproc::processes::{ProcFilter, pids_by_type};

use super::{AF_INET, PlatformExtensions};
use crate::system::snapshot::{ConnectionEntry, ConnectionStatus, SocketFamily, SocketKind};

pub struct Platform;

const SOCK_STREAM: i32 = 1;
const SOCK_DGRAM: i32 = 2;

impl PlatformExtensions for Platform {
    const AF_INET6: i32 = 30;

    /// Walks every visible pid's descriptor table; sockets only exist per
    /// descriptor here. Pids left when `fd_budget` runs out are not visited.
    fn inet_connections(fd_budget: Duration) -> Vec<ConnectionEntry> {
        let deadline = Instant::now() + fd_budget;
        let pids = match pids_by_type(ProcFilter::All) {
            Ok(pids) => pids,
            Err(e) => {
                tracing::debug!("listing pids failed: {e}");
                return Vec::new();
            }
        };

        let mut connections = Vec::new();
        for pid in pids {
            if Instant::now() >= deadline {
                tracing::debug!("descriptor scan budget exhausted");
                break;
            }
            connections.extend(process_connections(pid as i32));
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

fn process_connections(pid: i32) -> Vec<ConnectionEntry> {
    // Other users' processes refuse inspection; they are skipped.
    let Ok(info) = pidinfo::<BSDInfo>(pid, 0) else {
        return Vec::new();
    };
    let Ok(fds) = listpidinfo::<ListFDs>(pid, info.pbi_nfiles as usize) else {
        return Vec::new();
    };

    fds.iter()
        .filter(|fd| matches!(ProcFDType::from(fd.proc_fdtype), ProcFDType::Socket))
        .filter_map(|fd| {
            let socket = pidfdinfo::<SocketFDInfo>(pid, fd.proc_fd).ok()?;
            socket_entry(fd.proc_fd, &socket)
        })
        .collect()
}

fn socket_entry(fd: i32, socket: &SocketFDInfo) -> Option<ConnectionEntry> {
    let psi = &socket.psi;
    let family = match psi.soi_family {
        AF_INET => SocketFamily::Inet,
        f if f == Platform::AF_INET6 => SocketFamily::Inet6,
        _ => return None,
    };
    let (ini, kind, status) = match SocketInfoKind::from(psi.soi_kind) {
        SocketInfoKind::Tcp if psi.soi_type == SOCK_STREAM => {
            let tcp = unsafe { psi.soi_proto.pri_tcp };
            (tcp.tcpsi_ini, SocketKind::Stream, tcp_state(tcp.tcpsi_state)?)
        }
        SocketInfoKind::In if psi.soi_type == SOCK_DGRAM => {
            let ini = unsafe { psi.soi_proto.pri_in };
            (ini, SocketKind::Datagram, ConnectionStatus::None)
        }
        _ => return None,
    };
    Some(ConnectionEntry {
        fd,
        family,
        kind,
        laddr: endpoint(&ini, family, Side::Local),
        raddr: endpoint(&ini, family, Side::Foreign),
        status,
    })
}

#[derive(Clone, Copy)]
enum Side {
    Local,
    Foreign,
}

fn endpoint(ini: &InSockInfo, family: SocketFamily, side: Side) -> Option<SocketAddr> {
    let (raw_port, addr) = match side {
        Side::Local => (ini.insi_lport, &ini.insi_laddr),
        Side::Foreign => (ini.insi_fport, &ini.insi_faddr),
    };
    let port = match u16::from_be(raw_port as u16) {
        0 => return None,
        port => port,
    };
    let ip = match family {
        SocketFamily::Inet => {
            let s_addr = unsafe { addr.ina_46.i46a_addr4.s_addr };
            IpAddr::V4(Ipv4Addr::from(s_addr.to_ne_bytes()))
        }
        SocketFamily::Inet6 => IpAddr::V6(Ipv6Addr::from(unsafe { addr.ina_6.s6_addr })),
    };
    Some(SocketAddr::new(ip, port))
}

/// `TSI_S_*` values from `<sys/proc_info.h>`.
fn tcp_state(code: i32) -> Option<ConnectionStatus> {
    let status = match code {
        0 => ConnectionStatus::Close,
        1 => ConnectionStatus::Listen,
        2 => ConnectionStatus::SynSent,
        3 => ConnectionStatus::SynRecv,
        4 => ConnectionStatus::Established,
        5 => ConnectionStatus::CloseWait,
        6 => ConnectionStatus::FinWait1,
        7 => ConnectionStatus::Closing,
        8 => ConnectionStatus::LastAck,
        9 => ConnectionStatus::FinWait2,
        10 => ConnectionStatus::TimeWait,
        _ => return None,
    };
    Some(status)
}
