use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use super::snapshot::ConnectionEntry;

pub const AF_INET: i32 = 2;

pub trait PlatformExtensions {
    /// Numeric `AF_INET6` as the host OS defines it.
    const AF_INET6: i32;

    /// Internet (TCP/UDP, v4/v6) sockets visible to the current user.
    /// `fd_budget` bounds the time spent mapping sockets to descriptors.
    fn inet_connections(fd_budget: Duration) -> Vec<ConnectionEntry>;

    /// Detach a child from our process group / console before spawning.
    fn detach(command: &mut Command);

    /// Directory under which `snapshot_tool/snapshots` lives.
    fn snapshot_base_dir() -> Option<PathBuf>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn af_inet6() -> i32 {
    platform_impl::Platform::AF_INET6
}

pub fn inet_connections(fd_budget: Duration) -> Vec<ConnectionEntry> {
    platform_impl::Platform::inet_connections(fd_budget)
}

pub fn detach(command: &mut Command) {
    platform_impl::Platform::detach(command)
}

pub fn snapshot_base_dir() -> Option<PathBuf> {
    platform_impl::Platform::snapshot_base_dir()
}
