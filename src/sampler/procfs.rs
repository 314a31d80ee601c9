//! Parsers for the procfs files sysinfo does not cover.

use crate::sampler::traits::DiskIoCounters;
use std::collections::BTreeMap;

/// `/proc/diskstats` reports sectors in fixed 512-byte units, regardless of
/// the device's physical sector size.
const DISKSTATS_SECTOR_BYTES: u64 = 512;

/// Socket connection state, as exported in the `state` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnState {
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
    /// Stateless sockets (UDP)
    None,
}

impl ConnState {
    pub const ALL: [ConnState; 12] = [
        ConnState::Established,
        ConnState::SynSent,
        ConnState::SynRecv,
        ConnState::FinWait1,
        ConnState::FinWait2,
        ConnState::TimeWait,
        ConnState::Close,
        ConnState::CloseWait,
        ConnState::LastAck,
        ConnState::Listen,
        ConnState::Closing,
        ConnState::None,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConnState::Established => "established",
            ConnState::SynSent => "syn_sent",
            ConnState::SynRecv => "syn_recv",
            ConnState::FinWait1 => "fin_wait1",
            ConnState::FinWait2 => "fin_wait2",
            ConnState::TimeWait => "time_wait",
            ConnState::Close => "close",
            ConnState::CloseWait => "close_wait",
            ConnState::LastAck => "last_ack",
            ConnState::Listen => "listen",
            ConnState::Closing => "closing",
            ConnState::None => "none",
        }
    }

    /// Map the kernel's hex `st` column of `/proc/net/tcp*`.
    pub fn from_tcp_code(code: &str) -> Option<ConnState> {
        let state = match u8::from_str_radix(code, 16).ok()? {
            0x01 => ConnState::Established,
            0x02 => ConnState::SynSent,
            // 0x0C is TCP_NEW_SYN_RECV, a request socket still in handshake
            0x03 | 0x0C => ConnState::SynRecv,
            0x04 => ConnState::FinWait1,
            0x05 => ConnState::FinWait2,
            0x06 => ConnState::TimeWait,
            0x07 => ConnState::Close,
            0x08 => ConnState::CloseWait,
            0x09 => ConnState::LastAck,
            0x0A => ConnState::Listen,
            0x0B => ConnState::Closing,
            _ => return None,
        };
        Some(state)
    }
}

/// Parses `/proc/diskstats` content.
///
/// Format: major minor name reads r_merged r_sectors r_time writes w_merged w_sectors ...
/// Lines with fewer than 14 fields are skipped.
pub fn parse_diskstats(content: &str) -> Vec<DiskIoCounters> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 14 {
                return None;
            }
            let get_val =
                |idx: usize| -> u64 { parts.get(idx).and_then(|s| s.parse().ok()).unwrap_or(0) };

            Some(DiskIoCounters {
                device: parts[2].to_string(),
                reads_completed: get_val(3),
                read_bytes: get_val(5).saturating_mul(DISKSTATS_SECTOR_BYTES),
                writes_completed: get_val(7),
                write_bytes: get_val(9).saturating_mul(DISKSTATS_SECTOR_BYTES),
            })
        })
        .collect()
}

/// Count sockets per state from `/proc/net/{tcp,tcp6,udp,udp6}` content.
///
/// UDP sockets are all counted as [`ConnState::None`]. The header line and
/// malformed or unknown-state lines are skipped.
pub fn count_socket_states(content: &str, udp: bool, counts: &mut BTreeMap<ConnState, u64>) {
    for line in content.lines().skip(1) {
        let mut fields = line.split_whitespace();
        // sl local_address rem_address st ...
        let Some(code) = fields.nth(3) else {
            continue;
        };

        let state = if udp {
            Some(ConnState::None)
        } else {
            ConnState::from_tcp_code(code)
        };

        if let Some(state) = state {
            *counts.entry(state).or_insert(0) += 1;
        }
    }
}
