//! Process lifecycle events.
//!
//! ```text
//! exec: process cache entry | pid u32 | padding u32
//! exit: pid u32 | padding u32
//! ```

use bpf_common::Pid;
use bytes::Buf;

use crate::{
    decode::{DecodeError, Unmarshal, ensure_len},
    entry::{Frame, ProcessCacheEntry},
};

const PID_SIZE: usize = 8;

fn read_pid(data: &[u8]) -> Result<Pid, DecodeError> {
    ensure_len(data, PID_SIZE)?;
    let mut cursor = data;
    Ok(Pid::from_raw(cursor.get_u32_ne() as i32))
}

#[derive(Clone, Debug)]
pub struct ExecEvent {
    pub entry: ProcessCacheEntry,
    pub pid: Pid,
}

impl ExecEvent {
    pub fn unmarshal(frame: Frame, data: &[u8]) -> Result<(Self, usize), DecodeError> {
        ensure_len(data, frame.size() + PID_SIZE)?;
        let (entry, read) = ProcessCacheEntry::unmarshal(frame, data)?;
        let pid = read_pid(&data[read..])?;
        Ok((Self { entry, pid }, read + PID_SIZE))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitEvent {
    pub pid: Pid,
}

impl Unmarshal for ExitEvent {
    fn unmarshal(data: &[u8]) -> Result<(Self, usize), DecodeError> {
        let pid = read_pid(data)?;
        Ok((Self { pid }, PID_SIZE))
    }
}
