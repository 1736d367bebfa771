//! Streaming trace reader.
//!
//! [`Reader`] yields goroutine state-transition events in file order, which
//! is chronological order. Non-transition record kinds are skipped via the
//! length prefix. The iterator fuses after the first error: already-yielded
//! events remain valid, which is what lets the analyzer keep the state it
//! accumulated before a mid-stream decode failure.

use bytes::Buf;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::{GoState, StackFrame, TransitionEvent, KIND_STATE_TRANSITION, MAGIC, MAX_RECORD_PAYLOAD, VERSION};
use crate::domain::{GoroutineId, TraceError, TraceTime};

#[derive(Debug)]
pub struct Reader<R> {
    input: R,
    failed: bool,
}

impl Reader<BufReader<File>> {
    /// Open a trace file and validate its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read> Reader<R> {
    /// Wrap a byte stream, consuming and validating the header.
    pub fn new(mut input: R) -> Result<Self, TraceError> {
        let mut header = [0u8; 6];
        input
            .read_exact(&mut header)
            .map_err(|_| TraceError::BadMagic)?;
        if header[..4] != MAGIC {
            return Err(TraceError::BadMagic);
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(TraceError::UnsupportedVersion(version));
        }
        Ok(Self { input, failed: false })
    }

    /// Read records until the next state transition. `Ok(None)` is clean EOF.
    fn next_transition(&mut self) -> Result<Option<TransitionEvent>, TraceError> {
        loop {
            let mut header = [0u8; 5];
            match read_full(&mut self.input, &mut header)? {
                0 => return Ok(None),
                5 => {}
                n => {
                    return Err(TraceError::Decode(format!(
                        "truncated record header ({n} of 5 bytes)"
                    )))
                }
            }

            let kind = header[0];
            let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
            if len > MAX_RECORD_PAYLOAD {
                return Err(TraceError::RecordTooLarge(len));
            }

            let mut payload = vec![0u8; len];
            let got = read_full(&mut self.input, &mut payload)?;
            if got != len {
                return Err(TraceError::Decode(format!(
                    "truncated record payload ({got} of {len} bytes)"
                )));
            }

            if kind != KIND_STATE_TRANSITION {
                continue;
            }

            return decode_transition(&payload).map(Some);
        }
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<TransitionEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_transition() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize, TraceError> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TraceError::Io(e)),
        }
    }
    Ok(filled)
}

fn decode_transition(payload: &[u8]) -> Result<TransitionEvent, TraceError> {
    let mut buf = payload;

    let time = TraceTime(take_u64(&mut buf, "timestamp")?);
    let goroutine = GoroutineId(take_u64(&mut buf, "goroutine id")?);
    let from = GoState::from_wire(take_u8(&mut buf, "from state")?)?;
    let to = GoState::from_wire(take_u8(&mut buf, "to state")?)?;
    let reason = take_string(&mut buf, "reason")?;

    let frame_count = take_u16(&mut buf, "frame count")? as usize;
    let mut stack = Vec::with_capacity(frame_count.min(64));
    for _ in 0..frame_count {
        let function = take_string(&mut buf, "frame function")?;
        let file = take_string(&mut buf, "frame file")?;
        let line = take_u32(&mut buf, "frame line")?;
        stack.push(StackFrame { function, file, line });
    }

    if buf.has_remaining() {
        return Err(TraceError::Decode(format!(
            "{} trailing bytes after transition record",
            buf.remaining()
        )));
    }

    Ok(TransitionEvent { time, goroutine, from, to, reason, stack })
}

fn take_u8(buf: &mut &[u8], what: &str) -> Result<u8, TraceError> {
    ensure(buf, 1, what)?;
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut &[u8], what: &str) -> Result<u16, TraceError> {
    ensure(buf, 2, what)?;
    Ok(buf.get_u16_le())
}

fn take_u32(buf: &mut &[u8], what: &str) -> Result<u32, TraceError> {
    ensure(buf, 4, what)?;
    Ok(buf.get_u32_le())
}

fn take_u64(buf: &mut &[u8], what: &str) -> Result<u64, TraceError> {
    ensure(buf, 8, what)?;
    Ok(buf.get_u64_le())
}

fn take_string(buf: &mut &[u8], what: &str) -> Result<String, TraceError> {
    let len = take_u16(buf, what)? as usize;
    ensure(buf, len, what)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec())
        .map_err(|_| TraceError::Decode(format!("{what} is not valid UTF-8")))
}

fn ensure(buf: &[u8], need: usize, what: &str) -> Result<(), TraceError> {
    if buf.remaining() < need {
        return Err(TraceError::Decode(format!(
            "record ends inside {what} (need {need} bytes, have {})",
            buf.remaining()
        )));
    }
    Ok(())
}
