//! Trace writer: the producer side of the wire format.
//!
//! Used by capture shims that convert a runtime's native trace into the
//! portable encoding, and by the test suite to build synthetic traces.
//! Encoding is deterministic: the same events always produce the same bytes.

use bytes::BufMut;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{TransitionEvent, KIND_STATE_TRANSITION, MAGIC, MAX_RECORD_PAYLOAD, VERSION};
use crate::domain::TraceError;

pub struct Writer<W: Write> {
    out: W,
}

impl Writer<BufWriter<File>> {
    /// Create a trace file and write the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> Writer<W> {
    /// Wrap a byte sink and write the header.
    pub fn new(mut out: W) -> Result<Self, TraceError> {
        out.write_all(&MAGIC)?;
        out.write_all(&VERSION.to_le_bytes())?;
        Ok(Self { out })
    }

    /// Append one goroutine state-transition record.
    pub fn state_transition(&mut self, event: &TransitionEvent) -> Result<(), TraceError> {
        let mut payload = Vec::with_capacity(64 + event.reason.len());
        payload.put_u64_le(event.time.0);
        payload.put_u64_le(event.goroutine.0);
        payload.put_u8(event.from.to_wire());
        payload.put_u8(event.to.to_wire());
        put_string(&mut payload, &event.reason)?;
        let frame_count = u16::try_from(event.stack.len())
            .map_err(|_| TraceError::Decode("stack exceeds 65535 frames".to_string()))?;
        payload.put_u16_le(frame_count);
        for frame in &event.stack {
            put_string(&mut payload, &frame.function)?;
            put_string(&mut payload, &frame.file)?;
            payload.put_u32_le(frame.line);
        }
        self.raw_record(KIND_STATE_TRANSITION, &payload)
    }

    /// Append a record of an arbitrary kind. The reader skips kinds it does
    /// not understand, so this is how foreign event kinds travel through.
    pub fn raw_record(&mut self, kind: u8, payload: &[u8]) -> Result<(), TraceError> {
        if payload.len() > MAX_RECORD_PAYLOAD {
            return Err(TraceError::RecordTooLarge(payload.len()));
        }
        self.out.write_all(&[kind])?;
        self.out.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.out.write_all(payload)?;
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<(), TraceError> {
        self.out.flush()?;
        Ok(())
    }
}

fn put_string(payload: &mut Vec<u8>, s: &str) -> Result<(), TraceError> {
    let len = u16::try_from(s.len())
        .map_err(|_| TraceError::Decode(format!("string of {} bytes too long for record", s.len())))?;
    payload.put_u16_le(len);
    payload.put_slice(s.as_bytes());
    Ok(())
}
