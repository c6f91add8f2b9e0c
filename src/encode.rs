//! Byte-level protocol encoder
//!
//! [`Encoder`] owns the output sink for one encode session and funnels every
//! emitted byte through a single accounting point:
//!
//! - **Sticky errors**: the first sink failure is recorded once; every later
//!   write is a no-op that reports the stored error without touching the sink
//!   again. Callers check once after a whole message instead of after every
//!   field.
//! - **Optional checksum**: while armed, the running CRC covers exactly the
//!   bytes that were actually delivered to the sink, including the written
//!   prefix of a partially failed write. Disarmed, the hot path pays nothing.
//! - **Scratch buffer**: fixed-width and varint primitives format into a small
//!   stack buffer, so primitive writes never allocate.
//!
//! The wire conventions (big-endian integers, int16/int32 length prefixes,
//! -1 null sentinels, zigzag-varint compact lengths) are implemented by the
//! composite writers below; see the crate docs for the full format table.

use std::io::{self, Read, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::value::{ByteSource, Value};
use crate::wire;

/// Scratch buffer length. Large enough for the widest fixed-width integer and
/// the longest varint.
const SCRATCH_LEN: usize = 32;

/// Chunk size for [`Encoder::copy_from`] and the length-declared source
/// writers.
const COPY_BUF_LEN: usize = 4096;

/// Errors produced while encoding.
///
/// Cloneable so the sticky slot can both store the first failure and keep
/// reporting it from every subsequent call.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The sink failed while writing.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),

    /// The sink accepted zero bytes without reporting an error.
    #[error("sink accepted no bytes")]
    WriteZero,

    /// A length-declared byte source streamed a different number of bytes
    /// than it advertised. The length prefix was already committed, so the
    /// emitted stream is unrecoverable and the whole message must be
    /// discarded.
    #[error("size of bytes does not match the number of bytes that were written (size={declared}, written={written})")]
    SizeMismatch {
        /// The length the source declared up front.
        declared: i64,
        /// The number of bytes the source actually streamed.
        written: u64,
    },
}

impl From<io::Error> for EncodeError {
    fn from(err: io::Error) -> Self {
        EncodeError::Io(Arc::new(err))
    }
}

/// Checksum polynomial selection.
///
/// Different framing layers of the protocol use different polynomials: record
/// batches are checksummed with CRC-32C (Castagnoli) while legacy message
/// sets use CRC-32 (IEEE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// CRC-32, IEEE polynomial.
    Crc32,
    /// CRC-32C, Castagnoli polynomial.
    Crc32c,
}

/// Running checksum state for one armed algorithm.
#[derive(Debug, Clone)]
enum Checksum {
    Crc32(crc32fast::Hasher),
    Crc32c(u32),
}

impl Checksum {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Crc32 => Checksum::Crc32(crc32fast::Hasher::new()),
            ChecksumAlgorithm::Crc32c => Checksum::Crc32c(0),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Checksum::Crc32(hasher) => hasher.update(bytes),
            Checksum::Crc32c(acc) => *acc = crc32c::crc32c_append(*acc, bytes),
        }
    }

    fn sum(&self) -> u32 {
        match self {
            Checksum::Crc32(hasher) => hasher.clone().finalize(),
            Checksum::Crc32c(acc) => *acc,
        }
    }
}

/// Byte-level encoder for one encode session.
///
/// Exclusive owner of the sink reference, the sticky error slot and the
/// optional checksum accumulator. A single instance is a single-writer
/// resource; use one encoder per concurrent stream.
pub struct Encoder<'a> {
    sink: &'a mut dyn Write,
    err: Option<EncodeError>,
    checksum: Option<Checksum>,
    scratch: [u8; SCRATCH_LEN],
}

impl<'a> Encoder<'a> {
    /// Creates an encoder writing to `sink`, with no checksum armed.
    pub fn new(sink: &'a mut dyn Write) -> Self {
        Encoder {
            sink,
            err: None,
            checksum: None,
            scratch: [0; SCRATCH_LEN],
        }
    }

    /// Arms checksum tracking with the given polynomial and resets the
    /// accumulator to its identity value. `None` disables tracking.
    pub fn set_checksum(&mut self, algorithm: Option<ChecksumAlgorithm>) {
        self.checksum = algorithm.map(Checksum::new);
    }

    /// Current checksum over every byte delivered to the sink since the last
    /// [`set_checksum`](Self::set_checksum), or `None` when disarmed.
    pub fn checksum(&self) -> Option<u32> {
        self.checksum.as_ref().map(Checksum::sum)
    }

    /// The first recorded failure, if any.
    ///
    /// Per-primitive errors are absorbed into this slot, so a caller may
    /// encode a whole message and check once at the end.
    pub fn error(&self) -> Option<&EncodeError> {
        self.err.as_ref()
    }

    /// Consumes accounting for the session: `Ok(())` if every write landed,
    /// otherwise the first recorded failure.
    pub fn finish(&self) -> Result<(), EncodeError> {
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        if let Some(checksum) = &mut self.checksum {
            checksum.update(bytes);
        }
    }

    fn record(&mut self, err: EncodeError) -> EncodeError {
        if self.err.is_none() {
            self.err = Some(err.clone());
        }
        err
    }

    /// Writes `buf` to the sink.
    ///
    /// No-op returning the stored error once a failure has been recorded.
    /// The checksum is updated with exactly the prefix that the sink
    /// accepted, even when the write fails partway through.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, EncodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut written = 0;
        while written < buf.len() {
            match self.sink.write(&buf[written..]) {
                Ok(0) => return Err(self.record(EncodeError::WriteZero)),
                Ok(n) => {
                    self.update(&buf[written..written + n]);
                    written += n;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.record(err.into())),
            }
        }
        Ok(written)
    }

    /// Writes the raw bytes of `s`.
    ///
    /// Same accounting as [`write`](Self::write); aborts at the first chunk
    /// the sink rejects.
    pub fn write_str(&mut self, s: &str) -> Result<usize, EncodeError> {
        self.write(s.as_bytes())
    }

    /// Drains `reader` into the sink, returning the number of bytes copied.
    ///
    /// While a checksum is armed, every byte read is folded into the running
    /// accumulator before being forwarded, so checksums over large payloads
    /// need no second pass over the data.
    pub fn copy_from(&mut self, reader: &mut dyn Read) -> Result<u64, EncodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut buf = [0u8; COPY_BUF_LEN];
        let mut total = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.record(err.into())),
            };
            self.update(&buf[..n]);
            if let Err(err) = self.sink.write_all(&buf[..n]) {
                return Err(self.record(err.into()));
            }
            total += n as u64;
        }
    }

    /// Encodes a bool as a single `0`/`1` byte.
    pub fn write_bool(&mut self, v: bool) {
        self.write_i8(v as i8);
    }

    /// Writes a fixed-width big-endian `i8`.
    pub fn write_i8(&mut self, v: i8) {
        wire::put_i8(&mut self.scratch, v);
        let _ = self.write_scratch(1);
    }

    /// Writes a fixed-width big-endian `i16`.
    pub fn write_i16(&mut self, v: i16) {
        wire::put_i16(&mut self.scratch, v);
        let _ = self.write_scratch(2);
    }

    /// Writes a fixed-width big-endian `i32`.
    pub fn write_i32(&mut self, v: i32) {
        wire::put_i32(&mut self.scratch, v);
        let _ = self.write_scratch(4);
    }

    /// Writes a fixed-width big-endian `i64`.
    pub fn write_i64(&mut self, v: i64) {
        wire::put_i64(&mut self.scratch, v);
        let _ = self.write_scratch(8);
    }

    /// Writes a zigzag varint.
    pub fn write_varint(&mut self, v: i64) {
        let n = wire::put_varint(&mut self.scratch, v);
        let _ = self.write_scratch(n);
    }

    fn write_scratch(&mut self, len: usize) -> Result<usize, EncodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut written = 0;
        while written < len {
            let n = match self.sink.write(&self.scratch[written..len]) {
                Ok(0) => return Err(self.record(EncodeError::WriteZero)),
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.record(err.into())),
            };
            if let Some(checksum) = &mut self.checksum {
                checksum.update(&self.scratch[written..written + n]);
            }
            written += n;
        }
        Ok(written)
    }

    /// Non-nullable string: int16 byte length, then raw bytes.
    pub fn write_string(&mut self, s: &str) {
        self.write_i16(s.len() as i16);
        let _ = self.write_str(s);
    }

    /// Nullable string: the empty string and the absent string both encode
    /// as length -1 with no payload. The collapse is wire-format parity and
    /// deliberately preserved; decoders must match it.
    pub fn write_nullable_string(&mut self, s: &str) {
        if s.is_empty() {
            self.write_i16(-1);
        } else {
            self.write_i16(s.len() as i16);
            let _ = self.write_str(s);
        }
    }

    /// Compact string: zigzag varint byte length, then raw bytes.
    pub fn write_compact_string(&mut self, s: &str) {
        self.write_varint(s.len() as i64);
        let _ = self.write_str(s);
    }

    /// Compact nullable string: varint(-1) for empty/absent, reusing the
    /// collapse of [`write_nullable_string`](Self::write_nullable_string).
    pub fn write_compact_nullable_string(&mut self, s: &str) {
        if s.is_empty() {
            self.write_varint(-1);
        } else {
            self.write_varint(s.len() as i64);
            let _ = self.write_str(s);
        }
    }

    /// Non-nullable bytes: int32 byte length, then raw bytes.
    pub fn write_bytes(&mut self, b: &[u8]) {
        self.write_i32(b.len() as i32);
        let _ = self.write(b);
    }

    /// Nullable bytes: nil encodes length -1 with no payload, present but
    /// empty encodes length 0 with no payload. Unlike nullable strings, the
    /// two are distinguishable on the wire.
    pub fn write_nullable_bytes(&mut self, b: Option<&[u8]>) {
        match b {
            None => self.write_i32(-1),
            Some(b) => {
                self.write_i32(b.len() as i32);
                let _ = self.write(b);
            }
        }
    }

    /// Compact bytes: zigzag varint byte length, then raw bytes.
    pub fn write_compact_bytes(&mut self, b: &[u8]) {
        self.write_varint(b.len() as i64);
        let _ = self.write(b);
    }

    /// Compact nullable bytes: nil encodes varint(-1) only.
    pub fn write_compact_nullable_bytes(&mut self, b: Option<&[u8]>) {
        match b {
            None => self.write_varint(-1),
            Some(b) => {
                self.write_varint(b.len() as i64);
                let _ = self.write(b);
            }
        }
    }

    /// Streams a length-declared source: int32 declared length, then the
    /// source's content.
    ///
    /// If the source streams a different number of bytes than it declared,
    /// the operation fails with [`EncodeError::SizeMismatch`]. The prefix was
    /// already committed at that point, so the failure is also recorded
    /// sticky and the whole message must be discarded.
    pub fn write_bytes_from(&mut self, source: &mut dyn ByteSource) -> Result<(), EncodeError> {
        let declared = source.size();
        self.write_i32(declared as i32);
        self.stream_from(source, declared)
    }

    /// Nullable variant of [`write_bytes_from`](Self::write_bytes_from):
    /// `None` encodes length -1 with no content.
    pub fn write_nullable_bytes_from(
        &mut self,
        source: Option<&mut dyn ByteSource>,
    ) -> Result<(), EncodeError> {
        match source {
            None => {
                self.write_i32(-1);
                self.finish()
            }
            Some(source) => {
                let declared = source.size();
                self.write_i32(declared as i32);
                self.stream_from(source, declared)
            }
        }
    }

    /// Compact nullable variant: varint declared length, varint(-1) for
    /// `None`.
    pub fn write_compact_nullable_bytes_from(
        &mut self,
        source: Option<&mut dyn ByteSource>,
    ) -> Result<(), EncodeError> {
        match source {
            None => {
                self.write_varint(-1);
                self.finish()
            }
            Some(source) => {
                let declared = source.size();
                self.write_varint(declared);
                self.stream_from(source, declared)
            }
        }
    }

    fn stream_from(
        &mut self,
        source: &mut dyn ByteSource,
        declared: i64,
    ) -> Result<(), EncodeError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut buf = [0u8; COPY_BUF_LEN];
        let mut written = 0u64;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.record(err.into())),
            };
            self.write(&buf[..n])?;
            written += n as u64;
        }

        if written != declared as u64 {
            return Err(self.record(EncodeError::SizeMismatch { declared, written }));
        }
        Ok(())
    }

    /// Delegates to a value's own serialization capability.
    ///
    /// With no checksum armed the payload goes directly to the sink, skipping
    /// the write wrapper for a zero-copy path. With a checksum armed it is
    /// routed through the wrapper so checksum and sticky-error accounting
    /// still see every byte.
    pub fn write_raw(&mut self, value: &dyn Value) {
        if self.err.is_some() {
            return;
        }
        let result = if self.checksum.is_some() {
            value.write_to(self)
        } else {
            value.write_to(&mut *self.sink)
        };
        if let Err(err) = result {
            let _ = self.record(err.into());
        }
    }
}

/// Routing external serializers through the encoder keeps checksum and
/// sticky-error accounting intact for payloads the encoder does not format
/// itself.
impl Write for Encoder<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Encoder::write(self, buf).map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
