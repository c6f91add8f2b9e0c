//! # Fluxwire
//!
//! Fluxwire is the serialization engine for a versioned, schema-driven binary
//! wire protocol with Kafka-style request/response framing. Given an
//! in-memory message and a target protocol version, it produces the exact
//! byte sequence a peer expects, optionally maintaining a running checksum
//! over the emitted bytes and reporting the first I/O failure without
//! corrupting accounting.
//!
//! ## Design
//!
//! - **Compile once, encode many**: [`compile::encode_fn_of`] turns a
//!   (schema, version, directive) triple into a reusable [`compile::EncodeFn`].
//!   All kind dispatch and version-window selection is paid at compile time;
//!   encoding a message is a fixed sequence of closure calls and primitive
//!   writes with no branching on type identity.
//! - **Single accounting point**: every emitted byte funnels through the
//!   [`encode::Encoder`], which owns the sticky error slot, the optional CRC
//!   accumulator and a small scratch buffer, so primitive writes never
//!   allocate.
//! - **External value boundary**: compiled functions read message content
//!   through the [`value::Value`] accessor, supplied per call; the engine
//!   never owns message data.
//!
//! ## Wire format
//!
//! - All fixed-width integers are big-endian
//! - Plain strings carry an int16 length, plain bytes and arrays an int32
//!   length; -1 marks null
//! - Compact strings and bytes carry a zigzag-varint length, with varint(-1)
//!   as the null sentinel
//! - Self-describing payloads serialize themselves, bypassing the write
//!   wrapper whenever no checksum is armed
//!
//! ## Modules
//!
//! - [`wire`] - Standalone fixed-width and varint writers
//! - [`encode`] - Byte-level encoder with checksum and sticky-error tracking
//! - [`value`] - Typed structural views over message instances
//! - [`schema`] - Schema descriptions and version-window directives
//! - [`compile`] - Codec compiler producing reusable encode functions
//!
//! ## Concurrency
//!
//! Fully synchronous. An [`encode::Encoder`] is a single-writer resource:
//! use one per concurrent stream. Compiled encode functions are `Send + Sync`
//! and freely shareable once compilation has completed; memoizing them per
//! (type, version) is left to the caller.

pub mod compile;
pub mod encode;
pub mod schema;
pub mod value;
pub mod wire;

pub use compile::{encode_fn_of, EncodeFn};
pub use encode::{ChecksumAlgorithm, EncodeError, Encoder};
pub use schema::{parse_directives, Directive, Field, Schema, SchemaError};
pub use value::{ByteSource, SizedBytes, Unit, Value};

use thiserror::Error;

/// Fluxwire error types
///
/// Aggregates the two failure domains of the engine: byte-level encoding
/// failures (sink errors, declared-length mismatches) and static schema
/// defects surfaced during codec compilation.
#[derive(Debug, Error)]
pub enum FluxwireError {
    /// Byte-level encoding failure.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Static schema-definition defect detected during compilation.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result type alias for fluxwire operations.
pub type Result<T> = std::result::Result<T, FluxwireError>;
