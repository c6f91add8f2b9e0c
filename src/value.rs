//! Typed structural views over message instances
//!
//! A [`Value`] is the read-only boundary between compiled codecs and concrete
//! message types: generic encode functions read a field's boolean, integer,
//! string, byte or array content through it without ever knowing the concrete
//! type. The accessor is bound to one instance and supplied per call; the
//! encoder does not own it.
//!
//! Each getter corresponds to one schema kind. A compiled codec only ever
//! invokes the getters its schema declares, so the default implementations
//! treat a call for a mismatched kind as a schema/accessor contract violation
//! and panic with the offending kind. Message types implement the subset of
//! getters their fields need; implementations for the primitive Rust types
//! are provided below so struct accessors only have to dispatch on field
//! locators.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes};

macro_rules! contract_violation {
    ($kind:expr) => {
        panic!(
            "value accessor contract violation: instance does not expose {}",
            $kind
        )
    };
}

/// Read-only, typed view of one in-memory message instance.
pub trait Value {
    /// Boolean content.
    fn as_bool(&self) -> bool {
        contract_violation!("bool")
    }

    /// 8-bit integer content.
    fn as_i8(&self) -> i8 {
        contract_violation!("int8")
    }

    /// 16-bit integer content.
    fn as_i16(&self) -> i16 {
        contract_violation!("int16")
    }

    /// 32-bit integer content.
    fn as_i32(&self) -> i32 {
        contract_violation!("int32")
    }

    /// 64-bit integer content.
    fn as_i64(&self) -> i64 {
        contract_violation!("int64")
    }

    /// String content. Absent strings surface as `""`; the nullable string
    /// wire format cannot tell the two apart, so neither does the accessor.
    fn as_str(&self) -> &str {
        contract_violation!("string")
    }

    /// Byte-sequence content; `None` models a nil sequence, which the
    /// nullable bytes wire format keeps distinct from an empty one.
    fn as_bytes(&self) -> Option<&[u8]> {
        contract_violation!("bytes")
    }

    /// Field access by the locator recorded at compile time. Locators are
    /// declaration-order indexes, stable across versions.
    fn field(&self, locator: usize) -> &dyn Value {
        let _ = locator;
        contract_violation!("struct fields")
    }

    /// Whether an array-kind instance is nil (as opposed to empty).
    fn is_nil(&self) -> bool {
        contract_violation!("array nil-ness")
    }

    /// Element count of an array-kind instance.
    fn len(&self) -> usize {
        contract_violation!("array length")
    }

    /// Element access by index, `0 <= index < len()`.
    fn element(&self, index: usize) -> &dyn Value {
        let _ = index;
        contract_violation!("array elements")
    }

    /// Native-representation escape for self-serializing payloads: the value
    /// writes its own wire form to `sink` and reports the byte count.
    fn write_to(&self, sink: &mut dyn Write) -> io::Result<u64> {
        let _ = sink;
        contract_violation!("a self-serialization capability")
    }
}

impl Value for bool {
    fn as_bool(&self) -> bool {
        *self
    }
}

impl Value for i8 {
    fn as_i8(&self) -> i8 {
        *self
    }
}

impl Value for i16 {
    fn as_i16(&self) -> i16 {
        *self
    }
}

impl Value for i32 {
    fn as_i32(&self) -> i32 {
        *self
    }
}

impl Value for i64 {
    fn as_i64(&self) -> i64 {
        *self
    }
}

impl Value for str {
    fn as_str(&self) -> &str {
        self
    }
}

impl Value for String {
    fn as_str(&self) -> &str {
        self
    }
}

/// Absent strings collapse to `""`, matching the nullable string encoding.
impl Value for Option<String> {
    fn as_str(&self) -> &str {
        self.as_deref().unwrap_or("")
    }
}

impl Value for Vec<u8> {
    fn as_bytes(&self) -> Option<&[u8]> {
        Some(self)
    }
}

impl Value for Option<Vec<u8>> {
    fn as_bytes(&self) -> Option<&[u8]> {
        self.as_deref()
    }
}

impl Value for Bytes {
    fn as_bytes(&self) -> Option<&[u8]> {
        Some(self.as_ref())
    }
}

impl Value for Option<Bytes> {
    fn as_bytes(&self) -> Option<&[u8]> {
        self.as_deref()
    }
}

impl<T: Value> Value for Vec<T> {
    fn is_nil(&self) -> bool {
        false
    }

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn element(&self, index: usize) -> &dyn Value {
        &self[index]
    }
}

impl<T: Value> Value for Option<Vec<T>> {
    fn is_nil(&self) -> bool {
        self.is_none()
    }

    fn len(&self) -> usize {
        self.as_ref().map(Vec::len).unwrap_or(0)
    }

    fn element(&self, index: usize) -> &dyn Value {
        match self {
            Some(elements) => &elements[index],
            None => contract_violation!("elements of a nil array"),
        }
    }
}

/// Marker value for zero-size fields. The compiler skips those fields, so no
/// getter is ever invoked on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unit;

impl Value for Unit {}

/// External byte source that declares its total length up front and then
/// streams exactly that many bytes.
///
/// Used by the length-declared writers, which must commit the length prefix
/// before any content is available; a source that streams a different count
/// triggers a size-mismatch failure.
pub trait ByteSource: Read {
    /// Total number of bytes this source will stream.
    fn size(&self) -> i64;
}

/// [`ByteSource`] over an in-memory [`Bytes`] payload.
#[derive(Debug, Clone)]
pub struct SizedBytes {
    bytes: Bytes,
    size: i64,
}

impl SizedBytes {
    /// Wraps `bytes`, declaring its current length.
    pub fn new(bytes: Bytes) -> Self {
        let size = bytes.len() as i64;
        SizedBytes { bytes, size }
    }
}

impl Read for SizedBytes {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.bytes.remaining().min(buf.len());
        self.bytes.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl ByteSource for SizedBytes {
    fn size(&self) -> i64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_getters() {
        assert!(Value::as_bool(&true));
        assert_eq!(Value::as_i8(&-5i8), -5);
        assert_eq!(Value::as_i16(&300i16), 300);
        assert_eq!(Value::as_i32(&70_000i32), 70_000);
        assert_eq!(Value::as_i64(&(-1i64)), -1);
        assert_eq!(Value::as_str("hello"), "hello");
        assert_eq!(Value::as_str(&"hello".to_string()), "hello");
    }

    #[test]
    fn test_absent_string_collapses_to_empty() {
        let absent: Option<String> = None;
        let empty: Option<String> = Some(String::new());
        assert_eq!(absent.as_str(), "");
        assert_eq!(empty.as_str(), "");
    }

    #[test]
    fn test_bytes_nil_vs_empty() {
        let nil: Option<Vec<u8>> = None;
        let empty: Option<Vec<u8>> = Some(Vec::new());
        assert_eq!(nil.as_bytes(), None);
        assert_eq!(empty.as_bytes(), Some(&[][..]));
    }

    #[test]
    fn test_array_views() {
        let present = vec![1i32, 2, 3];
        assert!(!Value::is_nil(&present));
        assert_eq!(Value::len(&present), 3);
        assert_eq!(present.element(1).as_i32(), 2);

        let nil: Option<Vec<i32>> = None;
        assert!(nil.is_nil());
        assert_eq!(Value::len(&nil), 0);

        let some = Some(vec![7i32]);
        assert!(!some.is_nil());
        assert_eq!(some.element(0).as_i32(), 7);
    }

    #[test]
    fn test_sized_bytes_source() {
        let mut source = SizedBytes::new(Bytes::from_static(b"abcdef"));
        assert_eq!(source.size(), 6);
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_kind_mismatch_panics() {
        Value::as_bool(&42i32);
    }
}
