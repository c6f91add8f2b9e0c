//! Codec compiler
//!
//! Translates a [`Schema`], a target protocol version and a field
//! [`Directive`] into a reusable [`EncodeFn`]. All structural work — kind
//! dispatch, version-window selection, field enumeration — happens here,
//! once per (type, version) pair. The produced function is a fixed sequence
//! of closure calls and primitive writes: it walks whatever value it is
//! given through the accessor and never re-inspects structure.
//!
//! Compiled functions are immutable and hold no mutable captured state, so
//! one function may be shared and invoked concurrently across many encoder
//! instances once compilation has completed. The compiler itself keeps no
//! cache; memoizing compiled functions per (type, version) is the caller's
//! concern.

use std::sync::Arc;

use tracing::trace;

use crate::encode::Encoder;
use crate::schema::{parse_directives, Directive, Field, Schema, SchemaError};
use crate::value::Value;

/// A compiled encode function: writes one value through the given encoder.
///
/// Errors are absorbed into the encoder's sticky slot; callers check
/// [`Encoder::finish`] once per message.
pub type EncodeFn = Arc<dyn Fn(&mut Encoder<'_>, &dyn Value) + Send + Sync>;

fn encode_fn(f: impl Fn(&mut Encoder<'_>, &dyn Value) + Send + Sync + 'static) -> EncodeFn {
    Arc::new(f)
}

/// Compiles an encode function for `schema` at `version`.
///
/// `directive` is the encoding rule in force for the value itself — for a
/// message root, typically [`Directive::default()`]; for a struct field, the
/// entry selected from that field's directive text. Nested fields carry
/// their own directive text and are resolved recursively.
///
/// Fails only on static schema defects ([`SchemaError`]); a compiled
/// function never fails structurally at encode time.
pub fn encode_fn_of(
    schema: &Schema,
    version: i16,
    directive: &Directive,
) -> Result<EncodeFn, SchemaError> {
    match schema {
        Schema::Raw => Ok(encode_fn(|e, v| e.write_raw(v))),
        Schema::Bool => Ok(encode_fn(|e, v| e.write_bool(v.as_bool()))),
        Schema::Int8 => Ok(encode_fn(|e, v| e.write_i8(v.as_i8()))),
        Schema::Int16 => Ok(encode_fn(|e, v| e.write_i16(v.as_i16()))),
        Schema::Int32 => Ok(encode_fn(|e, v| e.write_i32(v.as_i32()))),
        Schema::Int64 => Ok(encode_fn(|e, v| e.write_i64(v.as_i64()))),
        Schema::String => Ok(string_encode_fn(directive)),
        Schema::Bytes => Ok(bytes_encode_fn(directive)),
        Schema::Struct(fields) => struct_encode_fn(fields, version),
        Schema::Array(elem) => array_encode_fn(elem, version, directive),
        // A marker value carries no bytes.
        Schema::Unit => Ok(encode_fn(|_, _| {})),
        Schema::Float64 | Schema::Uuid => Err(SchemaError::UnsupportedKind(schema.kind())),
    }
}

fn string_encode_fn(directive: &Directive) -> EncodeFn {
    match (directive.compact, directive.nullable) {
        (false, false) => encode_fn(|e, v| e.write_string(v.as_str())),
        (false, true) => encode_fn(|e, v| e.write_nullable_string(v.as_str())),
        (true, false) => encode_fn(|e, v| e.write_compact_string(v.as_str())),
        (true, true) => encode_fn(|e, v| e.write_compact_nullable_string(v.as_str())),
    }
}

fn bytes_encode_fn(directive: &Directive) -> EncodeFn {
    match (directive.compact, directive.nullable) {
        (false, false) => encode_fn(|e, v| e.write_bytes(v.as_bytes().unwrap_or(&[]))),
        (false, true) => encode_fn(|e, v| e.write_nullable_bytes(v.as_bytes())),
        (true, false) => encode_fn(|e, v| e.write_compact_bytes(v.as_bytes().unwrap_or(&[]))),
        (true, true) => encode_fn(|e, v| e.write_compact_nullable_bytes(v.as_bytes())),
    }
}

fn struct_encode_fn(fields: &[Field], version: i16) -> Result<EncodeFn, SchemaError> {
    // Locators are declaration-order indexes, so enumerate before skipping.
    let mut compiled: Vec<(EncodeFn, usize)> = Vec::new();
    for (locator, field) in fields.iter().enumerate() {
        if matches!(field.schema, Schema::Unit) {
            continue;
        }
        let directives = parse_directives(field.directives)?;
        // Windows of one field are disjoint by convention; the first match
        // wins. No match means the field does not exist at this version.
        if let Some(directive) = directives.iter().find(|d| d.matches(version)) {
            let encode = encode_fn_of(&field.schema, version, directive)?;
            compiled.push((encode, locator));
        }
    }

    trace!(
        version,
        fields = compiled.len(),
        "compiled struct encode function"
    );

    Ok(encode_fn(move |e, v| {
        for (encode, locator) in &compiled {
            encode(e, v.field(*locator));
        }
    }))
}

fn array_encode_fn(
    elem: &Schema,
    version: i16,
    directive: &Directive,
) -> Result<EncodeFn, SchemaError> {
    // The element codec is compiled once, in the same version/directive
    // context as the array field itself.
    let encode_elem = encode_fn_of(elem, version, directive)?;

    if directive.nullable {
        Ok(encode_fn(move |e, v| {
            if v.is_nil() {
                e.write_i32(-1);
                return;
            }
            let n = v.len();
            e.write_i32(n as i32);
            for i in 0..n {
                encode_elem(e, v.element(i));
            }
        }))
    } else {
        Ok(encode_fn(move |e, v| {
            let n = v.len();
            e.write_i32(n as i32);
            for i in 0..n {
                encode_elem(e, v.element(i));
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ChecksumAlgorithm;
    use crate::value::Unit;
    use std::io::{self, Write};

    fn encode(schema: &Schema, version: i16, value: &dyn Value) -> Vec<u8> {
        let encode = encode_fn_of(schema, version, &Directive::default()).unwrap();
        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        encode(&mut enc, value);
        enc.finish().unwrap();
        out
    }

    struct Header {
        api_key: i16,
        client_id: Option<String>,
        tags: Vec<i32>,
    }

    impl Value for Header {
        fn field(&self, locator: usize) -> &dyn Value {
            match locator {
                0 => &self.api_key,
                1 => &self.client_id,
                2 => &self.tags,
                _ => panic!("no field at locator {locator}"),
            }
        }
    }

    fn header_schema() -> Schema {
        Schema::Struct(vec![
            Field::new("api_key", Schema::Int16, ""),
            Field::new("client_id", Schema::String, "min=v0,max=v8,nullable"),
            Field::new("tags", Schema::Array(Box::new(Schema::Int32)), "min=v2,max=v8"),
        ])
    }

    #[test]
    fn test_primitive_kinds() {
        assert_eq!(encode(&Schema::Bool, 0, &true), [0x01]);
        assert_eq!(encode(&Schema::Bool, 0, &false), [0x00]);
        assert_eq!(encode(&Schema::Int8, 0, &-1i8), [0xff]);
        assert_eq!(encode(&Schema::Int32, 0, &1i32), [0x00, 0x00, 0x00, 0x01]);
        assert_eq!(
            encode(&Schema::Int64, 0, &258i64),
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02]
        );
    }

    #[test]
    fn test_struct_encodes_fields_in_declaration_order() {
        let header = Header {
            api_key: 3,
            client_id: Some("ab".to_string()),
            tags: vec![1],
        };
        let out = encode(&header_schema(), 2, &header);
        assert_eq!(
            out,
            [
                0x00, 0x03, // api_key
                0x00, 0x02, b'a', b'b', // client_id
                0x00, 0x00, 0x00, 0x01, // tags count
                0x00, 0x00, 0x00, 0x01, // tags[0]
            ]
        );
    }

    #[test]
    fn test_field_omitted_outside_version_window() {
        let header = Header {
            api_key: 3,
            client_id: None,
            tags: vec![1, 2],
        };
        // tags only exists from v2 on.
        let out = encode(&header_schema(), 1, &header);
        assert_eq!(out, [0x00, 0x03, 0xff, 0xff]);
    }

    #[test]
    fn test_version_window_selects_single_directive() {
        // Two disjoint windows switching the length-prefix style: versions
        // 0-2 use the plain int16 form, 3-5 the compact varint form, and the
        // field disappears entirely from version 6 on.
        let schema = Schema::Struct(vec![Field::new(
            "name",
            Schema::String,
            "min=v0,max=v2|min=v3,max=v5,compact",
        )]);

        struct Named(String);
        impl Value for Named {
            fn field(&self, _: usize) -> &dyn Value {
                &self.0
            }
        }

        let named = Named("ab".to_string());
        assert_eq!(encode(&schema, 1, &named), [0x00, 0x02, b'a', b'b']);
        assert_eq!(encode(&schema, 4, &named), [0x04, b'a', b'b']);
        assert_eq!(encode(&schema, 6, &named), []);
    }

    #[test]
    fn test_unit_fields_are_skipped() {
        struct Marked {
            marker: Unit,
            id: i32,
        }
        impl Value for Marked {
            fn field(&self, locator: usize) -> &dyn Value {
                match locator {
                    0 => &self.marker,
                    1 => &self.id,
                    _ => panic!("no field at locator {locator}"),
                }
            }
        }

        let schema = Schema::Struct(vec![
            Field::new("marker", Schema::Unit, ""),
            Field::new("id", Schema::Int32, ""),
        ]);
        let out = encode(
            &schema,
            0,
            &Marked {
                marker: Unit,
                id: 5,
            },
        );
        assert_eq!(out, [0x00, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn test_nullable_array_nil_vs_empty() {
        let schema = Schema::Array(Box::new(Schema::Int16));
        let directive = Directive {
            nullable: true,
            ..Directive::default()
        };
        let encode_fn = encode_fn_of(&schema, 0, &directive).unwrap();

        let mut nil = Vec::new();
        let mut enc = Encoder::new(&mut nil);
        encode_fn(&mut enc, &<Option<Vec<i16>>>::None);
        assert_eq!(nil, [0xff, 0xff, 0xff, 0xff]);

        let mut empty = Vec::new();
        let mut enc = Encoder::new(&mut empty);
        encode_fn(&mut enc, &Some(Vec::<i16>::new()));
        assert_eq!(empty, [0x00, 0x00, 0x00, 0x00]);

        let mut some = Vec::new();
        let mut enc = Encoder::new(&mut some);
        encode_fn(&mut enc, &Some(vec![7i16, 8]));
        assert_eq!(
            some,
            [0x00, 0x00, 0x00, 0x02, 0x00, 0x07, 0x00, 0x08]
        );
    }

    #[test]
    fn test_unsupported_kinds_abort_compilation() {
        let err = encode_fn_of(&Schema::Float64, 0, &Directive::default())
            .err()
            .unwrap();
        assert_eq!(err, SchemaError::UnsupportedKind("float64"));
        assert!(matches!(
            encode_fn_of(
                &Schema::Struct(vec![Field::new("id", Schema::Uuid, "")]),
                0,
                &Directive::default()
            ),
            Err(SchemaError::UnsupportedKind("uuid"))
        ));
    }

    struct RecordBatch(Vec<u8>);

    impl Value for RecordBatch {
        fn write_to(&self, sink: &mut dyn Write) -> io::Result<u64> {
            sink.write_all(&self.0)?;
            Ok(self.0.len() as u64)
        }
    }

    #[test]
    fn test_raw_payload_direct_path() {
        let batch = RecordBatch(vec![0xde, 0xad, 0xbe, 0xef]);
        let out = encode(&Schema::Raw, 0, &batch);
        assert_eq!(out, [0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_raw_payload_routes_through_checksum_when_armed() {
        let batch = RecordBatch(vec![0xde, 0xad, 0xbe, 0xef]);
        let encode_fn = encode_fn_of(&Schema::Raw, 0, &Directive::default()).unwrap();

        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        enc.set_checksum(Some(ChecksumAlgorithm::Crc32c));
        encode_fn(&mut enc, &batch);
        enc.finish().unwrap();
        let sum = enc.checksum();

        assert_eq!(out, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(sum, Some(crc32c::crc32c(&out)));
    }

    #[test]
    fn test_compiled_fn_is_shareable() {
        fn assert_send_sync<T: Send + Sync>(_: &T) {}
        let encode_fn = encode_fn_of(&header_schema(), 2, &Directive::default()).unwrap();
        assert_send_sync(&encode_fn);
    }
}
