//! Schema descriptions and per-field version directives
//!
//! A [`Schema`] is a closed, tagged description of a message type's structure:
//! one variant per wire kind, with composite kinds carrying their children.
//! It is built once per message type (by hand or by generated code) and
//! handed to the codec compiler; no live type inspection happens after that.
//!
//! Fields carry raw directive text in the form the message catalogs use:
//!
//! ```text
//! min=v0,max=v8,nullable
//! min=v0,max=v5|min=v6,max=v9,compact
//! ```
//!
//! Each `|`-separated entry scopes one encoding rule to an inclusive version
//! window. Windows of one field must be disjoint; the compiler picks the
//! first entry whose window contains the target version and omits the field
//! when none does.

use thiserror::Error;

/// Errors detected while interpreting a schema.
///
/// Both variants are static schema-definition defects: they surface during
/// codec compilation, before any message is ever encoded, never as per-value
/// runtime conditions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema names a kind this encoder core cannot produce.
    #[error("unsupported schema kind: {0}")]
    UnsupportedKind(&'static str),

    /// A field's directive text does not parse.
    #[error("malformed directive {text:?}: {reason}")]
    Directive {
        /// The raw directive text.
        text: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// Structural description of one wire value.
#[derive(Debug, Clone)]
pub enum Schema {
    /// One byte, 0 or 1.
    Bool,
    /// Fixed-width big-endian integer.
    Int8,
    /// Fixed-width big-endian integer.
    Int16,
    /// Fixed-width big-endian integer.
    Int32,
    /// Fixed-width big-endian integer.
    Int64,
    /// In the schema vocabulary for the broader protocol, but not encodable
    /// by this core.
    Float64,
    /// In the schema vocabulary for the broader protocol, but not encodable
    /// by this core.
    Uuid,
    /// Length-prefixed text.
    String,
    /// Length-prefixed byte sequence.
    Bytes,
    /// Zero-size marker field; skipped entirely by the compiler.
    Unit,
    /// Composite with named fields in declaration order.
    Struct(Vec<Field>),
    /// Homogeneous sequence with an int32 element count.
    Array(Box<Schema>),
    /// Self-describing payload that serializes itself via the accessor's
    /// native-representation escape.
    Raw,
}

impl Schema {
    /// Human-readable kind name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Bool => "bool",
            Schema::Int8 => "int8",
            Schema::Int16 => "int16",
            Schema::Int32 => "int32",
            Schema::Int64 => "int64",
            Schema::Float64 => "float64",
            Schema::Uuid => "uuid",
            Schema::String => "string",
            Schema::Bytes => "bytes",
            Schema::Unit => "unit",
            Schema::Struct(_) => "struct",
            Schema::Array(_) => "array",
            Schema::Raw => "raw",
        }
    }
}

/// One declared field of a composite schema.
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name, for diagnostics.
    pub name: &'static str,
    /// The field's structural kind.
    pub schema: Schema,
    /// Raw directive text; parsed during compilation.
    pub directives: &'static str,
}

impl Field {
    /// Convenience constructor.
    pub fn new(name: &'static str, schema: Schema, directives: &'static str) -> Self {
        Field {
            name,
            schema,
            directives,
        }
    }
}

/// One version-scoped encoding rule for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive {
    /// First protocol version this rule applies to, inclusive.
    pub min_version: i16,
    /// Last protocol version this rule applies to, inclusive.
    pub max_version: i16,
    /// Whether absent values are encoded with the -1 null sentinel.
    pub nullable: bool,
    /// Whether length prefixes use the zigzag-varint compact form.
    pub compact: bool,
}

impl Default for Directive {
    /// Covers every version, plain non-nullable encoding.
    fn default() -> Self {
        Directive {
            min_version: 0,
            max_version: i16::MAX,
            nullable: false,
            compact: false,
        }
    }
}

impl Directive {
    /// Whether `version` falls inside this directive's window.
    pub fn matches(&self, version: i16) -> bool {
        self.min_version <= version && version <= self.max_version
    }
}

fn parse_version(text: &str, raw: &str) -> Result<i16, SchemaError> {
    let digits = text.strip_prefix('v').unwrap_or(text);
    digits.parse().map_err(|_| SchemaError::Directive {
        text: raw.to_string(),
        reason: "version is not of the form vN",
    })
}

/// Parses one field's raw directive text into its version-scoped entries.
///
/// Empty text yields a single all-versions, plain directive. Entries are
/// separated by `|`; within an entry, comma-separated terms are `min=vN`,
/// `max=vN`, `nullable` and `compact`.
pub fn parse_directives(raw: &str) -> Result<Vec<Directive>, SchemaError> {
    if raw.is_empty() {
        return Ok(vec![Directive::default()]);
    }

    let mut directives = Vec::new();
    for entry in raw.split('|') {
        let mut directive = Directive::default();
        for term in entry.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            match term.split_once('=') {
                Some(("min", version)) => directive.min_version = parse_version(version, raw)?,
                Some(("max", version)) => directive.max_version = parse_version(version, raw)?,
                None if term == "nullable" => directive.nullable = true,
                None if term == "compact" => directive.compact = true,
                _ => {
                    return Err(SchemaError::Directive {
                        text: raw.to_string(),
                        reason: "unknown term",
                    })
                }
            }
        }
        if directive.min_version > directive.max_version {
            return Err(SchemaError::Directive {
                text: raw.to_string(),
                reason: "min version exceeds max version",
            });
        }
        directives.push(directive);
    }
    Ok(directives)
}
