//! Unlinked schema tree produced by the parser.
//!
//! Type references are plain strings at this stage. The node layout and the
//! numbering constants follow `google/protobuf/descriptor.proto`.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest legal field number.
pub const MAX_FIELD_NUMBER: i32 = 536_870_911;

/// How deeply messages may nest, top-level message included.
pub const MAX_MESSAGE_NESTING: usize = 32;

/// Field numbers reserved for the protobuf implementation.
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<i32> = 19_000..=19_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

impl Syntax {
    pub fn as_str(self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

impl Label {
    pub fn from_keyword(word: &str) -> Option<Label> {
        match word {
            "optional" => Some(Label::Optional),
            "required" => Some(Label::Required),
            "repeated" => Some(Label::Repeated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Optional => "optional",
            Label::Required => "required",
            Label::Repeated => "repeated",
        }
    }
}

/// Field value type. `Message` and `Enum` are only set by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum FieldType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Bytes,
    Uint32,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
    Message,
    Enum,
}

impl FieldType {
    /// Map a scalar type keyword to its type.
    pub fn from_keyword(word: &str) -> Option<FieldType> {
        let ty = match word {
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "int64" => FieldType::Int64,
            "uint64" => FieldType::Uint64,
            "int32" => FieldType::Int32,
            "fixed64" => FieldType::Fixed64,
            "fixed32" => FieldType::Fixed32,
            "bool" => FieldType::Bool,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            "uint32" => FieldType::Uint32,
            "sfixed32" => FieldType::Sfixed32,
            "sfixed64" => FieldType::Sfixed64,
            "sint32" => FieldType::Sint32,
            "sint64" => FieldType::Sint64,
            _ => return None,
        };
        Some(ty)
    }

    /// The scalar keyword, or `None` for message and enum references.
    pub fn keyword(self) -> Option<&'static str> {
        let word = match self {
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int64 => "int64",
            FieldType::Uint64 => "uint64",
            FieldType::Int32 => "int32",
            FieldType::Fixed64 => "fixed64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Uint32 => "uint32",
            FieldType::Sfixed32 => "sfixed32",
            FieldType::Sfixed64 => "sfixed64",
            FieldType::Sint32 => "sint32",
            FieldType::Sint64 => "sint64",
            FieldType::Message | FieldType::Enum => return None,
        };
        Some(word)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            FieldType::Uint32 | FieldType::Uint64 | FieldType::Fixed32 | FieldType::Fixed64
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Int32
                | FieldType::Int64
                | FieldType::Uint32
                | FieldType::Uint64
                | FieldType::Sint32
                | FieldType::Sint64
                | FieldType::Fixed32
                | FieldType::Fixed64
                | FieldType::Sfixed32
                | FieldType::Sfixed64
        )
    }
}

/// The right-hand side of an option assignment.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum OptionValue {
    Identifier(String),
    /// Non-negative integer literal.
    UInt(u64),
    /// Negative integer literal.
    Int(i64),
    /// JSON has no literal for `inf` or `nan`; those travel as strings.
    #[cfg_attr(feature = "serde", serde(with = "float_text"))]
    Float(f64),
    String(String),
    /// Text-format message literal, kept verbatim without the braces.
    Aggregate(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Identifier(id) if id == "true" => Some(true),
            OptionValue::Identifier(id) if id == "false" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Identifier(id) => f.write_str(id),
            OptionValue::UInt(v) => write!(f, "{v}"),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) if v.is_nan() => f.write_str("nan"),
            OptionValue::Float(v) if v.is_infinite() => {
                f.write_str(if *v > 0.0 { "inf" } else { "-inf" })
            }
            OptionValue::Float(v) => write!(f, "{v:?}"),
            OptionValue::String(s) => write!(f, "\"{}\"", escape_string(s.as_bytes())),
            OptionValue::Aggregate(text) => write!(f, "{{ {text} }}"),
        }
    }
}

#[cfg(feature = "serde")]
mod float_text {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::invalid_value(
                    Unexpected::Str(other),
                    &"a number, \"inf\", \"-inf\" or \"nan\"",
                )),
            },
        }
    }
}

/// C-style escaping, the inverse of `lexer::unescape_string`.
pub fn escape_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for ch in chunk.valid().chars() {
            match ch {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\'' => out.push_str("\\'"),
                c if (c as u32) < 0x20 || c as u32 == 0x7F => {
                    out.push_str(&format!("\\{:03o}", c as u32));
                }
                c => out.push(c),
            }
        }
        for b in chunk.invalid() {
            out.push_str(&format!("\\{b:03o}"));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptionEntry {
    /// Option name as written, e.g. `java_package` or `(my.ext).field`.
    pub name: String,
    pub value: OptionValue,
}

/// Options attached to a declaration, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Options {
    entries: Vec<OptionEntry>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: OptionValue) {
        self.entries.push(OptionEntry {
            name: name.into(),
            value,
        });
    }

    /// The last value assigned to `name`.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).and_then(OptionValue::as_bool) == Some(true)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OptionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One parsed `.proto` file.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileDescriptor {
    /// Logical path, e.g. `foo/bar.proto`.
    pub name: String,
    pub package: Option<String>,
    pub syntax: Syntax,
    /// Imported paths in declaration order.
    pub dependencies: Vec<String>,
    /// Indexes into `dependencies` of `import public` entries.
    pub public_dependencies: Vec<usize>,
    /// Indexes into `dependencies` of `import weak` entries.
    pub weak_dependencies: Vec<usize>,
    pub messages: Vec<MessageDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub services: Vec<ServiceDescriptor>,
    /// Top-level `extend` fields.
    pub extensions: Vec<FieldDescriptor>,
    pub options: Options,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        FileDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MessageDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Fields declared in nested `extend` blocks.
    pub extensions: Vec<FieldDescriptor>,
    pub nested_messages: Vec<MessageDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub oneofs: Vec<OneofDescriptor>,
    pub extension_ranges: Vec<ExtensionRange>,
    /// Reserved field numbers, `end` exclusive.
    pub reserved_ranges: Vec<ReservedRange>,
    pub reserved_names: Vec<String>,
    pub options: Options,
}

impl MessageDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        MessageDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether this is the synthesized entry type of a `map<K, V>` field.
    pub fn is_map_entry(&self) -> bool {
        self.options.is_set("map_entry")
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldDescriptor {
    pub name: String,
    pub number: i32,
    pub label: Label,
    /// Scalar type, or `Message`/`Enum` once linked. `None` for unresolved references.
    pub ty: Option<FieldType>,
    /// Referenced message or enum name; fully qualified with a leading dot once linked.
    pub type_name: Option<String>,
    /// Extended message for extension fields.
    pub extendee: Option<String>,
    pub default_value: Option<String>,
    pub oneof_index: Option<usize>,
    pub json_name: Option<String>,
    /// Explicit `optional` in a proto3 file.
    pub proto3_optional: bool,
    pub options: Options,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, number: i32, label: Label) -> Self {
        FieldDescriptor {
            name: name.into(),
            number,
            label,
            ty: None,
            type_name: None,
            extendee: None,
            default_value: None,
            oneof_index: None,
            json_name: None,
            proto3_optional: false,
            options: Options::new(),
        }
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OneofDescriptor {
    pub name: String,
    /// Indexes into the owning message's `fields`, in declaration order.
    pub fields: Vec<usize>,
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtensionRange {
    pub start: i32,
    /// Exclusive.
    pub end: i32,
    pub options: Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReservedRange {
    pub start: i32,
    /// Exclusive for messages, inclusive for enums (as in descriptor.proto).
    pub end: i32,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnumDescriptor {
    pub name: String,
    pub values: Vec<EnumValueDescriptor>,
    pub reserved_ranges: Vec<ReservedRange>,
    pub reserved_names: Vec<String>,
    pub options: Options,
}

impl EnumDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        EnumDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnumValueDescriptor {
    pub name: String,
    pub number: i32,
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ServiceDescriptor {
    pub name: String,
    pub methods: Vec<MethodDescriptor>,
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MethodDescriptor {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub options: Options,
}
