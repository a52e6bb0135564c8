//! Backends turning a [`LinkedFile`] into generated source text.

pub mod proto;
pub mod rust;
#[cfg(feature = "serde")]
pub mod json;

use std::collections::BTreeMap;

use crate::error::GenerationError;
use crate::parser::ast::{FieldDescriptor, FieldType, MessageDescriptor};
use crate::types::{LinkedFile, TypeDef};

/// A code generator for one target language.
pub trait Backend: Send + Sync {
    /// The target name used on the command line and in [`Target`](crate::Target).
    fn name(&self) -> &str;

    /// Emit the artifacts for `file`. Dependencies are reachable through
    /// [`LinkedFile::find_type`] but must not be emitted themselves.
    fn emit(&self, file: &LinkedFile, parameter: &str, sink: &mut OutputSink) -> Result<(), GenerationError>;
}

/// One emitted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Collects the artifacts of one compile.
#[derive(Debug, Default)]
pub struct OutputSink {
    files: Vec<GeneratedFile>,
}

impl OutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. Paths must be unique across all backends and files.
    pub fn write(&mut self, path: impl Into<String>, content: impl Into<String>) -> Result<(), GenerationError> {
        let path = path.into();
        if self.files.iter().any(|f| f.path == path) {
            return Err(GenerationError::DuplicateOutput(path));
        }
        tracing::info!(path = %path, "generated");
        self.files.push(GeneratedFile {
            path,
            content: content.into(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.files.into_iter().map(|f| (f.path, f.content)).collect()
    }
}

/// How a field is represented, decided once per field and matched on by backends.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape<'a> {
    /// Singular message; the name is fully qualified with a leading dot.
    Message(&'a str),
    Enum(&'a str),
    String,
    /// Any other scalar, including `bytes`.
    Primitive(FieldType),
    Repeated(Box<FieldShape<'a>>),
    /// Member of the real oneof at `index`.
    OneofMember { index: usize, inner: Box<FieldShape<'a>> },
    Map {
        key: Box<FieldShape<'a>>,
        value: Box<FieldShape<'a>>,
    },
}

impl<'a> FieldShape<'a> {
    pub fn of(field: &'a FieldDescriptor, file: &'a LinkedFile) -> Self {
        if let Some(index) = field.oneof_index.filter(|_| !field.proto3_optional) {
            return FieldShape::OneofMember {
                index,
                inner: Box::new(Self::single(field)),
            };
        }
        if field.is_repeated() {
            if let Some(entry) = map_entry(field, file) {
                if let [key, value] = entry.fields.as_slice() {
                    return FieldShape::Map {
                        key: Box::new(Self::single(key)),
                        value: Box::new(Self::single(value)),
                    };
                }
            }
            return FieldShape::Repeated(Box::new(Self::single(field)));
        }
        Self::single(field)
    }

    fn single(field: &'a FieldDescriptor) -> Self {
        let type_name = field.type_name.as_deref().unwrap_or_default();
        match field.ty {
            Some(FieldType::Enum) => FieldShape::Enum(type_name),
            Some(FieldType::String) => FieldShape::String,
            Some(FieldType::Message) | None => FieldShape::Message(type_name),
            Some(ty) => FieldShape::Primitive(ty),
        }
    }
}

/// The synthesized entry message behind a `map<K, V>` field.
pub fn map_entry<'a>(field: &'a FieldDescriptor, file: &'a LinkedFile) -> Option<&'a MessageDescriptor> {
    if field.ty != Some(FieldType::Message) || !field.is_repeated() {
        return None;
    }
    match file.find_type(field.type_name.as_deref()?)?.def {
        TypeDef::Message(m) if m.is_map_entry() => Some(m),
        _ => None,
    }
}

/// Indented line writer shared by the text backends.
#[derive(Debug, Default)]
pub(crate) struct CodeWriter {
    out: String,
    depth: usize,
    indent: &'static str,
}

impl CodeWriter {
    pub(crate) fn new(indent: &'static str) -> Self {
        CodeWriter {
            out: String::new(),
            depth: 0,
            indent,
        }
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(self.indent);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") && !self.out.ends_with("{\n") {
            self.out.push('\n');
        }
    }

    pub(crate) fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    pub(crate) fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

/// `dir/name.proto` -> `dir/name.<extension>`.
pub(crate) fn output_path(proto_path: &str, extension: &str) -> String {
    let stem = proto_path.strip_suffix(".proto").unwrap_or(proto_path);
    format!("{stem}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::{DefaultLinker, SchemaLinker};
    use crate::parser;

    fn linked(source: &str) -> LinkedFile {
        DefaultLinker
            .link(parser::parse("s.proto", source).unwrap(), &[])
            .unwrap()
    }

    #[test]
    fn test_field_shapes() {
        let file = linked(
            r#"syntax = "proto3"; package p;
            enum E { Z = 0; }
            message M {
                string s = 1;
                int64 i = 2;
                repeated M children = 3;
                map<string, E> by_name = 4;
                oneof pick { bytes raw = 5; M nested = 6; }
                optional bool flag = 7;
                E e = 8;
            }"#,
        );
        let m = file.get_message("p.M").unwrap();
        let shapes: Vec<_> = m.fields.iter().map(|f| FieldShape::of(f, &file)).collect();
        assert_eq!(shapes[0], FieldShape::String);
        assert_eq!(shapes[1], FieldShape::Primitive(FieldType::Int64));
        assert_eq!(shapes[2], FieldShape::Repeated(Box::new(FieldShape::Message(".p.M"))));
        assert_eq!(
            shapes[3],
            FieldShape::Map {
                key: Box::new(FieldShape::String),
                value: Box::new(FieldShape::Enum(".p.E")),
            }
        );
        assert_eq!(
            shapes[4],
            FieldShape::OneofMember { index: 0, inner: Box::new(FieldShape::Primitive(FieldType::Bytes)) }
        );
        assert_eq!(shapes[6], FieldShape::Primitive(FieldType::Bool));
        assert_eq!(shapes[7], FieldShape::Enum(".p.E"));
    }

    #[test]
    fn test_sink_rejects_duplicate_paths() {
        let mut sink = OutputSink::new();
        sink.write("a.rs", "x").unwrap();
        assert_eq!(
            sink.write("a.rs", "y"),
            Err(GenerationError::DuplicateOutput("a.rs".into()))
        );
        assert_eq!(sink.into_map().len(), 1);
    }

    #[test]
    fn test_output_path() {
        assert_eq!(output_path("a/b.proto", "rs"), "a/b.rs");
        assert_eq!(output_path("noext", "json"), "noext.json");
    }
}
