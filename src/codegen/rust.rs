//! Rust data types for messages, enums and services.
//!
//! Layout: one module per message for its nested types and oneofs, type
//! references relative to the package module (`super::` for each level of
//! nesting). Parameter `map=btree` selects `BTreeMap` for map fields.

use crate::error::GenerationError;
use crate::parser::ast::*;
use crate::types::{qualify, LinkedFile};

use super::{output_path, Backend, CodeWriter, FieldShape, OutputSink};

#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapKind {
    Hash,
    BTree,
}

impl Backend for RustBackend {
    fn name(&self) -> &str {
        "rust"
    }

    fn emit(&self, file: &LinkedFile, parameter: &str, sink: &mut OutputSink) -> Result<(), GenerationError> {
        let map_kind = match parameter {
            "" | "map=hash" => MapKind::Hash,
            "map=btree" => MapKind::BTree,
            other => {
                return Err(GenerationError::InvalidParameter {
                    target: self.name().to_string(),
                    parameter: other.to_string(),
                })
            }
        };
        let generator = Generator {
            file,
            package: file.package().unwrap_or(""),
            map_kind,
        };
        sink.write(output_path(file.name(), "rs"), generator.generate())
    }
}

struct Generator<'a> {
    file: &'a LinkedFile,
    package: &'a str,
    map_kind: MapKind,
}

impl<'a> Generator<'a> {
    fn generate(&self) -> String {
        let mut w = CodeWriter::new("    ");
        w.line(format!("// Generated from {}. Do not edit.", self.file.name()));
        let descriptor = self.file.descriptor();
        for message in &descriptor.messages {
            w.blank();
            self.message(&mut w, message, self.package, 0);
        }
        for e in &descriptor.enums {
            w.blank();
            self.enumeration(&mut w, e, self.package);
        }
        for service in &descriptor.services {
            w.blank();
            self.service(&mut w, service);
        }
        w.finish()
    }

    /// `depth` is the module nesting below the package module.
    fn message(&self, w: &mut CodeWriter, message: &MessageDescriptor, scope: &str, depth: usize) {
        let full_name = qualify(scope, &message.name);
        w.line(format!("/// Message `{full_name}`."));
        w.line("#[derive(Debug, Clone, PartialEq, Default)]");
        w.open(format!("pub struct {} {{", message.name));
        let module = module_name(&message.name);
        for field in &message.fields {
            match FieldShape::of(field, self.file) {
                FieldShape::OneofMember { .. } => {}
                shape => {
                    w.line(format!("/// Field {}.", field.number));
                    let ty = self.field_type(&shape, field, depth);
                    w.line(format!("pub {}: {ty},", field_ident(&field.name)));
                }
            }
        }
        for (i, oneof) in message.oneofs.iter().enumerate() {
            if is_synthetic(message, i) {
                continue;
            }
            w.line(format!(
                "pub {}: Option<{module}::{}>,",
                field_ident(&oneof.name),
                type_ident(&oneof.name)
            ));
        }
        w.close("}");

        let nested: Vec<&MessageDescriptor> = message
            .nested_messages
            .iter()
            .filter(|m| !m.is_map_entry())
            .collect();
        let has_oneofs = (0..message.oneofs.len()).any(|i| !is_synthetic(message, i));
        if nested.is_empty() && message.enums.is_empty() && !has_oneofs {
            return;
        }

        w.blank();
        w.line(format!("/// Nested types of `{}`.", message.name));
        w.open(format!("pub mod {module} {{"));
        for m in nested {
            w.blank();
            self.message(w, m, &full_name, depth + 1);
        }
        for e in &message.enums {
            w.blank();
            self.enumeration(w, e, &full_name);
        }
        for (i, oneof) in message.oneofs.iter().enumerate() {
            if !is_synthetic(message, i) {
                w.blank();
                self.oneof(w, message, i, oneof, depth + 1);
            }
        }
        w.close("}");
    }

    fn oneof(&self, w: &mut CodeWriter, message: &MessageDescriptor, index: usize, oneof: &OneofDescriptor, depth: usize) {
        w.line(format!("/// Oneof `{}`.", oneof.name));
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.open(format!("pub enum {} {{", type_ident(&oneof.name)));
        for field in message.fields.iter().filter(|f| f.oneof_index == Some(index)) {
            if let FieldShape::OneofMember { inner, .. } = FieldShape::of(field, self.file) {
                w.line(format!("/// Field {}.", field.number));
                let ty = match inner.as_ref() {
                    FieldShape::Message(name) => format!("Box<{}>", self.type_path(name, depth)),
                    other => self.element_type(other, depth),
                };
                w.line(format!("{}({ty}),", type_ident(&field.name)));
            }
        }
        w.close("}");
    }

    fn enumeration(&self, w: &mut CodeWriter, e: &EnumDescriptor, scope: &str) {
        w.line(format!("/// Enum `{}`.", qualify(scope, &e.name)));
        w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]");
        w.line("#[repr(i32)]");
        w.open(format!("pub enum {} {{", e.name));
        let mut seen: Vec<i32> = Vec::new();
        for value in &e.values {
            // Aliases share a discriminant, which Rust rejects.
            if seen.contains(&value.number) {
                continue;
            }
            if seen.is_empty() {
                w.line("#[default]");
            }
            seen.push(value.number);
            w.line(format!("{} = {},", variant_ident(&value.name), value.number));
        }
        w.close("}");
    }

    fn service(&self, w: &mut CodeWriter, service: &ServiceDescriptor) {
        w.line(format!("/// Service `{}`.", qualify(self.package, &service.name)));
        w.open(format!("pub trait {} {{", service.name));
        for method in &service.methods {
            let wrap = |streaming: bool, ty: String| if streaming { format!("Vec<{ty}>") } else { ty };
            let input = wrap(method.client_streaming, self.type_path(&method.input_type, 0));
            let output = wrap(method.server_streaming, self.type_path(&method.output_type, 0));
            w.line(format!("fn {}(&self, request: {input}) -> {output};", field_ident(&snake_case(&method.name))));
        }
        w.close("}");
    }

    fn field_type(&self, shape: &FieldShape<'_>, field: &FieldDescriptor, depth: usize) -> String {
        let optional = field.proto3_optional
            || (self.file.syntax() == Syntax::Proto2 && field.label != Label::Repeated);
        match shape {
            FieldShape::Message(name) => format!("Option<Box<{}>>", self.type_path(name, depth)),
            FieldShape::Enum(name) => wrap_optional(self.type_path(name, depth), optional),
            FieldShape::String => wrap_optional("String".to_string(), optional),
            FieldShape::Primitive(ty) => wrap_optional(primitive_type(*ty).to_string(), optional),
            FieldShape::Repeated(inner) => format!("Vec<{}>", self.element_type(inner, depth)),
            FieldShape::Map { key, value } => {
                let map = match self.map_kind {
                    MapKind::Hash => "std::collections::HashMap",
                    MapKind::BTree => "std::collections::BTreeMap",
                };
                format!(
                    "{map}<{}, {}>",
                    self.element_type(key, depth),
                    self.element_type(value, depth)
                )
            }
            FieldShape::OneofMember { inner, .. } => self.element_type(inner, depth),
        }
    }

    /// The bare type of a repeated element, map key or map value.
    fn element_type(&self, shape: &FieldShape<'_>, depth: usize) -> String {
        match shape {
            FieldShape::Message(name) | FieldShape::Enum(name) => self.type_path(name, depth),
            FieldShape::String => "String".to_string(),
            FieldShape::Primitive(ty) => primitive_type(*ty).to_string(),
            FieldShape::Repeated(inner) | FieldShape::OneofMember { inner, .. } => self.element_type(inner, depth),
            FieldShape::Map { value, .. } => self.element_type(value, depth),
        }
    }

    /// Rust path of `.pkg.Outer.Inner` as seen from a module `depth` levels
    /// below the current package module.
    fn type_path(&self, full_name: &str, depth: usize) -> String {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        let (up, relative) = match name
            .strip_prefix(self.package)
            .and_then(|rest| if self.package.is_empty() { Some(rest) } else { rest.strip_prefix('.') })
        {
            Some(rest) => (depth, rest.to_string()),
            None => {
                let package_depth = if self.package.is_empty() {
                    0
                } else {
                    self.package.split('.').count()
                };
                (depth + package_depth, name.to_string())
            }
        };

        let segments: Vec<&str> = relative.split('.').collect();
        let mut path = "super::".repeat(up);
        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.iter().enumerate() {
            if i == last {
                path.push_str(segment);
            } else if segment.starts_with(|c: char| c.is_ascii_uppercase()) {
                path.push_str(&module_name(segment));
                path.push_str("::");
            } else {
                path.push_str(&field_ident(segment));
                path.push_str("::");
            }
        }
        path
    }
}

fn is_synthetic(message: &MessageDescriptor, oneof: usize) -> bool {
    match message.oneofs[oneof].fields.as_slice() {
        [only] => message.fields.get(*only).is_some_and(|f| f.proto3_optional),
        _ => false,
    }
}

fn wrap_optional(ty: String, optional: bool) -> String {
    if optional {
        format!("Option<{ty}>")
    } else {
        ty
    }
}

fn primitive_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::Double => "f64",
        FieldType::Float => "f32",
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => "i32",
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => "i64",
        FieldType::Uint32 | FieldType::Fixed32 => "u32",
        FieldType::Uint64 | FieldType::Fixed64 => "u64",
        FieldType::Bool => "bool",
        FieldType::String => "String",
        FieldType::Bytes => "Vec<u8>",
        // Enums are represented by their raw value when no type is known.
        FieldType::Enum => "i32",
        FieldType::Message => "()",
    }
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "abstract", "become", "box", "do", "final", "gen", "macro", "override", "priv", "try",
    "typeof", "unsized", "virtual", "yield",
];

/// A field or module name, escaped when it collides with a keyword.
fn field_ident(name: &str) -> String {
    match name {
        "self" | "super" | "crate" | "Self" => format!("{name}_"),
        _ if KEYWORDS.contains(&name) => format!("r#{name}"),
        _ => name.to_string(),
    }
}

fn module_name(type_name: &str) -> String {
    field_ident(&snake_case(type_name))
}

fn type_ident(name: &str) -> String {
    let ident = upper_camel(name);
    if ident == "Self" {
        "Self_".to_string()
    } else {
        ident
    }
}

/// `SCREAMING_CASE` or `snake_case` -> `UpperCamel`.
fn variant_ident(name: &str) -> String {
    type_ident(&name.to_ascii_lowercase())
}

fn upper_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `FooBar` -> `foo_bar`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::{DefaultLinker, SchemaLinker};
    use crate::parser;

    fn generate(source: &str, parameter: &str) -> String {
        let file = DefaultLinker
            .link(parser::parse("t.proto", source).unwrap(), &[])
            .unwrap();
        let mut sink = OutputSink::new();
        RustBackend.emit(&file, parameter, &mut sink).unwrap();
        sink.into_map().remove("t.rs").unwrap()
    }

    #[test]
    fn test_simple_struct() {
        let out = generate(r#"syntax = "proto3"; message A { string name = 1; }"#, "");
        assert!(out.contains("pub struct A {"));
        assert!(out.contains("    /// Field 1.\n    pub name: String,"));
    }

    #[test]
    fn test_nested_types_and_oneofs() {
        let out = generate(
            r#"syntax = "proto3"; package shop;
            message Order {
                message Line { string sku = 1; }
                enum State { STATE_UNSPECIFIED = 0; PAID = 1; }
                repeated Line lines = 1;
                State state = 2;
                oneof payment { string card = 3; Order parent = 4; }
                map<string, int64> totals = 5;
                optional int32 note = 6;
            }"#,
            "map=btree",
        );
        assert!(out.contains("pub lines: Vec<order::Line>,"));
        assert!(out.contains("pub state: order::State,"));
        assert!(out.contains("pub totals: std::collections::BTreeMap<String, i64>,"));
        assert!(out.contains("pub note: Option<i32>,"));
        assert!(out.contains("pub payment: Option<order::Payment>,"));
        assert!(out.contains("pub mod order {"));
        assert!(out.contains("Parent(Box<super::Order>),"));
        assert!(out.contains("StateUnspecified = 0,"));
        assert!(!out.contains("TotalsEntry"));
    }

    #[test]
    fn test_keywords_are_escaped() {
        let out = generate(r#"syntax = "proto3"; message M { string type = 1; int32 self = 2; }"#, "");
        assert!(out.contains("pub r#type: String,"));
        assert!(out.contains("pub self_: i32,"));
    }

    #[test]
    fn test_invalid_parameter() {
        let file = DefaultLinker
            .link(parser::parse("t.proto", "syntax = \"proto3\";").unwrap(), &[])
            .unwrap();
        let err = RustBackend.emit(&file, "bogus", &mut OutputSink::new()).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_case_conversions() {
        assert_eq!(snake_case("HttpRequest"), "http_request");
        assert_eq!(snake_case("Order"), "order");
        assert_eq!(variant_ident("TYPE_DOUBLE"), "TypeDouble");
        assert_eq!(type_ident("payment_method"), "PaymentMethod");
    }
}
