//! Canonical `.proto` printer.
//!
//! The output parses back to the same tree: map fields print as `map<K, V>`
//! without their entry message, proto3 `optional` fields print without their
//! synthetic oneof, and type references stay fully qualified.

use crate::error::GenerationError;
use crate::parser::ast::*;
use crate::types::LinkedFile;

use super::{output_path, Backend, CodeWriter, OutputSink};

/// Backend re-printing each file as `.proto` source.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtoBackend;

impl Backend for ProtoBackend {
    fn name(&self) -> &str {
        "proto"
    }

    fn emit(&self, file: &LinkedFile, parameter: &str, sink: &mut OutputSink) -> Result<(), GenerationError> {
        if !parameter.is_empty() {
            return Err(GenerationError::InvalidParameter {
                target: self.name().to_string(),
                parameter: parameter.to_string(),
            });
        }
        sink.write(output_path(file.name(), "proto"), print(file.descriptor()))
    }
}

/// Print a file tree as `.proto` text.
pub fn print(file: &FileDescriptor) -> String {
    let mut w = CodeWriter::new("  ");
    let syntax = file.syntax;
    w.line(format!("syntax = \"{}\";", syntax.as_str()));

    if let Some(package) = &file.package {
        w.blank();
        w.line(format!("package {package};"));
    }

    if !file.dependencies.is_empty() {
        w.blank();
        for (i, dep) in file.dependencies.iter().enumerate() {
            let modifier = if file.public_dependencies.contains(&i) {
                "public "
            } else if file.weak_dependencies.contains(&i) {
                "weak "
            } else {
                ""
            };
            w.line(format!("import {modifier}\"{}\";", escape_string(dep.as_bytes())));
        }
    }

    if !file.options.is_empty() {
        w.blank();
        print_options(&mut w, &file.options);
    }

    for message in &file.messages {
        w.blank();
        print_message(&mut w, message, syntax);
    }
    for e in &file.enums {
        w.blank();
        print_enum(&mut w, e);
    }
    for service in &file.services {
        w.blank();
        print_service(&mut w, service);
    }
    if !file.extensions.is_empty() {
        w.blank();
        print_extensions(&mut w, &file.extensions, syntax);
    }
    w.finish()
}

fn print_options(w: &mut CodeWriter, options: &Options) {
    for entry in options.iter() {
        w.line(format!("option {} = {};", entry.name, entry.value));
    }
}

fn print_message(w: &mut CodeWriter, message: &MessageDescriptor, syntax: Syntax) {
    w.open(format!("message {} {{", message.name));
    print_options(w, &message.options);

    // Map entries must come back in the same position among the nested
    // messages, so explicit nested messages and fields are interleaved.
    let mut next_field = 0;
    for nested in &message.nested_messages {
        if nested.is_map_entry() {
            if let Some(owner) = message.fields.iter().position(|f| owns_entry(f, nested)) {
                while next_field <= owner {
                    next_field = print_field_group(w, message, next_field, syntax);
                }
            }
        } else {
            print_message(w, nested, syntax);
        }
    }
    while next_field < message.fields.len() {
        next_field = print_field_group(w, message, next_field, syntax);
    }

    for e in &message.enums {
        print_enum(w, e);
    }
    for range in &message.extension_ranges {
        let end = range.end - 1;
        let mut text = format!("extensions {}", range.start);
        if end == MAX_FIELD_NUMBER {
            text.push_str(" to max");
        } else if end != range.start {
            text.push_str(&format!(" to {end}"));
        }
        text.push_str(&bracketed_options(&range.options, Vec::new()));
        text.push(';');
        w.line(text);
    }
    print_reserved(w, &message.reserved_ranges, &message.reserved_names, true);
    print_extensions(w, &message.extensions, syntax);
    w.close("}");
}

/// Print the field at `index`, or its whole oneof. Returns the next field index.
fn print_field_group(w: &mut CodeWriter, message: &MessageDescriptor, index: usize, syntax: Syntax) -> usize {
    let field = &message.fields[index];
    let oneof = field
        .oneof_index
        .filter(|_| !field.proto3_optional)
        .and_then(|i| message.oneofs.get(i));
    let Some(oneof) = oneof else {
        print_field(w, field, Some(message), syntax, false);
        return index + 1;
    };

    w.open(format!("oneof {} {{", oneof.name));
    print_options(w, &oneof.options);
    for &member in &oneof.fields {
        if let Some(f) = message.fields.get(member) {
            print_field(w, f, Some(message), syntax, true);
        }
    }
    w.close("}");
    oneof.fields.iter().max().map_or(index + 1, |&last| last.max(index) + 1)
}

fn owns_entry(field: &FieldDescriptor, entry: &MessageDescriptor) -> bool {
    field.is_repeated()
        && field
            .type_name
            .as_deref()
            .and_then(|n| n.rsplit('.').next())
            == Some(entry.name.as_str())
}

fn print_field(
    w: &mut CodeWriter,
    field: &FieldDescriptor,
    parent: Option<&MessageDescriptor>,
    syntax: Syntax,
    in_oneof: bool,
) {
    let map_entry = parent.and_then(|m| {
        m.nested_messages
            .iter()
            .find(|n| n.is_map_entry() && owns_entry(field, n))
    });

    let mut text = String::new();
    match map_entry {
        Some(entry) if entry.fields.len() == 2 => {
            text.push_str(&format!(
                "map<{}, {}>",
                type_text(&entry.fields[0]),
                type_text(&entry.fields[1])
            ));
        }
        _ => {
            let label = if in_oneof {
                None
            } else if syntax == Syntax::Proto2 || field.label == Label::Repeated {
                Some(field.label.as_str())
            } else if field.proto3_optional {
                Some("optional")
            } else {
                None
            };
            if let Some(label) = label {
                text.push_str(label);
                text.push(' ');
            }
            text.push_str(&type_text(field));
        }
    }
    text.push_str(&format!(" {} = {}", field.name, field.number));

    let mut special = Vec::new();
    if let Some(default) = &field.default_value {
        special.push(format!("default = {}", default_text(field, default)));
    }
    if let Some(json_name) = &field.json_name {
        special.push(format!("json_name = \"{}\"", escape_string(json_name.as_bytes())));
    }
    text.push_str(&bracketed_options(&field.options, special));
    text.push(';');
    w.line(text);
}

fn type_text(field: &FieldDescriptor) -> String {
    match field.ty.and_then(FieldType::keyword) {
        Some(keyword) => keyword.to_string(),
        None => field.type_name.clone().unwrap_or_default(),
    }
}

fn default_text(field: &FieldDescriptor, default: &str) -> String {
    match field.ty {
        Some(FieldType::String) => format!("\"{}\"", escape_string(default.as_bytes())),
        // Bytes defaults are kept escaped.
        Some(FieldType::Bytes) => format!("\"{default}\""),
        _ => default.to_string(),
    }
}

fn bracketed_options(options: &Options, mut entries: Vec<String>) -> String {
    entries.extend(options.iter().map(|e| format!("{} = {}", e.name, e.value)));
    if entries.is_empty() {
        String::new()
    } else {
        format!(" [{}]", entries.join(", "))
    }
}

fn print_reserved(w: &mut CodeWriter, ranges: &[ReservedRange], names: &[String], exclusive_end: bool) {
    if !ranges.is_empty() {
        let parts: Vec<String> = ranges
            .iter()
            .map(|r| {
                let end = if exclusive_end { r.end - 1 } else { r.end };
                if end == r.start {
                    r.start.to_string()
                } else {
                    format!("{} to {}", r.start, end)
                }
            })
            .collect();
        w.line(format!("reserved {};", parts.join(", ")));
    }
    if !names.is_empty() {
        let parts: Vec<String> = names
            .iter()
            .map(|n| format!("\"{}\"", escape_string(n.as_bytes())))
            .collect();
        w.line(format!("reserved {};", parts.join(", ")));
    }
}

/// Consecutive extensions of the same extendee share one `extend` block.
fn print_extensions(w: &mut CodeWriter, extensions: &[FieldDescriptor], syntax: Syntax) {
    let mut current: Option<&str> = None;
    for field in extensions {
        let extendee = field.extendee.as_deref().unwrap_or_default();
        if current != Some(extendee) {
            if current.is_some() {
                w.close("}");
            }
            w.open(format!("extend {extendee} {{"));
            current = Some(extendee);
        }
        print_field(w, field, None, syntax, false);
    }
    if current.is_some() {
        w.close("}");
    }
}

fn print_enum(w: &mut CodeWriter, e: &EnumDescriptor) {
    w.open(format!("enum {} {{", e.name));
    print_options(w, &e.options);
    for value in &e.values {
        w.line(format!(
            "{} = {}{};",
            value.name,
            value.number,
            bracketed_options(&value.options, Vec::new())
        ));
    }
    print_reserved(w, &e.reserved_ranges, &e.reserved_names, false);
    w.close("}");
}

fn print_service(w: &mut CodeWriter, service: &ServiceDescriptor) {
    w.open(format!("service {} {{", service.name));
    print_options(w, &service.options);
    for method in &service.methods {
        let stream = |on: bool| if on { "stream " } else { "" };
        let head = format!(
            "rpc {}({}{}) returns ({}{})",
            method.name,
            stream(method.client_streaming),
            method.input_type,
            stream(method.server_streaming),
            method.output_type
        );
        if method.options.is_empty() {
            w.line(format!("{head};"));
        } else {
            w.open(format!("{head} {{"));
            print_options(w, &method.options);
            w.close("}");
        }
    }
    w.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_print_simple_file() {
        let file = parser::parse(
            "a.proto",
            r#"syntax = "proto3"; package demo; import "b.proto";
            message A { string name = 1; repeated int32 ids = 2 [packed = false]; }"#,
        )
        .unwrap();
        let expected = "\
syntax = \"proto3\";

package demo;

import \"b.proto\";

message A {
  string name = 1;
  repeated int32 ids = 2 [packed = false];
}
";
        assert_eq!(print(&file), expected);
    }

    #[test]
    fn test_print_reparses_to_same_tree() {
        let source = r#"
            syntax = "proto2";
            package p;
            option java_package = "x.y";
            message M {
                option deprecated = true;
                message Before { optional int32 a = 1; }
                map<string, int32> counts = 1;
                optional string s = 2 [default = "a\"b", json_name = "S"];
                oneof choice { int32 x = 3; Before b = 4; }
                optional bytes raw = 5 [default = "\001\377"];
                message After {}
                map<int64, After> after = 6;
                enum Kind { A = 0; B = -2 [deprecated = true]; reserved 5 to 7; reserved "C"; }
                extensions 100 to 199, 1000 to max;
                reserved 20, 30 to 40;
                reserved "old";
                extend M { optional int32 ext = 100; }
            }
            extend M { optional int32 top = 1000; repeated string more = 1001; }
            service S { rpc Call(stream M) returns (M) { option deprecated = true; } }
        "#;
        let first = parser::parse("p.proto", source).unwrap();
        let printed = print(&first);
        let second = parser::parse("p.proto", &printed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_proto3_optional_round_trip() {
        let first = parser::parse(
            "o.proto",
            r#"syntax = "proto3"; message O { oneof k { int32 a = 1; } optional int32 b = 2; }"#,
        )
        .unwrap();
        let printed = print(&first);
        assert!(printed.contains("  optional int32 b = 2;"));
        assert!(!printed.contains("oneof _b"));
        assert_eq!(parser::parse("o.proto", &printed).unwrap(), first);
    }
}
