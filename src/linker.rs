//! Turns an unlinked [`FileDescriptor`] plus its linked dependencies into a
//! [`LinkedFile`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::LinkError;
use crate::parser::ast::*;
use crate::types::{index_types, qualify, LinkedFile, TypeEntry, TypeKind};

/// Validates a parsed file and resolves its type references.
///
/// `dependencies` holds one linked file per entry of `file.dependencies`, in
/// the same order.
pub trait SchemaLinker: Send + Sync {
    fn link(
        &self,
        file: FileDescriptor,
        dependencies: &[Arc<LinkedFile>],
    ) -> Result<LinkedFile, LinkError>;
}

/// Linker implementing the usual protobuf scoping and numbering rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLinker;

impl SchemaLinker for DefaultLinker {
    fn link(
        &self,
        mut file: FileDescriptor,
        dependencies: &[Arc<LinkedFile>],
    ) -> Result<LinkedFile, LinkError> {
        check_dependencies(&file, dependencies)?;
        check_nesting(&file)?;

        let (types_list, types_by_name) = index_types(&file)?;
        let visible = visible_files(dependencies);
        for entry in &types_list {
            if let Some(other) = visible
                .iter()
                .find(|f| f.types_by_name.contains_key(&entry.full_name))
            {
                tracing::debug!(name = %entry.full_name, other = other.name(), "symbol clash");
                return Err(LinkError::DuplicateSymbol {
                    file: file.name.clone(),
                    name: entry.full_name.clone(),
                });
            }
        }

        let packages = declared_packages(file.package.as_deref(), &visible);
        let symbols = Symbols {
            types_list: &types_list,
            types_by_name: &types_by_name,
            packages,
            visible,
        };
        FileLinker {
            file: file.name.clone(),
            syntax: file.syntax,
            symbols,
        }
        .link_file(&mut file)?;

        Ok(LinkedFile::new(
            file,
            dependencies.to_vec(),
            types_list,
            types_by_name,
        ))
    }
}

fn check_dependencies(file: &FileDescriptor, dependencies: &[Arc<LinkedFile>]) -> Result<(), LinkError> {
    for (i, import) in file.dependencies.iter().enumerate() {
        if dependencies.get(i).map(|d| d.name()) != Some(import.as_str()) {
            return Err(LinkError::UnlinkedDependency {
                file: file.name.clone(),
                dependency: import.clone(),
            });
        }
    }
    if dependencies.len() != file.dependencies.len() {
        return Err(LinkError::Invalid {
            file: file.name.clone(),
            message: format!(
                "{} linked dependencies supplied for {} imports",
                dependencies.len(),
                file.dependencies.len()
            ),
        });
    }
    Ok(())
}

/// Trees built by hand can skip the parser's nesting limit; the recursive
/// passes below rely on it.
fn check_nesting(file: &FileDescriptor) -> Result<(), LinkError> {
    let mut stack: Vec<(&MessageDescriptor, usize)> = file.messages.iter().map(|m| (m, 1)).collect();
    while let Some((message, depth)) = stack.pop() {
        if depth > MAX_MESSAGE_NESTING {
            return Err(LinkError::Invalid {
                file: file.name.clone(),
                message: format!(
                    "message \"{}\" is nested more than {MAX_MESSAGE_NESTING} levels deep",
                    message.name
                ),
            });
        }
        stack.extend(message.nested_messages.iter().map(|m| (m, depth + 1)));
    }
    Ok(())
}

/// Direct dependencies plus, transitively, whatever they import publicly.
fn visible_files(dependencies: &[Arc<LinkedFile>]) -> Vec<&LinkedFile> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<&LinkedFile> = dependencies.iter().rev().map(|d| d.as_ref()).collect();
    while let Some(file) = stack.pop() {
        if !seen.insert(file.name()) {
            continue;
        }
        out.push(file);
        stack.extend(file.public_dependencies());
    }
    out
}

/// Every package name and parent package declared by `own` or `visible`.
fn declared_packages(own: Option<&str>, visible: &[&LinkedFile]) -> HashSet<String> {
    let mut out = HashSet::new();
    for package in own.into_iter().chain(visible.iter().filter_map(|f| f.package())) {
        let mut name = package;
        while !name.is_empty() {
            out.insert(name.to_string());
            name = name.rfind('.').map_or("", |dot| &name[..dot]);
        }
    }
    out
}

/// Symbols visible from the file being linked.
struct Symbols<'a> {
    types_list: &'a [TypeEntry],
    types_by_name: &'a HashMap<String, usize>,
    packages: HashSet<String>,
    visible: Vec<&'a LinkedFile>,
}

impl Symbols<'_> {
    fn lookup(&self, full_name: &str) -> Option<TypeKind> {
        if let Some(&idx) = self.types_by_name.get(full_name) {
            return Some(self.types_list[idx].kind);
        }
        self.visible.iter().find_map(|f| {
            f.types_by_name
                .get(full_name)
                .map(|&idx| f.types_list[idx].kind)
        })
    }

    /// Types and packages can both open a compound name.
    fn is_scope(&self, full_name: &str) -> bool {
        self.packages.contains(full_name) || self.lookup(full_name).is_some()
    }

    /// Resolve `name` as written inside `scope`, innermost scope first.
    ///
    /// A compound name `A.B` binds `A` in the innermost scope declaring it and
    /// only then looks for `B` there; a miss does not continue outward.
    fn resolve(&self, scope: &str, name: &str) -> Option<(String, TypeKind)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.lookup(absolute).map(|kind| (absolute.to_string(), kind));
        }
        let first = name.split_once('.').map(|(first, _)| first);
        let mut prefix = scope;
        loop {
            let candidate = qualify(prefix, name);
            match first {
                Some(first) if self.is_scope(&qualify(prefix, first)) => {
                    return self.lookup(&candidate).map(|kind| (candidate, kind));
                }
                Some(_) => {}
                None => {
                    if let Some(kind) = self.lookup(&candidate) {
                        return Some((candidate, kind));
                    }
                }
            }
            if prefix.is_empty() {
                return None;
            }
            // Go up one level
            prefix = match prefix.rfind('.') {
                Some(pos) => &prefix[..pos],
                None => "",
            };
        }
    }
}

struct FileLinker<'a> {
    file: String,
    syntax: Syntax,
    symbols: Symbols<'a>,
}

impl FileLinker<'_> {
    fn link_file(&self, file: &mut FileDescriptor) -> Result<(), LinkError> {
        let package = file.package.clone().unwrap_or_default();
        for message in &mut file.messages {
            self.link_message(message, &package)?;
        }
        for e in &file.enums {
            self.check_enum(e, &package)?;
        }
        for extension in &mut file.extensions {
            self.link_extension(extension, &package)?;
        }
        for service in &mut file.services {
            let service_name = qualify(&package, &service.name);
            for method in &mut service.methods {
                let referenced_by = format!("method {service_name}.{}", method.name);
                method.input_type = self.resolve_message(&package, &method.input_type, &referenced_by)?;
                method.output_type = self.resolve_message(&package, &method.output_type, &referenced_by)?;
            }
        }
        Ok(())
    }

    fn link_message(&self, message: &mut MessageDescriptor, scope: &str) -> Result<(), LinkError> {
        let full_name = qualify(scope, &message.name);
        self.check_fields(message, &full_name)?;
        for field in &mut message.fields {
            self.link_field(field, &full_name)?;
        }
        for extension in &mut message.extensions {
            self.link_extension(extension, &full_name)?;
        }
        for nested in &mut message.nested_messages {
            self.link_message(nested, &full_name)?;
        }
        for e in &message.enums {
            self.check_enum(e, &full_name)?;
        }
        Ok(())
    }

    fn check_fields(&self, message: &MessageDescriptor, full_name: &str) -> Result<(), LinkError> {
        let mut names: HashSet<&str> = HashSet::new();
        let mut numbers: HashMap<i32, &str> = HashMap::new();
        for field in &message.fields {
            self.check_field_number(field, full_name)?;
            if !names.insert(&field.name) {
                return Err(LinkError::DuplicateFieldName {
                    file: self.file.clone(),
                    message: full_name.to_string(),
                    field_name: field.name.clone(),
                });
            }
            if let Some(first) = numbers.insert(field.number, &field.name) {
                return Err(LinkError::DuplicateFieldNumber {
                    file: self.file.clone(),
                    number: field.number,
                    first: qualify(full_name, first),
                    second: qualify(full_name, &field.name),
                });
            }
        }
        Ok(())
    }

    fn check_field_number(&self, field: &FieldDescriptor, scope: &str) -> Result<(), LinkError> {
        let reason = if field.number < 1 || field.number > MAX_FIELD_NUMBER {
            "must be between 1 and 536870911"
        } else if RESERVED_FIELD_NUMBERS.contains(&field.number) {
            "falls in the range reserved for the protobuf implementation (19000 to 19999)"
        } else {
            return Ok(());
        };
        Err(LinkError::InvalidFieldNumber {
            file: self.file.clone(),
            field: qualify(scope, &field.name),
            number: field.number,
            reason,
        })
    }

    fn link_field(&self, field: &mut FieldDescriptor, scope: &str) -> Result<(), LinkError> {
        let referenced_by = format!("field {}", qualify(scope, &field.name));
        if field.ty.is_none() {
            let Some(type_name) = field.type_name.as_deref() else {
                return Err(self.invalid(format!("{referenced_by} has no type")));
            };
            let (full_name, kind) = self.symbols.resolve(scope, type_name).ok_or_else(|| {
                LinkError::UndefinedType {
                    file: self.file.clone(),
                    type_name: type_name.to_string(),
                    referenced_by: referenced_by.clone(),
                }
            })?;
            field.ty = Some(match kind {
                TypeKind::Message => FieldType::Message,
                TypeKind::Enum => FieldType::Enum,
                TypeKind::Service => {
                    return Err(self.invalid(format!("\"{full_name}\" used by {referenced_by} is not a type")))
                }
            });
            field.type_name = Some(format!(".{full_name}"));
        }
        if field.ty == Some(FieldType::Message) && field.default_value.is_some() {
            return Err(self.invalid(format!("{referenced_by}: messages can't have default values")));
        }
        Ok(())
    }

    fn link_extension(&self, field: &mut FieldDescriptor, scope: &str) -> Result<(), LinkError> {
        self.check_field_number(field, scope)?;
        let referenced_by = format!("extension {}", qualify(scope, &field.name));
        let extendee = field.extendee.as_deref().unwrap_or_default();
        field.extendee = Some(self.resolve_message(scope, extendee, &referenced_by)?);
        self.link_field(field, scope)
    }

    fn resolve_message(&self, scope: &str, name: &str, referenced_by: &str) -> Result<String, LinkError> {
        match self.symbols.resolve(scope, name) {
            Some((full_name, TypeKind::Message)) => Ok(format!(".{full_name}")),
            Some(_) => Err(LinkError::NotAMessage {
                file: self.file.clone(),
                type_name: name.to_string(),
                referenced_by: referenced_by.to_string(),
            }),
            None => Err(LinkError::UndefinedType {
                file: self.file.clone(),
                type_name: name.to_string(),
                referenced_by: referenced_by.to_string(),
            }),
        }
    }

    fn check_enum(&self, e: &EnumDescriptor, scope: &str) -> Result<(), LinkError> {
        let name = qualify(scope, &e.name);
        match e.values.first() {
            None => Err(LinkError::EmptyEnum {
                file: self.file.clone(),
                name,
            }),
            Some(first) if self.syntax == Syntax::Proto3 && first.number != 0 => {
                Err(LinkError::EnumFirstValueNotZero {
                    file: self.file.clone(),
                    name,
                })
            }
            Some(_) => Ok(()),
        }
    }

    fn invalid(&self, message: String) -> LinkError {
        LinkError::Invalid {
            file: self.file.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn link(path: &str, source: &str, deps: &[Arc<LinkedFile>]) -> Result<LinkedFile, LinkError> {
        let file = parser::parse(path, source).unwrap();
        DefaultLinker.link(file, deps)
    }

    #[test]
    fn test_resolves_nested_and_outer_scopes() {
        let file = link(
            "a.proto",
            r#"syntax = "proto3"; package p.q;
            message Outer {
                message Inner { Outer back = 1; Mode m = 2; }
                enum Mode { ZERO = 0; }
                Inner inner = 1;
                .p.q.Outer self = 2;
            }"#,
            &[],
        )
        .unwrap();
        let outer = file.get_message("p.q.Outer").unwrap();
        assert_eq!(outer.fields[0].type_name.as_deref(), Some(".p.q.Outer.Inner"));
        assert_eq!(outer.fields[0].ty, Some(FieldType::Message));
        assert_eq!(outer.fields[1].type_name.as_deref(), Some(".p.q.Outer"));
        let inner = file.get_message("p.q.Outer.Inner").unwrap();
        assert_eq!(inner.fields[0].type_name.as_deref(), Some(".p.q.Outer"));
        assert_eq!(inner.fields[1].type_name.as_deref(), Some(".p.q.Outer.Mode"));
        assert_eq!(inner.fields[1].ty, Some(FieldType::Enum));
    }

    #[test]
    fn test_compound_name_binds_innermost_first_component() {
        let err = link(
            "a.proto",
            r#"syntax = "proto3"; package p;
            message Outer {
                message Foo {}
                message Inner { Foo.Bar x = 1; }
            }
            message Foo { message Bar {} }"#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::UndefinedType { ref type_name, .. } if type_name == "Foo.Bar"));

        let file = link(
            "b.proto",
            r#"syntax = "proto3"; package p;
            message Outer { message Inner { Foo.Bar x = 1; p.Foo y = 2; } }
            message Foo { message Bar {} }"#,
            &[],
        )
        .unwrap();
        let inner = file.get_message("p.Outer.Inner").unwrap();
        assert_eq!(inner.fields[0].type_name.as_deref(), Some(".p.Foo.Bar"));
        assert_eq!(inner.fields[1].type_name.as_deref(), Some(".p.Foo"));
    }

    #[test]
    fn test_hand_built_deep_nesting_is_rejected() {
        let mut message = MessageDescriptor::new("Leaf".to_string());
        for i in 0..MAX_MESSAGE_NESTING {
            let mut outer = MessageDescriptor::new(format!("Level{i}"));
            outer.nested_messages.push(message);
            message = outer;
        }
        let mut file = FileDescriptor::new("deep.proto");
        file.messages.push(message);
        let err = DefaultLinker.link(file, &[]).unwrap_err();
        assert!(matches!(err, LinkError::Invalid { ref message, .. } if message.contains("Leaf")));
    }

    #[test]
    fn test_cross_file_and_public_visibility() {
        let base = Arc::new(link("base.proto", r#"syntax = "proto3"; package b; message Base {}"#, &[]).unwrap());
        let relay = Arc::new(
            link(
                "relay.proto",
                r#"syntax = "proto3"; import public "base.proto";"#,
                &[base.clone()],
            )
            .unwrap(),
        );
        let user = link(
            "user.proto",
            r#"syntax = "proto3"; import "relay.proto"; message U { b.Base base = 1; }"#,
            &[relay.clone()],
        )
        .unwrap();
        let u = user.get_message("U").unwrap();
        assert_eq!(u.fields[0].type_name.as_deref(), Some(".b.Base"));
        let found = user.find_type(".b.Base").unwrap();
        assert_eq!(found.file.name(), "base.proto");
    }

    #[test]
    fn test_non_public_import_is_not_visible() {
        let base = Arc::new(link("base.proto", r#"syntax = "proto3"; message Base {}"#, &[]).unwrap());
        let relay = Arc::new(
            link("relay.proto", r#"syntax = "proto3"; import "base.proto";"#, &[base]).unwrap(),
        );
        let err = link(
            "user.proto",
            r#"syntax = "proto3"; import "relay.proto"; message U { Base base = 1; }"#,
            &[relay],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::UndefinedType { ref type_name, .. } if type_name == "Base"));
    }

    #[test]
    fn test_field_number_rules() {
        let err = link("a.proto", r#"syntax = "proto3"; message A { int32 x = 19500; }"#, &[]).unwrap_err();
        assert!(matches!(err, LinkError::InvalidFieldNumber { number: 19500, .. }));

        let err = link("a.proto", r#"syntax = "proto3"; message A { int32 x = 0; }"#, &[]).unwrap_err();
        assert!(matches!(err, LinkError::InvalidFieldNumber { number: 0, .. }));

        let err = link(
            "a.proto",
            r#"syntax = "proto3"; message A { int32 x = 1; string y = 1; }"#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::DuplicateFieldNumber { number: 1, .. }));

        let err = link(
            "a.proto",
            r#"syntax = "proto3"; message A { int32 x = 1; string x = 2; }"#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::DuplicateFieldName { .. }));
    }

    #[test]
    fn test_proto3_enum_must_start_at_zero() {
        let err = link("a.proto", r#"syntax = "proto3"; enum E { ONE = 1; }"#, &[]).unwrap_err();
        assert!(matches!(err, LinkError::EnumFirstValueNotZero { .. }));
        assert!(link("a.proto", "syntax = \"proto2\"; enum E { ONE = 1; }", &[]).is_ok());
    }

    #[test]
    fn test_extensions_and_methods_need_messages() {
        let err = link(
            "a.proto",
            r#"syntax = "proto2"; enum E { A = 0; } extend E { optional int32 x = 100; }"#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::NotAMessage { .. }));

        let err = link(
            "a.proto",
            r#"syntax = "proto3"; message Req {} service S { rpc Call(Req) returns (Missing); }"#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::UndefinedType { ref type_name, .. } if type_name == "Missing"));

        let file = link(
            "a.proto",
            r#"syntax = "proto2"; package p; message M { extensions 100 to max; }
            extend M { optional string tag = 100; }
            service S { rpc Call(M) returns (M); }"#,
            &[],
        )
        .unwrap();
        assert_eq!(file.descriptor().extensions[0].extendee.as_deref(), Some(".p.M"));
        assert_eq!(file.descriptor().services[0].methods[0].output_type, ".p.M");
    }

    #[test]
    fn test_symbol_clash_with_dependency() {
        let dep = Arc::new(link("dep.proto", r#"syntax = "proto3"; message A {}"#, &[]).unwrap());
        let err = link(
            "a.proto",
            r#"syntax = "proto3"; import "dep.proto"; message A {}"#,
            &[dep],
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::DuplicateSymbol { ref name, .. } if name == "A"));
    }

    #[test]
    fn test_dependency_mismatch() {
        let err = link("a.proto", r#"syntax = "proto3"; import "dep.proto";"#, &[]).unwrap_err();
        assert!(matches!(err, LinkError::UnlinkedDependency { .. }));
    }
}
