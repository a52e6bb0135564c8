use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::LinkError;
use crate::parser::ast::*;
use crate::parser::location::SourceLocationTable;

/// What kind of declaration a full name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Message,
    Enum,
    Service,
}

/// Where a declaration sits inside its file, as indices from the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeLocation {
    /// Top-level message index followed by nested message indices.
    Message(Vec<usize>),
    /// Path of the containing message (empty at top level) and the enum index.
    Enum(Vec<usize>, usize),
    Service(usize),
}

/// One named declaration of a linked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    /// Fully qualified name without the leading dot, e.g. `pkg.Outer.Inner`.
    pub full_name: String,
    pub kind: TypeKind,
    pub(crate) location: TypeLocation,
}

/// A declaration found by [`LinkedFile::find_type`].
#[derive(Debug, Clone, Copy)]
pub enum TypeDef<'a> {
    Message(&'a MessageDescriptor),
    Enum(&'a EnumDescriptor),
    Service(&'a ServiceDescriptor),
}

/// A declaration together with the file that defines it.
#[derive(Debug, Clone, Copy)]
pub struct FoundType<'a> {
    pub file: &'a LinkedFile,
    pub full_name: &'a str,
    pub def: TypeDef<'a>,
}

/// A validated file with every type reference resolved.
///
/// Dependencies are shared: a file imported by several others is linked once
/// and referenced through the same `Arc`.
#[derive(Debug, Clone)]
pub struct LinkedFile {
    /// The file tree; field `type_name`s, extendees and method types are
    /// fully qualified (`.pkg.Name`).
    descriptor: FileDescriptor,
    /// Linked dependencies, in the file's import order.
    dependencies: Vec<Arc<LinkedFile>>,
    /// All messages, enums and services declared in this file.
    pub types_list: Vec<TypeEntry>,
    /// Map from full name to index in `types_list`.
    pub types_by_name: HashMap<String, usize>,
    locations: SourceLocationTable,
}

impl LinkedFile {
    pub(crate) fn new(
        descriptor: FileDescriptor,
        dependencies: Vec<Arc<LinkedFile>>,
        types_list: Vec<TypeEntry>,
        types_by_name: HashMap<String, usize>,
    ) -> Self {
        LinkedFile {
            descriptor,
            dependencies,
            types_list,
            types_by_name,
            locations: SourceLocationTable::new(),
        }
    }

    /// Attach the declaration spans recorded while parsing.
    pub fn with_source_locations(mut self, locations: SourceLocationTable) -> Self {
        self.locations = locations;
        self
    }

    /// Logical path of the file.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn package(&self) -> Option<&str> {
        self.descriptor.package.as_deref()
    }

    pub fn syntax(&self) -> Syntax {
        self.descriptor.syntax
    }

    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    pub fn source_locations(&self) -> &SourceLocationTable {
        &self.locations
    }

    pub fn dependencies(&self) -> &[Arc<LinkedFile>] {
        &self.dependencies
    }

    /// Dependencies imported with `import public`.
    pub fn public_dependencies(&self) -> impl Iterator<Item = &LinkedFile> + '_ {
        self.descriptor
            .public_dependencies
            .iter()
            .filter_map(|&i| self.dependencies.get(i))
            .map(|d| d.as_ref())
    }

    /// Every file reachable through imports, each once, nearest first.
    pub fn transitive_dependencies(&self) -> Vec<&LinkedFile> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        let mut queue: std::collections::VecDeque<&LinkedFile> =
            self.dependencies.iter().map(|d| d.as_ref()).collect();
        while let Some(file) = queue.pop_front() {
            if !seen.insert(file.name()) {
                continue;
            }
            out.push(file);
            queue.extend(file.dependencies.iter().map(|d| d.as_ref()));
        }
        out
    }

    /// The tree this file was linked from, in unlinked form.
    pub fn to_proto(&self) -> FileDescriptor {
        self.descriptor.clone()
    }

    /// Look up a declaration of this file by full name (with or without a leading dot).
    pub fn get_type(&self, full_name: &str) -> Option<TypeDef<'_>> {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        let entry = &self.types_list[*self.types_by_name.get(name)?];
        self.resolve_location(&entry.location)
    }

    pub fn get_message(&self, full_name: &str) -> Option<&MessageDescriptor> {
        match self.get_type(full_name)? {
            TypeDef::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn get_enum(&self, full_name: &str) -> Option<&EnumDescriptor> {
        match self.get_type(full_name)? {
            TypeDef::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// Look up a declaration here or in any transitive dependency.
    pub fn find_type(&self, full_name: &str) -> Option<FoundType<'_>> {
        let name = full_name.strip_prefix('.').unwrap_or(full_name);
        std::iter::once(self)
            .chain(self.transitive_dependencies())
            .find_map(|file| {
                let idx = *file.types_by_name.get(name)?;
                let entry = &file.types_list[idx];
                Some(FoundType {
                    file,
                    full_name: &entry.full_name,
                    def: file.resolve_location(&entry.location)?,
                })
            })
    }

    fn resolve_location(&self, location: &TypeLocation) -> Option<TypeDef<'_>> {
        match location {
            TypeLocation::Message(path) => self.message_at(path).map(TypeDef::Message),
            TypeLocation::Enum(path, idx) => {
                let enums = if path.is_empty() {
                    &self.descriptor.enums
                } else {
                    &self.message_at(path)?.enums
                };
                enums.get(*idx).map(TypeDef::Enum)
            }
            TypeLocation::Service(idx) => self.descriptor.services.get(*idx).map(TypeDef::Service),
        }
    }

    fn message_at(&self, path: &[usize]) -> Option<&MessageDescriptor> {
        let (first, rest) = path.split_first()?;
        let mut message = self.descriptor.messages.get(*first)?;
        for &i in rest {
            message = message.nested_messages.get(i)?;
        }
        Some(message)
    }
}

/// Index every message, enum and service of `file` by full name.
///
/// Fails on the first name declared twice.
pub(crate) fn index_types(
    file: &FileDescriptor,
) -> Result<(Vec<TypeEntry>, HashMap<String, usize>), LinkError> {
    let mut index = TypeIndexer {
        file: &file.name,
        types_list: Vec::new(),
        types_by_name: HashMap::new(),
    };
    let scope = file.package.as_deref().unwrap_or("");
    for (i, message) in file.messages.iter().enumerate() {
        index.add_message(scope, message, vec![i])?;
    }
    for (i, e) in file.enums.iter().enumerate() {
        index.add(qualify(scope, &e.name), TypeKind::Enum, TypeLocation::Enum(Vec::new(), i))?;
    }
    for (i, s) in file.services.iter().enumerate() {
        index.add(qualify(scope, &s.name), TypeKind::Service, TypeLocation::Service(i))?;
    }
    Ok((index.types_list, index.types_by_name))
}

struct TypeIndexer<'a> {
    file: &'a str,
    types_list: Vec<TypeEntry>,
    types_by_name: HashMap<String, usize>,
}

impl TypeIndexer<'_> {
    fn add(&mut self, full_name: String, kind: TypeKind, location: TypeLocation) -> Result<(), LinkError> {
        if self.types_by_name.contains_key(&full_name) {
            return Err(LinkError::DuplicateSymbol {
                file: self.file.to_string(),
                name: full_name,
            });
        }
        self.types_by_name.insert(full_name.clone(), self.types_list.len());
        self.types_list.push(TypeEntry {
            full_name,
            kind,
            location,
        });
        Ok(())
    }

    fn add_message(&mut self, scope: &str, message: &MessageDescriptor, path: Vec<usize>) -> Result<(), LinkError> {
        let full_name = qualify(scope, &message.name);
        self.add(full_name.clone(), TypeKind::Message, TypeLocation::Message(path.clone()))?;
        for (i, nested) in message.nested_messages.iter().enumerate() {
            let mut child = path.clone();
            child.push(i);
            self.add_message(&full_name, nested, child)?;
        }
        for (i, e) in message.enums.iter().enumerate() {
            self.add(
                qualify(&full_name, &e.name),
                TypeKind::Enum,
                TypeLocation::Enum(path.clone(), i),
            )?;
        }
        Ok(())
    }
}

/// `scope.name`, or just `name` at the root scope.
pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn linked(source: &str) -> LinkedFile {
        let file = parser::parse("t.proto", source).unwrap();
        let (list, by_name) = index_types(&file).unwrap();
        LinkedFile::new(file, Vec::new(), list, by_name)
    }

    #[test]
    fn test_index_nested_types() {
        let file = linked(
            r#"syntax = "proto3"; package p;
            message Outer { message Inner { enum Kind { A = 0; } } enum Mode { M = 0; } }
            enum Top { T = 0; }
            service S {}"#,
        );
        let names: Vec<_> = file.types_list.iter().map(|t| t.full_name.as_str()).collect();
        assert_eq!(
            names,
            ["p.Outer", "p.Outer.Inner", "p.Outer.Inner.Kind", "p.Outer.Mode", "p.Top", "p.S"]
        );
        assert_eq!(file.get_message(".p.Outer.Inner").unwrap().name, "Inner");
        assert_eq!(file.get_enum("p.Outer.Inner.Kind").unwrap().values[0].name, "A");
        assert!(file.get_message("p.Top").is_none());
        assert!(matches!(file.get_type("p.S"), Some(TypeDef::Service(_))));
    }

    #[test]
    fn test_duplicate_symbol() {
        let file = parser::parse(
            "t.proto",
            r#"syntax = "proto3"; message A {} enum A { Z = 0; }"#,
        )
        .unwrap();
        assert!(matches!(
            index_types(&file),
            Err(LinkError::DuplicateSymbol { name, .. }) if name == "A"
        ));
    }
}
