//! The standard `google/protobuf/*.proto` files, available to every compile
//! without a resolver.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CompileError, LinkError};
use crate::linker::SchemaLinker;
use crate::parser;
use crate::types::LinkedFile;

/// Every well-known file and its source, dependencies before dependents.
pub const WELL_KNOWN_FILES: &[(&str, &str)] = &[
    ("google/protobuf/any.proto", include_str!("well_known/any.proto")),
    (
        "google/protobuf/source_context.proto",
        include_str!("well_known/source_context.proto"),
    ),
    ("google/protobuf/type.proto", include_str!("well_known/type.proto")),
    ("google/protobuf/api.proto", include_str!("well_known/api.proto")),
    ("google/protobuf/duration.proto", include_str!("well_known/duration.proto")),
    ("google/protobuf/empty.proto", include_str!("well_known/empty.proto")),
    ("google/protobuf/field_mask.proto", include_str!("well_known/field_mask.proto")),
    ("google/protobuf/struct.proto", include_str!("well_known/struct.proto")),
    ("google/protobuf/timestamp.proto", include_str!("well_known/timestamp.proto")),
    ("google/protobuf/wrappers.proto", include_str!("well_known/wrappers.proto")),
    ("google/protobuf/descriptor.proto", include_str!("well_known/descriptor.proto")),
];

pub fn is_well_known(path: &str) -> bool {
    source(path).is_some()
}

/// Embedded source text of a well-known file.
pub fn source(path: &str) -> Option<&'static str> {
    WELL_KNOWN_FILES
        .iter()
        .find(|(name, _)| *name == path)
        .map(|(_, text)| *text)
}

/// All well-known files, parsed and linked.
#[derive(Debug, Clone)]
pub struct WellKnownSchemas {
    files: BTreeMap<String, Arc<LinkedFile>>,
}

impl WellKnownSchemas {
    pub fn build(linker: &dyn SchemaLinker) -> Result<Self, CompileError> {
        let mut files: BTreeMap<String, Arc<LinkedFile>> = BTreeMap::new();
        for (path, text) in WELL_KNOWN_FILES {
            let descriptor = parser::parse(path, text)?;
            let dependencies = descriptor
                .dependencies
                .iter()
                .map(|dep| {
                    files.get(dep).cloned().ok_or_else(|| LinkError::UnlinkedDependency {
                        file: path.to_string(),
                        dependency: dep.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let linked = linker.link(descriptor, &dependencies)?;
            files.insert(path.to_string(), Arc::new(linked));
        }
        tracing::debug!(count = files.len(), "built well-known schemas");
        Ok(WellKnownSchemas { files })
    }

    pub fn get(&self, path: &str) -> Option<Arc<LinkedFile>> {
        self.files.get(path).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<LinkedFile>)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v))
    }
}
