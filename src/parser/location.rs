//! Source spans for declarations, keyed by descriptor path.
//!
//! A path is a sequence of (field number, index) pairs walking down from the
//! file, using the field numbers of `descriptor.proto`: `[4, 0, 2, 1]` is the
//! second field of the first message.

pub mod path {
    pub const FILE_MESSAGE: i32 = 4;
    pub const FILE_ENUM: i32 = 5;
    pub const FILE_SERVICE: i32 = 6;
    pub const FILE_EXTENSION: i32 = 7;

    pub const MESSAGE_FIELD: i32 = 2;
    pub const MESSAGE_NESTED: i32 = 3;
    pub const MESSAGE_ENUM: i32 = 4;
    pub const MESSAGE_EXTENSION: i32 = 6;
    pub const MESSAGE_ONEOF: i32 = 8;

    pub const ENUM_VALUE: i32 = 2;
    pub const SERVICE_METHOD: i32 = 2;
}

/// 1-based start and end positions. `end_column` points just past the last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: Vec<i32>,
    pub span: Span,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocationTable {
    locations: Vec<Location>,
}

impl SourceLocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: Vec<i32>, span: Span) {
        self.locations.push(Location { path, span });
    }

    pub fn find(&self, path: &[i32]) -> Option<&Location> {
        self.locations.iter().find(|l| l.path == path)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Location> {
        self.locations.iter()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
