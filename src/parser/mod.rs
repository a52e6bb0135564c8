pub mod lexer;
pub mod ast;
pub mod location;
pub mod grammar;

use crate::diagnostic::Diagnostics;
use crate::error::ParseError;
use ast::FileDescriptor;
use lexer::Lexer;
use location::SourceLocationTable;

/// Parse `.proto` source text into an unlinked [`FileDescriptor`].
///
/// Any diagnostic, recoverable or not, fails the whole file.
pub fn parse(path: &str, source: &str) -> Result<FileDescriptor, ParseError> {
    parse_file(path, source, false).map(|(file, _)| file)
}

/// Like [`parse`], also returning the span of every declaration.
pub fn parse_with_locations(
    path: &str,
    source: &str,
) -> Result<(FileDescriptor, SourceLocationTable), ParseError> {
    parse_file(path, source, true)
}

fn parse_file(
    path: &str,
    source: &str,
    record_locations: bool,
) -> Result<(FileDescriptor, SourceLocationTable), ParseError> {
    let mut diagnostics = Diagnostics::new();
    let mut file = FileDescriptor::new(path);
    let (ok, locations) = {
        let mut lexer = Lexer::new(source, &mut diagnostics);
        let mut parser = grammar::Parser::new(&mut lexer);
        if record_locations {
            parser = parser.with_source_locations();
        }
        let ok = parser.parse_file(&mut file);
        (ok, parser.into_locations())
    };

    if !ok || !diagnostics.is_empty() {
        tracing::debug!(path, count = diagnostics.len(), "parse failed");
        return Err(ParseError {
            path: path.to_string(),
            diagnostics: diagnostics.into_vec(),
        });
    }
    Ok((file, locations))
}
