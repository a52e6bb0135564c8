use std::num::IntErrorKind;

use super::ast::*;
use super::lexer::{unescape_string, Lexer, Token, TokenKind};
use super::location::{path, SourceLocationTable, Span};

/// A diagnostic has already been recorded; the caller should resynchronize.
struct Reported;

type PResult<T> = Result<T, Reported>;

/// Scalar type or unresolved type name.
type TypeRef = (Option<FieldType>, Option<String>);

/// Keywords that begin a statement. Recovery stops in front of one that opens a new line.
const STATEMENT_KEYWORDS: &[&str] = &[
    "syntax",
    "package",
    "import",
    "option",
    "message",
    "enum",
    "service",
    "extend",
    "oneof",
    "rpc",
    "reserved",
    "extensions",
    "optional",
    "required",
    "repeated",
];

/// Parse a whole file from `lexer` into `file`.
///
/// Returns `false` on a fatal structural error (input ended inside a block).
/// Recoverable problems only show up in the lexer's diagnostic sink, so
/// callers must check it as well.
pub fn parse(lexer: &mut Lexer<'_>, file: &mut FileDescriptor) -> bool {
    Parser::new(lexer).parse_file(file)
}

/// Recursive descent parser over a [`Lexer`].
pub struct Parser<'l, 'a> {
    lexer: &'l mut Lexer<'a>,
    syntax: Syntax,
    locations: Option<SourceLocationTable>,
    last_end: (usize, usize),
    fatal: bool,
    nesting_budget: usize,
}

impl<'l, 'a> Parser<'l, 'a> {
    pub fn new(lexer: &'l mut Lexer<'a>) -> Self {
        Parser {
            lexer,
            syntax: Syntax::Proto2,
            locations: None,
            last_end: (1, 1),
            fatal: false,
            nesting_budget: MAX_MESSAGE_NESTING,
        }
    }

    /// Also record declaration spans; retrieve them with [`Parser::into_locations`].
    pub fn with_source_locations(mut self) -> Self {
        self.locations = Some(SourceLocationTable::new());
        self
    }

    pub fn into_locations(self) -> SourceLocationTable {
        self.locations.unwrap_or_default()
    }

    pub fn parse_file(&mut self, file: &mut FileDescriptor) -> bool {
        if self.cur().kind == TokenKind::Start {
            self.lexer.next();
        }

        if self.at_ident("syntax") {
            if self.parse_syntax(file).is_err() {
                self.skip_statement();
            }
        } else {
            tracing::warn!(file = %file.name, "no syntax specified, defaulting to proto2");
        }
        self.syntax = file.syntax;

        while self.cur().kind != TokenKind::End {
            let before = self.lexer.position();
            if self.at_symbol("}") {
                self.error_at_current("Unmatched \"}\".");
                self.bump();
                continue;
            }
            if self.parse_top_level(file).is_err() {
                self.skip_statement();
            }
            if self.lexer.position() == before {
                self.bump();
            }
        }
        !self.fatal
    }

    // -- Cursor helpers --

    fn cur(&self) -> &Token {
        self.lexer.current()
    }

    fn bump(&mut self) -> Token {
        let tok = self.lexer.current().clone();
        self.last_end = (tok.line, tok.column + tok.text.chars().count());
        self.lexer.next();
        tok
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        self.cur().is_symbol(symbol)
    }

    fn at_ident(&self, word: &str) -> bool {
        self.cur().is_identifier(word)
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        let hit = self.at_symbol(symbol);
        if hit {
            self.bump();
        }
        hit
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        let hit = self.at_ident(word);
        if hit {
            self.bump();
        }
        hit
    }

    fn start(&self) -> (usize, usize) {
        (self.cur().line, self.cur().column)
    }

    fn error_at(&mut self, at: (usize, usize), message: impl Into<String>) -> Reported {
        self.lexer.report(at.0, at.1, message);
        Reported
    }

    fn error_at_current(&mut self, message: impl Into<String>) -> Reported {
        let at = self.start();
        self.error_at(at, message)
    }

    fn expected(&mut self, what: &str) -> Reported {
        let found = self.cur().describe();
        self.error_at_current(format!("Expected {what}, found {found}."))
    }

    fn expect_symbol(&mut self, symbol: &str) -> PResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.expected(&format!("\"{symbol}\"")))
        }
    }

    fn expect_ident(&mut self, word: &str) -> PResult<()> {
        if self.eat_ident(word) {
            Ok(())
        } else {
            Err(self.expected(&format!("\"{word}\"")))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> PResult<String> {
        if self.cur().kind == TokenKind::Identifier {
            Ok(self.bump().text)
        } else {
            Err(self.expected(what))
        }
    }

    fn consume_end_of_declaration(&mut self) -> PResult<()> {
        self.expect_symbol(";")
    }

    fn expect_integer(&mut self, what: &str) -> PResult<u64> {
        if self.cur().kind != TokenKind::Integer {
            return Err(self.expected(what));
        }
        match parse_integer(&self.cur().text) {
            Ok(value) => {
                self.bump();
                Ok(value)
            }
            Err(e) => {
                // Malformed literals were already reported by the lexer.
                if matches!(e.kind(), IntErrorKind::PosOverflow) {
                    self.error_at_current("Integer out of range.");
                }
                self.bump();
                Err(Reported)
            }
        }
    }

    /// `["-"] integer` fitting in an `i32`. The sign is only accepted when `signed`.
    fn expect_i32(&mut self, signed: bool, what: &str) -> PResult<i32> {
        let start = self.start();
        let negative = signed && self.eat_symbol("-");
        let value = self.expect_integer(what)?;
        let limit = if negative {
            i32::MAX as u64 + 1
        } else {
            i32::MAX as u64
        };
        if value > limit {
            return Err(self.error_at(start, "Integer out of range."));
        }
        let value = if negative { -(value as i64) } else { value as i64 };
        Ok(value as i32)
    }

    fn expect_field_number(&mut self) -> PResult<i32> {
        self.expect_i32(false, "field number")
    }

    /// One or more adjacent string literals, concatenated.
    fn expect_string(&mut self, what: &str) -> PResult<Vec<u8>> {
        if self.cur().kind != TokenKind::String {
            return Err(self.expected(what));
        }
        let mut bytes = Vec::new();
        while self.cur().kind == TokenKind::String {
            bytes.extend(unescape_string(&self.bump().text));
        }
        Ok(bytes)
    }

    fn expect_utf8_string(&mut self, what: &str) -> PResult<String> {
        let start = self.start();
        let bytes = self.expect_string(what)?;
        String::from_utf8(bytes).map_err(|_| self.error_at(start, "String literal is not valid UTF-8."))
    }

    fn record_location(&mut self, path: Vec<i32>, start: (usize, usize)) {
        let end = self.last_end;
        if let Some(table) = &mut self.locations {
            table.record(
                path,
                Span {
                    start_line: start.0,
                    start_column: start.1,
                    end_line: end.0,
                    end_column: end.1,
                },
            );
        }
    }

    // -- Recovery --

    /// Skip to the end of the current statement: past `;` or a balanced
    /// `{ ... }` block, or up to a closing `}` or the next statement keyword.
    fn skip_statement(&mut self) {
        loop {
            let kind = self.cur().kind;
            match kind {
                TokenKind::End => return,
                TokenKind::Symbol if self.at_symbol(";") => {
                    self.bump();
                    return;
                }
                TokenKind::Symbol if self.at_symbol("{") => {
                    self.bump();
                    self.skip_rest_of_block();
                    return;
                }
                TokenKind::Symbol if self.at_symbol("}") => return,
                TokenKind::Identifier if self.at_statement_start() => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn at_statement_start(&self) -> bool {
        let tok = self.cur();
        tok.line > self.last_end.0 && STATEMENT_KEYWORDS.contains(&tok.text.as_str())
    }

    fn skip_rest_of_block(&mut self) {
        let mut depth = 1usize;
        loop {
            if self.cur().kind == TokenKind::End {
                return;
            }
            if self.at_symbol("{") {
                depth += 1;
            } else if self.at_symbol("}") {
                depth -= 1;
                if depth == 0 {
                    self.bump();
                    return;
                }
            }
            self.bump();
        }
    }

    /// True (after reporting) when the input ended inside a block.
    fn check_unterminated(&mut self, construct: &str) -> bool {
        if self.cur().kind != TokenKind::End {
            return false;
        }
        self.error_at_current(format!(
            "Reached end of input in {construct} definition (missing '}}')."
        ));
        self.fatal = true;
        true
    }

    // -- Top level --

    fn parse_syntax(&mut self, file: &mut FileDescriptor) -> PResult<()> {
        self.bump();
        self.expect_symbol("=")?;
        let start = self.start();
        let value = self.expect_utf8_string("syntax identifier")?;
        file.syntax = match value.as_str() {
            "proto2" => Syntax::Proto2,
            "proto3" => Syntax::Proto3,
            other => {
                return Err(self.error_at(
                    start,
                    format!(
                        "Unrecognized syntax identifier \"{other}\".  This parser only recognizes \"proto2\" and \"proto3\"."
                    ),
                ))
            }
        };
        self.consume_end_of_declaration()
    }

    fn parse_top_level(&mut self, file: &mut FileDescriptor) -> PResult<()> {
        if self.eat_symbol(";") {
            return Ok(());
        }
        if self.cur().kind != TokenKind::Identifier {
            return Err(self.error_at_current("Expected top-level statement (e.g. \"message\")."));
        }
        let word = self.cur().text.clone();
        match word.as_str() {
            "message" => {
                let path = vec![path::FILE_MESSAGE, file.messages.len() as i32];
                let message = self.parse_message(path)?;
                file.messages.push(message);
                Ok(())
            }
            "enum" => {
                let path = vec![path::FILE_ENUM, file.enums.len() as i32];
                let descriptor = self.parse_enum(path)?;
                file.enums.push(descriptor);
                Ok(())
            }
            "service" => {
                let path = vec![path::FILE_SERVICE, file.services.len() as i32];
                let service = self.parse_service(path)?;
                file.services.push(service);
                Ok(())
            }
            "extend" => self.parse_extend(&mut file.extensions, &[path::FILE_EXTENSION]),
            "import" => self.parse_import(file),
            "package" => self.parse_package(file),
            "option" => self.parse_option_statement(&mut file.options),
            "syntax" => Err(self.error_at_current(
                "The \"syntax\" statement must be the first statement in the file.",
            )),
            _ => Err(self.error_at_current("Expected top-level statement (e.g. \"message\").")),
        }
    }

    fn parse_import(&mut self, file: &mut FileDescriptor) -> PResult<()> {
        self.bump();
        let public = self.eat_ident("public");
        let weak = !public && self.eat_ident("weak");
        let start = self.start();
        let import = self.expect_utf8_string("a string naming the file to import")?;
        if file.dependencies.contains(&import) {
            self.error_at(start, format!("Import \"{import}\" was listed twice."));
        } else {
            let index = file.dependencies.len();
            file.dependencies.push(import);
            if public {
                file.public_dependencies.push(index);
            }
            if weak {
                file.weak_dependencies.push(index);
            }
        }
        self.consume_end_of_declaration()
    }

    fn parse_package(&mut self, file: &mut FileDescriptor) -> PResult<()> {
        let start = self.start();
        self.bump();
        if file.package.is_some() {
            self.error_at(start, "Multiple package definitions.");
        }
        let mut name = self.expect_identifier("package name")?;
        while self.eat_symbol(".") {
            name.push('.');
            name.push_str(&self.expect_identifier("identifier")?);
        }
        file.package.get_or_insert(name);
        self.consume_end_of_declaration()
    }

    // -- Options --

    fn parse_option_statement(&mut self, options: &mut Options) -> PResult<()> {
        self.bump();
        let (name, value) = self.parse_option_assignment()?;
        self.consume_end_of_declaration()?;
        options.push(name, value);
        Ok(())
    }

    fn parse_bracketed_options(&mut self) -> PResult<Options> {
        let mut options = Options::new();
        self.expect_symbol("[")?;
        loop {
            let (name, value) = self.parse_option_assignment()?;
            options.push(name, value);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol("]")?;
        Ok(options)
    }

    fn parse_option_assignment(&mut self) -> PResult<(String, OptionValue)> {
        let name = self.parse_option_name()?;
        self.expect_symbol("=")?;
        let value = self.parse_option_value()?;
        Ok((name, value))
    }

    /// `ident | "(" type_name ")"`, joined by dots.
    fn parse_option_name(&mut self) -> PResult<String> {
        let mut name = String::new();
        loop {
            if self.eat_symbol("(") {
                name.push('(');
                name.push_str(&self.parse_type_name()?);
                self.expect_symbol(")")?;
                name.push(')');
            } else {
                name.push_str(&self.expect_identifier("option name")?);
            }
            if !self.eat_symbol(".") {
                break;
            }
            name.push('.');
        }
        Ok(name)
    }

    fn parse_option_value(&mut self) -> PResult<OptionValue> {
        let start = self.start();
        if self.eat_symbol("-") {
            let kind = self.cur().kind;
            return match kind {
                TokenKind::Integer => {
                    let value = self.expect_integer("integer")?;
                    if value > i64::MAX as u64 + 1 {
                        return Err(self.error_at(start, "Integer out of range."));
                    }
                    Ok(OptionValue::Int((value as i64).wrapping_neg()))
                }
                TokenKind::Float => Ok(OptionValue::Float(-parse_float(&self.bump().text))),
                TokenKind::Identifier if self.at_ident("inf") => {
                    self.bump();
                    Ok(OptionValue::Float(f64::NEG_INFINITY))
                }
                TokenKind::Identifier if self.at_ident("nan") => {
                    self.bump();
                    Ok(OptionValue::Float(f64::NAN))
                }
                _ => Err(self.expected("number")),
            };
        }
        let kind = self.cur().kind;
        match kind {
            TokenKind::Integer => Ok(OptionValue::UInt(self.expect_integer("integer")?)),
            TokenKind::Float => Ok(OptionValue::Float(parse_float(&self.bump().text))),
            TokenKind::String => {
                let bytes = self.expect_string("string")?;
                Ok(OptionValue::String(String::from_utf8_lossy(&bytes).into_owned()))
            }
            TokenKind::Identifier => {
                let text = self.bump().text;
                Ok(match text.as_str() {
                    "inf" => OptionValue::Float(f64::INFINITY),
                    "nan" => OptionValue::Float(f64::NAN),
                    _ => OptionValue::Identifier(text),
                })
            }
            TokenKind::Symbol if self.at_symbol("{") => self.parse_aggregate(),
            _ => Err(self.expected("option value")),
        }
    }

    /// Text-format `{ ... }` value, captured as space-joined tokens.
    fn parse_aggregate(&mut self) -> PResult<OptionValue> {
        self.bump();
        let mut depth = 1usize;
        let mut parts: Vec<String> = Vec::new();
        loop {
            if self.cur().kind == TokenKind::End {
                return Err(
                    self.error_at_current("Unexpected end of stream while parsing aggregate value.")
                );
            }
            if self.at_symbol("{") {
                depth += 1;
            } else if self.at_symbol("}") {
                depth -= 1;
                if depth == 0 {
                    self.bump();
                    break;
                }
            }
            parts.push(self.bump().text);
        }
        Ok(OptionValue::Aggregate(parts.join(" ")))
    }

    // -- Messages --

    fn parse_message(&mut self, path: Vec<i32>) -> PResult<MessageDescriptor> {
        let start = self.start();
        if self.nesting_budget == 0 {
            let err = self.error_at_current("Reached maximum recursion limit for nested messages.");
            self.bump();
            // Name and body, nested blocks included.
            self.skip_statement();
            return Err(err);
        }
        self.bump();
        let name = self.expect_identifier("message name")?;
        let mut message = MessageDescriptor::new(name);
        self.nesting_budget -= 1;
        let body = self.parse_message_body(&mut message, &path);
        self.nesting_budget += 1;
        body?;
        self.record_location(path, start);
        Ok(message)
    }

    fn parse_message_body(&mut self, message: &mut MessageDescriptor, path: &[i32]) -> PResult<()> {
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            if self.check_unterminated("message") {
                break;
            }
            let before = self.lexer.position();
            if self.parse_message_statement(message, path).is_err() {
                self.skip_statement();
            }
            if self.lexer.position() == before {
                self.bump();
            }
        }
        add_synthetic_oneofs(message);
        Ok(())
    }

    fn parse_message_statement(&mut self, message: &mut MessageDescriptor, path: &[i32]) -> PResult<()> {
        if self.eat_symbol(";") {
            return Ok(());
        }
        if self.cur().kind == TokenKind::Identifier {
            let word = self.cur().text.clone();
            match word.as_str() {
                "message" => {
                    let child = child_path(path, path::MESSAGE_NESTED, message.nested_messages.len());
                    let nested = self.parse_message(child)?;
                    message.nested_messages.push(nested);
                    return Ok(());
                }
                "enum" => {
                    let child = child_path(path, path::MESSAGE_ENUM, message.enums.len());
                    let nested = self.parse_enum(child)?;
                    message.enums.push(nested);
                    return Ok(());
                }
                "extensions" => return self.parse_extensions(message),
                "reserved" => {
                    return self.parse_reserved(
                        &mut message.reserved_ranges,
                        &mut message.reserved_names,
                        false,
                    )
                }
                "extend" => {
                    let mut prefix = path.to_vec();
                    prefix.push(path::MESSAGE_EXTENSION);
                    return self.parse_extend(&mut message.extensions, &prefix);
                }
                "option" => return self.parse_option_statement(&mut message.options),
                "oneof" => return self.parse_oneof(message, path),
                _ => {}
            }
        }
        self.parse_message_field(message, path, None)
    }

    fn parse_message_field(
        &mut self,
        message: &mut MessageDescriptor,
        path: &[i32],
        oneof: Option<usize>,
    ) -> PResult<()> {
        let index = message.fields.len();
        let child = child_path(path, path::MESSAGE_FIELD, index);
        let (mut field, map_entry) = self.parse_field(child, oneof.is_some())?;
        if let Some(entry) = map_entry {
            message.nested_messages.push(entry);
        }
        field.oneof_index = oneof;
        message.fields.push(field);
        if let Some(i) = oneof {
            message.oneofs[i].fields.push(index);
        }
        Ok(())
    }

    /// `[label] type name "=" number [options] ";"`, or a `map<K, V>` field.
    ///
    /// For map fields the synthesized entry message is returned alongside.
    fn parse_field(
        &mut self,
        path: Vec<i32>,
        in_oneof: bool,
    ) -> PResult<(FieldDescriptor, Option<MessageDescriptor>)> {
        let start = self.start();
        let label = if self.cur().kind == TokenKind::Identifier {
            Label::from_keyword(&self.cur().text)
        } else {
            None
        };
        if label.is_some() {
            self.bump();
        }

        if in_oneof && label.is_some() {
            self.error_at(
                start,
                "Fields in oneofs must not have labels (required / optional / repeated).",
            );
        } else if label.is_none() && !in_oneof && self.syntax == Syntax::Proto2 && !self.at_ident("map") {
            self.error_at_current("Expected \"required\", \"optional\", or \"repeated\".");
        }
        if label == Some(Label::Required) && self.syntax == Syntax::Proto3 {
            self.error_at(start, "Required fields are not allowed in proto3.");
        }

        if self.at_ident("group") {
            return Err(self.error_at_current("Groups are not supported."));
        }

        let mut map_types = None;
        let (ty, type_name) = if self.at_ident("map") {
            self.bump();
            if self.at_symbol("<") {
                map_types = Some(self.parse_map_types()?);
                (None, None)
            } else {
                (None, Some(self.finish_type_name("map".to_string())?))
            }
        } else {
            self.parse_type()?
        };

        let name = self.expect_identifier("field name")?;
        self.expect_symbol("=")?;
        let number = self.expect_field_number()?;

        let mut field = FieldDescriptor::new(name, number, label.unwrap_or(Label::Optional));
        field.ty = ty;
        field.type_name = type_name;
        field.proto3_optional =
            label == Some(Label::Optional) && self.syntax == Syntax::Proto3 && !in_oneof;

        let map_entry = match map_types {
            Some((key, value)) => {
                if label.is_some() {
                    self.error_at(
                        start,
                        "Field labels (required/optional/repeated) are not allowed on map fields.",
                    );
                }
                if in_oneof {
                    self.error_at(start, "Map fields are not allowed in oneofs.");
                }
                let entry_name = map_entry_name(&field.name);
                field.label = Label::Repeated;
                field.proto3_optional = false;
                field.type_name = Some(entry_name.clone());
                Some(build_map_entry(entry_name, key, value))
            }
            None => None,
        };

        if self.at_symbol("[") {
            self.parse_field_options(&mut field)?;
        }
        self.consume_end_of_declaration()?;
        self.record_location(path, start);
        Ok((field, map_entry))
    }

    fn parse_map_types(&mut self) -> PResult<(TypeRef, TypeRef)> {
        self.expect_symbol("<")?;
        let key = self.parse_type()?;
        self.expect_symbol(",")?;
        let value = self.parse_type()?;
        self.expect_symbol(">")?;
        Ok((key, value))
    }

    fn parse_type(&mut self) -> PResult<TypeRef> {
        if self.cur().kind == TokenKind::Identifier {
            if let Some(ty) = FieldType::from_keyword(&self.cur().text) {
                self.bump();
                return Ok((Some(ty), None));
            }
        }
        Ok((None, Some(self.parse_type_name()?)))
    }

    /// `["."] ident ("." ident)*`
    fn parse_type_name(&mut self) -> PResult<String> {
        let mut name = String::new();
        if self.eat_symbol(".") {
            name.push('.');
        }
        name.push_str(&self.expect_identifier("type name")?);
        self.finish_type_name(name)
    }

    fn finish_type_name(&mut self, mut name: String) -> PResult<String> {
        while self.eat_symbol(".") {
            name.push('.');
            name.push_str(&self.expect_identifier("identifier")?);
        }
        Ok(name)
    }

    fn parse_field_options(&mut self, field: &mut FieldDescriptor) -> PResult<()> {
        self.expect_symbol("[")?;
        loop {
            let start = self.start();
            if self.eat_ident("default") {
                self.expect_symbol("=")?;
                if self.syntax == Syntax::Proto3 {
                    self.error_at(start, "Explicit default values are not allowed in proto3.");
                }
                if field.default_value.is_some() {
                    self.error_at(start, "Already set option \"default\".");
                }
                field.default_value = Some(self.parse_default_value(field)?);
            } else if self.eat_ident("json_name") {
                self.expect_symbol("=")?;
                if field.json_name.is_some() {
                    self.error_at(start, "Already set option \"json_name\".");
                }
                field.json_name = Some(self.expect_utf8_string("string")?);
            } else {
                let (name, value) = self.parse_option_assignment()?;
                field.options.push(name, value);
            }
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol("]")
    }

    /// Default values are stored as text, the way descriptor.proto keeps them.
    fn parse_default_value(&mut self, field: &FieldDescriptor) -> PResult<String> {
        let start = self.start();
        match field.ty {
            // Unresolved type: only enum references may have defaults.
            None => {
                if self.cur().kind == TokenKind::Identifier {
                    Ok(self.bump().text)
                } else {
                    Err(self.error_at_current("Default value for an enum field must be an identifier."))
                }
            }
            Some(FieldType::String) => self.expect_utf8_string("string"),
            Some(FieldType::Bytes) => Ok(escape_string(&self.expect_string("string")?)),
            Some(FieldType::Bool) => {
                if self.at_ident("true") || self.at_ident("false") {
                    Ok(self.bump().text)
                } else {
                    Err(self.expected("\"true\" or \"false\""))
                }
            }
            Some(FieldType::Float | FieldType::Double) => {
                let negative = self.eat_symbol("-");
                let kind = self.cur().kind;
                let text = match kind {
                    TokenKind::Integer => self.expect_integer("number")?.to_string(),
                    TokenKind::Float => {
                        let raw = self.bump().text;
                        raw.trim_end_matches(['f', 'F']).to_string()
                    }
                    TokenKind::Identifier if self.at_ident("inf") || self.at_ident("nan") => {
                        self.bump().text
                    }
                    _ => return Err(self.expected("number")),
                };
                Ok(if negative { format!("-{text}") } else { text })
            }
            Some(FieldType::Message | FieldType::Enum) => {
                Err(self.error_at_current("Messages can't have default values."))
            }
            Some(ty) => {
                let negative = self.eat_symbol("-");
                if negative && ty.is_unsigned() {
                    return Err(self.error_at(start, "Unsigned field can't have negative default value."));
                }
                let value = self.expect_integer("integer")?;
                if value > integer_limit(ty, negative) {
                    return Err(self.error_at(start, "Integer out of range."));
                }
                Ok(if negative {
                    format!("-{value}")
                } else {
                    value.to_string()
                })
            }
        }
    }

    fn parse_extensions(&mut self, message: &mut MessageDescriptor) -> PResult<()> {
        self.bump();
        let first = message.extension_ranges.len();
        loop {
            let start = self.expect_field_number()?;
            let end = if self.eat_ident("to") {
                if self.eat_ident("max") {
                    MAX_FIELD_NUMBER
                } else {
                    self.expect_field_number()?
                }
            } else {
                start
            };
            message.extension_ranges.push(ExtensionRange {
                start,
                end: end.saturating_add(1),
                options: Options::new(),
            });
            if !self.eat_symbol(",") {
                break;
            }
        }
        if self.at_symbol("[") {
            let options = self.parse_bracketed_options()?;
            for range in &mut message.extension_ranges[first..] {
                range.options = options.clone();
            }
        }
        self.consume_end_of_declaration()
    }

    /// `reserved` ranges or quoted names. Message range ends are stored exclusive,
    /// enum range ends inclusive.
    fn parse_reserved(
        &mut self,
        ranges: &mut Vec<ReservedRange>,
        names: &mut Vec<String>,
        for_enum: bool,
    ) -> PResult<()> {
        const MIXED: &str = "Reserved names and ranges must be in separate statements.";
        self.bump();
        if self.cur().kind == TokenKind::String {
            loop {
                names.push(self.expect_utf8_string("reserved name")?);
                if !self.eat_symbol(",") {
                    break;
                }
                if matches!(self.cur().kind, TokenKind::Integer) || self.at_symbol("-") {
                    return Err(self.error_at_current(MIXED));
                }
            }
        } else {
            let (max, what) = if for_enum {
                (i32::MAX, "enum value")
            } else {
                (MAX_FIELD_NUMBER, "field number")
            };
            loop {
                let start = self.expect_i32(for_enum, what)?;
                let end = if self.eat_ident("to") {
                    if self.eat_ident("max") {
                        max
                    } else {
                        self.expect_i32(for_enum, what)?
                    }
                } else {
                    start
                };
                ranges.push(ReservedRange {
                    start,
                    end: if for_enum { end } else { end.saturating_add(1) },
                });
                if !self.eat_symbol(",") {
                    break;
                }
                if self.cur().kind == TokenKind::String {
                    return Err(self.error_at_current(MIXED));
                }
            }
        }
        self.consume_end_of_declaration()
    }

    fn parse_oneof(&mut self, message: &mut MessageDescriptor, path: &[i32]) -> PResult<()> {
        let start = self.start();
        self.bump();
        let name = self.expect_identifier("oneof name")?;
        self.expect_symbol("{")?;
        let index = message.oneofs.len();
        message.oneofs.push(OneofDescriptor {
            name,
            ..Default::default()
        });

        while !self.eat_symbol("}") {
            if self.check_unterminated("oneof") {
                break;
            }
            let before = self.lexer.position();
            let result = if self.at_ident("option") {
                self.parse_option_statement(&mut message.oneofs[index].options)
            } else if self.eat_symbol(";") {
                Ok(())
            } else {
                self.parse_message_field(message, path, Some(index))
            };
            if result.is_err() {
                self.skip_statement();
            }
            if self.lexer.position() == before {
                self.bump();
            }
        }

        if message.oneofs[index].fields.is_empty() {
            self.error_at(start, "Oneof must have at least one field.");
        }
        self.record_location(child_path(path, path::MESSAGE_ONEOF, index), start);
        Ok(())
    }

    fn parse_extend(&mut self, extensions: &mut Vec<FieldDescriptor>, prefix: &[i32]) -> PResult<()> {
        self.bump();
        let extendee = self.parse_type_name()?;
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            if self.check_unterminated("extend") {
                break;
            }
            if self.eat_symbol(";") {
                continue;
            }
            let before = self.lexer.position();
            let start = self.start();
            let mut path = prefix.to_vec();
            path.push(extensions.len() as i32);
            match self.parse_field(path, false) {
                Ok((mut field, map_entry)) => {
                    if map_entry.is_some() {
                        self.error_at(start, "Map fields are not allowed to be extensions.");
                    }
                    field.extendee = Some(extendee.clone());
                    extensions.push(field);
                }
                Err(Reported) => self.skip_statement(),
            }
            if self.lexer.position() == before {
                self.bump();
            }
        }
        Ok(())
    }

    // -- Enums --

    fn parse_enum(&mut self, path: Vec<i32>) -> PResult<EnumDescriptor> {
        let start = self.start();
        self.bump();
        let name = self.expect_identifier("enum name")?;
        let mut descriptor = EnumDescriptor::new(name);
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            if self.check_unterminated("enum") {
                break;
            }
            let before = self.lexer.position();
            if self.parse_enum_statement(&mut descriptor, &path).is_err() {
                self.skip_statement();
            }
            if self.lexer.position() == before {
                self.bump();
            }
        }
        self.record_location(path, start);
        Ok(descriptor)
    }

    fn parse_enum_statement(&mut self, descriptor: &mut EnumDescriptor, path: &[i32]) -> PResult<()> {
        if self.eat_symbol(";") {
            return Ok(());
        }
        if self.at_ident("option") {
            return self.parse_option_statement(&mut descriptor.options);
        }
        if self.at_ident("reserved") {
            return self.parse_reserved(
                &mut descriptor.reserved_ranges,
                &mut descriptor.reserved_names,
                true,
            );
        }

        let start = self.start();
        let name = self.expect_identifier("enum constant name")?;
        self.expect_symbol("=")?;
        let number = self.expect_i32(true, "integer")?;
        let options = if self.at_symbol("[") {
            self.parse_bracketed_options()?
        } else {
            Options::new()
        };
        self.consume_end_of_declaration()?;
        let child = child_path(path, path::ENUM_VALUE, descriptor.values.len());
        self.record_location(child, start);
        descriptor.values.push(EnumValueDescriptor {
            name,
            number,
            options,
        });
        Ok(())
    }

    // -- Services --

    fn parse_service(&mut self, path: Vec<i32>) -> PResult<ServiceDescriptor> {
        let start = self.start();
        self.bump();
        let name = self.expect_identifier("service name")?;
        let mut service = ServiceDescriptor {
            name,
            ..Default::default()
        };
        self.expect_symbol("{")?;
        while !self.eat_symbol("}") {
            if self.check_unterminated("service") {
                break;
            }
            let before = self.lexer.position();
            let result = if self.eat_symbol(";") {
                Ok(())
            } else if self.at_ident("option") {
                self.parse_option_statement(&mut service.options)
            } else if self.at_ident("rpc") {
                let child = child_path(&path, path::SERVICE_METHOD, service.methods.len());
                self.parse_method(child).map(|m| service.methods.push(m))
            } else {
                Err(self.expected("\"rpc\""))
            };
            if result.is_err() {
                self.skip_statement();
            }
            if self.lexer.position() == before {
                self.bump();
            }
        }
        self.record_location(path, start);
        Ok(service)
    }

    fn parse_method(&mut self, path: Vec<i32>) -> PResult<MethodDescriptor> {
        let start = self.start();
        self.bump();
        let name = self.expect_identifier("method name")?;
        let (client_streaming, input_type) = self.parse_method_type()?;
        self.expect_ident("returns")?;
        let (server_streaming, output_type) = self.parse_method_type()?;
        let mut method = MethodDescriptor {
            name,
            input_type,
            output_type,
            client_streaming,
            server_streaming,
            options: Options::new(),
        };

        if self.eat_symbol("{") {
            while !self.eat_symbol("}") {
                if self.check_unterminated("method") {
                    break;
                }
                let before = self.lexer.position();
                let result = if self.eat_symbol(";") {
                    Ok(())
                } else if self.at_ident("option") {
                    self.parse_option_statement(&mut method.options)
                } else {
                    Err(self.expected("\"option\""))
                };
                if result.is_err() {
                    self.skip_statement();
                }
                if self.lexer.position() == before {
                    self.bump();
                }
            }
        } else {
            self.consume_end_of_declaration()?;
        }
        self.record_location(path, start);
        Ok(method)
    }

    /// `"(" ["stream"] type_name ")"`
    fn parse_method_type(&mut self) -> PResult<(bool, String)> {
        self.expect_symbol("(")?;
        let streaming = self.eat_ident("stream");
        let name = self.parse_type_name()?;
        self.expect_symbol(")")?;
        Ok((streaming, name))
    }
}

// Helper functions

fn child_path(parent: &[i32], field: i32, index: usize) -> Vec<i32> {
    let mut path = parent.to_vec();
    path.push(field);
    path.push(index as i32);
    path
}

fn parse_integer(text: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8)
    } else {
        text.parse()
    }
}

fn parse_float(text: &str) -> f64 {
    // Malformed literals were reported by the lexer; any value will do.
    text.trim_end_matches(['f', 'F']).parse().unwrap_or(0.0)
}

fn integer_limit(ty: FieldType, negative: bool) -> u64 {
    match ty {
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 if negative => 1 << 31,
        FieldType::Int32 | FieldType::Sint32 | FieldType::Sfixed32 => i32::MAX as u64,
        FieldType::Uint32 | FieldType::Fixed32 => u32::MAX as u64,
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 if negative => 1 << 63,
        FieldType::Int64 | FieldType::Sint64 | FieldType::Sfixed64 => i64::MAX as u64,
        _ => u64::MAX,
    }
}

/// `foo_bar` -> `FooBarEntry`.
fn map_entry_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len() + 5);
    let mut upper_next = true;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}

fn build_map_entry(name: String, key: TypeRef, value: TypeRef) -> MessageDescriptor {
    let mut entry = MessageDescriptor::new(name);
    let mut key_field = FieldDescriptor::new("key", 1, Label::Optional);
    (key_field.ty, key_field.type_name) = key;
    let mut value_field = FieldDescriptor::new("value", 2, Label::Optional);
    (value_field.ty, value_field.type_name) = value;
    entry.fields = vec![key_field, value_field];
    entry
        .options
        .push("map_entry", OptionValue::Identifier("true".into()));
    entry
}

/// Every proto3 `optional` field gets its own oneof, after the declared ones.
fn add_synthetic_oneofs(message: &mut MessageDescriptor) {
    for i in 0..message.fields.len() {
        if !message.fields[i].proto3_optional {
            continue;
        }
        let mut name = format!("_{}", message.fields[i].name);
        while message.oneofs.iter().any(|o| o.name == name)
            || message.fields.iter().any(|f| f.name == name)
        {
            name.insert(0, 'X');
        }
        message.fields[i].oneof_index = Some(message.oneofs.len());
        message.oneofs.push(OneofDescriptor {
            name,
            fields: vec![i],
            options: Options::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostics;

    fn parse_source(source: &str) -> (FileDescriptor, Diagnostics, bool) {
        let mut diags = Diagnostics::new();
        let mut file = FileDescriptor::new("test.proto");
        let ok = {
            let mut lexer = Lexer::new(source, &mut diags);
            parse(&mut lexer, &mut file)
        };
        (file, diags, ok)
    }

    fn parse_ok(source: &str) -> FileDescriptor {
        let (file, diags, ok) = parse_source(source);
        assert!(ok);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        file
    }

    fn messages(diags: &Diagnostics) -> Vec<String> {
        diags.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_message() {
        let file = parse_ok(r#"syntax = "proto3"; package a.b; message A { string name = 1; }"#);
        assert_eq!(file.syntax, Syntax::Proto3);
        assert_eq!(file.package.as_deref(), Some("a.b"));
        assert_eq!(file.messages.len(), 1);
        let field = &file.messages[0].fields[0];
        assert_eq!(field.name, "name");
        assert_eq!(field.number, 1);
        assert_eq!(field.ty, Some(FieldType::String));
        assert_eq!(field.label, Label::Optional);
        assert!(!field.proto3_optional);
    }

    #[test]
    fn test_deep_nesting_is_a_diagnostic() {
        let depth = 3000;
        let mut source = String::from("syntax = \"proto3\";\n");
        for i in 0..depth {
            source.push_str(&format!("message M{i} {{ "));
        }
        source.push_str(&"}".repeat(depth));
        source.push_str("\nmessage After {}");

        let (file, diags, ok) = parse_source(&source);
        assert!(ok);
        assert_eq!(diags.len(), 1);
        assert!(messages(&diags)[0].ends_with("Reached maximum recursion limit for nested messages."));
        assert_eq!(file.messages.len(), 2);
        assert_eq!(file.messages[1].name, "After");

        let mut depth_seen = 1;
        let mut message = &file.messages[0];
        while let Some(nested) = message.nested_messages.first() {
            depth_seen += 1;
            message = nested;
        }
        assert_eq!(depth_seen, MAX_MESSAGE_NESTING);
    }

    #[test]
    fn test_nesting_at_the_limit_parses() {
        let mut source = String::from("syntax = \"proto3\";\n");
        for i in 0..MAX_MESSAGE_NESTING {
            source.push_str(&format!("message M{i} {{ "));
        }
        source.push_str(&"}".repeat(MAX_MESSAGE_NESTING));
        parse_ok(&source);
    }

    #[test]
    fn test_parse_oneof() {
        let file = parse_ok(
            r#"syntax = "proto3";
            message M {
                int32 a = 1;
                oneof choice {
                    string b = 2;
                    Other c = 3;
                }
            }"#,
        );
        let m = &file.messages[0];
        assert_eq!(m.fields.len(), 3);
        assert_eq!(m.oneofs.len(), 1);
        assert_eq!(m.oneofs[0].name, "choice");
        assert_eq!(m.oneofs[0].fields, vec![1, 2]);
        assert_eq!(m.fields[0].oneof_index, None);
        assert_eq!(m.fields[1].oneof_index, Some(0));
        assert_eq!(m.fields[2].oneof_index, Some(0));
        assert_eq!(m.fields[2].type_name.as_deref(), Some("Other"));
        assert_eq!(m.fields[2].ty, None);
    }

    #[test]
    fn test_proto3_optional_gets_synthetic_oneof() {
        let file = parse_ok(
            r#"syntax = "proto3";
            message M { oneof o { int32 a = 1; } optional string b = 2; }"#,
        );
        let m = &file.messages[0];
        assert!(m.fields[1].proto3_optional);
        assert_eq!(m.oneofs.len(), 2);
        assert_eq!(m.oneofs[1].name, "_b");
        assert_eq!(m.fields[1].oneof_index, Some(1));
    }

    #[test]
    fn test_parse_map_field() {
        let file = parse_ok(
            r#"syntax = "proto3"; message M { map<string, Value> attr_values = 4; }"#,
        );
        let m = &file.messages[0];
        assert_eq!(m.fields[0].label, Label::Repeated);
        assert_eq!(m.fields[0].type_name.as_deref(), Some("AttrValuesEntry"));
        let entry = &m.nested_messages[0];
        assert_eq!(entry.name, "AttrValuesEntry");
        assert!(entry.is_map_entry());
        assert_eq!(entry.fields[0].ty, Some(FieldType::String));
        assert_eq!(entry.fields[1].type_name.as_deref(), Some("Value"));
    }

    #[test]
    fn test_parse_proto2_constructs() {
        let file = parse_ok(
            r#"
            syntax = "proto2";
            import public "other.proto";
            import weak "weak.proto";
            option java_package = "com.example";
            message M {
                required int32 id = 1;
                optional string name = 2 [default = "x\ty", deprecated = true];
                repeated double d = 3 [packed = true];
                optional float f = 4 [default = -inf];
                optional uint64 u = 5 [default = 0x10];
                optional Kind k = 6 [default = FIRST];
                extensions 100 to 199, 1000 to max;
                reserved 7, 9 to 11;
                reserved "old", "older";
                enum Kind { FIRST = 0; SECOND = -1; }
                extend Other { optional int32 nested_ext = 500; }
            }
            extend M { optional string ext = 100; }
            "#,
        );
        assert_eq!(file.dependencies, vec!["other.proto", "weak.proto"]);
        assert_eq!(file.public_dependencies, vec![0]);
        assert_eq!(file.weak_dependencies, vec![1]);
        assert_eq!(
            file.options.get("java_package"),
            Some(&OptionValue::String("com.example".into()))
        );

        let m = &file.messages[0];
        assert_eq!(m.fields[0].label, Label::Required);
        assert_eq!(m.fields[1].default_value.as_deref(), Some("x\ty"));
        assert!(m.fields[1].options.is_set("deprecated"));
        assert!(m.fields[2].options.is_set("packed"));
        assert_eq!(m.fields[3].default_value.as_deref(), Some("-inf"));
        assert_eq!(m.fields[4].default_value.as_deref(), Some("16"));
        assert_eq!(m.fields[5].default_value.as_deref(), Some("FIRST"));
        assert_eq!(m.extension_ranges.len(), 2);
        assert_eq!((m.extension_ranges[0].start, m.extension_ranges[0].end), (100, 200));
        assert_eq!(m.extension_ranges[1].end, MAX_FIELD_NUMBER + 1);
        assert_eq!(
            m.reserved_ranges,
            vec![ReservedRange { start: 7, end: 8 }, ReservedRange { start: 9, end: 12 }]
        );
        assert_eq!(m.reserved_names, vec!["old", "older"]);
        assert_eq!(m.enums[0].values[1].number, -1);
        assert_eq!(m.extensions[0].extendee.as_deref(), Some("Other"));
        assert_eq!(file.extensions[0].extendee.as_deref(), Some("M"));
        assert_eq!(file.extensions[0].number, 100);
    }

    #[test]
    fn test_parse_service() {
        let file = parse_ok(
            r#"syntax = "proto3";
            service Greeter {
                option deprecated = true;
                rpc Hello(HelloRequest) returns (HelloReply);
                rpc Chat(stream .pkg.Msg) returns (stream Msg) {
                    option idempotency_level = NO_SIDE_EFFECTS;
                }
            }"#,
        );
        let s = &file.services[0];
        assert!(s.options.is_set("deprecated"));
        assert_eq!(s.methods.len(), 2);
        assert_eq!(s.methods[0].input_type, "HelloRequest");
        assert!(!s.methods[0].client_streaming);
        assert_eq!(s.methods[1].input_type, ".pkg.Msg");
        assert!(s.methods[1].client_streaming);
        assert!(s.methods[1].server_streaming);
        assert_eq!(
            s.methods[1].options.get("idempotency_level"),
            Some(&OptionValue::Identifier("NO_SIDE_EFFECTS".into()))
        );
    }

    #[test]
    fn test_parse_option_forms() {
        let file = parse_ok(
            r#"syntax = "proto3";
            option (my.ext).sub = -42;
            option (.x.y) = { a: 1 b { c: "d" } };
            option f = 1.5e3;
            option s = "a" "b";"#,
        );
        let opts = &file.options;
        assert_eq!(opts.get("(my.ext).sub"), Some(&OptionValue::Int(-42)));
        assert_eq!(
            opts.get("(.x.y)"),
            Some(&OptionValue::Aggregate("a : 1 b { c : \"d\" }".into()))
        );
        assert_eq!(opts.get("f"), Some(&OptionValue::Float(1500.0)));
        assert_eq!(opts.get("s"), Some(&OptionValue::String("ab".into())));
    }

    #[test]
    fn test_missing_label_in_proto2() {
        let (file, diags, ok) = parse_source("message M { int32 x = 1; }");
        assert!(ok);
        assert_eq!(file.messages[0].fields.len(), 1);
        assert_eq!(
            messages(&diags),
            vec!["1:13: Expected \"required\", \"optional\", or \"repeated\"."]
        );
    }

    #[test]
    fn test_required_rejected_in_proto3() {
        let (_, diags, _) = parse_source(r#"syntax = "proto3"; message M { required int32 x = 1; }"#);
        assert_eq!(diags.len(), 1);
        assert!(messages(&diags)[0].contains("Required fields are not allowed in proto3."));
    }

    #[test]
    fn test_bad_syntax_value() {
        let (_, diags, _) = parse_source(r#"syntax = "proto4"; message M {}"#);
        assert_eq!(diags.len(), 1);
        assert!(messages(&diags)[0].starts_with("1:10: Unrecognized syntax identifier \"proto4\"."));
    }

    #[test]
    fn test_recovery_one_diagnostic_per_bad_statement() {
        let (file, diags, ok) = parse_source(
            r#"syntax = "proto3";
            message A {
                int32 = 1;
                string name = 2;
                bogus bogus bogus bogus;
            }
            message B { bool b = 1; }"#,
        );
        assert!(ok);
        assert_eq!(diags.len(), 2, "{:?}", diags);
        assert_eq!(file.messages.len(), 2);
        assert_eq!(file.messages[0].fields.len(), 1);
        assert_eq!(file.messages[0].fields[0].name, "name");
        assert_eq!(file.messages[1].name, "B");
    }

    #[test]
    fn test_recovery_after_unterminated_string() {
        let (file, diags, _) = parse_source("syntax = \"proto3\";\nimport \"a.proto;\nmessage A { int32 x = 1; }\n");
        let lexical: Vec<_> = diags
            .iter()
            .filter(|d| d.message == "Unterminated string literal.")
            .collect();
        assert_eq!(lexical.len(), 1);
        assert_eq!((lexical[0].line, lexical[0].column), (2, 8));
        assert_eq!(file.messages.len(), 1);
        assert_eq!(file.messages[0].name, "A");
    }

    #[test]
    fn test_unterminated_block_is_fatal() {
        let (_, diags, ok) = parse_source(r#"syntax = "proto3"; message A { int32 x = 1;"#);
        assert!(!ok);
        assert!(messages(&diags)[0].contains("Reached end of input in message definition"));
    }

    #[test]
    fn test_unmatched_closing_brace() {
        let (_, diags, ok) = parse_source(r#"syntax = "proto3"; } message A {}"#);
        assert!(ok);
        assert_eq!(messages(&diags), vec!["1:20: Unmatched \"}\"."]);
    }

    #[test]
    fn test_field_number_out_of_range() {
        let (_, diags, _) = parse_source(r#"syntax = "proto3"; message A { int32 x = 4294967296; }"#);
        assert_eq!(diags.len(), 1);
        assert!(messages(&diags)[0].contains("Integer out of range."));
    }

    #[test]
    fn test_duplicate_package_and_import() {
        let (_, diags, _) = parse_source(
            r#"syntax = "proto3"; package a; package b; import "x.proto"; import "x.proto";"#,
        );
        let text = messages(&diags);
        assert_eq!(text.len(), 2);
        assert!(text[0].contains("Multiple package definitions."));
        assert!(text[1].contains("was listed twice"));
    }

    #[test]
    fn test_mixed_reserved_rejected() {
        let (_, diags, _) = parse_source(r#"syntax = "proto3"; message A { reserved 1, "foo"; }"#);
        assert_eq!(diags.len(), 1);
        assert!(messages(&diags)[0].contains("separate statements"));
    }

    #[test]
    fn test_groups_rejected() {
        let (file, diags, _) = parse_source(
            "message A { optional group G = 1 { optional int32 x = 2; } optional int32 y = 3; }",
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(file.messages[0].fields.len(), 1);
        assert_eq!(file.messages[0].fields[0].name, "y");
    }

    #[test]
    fn test_source_locations() {
        let mut diags = Diagnostics::new();
        let mut file = FileDescriptor::new("loc.proto");
        let table = {
            let mut lexer = Lexer::new(
                "syntax = \"proto3\";\nmessage A {\n  int32 x = 1;\n}\nenum E { Z = 0; }\n",
                &mut diags,
            );
            let mut parser = Parser::new(&mut lexer).with_source_locations();
            assert!(parser.parse_file(&mut file));
            parser.into_locations()
        };
        let message = table.find(&[path::FILE_MESSAGE, 0]).unwrap();
        assert_eq!(
            message.span,
            Span { start_line: 2, start_column: 1, end_line: 4, end_column: 2 }
        );
        let field = table.find(&[path::FILE_MESSAGE, 0, path::MESSAGE_FIELD, 0]).unwrap();
        assert_eq!(
            field.span,
            Span { start_line: 3, start_column: 3, end_line: 3, end_column: 15 }
        );
        assert!(table.find(&[path::FILE_ENUM, 0, path::ENUM_VALUE, 0]).is_some());
    }

    #[test]
    fn test_map_entry_name() {
        assert_eq!(map_entry_name("foo"), "FooEntry");
        assert_eq!(map_entry_name("foo_bar_baz"), "FooBarBazEntry");
        assert_eq!(map_entry_name("fooBar"), "FooBarEntry");
    }
}
