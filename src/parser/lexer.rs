use crate::diagnostic::DiagnosticSink;

/// Token classes produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Reserved token seen before the first call to `next()`.
    Start,
    /// `[A-Za-z_][A-Za-z0-9_]*`
    Identifier,
    /// Decimal, hex (`0x`) or octal (leading `0`) integer.
    Integer,
    /// Number with a fractional part and/or exponent.
    Float,
    /// Single- or double-quoted string. `text` keeps the quotes and escapes.
    String,
    /// A single punctuation character.
    Symbol,
    /// End of input.
    End,
}

/// A token with the position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn start() -> Self {
        Token {
            kind: TokenKind::Start,
            text: String::new(),
            line: 0,
            column: 0,
        }
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == name
    }

    /// Human-readable form used in "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Start => "start of input".to_string(),
            TokenKind::End => "end of input".to_string(),
            _ => format!("\"{}\"", self.text),
        }
    }
}

const SYMBOLS: &[u8] = b"{}()[]<>;=,.:-+/";

/// Tokenizer for `.proto` source text.
///
/// Tokens are produced lazily, one per call to [`Lexer::next`]. Lexical
/// problems are reported to the diagnostic sink and lexing carries on.
pub struct Lexer<'a> {
    source: &'a str,
    input: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    current: Token,
    index: usize,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, sink: &'a mut dyn DiagnosticSink) -> Self {
        Lexer {
            source,
            input: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            current: Token::start(),
            index: 0,
            sink,
        }
    }

    /// The token at the cursor.
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Number of tokens produced so far.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Record a diagnostic through the lexer's sink.
    pub fn report(&mut self, line: usize, column: usize, message: impl Into<String>) {
        self.sink.record(line, column, message.into());
    }

    /// Advance one token. Returns `false` once the end-of-input token is current.
    pub fn next(&mut self) -> bool {
        if self.current.kind == TokenKind::End {
            return false;
        }
        self.index += 1;
        self.current = self.lex_token();
        self.current.kind != TokenKind::End
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            self.column += 1;
        }
        Some(b)
    }

    fn advance_while(&mut self, pred: impl Fn(u8) -> bool) {
        while let Some(b) = self.peek_byte() {
            if !pred(b) {
                break;
            }
            self.advance();
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | 0x0B | 0x0C) => {
                    self.advance();
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'/') => {
                    self.advance_while(|b| b != b'\n');
                }
                Some(b'/') if self.peek_byte_at(1) == Some(b'*') => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(b) = self.advance() {
                        if b == b'*' && self.peek_byte() == Some(b'/') {
                            self.advance();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.report(line, column, "End-of-file inside block comment.");
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let (line, column, start) = (self.line, self.column, self.pos);

        let kind = match self.peek_byte() {
            None => TokenKind::End,
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                self.advance_while(|b| b.is_ascii_alphanumeric() || b == b'_');
                TokenKind::Identifier
            }
            Some(b) if b.is_ascii_digit() => self.lex_number(false),
            Some(b'.') if self.peek_byte_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                self.lex_number(true)
            }
            Some(q @ (b'"' | b'\'')) => {
                self.lex_string(q, line, column);
                TokenKind::String
            }
            Some(b) if SYMBOLS.contains(&b) => {
                self.advance();
                TokenKind::Symbol
            }
            Some(b) => {
                self.advance();
                if b >= 0x80 {
                    self.advance_while(|b| b & 0xC0 == 0x80);
                }
                let shown = &self.source[start..self.pos];
                self.report(line, column, format!("Invalid character {:?}.", shown));
                tracing::trace!(line, column, "invalid character passed on as a symbol");
                TokenKind::Symbol
            }
        };

        Token {
            kind,
            text: self.source[start..self.pos].to_string(),
            line,
            column,
        }
    }

    fn lex_number(&mut self, starts_with_dot: bool) -> TokenKind {
        let (line, column) = (self.line, self.column);
        let mut kind = TokenKind::Integer;
        let mut is_hex = false;

        if starts_with_dot {
            self.advance();
            self.advance_while(|b| b.is_ascii_digit());
            kind = TokenKind::Float;
        } else if self.peek_byte() == Some(b'0')
            && matches!(self.peek_byte_at(1), Some(b'x' | b'X'))
        {
            is_hex = true;
            self.advance();
            self.advance();
            if !self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.report(line, column, "\"0x\" must be followed by hex digits.");
            }
            self.advance_while(|b| b.is_ascii_hexdigit());
        } else if self.peek_byte() == Some(b'0')
            && self.peek_byte_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            self.advance();
            let digits_start = self.pos;
            self.advance_while(|b| b.is_ascii_digit());
            if self.input[digits_start..self.pos].iter().any(|&b| b > b'7') {
                self.report(line, column, "Numbers starting with leading zero must be in octal.");
            }
        } else {
            self.advance_while(|b| b.is_ascii_digit());
            if self.peek_byte() == Some(b'.') {
                self.advance();
                self.advance_while(|b| b.is_ascii_digit());
                kind = TokenKind::Float;
            }
        }

        if !is_hex {
            if matches!(self.peek_byte(), Some(b'e' | b'E')) {
                self.advance();
                if matches!(self.peek_byte(), Some(b'+' | b'-')) {
                    self.advance();
                }
                if !self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                    self.report(line, column, "\"e\" must be followed by exponent.");
                }
                self.advance_while(|b| b.is_ascii_digit());
                kind = TokenKind::Float;
            }
            if kind == TokenKind::Float && matches!(self.peek_byte(), Some(b'f' | b'F')) {
                self.advance();
            }
        }

        if self
            .peek_byte()
            .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_')
        {
            let (l, c) = (self.line, self.column);
            self.report(l, c, "Need space between number and identifier.");
        }
        kind
    }

    fn lex_string(&mut self, quote: u8, line: usize, column: usize) {
        self.advance();
        loop {
            match self.peek_byte() {
                None | Some(b'\n') => {
                    self.report(line, column, "Unterminated string literal.");
                    return;
                }
                Some(b) if b == quote => {
                    self.advance();
                    return;
                }
                Some(b'\\') => {
                    let (esc_line, esc_column) = (self.line, self.column);
                    self.advance();
                    if !self.lex_escape() {
                        self.report(esc_line, esc_column, "Invalid escape sequence in string literal.");
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Validate one escape after the backslash. Returns false if it is malformed.
    fn lex_escape(&mut self) -> bool {
        match self.peek_byte() {
            Some(b'a' | b'b' | b'f' | b'n' | b'r' | b't' | b'v' | b'\\' | b'?' | b'\'' | b'"') => {
                self.advance();
                true
            }
            Some(b'0'..=b'7') => {
                for _ in 0..3 {
                    if !matches!(self.peek_byte(), Some(b'0'..=b'7')) {
                        break;
                    }
                    self.advance();
                }
                true
            }
            Some(b'x' | b'X') => {
                self.advance();
                self.lex_hex_digits(1, 2)
            }
            Some(b'u') => {
                self.advance();
                self.lex_hex_digits(4, 4)
            }
            Some(b'U') => {
                self.advance();
                self.lex_hex_digits(8, 8)
            }
            // Leave newlines for the caller, which reports the unterminated string.
            None | Some(b'\n') => false,
            Some(_) => {
                self.advance();
                false
            }
        }
    }

    fn lex_hex_digits(&mut self, min: usize, max: usize) -> bool {
        let mut count = 0;
        while count < max && self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
            self.advance();
            count += 1;
        }
        count >= min
    }
}

/// Decode the raw text of a string token (quotes included) into bytes.
///
/// Decoding stops at the matching close quote or at the end of the text,
/// so recovery tokens from unterminated literals decode too. Malformed
/// escapes were already reported by the lexer and are kept literally.
pub fn unescape_string(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let Some(&quote) = bytes.first() else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == quote {
            break;
        }
        if b != b'\\' || i + 1 >= bytes.len() {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        let e = bytes[i];
        i += 1;
        match e {
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0B),
            b'\\' | b'?' | b'\'' | b'"' => out.push(e),
            b'0'..=b'7' => {
                let mut value = u32::from(e - b'0');
                let mut n = 1;
                while n < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + u32::from(bytes[i] - b'0');
                    i += 1;
                    n += 1;
                }
                out.push(value as u8);
            }
            b'x' | b'X' => {
                let (value, used) = read_hex(&bytes[i..], 2);
                i += used;
                out.push(value as u8);
            }
            b'u' | b'U' => {
                let width = if e == b'u' { 4 } else { 8 };
                let (value, used) = read_hex(&bytes[i..], width);
                i += used;
                let ch = char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER);
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    out
}

fn read_hex(bytes: &[u8], max: usize) -> (u32, usize) {
    let mut value = 0u32;
    let mut used = 0;
    while used < max && used < bytes.len() {
        let Some(d) = (bytes[used] as char).to_digit(16) else {
            break;
        };
        value = value * 16 + d;
        used += 1;
    }
    (value, used)
}
