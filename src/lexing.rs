use crate::ast::Range;
use crate::token::{Token, TokenKind};
use bstr::{BStr, ByteSlice};
use once_cell::sync::Lazy;
use std::collections::HashMap;

static KEYWORDS: Lazy<HashMap<&BStr, TokenKind>> = Lazy::new(|| {
    vec![
        ("true", TokenKind::TrueLiteral),
        ("false", TokenKind::FalseLiteral),
        ("null", TokenKind::NullLiteral),
        ("if", TokenKind::If),
        ("else", TokenKind::Else),
        ("for", TokenKind::For),
        ("while", TokenKind::While),
        ("do", TokenKind::Do),
        ("switch", TokenKind::Switch),
        ("case", TokenKind::Case),
        ("default", TokenKind::Default),
        ("break", TokenKind::Break),
        ("continue", TokenKind::Continue),
        ("discard", TokenKind::Discard),
        ("return", TokenKind::Return),
        ("in", TokenKind::In),
        ("out", TokenKind::Out),
        ("inout", TokenKind::InOut),
        ("uniform", TokenKind::Uniform),
        ("const", TokenKind::Const),
        ("flat", TokenKind::Flat),
        ("noperspective", TokenKind::NoPerspective),
        ("readonly", TokenKind::ReadOnly),
        ("writeonly", TokenKind::WriteOnly),
        ("coherent", TokenKind::Coherent),
        ("volatile", TokenKind::Volatile),
        ("restrict", TokenKind::Restrict),
        ("buffer", TokenKind::Buffer),
        ("sk_has_side_effects", TokenKind::HasSideEffects),
        ("__pixel_localEXT", TokenKind::Pls),
        ("__pixel_local_inEXT", TokenKind::PlsIn),
        ("__pixel_local_outEXT", TokenKind::PlsOut),
        ("varying", TokenKind::Varying),
        ("inline", TokenKind::Inline),
        ("lowp", TokenKind::Lowp),
        ("mediump", TokenKind::Mediump),
        ("highp", TokenKind::Highp),
        ("struct", TokenKind::Struct),
        ("layout", TokenKind::Layout),
        ("precision", TokenKind::Precision),
        ("enum", TokenKind::Enum),
        ("class", TokenKind::Class),
    ]
    .into_iter()
    .map(|(k, v)| (k.as_bytes().as_bstr(), v))
    .collect::<HashMap<_, _>>()
});

/// Opaque lexer position, see [`Lexer::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerCheckpoint(usize);

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    source: &'a BStr,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Lexer {
            source: source.as_bstr(),
            pos: 0,
        }
    }

    pub fn source(&self) -> &'a BStr {
        self.source
    }

    pub fn text(&self, token: Token) -> &'a BStr {
        self.source[token.range.0..token.range.1].as_bstr()
    }

    pub fn checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint(self.pos)
    }

    pub fn rewind(&mut self, checkpoint: LexerCheckpoint) {
        self.pos = checkpoint.0;
    }

    /// Returns the next token, including whitespace and comments. Once the
    /// input is exhausted every call returns an empty `EndOfFile` token.
    pub fn next_raw(&mut self) -> Token {
        let start = self.pos;
        let first = if let Some(first) = self.next() {
            first
        } else {
            return Token {
                kind: TokenKind::EndOfFile,
                range: Range(start, start),
            };
        };
        let kind = match first {
            _ if first.is_ascii_whitespace() => {
                while matches!(self.next(), Some(ch) if ch.is_ascii_whitespace()) {
                    self.pos += 1;
                }
                TokenKind::Whitespace
            }
            _ if first.is_ascii_digit() => self.lex_number(),
            b'.' => {
                if matches!(self.next_n(1), Some(ch) if ch.is_ascii_digit()) {
                    self.lex_number()
                } else {
                    self.pos += 1;
                    TokenKind::Dot
                }
            }
            _ if first.is_ascii_alphabetic() || first == b'_' => {
                self.eat_word();
                let word = self.source[start..self.pos].as_bstr();
                KEYWORDS
                    .get(word)
                    .copied()
                    .unwrap_or(TokenKind::Identifier)
            }
            b'#' => {
                self.pos += 1;
                if self.eat_word() {
                    TokenKind::Directive
                } else {
                    TokenKind::Invalid
                }
            }
            b'@' => {
                self.pos += 1;
                if self.eat_word() {
                    match self.source[start..self.pos].as_bytes() {
                        b"@if" => TokenKind::StaticIf,
                        b"@switch" => TokenKind::StaticSwitch,
                        _ => TokenKind::Section,
                    }
                } else {
                    TokenKind::Invalid
                }
            }
            b'/' => {
                self.pos += 1;
                match self.next() {
                    Some(b'/') => {
                        while matches!(self.next(), Some(ch) if ch != b'\n') {
                            self.pos += 1;
                        }
                        TokenKind::LineComment
                    }
                    Some(b'*') => {
                        self.pos += 1;
                        loop {
                            match self.next() {
                                None => break,
                                Some(b'*') if self.next_n(1) == Some(b'/') => {
                                    self.pos += 2;
                                    break;
                                }
                                Some(_) => self.pos += 1,
                            }
                        }
                        TokenKind::BlockComment
                    }
                    Some(b'=') => {
                        self.pos += 1;
                        TokenKind::SlashEq
                    }
                    _ => TokenKind::Slash,
                }
            }
            b'+' => {
                self.pos += 1;
                if self.eat(b'+') {
                    TokenKind::PlusPlus
                } else if self.eat(b'=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                self.pos += 1;
                if self.eat(b'-') {
                    TokenKind::MinusMinus
                } else if self.eat(b'=') {
                    TokenKind::MinusEq
                } else if self.eat(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                self.pos += 1;
                if self.eat(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'%' => {
                self.pos += 1;
                if self.eat(b'=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            b'<' => {
                self.pos += 1;
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        TokenKind::ShlEq
                    } else {
                        TokenKind::Shl
                    }
                } else if self.eat(b'=') {
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                self.pos += 1;
                if self.eat(b'>') {
                    if self.eat(b'=') {
                        TokenKind::ShrEq
                    } else {
                        TokenKind::Shr
                    }
                } else if self.eat(b'=') {
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            b'=' => {
                self.pos += 1;
                if self.eat(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                self.pos += 1;
                if self.eat(b'=') {
                    TokenKind::Neq
                } else {
                    TokenKind::LogicalNot
                }
            }
            b'&' => {
                self.pos += 1;
                if self.eat(b'&') {
                    if self.eat(b'=') {
                        TokenKind::LogicalAndEq
                    } else {
                        TokenKind::LogicalAnd
                    }
                } else if self.eat(b'=') {
                    TokenKind::BitwiseAndEq
                } else {
                    TokenKind::BitwiseAnd
                }
            }
            b'|' => {
                self.pos += 1;
                if self.eat(b'|') {
                    if self.eat(b'=') {
                        TokenKind::LogicalOrEq
                    } else {
                        TokenKind::LogicalOr
                    }
                } else if self.eat(b'=') {
                    TokenKind::BitwiseOrEq
                } else {
                    TokenKind::BitwiseOr
                }
            }
            b'^' => {
                self.pos += 1;
                if self.eat(b'^') {
                    if self.eat(b'=') {
                        TokenKind::LogicalXorEq
                    } else {
                        TokenKind::LogicalXor
                    }
                } else if self.eat(b'=') {
                    TokenKind::BitwiseXorEq
                } else {
                    TokenKind::BitwiseXor
                }
            }
            b':' => {
                self.pos += 1;
                if self.eat(b':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            b'~' => self.single(TokenKind::BitwiseNot),
            b'?' => self.single(TokenKind::Question),
            b';' => self.single(TokenKind::Semicolon),
            b',' => self.single(TokenKind::Comma),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            _ => {
                // Swallow the whole UTF-8 sequence so the diagnostic shows a full character.
                let (_, size) = bstr::decode_utf8(&self.source[self.pos..]);
                self.pos += size.max(1);
                TokenKind::Invalid
            }
        };
        Token {
            kind,
            range: Range(start, self.pos),
        }
    }

    fn lex_number(&mut self) -> TokenKind {
        if self.next() == Some(b'0')
            && matches!(self.next_n(1), Some(b'x' | b'X'))
            && matches!(self.next_n(2), Some(ch) if ch.is_ascii_hexdigit())
        {
            self.pos += 2;
            while matches!(self.next(), Some(ch) if ch.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            self.eat_unsigned_suffix();
            return TokenKind::IntLiteral;
        }
        let mut is_float = false;
        self.eat_digits();
        if self.eat(b'.') {
            is_float = true;
            self.eat_digits();
        }
        if matches!(self.next(), Some(b'e' | b'E')) {
            let exponent_digits = match self.next_n(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if matches!(self.next_n(exponent_digits), Some(ch) if ch.is_ascii_digit()) {
                is_float = true;
                self.pos += exponent_digits;
                self.eat_digits();
            }
        }
        if is_float {
            TokenKind::FloatLiteral
        } else {
            self.eat_unsigned_suffix();
            TokenKind::IntLiteral
        }
    }

    fn eat_digits(&mut self) {
        while matches!(self.next(), Some(ch) if ch.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn eat_unsigned_suffix(&mut self) {
        if matches!(self.next(), Some(b'u' | b'U')) {
            self.pos += 1;
        }
    }

    /// Consumes `[A-Za-z0-9_]*`, returning whether anything was consumed.
    fn eat_word(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.next(), Some(ch) if ch.is_ascii_alphanumeric() || ch == b'_') {
            self.pos += 1;
        }
        start < self.pos
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.next() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn next_n(&self, off: usize) -> Option<u8> {
        self.source.get(self.pos + off).copied()
    }

    fn next(&self) -> Option<u8> {
        self.next_n(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source.as_bytes());
        let mut kinds = Vec::new();
        loop {
            let token = lexer.next_raw();
            if token.kind == TokenKind::EndOfFile {
                break;
            }
            if !token.kind.is_trivia() {
                kinds.push(token.kind);
            }
        }
        kinds
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("uniform float4 color; @if @switch @header #extension"),
            vec![
                TokenKind::Uniform,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::StaticIf,
                TokenKind::StaticSwitch,
                TokenKind::Section,
                TokenKind::Directive,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 0x1F 017 3u 1.5 .5 2. 1e10 1.5e-3"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("<<= >> ^^ ^^= && &= || |= :: -> ++ --"),
            vec![
                TokenKind::ShlEq,
                TokenKind::Shr,
                TokenKind::LogicalXor,
                TokenKind::LogicalXorEq,
                TokenKind::LogicalAnd,
                TokenKind::BitwiseAndEq,
                TokenKind::LogicalOr,
                TokenKind::BitwiseOrEq,
                TokenKind::ColonColon,
                TokenKind::Arrow,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
            ]
        );
    }

    #[test]
    fn test_comments_are_raw_tokens() {
        let mut lexer = Lexer::new(b"a // line\n/* block */b");
        let raw = std::iter::from_fn(|| {
            let token = lexer.next_raw();
            (token.kind != TokenKind::EndOfFile).then(|| token.kind)
        })
        .collect::<Vec<_>>();
        assert_eq!(
            raw,
            vec![
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::LineComment,
                TokenKind::Whitespace,
                TokenKind::BlockComment,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut lexer = Lexer::new(b"/* never closed");
        let token = lexer.next_raw();
        assert_eq!(token.kind, TokenKind::BlockComment);
        assert_eq!(token.range, Range(0, 15));
        assert_eq!(lexer.next_raw().kind, TokenKind::EndOfFile);
    }

    #[test]
    fn test_invalid_character() {
        let mut lexer = Lexer::new("$é".as_bytes());
        let token = lexer.next_raw();
        assert_eq!(token.kind, TokenKind::Invalid);
        assert_eq!(token.range, Range(0, 1));
        let token = lexer.next_raw();
        assert_eq!(token.kind, TokenKind::Invalid);
        assert_eq!(token.range, Range(1, 3));
    }

    #[test]
    fn test_checkpoint_rewind() {
        let mut lexer = Lexer::new(b"a b c");
        lexer.next_raw();
        let checkpoint = lexer.checkpoint();
        let first = lexer.next_raw();
        lexer.next_raw();
        lexer.rewind(checkpoint);
        assert_eq!(lexer.next_raw(), first);
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new(b"x");
        lexer.next_raw();
        let eof = lexer.next_raw();
        assert_eq!(eof.kind, TokenKind::EndOfFile);
        assert_eq!(eof.range, Range(1, 1));
        assert_eq!(lexer.next_raw(), eof);
    }
}
