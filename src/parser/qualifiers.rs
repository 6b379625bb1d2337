use crate::ast::{ModifierFlags, Modifiers};
use crate::layout::{CType, Key, Layout, LayoutToken};
use crate::parser::Parser;
use crate::parser_diagnostics::ParseError;
use crate::token::{Token, TokenKind};

use crate::ast::Range;
use tracing::trace;

impl<'a> Parser<'a> {
    /// layout? (UNIFORM | CONST | IN | OUT | ...)*
    pub(crate) fn modifiers(&mut self) -> Modifiers {
        let layout = self.layout();
        let mut flags = ModifierFlags::empty();
        loop {
            let next = self.next_token();
            match ModifierFlags::from_token_kind(next.kind) {
                Some(flag) => flags |= flag,
                None => {
                    self.pushback(next);
                    return Modifiers { layout, flags };
                }
            }
        }
    }

    /// Like [`Parser::modifiers`], using `defaults` when no storage
    /// qualifier is given.
    pub(crate) fn modifiers_with_defaults(&mut self, defaults: ModifierFlags) -> Modifiers {
        let mut modifiers = self.modifiers();
        if modifiers.flags.is_empty() {
            modifiers.flags = defaults;
        }
        modifiers
    }

    /// LAYOUT LPAREN IDENTIFIER (EQ value)? (COMMA IDENTIFIER (EQ value)?)* RPAREN
    ///
    /// Returns an empty layout when there is no `layout` keyword. Problems
    /// inside the list are reported but never fail the enclosing declaration.
    pub(crate) fn layout(&mut self) -> Layout {
        let mut layout = Layout::default();
        if self.check_next(TokenKind::Layout).is_none() {
            return layout;
        }
        if self.expect(TokenKind::LParen, "'('").is_none() {
            return layout;
        }
        loop {
            let qualifier = self.next_token();
            if qualifier.kind == TokenKind::EndOfFile {
                self.unexpected(qualifier, "a layout qualifier");
                break;
            }
            let name = self.text_string(qualifier);
            match LayoutToken::lookup(&name) {
                Some(token) => self.layout_qualifier(&mut layout, token, qualifier),
                None => self.report(ParseError::InvalidLayoutQualifier {
                    name,
                    range: qualifier.range,
                }),
            }
            if self.check_next(TokenKind::RParen).is_some() {
                break;
            }
            if self.expect(TokenKind::Comma, "','").is_none() {
                break;
            }
        }
        trace!(%layout, "layout");
        layout
    }

    fn layout_qualifier(&mut self, layout: &mut Layout, token: LayoutToken, qualifier: Token) {
        if let Some(flag) = token.to_flag() {
            layout.flags |= flag;
            return;
        }
        if let Some(primitive) = token.to_primitive() {
            layout.primitive = Some(primitive);
            return;
        }
        match token {
            LayoutToken::Location => layout.location = self.layout_int(),
            LayoutToken::Offset => layout.offset = self.layout_int(),
            LayoutToken::Binding => layout.binding = self.layout_int(),
            LayoutToken::Index => layout.index = self.layout_int(),
            LayoutToken::Set => layout.set = self.layout_int(),
            LayoutToken::Builtin => layout.builtin = self.layout_int(),
            LayoutToken::InputAttachmentIndex => layout.input_attachment_index = self.layout_int(),
            LayoutToken::MaxVertices => layout.max_vertices = self.layout_int(),
            LayoutToken::Invocations => layout.invocations = self.layout_int(),
            LayoutToken::Marker => layout.marker = self.layout_code(),
            LayoutToken::When => layout.when = self.layout_code(),
            LayoutToken::Key => layout.key = Some(self.layout_key()),
            LayoutToken::CType => layout.ctype = self.layout_ctype(),
            // ctype values are only meaningful after `ctype=`.
            _ => self.report(ParseError::InvalidLayoutQualifier {
                name: self.text_string(qualifier),
                range: qualifier.range,
            }),
        }
    }

    /// EQ INT_LITERAL
    fn layout_int(&mut self) -> Option<u32> {
        self.expect(TokenKind::Eq, "'='")?;
        let token = self.expect(TokenKind::IntLiteral, "a non-negative integer")?;
        let value = self.int_value(token)?;
        match u32::try_from(value) {
            Ok(value) => Some(value),
            Err(_) => {
                self.report(ParseError::IntegerTooLarge {
                    text: self.text_string(token),
                    range: token.range,
                });
                None
            }
        }
    }

    /// EQ IDENTIFIER
    fn layout_identifier(&mut self) -> Option<Token> {
        self.expect(TokenKind::Eq, "'='")?;
        self.expect_identifier()
    }

    /// EQ <any tokens up to a top-level COMMA or the closing RPAREN>
    ///
    /// The terminating `,` or `)` is left in the stream.
    fn layout_code(&mut self) -> Option<String> {
        self.expect(TokenKind::Eq, "'='")?;
        let start = self.next_raw_token();
        self.pushback(start);
        let mut level = 1usize;
        loop {
            let next = self.next_raw_token();
            match next.kind {
                TokenKind::LParen => level += 1,
                TokenKind::RParen => level -= 1,
                TokenKind::EndOfFile => {
                    self.report(ParseError::UnterminatedLayout { range: start.range });
                    return None;
                }
                _ => {}
            }
            if level == 0 || (level == 1 && next.kind == TokenKind::Comma) {
                self.pushback(next);
                let code = self.source_string(Range(start.offset(), next.offset()));
                return Some(code.trim().to_owned());
            }
        }
    }

    /// (EQ IDENTIFIER)?
    fn layout_key(&mut self) -> Key {
        if self.peek().kind != TokenKind::Eq {
            return Key::Key;
        }
        match self.layout_identifier() {
            Some(token) if self.text(token) == "identity" => Key::Identity,
            Some(token) => {
                self.report(ParseError::UnsupportedLayoutKey { range: token.range });
                Key::Key
            }
            None => Key::Key,
        }
    }

    /// EQ (IDENTIFIER | BOOL | INT | FLOAT)
    fn layout_ctype(&mut self) -> Option<CType> {
        self.expect(TokenKind::Eq, "'='")?;
        let token = self.next_token();
        let ctype = LayoutToken::lookup(&self.text_string(token)).and_then(LayoutToken::to_ctype);
        if ctype.is_none() {
            self.report(ParseError::UnsupportedCType { range: token.range });
        }
        ctype
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ModifierFlags, Modifiers};
    use crate::layout::{CType, Key, Layout, LayoutFlags, Primitive};
    use crate::parser::Parser;
    use crate::parser_diagnostics::ParseError;
    use crate::symbols::BuiltinTypes;
    use crate::token::TokenKind;

    fn parse_modifiers(source: &str) -> (Modifiers, Vec<ParseError>, TokenKind) {
        let mut parser = Parser::new(source.as_bytes(), &BuiltinTypes);
        let modifiers = parser.modifiers();
        let next = parser.next_token().kind;
        (modifiers, parser.into_errors(), next)
    }

    #[test]
    fn test_storage_flags() {
        let (modifiers, errors, next) = parse_modifiers("uniform highp inout float");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            modifiers.flags,
            ModifierFlags::UNIFORM | ModifierFlags::HIGHP | ModifierFlags::IN | ModifierFlags::OUT
        );
        assert!(modifiers.layout.is_empty());
        assert_eq!(next, TokenKind::Identifier);
    }

    #[test]
    fn test_layout_integers() {
        let (modifiers, errors, _) = parse_modifiers("layout(location=2, binding=1) uniform");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            modifiers.layout,
            Layout {
                location: Some(2),
                binding: Some(1),
                ..Layout::default()
            }
        );
        assert_eq!(modifiers.flags, ModifierFlags::UNIFORM);
    }

    #[test]
    fn test_layout_words() {
        let (modifiers, errors, _) = parse_modifiers(
            "layout(origin_upper_left, triangles, max_vertices=3, key=identity, ctype=SkPMColor4f, tracked)",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let layout = modifiers.layout;
        assert_eq!(
            layout.flags,
            LayoutFlags::ORIGIN_UPPER_LEFT | LayoutFlags::TRACKED
        );
        assert_eq!(layout.primitive, Some(Primitive::Triangles));
        assert_eq!(layout.max_vertices, Some(3));
        assert_eq!(layout.key, Some(Key::Identity));
        assert_eq!(layout.ctype, Some(CType::SkPMColor4f));
    }

    #[test]
    fn test_layout_code() {
        let (modifiers, errors, next) =
            parse_modifiers("layout(when=f(a, b) && c, marker=m) in float");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(modifiers.layout.when.as_deref(), Some("f(a, b) && c"));
        assert_eq!(modifiers.layout.marker.as_deref(), Some("m"));
        assert_eq!(modifiers.flags, ModifierFlags::IN);
        assert_eq!(next, TokenKind::Identifier);
    }

    #[test]
    fn test_layout_errors() {
        let (modifiers, errors, next) = parse_modifiers("layout(foo, location=1, ctype=SkBogus) out");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "'foo' is not a valid layout qualifier");
        assert!(matches!(errors[1], ParseError::UnsupportedCType { .. }));
        assert_eq!(modifiers.layout.location, Some(1));
        assert_eq!(modifiers.flags, ModifierFlags::OUT);
        assert_eq!(next, TokenKind::EndOfFile);
    }

    #[test]
    fn test_unterminated_layout_code() {
        let (_, errors, _) = parse_modifiers("layout(when=(a");
        assert!(matches!(errors[0], ParseError::UnterminatedLayout { .. }));
    }
}
