use crate::ast::{AstFile, ModifierFlags, NodeData, NodeId, NodeKind, Range};
use crate::lexing::{Lexer, LexerCheckpoint};
use crate::parser_diagnostics::ParseError;
use crate::pos::{Position, SourceLocator};
use crate::symbols::{BuiltinTypes, SymbolTable};
use crate::token::{Token, TokenKind};

use bstr::{BStr, ByteSlice};
use once_cell::unsync::OnceCell;
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::{debug, trace};

mod declarations;
mod expressions;
mod qualifiers;
mod statements;

/// Deepest nesting of recursive grammar rules before the parser gives up
/// on the current construct.
pub const MAX_PARSE_DEPTH: usize = 50;

/// Parses a complete shader against the builtin types.
///
/// The returned file holds whatever declarations could be parsed, even
/// when errors were reported; check the error list to decide whether the
/// tree is usable.
pub fn parse(source: &[u8]) -> (AstFile, Vec<ParseError>) {
    parse_with_symbols(source, &BuiltinTypes)
}

pub fn parse_with_symbols(source: &[u8], symbols: &dyn SymbolTable) -> (AstFile, Vec<ParseError>) {
    let mut parser = Parser::new(source, symbols);
    let file = parser.compilation_unit();
    (file, parser.errors)
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    locator: OnceCell<SourceLocator>,
    /// At most one token that was read and then given back.
    pushback: Option<Token>,
    /// `{` minus `}` consumed so far; negative after a stray `}`.
    braces: isize,
    depth: Rc<Cell<usize>>,
    symbols: &'a dyn SymbolTable,
    /// Struct and enum names declared so far in this file.
    declared_types: HashSet<String>,
    errors: Vec<ParseError>,
    file: AstFile,
}

/// Saved parser state for speculative parsing. Rewinding discards every
/// node, diagnostic and token consumed since the checkpoint was taken.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Checkpoint {
    pushback: Option<Token>,
    braces: isize,
    lexer: LexerCheckpoint,
    nodes: usize,
    roots: usize,
    errors: usize,
}

/// Scoped share of the parser's recursion depth. Every successful
/// [`Parser::deepen`] adds one level, and all of them are given back when
/// the guard is dropped.
pub(crate) struct DepthGuard {
    depth: Rc<Cell<usize>>,
    taken: usize,
}

impl DepthGuard {
    fn increase(&mut self) -> bool {
        self.taken += 1;
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        depth <= MAX_PARSE_DEPTH
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - self.taken);
    }
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a [u8], symbols: &'a dyn SymbolTable) -> Self {
        Parser {
            lexer: Lexer::new(source),
            locator: OnceCell::new(),
            pushback: None,
            braces: 0,
            depth: Rc::new(Cell::new(0)),
            symbols,
            declared_types: HashSet::new(),
            errors: Vec::new(),
            file: AstFile::new(),
        }
    }

    /// file: (precision | directive | section | declaration)*
    pub fn compilation_unit(&mut self) -> AstFile {
        loop {
            let errors_before = self.error_count();
            let level = self.braces;
            let start = self.peek();
            let root = match start.kind {
                TokenKind::EndOfFile => break,
                TokenKind::Directive => {
                    if let Some(root) = self.directive() {
                        self.file.roots.push(root);
                    }
                    continue;
                }
                TokenKind::Section => {
                    if let Some(root) = self.section() {
                        self.file.roots.push(root);
                    }
                    continue;
                }
                TokenKind::Precision => {
                    self.precision();
                    None
                }
                _ => self.declaration(),
            };
            match root {
                Some(root) => self.file.roots.push(root),
                None if self.error_count() > errors_before => {
                    self.synchronize_declaration(level);
                    if self.peek() == start {
                        self.next_token();
                    }
                }
                None => {}
            }
        }
        std::mem::take(&mut self.file)
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Source text covered by `token`.
    pub fn text(&self, token: Token) -> &'a BStr {
        self.lexer.text(token)
    }

    pub fn position(&self, token: Token) -> Position {
        let source = self.lexer.source();
        self.locator
            .get_or_init(|| SourceLocator::new(source))
            .position(source, token.offset())
    }

    pub(crate) fn text_string(&self, token: Token) -> String {
        self.text(token).to_str_lossy().into_owned()
    }

    pub(crate) fn source_string(&self, range: Range) -> String {
        self.lexer.source()[range.0..range.1]
            .to_str_lossy()
            .into_owned()
    }

    fn next_raw_token(&mut self) -> Token {
        let token = match self.pushback.take() {
            Some(token) => token,
            None => self.lexer.next_raw(),
        };
        match token.kind {
            TokenKind::LBrace => self.braces += 1,
            TokenKind::RBrace => self.braces -= 1,
            _ => {}
        }
        token
    }

    fn next_token(&mut self) -> Token {
        loop {
            let token = self.next_raw_token();
            if !token.kind.is_trivia() {
                return token;
            }
        }
    }

    /// Gives `token` back to the stream. Only one token can be pending at a
    /// time.
    fn pushback(&mut self, token: Token) {
        debug_assert!(
            self.pushback.is_none(),
            "pushback called twice without an intervening read"
        );
        match token.kind {
            TokenKind::LBrace => self.braces -= 1,
            TokenKind::RBrace => self.braces += 1,
            _ => {}
        }
        self.pushback = Some(token);
    }

    fn peek(&mut self) -> Token {
        let token = self.next_token();
        self.pushback(token);
        token
    }

    /// Consumes the next token only if it is of the given kind.
    fn check_next(&mut self, kind: TokenKind) -> Option<Token> {
        let token = self.next_token();
        if token.kind == kind {
            Some(token)
        } else {
            self.pushback(token);
            None
        }
    }

    /// Consumes the next token, reporting an error if it is not of the given
    /// kind. The token is consumed either way.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> Option<Token> {
        let token = self.next_token();
        if token.kind == kind {
            Some(token)
        } else {
            self.unexpected(token, expected);
            None
        }
    }

    /// Like `expect(TokenKind::Identifier, ..)`, but a type name is an error.
    fn expect_identifier(&mut self) -> Option<Token> {
        let token = self.expect(TokenKind::Identifier, "an identifier")?;
        let name = self.text_string(token);
        if self.is_type(&name) {
            self.report(ParseError::ExpectedIdentifierFoundType {
                name,
                range: token.range,
            });
            return None;
        }
        Some(token)
    }

    fn unexpected(&mut self, token: Token, expected: &str) {
        let error = if token.kind == TokenKind::EndOfFile {
            ParseError::UnexpectedEof {
                expected: expected.to_owned(),
                range: token.range,
            }
        } else {
            ParseError::UnexpectedToken {
                expected: expected.to_owned(),
                found: self.text_string(token),
                range: token.range,
            }
        };
        self.report(error);
    }

    fn report(&mut self, error: ParseError) {
        debug!(%error, "parse error");
        self.errors.push(error);
    }

    fn is_type(&self, name: &str) -> bool {
        self.symbols.is_type(name) || self.declared_types.contains(name)
    }

    /// Whether the `Type` node `id` already carries array dimensions.
    fn is_array_type(&self, id: NodeId) -> bool {
        let node = &self.file[id];
        match node.type_data() {
            Some(data) => !data.is_struct_declaration && !node.children.is_empty(),
            None => false,
        }
    }

    fn create_node(&mut self, offset: usize, kind: NodeKind, data: impl Into<NodeData>) -> NodeId {
        self.file.push(crate::ast::Node {
            kind,
            offset,
            data: data.into(),
            children: Vec::new(),
        })
    }

    fn create_empty_node(&mut self, offset: usize, kind: NodeKind) -> NodeId {
        self.create_node(offset, kind, NodeData::None)
    }

    fn create_child(
        &mut self,
        parent: NodeId,
        offset: usize,
        kind: NodeKind,
        data: impl Into<NodeData>,
    ) -> NodeId {
        let child = self.create_node(offset, kind, data);
        self.add_child(parent, child);
        child
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.file.add_child(parent, child);
    }

    /// Adds an explicit "nothing here" child, e.g. the size slot of `x[]`.
    fn add_empty_child(&mut self, parent: NodeId) {
        self.file.add_child(parent, NodeId::INVALID);
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pushback: self.pushback,
            braces: self.braces,
            lexer: self.lexer.checkpoint(),
            nodes: self.file.len(),
            roots: self.file.roots.len(),
            errors: self.errors.len(),
        }
    }

    pub(crate) fn rewind(&mut self, checkpoint: Checkpoint) {
        trace!(
            discarded_nodes = self.file.len() - checkpoint.nodes.min(self.file.len()),
            discarded_errors = self.errors.len() - checkpoint.errors.min(self.errors.len()),
            "rewind"
        );
        self.pushback = checkpoint.pushback;
        self.braces = checkpoint.braces;
        self.lexer.rewind(checkpoint.lexer);
        self.file.truncate(checkpoint.nodes);
        self.file.roots.truncate(checkpoint.roots);
        self.errors.truncate(checkpoint.errors);
    }

    pub(crate) fn depth_guard(&self) -> DepthGuard {
        DepthGuard {
            depth: Rc::clone(&self.depth),
            taken: 0,
        }
    }

    /// Takes one more level of recursion, reporting an error at the next
    /// token when the limit is exceeded.
    pub(crate) fn deepen(&mut self, guard: &mut DepthGuard) -> bool {
        if guard.increase() {
            return true;
        }
        let next = self.peek();
        debug!(offset = next.offset(), "max parse depth exceeded");
        self.report(ParseError::TooDeep {
            limit: MAX_PARSE_DEPTH,
            range: next.range,
        });
        false
    }

    /// Brace nesting of the tokens consumed so far. Blocks record it right
    /// after their `{` so that recovery knows where they end.
    pub(crate) fn brace_level(&self) -> isize {
        self.braces
    }

    /// Skips the rest of a broken statement in a block whose contents sit at
    /// brace `level`: through the next `;` or nested `}` at that level, or up
    /// to (not including) the `}` that closes the block.
    fn synchronize_statement(&mut self, level: isize) {
        let mut skipped = 0usize;
        loop {
            let token = self.next_token();
            match token.kind {
                TokenKind::EndOfFile => {
                    self.pushback(token);
                    break;
                }
                TokenKind::RBrace if self.braces < level => {
                    self.pushback(token);
                    break;
                }
                TokenKind::RBrace | TokenKind::Semicolon if self.braces == level => break,
                _ => {}
            }
            skipped += 1;
        }
        trace!(skipped, "synchronized to statement boundary");
    }

    /// Skips the rest of a broken declaration that started at brace `level`:
    /// through the next `;` at that level, or through the `}` that returns to
    /// it along with a `;` or instance name right after it. Stops early in
    /// front of anything that clearly starts the next declaration.
    fn synchronize_declaration(&mut self, level: isize) {
        let mut skipped = 0usize;
        loop {
            let checkpoint = self.checkpoint();
            let token = self.next_token();
            match token.kind {
                TokenKind::EndOfFile => {
                    self.pushback(token);
                    break;
                }
                TokenKind::Semicolon if self.braces == level => break,
                TokenKind::RBrace if self.braces <= level => {
                    let next = self.peek();
                    match next.kind {
                        TokenKind::Semicolon => {
                            self.next_token();
                            break;
                        }
                        // `} instance;` of an interface block or struct variable
                        TokenKind::Identifier if !self.is_type(&self.text_string(next)) => {}
                        _ => break,
                    }
                }
                _ if self.braces == level && self.starts_declaration(token) => {
                    self.rewind(checkpoint);
                    break;
                }
                _ => {}
            }
            skipped += 1;
        }
        trace!(skipped, "synchronized to declaration boundary");
    }

    /// Whether `token` can only be the first token of a declaration: a
    /// modifier, a declaration keyword, or a type followed by a name.
    fn starts_declaration(&mut self, token: Token) -> bool {
        match token.kind {
            TokenKind::Layout
            | TokenKind::Struct
            | TokenKind::Enum
            | TokenKind::Precision
            | TokenKind::Directive
            | TokenKind::Section => true,
            TokenKind::Identifier if self.is_type(&self.text_string(token)) => {
                self.peek().kind == TokenKind::Identifier
            }
            kind => ModifierFlags::from_token_kind(kind).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(source: &str) -> Parser<'_> {
        Parser::new(source.as_bytes(), &BuiltinTypes)
    }

    #[test]
    fn test_check_next_does_not_consume_on_mismatch() {
        let mut parser = parser("a ;");
        assert_eq!(parser.check_next(TokenKind::Semicolon), None);
        assert_eq!(parser.error_count(), 0);
        let token = parser.check_next(TokenKind::Identifier).unwrap();
        assert_eq!(parser.text(token), "a");
    }

    #[test]
    fn test_expect_mismatch_consumes_one_token() {
        let mut parser = parser("a ; b");
        assert_eq!(parser.expect(TokenKind::Semicolon, "';'"), None);
        assert_eq!(parser.error_count(), 1);
        assert_eq!(
            parser.errors()[0].to_string(),
            "expected ';', but found 'a'"
        );
        assert_eq!(parser.next_token().kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_expect_at_end_of_input() {
        let mut parser = parser("  ");
        assert_eq!(parser.expect(TokenKind::RBrace, "'}'"), None);
        assert_eq!(
            parser.errors()[0],
            ParseError::UnexpectedEof {
                expected: "'}'".to_owned(),
                range: Range(2, 2),
            }
        );
    }

    #[test]
    fn test_expect_identifier_rejects_type_names() {
        let mut parser = parser("half4 color");
        assert_eq!(parser.expect_identifier(), None);
        let message = parser.errors()[0].to_string();
        assert!(message.contains("expected an identifier"), "{}", message);
        assert!(message.contains("type"), "{}", message);
        assert_eq!(message, "expected an identifier, but found type 'half4'");
        assert!(parser.expect_identifier().is_some());
    }

    #[test]
    fn test_peek_skips_trivia() {
        let mut parser = parser("/* c */ // d\n  x");
        let token = parser.peek();
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(parser.next_token(), token);
        assert_eq!(parser.position(token), Position { line: 1, column: 2 });
    }

    #[test]
    fn test_checkpoint_rewind_restores_state() {
        let mut parser = parser("x y z ; w");
        parser.peek();
        let nodes_before = parser.file.len();
        let checkpoint = parser.checkpoint();

        parser.create_empty_node(0, NodeKind::Block);
        parser.create_empty_node(0, NodeKind::Block);
        parser.next_token();
        parser.next_token();
        parser.expect(TokenKind::Semicolon, "';'");
        assert_eq!(parser.file.len(), nodes_before + 2);
        assert_eq!(parser.error_count(), 1);

        parser.rewind(checkpoint);
        assert_eq!(parser.file.len(), nodes_before);
        assert_eq!(parser.error_count(), 0);
        let token = parser.next_token();
        assert_eq!(parser.text(token), "x");

        // A second rewind to the same checkpoint lands in the same place.
        parser.rewind(checkpoint);
        assert_eq!(parser.file.len(), nodes_before);
        assert_eq!(parser.error_count(), 0);
        assert_eq!(parser.next_token(), token);
    }

    #[test]
    fn test_brace_level_follows_pushback_and_rewind() {
        let mut parser = parser("{ { } x");
        parser.next_token();
        assert_eq!(parser.brace_level(), 1);
        let checkpoint = parser.checkpoint();
        assert_eq!(parser.peek().kind, TokenKind::LBrace);
        assert_eq!(parser.brace_level(), 1);
        parser.next_token();
        parser.next_token();
        assert_eq!(parser.brace_level(), 1);
        parser.next_token();
        parser.rewind(checkpoint);
        assert_eq!(parser.brace_level(), 1);
        assert_eq!(parser.next_token().kind, TokenKind::LBrace);
        assert_eq!(parser.brace_level(), 2);
    }

    #[test]
    fn test_synchronize_declaration_stops_before_next_declaration() {
        let mut parser = parser("= 3 + float2 x; uniform half y;");
        parser.synchronize_declaration(0);
        let token = parser.next_token();
        assert_eq!(parser.text(token), "float2");
    }

    #[test]
    fn test_synchronize_declaration_skips_closed_body() {
        // as if the `{` of a struct body had been consumed
        let mut parser = parser("a; float b; } ; int c;");
        parser.braces = 1;
        parser.synchronize_declaration(0);
        let token = parser.next_token();
        assert_eq!(parser.text(token), "int");
        assert_eq!(parser.brace_level(), 0);
    }

    #[test]
    fn test_depth_guard_releases_on_drop() {
        let mut parser = parser("x");
        {
            let mut outer = parser.depth_guard();
            assert!(parser.deepen(&mut outer));
            assert!(parser.deepen(&mut outer));
            {
                let mut inner = parser.depth_guard();
                assert!(parser.deepen(&mut inner));
                assert_eq!(parser.depth.get(), 3);
            }
            assert_eq!(parser.depth.get(), 2);
        }
        assert_eq!(parser.depth.get(), 0);
    }

    #[test]
    fn test_depth_guard_limit() {
        let mut parser = parser("x");
        let mut guard = parser.depth_guard();
        for _ in 0..MAX_PARSE_DEPTH {
            assert!(parser.deepen(&mut guard));
        }
        assert_eq!(parser.error_count(), 0);
        assert!(!parser.deepen(&mut guard));
        assert!(matches!(parser.errors()[0], ParseError::TooDeep { .. }));
        drop(guard);
        assert_eq!(parser.depth.get(), 0);
    }

    #[test]
    fn test_is_array_type() {
        let mut parser = parser("float[4] float");
        let array = parser.type_reference().unwrap();
        let scalar = parser.type_reference().unwrap();
        assert!(parser.is_array_type(array));
        assert!(!parser.is_array_type(scalar));
    }
}
