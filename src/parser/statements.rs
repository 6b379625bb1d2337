use crate::ast::{NodeId, NodeKind};
use crate::parser::Parser;
use crate::token::TokenKind;

impl<'a> Parser<'a> {
    /// ifStatement | forStatement | doStatement | whileStatement | block | expression
    pub(crate) fn statement(&mut self) -> Option<NodeId> {
        let start = self.peek();
        let mut depth = self.depth_guard();
        if !self.deepen(&mut depth) {
            return None;
        }
        match start.kind {
            TokenKind::If | TokenKind::StaticIf => self.if_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Do => self.do_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Switch | TokenKind::StaticSwitch => self.switch_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Break => self.break_statement(),
            TokenKind::Continue => self.continue_statement(),
            TokenKind::Discard => self.discard_statement(),
            TokenKind::LBrace => self.block(),
            TokenKind::Semicolon => {
                self.next_token();
                Some(self.create_empty_node(start.offset(), NodeKind::Block))
            }
            TokenKind::Const => self.var_declarations(),
            TokenKind::Identifier => self.var_declarations_or_expression_statement(),
            _ => self.expression_statement(),
        }
    }

    /// LBRACE statement* RBRACE
    ///
    /// A statement that fails to parse is reported and skipped; the block
    /// itself only fails when its closing brace is missing.
    pub(crate) fn block(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::LBrace, "'{'")?;
        let mut depth = self.depth_guard();
        if !self.deepen(&mut depth) {
            return None;
        }
        let level = self.brace_level();
        let result = self.create_empty_node(start.offset(), NodeKind::Block);
        loop {
            let next = self.peek();
            match next.kind {
                TokenKind::RBrace => {
                    self.next_token();
                    return Some(result);
                }
                TokenKind::EndOfFile => {
                    self.next_token();
                    self.unexpected(next, "'}'");
                    return None;
                }
                _ => match self.statement() {
                    Some(statement) => self.add_child(result, statement),
                    // The broken statement may have eaten this block's `}`.
                    None if self.brace_level() < level => return Some(result),
                    None => self.synchronize_statement(level),
                },
            }
        }
    }

    /// (IF | STATIC_IF) LPAREN expression RPAREN statement (ELSE statement)?
    fn if_statement(&mut self) -> Option<NodeId> {
        let (start, is_static) = match self.check_next(TokenKind::StaticIf) {
            Some(start) => (start, true),
            None => (self.expect(TokenKind::If, "'if'")?, false),
        };
        self.expect(TokenKind::LParen, "'('")?;
        let test = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let if_true = self.statement()?;
        let if_false = match self.check_next(TokenKind::Else) {
            Some(_) => Some(self.statement()?),
            None => None,
        };
        let result = self.create_node(start.offset(), NodeKind::If, is_static);
        self.add_child(result, test);
        self.add_child(result, if_true);
        if let Some(if_false) = if_false {
            self.add_child(result, if_false);
        }
        Some(result)
    }

    /// DO statement WHILE LPAREN expression RPAREN SEMICOLON
    fn do_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Do, "'do'")?;
        let body = self.statement()?;
        self.expect(TokenKind::While, "'while'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let test = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let result = self.create_empty_node(start.offset(), NodeKind::Do);
        self.add_child(result, body);
        self.add_child(result, test);
        Some(result)
    }

    /// WHILE LPAREN expression RPAREN statement
    fn while_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::While, "'while'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let test = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.statement()?;
        let result = self.create_empty_node(start.offset(), NodeKind::While);
        self.add_child(result, test);
        self.add_child(result, body);
        Some(result)
    }

    /// CASE expression COLON statement* | DEFAULT COLON statement*
    ///
    /// The default case gets an empty value slot.
    fn switch_case(&mut self) -> Option<NodeId> {
        let start = self.next_token();
        let value = match start.kind {
            TokenKind::Case => self.expression()?,
            TokenKind::Default => NodeId::INVALID,
            _ => {
                self.unexpected(start, "'case' or 'default'");
                return None;
            }
        };
        self.expect(TokenKind::Colon, "':'")?;
        let result = self.create_empty_node(start.offset(), NodeKind::SwitchCase);
        if value.is_valid() {
            self.add_child(result, value);
        } else {
            self.add_empty_child(result);
        }
        loop {
            match self.peek().kind {
                TokenKind::RBrace | TokenKind::Case | TokenKind::Default => return Some(result),
                _ => {
                    let statement = self.statement()?;
                    self.add_child(result, statement);
                }
            }
        }
    }

    /// (SWITCH | STATIC_SWITCH) LPAREN expression RPAREN LBRACE switchCase*
    /// (DEFAULT COLON statement*)? RBRACE
    fn switch_statement(&mut self) -> Option<NodeId> {
        let (start, is_static) = match self.check_next(TokenKind::StaticSwitch) {
            Some(start) => (start, true),
            None => (self.expect(TokenKind::Switch, "'switch'")?, false),
        };
        self.expect(TokenKind::LParen, "'('")?;
        let value = self.expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let result = self.create_node(start.offset(), NodeKind::Switch, is_static);
        self.add_child(result, value);
        while self.peek().kind == TokenKind::Case {
            let case = self.switch_case()?;
            self.add_child(result, case);
        }
        // `default` must be the last case.
        if self.peek().kind == TokenKind::Default {
            let case = self.switch_case()?;
            self.add_child(result, case);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Some(result)
    }

    /// FOR LPAREN (declaration | expression)? SEMICOLON expression? SEMICOLON
    /// expression? RPAREN statement
    ///
    /// The node always has four children, with empty slots for omitted parts.
    fn for_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let result = self.create_empty_node(start.offset(), NodeKind::For);
        let next = self.peek();
        match next.kind {
            TokenKind::Semicolon => {
                self.next_token();
                self.add_empty_child(result);
            }
            TokenKind::Const => {
                let initializer = self.var_declarations()?;
                self.add_child(result, initializer);
            }
            TokenKind::Identifier if self.is_type(&self.text_string(next)) => {
                let initializer = self.var_declarations()?;
                self.add_child(result, initializer);
            }
            _ => {
                let initializer = self.expression_statement()?;
                self.add_child(result, initializer);
            }
        }
        if self.peek().kind != TokenKind::Semicolon {
            let test = self.expression()?;
            self.add_child(result, test);
        } else {
            self.add_empty_child(result);
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        if self.peek().kind != TokenKind::RParen {
            let next = self.expression()?;
            self.add_child(result, next);
        } else {
            self.add_empty_child(result);
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.statement()?;
        self.add_child(result, body);
        Some(result)
    }

    /// RETURN expression? SEMICOLON
    fn return_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Return, "'return'")?;
        let result = self.create_empty_node(start.offset(), NodeKind::Return);
        if self.peek().kind != TokenKind::Semicolon {
            let value = self.expression()?;
            self.add_child(result, value);
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(result)
    }

    /// BREAK SEMICOLON
    fn break_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Break, "'break'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(self.create_empty_node(start.offset(), NodeKind::Break))
    }

    /// CONTINUE SEMICOLON
    fn continue_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Continue, "'continue'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(self.create_empty_node(start.offset(), NodeKind::Continue))
    }

    /// DISCARD SEMICOLON
    fn discard_statement(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Discard, "'discard'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(self.create_empty_node(start.offset(), NodeKind::Discard))
    }

    /// expression SEMICOLON
    pub(crate) fn expression_statement(&mut self) -> Option<NodeId> {
        let expression = self.expression()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(expression)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstFile, NodeData, NodeId, NodeKind};
    use crate::parser::Parser;
    use crate::parser_diagnostics::ParseError;
    use crate::symbols::BuiltinTypes;

    fn parse_statement(source: &str) -> (AstFile, Option<NodeId>, Vec<ParseError>) {
        let mut parser = Parser::new(source.as_bytes(), &BuiltinTypes);
        let result = parser.statement();
        let file = std::mem::take(&mut parser.file);
        (file, result, parser.into_errors())
    }

    fn kinds(file: &AstFile, ids: &[NodeId]) -> Vec<Option<NodeKind>> {
        ids.iter()
            .map(|&id| file.get(id).map(|node| node.kind))
            .collect()
    }

    #[test]
    fn test_for_with_empty_slots() {
        let (file, result, errors) = parse_statement("for (;;) {}");
        assert!(errors.is_empty(), "{:?}", errors);
        let node = &file[result.unwrap()];
        assert_eq!(node.kind, NodeKind::For);
        assert_eq!(
            kinds(&file, &node.children),
            vec![None, None, None, Some(NodeKind::Block)]
        );
    }

    #[test]
    fn test_for_with_all_parts() {
        let (file, result, errors) = parse_statement("for (int i = 0; i < 3; i++) x += i;");
        assert!(errors.is_empty(), "{:?}", errors);
        let node = &file[result.unwrap()];
        assert_eq!(
            kinds(&file, &node.children),
            vec![
                Some(NodeKind::VarDeclarations),
                Some(NodeKind::Binary),
                Some(NodeKind::Postfix),
                Some(NodeKind::Binary),
            ]
        );
    }

    #[test]
    fn test_static_if_else() {
        let (file, result, errors) = parse_statement("@if (a) b(); else { c(); }");
        assert!(errors.is_empty(), "{:?}", errors);
        let node = &file[result.unwrap()];
        assert_eq!(node.kind, NodeKind::If);
        assert_eq!(node.data, NodeData::Bool { value: true });
        assert_eq!(
            kinds(&file, &node.children),
            vec![
                Some(NodeKind::Identifier),
                Some(NodeKind::Call),
                Some(NodeKind::Block)
            ]
        );
    }

    #[test]
    fn test_switch_default_last() {
        let (file, result, errors) =
            parse_statement("switch (x) { case 1: case 2: y = 1; break; default: discard; }");
        assert!(errors.is_empty(), "{:?}", errors);
        let node = &file[result.unwrap()];
        assert_eq!(node.kind, NodeKind::Switch);
        let cases = &node.children[1..];
        assert_eq!(cases.len(), 3);
        assert_eq!(file[cases[0]].children.len(), 1);
        assert_eq!(file[cases[1]].children.len(), 3);
        assert_eq!(file[cases[2]].children[0], NodeId::INVALID);

        let (_, result, errors) = parse_statement("switch (x) { default: case 1: }");
        assert_eq!(result, None);
        assert_eq!(errors[0].to_string(), "expected '}', but found 'case'");
    }

    #[test]
    fn test_do_while_and_return() {
        let (file, result, errors) = parse_statement("do { return; } while (i < 3);");
        assert!(errors.is_empty(), "{:?}", errors);
        let node = &file[result.unwrap()];
        assert_eq!(node.kind, NodeKind::Do);
        let body = &file[node.children[0]];
        assert_eq!(file[body.children[0]].kind, NodeKind::Return);
        assert!(file[body.children[0]].children.is_empty());
    }

    #[test]
    fn test_empty_statement() {
        let (file, result, errors) = parse_statement(";");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(file[result.unwrap()].kind, NodeKind::Block);
    }

    #[test]
    fn test_block_recovers_from_bad_statement() {
        let (file, result, errors) = parse_statement("{ a = ; b = 1; { c = ) ; } d(); }");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "expected expression, but found ';'");
        assert_eq!(errors[1].to_string(), "expected expression, but found ')'");
        let block = &file[result.unwrap()];
        assert_eq!(
            kinds(&file, &block.children),
            vec![
                Some(NodeKind::Binary),
                Some(NodeKind::Block),
                Some(NodeKind::Call)
            ]
        );
    }

    #[test]
    fn test_missing_semicolon_before_closing_brace() {
        let (file, result, errors) = parse_statement("{ a = 1; return b }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "expected ';', but found '}'");
        let block = &file[result.unwrap()];
        assert_eq!(kinds(&file, &block.children), vec![Some(NodeKind::Binary)]);
    }

    #[test]
    fn test_unterminated_block() {
        let (_, result, errors) = parse_statement("{ a = 1;");
        assert_eq!(result, None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "expected '}', but found end of input");
    }
}
