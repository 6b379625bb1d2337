use crate::ast::{NodeData, NodeId, NodeKind, Operator};
use crate::parser::Parser;
use crate::parser_diagnostics::ParseError;
use crate::token::{Token, TokenKind};

use std::num::IntErrorKind;

type Rule<'a> = fn(&mut Parser<'a>) -> Option<NodeId>;

impl<'a> Parser<'a> {
    /// assignmentExpression (COMMA assignmentExpression)*
    pub(crate) fn expression(&mut self) -> Option<NodeId> {
        let mut result = self.assignment_expression()?;
        let mut depth = self.depth_guard();
        while let Some(comma) = self.check_next(TokenKind::Comma) {
            if !self.deepen(&mut depth) {
                return None;
            }
            let right = self.assignment_expression()?;
            result = self.binary_node(comma.offset(), Operator::Comma, result, right);
        }
        Some(result)
    }

    /// ternaryExpression ((EQ | STAREQ | ...) assignmentExpression)?
    ///
    /// Right-associative: `a = b = c` is `a = (b = c)`.
    pub(crate) fn assignment_expression(&mut self) -> Option<NodeId> {
        let mut depth = self.depth_guard();
        let result = self.ternary_expression()?;
        let next = self.next_token();
        match next.to_operator(Operator::is_assignment) {
            Some(op) => {
                if !self.deepen(&mut depth) {
                    return None;
                }
                let right = self.assignment_expression()?;
                let offset = self.file[result].offset;
                Some(self.binary_node(offset, op, result, right))
            }
            None => {
                self.pushback(next);
                Some(result)
            }
        }
    }

    /// logicalOrExpression ('?' expression ':' assignmentExpression)?
    fn ternary_expression(&mut self) -> Option<NodeId> {
        let mut depth = self.depth_guard();
        let base = self.logical_or_expression()?;
        if self.check_next(TokenKind::Question).is_none() {
            return Some(base);
        }
        if !self.deepen(&mut depth) {
            return None;
        }
        let if_true = self.expression()?;
        self.expect(TokenKind::Colon, "':'")?;
        let if_false = self.assignment_expression()?;
        let offset = self.file[base].offset;
        let result = self.create_empty_node(offset, NodeKind::Ternary);
        self.add_child(result, base);
        self.add_child(result, if_true);
        self.add_child(result, if_false);
        Some(result)
    }

    fn logical_or_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::logical_xor_expression, |op| {
            op == Operator::LogicalOr
        })
    }

    fn logical_xor_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::logical_and_expression, |op| {
            op == Operator::LogicalXor
        })
    }

    fn logical_and_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::bitwise_or_expression, |op| {
            op == Operator::LogicalAnd
        })
    }

    fn bitwise_or_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::bitwise_xor_expression, |op| {
            op == Operator::BitwiseOr
        })
    }

    fn bitwise_xor_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::bitwise_and_expression, |op| {
            op == Operator::BitwiseXor
        })
    }

    fn bitwise_and_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::equality_expression, |op| {
            op == Operator::BitwiseAnd
        })
    }

    fn equality_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::relational_expression, |op| {
            matches!(op, Operator::Eq | Operator::NEq)
        })
    }

    fn relational_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::shift_expression, |op| {
            matches!(
                op,
                Operator::Lt | Operator::Gt | Operator::LtEq | Operator::GtEq
            )
        })
    }

    fn shift_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::additive_expression, |op| {
            matches!(op, Operator::Shl | Operator::Shr)
        })
    }

    fn additive_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::multiplicative_expression, |op| {
            matches!(op, Operator::Plus | Operator::Minus)
        })
    }

    fn multiplicative_expression(&mut self) -> Option<NodeId> {
        self.left_associative(Self::unary_expression, |op| {
            matches!(op, Operator::Mul | Operator::Div | Operator::Mod)
        })
    }

    /// operand (OP operand)*, where OP is any operator accepted by `accepts`.
    fn left_associative(&mut self, operand: Rule<'a>, accepts: fn(Operator) -> bool) -> Option<NodeId> {
        let mut depth = self.depth_guard();
        let mut result = operand(self)?;
        loop {
            let next = self.next_token();
            let op = match next.to_operator(accepts) {
                Some(op) => op,
                None => {
                    self.pushback(next);
                    return Some(result);
                }
            };
            if !self.deepen(&mut depth) {
                return None;
            }
            let right = operand(self)?;
            let offset = self.file[result].offset;
            result = self.binary_node(offset, op, result, right);
        }
    }

    /// (PLUS | MINUS | NOT | BITWISENOT | PLUSPLUS | MINUSMINUS) unaryExpression
    /// | postfixExpression
    fn unary_expression(&mut self) -> Option<NodeId> {
        let mut depth = self.depth_guard();
        let next = self.peek();
        let op = match next.to_operator(Operator::is_prefix) {
            Some(op) => op,
            None => return self.postfix_expression(),
        };
        if !self.deepen(&mut depth) {
            return None;
        }
        self.next_token();
        let operand = self.unary_expression()?;
        let result = self.create_node(next.offset(), NodeKind::Prefix, op);
        self.add_child(result, operand);
        Some(result)
    }

    /// term suffix*
    fn postfix_expression(&mut self) -> Option<NodeId> {
        let mut depth = self.depth_guard();
        let mut result = self.term()?;
        loop {
            let next = self.peek();
            match next.kind {
                // `.01` after an operand is a swizzle, but a float literal
                // with leading digits, as in `v 5.0`, is not a suffix.
                TokenKind::FloatLiteral if !self.text(next).starts_with(b".") => {
                    return Some(result)
                }
                TokenKind::FloatLiteral
                | TokenKind::LBracket
                | TokenKind::Dot
                | TokenKind::LParen
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
                | TokenKind::ColonColon => {
                    if !self.deepen(&mut depth) {
                        return None;
                    }
                    result = self.suffix(result)?;
                }
                _ => return Some(result),
            }
        }
    }

    /// LBRACKET expression? RBRACKET | DOT IDENTIFIER | LPAREN arguments RPAREN
    /// | PLUSPLUS | MINUSMINUS | COLONCOLON IDENTIFIER | FLOAT_LITERAL [IDENTIFIER]
    fn suffix(&mut self, base: NodeId) -> Option<NodeId> {
        let next = self.next_token();
        let mut depth = self.depth_guard();
        if !self.deepen(&mut depth) {
            return None;
        }
        match next.kind {
            TokenKind::LBracket => {
                if self.check_next(TokenKind::RBracket).is_some() {
                    let result = self.create_empty_node(next.offset(), NodeKind::Index);
                    self.add_child(result, base);
                    return Some(result);
                }
                let index = self.expression()?;
                self.expect(TokenKind::RBracket, "']' to complete array access expression")?;
                let result = self.create_empty_node(next.offset(), NodeKind::Index);
                self.add_child(result, base);
                self.add_child(result, index);
                Some(result)
            }
            TokenKind::Dot | TokenKind::ColonColon => {
                let offset = self.peek().offset();
                let name = self.identifier()?;
                let result = self.create_node(offset, NodeKind::Field, name);
                self.add_child(result, base);
                Some(result)
            }
            TokenKind::FloatLiteral => self.swizzle_suffix(base, next),
            TokenKind::LParen => {
                let result = self.create_empty_node(next.offset(), NodeKind::Call);
                self.add_child(result, base);
                if self.peek().kind != TokenKind::RParen {
                    loop {
                        let argument = self.assignment_expression()?;
                        self.add_child(result, argument);
                        if self.check_next(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')' to complete function arguments")?;
                Some(result)
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = next.to_operator(|_| true)?;
                let result = self.create_node(next.offset(), NodeKind::Postfix, op);
                self.add_child(result, base);
                Some(result)
            }
            _ => {
                self.unexpected(next, "expression suffix");
                None
            }
        }
    }

    /// Swizzles made of `0` and `1` components, like `v.01` or `v.0x`, reach
    /// the parser as a float literal, possibly glued to an identifier.
    fn swizzle_suffix(&mut self, base: NodeId, literal: Token) -> Option<NodeId> {
        let digits = &self.text(literal)[1..];
        if digits.iter().any(|&ch| ch != b'0' && ch != b'1') {
            self.report(ParseError::InvalidSwizzle {
                range: literal.range,
            });
            return None;
        }
        let mut range = literal.range;
        let rest = self.next_raw_token();
        if rest.kind == TokenKind::Identifier {
            range = range | rest.range;
        } else {
            self.pushback(rest);
        }
        let field = self.source_string(crate::ast::Range(range.0 + 1, range.1));
        let result = self.create_node(literal.offset(), NodeKind::Field, field);
        self.add_child(result, base);
        Some(result)
    }

    /// IDENTIFIER | intLiteral | floatLiteral | boolLiteral | NULL_LITERAL
    /// | '(' expression ')'
    fn term(&mut self) -> Option<NodeId> {
        let next = self.peek();
        match next.kind {
            TokenKind::Identifier => {
                let name = self.identifier()?;
                Some(self.create_node(next.offset(), NodeKind::Identifier, name))
            }
            TokenKind::IntLiteral => {
                let value = self.int_literal()?;
                Some(self.create_node(next.offset(), NodeKind::Int, value))
            }
            TokenKind::FloatLiteral => {
                let value = self.float_literal()?;
                Some(self.create_node(next.offset(), NodeKind::Float, value))
            }
            TokenKind::TrueLiteral | TokenKind::FalseLiteral => {
                let value = self.bool_literal()?;
                Some(self.create_node(next.offset(), NodeKind::Bool, value))
            }
            TokenKind::NullLiteral => {
                self.next_token();
                Some(self.create_empty_node(next.offset(), NodeKind::Null))
            }
            TokenKind::LParen => {
                self.next_token();
                let mut depth = self.depth_guard();
                if !self.deepen(&mut depth) {
                    return None;
                }
                let result = self.expression()?;
                self.expect(TokenKind::RParen, "')' to complete expression");
                Some(result)
            }
            _ => {
                // Statement and block terminators stay in the stream so that
                // error recovery can resume right after them.
                if !matches!(
                    next.kind,
                    TokenKind::Semicolon | TokenKind::RBrace | TokenKind::EndOfFile
                ) {
                    self.next_token();
                }
                self.unexpected(next, "expression");
                None
            }
        }
    }

    pub(crate) fn identifier(&mut self) -> Option<String> {
        let token = self.expect(TokenKind::Identifier, "identifier")?;
        Some(self.text_string(token))
    }

    pub(crate) fn int_literal(&mut self) -> Option<i64> {
        let token = self.expect(TokenKind::IntLiteral, "integer literal")?;
        self.int_value(token)
    }

    /// Value of an integer literal token: decimal, `0x` hex or leading-zero
    /// octal, with an optional `u` suffix.
    pub(crate) fn int_value(&mut self, token: Token) -> Option<i64> {
        let text = self.text_string(token);
        let digits = text.trim_end_matches(|ch| ch == 'u' || ch == 'U');
        let (digits, radix) = if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            (hex, 16)
        } else if digits.len() > 1 && digits.starts_with('0') {
            (&digits[1..], 8)
        } else {
            (digits, 10)
        };
        match i64::from_str_radix(digits, radix) {
            Ok(value) => Some(value),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
                self.report(ParseError::IntegerTooLarge {
                    text,
                    range: token.range,
                });
                None
            }
            Err(_) => {
                self.report(ParseError::InvalidLiteral {
                    text,
                    range: token.range,
                });
                None
            }
        }
    }

    fn float_literal(&mut self) -> Option<f64> {
        let token = self.expect(TokenKind::FloatLiteral, "float literal")?;
        let text = self.text_string(token);
        match text.parse::<f64>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.report(ParseError::InvalidLiteral {
                    text,
                    range: token.range,
                });
                None
            }
        }
    }

    fn bool_literal(&mut self) -> Option<bool> {
        let token = self.next_token();
        match token.kind {
            TokenKind::TrueLiteral => Some(true),
            TokenKind::FalseLiteral => Some(false),
            _ => {
                self.unexpected(token, "'true' or 'false'");
                None
            }
        }
    }

    fn binary_node(&mut self, offset: usize, op: Operator, left: NodeId, right: NodeId) -> NodeId {
        let result = self.create_node(offset, NodeKind::Binary, NodeData::from(op));
        self.add_child(result, left);
        self.add_child(result, right);
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstFile, NodeData, NodeId, NodeKind, Operator};
    use crate::parser::Parser;
    use crate::parser_diagnostics::ParseError;
    use crate::symbols::BuiltinTypes;

    fn parse_expression(source: &str) -> (AstFile, Option<NodeId>, Vec<ParseError>) {
        let mut parser = Parser::new(source.as_bytes(), &BuiltinTypes);
        let result = parser.expression();
        let file = std::mem::take(&mut parser.file);
        (file, result, parser.into_errors())
    }

    /// Fully parenthesized rendering of an expression tree.
    fn render(file: &AstFile, id: NodeId) -> String {
        let node = &file[id];
        let children = &node.children;
        match node.kind {
            NodeKind::Identifier | NodeKind::Int | NodeKind::Float | NodeKind::Bool => match &node.data {
                NodeData::Text { text } => text.clone(),
                NodeData::Int { value } => value.to_string(),
                NodeData::Float { value } => value.to_string(),
                NodeData::Bool { value } => value.to_string(),
                _ => unreachable!(),
            },
            NodeKind::Null => "null".to_owned(),
            NodeKind::Binary => format!(
                "({} {} {})",
                render(file, children[0]),
                node.operator().unwrap(),
                render(file, children[1])
            ),
            NodeKind::Prefix => format!("({}{})", node.operator().unwrap(), render(file, children[0])),
            NodeKind::Postfix => format!("({}{})", render(file, children[0]), node.operator().unwrap()),
            NodeKind::Ternary => format!(
                "({} ? {} : {})",
                render(file, children[0]),
                render(file, children[1]),
                render(file, children[2])
            ),
            NodeKind::Field => format!("{}.{}", render(file, children[0]), node.text().unwrap()),
            NodeKind::Index if children.len() == 1 => format!("{}[]", render(file, children[0])),
            NodeKind::Index => format!("{}[{}]", render(file, children[0]), render(file, children[1])),
            NodeKind::Call => format!(
                "{}({})",
                render(file, children[0]),
                children[1..]
                    .iter()
                    .map(|&arg| render(file, arg))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            kind => panic!("unexpected node kind {:?}", kind),
        }
    }

    fn assert_renders(source: &str, expected: &str) {
        let (file, result, errors) = parse_expression(source);
        assert!(errors.is_empty(), "errors in {:?}: {:?}", source, errors);
        assert_eq!(render(&file, result.unwrap()), expected, "source: {:?}", source);
    }

    #[test]
    fn test_precedence() {
        assert_renders("a = b ? c || d : e & f", "(a = (b ? (c || d) : (e & f)))");
        assert_renders("a, b = c", "(a , (b = c))");
        assert_renders("a || b ^^ c", "(a || (b ^^ c))");
        assert_renders("a ^^ b && c", "(a ^^ (b && c))");
        assert_renders("a && b | c", "(a && (b | c))");
        assert_renders("a | b ^ c", "(a | (b ^ c))");
        assert_renders("a ^ b & c", "(a ^ (b & c))");
        assert_renders("a & b == c", "(a & (b == c))");
        assert_renders("a != b < c", "(a != (b < c))");
        assert_renders("a >= b << c", "(a >= (b << c))");
        assert_renders("a >> b + c", "(a >> (b + c))");
        assert_renders("a - b * c", "(a - (b * c))");
        assert_renders("a % -b", "(a % (-b))");
        assert_renders("-a++", "(-(a++))");
    }

    #[test]
    fn test_associativity() {
        assert_renders("a - b - c", "((a - b) - c)");
        assert_renders("a / b * c", "((a / b) * c)");
        assert_renders("a = b += c", "(a = (b += c))");
        assert_renders("a ? b : c ? d : e", "(a ? b : (c ? d : e))");
        assert_renders("!~x", "(!(~x))");
    }

    #[test]
    fn test_postfix_suffixes() {
        assert_renders("a[1].b(c, 2)[]", "a[1].b(c, 2)[]");
        assert_renders("f()", "f()");
        assert_renders("x::y", "x.y");
        assert_renders("(a + b) * c", "((a + b) * c)");
        assert_renders("float3(1, 2.5, true)", "float3(1, 2.5, true)");
    }

    #[test]
    fn test_float_swizzle() {
        assert_renders("v.01", "v.01");
        assert_renders("v.0x + 1", "(v.0x + 1)");
        let (_, result, errors) = parse_expression("v.02");
        assert_eq!(result, None);
        assert!(matches!(errors[..], [ParseError::InvalidSwizzle { .. }]));
    }

    #[test]
    fn test_swizzle_after_whitespace() {
        assert_renders("v .01", "v.01");
        let (_, result, errors) = parse_expression("b .5");
        assert_eq!(result, None);
        assert!(matches!(errors[..], [ParseError::InvalidSwizzle { .. }]));
        let (file, result, errors) = parse_expression("v 5.0");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(file[result.unwrap()].kind, NodeKind::Identifier);
    }

    #[test]
    fn test_integer_literals() {
        assert_renders("0x1F + 010 + 7u", "((31 + 8) + 7)");
        let (_, result, errors) = parse_expression("99999999999999999999");
        assert_eq!(result, None);
        assert_eq!(errors[0].to_string(), "integer is too large: 99999999999999999999");
    }

    #[test]
    fn test_missing_operand() {
        let (_, result, errors) = parse_expression("a + ;");
        assert_eq!(result, None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "expected expression, but found ';'");
    }

    #[test]
    fn test_node_offsets() {
        let (file, result, _) = parse_expression("ab + -c");
        let sum = &file[result.unwrap()];
        assert_eq!(sum.offset, 0);
        assert_eq!(file[sum.children[1]].offset, 5);
        assert_eq!(file[sum.children[1]].operator(), Some(Operator::Minus));
    }
}
