use crate::ast::{
    FunctionData, InterfaceBlockData, ModifierFlags, Modifiers, NodeData, NodeId, NodeKind,
    ParameterData, Range, SectionData, TypeData, VarData,
};
use crate::parser::Parser;
use crate::parser_diagnostics::ParseError;
use crate::token::{Token, TokenKind};

use bstr::ByteSlice;
use tracing::debug;

/// The part shared by every variable declaration: `modifiers type name`.
pub(crate) struct VarDeclarationsPrefix {
    pub(crate) modifiers: Modifiers,
    pub(crate) ty: NodeId,
    pub(crate) name: Token,
}

impl<'a> Parser<'a> {
    /// PRECISION (LOWP | MEDIUMP | HIGHP) type SEMICOLON
    ///
    /// Default precision statements are accepted and dropped.
    pub(crate) fn precision(&mut self) {
        if self.expect(TokenKind::Precision, "'precision'").is_none() {
            return;
        }
        let precision = self.next_token();
        if !matches!(
            precision.kind,
            TokenKind::Lowp | TokenKind::Mediump | TokenKind::Highp
        ) {
            self.unexpected(precision, "'lowp', 'mediump', or 'highp'");
            return;
        }
        let nodes_before = self.file.len();
        if self.type_reference().is_none() {
            return;
        }
        self.file.truncate(nodes_before);
        self.expect(TokenKind::Semicolon, "';'");
    }

    /// DIRECTIVE(#extension) IDENTIFIER COLON IDENTIFIER
    pub(crate) fn directive(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Directive, "a directive")?;
        let text = self.text_string(start);
        if text != "#extension" {
            self.report(ParseError::UnsupportedDirective {
                name: text,
                range: start.range,
            });
            self.skip_line();
            return None;
        }
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon, "':'")?;
        self.expect(TokenKind::Identifier, "an identifier")?;
        let name = self.text_string(name);
        debug!(%name, "extension");
        Some(self.create_node(start.offset(), NodeKind::Extension, name))
    }

    /// Skips raw tokens through the end of the current line.
    fn skip_line(&mut self) {
        // Braces on a skipped line do not nest anything.
        let braces = self.braces;
        loop {
            let token = self.next_raw_token();
            match token.kind {
                TokenKind::EndOfFile => {
                    self.pushback(token);
                    break;
                }
                TokenKind::Whitespace if self.text(token).contains_str("\n") => break,
                TokenKind::LineComment => break,
                _ => {}
            }
        }
        self.braces = braces;
    }

    /// SECTION (LPAREN IDENTIFIER RPAREN)? LBRACE <any tokens> RBRACE
    pub(crate) fn section(&mut self) -> Option<NodeId> {
        let start = self.expect(TokenKind::Section, "a section token")?;
        let mut argument = None;
        if self.check_next(TokenKind::LParen).is_some() {
            let token = self.expect_identifier()?;
            argument = Some(self.text_string(token));
            self.expect(TokenKind::RParen, "')'")?;
        }
        self.expect(TokenKind::LBrace, "'{'")?;
        let code_start = self.next_raw_token();
        self.pushback(code_start);
        let mut level = 1usize;
        loop {
            let next = self.next_raw_token();
            match next.kind {
                TokenKind::LBrace => level += 1,
                TokenKind::RBrace => level -= 1,
                TokenKind::EndOfFile => {
                    self.report(ParseError::UnterminatedSection { range: start.range });
                    return None;
                }
                _ => {}
            }
            if level == 0 {
                let data = SectionData {
                    name: self.source_string(Range(start.offset() + 1, start.range.1)),
                    argument,
                    text: self.source_string(Range(code_start.offset(), next.offset())),
                };
                return Some(self.create_node(start.offset(), NodeKind::Section, data));
            }
        }
    }

    /// ENUM CLASS IDENTIFIER LBRACE (IDENTIFIER (EQ expression)?
    /// (COMMA IDENTIFIER (EQ expression)?)*)? RBRACE SEMICOLON
    pub(crate) fn enum_declaration(&mut self) -> Option<NodeId> {
        self.expect(TokenKind::Enum, "'enum'")?;
        self.expect(TokenKind::Class, "'class'")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let name_text = self.text_string(name);
        self.declared_types.insert(name_text.clone());
        let result = self.create_node(name.offset(), NodeKind::Enum, name_text);
        if self.check_next(TokenKind::RBrace).is_none() {
            self.enum_case(result)?;
            while self.check_next(TokenKind::RBrace).is_none() {
                self.expect(TokenKind::Comma, "','")?;
                self.enum_case(result)?;
            }
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(result)
    }

    fn enum_case(&mut self, parent: NodeId) -> Option<()> {
        let name = self.expect_identifier()?;
        let value = match self.check_next(TokenKind::Eq) {
            Some(_) => Some(self.assignment_expression()?),
            None => None,
        };
        let name_text = self.text_string(name);
        let case = self.create_child(parent, name.offset(), NodeKind::EnumCase, name_text);
        if let Some(value) = value {
            self.add_child(case, value);
        }
        Some(())
    }

    /// enumDeclaration | modifiers (structVarDeclaration | type IDENTIFIER
    /// ((LPAREN parameter (COMMA parameter)* RPAREN (block | SEMICOLON)) |
    /// SEMICOLON) | interfaceBlock)
    pub(crate) fn declaration(&mut self) -> Option<NodeId> {
        let lookahead = self.peek();
        match lookahead.kind {
            TokenKind::Enum => return self.enum_declaration(),
            TokenKind::Semicolon => {
                self.unexpected(lookahead, "a declaration");
                return None;
            }
            _ => {}
        }
        let modifiers = self.modifiers();
        let lookahead = self.peek();
        match lookahead.kind {
            TokenKind::Identifier if !self.is_type(&self.text_string(lookahead)) => {
                return self.interface_block(modifiers)
            }
            TokenKind::Struct => return self.struct_var_declaration(modifiers),
            TokenKind::Semicolon => {
                self.next_token();
                return Some(self.create_node(lookahead.offset(), NodeKind::Modifiers, modifiers));
            }
            _ => {}
        }
        let prefix = self.typed_name(modifiers)?;
        if self.check_next(TokenKind::LParen).is_some() {
            self.function_declaration(prefix)
        } else {
            self.var_declaration_end(prefix)
        }
    }

    /// The rest of a function after its opening parenthesis.
    fn function_declaration(&mut self, prefix: VarDeclarationsPrefix) -> Option<NodeId> {
        let VarDeclarationsPrefix {
            modifiers,
            ty,
            name,
        } = prefix;
        let result = self.create_empty_node(name.offset(), NodeKind::Function);
        self.add_child(result, ty);
        let mut parameter_count = 0;
        if self.peek().kind != TokenKind::RParen {
            loop {
                let parameter = self.parameter()?;
                self.add_child(result, parameter);
                parameter_count += 1;
                if self.check_next(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let name = self.text_string(name);
        debug!(%name, parameter_count, "function");
        self.file[result].data = NodeData::from(FunctionData {
            modifiers,
            name,
            parameter_count,
        });
        if self.check_next(TokenKind::Semicolon).is_none() {
            let body = self.block()?;
            self.add_child(result, body);
        }
        Some(result)
    }

    /// modifiers type IDENTIFIER
    pub(crate) fn var_declarations_prefix(&mut self) -> Option<VarDeclarationsPrefix> {
        let modifiers = self.modifiers();
        self.typed_name(modifiers)
    }

    fn typed_name(&mut self, modifiers: Modifiers) -> Option<VarDeclarationsPrefix> {
        let ty = self.type_reference()?;
        let name = self.expect_identifier()?;
        Some(VarDeclarationsPrefix {
            modifiers,
            ty,
            name,
        })
    }

    /// varDeclarationsPrefix varDeclarationEnd
    pub(crate) fn var_declarations(&mut self) -> Option<NodeId> {
        let prefix = self.var_declarations_prefix()?;
        self.var_declaration_end(prefix)
    }

    /// A statement starting with a type name is usually a declaration, but
    /// may also be an expression such as `float2(x).y;`. Tries the
    /// declaration first and falls back to an expression statement.
    pub(crate) fn var_declarations_or_expression_statement(&mut self) -> Option<NodeId> {
        let next = self.peek();
        if next.kind == TokenKind::Const {
            return self.var_declarations();
        }
        if self.is_type(&self.text_string(next)) {
            let checkpoint = self.checkpoint();
            if let Some(prefix) = self.var_declarations_prefix() {
                return self.var_declaration_end(prefix);
            }
            self.rewind(checkpoint);
        }
        self.expression_statement()
    }

    /// (LBRACKET expression? RBRACKET)? (EQ assignmentExpression)?
    /// (COMMA IDENTIFER (LBRACKET expression? RBRACKET)? (EQ assignmentExpression)?)*
    /// SEMICOLON
    ///
    /// The resulting node's children are the modifiers, the type and one
    /// `VarDeclaration` per declared name.
    pub(crate) fn var_declaration_end(&mut self, prefix: VarDeclarationsPrefix) -> Option<NodeId> {
        let VarDeclarationsPrefix {
            modifiers,
            ty,
            name,
        } = prefix;
        let offset = self.file[ty].offset;
        let result = self.create_empty_node(offset, NodeKind::VarDeclarations);
        self.create_child(result, offset, NodeKind::Modifiers, modifiers);
        self.add_child(result, ty);
        let mut name = name;
        loop {
            let var = self.var_declaration(ty, name)?;
            self.add_child(result, var);
            if self.check_next(TokenKind::Comma).is_none() {
                break;
            }
            name = self.expect_identifier()?;
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(result)
    }

    fn var_declaration(&mut self, ty: NodeId, name: Token) -> Option<NodeId> {
        let result = self.create_empty_node(name.offset(), NodeKind::VarDeclaration);
        let mut is_array = false;
        while let Some(bracket) = self.check_next(TokenKind::LBracket) {
            if is_array || self.is_array_type(ty) {
                self.report(ParseError::MultiDimensionalArray {
                    range: bracket.range,
                });
                return None;
            }
            is_array = true;
            if self.check_next(TokenKind::RBracket).is_some() {
                self.add_empty_child(result);
            } else {
                let size = self.expression()?;
                self.add_child(result, size);
                self.expect(TokenKind::RBracket, "']'")?;
            }
        }
        if self.check_next(TokenKind::Eq).is_some() {
            let value = self.assignment_expression()?;
            self.add_child(result, value);
        }
        self.file[result].data = NodeData::from(VarData {
            name: self.text_string(name),
            is_array,
        });
        Some(result)
    }

    /// STRUCT IDENTIFIER LBRACE varDeclaration* RBRACE
    fn struct_declaration(&mut self) -> Option<NodeId> {
        self.expect(TokenKind::Struct, "'struct'")?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let name_text = self.text_string(name);
        let result = self.create_node(
            name.offset(),
            NodeKind::Type,
            TypeData {
                name: name_text.clone(),
                is_struct_declaration: true,
                is_nullable: false,
            },
        );
        while self.peek().kind != TokenKind::RBrace {
            let field = self.var_declarations()?;
            self.check_struct_field(field);
            self.add_child(result, field);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        debug!(name = %name_text, "struct");
        self.declared_types.insert(name_text);
        Some(result)
    }

    /// Fields take no modifiers and no initializers, and array fields need a
    /// literal size.
    fn check_struct_field(&mut self, field: NodeId) {
        let mut errors = Vec::new();
        let children = &self.file[field].children;
        let flags = self.file[children[0]]
            .modifiers()
            .map(|modifiers| modifiers.flags)
            .unwrap_or_default();
        if !flags.is_empty() {
            let offset = self.file[field].offset;
            errors.push(ParseError::StructFieldModifier {
                modifiers: flags.to_string(),
                range: Range(offset, offset),
            });
        }
        for &var in &children[2..] {
            let node = &self.file[var];
            let range = Range(node.offset, node.offset);
            let mut rest = &node.children[..];
            if node.var_data().map_or(false, |data| data.is_array) {
                let size = rest[0];
                rest = &rest[1..];
                if !size.is_valid() || self.file[size].kind != NodeKind::Int {
                    errors.push(ParseError::StructFieldArraySize { range });
                }
            }
            if !rest.is_empty() {
                errors.push(ParseError::StructFieldInitializer { range });
            }
        }
        for error in errors {
            self.report(error);
        }
    }

    /// structDeclaration ((IDENTIFIER varDeclarationEnd) | SEMICOLON)
    fn struct_var_declaration(&mut self, modifiers: Modifiers) -> Option<NodeId> {
        let ty = self.struct_declaration()?;
        if let Some(name) = self.check_next(TokenKind::Identifier) {
            return self.var_declaration_end(VarDeclarationsPrefix {
                modifiers,
                ty,
                name,
            });
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Some(ty)
    }

    /// modifiers type IDENTIFIER (LBRACKET INT_LITERAL RBRACKET)?
    fn parameter(&mut self) -> Option<NodeId> {
        let modifiers = self.modifiers_with_defaults(ModifierFlags::empty());
        let ty = self.type_reference()?;
        let name = self.expect_identifier()?;
        let result = self.create_empty_node(name.offset(), NodeKind::Parameter);
        self.add_child(result, ty);
        let mut is_array = false;
        while let Some(bracket) = self.check_next(TokenKind::LBracket) {
            if is_array || self.is_array_type(ty) {
                self.report(ParseError::MultiDimensionalArray {
                    range: bracket.range,
                });
                return None;
            }
            is_array = true;
            let size = self.expect(TokenKind::IntLiteral, "a positive integer")?;
            let value = self.int_value(size)?;
            self.create_child(result, size.offset(), NodeKind::Int, value);
            self.expect(TokenKind::RBracket, "']'")?;
        }
        self.file[result].data = NodeData::from(ParameterData {
            modifiers,
            name: self.text_string(name),
            is_array,
        });
        Some(result)
    }

    /// IDENTIFIER(type) (LBRACKET intLiteral? RBRACKET)* QUESTION?
    pub(crate) fn type_reference(&mut self) -> Option<NodeId> {
        let token = self.expect(TokenKind::Identifier, "a type")?;
        let name = self.text_string(token);
        if !self.is_type(&name) {
            self.report(ParseError::UnknownType {
                name,
                range: token.range,
            });
            return None;
        }
        let result = self.create_empty_node(token.offset(), NodeKind::Type);
        while self.check_next(TokenKind::LBracket).is_some() {
            let next = self.peek();
            if next.kind != TokenKind::RBracket {
                let size = self.int_literal()?;
                self.create_child(result, next.offset(), NodeKind::Int, size);
            } else {
                self.add_empty_child(result);
            }
            self.expect(TokenKind::RBracket, "']'")?;
        }
        let is_nullable = self.check_next(TokenKind::Question).is_some();
        self.file[result].data = NodeData::from(TypeData {
            name,
            is_struct_declaration: false,
            is_nullable,
        });
        Some(result)
    }

    /// IDENTIFIER LBRACE varDeclaration* RBRACE (IDENTIFIER (LBRACKET
    /// expression? RBRACKET)?)? SEMICOLON
    fn interface_block(&mut self, modifiers: Modifiers) -> Option<NodeId> {
        let name = self.expect(TokenKind::Identifier, "an identifier")?;
        let type_name = self.text_string(name);
        if self.peek().kind != TokenKind::LBrace {
            // `Foo x;` with an undeclared `Foo` ends up here.
            self.report(ParseError::UnknownType {
                name: type_name,
                range: name.range,
            });
            return None;
        }
        self.next_token();
        let result = self.create_empty_node(name.offset(), NodeKind::InterfaceBlock);
        let mut declaration_count = 0;
        while self.peek().kind != TokenKind::RBrace {
            let declaration = self.var_declarations()?;
            self.add_child(result, declaration);
            declaration_count += 1;
        }
        self.next_token();
        let mut instance_name = None;
        let mut is_array = false;
        if let Some(instance) = self.check_next(TokenKind::Identifier) {
            instance_name = Some(self.text_string(instance));
            while let Some(bracket) = self.check_next(TokenKind::LBracket) {
                if is_array {
                    self.report(ParseError::MultiDimensionalArray {
                        range: bracket.range,
                    });
                    return None;
                }
                is_array = true;
                if self.peek().kind != TokenKind::RBracket {
                    let size = self.expression()?;
                    self.add_child(result, size);
                } else {
                    self.add_empty_child(result);
                }
                self.expect(TokenKind::RBracket, "']'")?;
            }
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        debug!(%type_name, declaration_count, "interface block");
        self.file[result].data = NodeData::from(InterfaceBlockData {
            modifiers,
            type_name,
            declaration_count,
            instance_name,
            is_array,
        });
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstFile, ModifierFlags, NodeId, NodeKind};
    use crate::parser::{parse, Parser};
    use crate::parser_diagnostics::ParseError;
    use crate::symbols::BuiltinTypes;

    fn root(file: &AstFile, index: usize) -> &crate::ast::Node {
        &file[file.roots[index]]
    }

    #[test]
    fn test_function_prototype_and_definition() {
        let (file, errors) = parse(b"half4 blend(half4 src, inout half4 dst[2]);\nvoid main() {}");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(file.roots.len(), 2);
        let prototype = root(&file, 0);
        assert_eq!(prototype.kind, NodeKind::Function);
        // return type and two parameters, no body
        assert_eq!(prototype.children.len(), 3);
        let dst = &file[prototype.children[2]];
        assert_eq!(
            dst.modifiers().unwrap().flags,
            ModifierFlags::IN | ModifierFlags::OUT
        );
        assert_eq!(dst.children.len(), 2);

        let main = root(&file, 1);
        assert_eq!(file[*main.children.last().unwrap()].kind, NodeKind::Block);
    }

    #[test]
    fn test_multiple_declarators() {
        let (file, errors) = parse(b"const float a = 1, b[3], c[] = d;");
        assert!(errors.is_empty(), "{:?}", errors);
        let decls = root(&file, 0);
        assert_eq!(decls.kind, NodeKind::VarDeclarations);
        assert_eq!(decls.children.len(), 5);
        assert_eq!(
            file[decls.children[0]].modifiers().unwrap().flags,
            ModifierFlags::CONST
        );
        let c = &file[decls.children[4]];
        assert!(c.var_data().unwrap().is_array);
        assert_eq!(c.children[0], NodeId::INVALID);
        assert_eq!(file[c.children[1]].kind, NodeKind::Identifier);
    }

    #[test]
    fn test_multi_dimensional_arrays() {
        let (_, errors) = parse(b"float x[2][3];");
        assert_eq!(errors[0], ParseError::MultiDimensionalArray { range: crate::ast::Range(10, 11) });
        let (_, errors) = parse(b"float[2] x[3];");
        assert!(matches!(errors[0], ParseError::MultiDimensionalArray { .. }));
    }

    #[test]
    fn test_struct_registers_type() {
        let (file, errors) = parse(b"struct S { float x; int y[2]; }; S s;");
        assert!(errors.is_empty(), "{:?}", errors);
        let st = root(&file, 0);
        assert_eq!(st.kind, NodeKind::Type);
        assert!(st.type_data().unwrap().is_struct_declaration);
        assert_eq!(st.children.len(), 2);
        assert_eq!(root(&file, 1).kind, NodeKind::VarDeclarations);
    }

    #[test]
    fn test_struct_field_checks() {
        let (_, errors) = parse(b"struct S { const float x; float y = 1; float z[n]; };");
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors[0].to_string(),
            "modifier 'const' is not permitted on a struct field"
        );
        assert!(matches!(errors[1], ParseError::StructFieldInitializer { .. }));
        assert!(matches!(errors[2], ParseError::StructFieldArraySize { .. }));
    }

    #[test]
    fn test_struct_with_variable() {
        let (file, errors) = parse(b"struct P { float2 p; } points[4];");
        assert!(errors.is_empty(), "{:?}", errors);
        let decls = root(&file, 0);
        assert_eq!(decls.kind, NodeKind::VarDeclarations);
        assert!(file[decls.children[1]].type_data().unwrap().is_struct_declaration);
    }

    #[test]
    fn test_interface_block() {
        let (file, errors) = parse(b"uniform Globals { float4 color; half scale; } globals[2];");
        assert!(errors.is_empty(), "{:?}", errors);
        let block = root(&file, 0);
        assert_eq!(block.kind, NodeKind::InterfaceBlock);
        match &block.data {
            crate::ast::NodeData::InterfaceBlock(data) => {
                assert_eq!(data.type_name, "Globals");
                assert_eq!(data.declaration_count, 2);
                assert_eq!(data.instance_name.as_deref(), Some("globals"));
                assert!(data.is_array);
                assert_eq!(data.modifiers.flags, ModifierFlags::UNIFORM);
            }
            data => panic!("unexpected data {:?}", data),
        }
        assert_eq!(block.children.len(), 3);
    }

    #[test]
    fn test_unknown_type() {
        let (file, errors) = parse(b"Foo x;\nint y;");
        assert_eq!(errors[0].to_string(), "no type named 'Foo'");
        assert_eq!(file.roots.len(), 1);
    }

    #[test]
    fn test_enum_class() {
        let (file, errors) = parse(b"enum class Mode { kA, kB = 2 };\nMode m;");
        assert!(errors.is_empty(), "{:?}", errors);
        let decl = root(&file, 0);
        assert_eq!(decl.kind, NodeKind::Enum);
        assert_eq!(decl.text(), Some("Mode"));
        assert_eq!(decl.children.len(), 2);
        assert_eq!(file[decl.children[1]].children.len(), 1);
        assert_eq!(root(&file, 1).kind, NodeKind::VarDeclarations);
    }

    #[test]
    fn test_modifiers_only_declaration() {
        let (file, errors) = parse(b"layout(blend_support_all_equations) out;");
        assert!(errors.is_empty(), "{:?}", errors);
        let node = root(&file, 0);
        assert_eq!(node.kind, NodeKind::Modifiers);
        assert_eq!(node.modifiers().unwrap().flags, ModifierFlags::OUT);
    }

    #[test]
    fn test_precision_extension_and_section() {
        let source = b"precision mediump float;\n#extension GL_EXT_blend : require\n@header (cpp) { #include <a> { } }\n";
        let (file, errors) = parse(source);
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(file.roots.len(), 2);
        assert_eq!(root(&file, 0).text(), Some("GL_EXT_blend"));
        match &root(&file, 1).data {
            crate::ast::NodeData::Section(section) => {
                assert_eq!(section.name, "header");
                assert_eq!(section.argument.as_deref(), Some("cpp"));
                assert_eq!(section.text, " #include <a> { } ");
            }
            data => panic!("unexpected data {:?}", data),
        }
    }

    #[test]
    fn test_unsupported_directive_skips_line() {
        let (file, errors) = parse(b"#version 300 es\nint x;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "unsupported directive '#version'");
        assert_eq!(file.roots.len(), 1);
    }

    #[test]
    fn test_declaration_or_expression() {
        let source = "{ float2(1, 2).x; float y = 2; half3 z; }";
        let mut parser = Parser::new(source.as_bytes(), &BuiltinTypes);
        let block = parser.block().unwrap();
        assert!(parser.errors().is_empty(), "{:?}", parser.errors());
        let kinds = parser.file[block]
            .children
            .iter()
            .map(|&id| parser.file[id].kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Field,
                NodeKind::VarDeclarations,
                NodeKind::VarDeclarations
            ]
        );
    }

    #[test]
    fn test_nullable_type() {
        let (file, errors) = parse(b"shader? s;");
        assert!(errors.is_empty(), "{:?}", errors);
        let decls = root(&file, 0);
        assert!(file[decls.children[1]].type_data().unwrap().is_nullable);
    }
}
