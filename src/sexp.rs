use std::fmt::Display;

use crate::ast::{AstFile, Modifiers, Node, NodeData, NodeId, NodeKind};

/// Printable tree form of a parsed file, used by the `--dump` output and
/// the snapshot tests.
#[derive(Debug, Clone)]
pub enum SExp {
    Tagged { tag: String, args: Vec<SExp> },
    Nil,
    Symbol { name: String },
    Number { value: i64 },
    Float { value: f64 },
    Str { value: String },
    Invalid,
}

impl Display for SExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            SExpIndent {
                sexp: self,
                nest: 0,
            }
        )
    }
}

#[derive(Debug)]
pub struct SExpIndent<'a> {
    sexp: &'a SExp,
    nest: u32,
}

impl<'a> Display for SExpIndent<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.sexp {
            SExp::Tagged { tag, args } => {
                write!(f, "s(:{}", tag)?;
                for arg in args {
                    if matches!(arg, SExp::Tagged { .. }) {
                        write!(f, ",\n{}", Indent(self.nest + 1))?;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(
                        f,
                        "{}",
                        SExpIndent {
                            sexp: arg,
                            nest: self.nest + 1,
                        }
                    )?;
                }
                write!(f, ")")?;
            }
            SExp::Nil => {
                f.write_str("nil")?;
            }
            SExp::Symbol { name } => {
                write!(f, ":{}", name)?;
            }
            SExp::Number { value } => {
                write!(f, "{}", value)?;
            }
            SExp::Float { value } => {
                write!(f, "{:?}", value)?;
            }
            SExp::Str { value } => {
                write!(f, "{:?}", value)?;
            }
            SExp::Invalid => {
                f.write_str("<invalid>")?;
            }
        }
        Ok(())
    }
}

struct Indent(u32);

impl Display for Indent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for _ in 0..self.0 {
            f.write_str("  ")?;
        }
        Ok(())
    }
}

fn symbol(name: impl Into<String>) -> SExp {
    SExp::Symbol { name: name.into() }
}

fn string(value: impl Into<String>) -> SExp {
    SExp::Str {
        value: value.into(),
    }
}

/// Modifiers print as one string, e.g. `"layout(binding=0) uniform"`, and
/// are left out entirely when empty.
fn modifiers_arg(modifiers: &Modifiers) -> Option<SExp> {
    let text = modifiers.to_string();
    if text.is_empty() {
        None
    } else {
        Some(string(text))
    }
}

fn tag(node: &Node) -> &'static str {
    match node.kind {
        NodeKind::Null => "null",
        NodeKind::Bool => "bool",
        NodeKind::Int => "int",
        NodeKind::Float => "float",
        NodeKind::Identifier => "ident",
        NodeKind::Binary => "binary",
        NodeKind::Prefix => "prefix",
        NodeKind::Postfix => "postfix",
        NodeKind::Index => "index",
        NodeKind::Field => "field",
        NodeKind::Call => "call",
        NodeKind::Ternary => "ternary",
        NodeKind::Type => match node.type_data() {
            Some(data) if data.is_struct_declaration => "struct",
            _ => "type",
        },
        NodeKind::Modifiers => "modifiers",
        NodeKind::VarDeclarations => "var_declarations",
        NodeKind::VarDeclaration => "var",
        NodeKind::Parameter => "parameter",
        NodeKind::Function => "function",
        NodeKind::InterfaceBlock => "interface_block",
        NodeKind::Enum => "enum",
        NodeKind::EnumCase => "enum_case",
        NodeKind::Extension => "extension",
        NodeKind::Section => "section",
        NodeKind::Block => "block",
        NodeKind::If => "if",
        NodeKind::For => "for",
        NodeKind::While => "while",
        NodeKind::Do => "do",
        NodeKind::Switch => "switch",
        NodeKind::SwitchCase => "case",
        NodeKind::Break => "break",
        NodeKind::Continue => "continue",
        NodeKind::Discard => "discard",
        NodeKind::Return => "return",
    }
}

/// Arguments that come from the node's payload; children follow them.
fn payload(node: &Node) -> Vec<SExp> {
    let mut args = Vec::new();
    match &node.data {
        NodeData::None => {}
        NodeData::Bool { value } => {
            if node.kind == NodeKind::Bool {
                args.push(symbol(value.to_string()));
            } else if *value {
                // `@if` and `@switch`
                args.push(symbol("static"));
            }
        }
        NodeData::Int { value } => args.push(SExp::Number { value: *value }),
        NodeData::Float { value } => args.push(SExp::Float { value: *value }),
        NodeData::Text { text } => args.push(symbol(text.as_str())),
        NodeData::Operator { op } => args.push(string(op.symbol())),
        NodeData::Modifiers { modifiers } => args.extend(modifiers_arg(modifiers)),
        NodeData::Type(data) => {
            args.push(symbol(data.name.as_str()));
            if data.is_nullable {
                args.push(symbol("nullable"));
            }
        }
        NodeData::Var(data) => {
            args.push(symbol(data.name.as_str()));
            if data.is_array {
                args.push(symbol("array"));
            }
        }
        NodeData::Parameter(data) => {
            args.extend(modifiers_arg(&data.modifiers));
            args.push(symbol(data.name.as_str()));
            if data.is_array {
                args.push(symbol("array"));
            }
        }
        NodeData::Function(data) => {
            args.extend(modifiers_arg(&data.modifiers));
            args.push(symbol(data.name.as_str()));
        }
        NodeData::InterfaceBlock(data) => {
            args.extend(modifiers_arg(&data.modifiers));
            args.push(symbol(data.type_name.as_str()));
            if let Some(instance_name) = &data.instance_name {
                args.push(symbol(instance_name.as_str()));
            }
            if data.is_array {
                args.push(symbol("array"));
            }
        }
        NodeData::Section(data) => {
            args.push(symbol(data.name.as_str()));
            if let Some(argument) = &data.argument {
                args.push(string(argument.as_str()));
            }
            args.push(string(data.text.as_str()));
        }
    }
    args
}

pub fn to_sexp(file: &AstFile, id: NodeId) -> SExp {
    if !id.is_valid() {
        return SExp::Nil;
    }
    let node = match file.get(id) {
        Some(node) => node,
        None => return SExp::Invalid,
    };
    let mut args = payload(node);
    args.extend(node.children.iter().map(|&child| to_sexp(file, child)));
    SExp::Tagged {
        tag: tag(node).to_owned(),
        args,
    }
}

/// All top-level declarations, one tree per root, each followed by a newline.
pub fn display_sexp(file: &AstFile) -> String {
    file.roots
        .iter()
        .map(|&root| format!("{}\n", to_sexp(file, root)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_display_nested() {
        let (file, errors) = parse(b"int x = -(1 + y);");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            display_sexp(&file),
            concat!(
                "s(:var_declarations,\n",
                "  s(:modifiers),\n",
                "  s(:type, :int),\n",
                "  s(:var, :x,\n",
                "    s(:prefix, \"-\",\n",
                "      s(:binary, \"+\",\n",
                "        s(:int, 1),\n",
                "        s(:ident, :y)))))\n",
            )
        );
    }

    #[test]
    fn test_display_leaves() {
        let sexp = SExp::Tagged {
            tag: "x".to_owned(),
            args: vec![
                SExp::Nil,
                SExp::Float { value: 1.0 },
                string("a\"b"),
                SExp::Invalid,
            ],
        };
        assert_eq!(sexp.to_string(), r#"s(:x, nil, 1.0, "a\"b", <invalid>)"#);
    }

    #[test]
    fn test_empty_slots_print_as_nil() {
        let (file, errors) = parse(b"void f() { for (;;) break; }");
        assert!(errors.is_empty(), "{:?}", errors);
        let output = display_sexp(&file);
        assert!(output.contains("s(:for, nil, nil, nil,\n"), "{}", output);
    }
}
