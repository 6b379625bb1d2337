use crate::ast::{Operator, Range};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
}

impl Token {
    pub fn offset(&self) -> usize {
        self.range.0
    }

    pub fn len(&self) -> usize {
        self.range.1 - self.range.0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operator denoted by this token, if any. The same token may map to
    /// a binary, prefix or postfix operator depending on where it appears.
    pub(crate) fn to_operator<F>(&self, cond: F) -> Option<Operator>
    where
        F: FnOnce(Operator) -> bool,
    {
        match Operator::from_token_kind(self.kind) {
            Some(op) if cond(op) => Some(op),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    EndOfFile,
    /// `42`, `0x2A`, `052`, `42u`
    IntLiteral,
    /// `4.2`, `.5`, `1e10`
    FloatLiteral,
    /// `true`
    TrueLiteral,
    /// `false`
    FalseLiteral,
    /// `null`
    NullLiteral,
    /// `if`
    If,
    /// `@if`
    StaticIf,
    /// `else`
    Else,
    /// `for`
    For,
    /// `while`
    While,
    /// `do`
    Do,
    /// `switch`
    Switch,
    /// `@switch`
    StaticSwitch,
    /// `case`
    Case,
    /// `default`
    Default,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `discard`
    Discard,
    /// `return`
    Return,
    /// `in`
    In,
    /// `out`
    Out,
    /// `inout`
    InOut,
    /// `uniform`
    Uniform,
    /// `const`
    Const,
    /// `flat`
    Flat,
    /// `noperspective`
    NoPerspective,
    /// `readonly`
    ReadOnly,
    /// `writeonly`
    WriteOnly,
    /// `coherent`
    Coherent,
    /// `volatile`
    Volatile,
    /// `restrict`
    Restrict,
    /// `buffer`
    Buffer,
    /// `sk_has_side_effects`
    HasSideEffects,
    /// `__pixel_localEXT`
    Pls,
    /// `__pixel_local_inEXT`
    PlsIn,
    /// `__pixel_local_outEXT`
    PlsOut,
    /// `varying`
    Varying,
    /// `inline`
    Inline,
    /// `lowp`
    Lowp,
    /// `mediump`
    Mediump,
    /// `highp`
    Highp,
    /// `struct`
    Struct,
    /// `layout`
    Layout,
    /// `precision`
    Precision,
    /// `enum`
    Enum,
    /// `class`
    Class,
    /// Any identifier, including type names. Whether an identifier names a
    /// type is decided by the parser, not the lexer.
    Identifier,
    /// `#extension`, `#version`, ...
    Directive,
    /// `@header`, `@class`, ... (but not `@if`/`@switch`)
    Section,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `&`
    BitwiseAnd,
    /// `~`
    BitwiseNot,
    /// `||`
    LogicalOr,
    /// `^^`
    LogicalXor,
    /// `&&`
    LogicalAnd,
    /// `!`
    LogicalNot,
    /// `?`
    Question,
    /// `::`
    ColonColon,
    /// `:`
    Colon,
    /// `=`
    Eq,
    /// `==`
    EqEq,
    /// `!=`
    Neq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    GtEq,
    /// `<=`
    LtEq,
    /// `+=`
    PlusEq,
    /// `-=`
    MinusEq,
    /// `*=`
    StarEq,
    /// `/=`
    SlashEq,
    /// `%=`
    PercentEq,
    /// `<<=`
    ShlEq,
    /// `>>=`
    ShrEq,
    /// `|=`
    BitwiseOrEq,
    /// `^=`
    BitwiseXorEq,
    /// `&=`
    BitwiseAndEq,
    /// `||=`
    LogicalOrEq,
    /// `^^=`
    LogicalXorEq,
    /// `&&=`
    LogicalAndEq,
    /// `;`
    Semicolon,
    /// `->`
    Arrow,
    Whitespace,
    /// `// ...`
    LineComment,
    /// `/* ... */`
    BlockComment,
    /// A byte that starts no valid token
    Invalid,
}

impl TokenKind {
    /// Tokens that `next_token` skips over.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }
}
