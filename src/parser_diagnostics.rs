use thiserror::Error;

use crate::ast::Range;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected}, but found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        range: Range,
    },
    #[error("expected {expected}, but found end of input")]
    UnexpectedEof { expected: String, range: Range },
    #[error("expected an identifier, but found type '{name}'")]
    ExpectedIdentifierFoundType { name: String, range: Range },
    #[error("no type named '{name}'")]
    UnknownType { name: String, range: Range },
    #[error("nesting too deep: exceeded max parse depth of {limit}")]
    TooDeep { limit: usize, range: Range },
    #[error("'{name}' is not a valid layout qualifier")]
    InvalidLayoutQualifier { name: String, range: Range },
    #[error("unsupported layout key")]
    UnsupportedLayoutKey { range: Range },
    #[error("unsupported ctype")]
    UnsupportedCType { range: Range },
    #[error("reached end of file while parsing layout")]
    UnterminatedLayout { range: Range },
    #[error("unsupported directive '{name}'")]
    UnsupportedDirective { name: String, range: Range },
    #[error("reached end of file while parsing section")]
    UnterminatedSection { range: Range },
    #[error("invalid swizzle")]
    InvalidSwizzle { range: Range },
    #[error("integer is too large: {text}")]
    IntegerTooLarge { text: String, range: Range },
    #[error("invalid literal '{text}'")]
    InvalidLiteral { text: String, range: Range },
    #[error("modifier '{modifiers}' is not permitted on a struct field")]
    StructFieldModifier { modifiers: String, range: Range },
    #[error("array size in struct field must be a constant")]
    StructFieldArraySize { range: Range },
    #[error("initializers are not permitted on struct fields")]
    StructFieldInitializer { range: Range },
    #[error("multi-dimensional arrays are not supported")]
    MultiDimensionalArray { range: Range },
}

impl ParseError {
    pub fn range(&self) -> Range {
        use ParseError::*;
        match self {
            UnexpectedToken { range, .. } => *range,
            UnexpectedEof { range, .. } => *range,
            ExpectedIdentifierFoundType { range, .. } => *range,
            UnknownType { range, .. } => *range,
            TooDeep { range, .. } => *range,
            InvalidLayoutQualifier { range, .. } => *range,
            UnsupportedLayoutKey { range } => *range,
            UnsupportedCType { range } => *range,
            UnterminatedLayout { range } => *range,
            UnsupportedDirective { range, .. } => *range,
            UnterminatedSection { range } => *range,
            InvalidSwizzle { range } => *range,
            IntegerTooLarge { range, .. } => *range,
            InvalidLiteral { range, .. } => *range,
            StructFieldModifier { range, .. } => *range,
            StructFieldArraySize { range } => *range,
            StructFieldInitializer { range } => *range,
            MultiDimensionalArray { range } => *range,
        }
    }
}
