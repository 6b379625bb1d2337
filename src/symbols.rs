use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Answers whether a name denotes a type. The parser only queries it, and
/// may do so speculatively, so implementations must be side-effect free.
pub trait SymbolTable {
    fn is_type(&self, name: &str) -> bool;
}

impl SymbolTable for HashSet<String> {
    fn is_type(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl<T: SymbolTable + ?Sized> SymbolTable for &T {
    fn is_type(&self, name: &str) -> bool {
        (**self).is_type(name)
    }
}

static BUILTIN_TYPES: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut types = [
        "void",
        "sampler1D",
        "sampler2D",
        "sampler3D",
        "samplerExternalOES",
        "sampler2DRect",
        "sampler2DArray",
        "sampler2DShadow",
        "samplerCube",
        "samplerBuffer",
        "sampler",
        "texture1D",
        "texture2D",
        "texture3D",
        "textureExternalOES",
        "texture2DRect",
        "image2D",
        "iimage2D",
        "subpassInput",
        "subpassInputMS",
        "fragmentProcessor",
        "colorFilter",
        "shader",
    ]
    .iter()
    .map(|&name| name.to_owned())
    .collect::<HashSet<_>>();
    for scalar in [
        "float", "half", "int", "uint", "short", "ushort", "byte", "ubyte", "bool",
    ] {
        types.insert(scalar.to_owned());
        for n in 2..=4 {
            types.insert(format!("{}{}", scalar, n));
        }
    }
    for scalar in ["float", "half"] {
        for columns in 2..=4 {
            for rows in 2..=4 {
                types.insert(format!("{}{}x{}", scalar, columns, rows));
            }
        }
    }
    types
});

/// The types every shader can use without declaring them.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTypes;

impl SymbolTable for BuiltinTypes {
    fn is_type(&self, name: &str) -> bool {
        BUILTIN_TYPES.contains(name)
    }
}
