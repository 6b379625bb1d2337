use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Contents of a `layout(...)` qualifier list. Every field is independent;
/// `None` means the qualifier was not given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub flags: LayoutFlags,
    pub location: Option<u32>,
    pub offset: Option<u32>,
    pub binding: Option<u32>,
    pub index: Option<u32>,
    pub set: Option<u32>,
    pub builtin: Option<u32>,
    pub input_attachment_index: Option<u32>,
    pub primitive: Option<Primitive>,
    pub max_vertices: Option<u32>,
    pub invocations: Option<u32>,
    /// Raw source text of `marker=...`
    pub marker: Option<String>,
    /// Raw source text of `when=...`
    pub when: Option<String>,
    pub key: Option<Key>,
    pub ctype: Option<CType>,
}

impl Layout {
    pub fn is_empty(&self) -> bool {
        *self == Layout::default()
    }
}

/// `layout(location=0, binding=1)`, or nothing for an empty layout.
impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        let numbers = [
            ("location", self.location),
            ("offset", self.offset),
            ("binding", self.binding),
            ("index", self.index),
            ("set", self.set),
            ("builtin", self.builtin),
            ("input_attachment_index", self.input_attachment_index),
        ];
        for (name, value) in numbers {
            if let Some(value) = value {
                parts.push(format!("{}={}", name, value));
            }
        }
        for (flag, name) in [
            (LayoutFlags::ORIGIN_UPPER_LEFT, "origin_upper_left"),
            (LayoutFlags::OVERRIDE_COVERAGE, "override_coverage"),
            (LayoutFlags::EARLY_FRAGMENT_TESTS, "early_fragment_tests"),
            (
                LayoutFlags::BLEND_SUPPORT_ALL_EQUATIONS,
                "blend_support_all_equations",
            ),
            (LayoutFlags::PUSH_CONSTANT, "push_constant"),
            (LayoutFlags::TRACKED, "tracked"),
            (LayoutFlags::SRGB_UNPREMUL, "srgb_unpremul"),
        ] {
            if self.flags.contains(flag) {
                parts.push(name.to_owned());
            }
        }
        if let Some(primitive) = self.primitive {
            parts.push(primitive.name().to_owned());
        }
        if let Some(max_vertices) = self.max_vertices {
            parts.push(format!("max_vertices={}", max_vertices));
        }
        if let Some(invocations) = self.invocations {
            parts.push(format!("invocations={}", invocations));
        }
        if let Some(marker) = &self.marker {
            parts.push(format!("marker={}", marker));
        }
        if let Some(when) = &self.when {
            parts.push(format!("when={}", when));
        }
        match self.key {
            Some(Key::Key) => parts.push("key".to_owned()),
            Some(Key::Identity) => parts.push("key=identity".to_owned()),
            None => {}
        }
        if let Some(ctype) = self.ctype {
            parts.push(format!("ctype={}", ctype.name()));
        }
        write!(f, "layout({})", parts.join(", "))
    }
}

bitflags! {
    #[derive(Default, Serialize)]
    pub struct LayoutFlags: u32 {
        const ORIGIN_UPPER_LEFT = 1 << 0;
        const OVERRIDE_COVERAGE = 1 << 1;
        const EARLY_FRAGMENT_TESTS = 1 << 2;
        const BLEND_SUPPORT_ALL_EQUATIONS = 1 << 3;
        const PUSH_CONSTANT = 1 << 4;
        const TRACKED = 1 << 5;
        const SRGB_UNPREMUL = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LinesAdjacency,
    Triangles,
    TriangleStrip,
    TrianglesAdjacency,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Points => "points",
            Primitive::Lines => "lines",
            Primitive::LineStrip => "line_strip",
            Primitive::LinesAdjacency => "lines_adjacency",
            Primitive::Triangles => "triangles",
            Primitive::TriangleStrip => "triangle_strip",
            Primitive::TrianglesAdjacency => "triangles_adjacency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Key {
    /// `key`
    Key,
    /// `key=identity`
    Identity,
}

/// Native type a uniform binds to, from `ctype=...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CType {
    SkPMColor4f,
    SkV4,
    SkRect,
    SkIRect,
    SkPMColor,
    SkM44,
    Bool,
    Int32,
    Float,
}

impl CType {
    pub fn name(self) -> &'static str {
        match self {
            CType::SkPMColor4f => "SkPMColor4f",
            CType::SkV4 => "SkV4",
            CType::SkRect => "SkRect",
            CType::SkIRect => "SkIRect",
            CType::SkPMColor => "SkPMColor",
            CType::SkM44 => "SkM44",
            CType::Bool => "bool",
            CType::Int32 => "int",
            CType::Float => "float",
        }
    }
}

/// Words with a meaning inside `layout(...)`. These are plain identifiers
/// to the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LayoutToken {
    Location,
    Offset,
    Binding,
    Index,
    Set,
    Builtin,
    InputAttachmentIndex,
    OriginUpperLeft,
    OverrideCoverage,
    EarlyFragmentTests,
    BlendSupportAllEquations,
    PushConstant,
    Points,
    Lines,
    LineStrip,
    LinesAdjacency,
    Triangles,
    TriangleStrip,
    TrianglesAdjacency,
    MaxVertices,
    Invocations,
    Marker,
    When,
    Key,
    Tracked,
    SrgbUnpremul,
    CType,
    SkPMColor4f,
    SkV4,
    SkRect,
    SkIRect,
    SkPMColor,
    SkM44,
    Bool,
    Int,
    Float,
}

pub(crate) static LAYOUT_TOKENS: Lazy<HashMap<&str, LayoutToken>> = Lazy::new(|| {
    vec![
        ("location", LayoutToken::Location),
        ("offset", LayoutToken::Offset),
        ("binding", LayoutToken::Binding),
        ("index", LayoutToken::Index),
        ("set", LayoutToken::Set),
        ("builtin", LayoutToken::Builtin),
        ("input_attachment_index", LayoutToken::InputAttachmentIndex),
        ("origin_upper_left", LayoutToken::OriginUpperLeft),
        ("override_coverage", LayoutToken::OverrideCoverage),
        ("early_fragment_tests", LayoutToken::EarlyFragmentTests),
        (
            "blend_support_all_equations",
            LayoutToken::BlendSupportAllEquations,
        ),
        ("push_constant", LayoutToken::PushConstant),
        ("points", LayoutToken::Points),
        ("lines", LayoutToken::Lines),
        ("line_strip", LayoutToken::LineStrip),
        ("lines_adjacency", LayoutToken::LinesAdjacency),
        ("triangles", LayoutToken::Triangles),
        ("triangle_strip", LayoutToken::TriangleStrip),
        ("triangles_adjacency", LayoutToken::TrianglesAdjacency),
        ("max_vertices", LayoutToken::MaxVertices),
        ("invocations", LayoutToken::Invocations),
        ("marker", LayoutToken::Marker),
        ("when", LayoutToken::When),
        ("key", LayoutToken::Key),
        ("tracked", LayoutToken::Tracked),
        ("srgb_unpremul", LayoutToken::SrgbUnpremul),
        ("ctype", LayoutToken::CType),
        ("SkPMColor4f", LayoutToken::SkPMColor4f),
        ("SkV4", LayoutToken::SkV4),
        ("SkRect", LayoutToken::SkRect),
        ("SkIRect", LayoutToken::SkIRect),
        ("SkPMColor", LayoutToken::SkPMColor),
        ("SkM44", LayoutToken::SkM44),
        ("bool", LayoutToken::Bool),
        ("int", LayoutToken::Int),
        ("float", LayoutToken::Float),
    ]
    .into_iter()
    .collect::<HashMap<_, _>>()
});

impl LayoutToken {
    pub(crate) fn lookup(word: &str) -> Option<LayoutToken> {
        LAYOUT_TOKENS.get(word).copied()
    }

    pub(crate) fn to_ctype(self) -> Option<CType> {
        Some(match self {
            LayoutToken::SkPMColor4f => CType::SkPMColor4f,
            LayoutToken::SkV4 => CType::SkV4,
            LayoutToken::SkRect => CType::SkRect,
            LayoutToken::SkIRect => CType::SkIRect,
            LayoutToken::SkPMColor => CType::SkPMColor,
            LayoutToken::SkM44 => CType::SkM44,
            LayoutToken::Bool => CType::Bool,
            LayoutToken::Int => CType::Int32,
            LayoutToken::Float => CType::Float,
            _ => return None,
        })
    }

    pub(crate) fn to_primitive(self) -> Option<Primitive> {
        Some(match self {
            LayoutToken::Points => Primitive::Points,
            LayoutToken::Lines => Primitive::Lines,
            LayoutToken::LineStrip => Primitive::LineStrip,
            LayoutToken::LinesAdjacency => Primitive::LinesAdjacency,
            LayoutToken::Triangles => Primitive::Triangles,
            LayoutToken::TriangleStrip => Primitive::TriangleStrip,
            LayoutToken::TrianglesAdjacency => Primitive::TrianglesAdjacency,
            _ => return None,
        })
    }

    pub(crate) fn to_flag(self) -> Option<LayoutFlags> {
        Some(match self {
            LayoutToken::OriginUpperLeft => LayoutFlags::ORIGIN_UPPER_LEFT,
            LayoutToken::OverrideCoverage => LayoutFlags::OVERRIDE_COVERAGE,
            LayoutToken::EarlyFragmentTests => LayoutFlags::EARLY_FRAGMENT_TESTS,
            LayoutToken::BlendSupportAllEquations => LayoutFlags::BLEND_SUPPORT_ALL_EQUATIONS,
            LayoutToken::PushConstant => LayoutFlags::PUSH_CONSTANT,
            LayoutToken::Tracked => LayoutFlags::TRACKED,
            LayoutToken::SrgbUnpremul => LayoutFlags::SRGB_UNPREMUL,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(LayoutToken::lookup("binding"), Some(LayoutToken::Binding));
        assert_eq!(LayoutToken::lookup("Binding"), None);
        assert_eq!(
            LayoutToken::lookup("SkRect").and_then(LayoutToken::to_ctype),
            Some(CType::SkRect)
        );
        assert_eq!(LayoutToken::Location.to_ctype(), None);
    }

    #[test]
    fn test_default_is_empty() {
        let mut layout = Layout::default();
        assert!(layout.is_empty());
        layout.location = Some(0);
        assert!(!layout.is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(Layout::default().to_string(), "");
        let layout = Layout {
            flags: LayoutFlags::TRACKED,
            set: Some(1),
            binding: Some(0),
            primitive: Some(Primitive::Triangles),
            key: Some(Key::Identity),
            ctype: Some(CType::SkRect),
            ..Layout::default()
        };
        assert_eq!(
            layout.to_string(),
            "layout(binding=0, set=1, tracked, triangles, key=identity, ctype=SkRect)"
        );
    }
}
