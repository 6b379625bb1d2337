use crate::layout::Layout;
use crate::token::TokenKind;
use bitflags::bitflags;
use derive_more::From;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Range(pub usize, pub usize);

impl BitOr for Range {
    type Output = Range;

    fn bitor(self, rhs: Range) -> Range {
        Range(self.0.min(rhs.0), self.1.max(rhs.1))
    }
}

/// Index of a node in [`AstFile::nodes`].
///
/// `NodeId::INVALID` stands for "no node", e.g. the missing initializer in
/// `for (; i < 3; ++i)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const INVALID: NodeId = NodeId(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != NodeId::INVALID
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Serialize for NodeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_valid() {
            serializer.serialize_some(&self.0)
        } else {
            serializer.serialize_none()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Null,
    Bool,
    Int,
    Float,
    Identifier,
    /// Binary operator, including assignments and the comma operator
    Binary,
    Prefix,
    Postfix,
    /// `base[index]` or `base[]`
    Index,
    /// `base.name` or `base::name`
    Field,
    Call,
    Ternary,
    Type,
    Modifiers,
    VarDeclarations,
    VarDeclaration,
    Parameter,
    Function,
    InterfaceBlock,
    Enum,
    EnumCase,
    Extension,
    Section,
    Block,
    If,
    For,
    While,
    Do,
    Switch,
    SwitchCase,
    Break,
    Continue,
    Discard,
    Return,
}

#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(tag = "type")]
pub enum NodeData {
    #[from(ignore)]
    None,
    Bool { value: bool },
    Int { value: i64 },
    Float { value: f64 },
    /// Identifier, field name, enum name or extension name
    Text { text: String },
    Operator { op: Operator },
    Modifiers { modifiers: Modifiers },
    Type(TypeData),
    Var(VarData),
    Parameter(ParameterData),
    Function(FunctionData),
    InterfaceBlock(InterfaceBlockData),
    Section(SectionData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeData {
    pub name: String,
    /// Set for `struct Name { ... }`; the children are then the field
    /// declarations instead of array sizes.
    pub is_struct_declaration: bool,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VarData {
    pub name: String,
    /// When set, the first child is the array size (or `NodeId::INVALID`
    /// for `[]`); the initializer, if any, follows it.
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterData {
    pub modifiers: Modifiers,
    pub name: String,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionData {
    pub modifiers: Modifiers,
    pub name: String,
    pub parameter_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceBlockData {
    pub modifiers: Modifiers,
    pub type_name: String,
    pub declaration_count: usize,
    pub instance_name: Option<String>,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionData {
    pub name: String,
    pub argument: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    /// Byte offset of the construct in the source text
    pub offset: usize,
    pub data: NodeData,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        match &self.data {
            NodeData::Operator { op } => Some(*op),
            _ => None,
        }
    }

    pub fn type_data(&self) -> Option<&TypeData> {
        match &self.data {
            NodeData::Type(data) => Some(data),
            _ => None,
        }
    }

    pub fn var_data(&self) -> Option<&VarData> {
        match &self.data {
            NodeData::Var(data) => Some(data),
            _ => None,
        }
    }

    pub fn modifiers(&self) -> Option<&Modifiers> {
        match &self.data {
            NodeData::Modifiers { modifiers } => Some(modifiers),
            NodeData::Parameter(data) => Some(&data.modifiers),
            NodeData::Function(data) => Some(&data.modifiers),
            NodeData::InterfaceBlock(data) => Some(&data.modifiers),
            _ => None,
        }
    }
}

/// A parsed compilation unit: one node arena plus the top-level
/// declarations in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AstFile {
    pub nodes: Vec<Node>,
    pub roots: Vec<NodeId>,
}

impl AstFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Children of `id`, empty slots included.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub(crate) fn add_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(child == NodeId::INVALID || child.index() < self.nodes.len());
        self[parent].children.push(child);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }
}

impl Index<NodeId> for AstFile {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl IndexMut<NodeId> for AstFile {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    /// `,`
    Comma,
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
    /// `*=`
    MulAssign,
    /// `/=`
    DivAssign,
    /// `%=`
    ModAssign,
    /// `<<=`
    ShlAssign,
    /// `>>=`
    ShrAssign,
    /// `&=`
    BitwiseAndAssign,
    /// `^=`
    BitwiseXorAssign,
    /// `|=`
    BitwiseOrAssign,
    /// `&&=`
    LogicalAndAssign,
    /// `^^=`
    LogicalXorAssign,
    /// `||=`
    LogicalOrAssign,
    /// `||`
    LogicalOr,
    /// `^^`
    LogicalXor,
    /// `&&`
    LogicalAnd,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `&`
    BitwiseAnd,
    /// `==`
    Eq,
    /// `!=`
    NEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `+`, binary or unary
    Plus,
    /// `-`, binary or unary
    Minus,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `!`
    LogicalNot,
    /// `~`
    BitwiseNot,
    /// `++`
    Increment,
    /// `--`
    Decrement,
}

impl Operator {
    pub fn from_token_kind(kind: TokenKind) -> Option<Operator> {
        use Operator::*;
        Some(match kind {
            TokenKind::Comma => Comma,
            TokenKind::Eq => Assign,
            TokenKind::PlusEq => AddAssign,
            TokenKind::MinusEq => SubAssign,
            TokenKind::StarEq => MulAssign,
            TokenKind::SlashEq => DivAssign,
            TokenKind::PercentEq => ModAssign,
            TokenKind::ShlEq => ShlAssign,
            TokenKind::ShrEq => ShrAssign,
            TokenKind::BitwiseAndEq => BitwiseAndAssign,
            TokenKind::BitwiseXorEq => BitwiseXorAssign,
            TokenKind::BitwiseOrEq => BitwiseOrAssign,
            TokenKind::LogicalAndEq => LogicalAndAssign,
            TokenKind::LogicalXorEq => LogicalXorAssign,
            TokenKind::LogicalOrEq => LogicalOrAssign,
            TokenKind::LogicalOr => LogicalOr,
            TokenKind::LogicalXor => LogicalXor,
            TokenKind::LogicalAnd => LogicalAnd,
            TokenKind::BitwiseOr => BitwiseOr,
            TokenKind::BitwiseXor => BitwiseXor,
            TokenKind::BitwiseAnd => BitwiseAnd,
            TokenKind::EqEq => Eq,
            TokenKind::Neq => NEq,
            TokenKind::Lt => Lt,
            TokenKind::Gt => Gt,
            TokenKind::LtEq => LtEq,
            TokenKind::GtEq => GtEq,
            TokenKind::Shl => Shl,
            TokenKind::Shr => Shr,
            TokenKind::Plus => Plus,
            TokenKind::Minus => Minus,
            TokenKind::Star => Mul,
            TokenKind::Slash => Div,
            TokenKind::Percent => Mod,
            TokenKind::LogicalNot => LogicalNot,
            TokenKind::BitwiseNot => BitwiseNot,
            TokenKind::PlusPlus => Increment,
            TokenKind::MinusMinus => Decrement,
            _ => return None,
        })
    }

    pub fn is_assignment(self) -> bool {
        use Operator::*;
        matches!(
            self,
            Assign
                | AddAssign
                | SubAssign
                | MulAssign
                | DivAssign
                | ModAssign
                | ShlAssign
                | ShrAssign
                | BitwiseAndAssign
                | BitwiseXorAssign
                | BitwiseOrAssign
                | LogicalAndAssign
                | LogicalXorAssign
                | LogicalOrAssign
        )
    }

    pub fn is_prefix(self) -> bool {
        use Operator::*;
        matches!(
            self,
            Plus | Minus | LogicalNot | BitwiseNot | Increment | Decrement
        )
    }

    pub fn symbol(self) -> &'static str {
        use Operator::*;
        match self {
            Comma => ",",
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            ModAssign => "%=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            BitwiseAndAssign => "&=",
            BitwiseXorAssign => "^=",
            BitwiseOrAssign => "|=",
            LogicalAndAssign => "&&=",
            LogicalXorAssign => "^^=",
            LogicalOrAssign => "||=",
            LogicalOr => "||",
            LogicalXor => "^^",
            LogicalAnd => "&&",
            BitwiseOr => "|",
            BitwiseXor => "^",
            BitwiseAnd => "&",
            Eq => "==",
            NEq => "!=",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            Shl => "<<",
            Shr => ">>",
            Plus => "+",
            Minus => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            LogicalNot => "!",
            BitwiseNot => "~",
            Increment => "++",
            Decrement => "--",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

bitflags! {
    #[derive(Default, Serialize)]
    pub struct ModifierFlags: u32 {
        const CONST = 1 << 0;
        const IN = 1 << 1;
        const OUT = 1 << 2;
        const LOWP = 1 << 3;
        const MEDIUMP = 1 << 4;
        const HIGHP = 1 << 5;
        const UNIFORM = 1 << 6;
        const FLAT = 1 << 7;
        const NO_PERSPECTIVE = 1 << 8;
        const READ_ONLY = 1 << 9;
        const WRITE_ONLY = 1 << 10;
        const COHERENT = 1 << 11;
        const VOLATILE = 1 << 12;
        const RESTRICT = 1 << 13;
        const BUFFER = 1 << 14;
        const HAS_SIDE_EFFECTS = 1 << 15;
        const PLS = 1 << 16;
        const PLS_IN = 1 << 17;
        const PLS_OUT = 1 << 18;
        const VARYING = 1 << 19;
        const INLINE = 1 << 20;
    }
}

impl ModifierFlags {
    pub fn from_token_kind(kind: TokenKind) -> Option<ModifierFlags> {
        Some(match kind {
            TokenKind::Uniform => ModifierFlags::UNIFORM,
            TokenKind::Const => ModifierFlags::CONST,
            TokenKind::In => ModifierFlags::IN,
            TokenKind::Out => ModifierFlags::OUT,
            TokenKind::InOut => ModifierFlags::IN | ModifierFlags::OUT,
            TokenKind::Lowp => ModifierFlags::LOWP,
            TokenKind::Mediump => ModifierFlags::MEDIUMP,
            TokenKind::Highp => ModifierFlags::HIGHP,
            TokenKind::Flat => ModifierFlags::FLAT,
            TokenKind::NoPerspective => ModifierFlags::NO_PERSPECTIVE,
            TokenKind::ReadOnly => ModifierFlags::READ_ONLY,
            TokenKind::WriteOnly => ModifierFlags::WRITE_ONLY,
            TokenKind::Coherent => ModifierFlags::COHERENT,
            TokenKind::Volatile => ModifierFlags::VOLATILE,
            TokenKind::Restrict => ModifierFlags::RESTRICT,
            TokenKind::Buffer => ModifierFlags::BUFFER,
            TokenKind::HasSideEffects => ModifierFlags::HAS_SIDE_EFFECTS,
            TokenKind::Pls => ModifierFlags::PLS,
            TokenKind::PlsIn => ModifierFlags::PLS_IN,
            TokenKind::PlsOut => ModifierFlags::PLS_OUT,
            TokenKind::Varying => ModifierFlags::VARYING,
            TokenKind::Inline => ModifierFlags::INLINE,
            _ => return None,
        })
    }
}

/// Keywords in source order, e.g. `uniform const`.
impl fmt::Display for ModifierFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(ModifierFlags, &str)] = &[
            (ModifierFlags::UNIFORM, "uniform"),
            (ModifierFlags::CONST, "const"),
            (ModifierFlags::FLAT, "flat"),
            (ModifierFlags::NO_PERSPECTIVE, "noperspective"),
            (ModifierFlags::READ_ONLY, "readonly"),
            (ModifierFlags::WRITE_ONLY, "writeonly"),
            (ModifierFlags::COHERENT, "coherent"),
            (ModifierFlags::VOLATILE, "volatile"),
            (ModifierFlags::RESTRICT, "restrict"),
            (ModifierFlags::BUFFER, "buffer"),
            (ModifierFlags::HAS_SIDE_EFFECTS, "sk_has_side_effects"),
            (ModifierFlags::PLS, "__pixel_localEXT"),
            (ModifierFlags::PLS_IN, "__pixel_local_inEXT"),
            (ModifierFlags::PLS_OUT, "__pixel_local_outEXT"),
            (ModifierFlags::VARYING, "varying"),
            (ModifierFlags::INLINE, "inline"),
            (ModifierFlags::LOWP, "lowp"),
            (ModifierFlags::MEDIUMP, "mediump"),
            (ModifierFlags::HIGHP, "highp"),
        ];
        let mut words = Vec::new();
        if self.contains(ModifierFlags::IN | ModifierFlags::OUT) {
            words.push("inout");
        } else if self.contains(ModifierFlags::IN) {
            words.push("in");
        } else if self.contains(ModifierFlags::OUT) {
            words.push("out");
        }
        for &(flag, name) in NAMES {
            if self.contains(flag) {
                words.push(name);
            }
        }
        f.write_str(&words.join(" "))
    }
}

/// Storage qualifiers plus the `layout(...)` attached to a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Modifiers {
    pub layout: Layout,
    pub flags: ModifierFlags,
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.layout.is_empty(), self.flags.is_empty()) {
            (true, _) => write!(f, "{}", self.flags),
            (false, true) => write!(f, "{}", self.layout),
            (false, false) => write!(f, "{} {}", self.layout, self.flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_flags_display() {
        let flags = ModifierFlags::CONST | ModifierFlags::UNIFORM | ModifierFlags::HIGHP;
        assert_eq!(flags.to_string(), "uniform const highp");
        let flags = ModifierFlags::IN | ModifierFlags::OUT;
        assert_eq!(flags.to_string(), "inout");
        assert_eq!(ModifierFlags::empty().to_string(), "");
    }

    #[test]
    fn test_modifiers_display() {
        let mut modifiers = Modifiers {
            flags: ModifierFlags::UNIFORM,
            ..Modifiers::default()
        };
        assert_eq!(modifiers.to_string(), "uniform");
        modifiers.layout.binding = Some(1);
        assert_eq!(modifiers.to_string(), "layout(binding=1) uniform");
        modifiers.flags = ModifierFlags::empty();
        assert_eq!(modifiers.to_string(), "layout(binding=1)");
    }

    #[test]
    fn test_node_id_serializes_invalid_as_null() {
        let ids = vec![NodeId(3), NodeId::INVALID];
        assert_eq!(serde_json::to_string(&ids).unwrap(), "[3,null]");
    }

    #[test]
    fn test_operator_classification() {
        let op = Operator::from_token_kind(TokenKind::ShlEq).unwrap();
        assert!(op.is_assignment());
        assert_eq!(op.symbol(), "<<=");
        assert!(Operator::from_token_kind(TokenKind::Minus)
            .unwrap()
            .is_prefix());
        assert_eq!(Operator::from_token_kind(TokenKind::Semicolon), None);
    }
}
