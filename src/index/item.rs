//! Rows of the flat item table and the function-signature atoms they carry.

use crate::error::CorruptIndex;
use std::fmt;
use std::sync::Arc;

/// Kind of a documented item.
///
/// The discriminant is significant: payloads encode kinds by ordinal and the
/// ranker breaks ties by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ItemType {
    Keyword = 0,
    Primitive,
    Module,
    ExternCrate,
    Import,
    Struct,
    Enum,
    Function,
    TypeAlias,
    Static,
    Trait,
    Impl,
    TyMethod,
    Method,
    StructField,
    Variant,
    Macro,
    AssocType,
    Constant,
    AssocConst,
    Union,
    ForeignType,
    Existential,
    Attr,
    Derive,
    TraitAlias,
    Generic,
}

impl ItemType {
    pub const ALL: [Self; 27] = [
        Self::Keyword,
        Self::Primitive,
        Self::Module,
        Self::ExternCrate,
        Self::Import,
        Self::Struct,
        Self::Enum,
        Self::Function,
        Self::TypeAlias,
        Self::Static,
        Self::Trait,
        Self::Impl,
        Self::TyMethod,
        Self::Method,
        Self::StructField,
        Self::Variant,
        Self::Macro,
        Self::AssocType,
        Self::Constant,
        Self::AssocConst,
        Self::Union,
        Self::ForeignType,
        Self::Existential,
        Self::Attr,
        Self::Derive,
        Self::TraitAlias,
        Self::Generic,
    ];

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// Decodes the one-character tag used in a crate's `t` string.
    pub fn from_code(code: char) -> Result<Self, CorruptIndex> {
        u32::from(code)
            .checked_sub(u32::from('A'))
            .and_then(|n| Self::from_ordinal(n as usize))
            .ok_or(CorruptIndex::UnknownItemType(code))
    }

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Name used in URLs and in `filter:` query prefixes.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Primitive => "primitive",
            Self::Module => "mod",
            Self::ExternCrate => "externcrate",
            Self::Import => "import",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Function => "fn",
            Self::TypeAlias => "type",
            Self::Static => "static",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::TyMethod => "tymethod",
            Self::Method => "method",
            Self::StructField => "structfield",
            Self::Variant => "variant",
            Self::Macro => "macro",
            Self::AssocType => "associatedtype",
            Self::Constant => "constant",
            Self::AssocConst => "associatedconstant",
            Self::Union => "union",
            Self::ForeignType => "foreigntype",
            Self::Existential => "existential",
            Self::Attr => "attr",
            Self::Derive => "derive",
            Self::TraitAlias => "traitalias",
            Self::Generic => "generic",
        }
    }

    /// Human-readable kind for result listings.
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Primitive => "primitive type",
            Self::Module => "module",
            Self::ExternCrate => "extern crate",
            Self::Import => "re-export",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Function => "function",
            Self::TypeAlias => "type alias",
            Self::Static => "static",
            Self::Trait => "trait",
            Self::Impl => "",
            Self::TyMethod => "trait method",
            Self::Method => "method",
            Self::StructField => "struct field",
            Self::Variant => "enum variant",
            Self::Macro => "macro",
            Self::AssocType => "assoc type",
            Self::Constant => "constant",
            Self::AssocConst => "assoc const",
            Self::Union => "union",
            Self::ForeignType => "foreign type",
            Self::Existential => "existential type",
            Self::Attr => "attribute macro",
            Self::Derive => "derive macro",
            Self::TraitAlias => "trait alias",
            Self::Generic => "generic",
        }
    }

    /// Parses a `filter:` prefix. `const` is accepted for `constant`.
    pub fn from_filter_name(name: &str) -> Option<Self> {
        let name = if name == "const" { "constant" } else { name };
        Self::ALL.into_iter().find(|ty| ty.as_str() == name)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ItemType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Interned lowercase type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameId(pub u32);

/// Identity of a signature atom or of a resolved query element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TypeRef {
    /// Matches nothing on the query side; a placeholder in signatures.
    #[default]
    Wildcard,
    /// A concrete interned path.
    Named(NameId),
    /// A generic parameter, numbered from 1. For signatures the number selects
    /// the where-clause entry; for queries it is scoped to one query.
    Generic(u32),
}

impl TypeRef {
    pub const fn is_generic(self) -> bool {
        matches!(self, Self::Generic(_))
    }

    pub const fn name(self) -> Option<NameId> {
        match self {
            Self::Named(id) => Some(id),
            _ => None,
        }
    }
}

/// One node of a decoded function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub id: TypeRef,
    pub ty: Option<ItemType>,
    pub path: Option<Arc<str>>,
    pub exact_path: Option<Arc<str>>,
    pub generics: Vec<Arc<FunctionType>>,
    /// Associated-type bindings, keyed by the interned associated type name.
    pub bindings: Vec<(NameId, Vec<Arc<FunctionType>>)>,
}

impl FunctionType {
    pub fn binding(&self, key: NameId) -> Option<&[Arc<Self>]> {
        self.bindings
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, constraints)| constraints.as_slice())
    }

    pub fn has_parameters(&self) -> bool {
        !self.generics.is_empty() || !self.bindings.is_empty()
    }

    /// Generics followed by every binding's constraints, the list a node is
    /// replaced with when it is unboxed.
    pub fn unboxed(&self) -> Vec<Arc<Self>> {
        self.generics
            .iter()
            .chain(self.bindings.iter().flat_map(|(_, c)| c.iter()))
            .cloned()
            .collect()
    }
}

/// Inputs, output and where-clause of a function-like item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionSignature {
    pub inputs: Vec<Arc<FunctionType>>,
    pub output: Vec<Arc<FunctionType>>,
    /// Bounds of generic parameter `n` live at index `n - 1`.
    pub where_clause: Vec<Vec<Arc<FunctionType>>>,
}

impl FunctionSignature {
    /// Every top-level type the fingerprint covers.
    pub fn all_types(&self) -> impl Iterator<Item = &Arc<FunctionType>> {
        self.inputs
            .iter()
            .chain(&self.output)
            .chain(self.where_clause.iter().flatten())
    }
}

/// Entry of a crate's path table, used for parents and for signature atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub ty: ItemType,
    pub name: String,
    pub path: Option<Arc<str>>,
    pub exact_path: Option<Arc<str>>,
}

/// Position of an item's description inside the crate's description shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescLocation {
    pub shard: usize,
    pub index: usize,
}

/// One documented entity.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: usize,
    pub crate_name: Arc<str>,
    pub ty: ItemType,
    pub name: String,
    /// Lowercased name.
    pub word: String,
    /// Lowercased name without underscores.
    pub normalized_name: String,
    pub path: Arc<str>,
    pub exact_path: Arc<str>,
    pub parent: Option<Arc<PathEntry>>,
    pub signature: Option<Arc<FunctionSignature>>,
    pub bit_index: u32,
    pub impl_disambiguator: Option<String>,
    pub desc: DescLocation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    #[rstest]
    #[case('A', ItemType::Keyword)]
    #[case('H', ItemType::Function)]
    #[case('K', ItemType::Trait)]
    #[case('M', ItemType::TyMethod)]
    #[case('Q', ItemType::Macro)]
    #[case('[', ItemType::Generic)]
    fn decodes_type_codes(#[case] code: char, #[case] expected: ItemType) {
        let_assert!(Ok(ty) = ItemType::from_code(code));
        check!(ty == expected);
    }

    #[rstest]
    #[case('@')]
    #[case('\\')]
    #[case('a')]
    fn rejects_unknown_codes(#[case] code: char) {
        let_assert!(Err(CorruptIndex::UnknownItemType(c)) = ItemType::from_code(code));
        check!(c == code);
    }

    #[test]
    fn ordinals_follow_declaration_order() {
        for (i, ty) in ItemType::ALL.into_iter().enumerate() {
            check!(ty.ordinal() == i);
            check!(ItemType::from_filter_name(ty.as_str()) == Some(ty));
        }
        check!(ItemType::Macro.ordinal() == 16);
        check!(ItemType::Generic.ordinal() == 26);
    }

    #[test]
    fn const_filter_is_constant() {
        check!(ItemType::from_filter_name("const") == Some(ItemType::Constant));
        check!(ItemType::from_filter_name("function").is_none());
    }
}
