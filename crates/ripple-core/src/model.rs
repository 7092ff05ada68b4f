//! Core data structures for program structure snapshots

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, 0-based identifier of an element inside one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl ElementId {
    /// The synthetic root of every snapshot.
    pub const ROOT: ElementId = ElementId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index into a snapshot's type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index into a snapshot's annotation arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u32);

impl AnnotationId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Discriminates what kind of program entity an element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    // ── Structural ──────────────────────────────────────────
    Root,
    Package,

    // ── Type declarations ───────────────────────────────────
    Class,
    Interface,
    Enum,
    AnnotationType,

    // ── Members ─────────────────────────────────────────────
    Method,
    Constructor,
    Field,
    EnumConstant,
    Initializer,
}

impl ElementKind {
    pub const ALL: [ElementKind; 11] = [
        ElementKind::Root,
        ElementKind::Package,
        ElementKind::Class,
        ElementKind::Interface,
        ElementKind::Enum,
        ElementKind::AnnotationType,
        ElementKind::Method,
        ElementKind::Constructor,
        ElementKind::Field,
        ElementKind::EnumConstant,
        ElementKind::Initializer,
    ];

    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            ElementKind::Class | ElementKind::Interface | ElementKind::Enum | ElementKind::AnnotationType
        )
    }

    pub fn is_member(self) -> bool {
        matches!(
            self,
            ElementKind::Method
                | ElementKind::Constructor
                | ElementKind::Field
                | ElementKind::EnumConstant
                | ElementKind::Initializer
        )
    }
}

/// What kind of relationship a dependency occurrence represents.
///
/// The declaration order is the index order of [`DependencyCounts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Use,
    Member,
    Inheritance,
    Invocation,
    Override,
    Access,
}

impl DependencyKind {
    pub const COUNT: usize = 6;

    pub const ALL: [DependencyKind; DependencyKind::COUNT] = [
        DependencyKind::Use,
        DependencyKind::Member,
        DependencyKind::Inheritance,
        DependencyKind::Invocation,
        DependencyKind::Override,
        DependencyKind::Access,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DependencyKind::Use => "use",
            DependencyKind::Member => "member",
            DependencyKind::Inheritance => "inheritance",
            DependencyKind::Invocation => "invocation",
            DependencyKind::Override => "override",
            DependencyKind::Access => "access",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Occurrence counts of one dependency edge, indexed by [`DependencyKind`].
///
/// Snapshots intern these, so edges with equal counts share one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DependencyCounts([u32; DependencyKind::COUNT]);

impl DependencyCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a vector with a single non-zero kind.
    pub fn of(kind: DependencyKind, count: u32) -> Self {
        Self::new().with(kind, count)
    }

    pub fn with(mut self, kind: DependencyKind, count: u32) -> Self {
        self.0[kind.index()] = count;
        self
    }

    pub fn get(&self, kind: DependencyKind) -> u32 {
        self.0[kind.index()]
    }

    pub fn add(&mut self, kind: DependencyKind, count: u32) {
        let slot = &mut self.0[kind.index()];
        *slot = slot.saturating_add(count);
    }

    /// Accumulate another vector into this one.
    pub fn merge(&mut self, other: &DependencyCounts) {
        for kind in DependencyKind::ALL {
            self.add(kind, other.get(kind));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|&c| c as u64).sum()
    }

    /// Non-zero (kind, count) pairs in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (DependencyKind, u32)> + '_ {
        DependencyKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .filter(|&(_, count)| count > 0)
    }
}

/// A single declaration modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Public,
    Protected,
    Private,
    Static,
    Final,
    Abstract,
    Synchronized,
    Native,
    Transient,
    Volatile,
    Default,
    Strictfp,
}

impl Modifier {
    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Modifier bit set of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u32);

impl Modifiers {
    pub fn empty() -> Self {
        Modifiers(0)
    }

    pub fn with(self, modifier: Modifier) -> Self {
        Modifiers(self.0 | modifier.bit())
    }

    pub fn contains(self, modifier: Modifier) -> bool {
        self.0 & modifier.bit() != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        iter.into_iter().fold(Modifiers::empty(), Modifiers::with)
    }
}

const ALL_MODIFIERS: [Modifier; 12] = [
    Modifier::Public,
    Modifier::Protected,
    Modifier::Private,
    Modifier::Static,
    Modifier::Final,
    Modifier::Abstract,
    Modifier::Synchronized,
    Modifier::Native,
    Modifier::Transient,
    Modifier::Volatile,
    Modifier::Default,
    Modifier::Strictfp,
];

// Documents spell modifiers out as a list of names.
impl Serialize for Modifiers {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names: Vec<Modifier> = ALL_MODIFIERS.into_iter().filter(|m| self.contains(*m)).collect();
        names.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<Modifier>::deserialize(deserializer)?;
        Ok(names.into_iter().collect())
    }
}

// ── Capability facets ───────────────────────────────────────

/// Facets of a class, interface, enum or annotation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLike {
    /// Runtime name, e.g. `com.acme.Outer$Inner`.
    pub binary_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<TypeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<TypeId>,
}

/// Facets of a field or enum constant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldLike {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeId,
}

/// Facets of a method or constructor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MethodLike {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<TypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Default value of an annotation type member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// The capabilities an element exposes. Absent facets are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Facets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<AnnotationId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<Modifiers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_parameters: Option<Vec<TypeId>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_like: Option<ClassLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_like: Option<FieldLike>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_like: Option<MethodLike>,
}

/// A single element (package, type or member) of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub parent: Option<ElementId>,
    pub children: Vec<ElementId>,
    pub name: String,
    pub qualified_name: String,
    /// Qualified name plus a signature suffix for overloaded members.
    pub unique_name: String,
    pub facets: Facets,
}

// ── Types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    Extends,
    Super,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WildcardBound {
    pub kind: BoundKind,
    #[serde(rename = "type")]
    pub ty: TypeId,
}

/// Shape of a type use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Primitive {
        name: String,
    },
    /// A class/interface type, optionally resolved to an element of the same snapshot.
    Reference {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ElementId>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        arguments: Vec<TypeId>,
    },
    Array {
        component: TypeId,
    },
    Variable {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        bounds: Vec<TypeId>,
    },
    Wildcard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bound: Option<WildcardBound>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    #[serde(flatten)]
    pub kind: TypeKind,
    /// Type-use annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<AnnotationId>>,
}

impl TypeInfo {
    pub fn new(kind: TypeKind) -> Self {
        TypeInfo { kind, annotations: None }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Primitive { name: name.into() })
    }

    pub fn reference(name: impl Into<String>, target: Option<ElementId>) -> Self {
        Self::new(TypeKind::Reference {
            name: name.into(),
            target,
            arguments: Vec::new(),
        })
    }
}

// ── Annotations ─────────────────────────────────────────────

/// Value of an annotation member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    Literal(String),
    Type(TypeId),
    EnumConstant {
        #[serde(rename = "type")]
        ty: TypeId,
        name: String,
    },
    Annotation(AnnotationId),
    Array(Vec<AnnotationValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub name: String,
    pub value: AnnotationValue,
}

/// An annotation instance attached to an element or type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub annotation_type: TypeId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<AnnotationEntry>,
}
