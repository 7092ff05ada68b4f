//! Capability aspects: per-facet structural hash and equality rules
//!
//! Every aspect belongs to one capability. It takes part in a comparison only
//! when both entities expose that capability; entities whose capability sets
//! differ are never equal. `Similar` compares identity-defining attributes,
//! `Identical` compares those plus everything that makes up the content.
//! Links to elements (type targets, dependency targets) are always followed
//! in `Similar` mode.
//!
//! Partial hashes never recurse into other entities, which keeps them
//! well defined on cyclic structures. They only read data that the matching
//! `partial_equal` compares, so equal entities hash equal.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::entity::Entity;
use crate::matcher::{EntityMatcher, EntityWrapper, MatchMode};
use crate::model::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    Named,
    Annotated,
    Modified,
    Parameterized,
    Typed,
    ClassLike,
    FieldLike,
    MethodLike,
    Dependent,
    Primitive,
    Reference,
    Array,
    Variable,
    Wildcard,
    Instance,
}

impl Aspect {
    /// All aspects in evaluation order.
    pub const ALL: [Aspect; 15] = [
        Aspect::Named,
        Aspect::Annotated,
        Aspect::Modified,
        Aspect::Parameterized,
        Aspect::Typed,
        Aspect::ClassLike,
        Aspect::FieldLike,
        Aspect::MethodLike,
        Aspect::Dependent,
        Aspect::Primitive,
        Aspect::Reference,
        Aspect::Array,
        Aspect::Variable,
        Aspect::Wildcard,
        Aspect::Instance,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Whether `entity` exposes the capability this aspect compares.
    pub fn applies_to(self, entity: Entity<'_>) -> bool {
        if let Some(element) = entity.as_element() {
            let facets = &element.facets;
            return match self {
                Aspect::Named | Aspect::Dependent => true,
                Aspect::Annotated => facets.annotations.is_some(),
                Aspect::Modified => facets.modifiers.is_some(),
                Aspect::Parameterized => facets.type_parameters.is_some(),
                Aspect::Typed => facets.ty.is_some(),
                Aspect::ClassLike => facets.class_like.is_some(),
                Aspect::FieldLike => facets.field_like.is_some(),
                Aspect::MethodLike => facets.method_like.is_some(),
                _ => false,
            };
        }
        if let Some(info) = entity.as_type() {
            return match (self, &info.kind) {
                (Aspect::Annotated, _) => info.annotations.is_some(),
                (Aspect::Primitive, TypeKind::Primitive { .. })
                | (Aspect::Reference, TypeKind::Reference { .. })
                | (Aspect::Array, TypeKind::Array { .. })
                | (Aspect::Variable, TypeKind::Variable { .. })
                | (Aspect::Wildcard, TypeKind::Wildcard { .. }) => true,
                _ => false,
            };
        }
        self == Aspect::Instance && entity.as_annotation().is_some()
    }

    pub fn partial_hash(self, entity: Entity<'_>, mode: MatchMode) -> u64 {
        let identical = mode == MatchMode::Identical;
        if let Some(element) = entity.as_element() {
            let facets = &element.facets;
            return match self {
                Aspect::Named if identical => hash_of(&(
                    element.kind,
                    &element.unique_name,
                    &element.qualified_name,
                    &element.name,
                )),
                Aspect::Named => hash_of(&(element.kind, &element.unique_name)),
                Aspect::Annotated if identical => len_of(facets.annotations.as_deref()),
                Aspect::Modified if identical => {
                    facets.modifiers.map(|m| m.bits() as u64).unwrap_or_default()
                }
                Aspect::Parameterized => len_of(facets.type_parameters.as_deref()),
                Aspect::Typed if identical => {
                    facets.ty.map(|ty| type_shape(entity.to_type(ty))).unwrap_or_default()
                }
                Aspect::ClassLike => match &facets.class_like {
                    Some(class_like) if identical => hash_of(&(
                        &class_like.binary_name,
                        class_like.superclass.is_some(),
                        class_like.interfaces.len(),
                    )),
                    Some(class_like) => hash_of(&class_like.binary_name),
                    None => 0,
                },
                Aspect::FieldLike if identical => facets
                    .field_like
                    .as_ref()
                    .map(|f| hash_of(&f.initializer))
                    .unwrap_or_default(),
                Aspect::MethodLike => match &facets.method_like {
                    Some(method) => {
                        let shapes: Vec<u64> = method
                            .parameters
                            .iter()
                            .map(|p| type_shape(entity.to_type(p.ty)))
                            .collect();
                        if identical {
                            let names: Vec<&str> = method.parameters.iter().map(|p| p.name.as_str()).collect();
                            hash_of(&(
                                shapes,
                                names,
                                method.exceptions.len(),
                                &method.body,
                                &method.default_value,
                            ))
                        } else {
                            hash_of(&shapes)
                        }
                    }
                    None => 0,
                },
                Aspect::Dependent if identical => {
                    let snapshot = entity.snapshot();
                    snapshot
                        .dependencies_to(element.id)
                        .fold(0u64, |code, (_, counts)| code.wrapping_add(hash_of(counts)))
                        .wrapping_add(snapshot.dependencies_to(element.id).count() as u64)
                }
                _ => 0,
            };
        }
        if let Some(info) = entity.as_type() {
            return match (self, &info.kind) {
                (Aspect::Annotated, _) if identical => len_of(info.annotations.as_deref()),
                (Aspect::Primitive, TypeKind::Primitive { name }) => hash_of(name),
                (Aspect::Reference, TypeKind::Reference { name, target, arguments }) => {
                    if identical {
                        hash_of(&(name, target.is_some(), arguments.len()))
                    } else {
                        hash_of(&(name, target.is_some()))
                    }
                }
                (Aspect::Variable, TypeKind::Variable { name, bounds }) => {
                    if identical {
                        hash_of(&(name, bounds.len()))
                    } else {
                        hash_of(name)
                    }
                }
                (Aspect::Wildcard, TypeKind::Wildcard { bound }) => hash_of(&bound.map(|b| b.kind)),
                _ => 0,
            };
        }
        match (self, entity.as_annotation()) {
            (Aspect::Instance, Some(annotation)) => {
                let shape = type_shape(entity.to_type(annotation.annotation_type));
                if identical {
                    let names: Vec<&str> = annotation.values.iter().map(|e| e.name.as_str()).collect();
                    hash_of(&(shape, names))
                } else {
                    shape
                }
            }
            _ => 0,
        }
    }

    pub fn partial_equal<'s>(
        self,
        a: Entity<'s>,
        b: Entity<'s>,
        mode: MatchMode,
        matcher: &EntityMatcher<'s>,
    ) -> bool {
        let identical = mode == MatchMode::Identical;
        match self {
            Aspect::Named => {
                let (Some(x), Some(y)) = (a.as_element(), b.as_element()) else {
                    return false;
                };
                x.kind == y.kind
                    && x.unique_name == y.unique_name
                    && (!identical || (x.qualified_name == y.qualified_name && x.name == y.name))
            }
            Aspect::Annotated => {
                if !identical {
                    return true;
                }
                let (Some(x), Some(y)) = (annotations_of(a), annotations_of(b)) else {
                    return false;
                };
                matcher.match_non_ordered(
                    x.iter().map(|&id| a.to_annotation(id)),
                    y.iter().map(|&id| b.to_annotation(id)),
                    MatchMode::Identical,
                )
            }
            Aspect::Modified => {
                let (Some(x), Some(y)) = (a.as_element(), b.as_element()) else {
                    return false;
                };
                !identical || x.facets.modifiers == y.facets.modifiers
            }
            Aspect::Parameterized => {
                let (Some(x), Some(y)) = (
                    a.as_element().and_then(|e| e.facets.type_parameters.as_ref()),
                    b.as_element().and_then(|e| e.facets.type_parameters.as_ref()),
                ) else {
                    return false;
                };
                matcher.match_ordered(
                    x.iter().map(|&ty| a.to_type(ty)),
                    y.iter().map(|&ty| b.to_type(ty)),
                    mode,
                )
            }
            Aspect::Typed => {
                if !identical {
                    return true;
                }
                let (Some(x), Some(y)) = (
                    a.as_element().and_then(|e| e.facets.ty),
                    b.as_element().and_then(|e| e.facets.ty),
                ) else {
                    return false;
                };
                matcher.matches(a.to_type(x), b.to_type(y), MatchMode::Identical)
            }
            Aspect::ClassLike => {
                let (Some(x), Some(y)) = (
                    a.as_element().and_then(|e| e.facets.class_like.as_ref()),
                    b.as_element().and_then(|e| e.facets.class_like.as_ref()),
                ) else {
                    return false;
                };
                if x.binary_name != y.binary_name {
                    return false;
                }
                if !identical {
                    return true;
                }
                let superclass_equal = match (x.superclass, y.superclass) {
                    (None, None) => true,
                    (Some(sx), Some(sy)) => matcher.matches(a.to_type(sx), b.to_type(sy), MatchMode::Identical),
                    _ => false,
                };
                superclass_equal
                    && matcher.match_ordered(
                        x.interfaces.iter().map(|&ty| a.to_type(ty)),
                        y.interfaces.iter().map(|&ty| b.to_type(ty)),
                        MatchMode::Identical,
                    )
            }
            Aspect::FieldLike => {
                let (Some(x), Some(y)) = (
                    a.as_element().and_then(|e| e.facets.field_like.as_ref()),
                    b.as_element().and_then(|e| e.facets.field_like.as_ref()),
                ) else {
                    return false;
                };
                !identical || x.initializer == y.initializer
            }
            Aspect::MethodLike => {
                let (Some(x), Some(y)) = (
                    a.as_element().and_then(|e| e.facets.method_like.as_ref()),
                    b.as_element().and_then(|e| e.facets.method_like.as_ref()),
                ) else {
                    return false;
                };
                let parameters_equal = matcher.match_ordered(
                    x.parameters.iter().map(|p| a.to_type(p.ty)),
                    y.parameters.iter().map(|p| b.to_type(p.ty)),
                    mode,
                );
                if !parameters_equal || !identical {
                    return parameters_equal;
                }
                x.body == y.body
                    && x.default_value == y.default_value
                    && x.parameters.iter().map(|p| &p.name).eq(y.parameters.iter().map(|p| &p.name))
                    && matcher.match_ordered(
                        x.exceptions.iter().map(|&ty| a.to_type(ty)),
                        y.exceptions.iter().map(|&ty| b.to_type(ty)),
                        MatchMode::Identical,
                    )
            }
            Aspect::Dependent => !identical || dependencies_equal(a, b, matcher),
            Aspect::Primitive => match (type_kind(a), type_kind(b)) {
                (Some(TypeKind::Primitive { name: x }), Some(TypeKind::Primitive { name: y })) => x == y,
                _ => false,
            },
            Aspect::Reference => match (type_kind(a), type_kind(b)) {
                (
                    Some(TypeKind::Reference { name: nx, target: tx, arguments: ax }),
                    Some(TypeKind::Reference { name: ny, target: ty, arguments: ay }),
                ) => {
                    let targets_equal = match (tx, ty) {
                        (None, None) => true,
                        (Some(tx), Some(ty)) => {
                            matcher.matches(a.to_element(*tx), b.to_element(*ty), MatchMode::Similar)
                        }
                        _ => false,
                    };
                    nx == ny
                        && targets_equal
                        && (!identical
                            || matcher.match_ordered(
                                ax.iter().map(|&t| a.to_type(t)),
                                ay.iter().map(|&t| b.to_type(t)),
                                MatchMode::Identical,
                            ))
                }
                _ => false,
            },
            Aspect::Array => match (type_kind(a), type_kind(b)) {
                (Some(TypeKind::Array { component: x }), Some(TypeKind::Array { component: y })) => {
                    matcher.matches(a.to_type(*x), b.to_type(*y), mode)
                }
                _ => false,
            },
            Aspect::Variable => match (type_kind(a), type_kind(b)) {
                (
                    Some(TypeKind::Variable { name: nx, bounds: bx }),
                    Some(TypeKind::Variable { name: ny, bounds: by }),
                ) => {
                    nx == ny
                        && (!identical
                            || matcher.match_ordered(
                                bx.iter().map(|&t| a.to_type(t)),
                                by.iter().map(|&t| b.to_type(t)),
                                MatchMode::Identical,
                            ))
                }
                _ => false,
            },
            Aspect::Wildcard => match (type_kind(a), type_kind(b)) {
                (Some(TypeKind::Wildcard { bound: x }), Some(TypeKind::Wildcard { bound: y })) => match (x, y) {
                    (None, None) => true,
                    (Some(x), Some(y)) => {
                        x.kind == y.kind && matcher.matches(a.to_type(x.ty), b.to_type(y.ty), mode)
                    }
                    _ => false,
                },
                _ => false,
            },
            Aspect::Instance => {
                let (Some(x), Some(y)) = (a.as_annotation(), b.as_annotation()) else {
                    return false;
                };
                let type_mode = if identical { MatchMode::Identical } else { MatchMode::Similar };
                if !matcher.matches(a.to_type(x.annotation_type), b.to_type(y.annotation_type), type_mode) {
                    return false;
                }
                !identical
                    || (x.values.len() == y.values.len()
                        && x.values.iter().zip(&y.values).all(|(ex, ey)| {
                            ex.name == ey.name && values_equal(a, &ex.value, b, &ey.value, matcher)
                        }))
            }
        }
    }
}

/// Bit set of the aspects that apply to `entity`.
pub fn capabilities(entity: Entity<'_>) -> u32 {
    Aspect::ALL
        .into_iter()
        .filter(|aspect| aspect.applies_to(entity))
        .fold(0, |mask, aspect| mask | aspect.bit())
}

/// Polynomial combination of all applicable partial hashes, seeded with the
/// capability set.
pub fn structural_hash(entity: Entity<'_>, mode: MatchMode) -> u64 {
    let mut code = capabilities(entity) as u64;
    for aspect in Aspect::ALL {
        if aspect.applies_to(entity) {
            code = code.wrapping_mul(31).wrapping_add(aspect.partial_hash(entity, mode));
        }
    }
    code
}

/// Capability sets equal and every applicable aspect equal.
pub fn structural_equal<'s>(a: Entity<'s>, b: Entity<'s>, mode: MatchMode, matcher: &EntityMatcher<'s>) -> bool {
    let mask = capabilities(a);
    if mask != capabilities(b) {
        return false;
    }
    Aspect::ALL
        .into_iter()
        .filter(|aspect| mask & aspect.bit() != 0)
        .all(|aspect| aspect.partial_equal(a, b, mode, matcher))
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn len_of<T>(items: Option<&[T]>) -> u64 {
    items.map(|items| items.len() as u64).unwrap_or_default()
}

fn type_kind(entity: Entity<'_>) -> Option<&TypeKind> {
    entity.as_type().map(|info| &info.kind)
}

fn annotations_of(entity: Entity<'_>) -> Option<&[AnnotationId]> {
    match entity.as_element() {
        Some(element) => element.facets.annotations.as_deref(),
        None => entity.as_type().and_then(|info| info.annotations.as_deref()),
    }
}

/// Local shape of a type: its variant plus its name, where it has one.
fn type_shape(entity: Entity<'_>) -> u64 {
    match type_kind(entity) {
        Some(TypeKind::Primitive { name }) => hash_of(&(0u8, name)),
        Some(TypeKind::Reference { name, .. }) => hash_of(&(1u8, name)),
        Some(TypeKind::Array { .. }) => hash_of(&2u8),
        Some(TypeKind::Variable { name, .. }) => hash_of(&(3u8, name)),
        Some(TypeKind::Wildcard { .. }) => hash_of(&4u8),
        None => 0,
    }
}

/// Outgoing dependencies as a multiset keyed by (similar target, counts).
fn dependencies_equal<'s>(a: Entity<'s>, b: Entity<'s>, matcher: &EntityMatcher<'s>) -> bool {
    let (Some(x), Some(y)) = (a.as_element(), b.as_element()) else {
        return false;
    };
    let (left, right) = (a.snapshot().dependencies_to(x.id), b.snapshot().dependencies_to(y.id));

    let mut multiplicity: HashMap<(EntityWrapper<'_, 's>, DependencyCounts), usize> = HashMap::new();
    let mut outstanding = 0usize;
    for (target, counts) in left {
        let key = (matcher.wrap(a.to_element(target), MatchMode::Similar), *counts);
        *multiplicity.entry(key).or_insert(0) += 1;
        outstanding += 1;
    }
    for (target, counts) in right {
        let key = (matcher.wrap(b.to_element(target), MatchMode::Similar), *counts);
        match multiplicity.get_mut(&key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                outstanding -= 1;
            }
            _ => return false,
        }
    }
    outstanding == 0
}

fn values_equal<'s>(
    a: Entity<'s>,
    x: &AnnotationValue,
    b: Entity<'s>,
    y: &AnnotationValue,
    matcher: &EntityMatcher<'s>,
) -> bool {
    match (x, y) {
        (AnnotationValue::Literal(x), AnnotationValue::Literal(y)) => x == y,
        (AnnotationValue::Type(x), AnnotationValue::Type(y)) => {
            matcher.matches(a.to_type(*x), b.to_type(*y), MatchMode::Identical)
        }
        (
            AnnotationValue::EnumConstant { ty: type_x, name: name_x },
            AnnotationValue::EnumConstant { ty: type_y, name: name_y },
        ) => name_x == name_y && matcher.matches(a.to_type(*type_x), b.to_type(*type_y), MatchMode::Identical),
        (AnnotationValue::Annotation(x), AnnotationValue::Annotation(y)) => {
            matcher.matches(a.to_annotation(*x), b.to_annotation(*y), MatchMode::Identical)
        }
        (AnnotationValue::Array(xs), AnnotationValue::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(a, x, b, y, matcher))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Snapshot, SnapshotBuilder};

    fn method_snapshot(name: &str, body: &str, modifiers: Modifiers) -> Snapshot {
        let mut builder = SnapshotBuilder::new(name);
        let class = builder
            .add_element(ElementId::ROOT, ElementKind::Class, "com.acme.Foo")
            .unwrap();
        builder.facets_mut(class).unwrap().class_like = Some(ClassLike {
            binary_name: "com.acme.Foo".to_string(),
            superclass: None,
            interfaces: vec![],
        });
        let int = builder.add_type(TypeInfo::primitive("int"));
        let method = builder
            .add_element(class, ElementKind::Method, "com.acme.Foo.bar")
            .unwrap();
        builder.set_unique_name(method, "com.acme.Foo.bar(int)").unwrap();
        let facets = builder.facets_mut(method).unwrap();
        facets.modifiers = Some(modifiers);
        facets.ty = Some(int);
        facets.method_like = Some(MethodLike {
            parameters: vec![Parameter { name: "x".to_string(), ty: int }],
            exceptions: vec![],
            body: Some(body.to_string()),
            default_value: None,
        });
        builder.build().unwrap()
    }

    #[test]
    fn test_capabilities_follow_facets() {
        let snapshot = method_snapshot("s", "return x;", Modifiers::empty());
        let root = Entity::element(&snapshot, ElementId::ROOT);
        let method = Entity::element(&snapshot, ElementId(2));
        let int = Entity::of_type(&snapshot, TypeId(0));

        assert_eq!(capabilities(root), Aspect::Named.bit() | Aspect::Dependent.bit());
        assert!(Aspect::MethodLike.applies_to(method));
        assert!(Aspect::Typed.applies_to(method));
        assert!(!Aspect::ClassLike.applies_to(method));
        assert_eq!(capabilities(int), Aspect::Primitive.bit());
    }

    #[test]
    fn test_body_change_is_similar_but_not_identical() {
        let before = method_snapshot("before", "return x;", Modifiers::empty());
        let after = method_snapshot("after", "return x + 1;", Modifiers::empty());
        let matcher = EntityMatcher::new();
        let a = Entity::element(&before, ElementId(2));
        let b = Entity::element(&after, ElementId(2));

        assert!(structural_equal(a, b, MatchMode::Similar, &matcher));
        assert!(!structural_equal(a, b, MatchMode::Identical, &matcher));
        assert_eq!(
            structural_hash(a, MatchMode::Similar),
            structural_hash(b, MatchMode::Similar)
        );
    }

    #[test]
    fn test_modifier_change_is_only_seen_by_identical() {
        let before = method_snapshot("before", "return x;", Modifiers::empty().with(Modifier::Public));
        let after = method_snapshot("after", "return x;", Modifiers::empty().with(Modifier::Private));
        let matcher = EntityMatcher::new();
        let a = Entity::element(&before, ElementId(2));
        let b = Entity::element(&after, ElementId(2));

        assert!(matcher.matches(a, b, MatchMode::Similar));
        assert!(!matcher.matches(a, b, MatchMode::Identical));
    }

    #[test]
    fn test_elements_and_types_never_match() {
        let snapshot = method_snapshot("s", "return x;", Modifiers::empty());
        let matcher = EntityMatcher::new();
        let element = Entity::element(&snapshot, ElementId(1));
        let ty = Entity::of_type(&snapshot, TypeId(0));
        assert!(!matcher.matches(element, ty, MatchMode::Similar));
    }
}
