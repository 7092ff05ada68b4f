//! Comparable entities: elements, types and annotations of one snapshot

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::model::{Annotation, AnnotationId, Element, ElementId, TypeId, TypeInfo};
use crate::snapshot::{NodeRef, Snapshot, SnapshotKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Item {
    Element(ElementId),
    Type(TypeId),
    Annotation(AnnotationId),
}

/// Anything the matcher can compare. Identity is (snapshot key, item).
#[derive(Clone, Copy)]
pub struct Entity<'s> {
    snapshot: &'s Snapshot,
    item: Item,
}

impl<'s> Entity<'s> {
    pub fn element(snapshot: &'s Snapshot, id: ElementId) -> Self {
        Entity { snapshot, item: Item::Element(id) }
    }

    pub fn of_type(snapshot: &'s Snapshot, id: TypeId) -> Self {
        Entity { snapshot, item: Item::Type(id) }
    }

    pub fn annotation(snapshot: &'s Snapshot, id: AnnotationId) -> Self {
        Entity { snapshot, item: Item::Annotation(id) }
    }

    pub fn snapshot(self) -> &'s Snapshot {
        self.snapshot
    }

    pub fn as_element(self) -> Option<&'s Element> {
        match self.item {
            Item::Element(id) => self.snapshot.element(id),
            _ => None,
        }
    }

    pub fn as_type(self) -> Option<&'s TypeInfo> {
        match self.item {
            Item::Type(id) => Some(self.snapshot.type_info(id)),
            _ => None,
        }
    }

    pub fn as_annotation(self) -> Option<&'s Annotation> {
        match self.item {
            Item::Annotation(id) => Some(self.snapshot.annotation(id)),
            _ => None,
        }
    }

    /// A related element of the same snapshot.
    pub fn to_element(self, id: ElementId) -> Entity<'s> {
        Entity::element(self.snapshot, id)
    }

    /// A related type of the same snapshot.
    pub fn to_type(self, id: TypeId) -> Entity<'s> {
        Entity::of_type(self.snapshot, id)
    }

    /// A related annotation of the same snapshot.
    pub fn to_annotation(self, id: AnnotationId) -> Entity<'s> {
        Entity::annotation(self.snapshot, id)
    }

    fn identity(&self) -> (SnapshotKey, Item) {
        (self.snapshot.key(), self.item)
    }
}

impl<'s> From<NodeRef<'s>> for Entity<'s> {
    fn from(node: NodeRef<'s>) -> Self {
        Entity::element(node.snapshot(), node.id())
    }
}

impl PartialEq for Entity<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Entity<'_> {}

impl PartialOrd for Entity<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl Hash for Entity<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl std::fmt::Debug for Entity<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.item {
            Item::Element(id) => match self.as_element() {
                Some(element) => write!(f, "{}{}({})", self.snapshot.name(), id, element.unique_name),
                None => write!(f, "{}{}(?)", self.snapshot.name(), id),
            },
            Item::Type(id) => write!(f, "{}:type#{}", self.snapshot.name(), id.0),
            Item::Annotation(id) => write!(f, "{}:annotation#{}", self.snapshot.name(), id.0),
        }
    }
}
