//! Frozen snapshot graph built on petgraph::DiGraph, plus its builder

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use petgraph::Direction;
use petgraph::graph::{DiGraph, Edges, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Directed;
use serde::Serialize;

use crate::error::{Result, RippleError};
use crate::model::*;

static NEXT_SNAPSHOT_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a frozen snapshot (its root identity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SnapshotKey(u64);

/// One immutable version of the element graph.
///
/// Node index `i` holds the element with id `i`; an edge `a -> b` means
/// `a` depends on `b`.
pub struct Snapshot {
    key: SnapshotKey,
    name: String,
    graph: DiGraph<Element, Arc<DependencyCounts>>,
    types: Vec<TypeInfo>,
    annotations: Vec<Annotation>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("element_count", &self.graph.node_count())
            .field("dependency_count", &self.graph.edge_count())
            .finish()
    }
}

impl Snapshot {
    pub fn key(&self) -> SnapshotKey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of elements, root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Total number of dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            snapshot: self,
            id: ElementId::ROOT,
        }
    }

    /// Get an element by id.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.graph.node_weight(NodeIndex::new(id.index()))
    }

    pub fn node(&self, id: ElementId) -> Option<NodeRef<'_>> {
        self.element(id).map(|_| NodeRef { snapshot: self, id })
    }

    /// Iterate over all elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.graph.node_weights()
    }

    /// Iterate over handles to all elements in id order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> {
        (0..self.len() as u32).map(move |i| NodeRef {
            snapshot: self,
            id: ElementId(i),
        })
    }

    /// Get all elements of a specific kind.
    pub fn nodes_of_kind(&self, kind: ElementKind) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.nodes().filter(move |n| n.element().kind == kind)
    }

    /// Find an element by unique name (first match).
    pub fn find(&self, unique_name: &str) -> Option<NodeRef<'_>> {
        self.nodes().find(|n| n.element().unique_name == unique_name)
    }

    /// Type by id. Ids are validated when the snapshot is built.
    pub fn type_info(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.index()]
    }

    /// Annotation by id. Ids are validated when the snapshot is built.
    pub fn annotation(&self, id: AnnotationId) -> &Annotation {
        &self.annotations[id.index()]
    }

    /// Elements `id` depends on, with the edge's counts.
    pub fn dependencies_to(&self, id: ElementId) -> Dependencies<'_> {
        Dependencies {
            edges: self.graph.edges_directed(NodeIndex::new(id.index()), Direction::Outgoing),
            direction: Direction::Outgoing,
        }
    }

    /// Elements depending on `id`, with the edge's counts.
    pub fn dependencies_from(&self, id: ElementId) -> Dependencies<'_> {
        Dependencies {
            edges: self.graph.edges_directed(NodeIndex::new(id.index()), Direction::Incoming),
            direction: Direction::Incoming,
        }
    }

    /// The shared count vector of the edge `source -> target`, if any.
    pub fn dependency(&self, source: ElementId, target: ElementId) -> Option<&Arc<DependencyCounts>> {
        let edge = self
            .graph
            .find_edge(NodeIndex::new(source.index()), NodeIndex::new(target.index()))?;
        self.graph.edge_weight(edge)
    }
}

/// Iterator over the dependency edges on one side of an element.
pub struct Dependencies<'s> {
    edges: Edges<'s, Arc<DependencyCounts>, Directed>,
    direction: Direction,
}

impl<'s> Iterator for Dependencies<'s> {
    type Item = (ElementId, &'s DependencyCounts);

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.edges.next()?;
        let other = match self.direction {
            Direction::Outgoing => edge.target(),
            Direction::Incoming => edge.source(),
        };
        Some((ElementId(other.index() as u32), edge.weight().as_ref()))
    }
}

/// Handle to one element of one snapshot.
///
/// Equality and hashing use the snapshot key and the element id, so handles
/// from different snapshots never compare equal.
#[derive(Clone, Copy)]
pub struct NodeRef<'s> {
    snapshot: &'s Snapshot,
    id: ElementId,
}

impl<'s> NodeRef<'s> {
    pub fn id(self) -> ElementId {
        self.id
    }

    pub fn snapshot(self) -> &'s Snapshot {
        self.snapshot
    }

    pub fn element(self) -> &'s Element {
        &self.snapshot.graph[NodeIndex::new(self.id.index())]
    }

    pub fn unique_name(self) -> &'s str {
        &self.element().unique_name
    }

    pub fn parent(self) -> Option<NodeRef<'s>> {
        self.element().parent.map(|id| NodeRef {
            snapshot: self.snapshot,
            id,
        })
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot.key == other.snapshot.key && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl Hash for NodeRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.snapshot.key.hash(state);
        self.id.hash(state);
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}({})", self.snapshot.name, self.id, self.unique_name())
    }
}

/// Collects elements, types, annotations and dependencies, then freezes
/// them into a [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotBuilder {
    name: String,
    elements: Vec<Element>,
    types: Vec<TypeInfo>,
    annotations: Vec<Annotation>,
    dependencies: BTreeMap<(ElementId, ElementId), DependencyCounts>,
}

impl SnapshotBuilder {
    /// Start a snapshot holding only the synthetic root.
    pub fn new(name: impl Into<String>) -> Self {
        let root = Element {
            id: ElementId::ROOT,
            kind: ElementKind::Root,
            parent: None,
            children: Vec::new(),
            name: String::new(),
            qualified_name: String::new(),
            unique_name: String::new(),
            facets: Facets::default(),
        };
        SnapshotBuilder {
            name: name.into(),
            elements: vec![root],
            types: Vec::new(),
            annotations: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Add an element under `parent`. The unique name defaults to the
    /// qualified name and the simple name to its last segment.
    pub fn add_element(
        &mut self,
        parent: ElementId,
        kind: ElementKind,
        qualified_name: impl Into<String>,
    ) -> Result<ElementId> {
        if kind == ElementKind::Root {
            return Err(RippleError::Snapshot("a snapshot has exactly one root".to_string()));
        }
        let qualified_name = qualified_name.into();
        let id = ElementId(self.elements.len() as u32);
        self.element_mut(parent)?.children.push(id);

        let name = qualified_name
            .rsplit(['.', '$'])
            .next()
            .unwrap_or_default()
            .to_string();
        self.elements.push(Element {
            id,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            name,
            unique_name: qualified_name.clone(),
            qualified_name,
            facets: Facets::default(),
        });
        Ok(id)
    }

    // Structural fields stay builder-owned; callers edit through the
    // narrower setters below.
    fn element_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.elements
            .get_mut(id.index())
            .ok_or_else(|| RippleError::Snapshot(format!("unknown element {}", id)))
    }

    pub fn set_unique_name(&mut self, id: ElementId, unique_name: impl Into<String>) -> Result<()> {
        self.element_mut(id)?.unique_name = unique_name.into();
        Ok(())
    }

    pub fn facets_mut(&mut self, id: ElementId) -> Result<&mut Facets> {
        Ok(&mut self.element_mut(id)?.facets)
    }

    pub fn add_type(&mut self, info: TypeInfo) -> TypeId {
        self.types.push(info);
        TypeId(self.types.len() as u32 - 1)
    }

    pub fn type_mut(&mut self, id: TypeId) -> Result<&mut TypeInfo> {
        self.types
            .get_mut(id.index())
            .ok_or_else(|| RippleError::Snapshot(format!("unknown type {}", id.0)))
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> AnnotationId {
        self.annotations.push(annotation);
        AnnotationId(self.annotations.len() as u32 - 1)
    }

    /// Record that `source` depends on `target`. Repeated calls for the same
    /// pair accumulate into one edge.
    pub fn add_dependency(
        &mut self,
        source: ElementId,
        target: ElementId,
        counts: DependencyCounts,
    ) -> Result<()> {
        for id in [source, target] {
            if id.index() >= self.elements.len() {
                return Err(RippleError::Snapshot(format!(
                    "dependency {} -> {} references unknown element {}",
                    source, target, id
                )));
            }
        }
        if counts.is_empty() {
            return Ok(());
        }
        self.dependencies
            .entry((source, target))
            .or_default()
            .merge(&counts);
        Ok(())
    }

    /// Validate every cross reference and freeze.
    pub fn build(self) -> Result<Snapshot> {
        self.validate()?;

        let mut graph = DiGraph::with_capacity(self.elements.len(), self.dependencies.len());
        for element in self.elements {
            graph.add_node(element);
        }

        let mut interned: HashMap<DependencyCounts, Arc<DependencyCounts>> = HashMap::new();
        for ((source, target), counts) in self.dependencies {
            let shared = interned
                .entry(counts)
                .or_insert_with(|| Arc::new(counts))
                .clone();
            graph.add_edge(NodeIndex::new(source.index()), NodeIndex::new(target.index()), shared);
        }

        let key = SnapshotKey(NEXT_SNAPSHOT_KEY.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            "Froze snapshot '{}' ({:?}): {} elements, {} dependencies, {} distinct count vectors",
            self.name,
            key,
            graph.node_count(),
            graph.edge_count(),
            interned.len()
        );

        Ok(Snapshot {
            key,
            name: self.name,
            graph,
            types: self.types,
            annotations: self.annotations,
        })
    }

    fn validate(&self) -> Result<()> {
        let element_count = self.elements.len();
        let type_ok = |id: TypeId| id.index() < self.types.len();
        let annotation_ok = |id: AnnotationId| id.index() < self.annotations.len();
        let fail = |what: String| Err(RippleError::Snapshot(what));

        for (index, element) in self.elements.iter().enumerate() {
            if element.id.index() != index {
                return fail(format!("element at index {} carries id {}", index, element.id));
            }
            match (index, element.kind, element.parent) {
                (0, ElementKind::Root, None) => {}
                (0, _, _) => return fail("element #0 must be the parentless root".to_string()),
                (_, ElementKind::Root, _) => {
                    return fail(format!("element {} is a second root", element.id));
                }
                (_, _, None) => return fail(format!("element {} has no parent", element.id)),
                (_, _, Some(parent)) => {
                    let linked = self
                        .elements
                        .get(parent.index())
                        .is_some_and(|p| p.children.contains(&element.id));
                    if !linked {
                        return fail(format!(
                            "element {} is not a child of its parent {}",
                            element.id, parent
                        ));
                    }
                }
            }
            for &child in &element.children {
                let back = self.elements.get(child.index()).and_then(|c| c.parent);
                if back != Some(element.id) {
                    return fail(format!("element {} lists {} as a child it does not own", element.id, child));
                }
            }
        }

        for element in &self.elements {
            let facets = &element.facets;
            let mut types: Vec<TypeId> = Vec::new();
            types.extend(facets.type_parameters.iter().flatten());
            types.extend(facets.ty);
            if let Some(class_like) = &facets.class_like {
                types.extend(class_like.superclass);
                types.extend(&class_like.interfaces);
            }
            if let Some(method_like) = &facets.method_like {
                types.extend(method_like.parameters.iter().map(|p| p.ty));
                types.extend(&method_like.exceptions);
            }
            if let Some(bad) = types.into_iter().find(|&t| !type_ok(t)) {
                return fail(format!("element {} references unknown type {}", element.id, bad.0));
            }
            if let Some(bad) = facets.annotations.iter().flatten().find(|&&a| !annotation_ok(a)) {
                return fail(format!("element {} references unknown annotation {}", element.id, bad.0));
            }
        }

        for (index, info) in self.types.iter().enumerate() {
            let mut types: Vec<TypeId> = Vec::new();
            match &info.kind {
                TypeKind::Primitive { .. } => {}
                TypeKind::Reference { target, arguments, .. } => {
                    if let Some(target) = target {
                        if target.index() >= element_count {
                            return fail(format!("type {} targets unknown element {}", index, target));
                        }
                    }
                    types.extend(arguments);
                }
                TypeKind::Array { component } => types.push(*component),
                TypeKind::Variable { bounds, .. } => types.extend(bounds),
                TypeKind::Wildcard { bound } => types.extend(bound.map(|b| b.ty)),
            }
            if let Some(bad) = types.into_iter().find(|&t| !type_ok(t)) {
                return fail(format!("type {} references unknown type {}", index, bad.0));
            }
            if let Some(bad) = info.annotations.iter().flatten().find(|&&a| !annotation_ok(a)) {
                return fail(format!("type {} references unknown annotation {}", index, bad.0));
            }
        }

        for (index, annotation) in self.annotations.iter().enumerate() {
            if !type_ok(annotation.annotation_type) {
                return fail(format!(
                    "annotation {} has unknown annotation type {}",
                    index, annotation.annotation_type.0
                ));
            }
            let mut pending: Vec<&AnnotationValue> = annotation.values.iter().map(|e| &e.value).collect();
            while let Some(value) = pending.pop() {
                let valid = match value {
                    AnnotationValue::Literal(_) => true,
                    AnnotationValue::Type(ty) | AnnotationValue::EnumConstant { ty, .. } => type_ok(*ty),
                    AnnotationValue::Annotation(nested) => annotation_ok(*nested),
                    AnnotationValue::Array(values) => {
                        pending.extend(values);
                        true
                    }
                };
                if !valid {
                    return fail(format!("annotation {} has a dangling value reference", index));
                }
            }
        }

        Ok(())
    }
}
