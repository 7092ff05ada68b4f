//! JSON snapshot documents
//!
//! A document lists elements in id order without the root: the first entry
//! becomes element 1. Parents are referenced by id and must come before
//! their children. Types and annotations are referenced by their index in
//! the `types` and `annotations` arrays.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::*;
use crate::snapshot::{Snapshot, SnapshotBuilder};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub name: String,
    #[serde(default)]
    pub elements: Vec<ElementDocument>,
    #[serde(default)]
    pub types: Vec<TypeInfo>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDocument {
    pub kind: ElementKind,
    pub qualified_name: String,
    /// Defaults to the qualified name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
    /// Defaults to the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ElementId>,
    #[serde(flatten)]
    pub facets: Facets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyDocument {
    pub source: ElementId,
    pub target: ElementId,
    pub counts: BTreeMap<DependencyKind, u32>,
}

impl SnapshotDocument {
    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let document = Self::from_json_str(&source)?;
        tracing::debug!(
            "Loaded snapshot document '{}' from {} ({} elements)",
            document.name,
            path.display(),
            document.elements.len()
        );
        Ok(document)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rebuild the document from a frozen snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let elements = snapshot
            .elements()
            .skip(1)
            .map(|element| ElementDocument {
                kind: element.kind,
                qualified_name: element.qualified_name.clone(),
                unique_name: (element.unique_name != element.qualified_name)
                    .then(|| element.unique_name.clone()),
                parent: element.parent.filter(|&p| p != ElementId::ROOT),
                facets: element.facets.clone(),
            })
            .collect();

        let mut dependencies = Vec::with_capacity(snapshot.dependency_count());
        for element in snapshot.elements() {
            for (target, counts) in snapshot.dependencies_to(element.id) {
                dependencies.push(DependencyDocument {
                    source: element.id,
                    target,
                    counts: counts.iter().collect(),
                });
            }
        }
        dependencies.sort_by_key(|d| (d.source, d.target));

        SnapshotDocument {
            name: snapshot.name().to_string(),
            elements,
            types: (0..snapshot.type_count())
                .map(|i| snapshot.type_info(TypeId(i as u32)).clone())
                .collect(),
            annotations: (0..snapshot.annotation_count())
                .map(|i| snapshot.annotation(AnnotationId(i as u32)).clone())
                .collect(),
            dependencies,
        }
    }

    /// Validate and freeze the document into a [`Snapshot`].
    pub fn into_snapshot(self) -> Result<Snapshot> {
        let mut builder = SnapshotBuilder::new(self.name);
        for element in self.elements {
            let parent = element.parent.unwrap_or(ElementId::ROOT);
            let id = builder.add_element(parent, element.kind, element.qualified_name)?;
            if let Some(unique_name) = element.unique_name {
                builder.set_unique_name(id, unique_name)?;
            }
            *builder.facets_mut(id)? = element.facets;
        }
        for info in self.types {
            builder.add_type(info);
        }
        for annotation in self.annotations {
            builder.add_annotation(annotation);
        }
        for dependency in self.dependencies {
            let counts = dependency
                .counts
                .into_iter()
                .fold(DependencyCounts::new(), |counts, (kind, n)| counts.with(kind, n));
            builder.add_dependency(dependency.source, dependency.target, counts)?;
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RippleError;

    const DOCUMENT: &str = r#"{
        "name": "shop",
        "elements": [
            { "kind": "package", "qualified_name": "shop" },
            {
                "kind": "class",
                "qualified_name": "shop.Cart",
                "parent": 1,
                "modifiers": ["public"],
                "class_like": { "binary_name": "shop.Cart" }
            },
            {
                "kind": "method",
                "qualified_name": "shop.Cart.add",
                "unique_name": "shop.Cart.add(int)",
                "parent": 2,
                "type": 0,
                "method_like": {
                    "parameters": [{ "name": "qty", "type": 0 }],
                    "body": "items += qty;"
                }
            }
        ],
        "types": [{ "kind": "primitive", "name": "int" }],
        "dependencies": [
            { "source": 3, "target": 2, "counts": { "member": 1, "access": 2 } }
        ]
    }"#;

    #[test]
    fn test_document_builds_snapshot() {
        let snapshot = SnapshotDocument::from_json_str(DOCUMENT)
            .unwrap()
            .into_snapshot()
            .unwrap();

        assert_eq!(snapshot.name(), "shop");
        assert_eq!(snapshot.len(), 4);
        let method = snapshot.find("shop.Cart.add(int)").unwrap();
        assert_eq!(method.id(), ElementId(3));
        assert_eq!(method.element().name, "add");
        assert_eq!(method.parent().map(|p| p.id()), Some(ElementId(2)));
        assert_eq!(
            snapshot.element(ElementId(2)).unwrap().facets.modifiers,
            Some(Modifiers::empty().with(Modifier::Public))
        );

        let counts = snapshot.dependency(ElementId(3), ElementId(2)).unwrap();
        assert_eq!(counts.get(DependencyKind::Member), 1);
        assert_eq!(counts.get(DependencyKind::Access), 2);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_document_survives_snapshot_rebuild() {
        let document = SnapshotDocument::from_json_str(DOCUMENT).unwrap();
        let snapshot = document.clone().into_snapshot().unwrap();
        assert_eq!(SnapshotDocument::from_snapshot(&snapshot), document);
    }

    #[test]
    fn test_document_rejects_forward_parent() {
        let source = r#"{
            "name": "bad",
            "elements": [{ "kind": "class", "qualified_name": "A", "parent": 2 }]
        }"#;
        let document = SnapshotDocument::from_json_str(source).unwrap();
        assert!(matches!(document.into_snapshot(), Err(RippleError::Snapshot(_))));
    }

    #[test]
    fn test_document_rejects_dangling_type() {
        let source = r#"{
            "name": "bad",
            "elements": [{ "kind": "field", "qualified_name": "A.f", "type": 7 }]
        }"#;
        let document = SnapshotDocument::from_json_str(source).unwrap();
        assert!(matches!(document.into_snapshot(), Err(RippleError::Snapshot(_))));
    }

    #[test]
    fn test_malformed_json_is_reported() {
        assert!(matches!(
            SnapshotDocument::from_json_str("{ \"elements\": 3 }"),
            Err(RippleError::Json(_))
        ));
    }
}
