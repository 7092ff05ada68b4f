//! Test fixtures for ripple-core

use std::path::{Path, PathBuf};

use crate::document::SnapshotDocument;
use crate::model::*;
use crate::snapshot::{Snapshot, SnapshotBuilder};

pub const CART_ADD: ElementId = ElementId(3);
pub const CHECKOUT_RUN: ElementId = ElementId(5);

/// A small shop:
///
/// ```text
/// 1 shop (package)
/// 2   shop.Cart              public class
/// 3     shop.Cart.add(int)   method, body `add_body`
/// 4   shop.Checkout          class, uses Cart
/// 5     shop.Checkout.run()  method, invokes Cart.add
/// 6     shop.Checkout.cart   field of type Cart
/// ```
pub fn shop_builder(name: &str, add_body: &str) -> SnapshotBuilder {
    let mut builder = SnapshotBuilder::new(name);
    let package = builder.add_element(ElementId::ROOT, ElementKind::Package, "shop").unwrap();

    let cart = builder.add_element(package, ElementKind::Class, "shop.Cart").unwrap();
    let int = builder.add_type(TypeInfo::primitive("int"));
    let cart_type = builder.add_type(TypeInfo::reference("shop.Cart", Some(cart)));
    {
        let facets = builder.facets_mut(cart).unwrap();
        facets.modifiers = Some(Modifiers::empty().with(Modifier::Public));
        facets.class_like = Some(ClassLike {
            binary_name: "shop.Cart".to_string(),
            superclass: None,
            interfaces: vec![],
        });
    }

    let add = builder.add_element(cart, ElementKind::Method, "shop.Cart.add").unwrap();
    builder.set_unique_name(add, "shop.Cart.add(int)").unwrap();
    {
        let facets = builder.facets_mut(add).unwrap();
        facets.modifiers = Some(Modifiers::empty().with(Modifier::Public));
        facets.ty = Some(int);
        facets.method_like = Some(MethodLike {
            parameters: vec![Parameter { name: "qty".to_string(), ty: int }],
            exceptions: vec![],
            body: Some(add_body.to_string()),
            default_value: None,
        });
    }

    let checkout = builder.add_element(package, ElementKind::Class, "shop.Checkout").unwrap();
    builder.facets_mut(checkout).unwrap().class_like = Some(ClassLike {
        binary_name: "shop.Checkout".to_string(),
        superclass: None,
        interfaces: vec![],
    });

    let run = builder.add_element(checkout, ElementKind::Method, "shop.Checkout.run").unwrap();
    builder.set_unique_name(run, "shop.Checkout.run()").unwrap();
    builder.facets_mut(run).unwrap().method_like = Some(MethodLike {
        body: Some("cart.add(1);".to_string()),
        ..MethodLike::default()
    });

    let field = builder.add_element(checkout, ElementKind::Field, "shop.Checkout.cart").unwrap();
    {
        let facets = builder.facets_mut(field).unwrap();
        facets.ty = Some(cart_type);
        facets.field_like = Some(FieldLike::default());
    }

    builder
        .add_dependency(run, add, DependencyCounts::of(DependencyKind::Invocation, 1))
        .unwrap();
    builder
        .add_dependency(field, cart, DependencyCounts::of(DependencyKind::Use, 1))
        .unwrap();
    builder
        .add_dependency(checkout, cart, DependencyCounts::of(DependencyKind::Use, 2))
        .unwrap();
    builder
}

pub fn shop(name: &str) -> Snapshot {
    shop_builder(name, "items += qty;").build().unwrap()
}

/// Classes `A -> B -> C`, each depending on the next with a single use.
/// `c_modifiers` lets a test change C without touching its identity.
pub fn chain(name: &str, c_modifiers: Modifiers) -> Snapshot {
    let mut builder = SnapshotBuilder::new(name);
    let a = builder.add_element(ElementId::ROOT, ElementKind::Class, "p.A").unwrap();
    let b = builder.add_element(ElementId::ROOT, ElementKind::Class, "p.B").unwrap();
    let c = builder.add_element(ElementId::ROOT, ElementKind::Class, "p.C").unwrap();
    for id in [a, b] {
        builder.facets_mut(id).unwrap().modifiers = Some(Modifiers::empty());
    }
    builder.facets_mut(c).unwrap().modifiers = Some(c_modifiers);
    let use_once = DependencyCounts::of(DependencyKind::Use, 1);
    builder.add_dependency(a, b, use_once).unwrap();
    builder.add_dependency(b, c, use_once).unwrap();
    builder.build().unwrap()
}

/// An annotation type `@shop.Marker(value = marker)` whose type reference is
/// itself annotated with that same annotation.
pub fn self_marked(name: &str, marker: &str) -> Snapshot {
    let mut builder = SnapshotBuilder::new(name);
    let element = builder
        .add_element(ElementId::ROOT, ElementKind::AnnotationType, "shop.Marker")
        .unwrap();
    let marker_type = builder.add_type(TypeInfo::reference("shop.Marker", Some(element)));
    let annotation = builder.add_annotation(Annotation {
        annotation_type: marker_type,
        values: vec![AnnotationEntry {
            name: "value".to_string(),
            value: AnnotationValue::Literal(marker.to_string()),
        }],
    });
    builder.type_mut(marker_type).unwrap().annotations = Some(vec![annotation]);
    builder.facets_mut(element).unwrap().annotations = Some(vec![annotation]);
    builder.build().unwrap()
}

/// Serialize `snapshot` as a document into `dir`.
pub fn write_document(dir: &Path, file_name: &str, snapshot: &Snapshot) -> PathBuf {
    let path = dir.join(file_name);
    let json = SnapshotDocument::from_snapshot(snapshot).to_json_string().unwrap();
    std::fs::write(&path, json).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_layout() {
        let snapshot = shop("shop");
        assert_eq!(snapshot.len(), 7);
        assert_eq!(snapshot.dependency_count(), 3);
        assert_eq!(snapshot.find("shop.Cart.add(int)").map(|n| n.id()), Some(CART_ADD));
        assert_eq!(snapshot.find("shop.Checkout.run()").map(|n| n.id()), Some(CHECKOUT_RUN));
    }
}
