use fluxgate_event::{Namespace, NamespaceElement, TagSet};

const MEASUREMENT_SEPARATOR: &str = "/";

/// A namespace split into the parts of a point.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedNamespace {
    /// Measurement name.
    pub measurement: String,

    /// Field name.
    pub field: String,

    /// Metric tags, plus one tag per dynamic element.
    pub tags: TagSet,
}

/// Resolves a metric's namespace and tags into a measurement, a field name, and a tag set.
///
/// The measurement is made of the static elements before the leaf, in order, joined by `/`. When there are none, the
/// measurement is the leaf name itself. The field is always named after the leaf.
///
/// Every dynamic element, including a dynamic leaf, contributes a tag keyed by its declared name and holding its
/// resolved value. The tag is kept even when the resolved value is empty, and overrides a metric tag with the same key.
///
/// Returns `None` if the namespace is empty.
pub fn resolve_namespace(namespace: &Namespace, tags: &TagSet) -> Option<ResolvedNamespace> {
    let (leaf, parents) = namespace.iter().as_slice().split_last()?;

    let measurement = parents
        .iter()
        .filter(|element| !element.is_dynamic())
        .map(NamespaceElement::value)
        .collect::<Vec<_>>();
    let measurement = if measurement.is_empty() {
        leaf.name().to_string()
    } else {
        measurement.join(MEASUREMENT_SEPARATOR)
    };

    let mut tags = tags.clone();
    for element in namespace.iter().filter(|element| element.is_dynamic()) {
        tags.insert(element.name().to_string(), element.value().to_string());
    }

    Some(ResolvedNamespace {
        measurement,
        field: leaf.name().to_string(),
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagSet {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn static_namespace() {
        let ns = Namespace::from_static(["intel", "cpu", "load"]);
        let input = tags(&[("zone", "red")]);

        let resolved = resolve_namespace(&ns, &input).unwrap();
        assert_eq!(resolved.measurement, "intel/cpu");
        assert_eq!(resolved.field, "load");
        assert_eq!(resolved.tags, input);
    }

    #[test]
    fn single_element_namespace() {
        let resolved = resolve_namespace(&Namespace::from_static(["foo"]), &TagSet::new()).unwrap();
        assert_eq!(resolved.measurement, "foo");
        assert_eq!(resolved.field, "foo");
    }

    #[test]
    fn dynamic_elements_become_tags() {
        let mut ns = Namespace::from_static(["foo"])
            .with_dynamic("dyn1", "dynamic element 1")
            .with_dynamic("dyn2", "dynamic element 2")
            .with_static("bar");
        ns.get_mut(1).unwrap().set_value("fooval");
        ns.get_mut(2).unwrap().set_value("barval");

        let resolved = resolve_namespace(&ns, &tags(&[("zone", "red")])).unwrap();
        assert_eq!(resolved.measurement, "foo");
        assert_eq!(resolved.field, "bar");
        assert_eq!(
            resolved.tags,
            tags(&[("dyn1", "fooval"), ("dyn2", "barval"), ("zone", "red")])
        );
    }

    #[test]
    fn empty_dynamic_value_kept() {
        let ns = Namespace::from_static(["disk"]).with_dynamic("device", "").with_static("reads");

        let resolved = resolve_namespace(&ns, &TagSet::new()).unwrap();
        assert_eq!(resolved.tags, tags(&[("device", "")]));
    }

    #[test]
    fn dynamic_leaf_names_field_and_tags() {
        let mut ns = Namespace::from_static(["a", "b"]).with_dynamic("host", "");
        ns.get_mut(2).unwrap().set_value("web01");

        let resolved = resolve_namespace(&ns, &TagSet::new()).unwrap();
        assert_eq!(resolved.measurement, "a/b");
        assert_eq!(resolved.field, "host");
        assert_eq!(resolved.tags, tags(&[("host", "web01")]));
    }

    #[test]
    fn dynamic_tag_overrides_metric_tag() {
        let mut ns = Namespace::from_static(["a"]).with_dynamic("zone", "").with_static("v");
        ns.get_mut(1).unwrap().set_value("blue");

        let resolved = resolve_namespace(&ns, &tags(&[("zone", "red")])).unwrap();
        assert_eq!(resolved.tags, tags(&[("zone", "blue")]));
    }

    #[test]
    fn element_order_preserved() {
        let ns = Namespace::from_static(["z", "a", "m", "leaf"]);
        let resolved = resolve_namespace(&ns, &TagSet::new()).unwrap();
        assert_eq!(resolved.measurement, "z/a/m");
    }

    #[test]
    fn empty_namespace() {
        assert!(resolve_namespace(&Namespace::default(), &TagSet::new()).is_none());
    }
}
