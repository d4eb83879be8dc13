//! Hierarchical metric namespaces.
use std::{fmt, ops::Index};

use serde::{Deserialize, Serialize};

/// A single segment of a metric namespace.
///
/// Static elements are fixed strings. Dynamic elements are placeholders declared with a name (and a description for
/// humans) whose value is only known once the metric has been collected.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NamespaceElement {
    /// A fixed segment.
    Static {
        /// Segment value.
        value: String,
    },

    /// A runtime-valued segment.
    Dynamic {
        /// Declared placeholder name.
        name: String,

        /// Human-readable description of the placeholder.
        #[serde(default)]
        description: String,

        /// Resolved runtime value.
        #[serde(default)]
        value: String,
    },
}

impl NamespaceElement {
    /// Creates a static element.
    pub fn fixed<S: Into<String>>(value: S) -> Self {
        Self::Static { value: value.into() }
    }

    /// Creates a dynamic element with no resolved value yet.
    pub fn dynamic<N, D>(name: N, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self::Dynamic {
            name: name.into(),
            description: description.into(),
            value: String::new(),
        }
    }

    /// Returns `true` if this element is dynamic.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    /// Returns the name of this element.
    ///
    /// For static elements, this is the segment itself. For dynamic elements, this is the declared placeholder name.
    pub fn name(&self) -> &str {
        match self {
            Self::Static { value } => value,
            Self::Dynamic { name, .. } => name,
        }
    }

    /// Returns the value of this element.
    ///
    /// For static elements, this is the segment itself. For dynamic elements, this is the resolved runtime value, which
    /// may be empty.
    pub fn value(&self) -> &str {
        match self {
            Self::Static { value } | Self::Dynamic { value, .. } => value,
        }
    }

    /// Sets the resolved value of a dynamic element.
    ///
    /// Has no effect on static elements.
    pub fn set_value<S: Into<String>>(&mut self, new_value: S) {
        if let Self::Dynamic { value, .. } = self {
            *value = new_value.into();
        }
    }
}

/// An ordered sequence of namespace elements.
///
/// The last element is the metric's leaf name. Element order is significant.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Namespace {
    elements: Vec<NamespaceElement>,
}

impl Namespace {
    /// Creates a namespace made entirely of static elements.
    pub fn from_static<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elements: segments.into_iter().map(NamespaceElement::fixed).collect(),
        }
    }

    /// Creates a namespace from the given elements.
    pub fn from_elements(elements: Vec<NamespaceElement>) -> Self {
        Self { elements }
    }

    /// Appends a static element.
    pub fn with_static<S: Into<String>>(mut self, value: S) -> Self {
        self.elements.push(NamespaceElement::fixed(value));
        self
    }

    /// Appends a dynamic element with no resolved value.
    pub fn with_dynamic<N, D>(mut self, name: N, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        self.elements.push(NamespaceElement::dynamic(name, description));
        self
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the leaf (last) element, if any.
    pub fn leaf(&self) -> Option<&NamespaceElement> {
        self.elements.last()
    }

    /// Returns an iterator over the elements, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, NamespaceElement> {
        self.elements.iter()
    }

    /// Returns a mutable reference to the element at `index`, if it exists.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut NamespaceElement> {
        self.elements.get_mut(index)
    }
}

impl Index<usize> for Namespace {
    type Output = NamespaceElement;

    fn index(&self, index: usize) -> &Self::Output {
        &self.elements[index]
    }
}

impl<'a> IntoIterator for &'a Namespace {
    type Item = &'a NamespaceElement;
    type IntoIter = std::slice::Iter<'a, NamespaceElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            write!(f, "/{}", element.value())?;
        }
        Ok(())
    }
}
