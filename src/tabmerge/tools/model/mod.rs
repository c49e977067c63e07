use std::sync::Arc;

/// Field names shared by every record of one tabular dataset.
pub type FieldNames = Arc<[String]>;

/// One row of a tabular dataset: an ordered mapping from field name to value.
///
/// Records share their field names with the other rows of the same dataset
/// and are immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: FieldNames,
    values: Vec<String>,
}

impl Record {
    /// Creates a record from shared field names and the row values.
    ///
    /// Values beyond the number of field names are ignored; a shorter row
    /// simply lacks the trailing fields.
    pub fn new(fields: FieldNames, values: Vec<String>) -> Self {
        Self { fields, values }
    }

    /// Field names of the dataset this record belongs to.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the value stored under `field`, if the record carries it.
    pub fn get(&self, field: &str) -> Option<&str> {
        let position = self.fields.iter().position(|name| name == field)?;
        self.values.get(position).map(String::as_str)
    }

    /// Iterates over `(field, value)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .zip(self.values.iter())
            .map(|(field, value)| (field.as_str(), value.as_str()))
    }

    /// Number of values present in the record.
    pub fn len(&self) -> usize {
        self.values.len().min(self.fields.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node of the element tree.
///
/// Children are kept in an ordered `Vec` so several children may share a tag
/// name; they are addressed by position or by the first matching tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element with the provided tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Creates a leaf element holding `text`.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Appends a child and returns a mutable reference to it.
    pub fn push_child(&mut self, child: Element) -> &mut Element {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// First direct child named `tag`.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Mutable access to the first direct child named `tag`.
    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// Text of the first direct child named `tag`.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).and_then(|child| child.text.as_deref())
    }

    /// Value of the attribute named `name`.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` when this element or any descendant is tagged `tag`.
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tag == tag || self.children.iter().any(|child| child.contains_tag(tag))
    }

    /// Total number of elements in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Element::count).sum::<usize>()
    }

    /// Depth of the subtree, or `None` as soon as it exceeds `limit`.
    ///
    /// A lone element has depth 1.
    pub fn depth_within(&self, limit: usize) -> Option<usize> {
        if limit == 0 {
            return None;
        }
        let mut deepest = 0;
        for child in &self.children {
            deepest = deepest.max(child.depth_within(limit - 1)?);
        }
        Some(deepest + 1)
    }
}

/// Contents of the `<?xml ...?>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: None,
        }
    }
}

/// A parsed tree document: the declaration plus the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub declaration: Declaration,
    pub root: Element,
}

impl Document {
    /// Creates a document with the default declaration.
    pub fn new(root: Element) -> Self {
        Self {
            declaration: Declaration::default(),
            root,
        }
    }
}
