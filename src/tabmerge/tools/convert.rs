use std::collections::HashSet;

use tracing::warn;

use crate::tabmerge::tools::config::{is_name_char, is_xml_name};
use crate::tabmerge::tools::error::Result;
use crate::tabmerge::tools::model::{Document, Element, Record};

/// Tag of the synthetic container holding one element per record.
pub const ROOT_TAG: &str = "root";
/// Tag of the element representing one record.
pub const ITEM_TAG: &str = "item";

/// Builds a tree with one [`ITEM_TAG`] element per record under a
/// [`ROOT_TAG`] container. Each item holds one child per field, in header
/// order; empty values become empty elements.
pub fn build_document<I>(fields: &[String], records: I) -> Result<Document>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let tags = element_names(fields);
    let mut root = Element::new(ROOT_TAG);

    for record in records {
        let record = record?;
        let item = root.push_child(Element::new(ITEM_TAG));
        for (tag, (_field, value)) in tags.iter().zip(record.iter()) {
            let child = if value.is_empty() {
                Element::new(tag.as_str())
            } else {
                Element::with_text(tag.as_str(), value)
            };
            item.push_child(child);
        }
    }

    Ok(Document::new(root))
}

/// Maps field names onto unique, valid element names.
pub fn element_names(fields: &[String]) -> Vec<String> {
    let mut names = ElementNameRegistry::default();
    fields
        .iter()
        .map(|field| {
            let name = names.assign(field);
            if &name != field {
                warn!(field = field.as_str(), element = name.as_str(), "renamed field");
            }
            name
        })
        .collect()
}

#[derive(Debug, Default)]
struct ElementNameRegistry {
    used: HashSet<String>,
}

impl ElementNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_element_name(raw);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let candidate = format!("{base}_{counter}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

fn sanitize_element_name(raw: &str) -> String {
    if is_xml_name(raw) {
        return raw.to_string();
    }

    let mut sanitized: String = raw
        .trim()
        .chars()
        .map(|ch| if is_name_char(ch) && ch != ':' { ch } else { '_' })
        .collect();

    if sanitized.is_empty() {
        sanitized = "field".to_string();
    }
    if !is_xml_name(&sanitized) {
        sanitized.insert(0, '_');
    }

    sanitized
}
