use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::index::KeyIndexBuilder;
use crate::tabmerge::tools::model::Element;

/// Names of the four columns that drive a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Column identifying a record in the tabular input.
    pub key_field: String,
    /// Column whose value is propagated into the tree.
    pub value_field: String,
    /// Element child marking merge eligibility and carrying the join key.
    pub original_field: String,
    /// Element child receiving the merged value.
    pub novel_field: String,
}

/// Partially specified configuration, as found in a JSON file or on the
/// command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialMergeConfig {
    pub key_field: Option<String>,
    pub value_field: Option<String>,
    pub original_field: Option<String>,
    pub novel_field: Option<String>,
}

impl PartialMergeConfig {
    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Fields set in `overrides` take precedence over the ones in `self`.
    pub fn merged_with(self, overrides: PartialMergeConfig) -> Self {
        Self {
            key_field: overrides.key_field.or(self.key_field),
            value_field: overrides.value_field.or(self.value_field),
            original_field: overrides.original_field.or(self.original_field),
            novel_field: overrides.novel_field.or(self.novel_field),
        }
    }

    /// Resolves the configuration, failing on the first missing name.
    pub fn resolve(self) -> Result<MergeConfig> {
        let require = |value: Option<String>, name: &str| {
            value
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ToolError::InvalidConfig(format!("{name} is required")))
        };

        Ok(MergeConfig {
            key_field: require(self.key_field, "key_field")?,
            value_field: require(self.value_field, "value_field")?,
            original_field: require(self.original_field, "original_field")?,
            novel_field: require(self.novel_field, "novel_field")?,
        })
    }
}

impl MergeConfig {
    pub fn new(
        key_field: impl Into<String>,
        value_field: impl Into<String>,
        original_field: impl Into<String>,
        novel_field: impl Into<String>,
    ) -> Self {
        Self {
            key_field: key_field.into(),
            value_field: value_field.into(),
            original_field: original_field.into(),
            novel_field: novel_field.into(),
        }
    }

    /// Checks the names that can be verified without looking at data.
    pub fn validate_names(&self) -> Result<()> {
        for (name, value) in [
            ("key_field", &self.key_field),
            ("value_field", &self.value_field),
            ("original_field", &self.original_field),
            ("novel_field", &self.novel_field),
        ] {
            if value.trim().is_empty() {
                return Err(ToolError::InvalidConfig(format!("{name} must not be empty")));
            }
        }

        for (name, value) in [
            ("original_field", &self.original_field),
            ("novel_field", &self.novel_field),
        ] {
            if !is_xml_name(value) {
                return Err(ToolError::InvalidConfig(format!(
                    "{name} '{value}' is not a valid element name"
                )));
            }
        }
        Ok(())
    }

    /// Checks that the key and value fields exist among the tabular field
    /// names.
    pub fn validate_fields(&self, fields: &[String]) -> Result<()> {
        KeyIndexBuilder::new(&self.key_field, &self.value_field).validate(fields)
    }

    /// Checks that the original field occurs somewhere in the tree.
    pub fn validate_tree(&self, root: &Element) -> Result<()> {
        if root.contains_tag(&self.original_field) {
            Ok(())
        } else {
            Err(ToolError::UnknownField {
                field: self.original_field.clone(),
                dataset: "tree input".to_string(),
            })
        }
    }

    /// Whether merged values replace the join key itself.
    pub fn is_in_place(&self) -> bool {
        self.original_field == self.novel_field
    }
}

/// Returns `true` when `name` can be used as an element name.
pub fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == ':'
}

pub(crate) fn is_name_char(ch: char) -> bool {
    is_name_start(ch) || ch.is_numeric() || ch == '-' || ch == '.'
}
