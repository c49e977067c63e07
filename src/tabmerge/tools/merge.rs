use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::tabmerge::tools::config::MergeConfig;
use crate::tabmerge::tools::error::{Result, ToolError};
use crate::tabmerge::tools::index::KeyIndex;
use crate::tabmerge::tools::model::Element;

/// Deepest element tree the engine agrees to walk.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Counters collected while merging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Elements carrying the original field.
    pub eligible: usize,
    /// Eligible elements whose key was found in the index.
    pub merged: usize,
    /// Merged elements that received a new novel-field child.
    pub created: usize,
    /// Merged elements whose existing novel-field child was overwritten.
    pub overwritten: usize,
    /// Eligible elements whose key is absent from the index.
    pub unresolved: usize,
}

/// Writes values from a [`KeyIndex`] into every element that carries the
/// original field, matched on that field's text.
#[derive(Debug)]
pub struct MergeEngine<'a> {
    index: &'a KeyIndex,
    original_field: &'a str,
    novel_field: &'a str,
    max_depth: usize,
}

impl<'a> MergeEngine<'a> {
    pub fn new(index: &'a KeyIndex, config: &'a MergeConfig) -> Self {
        Self {
            index,
            original_field: &config.original_field,
            novel_field: &config.novel_field,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Overrides the depth guard.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Merges into the tree rooted at `root`, depth-first and pre-order.
    ///
    /// The depth guard runs before anything is modified, so a rejected tree
    /// is returned untouched. Elements whose key is unknown are left as they
    /// are; nothing is ever removed.
    #[instrument(
        level = "info",
        skip_all,
        fields(original = self.original_field, novel = self.novel_field)
    )]
    pub fn merge(&self, root: &mut Element) -> Result<MergeStats> {
        if root.depth_within(self.max_depth).is_none() {
            return Err(ToolError::DepthExceeded {
                limit: self.max_depth,
            });
        }

        let mut stats = MergeStats::default();
        self.visit(root, &mut stats);
        info!(
            eligible = stats.eligible,
            merged = stats.merged,
            unresolved = stats.unresolved,
            "merge finished"
        );
        Ok(stats)
    }

    fn visit(&self, element: &mut Element, stats: &mut MergeStats) {
        self.merge_element(element, stats);
        for child in &mut element.children {
            self.visit(child, stats);
        }
    }

    fn merge_element(&self, element: &mut Element, stats: &mut MergeStats) {
        let Some(key) = element
            .child(self.original_field)
            .map(|child| child.text.as_deref().unwrap_or_default().trim().to_string())
        else {
            return;
        };
        stats.eligible += 1;

        let Some(value) = self.index.get(&key) else {
            stats.unresolved += 1;
            debug!(tag = element.tag.as_str(), key = key.as_str(), "no index entry for key");
            return;
        };
        stats.merged += 1;

        match element.child_mut(self.novel_field) {
            Some(target) => {
                target.text = Some(value.to_string());
                stats.overwritten += 1;
            }
            None => {
                element.push_child(Element::with_text(self.novel_field, value));
                stats.created += 1;
            }
        }
    }
}
