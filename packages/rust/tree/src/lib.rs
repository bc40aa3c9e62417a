//! Semantic tree: maps an unordered keyword set to one deterministic
//! location, so segments sharing a keyword set land on the same node no
//! matter the order keywords were discovered, and a later query with the
//! same set (in any order) finds them.
//!
//! Two canonical orders are in play and must not be confused:
//! - the **frequency order** (document frequency desc, corpus frequency
//!   asc) drives the order-independent unit id;
//! - the **lexicographic order** of the keyword strings drives the
//!   insertion path, so segments sharing any keyword subset share a prefix
//!   of tree structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use bookdex_shared::{FrequencyLookup, FrequencyTable, Segment, Unit, short_hash};

// ---------------------------------------------------------------------------
// Tree structure
// ---------------------------------------------------------------------------

/// A tree node keyed by the hash of its word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    /// Node key: [`short_hash`] of `word`.
    pub id: String,
    pub word: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, TreeNode>,
    /// Present when a keyword path terminates at this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

impl TreeNode {
    fn new(word: &str) -> Self {
        Self {
            id: short_hash(word),
            word: word.to_string(),
            children: BTreeMap::new(),
            unit: None,
        }
    }
}

/// The document's keyword-prefix tree.
///
/// Mutable only while the tree stage folds segments in; once persisted it is
/// read-only shared data for the query path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticTree {
    #[serde(default)]
    pub roots: BTreeMap<String, TreeNode>,
}

impl SemanticTree {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of units stored in the tree.
    pub fn unit_count(&self) -> usize {
        fn count(nodes: &BTreeMap<String, TreeNode>) -> usize {
            nodes
                .values()
                .map(|n| usize::from(n.unit.is_some()) + count(&n.children))
                .sum()
        }
        count(&self.roots)
    }

    /// Store `unit` at the path given by the lexicographic order of
    /// `keywords`. An existing unit at that path is overwritten: last write
    /// wins, by contract.
    pub fn insert(&mut self, keywords: &[String], mut unit: Unit) {
        let path = canonical_keywords(keywords);
        let Some((last, prefix)) = path.split_last() else {
            return;
        };

        let mut nodes = &mut self.roots;
        for word in prefix {
            let node = nodes
                .entry(short_hash(word))
                .or_insert_with(|| TreeNode::new(word));
            nodes = &mut node.children;
        }

        let node = nodes
            .entry(short_hash(last))
            .or_insert_with(|| TreeNode::new(last));
        unit.parent_id = Some(node.id.clone());
        unit.keywords = path.clone();
        if node.unit.is_some() {
            debug!(unit = %unit.id, "overwriting unit at existing keyword path");
        }
        node.unit = Some(unit);
    }

    /// Walk the lexicographic keyword path and return the unit there, if any.
    pub fn lookup(&self, keywords: &[String]) -> Option<&Unit> {
        let path = canonical_keywords(keywords);
        let (last, prefix) = path.split_last()?;

        let mut nodes = &self.roots;
        for word in prefix {
            nodes = &nodes.get(&short_hash(word))?.children;
        }
        nodes.get(&short_hash(last))?.unit.as_ref()
    }
}

/// Sorted, deduplicated copy of a keyword list.
fn canonical_keywords(keywords: &[String]) -> Vec<String> {
    let mut path: Vec<String> = keywords.to_vec();
    path.sort();
    path.dedup();
    path
}

// ---------------------------------------------------------------------------
// Unit ids
// ---------------------------------------------------------------------------

/// Order-independent unit id for a keyword set.
///
/// Each keyword is weighted by its 1-based rank in the frequency order and
/// its (document − corpus) frequency spread; the digest is taken over the
/// decimal rendering of the weighted sum. Keywords tied on both frequencies
/// contribute identical terms, so any permutation of equal-frequency ties
/// produces the same sum: the id is a pure function of the *set* of
/// (word, frequencies) pairs, never of discovery order.
pub fn unit_id(keywords: &[String], lookup: &FrequencyLookup<'_>) -> String {
    let canonical = canonical_keywords(keywords);

    let mut enriched: Vec<(u64, f64)> = canonical
        .iter()
        .map(|word| (lookup.document_frequency(word), lookup.corpus_frequency(word)))
        .collect();

    enriched.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });

    let sum: f64 = enriched
        .iter()
        .enumerate()
        .map(|(rank, (doc, corpus))| (rank + 1) as f64 * (*doc as f64 - corpus))
        .sum();

    short_hash(&format!("{sum}"))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fold annotated segments into a semantic tree.
///
/// Only paragraph segments with at least one surviving keyword contribute;
/// everything else is skipped. Later segments overwrite earlier ones at the
/// same keyword path.
#[instrument(skip_all, fields(segments = segments.len()))]
pub fn build(segments: &[Segment], lookup: &FrequencyLookup<'_>) -> SemanticTree {
    let mut tree = SemanticTree::default();

    for segment in segments {
        let Segment::Paragraph(paragraph) = segment else {
            continue;
        };
        if paragraph.keywords.is_empty() {
            continue;
        }

        for keyword in &paragraph.keywords {
            // Segment keywords are drawn from the frequency table by
            // construction; a miss here means the inputs drifted apart.
            debug_assert!(
                lookup.contains(keyword),
                "segment keyword '{keyword}' missing from frequency table"
            );
            if !lookup.contains(keyword) {
                warn!(keyword = %keyword, segment = %paragraph.id, "keyword missing from frequency table, treating frequencies as zero");
            }
        }

        let unit = Unit {
            id: unit_id(&paragraph.keywords, lookup),
            parent_id: None,
            keywords: Vec::new(),
            text: paragraph.text.clone(),
            summary: paragraph.summary.clone(),
        };
        tree.insert(&paragraph.keywords, unit);
    }

    debug!(units = tree.unit_count(), "semantic tree built");
    tree
}

// ---------------------------------------------------------------------------
// Query evaluation
// ---------------------------------------------------------------------------

/// Outcome of a keyword query against a persisted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum QueryOutcome {
    /// The keyword set addresses a stored unit.
    Match { unit: Unit },
    /// No unit at that address. Carries the unit id the set would hash to.
    NotFound { unit_id: String },
}

/// Evaluate a raw keyword query: normalize, recompute the canonical unit id
/// from the frequency table, and walk the tree path.
///
/// This is direct addressing, not similarity search — a set that was never
/// indexed returns [`QueryOutcome::NotFound`].
#[instrument(skip_all, fields(keywords = keywords.len()))]
pub fn evaluate(
    keywords: &[String],
    table: &FrequencyTable,
    tree: &SemanticTree,
) -> QueryOutcome {
    let normalized: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let lookup = table.lookup();
    let expected_id = unit_id(&normalized, &lookup);

    match tree.lookup(&normalized) {
        Some(unit) => {
            if unit.id != expected_id {
                // Frequency tables were rebuilt after the tree was; ids no
                // longer agree. Surface the stored unit anyway.
                warn!(stored = %unit.id, computed = %expected_id, "unit id mismatch, index may be stale");
            }
            QueryOutcome::Match { unit: unit.clone() }
        }
        None => QueryOutcome::NotFound {
            unit_id: expected_id,
        },
    }
}
