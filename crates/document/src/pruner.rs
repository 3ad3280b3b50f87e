//! Structural pruning of matched field paths
//!
//! Evaluates a pattern set against a document and, when anything matched,
//! rebuilds the document without the matched terminal pairs. Containers on
//! a matched chain are recomposed through the deferred-header builder since
//! their final sizes are only known after pruning; everything off the chain
//! is copied verbatim.

use contracts::StructuredValue;
use tracing::trace;

use crate::builder::DocumentBuilder;
use crate::pattern::{MatchState, PatternSet};

/// Result of evaluating a pattern set against one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// No pattern matched. The caller must reuse the original document;
    /// no copy is made.
    Unchanged,
    /// At least one pattern matched; a rebuilt buffer without the matched
    /// pairs.
    Pruned(Vec<u8>),
}

impl PatternSet {
    /// Evaluate every pattern against `doc` and prune matched leaves.
    ///
    /// Match states are freshly computed per call. When two patterns share
    /// the same start key, the first one in compile order claims it and the
    /// other is ignored for this pass.
    pub fn evaluate(&self, doc: &StructuredValue) -> Evaluation {
        let Some(pairs) = doc.as_map() else {
            return Evaluation::Unchanged;
        };
        if pairs.is_empty() || self.is_empty() {
            return Evaluation::Unchanged;
        }

        let matches: Vec<MatchState> = self.patterns().iter().map(|p| p.resolve(doc)).collect();
        let matched = matches.iter().filter(|m| m.matched).count();
        if matched == 0 {
            return Evaluation::Unchanged;
        }
        trace!(patterns = self.patterns().len(), matched, "pruning document");

        let mut builder = DocumentBuilder::with_capacity(64);
        let mut header = builder.begin_map();

        for (idx, (key, value)) in pairs.iter().enumerate() {
            // Linear scan is fine: pattern sets are small and human-authored.
            let claimed = matches
                .iter()
                .find(|m| m.matched && m.path[0] == idx);
            match claimed {
                None => {
                    header.append();
                    builder.write_value(key);
                    builder.write_value(value);
                }
                Some(state) => {
                    if write_pruned(&mut builder, Some(key), value, &state.path, 1) {
                        header.append();
                    }
                }
            }
        }

        builder.end(header);
        Evaluation::Pruned(builder.into_bytes())
    }
}

/// Repack the pair at `path[depth - 1]`, omitting the terminal pair.
///
/// Returns whether anything was written, so the caller knows whether to
/// register the entry in its own container header.
fn write_pruned(
    builder: &mut DocumentBuilder,
    key: Option<&StructuredValue>,
    value: &StructuredValue,
    path: &[usize],
    depth: usize,
) -> bool {
    // The matched chain terminates on this pair: prune it.
    if depth == path.len() {
        return false;
    }

    if let Some(key) = key {
        builder.write_value(key);
    }

    match value {
        StructuredValue::Map(pairs) => {
            let mut header = builder.begin_map();
            for (idx, (k, v)) in pairs.iter().enumerate() {
                if idx == path[depth] {
                    if write_pruned(builder, Some(k), v, path, depth + 1) {
                        header.append();
                    }
                } else {
                    header.append();
                    builder.write_value(k);
                    builder.write_value(v);
                }
            }
            builder.end(header);
        }
        StructuredValue::Array(items) => {
            // Paths only descend maps, so an array here keeps every element.
            let mut header = builder.begin_array();
            for item in items {
                header.append();
                builder.write_value(item);
            }
            builder.end(header);
        }
        other => builder.write_value(other),
    }

    true
}
