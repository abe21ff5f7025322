// src/probability.rs
//! Cumulative frequency index over probability contexts.
//!
//! Each entry owns the half-open interval `[cum - count, cum)` of its
//! context's frequency mass, in table order. The index is keyed by `cum - 1`
//! so the entry owning code `c` is the smallest key `>= c`.

use std::collections::BTreeMap;

use crate::context::{ContextEntry, ProbabilityContexts};
use crate::error::{CodecError, Result};

/// Interval of one decoded symbol within its context's total mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRange {
    pub low:   u64,
    pub high:  u64,
    pub total: u64,
}

#[derive(Debug)]
struct CumulativeIndex {
    /// (cumulative count - 1) -> entry index
    by_last_code: BTreeMap<u64, usize>,
    total:        u64,
}

#[derive(Debug)]
pub struct ProbabilityModel<'c> {
    contexts: &'c ProbabilityContexts,
    index:    Vec<CumulativeIndex>,
}

impl<'c> ProbabilityModel<'c> {
    pub fn new(contexts: &'c ProbabilityContexts) -> Self {
        let index = contexts
            .tables()
            .iter()
            .map(|entries| {
                let mut by_last_code = BTreeMap::new();
                let mut total = 0u64;
                for (i, entry) in entries.iter().enumerate() {
                    // zero-occurrence entries own no interval
                    if entry.occurrence_count == 0 {
                        continue;
                    }
                    total += entry.occurrence_count as u64;
                    by_last_code.insert(total - 1, i);
                }
                CumulativeIndex { by_last_code, total }
            })
            .collect();
        Self { contexts, index }
    }

    pub fn context_count(&self) -> usize {
        self.index.len()
    }

    fn context_index(&self, context: usize) -> Result<&CumulativeIndex> {
        self.index.get(context).ok_or_else(|| {
            CodecError::malformed(format!(
                "context {} out of range ({} contexts)",
                context,
                self.index.len()
            ))
        })
    }

    /// Total frequency mass of `context`.
    pub fn total_symbol_count(&self, context: usize) -> Result<u64> {
        Ok(self.context_index(context)?.total)
    }

    /// Entry whose interval contains `rescaled_code`, with that interval.
    pub fn lookup(&self, context: usize, rescaled_code: u64) -> Result<(&'c ContextEntry, SymbolRange)> {
        let index = self.context_index(context)?;
        let (&last_code, &entry_index) = index
            .by_last_code
            .range(rescaled_code..)
            .next()
            .ok_or_else(|| {
                CodecError::corrupt(format!(
                    "rescaled code {} outside context {} total {}",
                    rescaled_code, context, index.total
                ))
            })?;
        let contexts: &'c ProbabilityContexts = self.contexts;
        let entry = contexts.context(context).and_then(|e| e.get(entry_index)).ok_or_else(|| {
            CodecError::corrupt(format!("entry {} missing from context {}", entry_index, context))
        })?;
        let high = last_code + 1;
        Ok((
            entry,
            SymbolRange {
                low: high - entry.occurrence_count as u64,
                high,
                total: index.total,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_contexts() -> ProbabilityContexts {
        ProbabilityContexts::new(vec![
            vec![
                ContextEntry::new(0, 3, 10, 0),
                ContextEntry::new(1, 0, 11, 0),
                ContextEntry::new(2, 5, 12, 1),
            ],
            vec![ContextEntry::new(0, 1, 20, 0)],
        ])
    }

    #[test]
    fn totals_per_context() {
        let contexts = model_contexts();
        let model = ProbabilityModel::new(&contexts);
        assert_eq!(model.context_count(), 2);
        assert_eq!(model.total_symbol_count(0).unwrap(), 8);
        assert_eq!(model.total_symbol_count(1).unwrap(), 1);
        assert!(model.total_symbol_count(2).is_err());
    }

    #[test]
    fn lookup_finds_half_open_interval() {
        let contexts = model_contexts();
        let model = ProbabilityModel::new(&contexts);

        for code in 0..3 {
            let (entry, range) = model.lookup(0, code).unwrap();
            assert_eq!(entry.associated_value, 10);
            assert_eq!(range, SymbolRange { low: 0, high: 3, total: 8 });
        }
        for code in 3..8 {
            let (entry, range) = model.lookup(0, code).unwrap();
            // the zero-count entry between them is never selected
            assert_eq!(entry.associated_value, 12);
            assert_eq!(range, SymbolRange { low: 3, high: 8, total: 8 });
        }
    }

    #[test]
    fn code_beyond_total_is_corrupt() {
        let contexts = model_contexts();
        let model = ProbabilityModel::new(&contexts);
        assert!(matches!(model.lookup(0, 8), Err(CodecError::CorruptStream(_))));
    }
}
