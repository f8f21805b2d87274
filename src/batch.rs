//! Translation units and fixed-size batching.

use crate::documents::SourceDocument;
use crate::error::ConfigError;
use crate::fields::{self, FieldLocation, FieldSelection};

/// One string to translate, with enough identity to write it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    /// Index of the source document within the run
    pub document: usize,
    pub location: FieldLocation,
    pub text: String,
}

/// A bounded, ordered group of units sent in one request.
///
/// Unit order is the only link between request entries and response entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub units: Vec<TranslationUnit>,
}

impl Batch {
    pub fn texts(&self) -> Vec<String> {
        self.units.iter().map(|u| u.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted, de-duplicated names of the documents this batch touches.
    pub fn document_names(&self, documents: &[SourceDocument]) -> String {
        let mut indices: Vec<usize> = self.units.iter().map(|u| u.document).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
            .into_iter()
            .filter_map(|i| documents.get(i))
            .map(|d| d.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Build the flat unit list for every document, in document order.
///
/// Blank strings are left out; they stay untouched in the output.
pub fn collect_units(documents: &[SourceDocument], selection: &FieldSelection) -> Vec<TranslationUnit> {
    let mut units = Vec::new();
    for (index, document) in documents.iter().enumerate() {
        for location in fields::resolve(&document.value, selection) {
            let Some(text) = fields::get(&document.value, &location) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            units.push(TranslationUnit {
                document: index,
                text: text.to_string(),
                location,
            });
        }
    }
    units
}

/// Split units into consecutive batches of at most `batch_size`.
pub fn batch(units: Vec<TranslationUnit>, batch_size: usize) -> Result<Vec<Batch>, ConfigError> {
    if batch_size < 1 {
        return Err(ConfigError::InvalidBatchSize(batch_size));
    }

    let mut batches = Vec::with_capacity(units.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for unit in units {
        current.push(unit);
        if current.len() == batch_size {
            batches.push(Batch {
                index: batches.len(),
                units: std::mem::replace(&mut current, Vec::with_capacity(batch_size)),
            });
        }
    }
    if !current.is_empty() {
        batches.push(Batch {
            index: batches.len(),
            units: current,
        });
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::FileFormat;
    use crate::fields::PathStep;
    use proptest::prelude::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn unit(document: usize, text: &str) -> TranslationUnit {
        TranslationUnit {
            document,
            location: FieldLocation::new(vec![PathStep::Key(text.to_string())]),
            text: text.to_string(),
        }
    }

    fn document(name: &str, value: serde_json::Value) -> SourceDocument {
        SourceDocument {
            relative_path: PathBuf::from(name),
            format: FileFormat::Json,
            value,
        }
    }

    #[test]
    fn test_batch_size_zero_rejected() {
        let err = batch(vec![unit(0, "a")], 0).unwrap_err();
        assert_eq!(err, ConfigError::InvalidBatchSize(0));
    }

    #[test]
    fn test_batch_uneven_split() {
        let units: Vec<_> = ["a", "b", "c", "d", "e"].iter().map(|t| unit(0, t)).collect();
        let batches = batch(units, 2).unwrap();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].texts(), vec!["a", "b"]);
        assert_eq!(batches[1].texts(), vec!["c", "d"]);
        assert_eq!(batches[2].texts(), vec!["e"]);
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_batch_empty_input() {
        assert!(batch(Vec::new(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_batch_spans_documents() {
        let units = vec![unit(0, "a"), unit(1, "b"), unit(1, "c")];
        let batches = batch(units, 10).unwrap();
        assert_eq!(batches.len(), 1);

        let docs = vec![document("x.json", json!({})), document("y.json", json!({}))];
        assert_eq!(batches[0].document_names(&docs), "x.json, y.json");
    }

    #[test]
    fn test_collect_units_across_documents() {
        let docs = vec![
            document("a.json", json!({"title": "Hello", "id": 1})),
            document("b.json", json!({"title": "World", "body": "  "})),
        ];
        let units = collect_units(&docs, &FieldSelection::Auto);

        assert_eq!(units.len(), 2);
        assert_eq!((units[0].document, units[0].text.as_str()), (0, "Hello"));
        assert_eq!((units[1].document, units[1].text.as_str()), (1, "World"));
        assert_eq!(units[1].location.to_string(), "title");
    }

    proptest! {
        #[test]
        fn prop_batches_reconstruct_input(
            texts in prop::collection::vec("[a-z]{1,5}", 1..60),
            batch_size in 1usize..12,
        ) {
            let units: Vec<_> = texts.iter().enumerate().map(|(i, t)| unit(i % 3, t)).collect();
            let batches = batch(units.clone(), batch_size).unwrap();

            prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= batch_size));
            let rebuilt: Vec<_> = batches.into_iter().flat_map(|b| b.units).collect();
            prop_assert_eq!(rebuilt, units);
        }
    }
}
