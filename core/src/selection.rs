//! Channel selection: turns a [`ChannelSpec`] into concrete row indices.

use crate::recording::{ChannelInfo, ChannelType};
use crate::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index-based selection with Python `range`/slice semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSpec {
    Indices(Vec<i64>),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
}

/// Which channels a stage touches. The modes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSpec {
    /// Every data channel not flagged bad.
    #[default]
    All,
    ByTypeOrName(Vec<String>),
    ByIndex(IndexSpec),
}

impl ChannelSpec {
    /// Builds a spec from the two optional configuration fields, rejecting
    /// any attempt to use both.
    pub fn from_parts(
        by_type_or_name: Option<Vec<String>>,
        by_index: Option<IndexSpec>,
    ) -> FilterResult<Self> {
        match (by_type_or_name, by_index) {
            (Some(entries), Some(indices)) => Err(FilterError::ConflictingSelection(format!(
                "picks by type/name {:?} and picks by index {:?} were both supplied",
                entries, indices
            ))),
            (Some(entries), None) => Ok(ChannelSpec::ByTypeOrName(entries)),
            (None, Some(indices)) => Ok(ChannelSpec::ByIndex(indices)),
            (None, None) => Ok(ChannelSpec::All),
        }
    }
}

/// Unique row indices in the recording's canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ChannelSelection {
    indices: Vec<usize>,
    names: Vec<String>,
}

impl ChannelSelection {
    fn from_rows(channels: &[ChannelInfo], rows: BTreeSet<usize>) -> Self {
        let indices: Vec<usize> = rows.into_iter().collect();
        let names = indices
            .iter()
            .map(|&row| channels[row].name.clone())
            .collect();
        Self { indices, names }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub struct ChannelSelector;

impl ChannelSelector {
    pub fn select(channels: &[ChannelInfo], spec: &ChannelSpec) -> FilterResult<ChannelSelection> {
        let rows = match spec {
            ChannelSpec::All => channels
                .iter()
                .enumerate()
                .filter(|(_, channel)| channel.kind.is_data() && !channel.bad)
                .map(|(row, _)| row)
                .collect(),
            ChannelSpec::ByTypeOrName(entries) => Self::by_type_or_name(channels, entries)?,
            ChannelSpec::ByIndex(IndexSpec::Indices(indices)) => {
                Self::by_indices(channels.len(), indices)?
            }
            ChannelSpec::ByIndex(IndexSpec::Slice { start, stop, step }) => {
                slice_rows(channels.len(), *start, *stop, *step)?
            }
        };
        Ok(ChannelSelection::from_rows(channels, rows))
    }

    fn by_type_or_name(
        channels: &[ChannelInfo],
        entries: &[String],
    ) -> FilterResult<BTreeSet<usize>> {
        for entry in entries {
            let known = ChannelType::is_type_tag(entry)
                || channels.iter().any(|channel| &channel.name == entry);
            if !known {
                return Err(FilterError::ChannelIndex(format!(
                    "'{}' matches no channel type or channel name",
                    entry
                )));
            }
        }

        Ok(channels
            .iter()
            .enumerate()
            .filter(|(_, channel)| {
                let named = entries.iter().any(|entry| entry == &channel.name);
                let typed = entries.iter().any(|entry| channel.kind.matches_tag(entry));
                named || (typed && !channel.bad)
            })
            .map(|(row, _)| row)
            .collect())
    }

    fn by_indices(n_channels: usize, indices: &[i64]) -> FilterResult<BTreeSet<usize>> {
        let len = n_channels as i64;
        indices
            .iter()
            .map(|&index| {
                let resolved = if index < 0 { index + len } else { index };
                if resolved < 0 || resolved >= len {
                    Err(FilterError::ChannelIndex(format!(
                        "index {} out of range for {} channels",
                        index, n_channels
                    )))
                } else {
                    Ok(resolved as usize)
                }
            })
            .collect()
    }
}

/// Resolves `start:stop:step` against `len` items exactly like a Python slice.
fn slice_rows(
    len: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> FilterResult<BTreeSet<usize>> {
    let len = len as i64;
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(FilterError::ChannelIndex("slice step cannot be zero".into()));
    }

    let mut rows = BTreeSet::new();
    if step > 0 {
        let clamp = |value: i64| {
            if value < 0 {
                (value + len).max(0)
            } else {
                value.min(len)
            }
        };
        let begin = start.map(clamp).unwrap_or(0);
        let end = stop.map(clamp).unwrap_or(len);
        let mut row = begin;
        while row < end {
            rows.insert(row as usize);
            row += step;
        }
    } else {
        let clamp = |value: i64| {
            if value < 0 {
                (value + len).max(-1)
            } else {
                value.min(len - 1)
            }
        };
        let begin = start.map(clamp).unwrap_or(len - 1);
        let end = stop.map(clamp).unwrap_or(-1);
        let mut row = begin;
        while row > end {
            rows.insert(row as usize);
            row += step;
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Vec<ChannelInfo> {
        vec![
            ChannelInfo::new("MEG0111", ChannelType::Mag),
            ChannelInfo::new("MEG0112", ChannelType::Grad),
            ChannelInfo::new("MEG0113", ChannelType::Grad).bad(),
            ChannelInfo::new("EEG001", ChannelType::Eeg),
            ChannelInfo::new("STI101", ChannelType::Stim),
            ChannelInfo::new("EOG061", ChannelType::Eog),
        ]
    }

    #[test]
    fn default_selects_good_data_channels() {
        let selection = ChannelSelector::select(&layout(), &ChannelSpec::All).unwrap();
        assert_eq!(selection.indices(), &[0, 1, 3]);
    }

    #[test]
    fn type_selection_excludes_bads_unless_named() {
        let spec = ChannelSpec::ByTypeOrName(vec!["grad".into()]);
        let selection = ChannelSelector::select(&layout(), &spec).unwrap();
        assert_eq!(selection.indices(), &[1]);

        let spec = ChannelSpec::ByTypeOrName(vec!["grad".into(), "MEG0113".into()]);
        let selection = ChannelSelector::select(&layout(), &spec).unwrap();
        assert_eq!(selection.indices(), &[1, 2]);
    }

    #[test]
    fn selection_follows_canonical_order_not_request_order() {
        let spec = ChannelSpec::ByTypeOrName(vec!["EOG061".into(), "meg".into()]);
        let selection = ChannelSelector::select(&layout(), &spec).unwrap();
        assert_eq!(selection.indices(), &[0, 1, 5]);
        assert_eq!(selection.names()[2], "EOG061");
    }

    #[test]
    fn name_matching_is_case_sensitive() {
        let spec = ChannelSpec::ByTypeOrName(vec!["meg0111".into()]);
        let err = ChannelSelector::select(&layout(), &spec).unwrap_err();
        assert!(matches!(err, FilterError::ChannelIndex(_)));
    }

    #[test]
    fn index_selection_includes_bads_and_wraps_negatives() {
        let spec = ChannelSpec::ByIndex(IndexSpec::Indices(vec![2, -1, 2]));
        let selection = ChannelSelector::select(&layout(), &spec).unwrap();
        assert_eq!(selection.indices(), &[2, 5]);
    }

    #[test]
    fn out_of_range_index_fails() {
        for index in [6, -7] {
            let spec = ChannelSpec::ByIndex(IndexSpec::Indices(vec![index]));
            let err = ChannelSelector::select(&layout(), &spec).unwrap_err();
            assert!(matches!(err, FilterError::ChannelIndex(_)));
        }
    }

    #[test]
    fn slices_follow_python_semantics() {
        let slice = |start, stop, step| {
            let spec = ChannelSpec::ByIndex(IndexSpec::Slice { start, stop, step });
            ChannelSelector::select(&layout(), &spec)
                .unwrap()
                .indices()
                .to_vec()
        };
        assert_eq!(slice(Some(1), Some(4), None), vec![1, 2, 3]);
        assert_eq!(slice(None, None, Some(2)), vec![0, 2, 4]);
        assert_eq!(slice(Some(-2), None, None), vec![4, 5]);
        assert_eq!(slice(Some(2), Some(100), None), vec![2, 3, 4, 5]);
        assert_eq!(slice(None, None, Some(-2)), vec![1, 3, 5]);
        assert_eq!(slice(Some(4), Some(1), Some(-1)), vec![2, 3, 4]);
        assert!(slice(Some(4), Some(1), None).is_empty());
    }

    #[test]
    fn zero_step_slice_fails() {
        let spec = ChannelSpec::ByIndex(IndexSpec::Slice {
            start: None,
            stop: None,
            step: Some(0),
        });
        assert!(matches!(
            ChannelSelector::select(&layout(), &spec),
            Err(FilterError::ChannelIndex(_))
        ));
    }

    #[test]
    fn both_modes_conflict_regardless_of_content() {
        let cases = [
            (vec![], IndexSpec::Indices(vec![])),
            (vec!["meg".to_string()], IndexSpec::Indices(vec![0])),
            (
                vec!["MEG0111".to_string()],
                IndexSpec::Slice {
                    start: None,
                    stop: None,
                    step: None,
                },
            ),
        ];
        for (names, indices) in cases {
            let err = ChannelSpec::from_parts(Some(names), Some(indices)).unwrap_err();
            assert!(matches!(err, FilterError::ConflictingSelection(_)));
        }
    }
}
