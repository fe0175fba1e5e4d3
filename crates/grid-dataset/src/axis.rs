//! Dataset time axes.

use chrono::{DateTime, Utc};

use crate::error::{DatasetError, Result};

/// Strictly increasing timestamps of a dataset's time dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxis {
    times: Vec<DateTime<Utc>>,
}

impl TimeAxis {
    /// Build an axis, rejecting unordered or repeated timestamps.
    pub fn new(times: Vec<DateTime<Utc>>) -> Result<Self> {
        if let Some(pair) = times.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(DatasetError::invalid_metadata(format!(
                "time axis not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }

        Ok(Self { times })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn get(&self, index: usize) -> Option<DateTime<Utc>> {
        self.times.get(index).copied()
    }

    pub fn first(&self) -> Option<DateTime<Utc>> {
        self.times.first().copied()
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.times.last().copied()
    }

    /// Insertion point keeping the axis sorted (left side); equals `len()`
    /// when `time` is after every entry.
    pub fn search_sorted(&self, time: DateTime<Utc>) -> usize {
        self.times.partition_point(|t| *t < time)
    }

    /// Index of an exact timestamp.
    pub fn index_of(&self, time: DateTime<Utc>) -> Option<usize> {
        self.times.binary_search(&time).ok()
    }
}
