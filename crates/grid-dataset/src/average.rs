//! Time averaging of several variables in parallel.
//!
//! Each variable is one task on a bounded rayon pool. A task reads its time
//! steps one after another and accumulates a running sum, so memory stays at
//! one field plus the accumulator per task. Results are keyed by variable
//! name; the order tasks finish in has no effect on the output.

use std::collections::BTreeMap;

use ocean_common::VariableField;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::config::effective_workers;
use crate::error::{DatasetError, Result};

/// Averages named fields over time on a fixed-size worker pool.
pub struct ConcurrentVariableAverager {
    pool: ThreadPool,
}

impl ConcurrentVariableAverager {
    /// Pool with `workers` threads; 0 uses the host's available parallelism.
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(effective_workers(workers))
            .thread_name(|i| format!("averager-{}", i))
            .build()
            .map_err(|e| DatasetError::Config(format!("failed to build averaging pool: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Mean of each variable over `time_indices`, reading every step with
    /// `read(variable, time_index)`.
    ///
    /// Every variable gets an entry; a failure in one variable's reads or
    /// mean leaves the others untouched.
    pub fn average<F>(
        &self,
        variables: &[String],
        time_indices: &[usize],
        read: F,
    ) -> BTreeMap<String, Result<VariableField>>
    where
        F: Fn(&str, usize) -> Result<VariableField> + Sync,
    {
        self.pool.install(|| {
            variables
                .par_iter()
                .map(|variable| {
                    let result = average_variable(variable, time_indices, &read);
                    match &result {
                        Ok(_) => debug!(variable = %variable, steps = time_indices.len(), "Averaged variable"),
                        Err(e) => warn!(variable = %variable, error = %e, "Averaging failed"),
                    }
                    (variable.clone(), result)
                })
                .collect()
        })
    }
}

impl std::fmt::Debug for ConcurrentVariableAverager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentVariableAverager")
            .field("workers", &self.workers())
            .finish()
    }
}

fn average_variable<F>(variable: &str, time_indices: &[usize], read: &F) -> Result<VariableField>
where
    F: Fn(&str, usize) -> Result<VariableField>,
{
    let mut accumulator: Option<MeanAccumulator> = None;

    for &time_index in time_indices {
        let field = read(variable, time_index)?;
        match accumulator.as_mut() {
            Some(acc) => acc.add(&field)?,
            None => accumulator = Some(MeanAccumulator::new(&field)),
        }
    }

    accumulator
        .ok_or_else(|| DatasetError::invalid_argument(format!("no time steps to average for '{}'", variable)))?
        .finish()
}

/// Strict mean of several aligned fields: a cell missing in any input is
/// missing (NaN) in the result.
pub fn mean_of(fields: &[VariableField]) -> Result<VariableField> {
    let (first, rest) = fields
        .split_first()
        .ok_or_else(|| DatasetError::invalid_argument("no fields to average"))?;

    let mut accumulator = MeanAccumulator::new(first);
    for field in rest {
        accumulator.add(field)?;
    }
    accumulator.finish()
}

struct MeanAccumulator {
    template: VariableField,
    sums: Vec<f64>,
    count: usize,
}

impl MeanAccumulator {
    fn new(first: &VariableField) -> Self {
        let sums = first
            .values()
            .iter()
            .map(|&v| if first.is_missing(v) { f64::NAN } else { v as f64 })
            .collect();

        Self {
            template: first.clone(),
            sums,
            count: 1,
        }
    }

    fn add(&mut self, field: &VariableField) -> Result<()> {
        if !field.is_aligned_with(&self.template) {
            return Err(DatasetError::invalid_metadata(format!(
                "'{}' changed grid between time steps: {:?} vs {:?}",
                field.name(),
                field.shape(),
                self.template.shape()
            )));
        }

        for (sum, &value) in self.sums.iter_mut().zip(field.values()) {
            if field.is_missing(value) {
                *sum = f64::NAN;
            } else {
                *sum += value as f64;
            }
        }
        self.count += 1;
        Ok(())
    }

    fn finish(self) -> Result<VariableField> {
        let count = self.count as f64;
        let values = self.sums.iter().map(|&sum| (sum / count) as f32).collect();

        Ok(VariableField::new(
            self.template.name(),
            values,
            self.template.width(),
            self.template.height(),
            *self.template.transform(),
        )?)
    }
}
