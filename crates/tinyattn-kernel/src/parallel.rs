//! Data-parallel chunk scheduling shared by the kernels.
//!
//! Each kernel writes its output as fixed-size rows, and every row is produced
//! by a single sequential loop. Rows are independent, so running them on the
//! rayon pool or in order gives bit-identical results.

#[cfg(feature = "parallel")]
use scirs2_core::parallel_ops::*;
use serde::{Deserialize, Serialize};

/// Configuration for data-parallel kernel execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Use the thread pool at all
    pub enabled: bool,
    /// Minimum number of output scalars before work is split across threads
    /// (smaller tensors run sequentially to avoid overhead)
    pub min_parallel_elements: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_parallel_elements: 16 * 1024,
        }
    }
}

impl ParallelConfig {
    /// Always run sequentially.
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Split work whenever there is more than one row.
    pub fn eager() -> Self {
        Self {
            enabled: true,
            min_parallel_elements: 0,
        }
    }

    /// Set the parallelization threshold.
    pub fn with_min_parallel_elements(mut self, min: usize) -> Self {
        self.min_parallel_elements = min;
        self
    }

    /// Whether a kernel producing `len` scalars should use the pool.
    pub fn should_parallelize(&self, len: usize) -> bool {
        cfg!(feature = "parallel") && self.enabled && len >= self.min_parallel_elements
    }
}

/// Run `f(row_index, row)` over `out` split into rows of `row_len`.
pub(crate) fn for_each_row<T, F>(config: &ParallelConfig, out: &mut [T], row_len: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if row_len == 0 || out.is_empty() {
        return;
    }

    #[cfg(feature = "parallel")]
    if config.should_parallelize(out.len()) {
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(idx, row)| f(idx, row));
        return;
    }

    #[cfg(not(feature = "parallel"))]
    let _ = config;

    out.chunks_mut(row_len)
        .enumerate()
        .for_each(|(idx, row)| f(idx, row));
}

/// Like [`for_each_row`] but over two outputs sharing the same row layout.
pub(crate) fn for_each_row_pair<T, F>(
    config: &ParallelConfig,
    first: &mut [T],
    second: &mut [T],
    row_len: usize,
    f: F,
) where
    T: Send,
    F: Fn(usize, &mut [T], &mut [T]) + Send + Sync,
{
    debug_assert_eq!(first.len(), second.len());
    if row_len == 0 || first.is_empty() {
        return;
    }

    #[cfg(feature = "parallel")]
    if config.should_parallelize(first.len() + second.len()) {
        first
            .par_chunks_mut(row_len)
            .zip(second.par_chunks_mut(row_len))
            .enumerate()
            .for_each(|(idx, (a, b))| f(idx, a, b));
        return;
    }

    #[cfg(not(feature = "parallel"))]
    let _ = config;

    first
        .chunks_mut(row_len)
        .zip(second.chunks_mut(row_len))
        .enumerate()
        .for_each(|(idx, (a, b))| f(idx, a, b));
}
