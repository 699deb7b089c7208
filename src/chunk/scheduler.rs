//! Row-block scheduler for pairwise evaluation.
//!
//! The output is a row-major buffer split into contiguous row blocks, one per
//! worker, so every worker writes a disjoint slice and the merge is just the
//! join. Each cell depends only on its own (row, col) inputs, so the buffer is
//! bit-identical whatever the worker count.
//!
//! The worker pool lives exactly as long as one call: it is built with
//! [`rayon::ThreadPoolBuilder::build_scoped`], which joins every worker thread
//! before returning, on the error path too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{GeoError, Result};

/// Worker count assumed when the hardware concurrency cannot be queried.
pub const DEFAULT_WORKERS: usize = 4;

/// Below this many cells, spawning a pool costs more than it saves.
pub const MIN_PARALLEL_CELLS: usize = 4096;

/// Hardware concurrency, or [`DEFAULT_WORKERS`] if unknown.
pub fn workers_count() -> usize {
    thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(DEFAULT_WORKERS)
}

/// How a batch call may use threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionOptions {
    /// Opt in to the worker pool. Sequential by default.
    pub threaded: bool,
    /// Upper bound on workers; 0 or 1 means sequential. Never exceeds the
    /// hardware concurrency or the number of rows.
    pub max_workers: usize,
    /// Inputs with fewer cells than this run sequentially even when threaded.
    pub min_parallel_cells: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            threaded: false,
            max_workers: workers_count(),
            min_parallel_cells: MIN_PARALLEL_CELLS,
        }
    }
}

impl ExecutionOptions {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn threaded(max_workers: usize) -> Self {
        Self {
            threaded: true,
            max_workers,
            ..Self::default()
        }
    }

    /// Workers actually used for a `rows × cols` job; 1 means run inline.
    pub fn effective_workers(&self, rows: usize, cols: usize) -> usize {
        if !self.threaded || rows.saturating_mul(cols) < self.min_parallel_cells {
            return 1;
        }
        self.max_workers.min(workers_count()).min(rows).max(1)
    }
}

/// Contiguous output rows `[start, end)` assigned to one worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowBlock {
    pub start: usize,
    pub end: usize,
}

impl RowBlock {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `rows` into at most `workers` blocks of `ceil(rows / workers)` rows.
///
/// The last block may be shorter. No block is empty, so asking for more
/// workers than rows simply yields one block per row.
pub fn plan_row_blocks(rows: usize, workers: usize) -> Vec<RowBlock> {
    if rows == 0 {
        return Vec::new();
    }
    let block_rows = rows.div_ceil(workers.max(1));

    let mut blocks = Vec::with_capacity(rows.div_ceil(block_rows));
    let mut start = 0;
    while start < rows {
        let end = (start + block_rows).min(rows);
        blocks.push(RowBlock { start, end });
        start = end;
    }
    blocks
}

/// Evaluate `cell(row, col)` for every cell of a `rows × cols` grid.
///
/// Returns the row-major buffer. On failure the first error observed is
/// returned after all workers have stopped; with a pool it is wrapped in
/// [`GeoError::PartitionExecution`] naming the failing block. Partial
/// results are dropped.
pub fn evaluate_rows<T, F>(
    rows: usize,
    cols: usize,
    options: &ExecutionOptions,
    cell: F,
) -> Result<Vec<T>>
where
    T: Copy + Default + Send,
    F: Fn(usize, usize) -> Result<T> + Sync,
{
    let cells = rows.checked_mul(cols).ok_or_else(|| {
        GeoError::Configuration(format!("{rows} x {cols} grid overflows the cell count"))
    })?;
    let mut buffer = vec![T::default(); cells];
    if buffer.is_empty() {
        return Ok(buffer);
    }

    let workers = options.effective_workers(rows, cols);
    if workers <= 1 {
        debug!(rows, cols, "evaluating grid sequentially");
        let whole = RowBlock { start: 0, end: rows };
        fill_block(&mut buffer, whole, cols, &cell, None)?;
        return Ok(buffer);
    }

    let blocks = plan_row_blocks(rows, workers);
    let block_cells = blocks[0].len() * cols;
    debug!(rows, cols, workers, blocks = blocks.len(), "evaluating grid on worker pool");

    // Set by the first failing block; the others stop at their next row.
    let abort = AtomicBool::new(false);

    let outcome = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("geodistances-worker-{i}"))
        .build_scoped(
            |worker| worker.run(),
            |pool| {
                pool.install(|| {
                    buffer
                        .par_chunks_mut(block_cells)
                        .zip(blocks.par_iter())
                        .try_for_each(|(chunk, block)| {
                            fill_block(chunk, *block, cols, &cell, Some(&abort)).map_err(|e| {
                                abort.store(true, Ordering::Relaxed);
                                GeoError::PartitionExecution {
                                    rows: (block.start, block.end),
                                    source: Box::new(e),
                                }
                            })
                        })
                })
            },
        )?;

    if let Err(e) = outcome {
        debug!(error = %e, "grid evaluation failed; partial results discarded");
        return Err(e);
    }
    Ok(buffer)
}

fn fill_block<T, F>(
    chunk: &mut [T],
    block: RowBlock,
    cols: usize,
    cell: &F,
    abort: Option<&AtomicBool>,
) -> Result<()>
where
    F: Fn(usize, usize) -> Result<T>,
{
    for (row, out) in (block.start..block.end).zip(chunk.chunks_mut(cols)) {
        if abort.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            // Another block failed; this block's output will be discarded.
            return Ok(());
        }
        for (col, slot) in out.iter_mut().enumerate() {
            *slot = cell(row, col)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced(max_workers: usize) -> ExecutionOptions {
        ExecutionOptions {
            threaded: true,
            max_workers,
            min_parallel_cells: 0,
        }
    }

    #[test]
    fn test_blocks_cover_all_rows_without_overlap() {
        for rows in [1, 2, 7, 64, 100] {
            for workers in [1, 2, 3, 4, 8, 200] {
                let blocks = plan_row_blocks(rows, workers);
                assert!(blocks.len() <= workers.max(1));
                let mut next = 0;
                for b in &blocks {
                    assert_eq!(b.start, next, "gap or overlap at {b:?}");
                    assert!(!b.is_empty());
                    next = b.end;
                }
                assert_eq!(next, rows);
            }
        }
    }

    #[test]
    fn test_more_workers_than_rows() {
        let blocks = plan_row_blocks(3, 8);
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.len() == 1));
    }

    #[test]
    fn test_no_rows_no_blocks() {
        assert!(plan_row_blocks(0, 4).is_empty());
    }

    #[test]
    fn test_effective_workers() {
        assert_eq!(ExecutionOptions::sequential().effective_workers(1000, 1000), 1);
        assert_eq!(ExecutionOptions::threaded(0).effective_workers(1000, 1000), 1);
        assert_eq!(ExecutionOptions::threaded(1).effective_workers(1000, 1000), 1);
        // Small inputs stay inline regardless of the flag.
        assert_eq!(ExecutionOptions::threaded(8).effective_workers(10, 10), 1);
        assert!(ExecutionOptions::threaded(2).effective_workers(1000, 1000) <= 2);
        assert!(forced(64).effective_workers(3, 1) <= 3);
    }

    #[test]
    fn test_threaded_matches_sequential() {
        let (rows, cols) = (37, 11);
        let cell = |r: usize, c: usize| -> Result<f64> { Ok((r as f64).sin() * (c as f64 + 0.5).sqrt()) };

        let expected = evaluate_rows(rows, cols, &ExecutionOptions::sequential(), cell).unwrap();
        for k in [1, 2, 4, 8] {
            let got = evaluate_rows(rows, cols, &forced(k), cell).unwrap();
            assert_eq!(got, expected, "worker count {k} changed the result");
        }
    }

    #[test]
    fn test_empty_grid() {
        let out: Vec<f64> = evaluate_rows(0, 5, &forced(4), |_, _| Ok(1.0)).unwrap();
        assert!(out.is_empty());
        let out: Vec<f64> = evaluate_rows(5, 0, &forced(4), |_, _| Ok(1.0)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_oversized_grid_is_rejected_before_allocating() {
        let err = evaluate_rows::<f64, _>(usize::MAX, 2, &ExecutionOptions::sequential(), |_, _| {
            Ok(0.0)
        })
        .unwrap_err();
        assert!(matches!(err, GeoError::Configuration(_)));
    }

    #[test]
    fn test_sequential_error_is_returned_unwrapped() {
        let err = evaluate_rows(4, 4, &ExecutionOptions::sequential(), |r, c| {
            if (r, c) == (2, 1) {
                Err(GeoError::Convergence { iterations: 3 })
            } else {
                Ok(0.0)
            }
        })
        .unwrap_err();
        assert!(matches!(err, GeoError::Convergence { iterations: 3 }));
    }

    #[test]
    fn test_pool_error_names_failing_block() {
        let err = evaluate_rows(64, 8, &forced(4), |r, _| {
            if r == 40 {
                Err(GeoError::Convergence { iterations: 9 })
            } else {
                Ok(1.0)
            }
        })
        .unwrap_err();

        assert!(matches!(err.root_cause(), GeoError::Convergence { iterations: 9 }));
        if let GeoError::PartitionExecution { rows: (start, end), .. } = err {
            assert!(start <= 40 && 40 < end);
        } else if workers_count() > 1 {
            panic!("expected a partition error, got {err:?}");
        }
    }
}
