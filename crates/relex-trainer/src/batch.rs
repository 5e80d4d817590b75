//! Batch sizing and padding.

/// Effective batch size for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    /// The configured size was larger than the dataset and got reduced.
    pub clamped: bool,
}

/// Clamp `configured` to `dataset_len` when `clamp` is set and it is larger.
pub fn resolve_batch_size(configured: usize, dataset_len: usize, clamp: bool) -> BatchPlan {
    if clamp && configured > dataset_len && dataset_len > 0 {
        tracing::warn!(
            configured,
            dataset_len,
            "Batch size is larger than the training set, using {}",
            dataset_len
        );
        BatchPlan {
            batch_size: dataset_len,
            clamped: true,
        }
    } else {
        BatchPlan {
            batch_size: configured,
            clamped: false,
        }
    }
}

/// Extend `data` to a multiple of `batch_size` by repeating items from its
/// front. Returns how many items were appended.
pub fn pad_to_batch_size<T: Clone>(data: &mut Vec<T>, batch_size: usize) -> usize {
    if batch_size == 0 || data.is_empty() {
        return 0;
    }
    let rem = data.len() % batch_size;
    if rem == 0 {
        return 0;
    }
    let extra = batch_size - rem;
    let filler: Vec<T> = data.iter().cycle().take(extra).cloned().collect();
    data.extend(filler);
    extra
}

/// Number of optimizer steps one epoch over `len` items takes.
pub fn steps_per_epoch(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    len.div_ceil(batch_size)
}
