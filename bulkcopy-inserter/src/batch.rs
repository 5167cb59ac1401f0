//! Splitting an input sequence into ordered, fixed-size batches.

/// Iterator over consecutive batches of at most `size` items.
///
/// Batch `k` holds the items at positions `[k * size, (k + 1) * size)`; only
/// the last batch may be shorter. Each batch is collected before it is
/// yielded, and the source is pulled no further than the batch being built,
/// so abandoning the iterator leaves later items unread.
#[derive(Debug)]
pub struct Batches<I> {
    iter: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.iter.by_ref().take(self.size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Split `items` into batches of `size`. A `size` of zero yields nothing.
pub fn batches<I: IntoIterator>(items: I, size: usize) -> Batches<I::IntoIter> {
    Batches {
        iter: items.into_iter(),
        size,
    }
}
