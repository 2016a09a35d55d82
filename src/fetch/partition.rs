/// Per-request stream ceiling of the event filtering operation.
pub const MAX_STREAMS_PER_REQUEST: usize = 100;

/// Split `items` into contiguous batches of at most `max_batch_size`.
///
/// Concatenating the batches in order gives back `items`. A batch size of
/// zero is treated as one.
pub fn partition<T>(items: &[T], max_batch_size: usize) -> Vec<&[T]> {
    items.chunks(max_batch_size.max(1)).collect()
}
