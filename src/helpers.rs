use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a schema bitmask from an update column vector: bit `i` is set
/// iff the caller supplied a value for column `i`.
pub fn schema_bitmask(columns: &[Option<i64>]) -> i64 {
    let mut mask: i64 = 0;

    for (index, value) in columns.iter().enumerate() {
        if value.is_some() {
            mask |= 1 << index;
        }
    }

    mask
}

/// Build the cumulative post-image for a tail record: start from the current
/// image and overwrite the positions the caller supplied.
pub fn cumulative_image(current: &[Option<i64>], updates: &[Option<i64>]) -> Vec<Option<i64>> {
    current
        .iter()
        .zip(updates.iter())
        .map(|(original, update)| match update {
            Some(_) => *update,
            None => *original,
        })
        .collect()
}

/// Seconds since the Unix epoch, for the per-slot timestamp column.
pub fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
