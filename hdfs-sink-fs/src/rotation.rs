//! File rotation policy.
//!
//! Rotation is count-based and proactive: the decision is made before each
//! write, so a file never receives more than `max_records_per_file` records.

/// Decide whether a new file must be opened before the next write.
///
/// True when no file is open yet, or the open file already holds
/// `max_records_per_file` records. A non-positive limit rotates before every
/// write, so each record ends up in its own file.
pub fn should_rotate(
    has_open_file: bool,
    records_in_current_file: u64,
    max_records_per_file: i64,
) -> bool {
    if !has_open_file {
        return true;
    }
    match u64::try_from(max_records_per_file) {
        Ok(max) => records_in_current_file >= max,
        Err(_) => true,
    }
}

/// Rotation settings for a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_records_per_file: i64,
}

impl RotationPolicy {
    pub fn new(max_records_per_file: i64) -> Self {
        Self { max_records_per_file }
    }

    pub fn should_rotate(&self, has_open_file: bool, records_in_current_file: u64) -> bool {
        should_rotate(has_open_file, records_in_current_file, self.max_records_per_file)
    }
}
