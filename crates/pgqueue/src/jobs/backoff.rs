//! Pure retry-delay schedule. No I/O, no randomness: given the post-increment
//! attempt count, always returns the same delay.

/// Seconds to wait before a job failed on its `attempt_no`'th try becomes
/// runnable again. `attempt_no` is the *new* `attempts` value, i.e. it has
/// already been incremented for this failure.
pub fn delay_for(attempt_no: i32) -> i64 {
    match attempt_no {
        n if n <= 1 => 2,
        2 => 5,
        3 => 15,
        _ => 30,
    }
}
