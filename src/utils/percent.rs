/// Integer percentage of `part / whole`, rounded half-up and clamped to 0..=100.
///
/// A zero (or negative) `whole` yields 0. Enrollment counters and the course
/// report both go through here so the two never disagree.
pub fn round_percentage(part: i64, whole: i64) -> i32 {
    if whole <= 0 || part <= 0 {
        return 0;
    }
    let rounded = (200 * part + whole) / (2 * whole);
    rounded.min(100) as i32
}
