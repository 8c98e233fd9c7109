use chrono::{DateTime, Timelike, Utc};

/// Truncates a timestamp down to whole-second precision.
///
/// The tick driver uses this so that every trigger context constructed
/// within the same tick shares one nominal date, even if the tick's
/// selection phase happens to straddle a second boundary.
pub fn truncate_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.with_nanosecond(0).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_sub_second_components() {
        let t = Utc::now().with_nanosecond(123_456_789).unwrap();
        let truncated = truncate_to_second(t);
        assert_eq!(truncated.timestamp_subsec_nanos(), 0);
        assert_eq!(truncated.timestamp(), t.timestamp());
    }
}
