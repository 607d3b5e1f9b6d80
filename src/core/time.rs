use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Whole minutes elapsed from `from` to `to`, floored and never negative.
pub(crate) fn whole_minutes_between(from: PrimitiveDateTime, to: PrimitiveDateTime) -> i32 {
    let minutes = (to - from).whole_minutes().max(0);
    i32::try_from(minutes).unwrap_or(i32::MAX)
}
