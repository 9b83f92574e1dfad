use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Render a timestamp the way lots store it (RFC 3339).
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    // Rfc3339 only fails for years outside 0..=9999.
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(s, &Rfc3339)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn round_trips_rfc3339() {
        let ts = datetime!(2024-03-05 10:30:00 +02:00);
        let s = format_timestamp(ts);
        assert_eq!(s, "2024-03-05T10:30:00+02:00");
        assert_eq!(parse_timestamp(&s).unwrap(), ts);
    }
}
