use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;

/// Point in time as exchanged with the vault backend.
///
/// The backend writes RFC 3339 strings; older endpoints and some tooling emit
/// UNIX seconds, so both are accepted when decoding. Encoding is always RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimestampVisitor;

        impl de::Visitor<'_> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an RFC 3339 string or UNIX seconds")
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Timestamp::from_unix_seconds(value)
                    .ok_or_else(|| E::custom(format!("timestamp out of range: {value}")))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let secs = i64::try_from(value)
                    .map_err(|_| E::custom(format!("timestamp out of range: {value}")))?;
                self.visit_i64(secs)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Timestamp::parse_rfc3339(value)
                    .map_err(|err| E::custom(format!("invalid RFC 3339 timestamp: {err}")))
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    #[must_use]
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    pub fn parse_rfc3339(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s.trim()).map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Lenient parse for user typed dates: RFC 3339, or a bare `YYYY-MM-DD`
    /// which means midnight UTC of that day. Anything else is `None`.
    #[must_use]
    pub fn parse_user_input(s: &str) -> Option<Self> {
        Self::parse_user_input_at(s, 0, 0, 0)
    }

    /// Like [`Timestamp::parse_user_input`], but a bare date means the last
    /// second of that day. For inclusive upper bounds.
    #[must_use]
    pub fn parse_user_input_end_of_day(s: &str) -> Option<Self> {
        Self::parse_user_input_at(s, 23, 59, 59)
    }

    fn parse_user_input_at(s: &str, hour: u32, min: u32, sec: u32) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        if let Ok(ts) = Self::parse_rfc3339(s) {
            return Some(ts);
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(hour, min, sec))
            .map(|dt| Self(Utc.from_utc_datetime(&dt)))
    }

    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }

    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    #[must_use]
    pub fn inner(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn deserializes_backend_rfc3339() {
        let ts: Timestamp = serde_json::from_str("\"2025-09-26T11:45:56Z\"").expect("rfc3339");
        assert_eq!(ts.unix_seconds(), 1_758_887_156);
    }

    #[test]
    fn deserializes_offset_timestamps_into_utc() {
        let ts: Timestamp = serde_json::from_str("\"2025-09-26T13:45:56+02:00\"").expect("offset");
        assert_eq!(ts.to_rfc3339(), "2025-09-26T11:45:56Z");
    }

    #[test]
    fn deserializes_unix_seconds() {
        let ts: Timestamp = serde_json::from_str("1758887156").expect("seconds");
        assert_eq!(ts.to_rfc3339(), "2025-09-26T11:45:56Z");
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let ts = Timestamp::from_unix_seconds(1_758_887_156).expect("in range");
        assert_eq!(serde_json::to_string(&ts).expect("encode"), "\"2025-09-26T11:45:56Z\"");
    }

    #[test]
    fn user_input_accepts_bare_dates() {
        let ts = Timestamp::parse_user_input(" 2025-09-26 ").expect("date");
        assert_eq!(ts.to_rfc3339(), "2025-09-26T00:00:00Z");
    }

    #[test]
    fn end_of_day_input_covers_the_whole_day() {
        let ts = Timestamp::parse_user_input_end_of_day("2025-02-01").expect("date");
        assert_eq!(ts.to_rfc3339(), "2025-02-01T23:59:59Z");
        let exact = Timestamp::parse_user_input_end_of_day("2025-02-01T12:00:00Z").expect("rfc3339");
        assert_eq!(exact.to_rfc3339(), "2025-02-01T12:00:00Z");
    }

    #[test]
    fn user_input_rejects_garbage_and_blank() {
        assert!(Timestamp::parse_user_input("yesterday").is_none());
        assert!(Timestamp::parse_user_input("   ").is_none());
        assert!(Timestamp::parse_user_input("2025-13-45").is_none());
    }
}
