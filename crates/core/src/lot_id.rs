//! Human-readable lot identifiers: `PREFIX-YYYY-MM-DD-NNNNNN[-SERVERID]`.

use std::fmt;
use std::str::FromStr;

use time::{Date, Month};

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "UA";

/// Base id of the per-day counter document.
pub const COUNTER_DOC_ID: &str = "lotID";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LotIdError {
    #[error("malformed lot id '{0}'")]
    Malformed(String),
    #[error("lot id '{0}' has an invalid calendar date")]
    InvalidDate(String),
}

/// A minted lot identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LotId {
    pub prefix: String,
    pub date: Date,
    pub index: u64,
    pub server_id: Option<String>,
}

impl LotId {
    pub fn new(prefix: &str, date: Date, index: u64, server_id: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            date,
            index,
            server_id: (!server_id.is_empty()).then(|| server_id.to_string()),
        }
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:04}-{:02}-{:02}-{:06}",
            self.prefix,
            self.date.year(),
            u8::from(self.date.month()),
            self.date.day(),
            self.index
        )?;
        if let Some(server) = &self.server_id {
            write!(f, "-{server}")?;
        }
        Ok(())
    }
}

impl FromStr for LotId {
    type Err = LotIdError;

    /// Parses the layout produced by `Display`. The prefix may not contain
    /// `-`; everything after the index is the server id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LotIdError::Malformed(s.to_string());
        let mut parts = s.splitn(6, '-');
        let prefix = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let mut number = |width: usize| {
            parts
                .next()
                .filter(|p| p.len() >= width && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse::<u64>().ok())
                .ok_or_else(malformed)
        };
        let year = number(4)?;
        let month = number(2)?;
        let day = number(2)?;
        let index = number(6)?;
        let server_id = parts.next().map(str::to_string);
        if server_id.as_deref() == Some("") {
            return Err(malformed());
        }

        let invalid = || LotIdError::InvalidDate(s.to_string());
        let month = u8::try_from(month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;
        let year = i32::try_from(year).map_err(|_| invalid())?;
        let day = u8::try_from(day).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;

        Ok(Self {
            prefix: prefix.to_string(),
            date,
            index,
            server_id,
        })
    }
}

/// ISO calendar date key used inside the counter document.
pub fn date_key(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Id of the counter document for `server_id` (`lotID` or `lotID_<server>`).
pub fn counter_doc_id(server_id: &str) -> String {
    if server_id.is_empty() {
        COUNTER_DOC_ID.to_string()
    } else {
        format!("{COUNTER_DOC_ID}_{server_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn formats_with_zero_padding() {
        let id = LotId::new("UA", date!(2024 - 03 - 05), 1, "");
        assert_eq!(id.to_string(), "UA-2024-03-05-000001");
    }

    #[test]
    fn appends_server_id() {
        let id = LotId::new("UA", date!(2024 - 12 - 31), 1234567, "srv2");
        assert_eq!(id.to_string(), "UA-2024-12-31-1234567-srv2");
    }

    #[test]
    fn parses_what_it_formats() {
        for s in ["UA-2024-03-05-000001", "UA-2024-03-05-000042-a-b", "XX-0999-01-01-999999"] {
            let id: LotId = s.parse().unwrap();
            assert_eq!(id.to_string(), s);
        }
        let id: LotId = "UA-2024-03-05-000042-a-b".parse().unwrap();
        assert_eq!(id.index, 42);
        assert_eq!(id.server_id.as_deref(), Some("a-b"));
    }

    #[test]
    fn rejects_bad_ids() {
        assert!(matches!("UA-2024-03-05".parse::<LotId>(), Err(LotIdError::Malformed(_))));
        assert!(matches!("UA-2024-03-05-1".parse::<LotId>(), Err(LotIdError::Malformed(_))));
        assert!(matches!("UA-2024-03-05-000001-".parse::<LotId>(), Err(LotIdError::Malformed(_))));
        assert!(matches!(
            "UA-2023-02-29-000001".parse::<LotId>(),
            Err(LotIdError::InvalidDate(_))
        ));
    }

    #[test]
    fn counter_doc_is_namespaced_by_server() {
        assert_eq!(counter_doc_id(""), "lotID");
        assert_eq!(counter_doc_id("srv1"), "lotID_srv1");
        assert_eq!(date_key(date!(2024 - 03 - 05)), "2024-03-05");
    }
}
