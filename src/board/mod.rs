//! Bulletin-board records: dialects, post parsing and markup transcoding.
//!
//! Components:
//! - `markup`: ordered rewrite pipelines (raw markup → plain text → display HTML)
//! - `post`: the parsed post entity and the record parser
//! - `thread`: whole-thread parsing with numbering and gap filling

pub mod markup;
pub mod post;
pub mod thread;

use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Field delimiter shared by both record layouts.
pub const FIELD_DELIMITER: &str = "<>";

/// Separates the timestamp from the poster id inside a 2ch date field.
pub const ID_DELIMITER: &str = " ID:";

/// Record layout of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Dialect {
    /// Shitaraba (jbbs) layout:
    /// `number<>author<>mail<>date<>body<>title<>id`
    #[default]
    #[serde(rename = "jbbs")]
    Jbbs,
    /// 2ch layout: `author<>mail<>date ID:id<>body<>title`
    #[serde(rename = "2ch")]
    Nichan,
}

impl Dialect {
    /// Minimum number of `<>`-separated fields a record must have.
    pub fn min_fields(self) -> usize {
        match self {
            Self::Jbbs => 7,
            Self::Nichan => 5,
        }
    }

    /// Nominal maximum number of posts in a thread.
    pub fn max_posts(self) -> i32 {
        match self {
            Self::Jbbs => 1000,
            Self::Nichan => 1001,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dialect: {0}")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jbbs" | "shitaraba" => Ok(Self::Jbbs),
            "2ch" | "nichan" | "5ch" => Ok(Self::Nichan),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jbbs => write!(f, "jbbs"),
            Self::Nichan => write!(f, "2ch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_limits() {
        assert_eq!(Dialect::Jbbs.min_fields(), 7);
        assert_eq!(Dialect::Nichan.min_fields(), 5);
        assert_eq!(Dialect::Jbbs.max_posts(), 1000);
        assert_eq!(Dialect::Nichan.max_posts(), 1001);
    }

    #[test]
    fn dialect_names_round_trip_through_display() {
        for dialect in [Dialect::Jbbs, Dialect::Nichan] {
            assert_eq!(dialect.to_string().parse(), Ok(dialect));
        }
        assert_eq!("5CH".parse(), Ok(Dialect::Nichan));
        assert_eq!(
            "usenet".parse::<Dialect>(),
            Err(UnknownDialect("usenet".into()))
        );
    }

    #[test]
    fn dialect_deserializes_from_config_names() {
        let d: Dialect = serde_yml::from_str("2ch").unwrap();
        assert_eq!(d, Dialect::Nichan);
        let d: Dialect = serde_yml::from_str("jbbs").unwrap();
        assert_eq!(d, Dialect::Jbbs);
    }
}
