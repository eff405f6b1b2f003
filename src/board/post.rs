//! Parsed board post and the record parser.

use thiserror::Error;

use super::markup::{self, PostHeader};
use super::{Dialect, FIELD_DELIMITER, ID_DELIMITER};

/// Author and body text of a post that has been deleted.
pub const REDACTED_MARKER: &str = "⟨deleted⟩";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{dialect} record has {found} fields, expected at least {expected}")]
    TooFewFields {
        dialect: Dialect,
        found: usize,
        expected: usize,
    },
}

/// A single post of a thread.
///
/// `number` is `-1` while unknown: 2ch records never carry one, and a
/// malformed jbbs number is tolerated rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub number: i32,
    pub author: String,
    pub mail_address: String,
    pub posted_at: String,
    pub poster_id: String,
    pub thread_title: String,
    pub raw_body: String,
    pub plain_body: String,
    pub display_body: String,
    pub raw_record: String,
}

impl Default for Post {
    fn default() -> Self {
        Self {
            number: -1,
            author: String::new(),
            mail_address: String::new(),
            posted_at: String::new(),
            poster_id: String::new(),
            thread_title: String::new(),
            raw_body: String::new(),
            plain_body: String::new(),
            display_body: String::new(),
            raw_record: String::new(),
        }
    }
}

impl Post {
    /// Parse one raw record. Fails without producing anything if the record
    /// has fewer fields than the dialect requires.
    pub fn parse(raw: &str, dialect: Dialect) -> Result<Self, ParseError> {
        let fields: Vec<&str> = raw.split(FIELD_DELIMITER).collect();
        if fields.len() < dialect.min_fields() {
            return Err(ParseError::TooFewFields {
                dialect,
                found: fields.len(),
                expected: dialect.min_fields(),
            });
        }

        let mut post = match dialect {
            Dialect::Jbbs => Self {
                number: fields[0].trim().parse().unwrap_or(-1),
                author: markup::to_plain_text(fields[1]),
                mail_address: markup::to_plain_text(fields[2]),
                posted_at: fields[3].to_string(),
                raw_body: fields[4].to_string(),
                thread_title: fields[5].to_string(),
                poster_id: fields[6].to_string(),
                ..Self::default()
            },
            Dialect::Nichan => {
                // Anything after a second " ID:" is not part of the id.
                let mut date_parts = fields[2].split(ID_DELIMITER);
                let posted_at = date_parts.next().unwrap_or_default();
                let poster_id = date_parts.next().unwrap_or_default();
                Self {
                    author: markup::to_plain_text(fields[0]),
                    mail_address: markup::to_plain_text(fields[1]),
                    posted_at: posted_at.to_string(),
                    poster_id: poster_id.to_string(),
                    raw_body: fields[3].to_string(),
                    thread_title: fields[4].to_string(),
                    ..Self::default()
                }
            }
        };

        post.raw_record = raw.to_string();
        post.plain_body = markup::to_plain_text(&post.raw_body);
        // Display composition must see the decoded text, never the raw markup.
        post.render_display();
        Ok(post)
    }

    /// Set the sequence number of a post whose record didn't carry one.
    pub fn assign_number(&mut self, number: i32) {
        self.number = number;
        self.render_display();
    }

    /// Placeholder for a post the board no longer serves.
    pub fn deleted(number: i32) -> Self {
        let mut post = Self {
            number,
            ..Self::default()
        };
        post.redact();
        post
    }

    /// Replace the post's content with the deletion marker. There is no way
    /// back to the original content afterwards.
    pub fn redact(&mut self) {
        self.author = REDACTED_MARKER.to_string();
        self.plain_body = REDACTED_MARKER.to_string();
        self.raw_body.clear();
        self.raw_record.clear();
        self.render_display();
    }

    pub fn is_redacted(&self) -> bool {
        self.raw_record.is_empty() && self.plain_body == REDACTED_MARKER
    }

    fn render_display(&mut self) {
        let header = PostHeader {
            number: self.number,
            author: &self.author,
            mail_address: &self.mail_address,
            posted_at: &self.posted_at,
            poster_id: &self.poster_id,
        };
        self.display_body = markup::render_post_html(&header, &markup::to_display_html(&self.plain_body));
    }
}
