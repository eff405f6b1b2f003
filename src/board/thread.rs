//! Whole-thread parsing.
//!
//! A thread is one record per line. Records that fail to parse are skipped;
//! 2ch posts are numbered by position, and jbbs numbering gaps between posts
//! (posts the board has deleted) are filled with redacted placeholders.
//! Jbbs numbers past the dialect's post limit are not trusted and their
//! records are skipped.

use tracing::debug;

use super::post::Post;
use super::Dialect;

pub fn parse_thread(text: &str, dialect: Dialect) -> Vec<Post> {
    let mut posts: Vec<Post> = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut post = match Post::parse(line, dialect) {
            Ok(p) => p,
            Err(e) => {
                debug!("Skipping line {}: {e}", line_no + 1);
                continue;
            }
        };

        if dialect == Dialect::Jbbs && post.number > dialect.max_posts() {
            debug!(
                "Skipping line {}: post number {} is past the {} post limit",
                line_no + 1,
                post.number,
                dialect.max_posts()
            );
            continue;
        }

        let next = posts.last().map_or(1, |p| p.number.saturating_add(1));
        match dialect {
            Dialect::Nichan => post.assign_number(next),
            Dialect::Jbbs if post.number < 0 => post.assign_number(next),
            Dialect::Jbbs if !posts.is_empty() => {
                for missing in next..post.number {
                    posts.push(Post::deleted(missing));
                }
            }
            // A thread may be served from the middle; nothing to fill before it.
            Dialect::Jbbs => {}
        }
        posts.push(post);
    }

    posts
}
