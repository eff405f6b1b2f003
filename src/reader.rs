//! Thread reader: follows a thread file and reads new posts aloud in order.
//!
//! Every poll the whole file is re-read and re-parsed; posts numbered past
//! the last spoken one are handed to the dispatcher one at a time, each
//! utterance awaited before the next starts.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::board::post::Post;
use crate::board::thread::parse_thread;
use crate::board::Dialect;
use crate::history::{History, SpokenRecord};
use crate::speech::dispatcher::SpeechDispatcher;

pub struct ThreadReader {
    path: PathBuf,
    dialect: Dialect,
    dispatcher: Arc<SpeechDispatcher>,
    history: Option<History>,
    announce_number: bool,
    poll_interval: Duration,
    last_spoken: Arc<AtomicI32>,
}

impl ThreadReader {
    pub fn new(path: &Path, dialect: Dialect, dispatcher: Arc<SpeechDispatcher>) -> Self {
        Self {
            path: path.to_path_buf(),
            dialect,
            dispatcher,
            history: None,
            announce_number: false,
            poll_interval: Duration::from_millis(1000),
            last_spoken: Arc::new(AtomicI32::new(0)),
        }
    }

    /// Record spoken posts, and with `resume` skip those an earlier run spoke.
    pub fn with_history(mut self, history: History, resume: bool) -> Self {
        if resume {
            if let Some(n) = history.last_spoken_number(&self.thread_key()) {
                info!("Resuming {} after post #{n}", self.path.display());
                self.last_spoken.store(n, Ordering::Relaxed);
            }
        }
        self.history = Some(history);
        self
    }

    pub fn announce_numbers(mut self, announce: bool) -> Self {
        self.announce_number = announce;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Treat posts up to and including `number` as already read.
    pub fn start_after(self, number: i32) -> Self {
        self.last_spoken.store(number, Ordering::Relaxed);
        self
    }

    /// Live view of the last spoken post number.
    pub fn progress(&self) -> Arc<AtomicI32> {
        self.last_spoken.clone()
    }

    pub fn last_spoken(&self) -> i32 {
        self.last_spoken.load(Ordering::Relaxed)
    }

    /// Whether the thread has reached its dialect's post limit.
    pub fn is_complete(&self) -> bool {
        self.last_spoken() >= self.dialect.max_posts()
    }

    fn thread_key(&self) -> String {
        self.path
            .canonicalize()
            .unwrap_or_else(|_| self.path.clone())
            .display()
            .to_string()
    }

    fn utterance(&self, post: &Post) -> String {
        if self.announce_number {
            format!("{}. {}", post.number, post.plain_body)
        } else {
            post.plain_body.clone()
        }
    }

    /// Read the file once and speak every post not spoken yet.
    /// Returns how many posts were spoken.
    pub async fn read_new_posts(&self) -> usize {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to read {}: {e}", self.path.display());
                return 0;
            }
        };

        let mut spoken = 0;
        for post in parse_thread(&text, self.dialect) {
            if post.number <= self.last_spoken() {
                continue;
            }

            if post.is_redacted() || post.plain_body.trim().is_empty() {
                debug!("Skipping post #{} (nothing to read)", post.number);
            } else {
                let utterance = self.utterance(&post);
                let preview: String = utterance.chars().take(40).collect();
                info!("Reading #{} by {}: \"{}\"", post.number, post.author, preview.replace('\n', " "));

                if let Err(e) = self.dispatcher.speak(&utterance).await {
                    warn!("Speech task for post #{} failed: {e}", post.number);
                }
                if let Some(history) = &self.history {
                    history.save(&SpokenRecord::now(
                        &self.thread_key(),
                        post.number,
                        &post.author,
                        &self.dispatcher.selected_voice(),
                        utterance.chars().count(),
                    ));
                }
                spoken += 1;
            }
            self.last_spoken.store(post.number, Ordering::Relaxed);
        }
        spoken
    }

    /// Follow the thread until it is full or the process is interrupted.
    pub async fn run(&self) {
        info!(
            "Following {} ({} dialect, every {}ms)",
            self.path.display(),
            self.dialect,
            self.poll_interval.as_millis()
        );

        let mut poll = tokio::time::interval(self.poll_interval);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.read_new_posts().await;
                    if self.is_complete() {
                        info!("Thread reached {} posts, stopping", self.dialect.max_posts());
                        break;
                    }
                }
                _ = &mut shutdown => {
                    info!("Interrupted, stopping reader");
                    break;
                }
            }
        }
    }
}
