use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use board_speaker::board::Dialect;
use board_speaker::history::{History, SpokenRecord};
use board_speaker::reader::ThreadReader;
use board_speaker::speech::dispatcher::SpeechDispatcher;
use board_speaker::speech::relay::RelayClient;
use board_speaker::speech::{SpeechError, SpeechSynthesizer};

/// Records every utterance instead of playing it.
#[derive(Default)]
struct RecordingSynth {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSynth {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for RecordingSynth {
    fn installed_voices(&self, _locale: &str) -> Vec<String> {
        vec!["jf_alpha".into()]
    }

    fn select_voice(&self, _name: &str) -> Result<(), SpeechError> {
        Ok(())
    }

    fn set_rate(&self, _rate: i32) {}

    fn set_volume(&self, _volume: u8) {}

    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn dispatcher(synth: &Arc<RecordingSynth>) -> Arc<SpeechDispatcher> {
    let synth: Arc<dyn SpeechSynthesizer> = synth.clone();
    let d = SpeechDispatcher::new(Some(synth), RelayClient::default(), "ja-JP");
    d.initialize();
    d.select_initial_voice("");
    Arc::new(d)
}

fn record(number: i32, body: &str) -> String {
    format!("{number}<>名無しさん<>sage<>2024/01/01(月) 12:00:00<>{body}<>テストスレ<>abc123\n")
}

fn append(path: &Path, lines: &[String]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        file.write_all(line.as_bytes()).unwrap();
    }
}

#[tokio::test]
async fn reads_only_new_posts_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.dat");
    append(&path, &[record(1, "一つ目"), record(2, "二つ目<br>改行")]);

    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Jbbs, dispatcher(&synth));

    assert_eq!(reader.read_new_posts().await, 2);
    assert_eq!(synth.spoken(), vec!["一つ目", "二つ目\n改行"]);
    assert_eq!(reader.last_spoken(), 2);

    // Nothing new: nothing spoken.
    assert_eq!(reader.read_new_posts().await, 0);

    append(&path, &[record(3, "三つ目")]);
    assert_eq!(reader.read_new_posts().await, 1);
    assert_eq!(synth.spoken().last().map(String::as_str), Some("三つ目"));
    assert_eq!(reader.last_spoken(), 3);
}

#[tokio::test]
async fn deleted_posts_are_skipped_but_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.dat");
    append(&path, &[record(1, "first"), record(4, "fourth")]);

    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Jbbs, dispatcher(&synth));

    assert_eq!(reader.read_new_posts().await, 2);
    assert_eq!(synth.spoken(), vec!["first", "fourth"]);
    assert_eq!(reader.last_spoken(), 4);
}

#[tokio::test]
async fn announces_post_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.dat");
    append(&path, &[record(7, "hello")]);

    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Jbbs, dispatcher(&synth)).announce_numbers(true);

    reader.read_new_posts().await;
    assert_eq!(synth.spoken(), vec!["7. hello"]);
}

#[tokio::test]
async fn start_after_skips_earlier_posts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.dat");
    append(&path, &[record(1, "a"), record(2, "b"), record(3, "c")]);

    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Jbbs, dispatcher(&synth)).start_after(2);

    assert_eq!(reader.read_new_posts().await, 1);
    assert_eq!(synth.spoken(), vec!["c"]);
}

#[tokio::test]
async fn missing_file_reads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&dir.path().join("gone.dat"), Dialect::Jbbs, dispatcher(&synth));

    assert_eq!(reader.read_new_posts().await, 0);
    assert!(synth.spoken().is_empty());
}

#[tokio::test]
async fn history_records_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.dat");
    let history_dir = dir.path().join("history");
    append(&path, &[record(1, "a"), record(2, "b")]);

    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Jbbs, dispatcher(&synth))
        .with_history(History::new(history_dir.clone()), true);
    assert_eq!(reader.read_new_posts().await, 2);

    let history = History::new(history_dir.clone());
    let records: Vec<SpokenRecord> = history
        .list_dates()
        .iter()
        .flat_map(|date| history.load(date))
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].number, 2);
    assert_eq!(records[1].voice, "jf_alpha");
    assert_eq!(records[1].author, "名無しさん");

    // A second run on the same thread picks up after post #2.
    append(&path, &[record(3, "c")]);
    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Jbbs, dispatcher(&synth))
        .with_history(History::new(history_dir), true);
    assert_eq!(reader.last_spoken(), 2);
    assert_eq!(reader.read_new_posts().await, 1);
    assert_eq!(synth.spoken(), vec!["c"]);
}

#[tokio::test]
async fn nichan_threads_are_read_by_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thread.dat");
    append(
        &path,
        &[
            "名無し<>sage<>2024/01/01 ID:aaa<>最初 <>スレタイ\n".to_string(),
            "名無し<><>2024/01/01 ID:bbb<> 次 <>\n".to_string(),
        ],
    );

    let synth = Arc::new(RecordingSynth::default());
    let reader = ThreadReader::new(&path, Dialect::Nichan, dispatcher(&synth));

    assert_eq!(reader.read_new_posts().await, 2);
    assert_eq!(reader.last_spoken(), 2);
    assert!(!reader.is_complete());
}
