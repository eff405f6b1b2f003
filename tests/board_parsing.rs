use board_speaker::board::markup::REPLY_ANCHOR_SCHEME;
use board_speaker::board::post::{ParseError, Post, REDACTED_MARKER};
use board_speaker::board::thread::parse_thread;
use board_speaker::board::Dialect;

const JBBS_THREAD: &str = "\
1<>名無しさん<><>2024/01/01(月) 12:00:00<>スレ立て乙&amp;よろしく<br>http://example.com/a<>雑談スレ<>aaa\n\
2<>名無し<b>◆trip</b><>sage<>2024/01/01(月) 12:01:00<><a href=\"../test/read.cgi/1\">&gt;&gt;1</a> 乙<><>bbb\n\
broken<>record\n\
5<>名無しさん<><>2024/01/01(月) 12:05:00<><font color=red>赤</font>字<><>\n";

#[test]
fn jbbs_thread_end_to_end() {
    let posts = parse_thread(JBBS_THREAD, Dialect::Jbbs);
    let numbers: Vec<i32> = posts.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

    assert_eq!(posts[0].thread_title, "雑談スレ");
    assert_eq!(posts[0].plain_body, "スレ立て乙&よろしく\nhttp://example.com/a");
    assert!(posts[0]
        .display_body
        .contains("<a href=\"http://example.com/a\">http://example.com/a</a>"));
    assert!(posts[0].display_body.contains("乙&amp;よろしく<br>"));

    assert_eq!(posts[1].author, "名無し◆trip");
    assert_eq!(posts[1].plain_body, ">>1 乙");
    assert!(posts[1]
        .display_body
        .contains(&format!("<a href=\"{REPLY_ANCHOR_SCHEME}1\">&gt;&gt;1</a>")));

    assert!(posts[2].is_redacted());
    assert!(posts[3].is_redacted());
    assert_eq!(posts[3].author, REDACTED_MARKER);

    assert_eq!(posts[4].plain_body, "赤字");
    assert!(!posts[4].display_body.contains(" ID:"));
}

#[test]
fn nichan_record_splits_date_and_id() {
    let post = Post::parse(
        "名無しさん<>sage<>2024/01/01(月) 12:00:00.00 ID:Abc+/123<> 本文です <>スレタイ",
        Dialect::Nichan,
    )
    .unwrap();
    assert_eq!(post.number, -1);
    assert_eq!(post.posted_at, "2024/01/01(月) 12:00:00.00");
    assert_eq!(post.poster_id, "Abc+/123");
    assert_eq!(post.thread_title, "スレタイ");
    assert!(post.display_body.contains(" ID:Abc+/123"));
}

#[test]
fn short_records_are_rejected() {
    assert_eq!(
        Post::parse("1<>a<>b<>c<>d<>e", Dialect::Jbbs),
        Err(ParseError::TooFewFields {
            dialect: Dialect::Jbbs,
            found: 6,
            expected: 7,
        })
    );
    assert!(Post::parse("a<>b<>c<>d", Dialect::Nichan).is_err());
}

#[test]
fn raw_record_is_kept_until_redacted() {
    let raw = "3<>名無し<><>date<>本文<><>id";
    let mut post = Post::parse(raw, Dialect::Jbbs).unwrap();
    assert_eq!(post.raw_record, raw);
    assert!(!post.is_redacted());

    post.redact();
    assert!(post.is_redacted());
    assert!(post.raw_record.is_empty());
    assert_eq!(post.plain_body, REDACTED_MARKER);
    assert_eq!(post.number, 3);
    assert!(post.display_body.contains(REDACTED_MARKER));
}

#[test]
fn hostile_numbers_and_adjacent_links_stay_contained() {
    let text = "1<>A<><>d<>http://example.com/&gt;&gt;1<><>\n\
                2147483647<>B<><>d<>huge<><>\n\
                3<>C<><>d<>three<><>\n";
    let posts = parse_thread(text, Dialect::Jbbs);
    let numbers: Vec<i32> = posts.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    assert_eq!(posts[0].plain_body, "http://example.com/>>1");
    assert!(posts[0].display_body.contains(&format!(
        "<a href=\"http://example.com/\">http://example.com/</a>\
         <a href=\"{REPLY_ANCHOR_SCHEME}1\">&gt;&gt;1</a>"
    )));
}
