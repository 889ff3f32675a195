//! Tests for channel and programme filtering

use super::*;
use crate::epg::parser::{EpgParser, Programme};
use crate::epg::time::parse_time;

fn channels(ids: &[&str]) -> Vec<Channel> {
    ids.iter().map(|id| Channel { id: id.to_string() }).collect()
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

fn ids(rows: &[ChannelRow]) -> Vec<&str> {
    rows.iter().map(|r| r.id.as_str()).collect()
}

fn now() -> NaiveDateTime {
    parse_time("20240115200000").unwrap()
}

fn programme(channel: &str, start: &str, title: &str) -> Programme {
    Programme {
        channel: channel.to_string(),
        start: parse_time(start),
        title: title.to_string(),
        ..Programme::default()
    }
}

fn listing(programmes: Vec<Programme>) -> Listing {
    Listing {
        channels: Vec::new(),
        programmes,
    }
}

fn titles(rows: &[ProgrammeRow]) -> Vec<&str> {
    rows.iter().map(|r| r.title.as_str()).collect()
}

#[test]
fn test_hidden_never_listed() {
    let all = channels(&["BBC1", "CNN", "TVN", "Polsat"]);
    let hidden = set(&["BBC1", "TVN"]);
    let favorites = set(&["BBC1", "CNN"]);

    for text in ["", "b", "BBC", "tvn", "n"] {
        for favorites_only in [false, true] {
            let rows = filter_channels(&all, &favorites, &hidden, text, favorites_only);
            assert!(rows.iter().all(|r| !hidden.contains(&r.id)), "text={text:?}");
        }
    }
}

#[test]
fn test_favorites_first_stable() {
    let all = channels(&["a1", "b2", "c3", "d4", "e5"]);
    let favorites = set(&["d4", "b2"]);
    let rows = filter_channels(&all, &favorites, &BTreeSet::new(), "", false);
    assert_eq!(ids(&rows), vec!["b2", "d4", "a1", "c3", "e5"]);
    assert!(rows[0].favorite && rows[1].favorite && !rows[2].favorite);
}

#[test]
fn test_text_filter_case_insensitive() {
    let all = channels(&["TVP1", "tvp2", "Polsat", "TVN"]);
    let rows = filter_channels(&all, &BTreeSet::new(), &BTreeSet::new(), "tvP", false);
    assert_eq!(ids(&rows), vec!["TVP1", "tvp2"]);
}

#[test]
fn test_favorites_only() {
    let all = channels(&["A", "B", "C"]);
    let favorites = set(&["C", "A"]);
    let rows = filter_channels(&all, &favorites, &BTreeSet::new(), "", true);
    assert_eq!(ids(&rows), vec!["A", "C"]);
}

#[test]
fn test_channel_row_label() {
    let fav = ChannelRow { id: "CNN".into(), favorite: true };
    let plain = ChannelRow { id: "BBC1".into(), favorite: false };
    assert_eq!(fav.label(), "⭐ CNN");
    assert_eq!(plain.label(), "BBC1");
}

#[test]
fn test_programme_look_back_boundary() {
    let l = listing(vec![
        programme("A", "20240115185959", "too old"),
        programme("A", "20240115190000", "exactly one hour"),
        programme("A", "20240115193000", "half hour ago"),
        programme("A", "20240220120000", "far future"),
    ]);
    let rows = filter_programmes(
        &l,
        &set(&["A"]),
        "",
        now(),
        &ProgrammeWindow::default(),
        ProgrammeOrder::Document,
    );
    assert_eq!(titles(&rows), vec!["exactly one hour", "half hour ago", "far future"]);
    let floor = now() - Duration::hours(1);
    assert!(rows.iter().all(|r| r.start >= floor));
}

#[test]
fn test_programme_unparseable_start_excluded() {
    let l = listing(vec![
        programme("A", "notadate", "Match"),
        programme("A", "", "Match"),
        programme("A", "2024011520", "Match"),
        programme("A", "20240115210000 +0100", "Match"),
    ]);
    let rows = filter_programmes(
        &l,
        &set(&["A"]),
        "match",
        now(),
        &ProgrammeWindow::default(),
        ProgrammeOrder::Document,
    );
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start, parse_time("20240115210000").unwrap());
}

#[test]
fn test_programme_channel_and_title_filter() {
    let l = listing(vec![
        programme("A", "20240115210000", "Evening News"),
        programme("B", "20240115210000", "Late news"),
        programme("C", "20240115210000", "News"),
        programme("A", "20240115220000", "Film"),
    ]);
    let rows = filter_programmes(
        &l,
        &set(&["A", "B"]),
        "NEWS",
        now(),
        &ProgrammeWindow::default(),
        ProgrammeOrder::Document,
    );
    assert_eq!(titles(&rows), vec!["Evening News", "Late news"]);
}

#[test]
fn test_programme_empty_selection() {
    let l = listing(vec![programme("A", "20240115210000", "X")]);
    let rows = filter_programmes(
        &l,
        &BTreeSet::new(),
        "",
        now(),
        &ProgrammeWindow::default(),
        ProgrammeOrder::Document,
    );
    assert!(rows.is_empty());
}

#[test]
fn test_programme_order() {
    let l = listing(vec![
        programme("B", "20240115230000", "third"),
        programme("A", "20240115210000", "first"),
        programme("A", "20240115220000", "second"),
    ]);
    let selected = set(&["A", "B"]);
    let window = ProgrammeWindow::default();

    let doc = filter_programmes(&l, &selected, "", now(), &window, ProgrammeOrder::Document);
    assert_eq!(titles(&doc), vec!["third", "first", "second"]);

    let sorted = filter_programmes(&l, &selected, "", now(), &window, ProgrammeOrder::StartTime);
    assert_eq!(titles(&sorted), vec!["first", "second", "third"]);
}

#[test]
fn test_programme_look_ahead() {
    let l = listing(vec![
        programme("A", "20240115210000", "soon"),
        programme("A", "20240117210000", "in two days"),
    ]);
    let window = ProgrammeWindow {
        look_back: Duration::hours(1),
        look_ahead: Some(Duration::hours(24)),
    };
    let rows = filter_programmes(&l, &set(&["A"]), "", now(), &window, ProgrammeOrder::Document);
    assert_eq!(titles(&rows), vec!["soon"]);
}

#[test]
fn test_rows_carry_lookup_key() {
    let xml = r#"<tv>
  <programme start="20240115210000" channel="A"><title>Weather</title><desc>A weather</desc></programme>
  <programme start="20240115210000" channel="B"><title>Weather</title><desc>B weather</desc></programme>
</tv>"#;
    let l = EpgParser::parse(xml).unwrap();
    let rows = filter_programmes(
        &l,
        &set(&["B"]),
        "weather",
        now(),
        &ProgrammeWindow::default(),
        ProgrammeOrder::Document,
    );
    assert_eq!(rows.len(), 1);
    let details = l.programme(&rows[0].key).unwrap();
    assert_eq!(details.description.as_deref(), Some("B weather"));
}
