//! Channel and programme selection over a loaded listing.
//!
//! Both filters are pure: they read the listing and preference sets and
//! return fresh rows for the caller to display.

use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeSet;

use super::parser::{Channel, Listing, ProgrammeKey};

/// A row of the channel list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    pub id: String,
    pub favorite: bool,
}

impl ChannelRow {
    pub fn label(&self) -> String {
        if self.favorite {
            format!("⭐ {}", self.id)
        } else {
            self.id.clone()
        }
    }
}

/// Hidden channels are dropped, then the text and favorites-only filters apply.
/// Favorites come first; each bucket keeps listing order.
pub fn filter_channels(
    channels: &[Channel],
    favorites: &BTreeSet<String>,
    hidden: &BTreeSet<String>,
    text: &str,
    favorites_only: bool,
) -> Vec<ChannelRow> {
    let needle = text.to_lowercase();

    let (favs, rest): (Vec<ChannelRow>, Vec<ChannelRow>) = channels
        .iter()
        .filter(|c| !hidden.contains(&c.id))
        .filter(|c| c.id.to_lowercase().contains(&needle))
        .map(|c| ChannelRow {
            id: c.id.clone(),
            favorite: favorites.contains(&c.id),
        })
        .filter(|row| !favorites_only || row.favorite)
        .partition(|row| row.favorite);

    favs.into_iter().chain(rest).collect()
}

/// Time bounds applied to programme start times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammeWindow {
    /// How far before `now` a programme may have started
    pub look_back: Duration,
    /// Upper bound on start after `now`; `None` shows everything ahead
    pub look_ahead: Option<Duration>,
}

impl Default for ProgrammeWindow {
    fn default() -> Self {
        Self {
            look_back: Duration::hours(1),
            look_ahead: None,
        }
    }
}

impl ProgrammeWindow {
    pub fn contains(&self, start: NaiveDateTime, now: NaiveDateTime) -> bool {
        if start < now - self.look_back {
            return false;
        }
        match self.look_ahead {
            Some(ahead) => start <= now + ahead,
            None => true,
        }
    }
}

/// Ordering of the programme list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgrammeOrder {
    /// As the programmes appear in the source document
    #[default]
    Document,
    /// Stable sort by start time
    StartTime,
}

/// A row of the programme list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgrammeRow {
    pub key: ProgrammeKey,
    pub channel: String,
    pub start: NaiveDateTime,
    pub stop: Option<NaiveDateTime>,
    pub title: String,
}

/// Programmes on `selected` channels within `window` of `now` whose title
/// contains `text`. Programmes with an unparseable start never match.
pub fn filter_programmes(
    listing: &Listing,
    selected: &BTreeSet<String>,
    text: &str,
    now: NaiveDateTime,
    window: &ProgrammeWindow,
    order: ProgrammeOrder,
) -> Vec<ProgrammeRow> {
    if selected.is_empty() {
        return Vec::new();
    }
    let needle = text.to_lowercase();

    let mut rows: Vec<ProgrammeRow> = listing
        .programmes
        .iter()
        .filter(|p| selected.contains(&p.channel))
        .filter_map(|p| {
            let key = p.key()?;
            let start = key.start;
            if !window.contains(start, now) {
                return None;
            }
            if !needle.is_empty() && !p.title.to_lowercase().contains(&needle) {
                return None;
            }
            Some(ProgrammeRow {
                key,
                channel: p.channel.clone(),
                start,
                stop: p.stop,
                title: p.title.clone(),
            })
        })
        .collect();

    if order == ProgrammeOrder::StartTime {
        rows.sort_by_key(|r| r.start);
    }
    rows
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
