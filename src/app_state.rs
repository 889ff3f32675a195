//! Session state behind the viewer window
//!
//! Owns the loaded listing, the preference sets and the current filters, and
//! keeps the visible channel and programme rows in sync with them. The window
//! only forwards user input here and renders the resulting rows.

use chrono::NaiveDateTime;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::epg::{
    filter_channels, filter_programmes, ChannelRow, Listing, LoadOrigin, Programme,
    ProgrammeKey, ProgrammeOrder, ProgrammeRow, ProgrammeWindow,
};
use crate::error::Result;
use crate::prefs::Preferences;

pub struct AppState {
    pub listing: Listing,
    pub origin: Option<LoadOrigin>,
    pub prefs: Preferences,

    // Channel filter
    pub channel_text: String,
    pub favorites_only: bool,

    // Programme filter
    pub programme_text: String,
    /// Search programmes on every favorite channel instead of the selection
    pub search_favorites: bool,
    pub window: ProgrammeWindow,
    pub order: ProgrammeOrder,

    pub selected: BTreeSet<String>,
    pub channels: Vec<ChannelRow>,
    pub programmes: Vec<ProgrammeRow>,
    pub selected_programme: Option<ProgrammeKey>,
}

impl AppState {
    pub fn new(prefs: Preferences, window: ProgrammeWindow, order: ProgrammeOrder) -> Self {
        Self {
            listing: Listing::new(),
            origin: None,
            prefs,
            channel_text: String::new(),
            favorites_only: false,
            programme_text: String::new(),
            search_favorites: false,
            window,
            order,
            selected: BTreeSet::new(),
            channels: Vec::new(),
            programmes: Vec::new(),
            selected_programme: None,
        }
    }

    /// Swap in a freshly loaded listing and rebuild every view
    pub fn replace_listing(&mut self, listing: Listing, origin: LoadOrigin, now: NaiveDateTime) {
        info!(
            "listing from {}: {} channels, {} programmes",
            origin.label(),
            listing.channel_count(),
            listing.programme_count()
        );
        self.listing = listing;
        self.origin = Some(origin);
        self.refresh_channels();
        self.refresh_programmes(now);
    }

    pub fn set_channel_text(&mut self, text: &str) {
        self.channel_text = text.to_string();
        self.refresh_channels();
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.favorites_only = favorites_only;
        self.refresh_channels();
    }

    /// Recompute channel rows. Selected channels that dropped out of view are deselected.
    pub fn refresh_channels(&mut self) {
        self.channels = filter_channels(
            &self.listing.channels,
            self.prefs.favorites.ids(),
            self.prefs.hidden.ids(),
            &self.channel_text,
            self.favorites_only,
        );
        let visible: BTreeSet<&str> = self.channels.iter().map(|r| r.id.as_str()).collect();
        self.selected.retain(|id| visible.contains(id.as_str()));
        debug!("{} channels visible", self.channels.len());
    }

    /// Selected ids in display order
    pub fn selected_ids(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|r| self.selected.contains(&r.id))
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// Replace the selection with a single channel
    pub fn select_only(&mut self, id: &str, now: NaiveDateTime) {
        self.selected.clear();
        self.selected.insert(id.to_string());
        self.refresh_programmes(now);
    }

    /// Add or remove one channel from the selection
    pub fn toggle_selection(&mut self, id: &str, now: NaiveDateTime) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
        self.refresh_programmes(now);
    }

    pub fn set_selection<I>(&mut self, ids: I, now: NaiveDateTime)
    where
        I: IntoIterator<Item = String>,
    {
        self.selected = ids.into_iter().collect();
        self.refresh_channels();
        self.refresh_programmes(now);
    }

    pub fn set_programme_text(&mut self, text: &str, now: NaiveDateTime) {
        self.programme_text = text.to_string();
        self.refresh_programmes(now);
    }

    pub fn set_search_favorites(&mut self, search_favorites: bool, now: NaiveDateTime) {
        self.search_favorites = search_favorites;
        self.refresh_programmes(now);
    }

    /// Recompute programme rows; the details pane is cleared
    pub fn refresh_programmes(&mut self, now: NaiveDateTime) {
        let source = if self.search_favorites {
            self.prefs.favorites.ids()
        } else {
            &self.selected
        };
        self.programmes = filter_programmes(
            &self.listing,
            source,
            &self.programme_text,
            now,
            &self.window,
            self.order,
        );
        self.selected_programme = None;
    }

    /// Flip favorite status of the selected channels and save.
    /// Returns `Ok(false)` when nothing is selected.
    pub fn toggle_favorite_selected(&mut self, now: NaiveDateTime) -> Result<bool> {
        let ids = self.selected_ids();
        let result = self.prefs.toggle_favorites(&ids);
        if !ids.is_empty() {
            self.refresh_channels();
            if self.search_favorites {
                self.refresh_programmes(now);
            }
        }
        result
    }

    /// Hide the selected channels and save both sets. Clears the selection,
    /// the programme list and the details pane.
    pub fn hide_selected(&mut self) -> Result<bool> {
        let ids = self.selected_ids();
        let result = self.prefs.hide(&ids);
        if !ids.is_empty() {
            info!("hid {} channel(s)", ids.len());
            self.selected.clear();
            self.refresh_channels();
            self.programmes.clear();
            self.selected_programme = None;
        }
        result
    }

    pub fn select_programme(&mut self, key: ProgrammeKey) {
        self.selected_programme = Some(key);
    }

    pub fn selected_details(&self) -> Option<&Programme> {
        self.selected_programme
            .as_ref()
            .and_then(|key| self.listing.programme(key))
    }
}

#[cfg(test)]
#[path = "app_state_tests.rs"]
mod tests;
