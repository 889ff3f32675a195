//! Favorite and hidden channel sets
//!
//! Each set lives in its own text file, one channel id per line. Files are
//! rewritten whole, in sorted order, after every change.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{EpgError, Result};

pub const FAVORITES_FILE: &str = "favorites.txt";
pub const HIDDEN_FILE: &str = "hidden_channels.txt";

/// A set of channel ids bound to the file it is persisted in
#[derive(Debug, Clone)]
pub struct ChannelSet {
    path: PathBuf,
    ids: BTreeSet<String>,
    /// Set when the file exists but could not be read; saving would clobber it
    detached: bool,
}

impl ChannelSet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ids: BTreeSet::new(),
            detached: false,
        }
    }

    /// Read the set from `path`. A missing file is an empty set.
    /// Bytes that are not UTF-8 are replaced rather than failing the load.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let mut set = Self::new(path);
        if set.path.exists() {
            let bytes = fs::read(&set.path)?;
            let content = String::from_utf8_lossy(&bytes);
            if matches!(content, Cow::Owned(_)) {
                warn!("{} is not valid UTF-8, replacing bad bytes", set.path.display());
            }
            set.ids = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            debug!("loaded {} ids from {}", set.ids.len(), set.path.display());
        }
        Ok(set)
    }

    /// Load from `path`, or keep an in-memory set that refuses to save
    /// when the file is there but unreadable.
    pub fn load_or_detach(path: impl Into<PathBuf>) -> (Self, Option<EpgError>) {
        let path = path.into();
        match Self::load(&path) {
            Ok(set) => (set, None),
            Err(e) => {
                warn!("could not read {}: {}, changes will not be saved", path.display(), e);
                let mut set = Self::new(path);
                set.detached = true;
                (set, Some(e))
            }
        }
    }

    /// Overwrite the file with the current set, one id per line
    pub fn save(&self) -> Result<()> {
        if self.detached {
            return Err(EpgError::Detached { path: self.path.clone() });
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = String::new();
        for id in &self.ids {
            content.push_str(id);
            content.push('\n');
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Flip membership; returns whether `id` is now in the set
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }
}

/// Favorites and hidden channels. The two sets never share an id.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub favorites: ChannelSet,
    pub hidden: ChannelSet,
}

impl Preferences {
    /// Load both sets from `dir`. Ids found in both files stay hidden only.
    ///
    /// Each file is loaded on its own. A file that cannot be read leaves its
    /// set empty and detached, and the read error is returned alongside.
    pub fn load(dir: &Path) -> (Self, Vec<EpgError>) {
        let (mut favorites, favorites_err) = ChannelSet::load_or_detach(dir.join(FAVORITES_FILE));
        let (hidden, hidden_err) = ChannelSet::load_or_detach(dir.join(HIDDEN_FILE));
        let errors: Vec<EpgError> = favorites_err.into_iter().chain(hidden_err).collect();

        let overlap: Vec<String> = favorites.ids.intersection(&hidden.ids).cloned().collect();
        for id in &overlap {
            warn!("channel {} is both favorite and hidden, dropping favorite", id);
            favorites.remove(id);
        }

        (Self { favorites, hidden }, errors)
    }

    /// Flip favorite status of every id and persist favorites.
    /// Returns `false` without touching storage when `ids` is empty.
    pub fn toggle_favorites(&mut self, ids: &[String]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        for id in ids {
            self.favorites.toggle(id);
        }
        self.favorites.save()?;
        Ok(true)
    }

    /// Hide every id, dropping it from favorites, and persist both sets.
    /// Returns `false` without touching storage when `ids` is empty.
    /// Both files are attempted even if the first save fails.
    pub fn hide(&mut self, ids: &[String]) -> Result<bool> {
        if ids.is_empty() {
            return Ok(false);
        }
        for id in ids {
            self.hidden.insert(id);
            self.favorites.remove(id);
        }
        let hidden = self.hidden.save();
        let favorites = self.favorites.save();
        hidden.and(favorites)?;
        Ok(true)
    }
}
