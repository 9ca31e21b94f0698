use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::EpisodeError;

/// The episode that triggered the hook, as reported by the podcast client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    episode_title: String,
    episode_filename: PathBuf,
    channel_title: String,
    episode_pubdate: i64,
}

impl EpisodeInfo {
    pub fn new(
        episode_title: impl Into<String>,
        episode_filename: impl Into<PathBuf>,
        channel_title: impl Into<String>,
        episode_pubdate: i64,
    ) -> Result<Self, EpisodeError> {
        let episode_title = episode_title.into();
        let episode_filename = episode_filename.into();
        let channel_title = channel_title.into();

        if episode_title.trim().is_empty() {
            return Err(EpisodeError::Empty("episode title"));
        }
        if channel_title.trim().is_empty() {
            return Err(EpisodeError::Empty("channel title"));
        }
        if episode_filename.as_os_str().is_empty() {
            return Err(EpisodeError::Empty("episode filename"));
        }
        if DateTime::from_timestamp(episode_pubdate, 0).is_none() {
            return Err(EpisodeError::PubdateOutOfRange(episode_pubdate));
        }

        Ok(Self {
            episode_title,
            episode_filename,
            channel_title,
            episode_pubdate,
        })
    }

    /// Builds the record from raw string fields, the way they arrive from
    /// the environment. The timestamp may carry a fractional part.
    pub fn parse(
        episode_title: Option<String>,
        episode_filename: Option<PathBuf>,
        channel_title: Option<String>,
        episode_pubdate: Option<String>,
    ) -> Result<Self, EpisodeError> {
        let episode_title = episode_title.ok_or(EpisodeError::Missing("episode title"))?;
        let episode_filename =
            episode_filename.ok_or(EpisodeError::Missing("episode filename"))?;
        let channel_title = channel_title.ok_or(EpisodeError::Missing("channel title"))?;
        let raw_pubdate = episode_pubdate.ok_or(EpisodeError::Missing("publish date"))?;

        let pubdate = parse_timestamp(&raw_pubdate)
            .ok_or_else(|| EpisodeError::InvalidPubdate(raw_pubdate.clone()))?;

        Self::new(episode_title, episode_filename, channel_title, pubdate)
    }

    pub fn episode_title(&self) -> &str {
        &self.episode_title
    }

    pub fn episode_filename(&self) -> &Path {
        &self.episode_filename
    }

    pub fn channel_title(&self) -> &str {
        &self.channel_title
    }

    pub fn episode_pubdate(&self) -> i64 {
        self.episode_pubdate
    }

    pub fn published(&self) -> DateTime<Utc> {
        // Range checked in `new`.
        DateTime::from_timestamp(self.episode_pubdate, 0).unwrap_or_default()
    }

    /// Publication year in the given time zone.
    pub fn episode_year_in<Tz: TimeZone>(&self, tz: &Tz) -> i32 {
        self.published().with_timezone(tz).year()
    }

    /// Publication year in local time.
    pub fn episode_year(&self) -> i32 {
        self.episode_year_in(&Local)
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<i64>() {
        return Some(seconds);
    }
    let seconds = raw.parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(seconds.trunc() as i64)
}

/// How the tag written back to the file starts out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagBase {
    /// Discard whatever the file carries and start from an empty tag.
    Fresh,
    /// Modify the file's tag; a file without one is an error.
    Existing,
    #[default]
    ExistingOrFresh,
}

/// Desired tag state for one episode.
///
/// Text fields follow one rule: `None` leaves the file's value alone, an
/// empty string removes the field, anything else replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    pub base: TagBase,
    pub clear_pictures: bool,
    pub remove_id3v1: bool,
    /// Drop ID3v2 chapter frames (`CHAP`, `CTOC`).
    pub remove_chapters: bool,
    /// What the file's tag held when it was read; `None` when the file had
    /// no tag at all.
    #[serde(skip)]
    pub current: Option<TagFields>,
}

impl EpisodeTags {
    /// Starting point for a fix: nothing changed yet, `current` as read.
    pub fn with_current(current: Option<TagFields>) -> Self {
        Self {
            current,
            ..Default::default()
        }
    }
}

/// Text fields of a tag as found on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub composer: Option<String>,
    pub comment: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub track: Option<String>,
}

impl TagFields {
    pub const NAMES: [&'static str; 8] = [
        "title", "artist", "album", "composer", "comment", "genre", "year", "track",
    ];

    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => &self.title,
            "artist" => &self.artist,
            "album" => &self.album,
            "composer" => &self.composer,
            "comment" => &self.comment,
            "genre" => &self.genre,
            "year" => &self.year,
            "track" => &self.track,
            _ => return None,
        };
        value.as_deref()
    }
}
