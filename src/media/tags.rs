use anyhow::{bail, Context, Result};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::id3::v2::{FrameId, Id3v2Tag};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagExt, TagType};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

use crate::domain::models::{EpisodeTags, TagBase, TagFields};

const CHAPTER_FRAMES: [&str; 2] = ["CHAP", "CTOC"];

/// What a file carries before we touch it.
#[derive(Clone)]
pub enum TagState {
    Present(Tag),
    /// No tag yet; holds the tag type the file format prefers.
    Absent(TagType),
}

impl TagState {
    /// Text fields of the present tag, for fixes that build on them.
    pub fn fields(&self) -> Option<TagFields> {
        let TagState::Present(tag) = self else {
            return None;
        };
        let text = |key: ItemKey| tag.get_string(&key).map(str::to_string);
        Some(TagFields {
            title: text(ItemKey::TrackTitle),
            artist: text(ItemKey::TrackArtist),
            album: text(ItemKey::AlbumTitle),
            composer: text(ItemKey::Composer),
            comment: text(ItemKey::Comment),
            genre: text(ItemKey::Genre),
            year: text(ItemKey::RecordingDate),
            track: text(ItemKey::TrackNumber),
        })
    }
}

/// Cleanups done on the file besides writing the tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cleanup {
    pub remove_id3v1: bool,
    pub remove_chapters: bool,
}

impl From<&EpisodeTags> for Cleanup {
    fn from(tags: &EpisodeTags) -> Self {
        Self {
            remove_id3v1: tags.remove_id3v1,
            remove_chapters: tags.remove_chapters,
        }
    }
}

/// Reads and writes the tag embedded in an audio file.
pub trait TagSink {
    fn read(&self, path: &Path) -> Result<TagState>;

    fn write(&self, path: &Path, tag: &Tag, cleanup: Cleanup) -> Result<()>;
}

/// Tag sink backed by `lofty`.
pub struct LoftySink;

impl TagSink for LoftySink {
    fn read(&self, path: &Path) -> Result<TagState> {
        let mut tagged_file = Probe::open(path)
            .with_context(|| format!("Failed to open {path:?}"))?
            .read()
            .with_context(|| format!("Failed to read tags from {path:?}"))?;

        let tag_type = tagged_file.primary_tag_type();
        Ok(match tagged_file.remove(tag_type) {
            Some(tag) => TagState::Present(tag),
            None => TagState::Absent(tag_type),
        })
    }

    fn write(&self, path: &Path, tag: &Tag, cleanup: Cleanup) -> Result<()> {
        let is_id3v2 = tag.tag_type() == TagType::Id3v2;
        if cleanup.remove_id3v1 {
            if is_id3v2 {
                TagType::Id3v1
                    .remove_from_path(path)
                    .with_context(|| format!("Failed to remove ID3v1 tag from {path:?}"))?;
            } else {
                debug!(file = ?path, "No ID3v1 tag to remove for {:?}", tag.tag_type());
            }
        }

        if cleanup.remove_chapters && is_id3v2 {
            // Chapters only survive in the ID3v2 view of the tag.
            let mut id3v2 = Id3v2Tag::from(tag.clone());
            for id in CHAPTER_FRAMES {
                let removed = id3v2.remove(&FrameId::Valid(Cow::Borrowed(id))).count();
                debug!(file = ?path, frame = id, removed, "Removed chapter frames");
            }
            id3v2
                .save_to_path(path, WriteOptions::default())
                .with_context(|| format!("Failed to write tags to {path:?}"))?;
            return Ok(());
        }

        tag.save_to_path(path, WriteOptions::default())
            .with_context(|| format!("Failed to write tags to {path:?}"))?;
        Ok(())
    }
}

/// Renders `tags` into the tag the file starts from and writes it back.
/// `state` is what `sink` read from `path` before the fixes ran.
pub fn apply<S: TagSink + ?Sized>(
    sink: &S,
    path: &Path,
    state: TagState,
    tags: &EpisodeTags,
) -> Result<()> {
    let mut tag = match (state, tags.base) {
        (TagState::Present(tag), TagBase::Fresh) => Tag::new(tag.tag_type()),
        (TagState::Present(tag), TagBase::Existing | TagBase::ExistingOrFresh) => tag,
        (TagState::Absent(tag_type), TagBase::Fresh | TagBase::ExistingOrFresh) => {
            debug!(file = ?path, "Creating a new {tag_type:?} tag");
            Tag::new(tag_type)
        }
        (TagState::Absent(_), TagBase::Existing) => {
            bail!("{path:?} has no tag to fix")
        }
    };

    render(&mut tag, tags);
    sink.write(path, &tag, Cleanup::from(tags))
}

pub fn render(tag: &mut Tag, tags: &EpisodeTags) {
    set_text(tag, ItemKey::TrackTitle, tags.title.as_deref());
    set_text(tag, ItemKey::TrackArtist, tags.artist.as_deref());
    set_text(tag, ItemKey::AlbumTitle, tags.album.as_deref());
    set_text(tag, ItemKey::Composer, tags.composer.as_deref());
    set_text(tag, ItemKey::Comment, tags.comment.as_deref());
    set_text(tag, ItemKey::Genre, tags.genre.as_deref());
    set_text(tag, ItemKey::RecordingDate, tags.year.as_deref());
    set_text(tag, ItemKey::TrackNumber, tags.track.as_deref());

    if tags.clear_pictures {
        while !tag.pictures().is_empty() {
            tag.remove_picture(0);
        }
    }
}

fn set_text(tag: &mut Tag, key: ItemKey, value: Option<&str>) {
    match value {
        None => {}
        Some("") => tag.remove_key(&key),
        Some(value) => {
            tag.insert_text(key, value.to_string());
        }
    }
}
