use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

use super::Fix;
use crate::domain::models::{EpisodeInfo, EpisodeTags, TagBase, TagFields};
use crate::workflows::registry::RegistryError;

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)?)\}").unwrap();
}

const BUILTIN_PLACEHOLDERS: [&str; 3] = ["episode_title", "channel_title", "year"];
const TAG_PLACEHOLDER_PREFIX: &str = "tag.";

/// Field templates of a fix. Each one expands to the new value of that field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTemplates {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub composer: Option<String>,
    pub comment: Option<String>,
    pub track: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Artist,
    Album,
    Composer,
    Comment,
    Track,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Title,
        Field::Artist,
        Field::Album,
        Field::Composer,
        Field::Comment,
        Field::Track,
    ];
}

impl FieldTemplates {
    fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Title => self.title.as_deref(),
            Field::Artist => self.artist.as_deref(),
            Field::Album => self.album.as_deref(),
            Field::Composer => self.composer.as_deref(),
            Field::Comment => self.comment.as_deref(),
            Field::Track => self.track.as_deref(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        Field::ALL.into_iter().filter_map(|field| self.get(field))
    }
}

/// One `[[fix]]` table as written in the config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub channel_prefixes: Vec<String>,
    #[serde(default)]
    pub channel_contains: Vec<String>,
    pub title_pattern: Option<String>,
    #[serde(default)]
    pub base: TagBase,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub composer: Option<String>,
    pub comment: Option<String>,
    pub track: Option<String>,
    /// Used for a field only when the file had no tag.
    #[serde(default)]
    pub when_absent: FieldTemplates,
    /// Used for a field when `title_pattern` does not match. Its presence
    /// makes the fix claim every title.
    pub fallback: Option<FieldTemplates>,
    #[serde(default)]
    pub title_skip_chars: usize,
    #[serde(default)]
    pub title_trim_prefixes: Vec<String>,
    #[serde(default)]
    pub clear_pictures: bool,
    #[serde(default)]
    pub remove_id3v1: bool,
    #[serde(default)]
    pub remove_chapters: bool,
    /// Episode titles the fix must claim, and no other fix of its channels.
    #[serde(default)]
    pub samples: Vec<String>,
}

/// How a fix recognizes the channels it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelMatch {
    Exact(String),
    Prefix(String),
    Contains(String),
}

impl ChannelMatch {
    pub fn matches(&self, channel_title: &str) -> bool {
        match self {
            ChannelMatch::Exact(channel) => channel_title == channel,
            ChannelMatch::Prefix(prefix) => channel_title.starts_with(prefix.as_str()),
            ChannelMatch::Contains(part) => channel_title.contains(part.as_str()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            ChannelMatch::Exact(text) | ChannelMatch::Prefix(text) | ChannelMatch::Contains(text) => {
                text.as_str()
            }
        }
    }

    /// A channel title accepted by both matchers, if one of their own texts
    /// is such a title.
    pub fn shared_channel<'a>(&'a self, other: &'a ChannelMatch) -> Option<&'a str> {
        [self.text(), other.text()]
            .into_iter()
            .find(|channel| self.matches(channel) && other.matches(channel))
    }
}

impl fmt::Display for ChannelMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMatch::Exact(channel) => write!(f, "{channel}"),
            ChannelMatch::Prefix(prefix) => write!(f, "{prefix}*"),
            ChannelMatch::Contains(part) => write!(f, "*{part}*"),
        }
    }
}

/// A [`RuleSpec`] with its pattern compiled and templates checked.
#[derive(Debug, Clone)]
pub struct RuleFix {
    name: String,
    channels: Vec<ChannelMatch>,
    pattern: Option<Regex>,
    base: TagBase,
    fields: FieldTemplates,
    when_absent: FieldTemplates,
    fallback: Option<FieldTemplates>,
    title_skip_chars: usize,
    title_trim_prefixes: Vec<String>,
    clear_pictures: bool,
    remove_id3v1: bool,
    remove_chapters: bool,
    samples: Vec<String>,
}

impl RuleFix {
    pub fn compile(spec: RuleSpec) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        let channels: Vec<ChannelMatch> = spec
            .channels
            .into_iter()
            .map(ChannelMatch::Exact)
            .chain(spec.channel_prefixes.into_iter().map(ChannelMatch::Prefix))
            .chain(spec.channel_contains.into_iter().map(ChannelMatch::Contains))
            .filter(|channel| seen.insert(channel.clone()))
            .collect();
        if channels.is_empty() || channels.iter().any(|channel| channel.text().is_empty()) {
            return Err(RegistryError::NoChannels(spec.name));
        }

        let pattern = spec
            .title_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|source| RegistryError::InvalidPattern {
                rule: spec.name.clone(),
                source,
            })?;

        let rule = Self {
            name: spec.name,
            channels,
            pattern,
            base: spec.base,
            fields: FieldTemplates {
                title: spec.title,
                artist: spec.artist,
                album: spec.album,
                composer: spec.composer,
                comment: spec.comment,
                track: spec.track,
            },
            when_absent: spec.when_absent,
            fallback: spec.fallback,
            title_skip_chars: spec.title_skip_chars,
            title_trim_prefixes: spec.title_trim_prefixes,
            clear_pictures: spec.clear_pictures,
            remove_id3v1: spec.remove_id3v1,
            remove_chapters: spec.remove_chapters,
            samples: spec.samples,
        };
        rule.check_placeholders()?;
        if let Some(sample) = rule.samples.iter().find(|sample| !rule.can_fix(sample)) {
            return Err(RegistryError::SampleNotClaimed {
                rule: rule.name.clone(),
                title: sample.clone(),
            });
        }
        Ok(rule)
    }

    pub fn channels(&self) -> &[ChannelMatch] {
        &self.channels
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Claims every title of its channels.
    pub fn is_catch_all(&self) -> bool {
        self.pattern.is_none() || self.fallback.is_some()
    }

    fn check_placeholders(&self) -> Result<(), RegistryError> {
        let matched = self.fields.iter().chain(self.when_absent.iter());
        let unmatched = self.fallback.iter().flat_map(FieldTemplates::iter);

        let checks = matched
            .map(|template| (template, true))
            .chain(unmatched.map(|template| (template, false)));
        for (template, with_captures) in checks {
            for caps in PLACEHOLDER.captures_iter(template) {
                let key = &caps[1];
                if !self.knows_placeholder(key, with_captures) {
                    return Err(RegistryError::UnknownPlaceholder {
                        rule: self.name.clone(),
                        placeholder: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn knows_placeholder(&self, key: &str, with_captures: bool) -> bool {
        if BUILTIN_PLACEHOLDERS.contains(&key) {
            return true;
        }
        if let Some(field) = key.strip_prefix(TAG_PLACEHOLDER_PREFIX) {
            return TagFields::NAMES.contains(&field);
        }
        let Some(pattern) = self.pattern.as_ref().filter(|_| with_captures) else {
            return false;
        };
        match key.parse::<usize>() {
            Ok(index) => index < pattern.captures_len(),
            Err(_) => pattern.capture_names().flatten().any(|name| name == key),
        }
    }

    /// The template for `field`: the fallback when the pattern missed, then
    /// the rule's own, then the absent-tag default.
    fn template(&self, field: Field, missed: bool, absent: bool) -> Option<&str> {
        let fallback = self
            .fallback
            .as_ref()
            .filter(|_| missed)
            .and_then(|fallback| fallback.get(field));
        fallback
            .or_else(|| self.fields.get(field))
            .or_else(|| self.when_absent.get(field).filter(|_| absent))
    }

    fn render_title(&self, template: Option<&str>, context: &TemplateContext) -> Option<String> {
        let has_edits = self.title_skip_chars > 0 || !self.title_trim_prefixes.is_empty();
        let mut title = match template {
            Some(template) => context.expand(template),
            None if has_edits => context.info.episode_title().to_string(),
            None => return None,
        };

        if self.title_skip_chars > 0 {
            title = title.chars().skip(self.title_skip_chars).collect();
        }
        for prefix in &self.title_trim_prefixes {
            if let Some(rest) = title.strip_prefix(prefix.as_str()) {
                title = rest.to_string();
            }
        }
        Some(title)
    }
}

impl Fix for RuleFix {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_fix(&self, episode_title: &str) -> bool {
        self.fallback.is_some()
            || self
                .pattern
                .as_ref()
                .map_or(true, |pattern| pattern.is_match(episode_title))
    }

    fn fix(&self, episode_info: &EpisodeInfo, episode_tags: &EpisodeTags) -> EpisodeTags {
        let captures = self
            .pattern
            .as_ref()
            .and_then(|pattern| pattern.captures(episode_info.episode_title()));
        let missed = self.pattern.is_some() && captures.is_none();
        let absent = episode_tags.current.is_none();
        let context = TemplateContext {
            info: episode_info,
            year: episode_info.episode_year().to_string(),
            captures: captures.as_ref(),
            current: episode_tags.current.as_ref(),
        };

        let mut fixed = episode_tags.clone();
        if let Some(title) = self.render_title(self.template(Field::Title, missed, absent), &context) {
            fixed.title = Some(title);
        }
        let expand = |field: Field| {
            self.template(field, missed, absent)
                .map(|template| context.expand(template))
        };
        if let Some(artist) = expand(Field::Artist) {
            fixed.artist = Some(artist);
        }
        if let Some(album) = expand(Field::Album) {
            fixed.album = Some(album);
        }
        if let Some(composer) = expand(Field::Composer) {
            fixed.composer = Some(composer);
        }
        if let Some(comment) = expand(Field::Comment) {
            fixed.comment = Some(comment);
        }
        if let Some(track) = expand(Field::Track) {
            fixed.track = Some(track);
        }
        fixed.base = self.base;
        fixed.clear_pictures |= self.clear_pictures;
        fixed.remove_id3v1 |= self.remove_id3v1;
        fixed.remove_chapters |= self.remove_chapters;
        fixed
    }
}

struct TemplateContext<'a> {
    info: &'a EpisodeInfo,
    year: String,
    captures: Option<&'a Captures<'a>>,
    current: Option<&'a TagFields>,
}

impl TemplateContext<'_> {
    fn expand(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| self.lookup(&caps[1]))
            .into_owned()
    }

    fn lookup(&self, key: &str) -> String {
        match key {
            "episode_title" => self.info.episode_title().to_string(),
            "channel_title" => self.info.channel_title().to_string(),
            "year" => self.year.clone(),
            _ => {
                let value = match key.strip_prefix(TAG_PLACEHOLDER_PREFIX) {
                    Some(field) => self.current.and_then(|current| current.get(field)),
                    None => self
                        .captures
                        .and_then(|captures| match key.parse::<usize>() {
                            Ok(index) => captures.get(index),
                            Err(_) => captures.name(key),
                        })
                        .map(|group| group.as_str()),
                };
                value.unwrap_or_default().to_string()
            }
        }
    }
}
