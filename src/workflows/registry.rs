use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::fixes::rule::{ChannelMatch, RuleFix, RuleSpec};
use super::fixes::Fix;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("fix '{0}' does not name any channel")]
    NoChannels(String),
    #[error("fix '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("fix '{rule}' has an invalid title pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error("fix '{rule}' uses unknown placeholder '{{{placeholder}}}'")]
    UnknownPlaceholder { rule: String, placeholder: String },
    #[error("fix '{rule}' does not claim its sample title '{title}'")]
    SampleNotClaimed { rule: String, title: String },
    #[error("fixes '{first}' and '{second}' both claim episodes of channel '{channel}'")]
    Overlap {
        channel: String,
        first: String,
        second: String,
    },
}

/// Top-level layout of a standalone fixes file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixesFile {
    #[serde(default, rename = "fix")]
    pub fixes: Vec<RuleSpec>,
}

/// Two patterned fixes that may apply to the same channel and whose
/// patterns were not shown to be disjoint.
#[derive(Debug)]
pub struct SharedChannel<'a> {
    pub channel: &'a str,
    pub first: &'a RuleFix,
    pub second: &'a RuleFix,
}

/// Every known fix, with an index from channel title to the fixes that
/// apply to it. Immutable once built.
#[derive(Debug, Default)]
pub struct Registry {
    fixes: Vec<RuleFix>,
    by_channel: HashMap<String, Vec<usize>>,
    /// Prefix and substring matchers, checked after the exact lookup.
    loose: Vec<(ChannelMatch, usize)>,
}

impl Registry {
    pub fn build(specs: impl IntoIterator<Item = RuleSpec>) -> Result<Self, RegistryError> {
        let mut registry = Registry::default();
        let mut names = HashSet::new();

        for spec in specs {
            if !names.insert(spec.name.clone()) {
                return Err(RegistryError::DuplicateName(spec.name));
            }
            let fix = RuleFix::compile(spec)?;

            for (channel, other) in registry.sharing_channels(&fix) {
                if conflicts(other, &fix) {
                    return Err(RegistryError::Overlap {
                        channel: channel.to_string(),
                        first: other.name().to_string(),
                        second: fix.name().to_string(),
                    });
                }
            }

            let index = registry.fixes.len();
            for channel in fix.channels() {
                match channel {
                    ChannelMatch::Exact(title) => registry
                        .by_channel
                        .entry(title.clone())
                        .or_default()
                        .push(index),
                    loose => registry.loose.push((loose.clone(), index)),
                }
            }
            registry.fixes.push(fix);
        }

        Ok(registry)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let file: FixesFile = toml::from_str(content)?;
        Ok(Self::build(file.fixes)?)
    }

    /// Fixes registered for a channel, in registry order.
    pub fn fixes_for(&self, channel_title: &str) -> Vec<&RuleFix> {
        let mut indices: Vec<usize> = self
            .by_channel
            .get(channel_title)
            .cloned()
            .unwrap_or_default();
        indices.extend(
            self.loose
                .iter()
                .filter(|(channel, _)| channel.matches(channel_title))
                .map(|&(_, index)| index),
        );
        indices.sort_unstable();
        indices.dedup();
        indices.into_iter().map(|index| &self.fixes[index]).collect()
    }

    /// Pairs of patterned fixes on a common channel. Load-time validation
    /// only compares their samples, so any of these may still turn out
    /// ambiguous for some title.
    pub fn shared_channels(&self) -> Vec<SharedChannel<'_>> {
        let mut shared = Vec::new();
        for (index, fix) in self.fixes.iter().enumerate() {
            for other in &self.fixes[..index] {
                if let Some(channel) = shared_channel(other, fix) {
                    shared.push(SharedChannel {
                        channel,
                        first: other,
                        second: fix,
                    });
                }
            }
        }
        shared
    }

    pub fn fixes(&self) -> &[RuleFix] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// Already registered fixes that apply to some channel `fix` applies to.
    fn sharing_channels<'a>(&'a self, fix: &'a RuleFix) -> Vec<(&'a str, &'a RuleFix)> {
        self.fixes
            .iter()
            .filter_map(|other| shared_channel(other, fix).map(|channel| (channel, other)))
            .collect()
    }
}

/// A channel title both fixes apply to, if their channel matchers imply one.
fn shared_channel<'a>(a: &'a RuleFix, b: &'a RuleFix) -> Option<&'a str> {
    a.channels().iter().find_map(|mine| {
        b.channels()
            .iter()
            .find_map(|theirs| mine.shared_channel(theirs))
    })
}

/// Whether two fixes of one channel are known to claim a common title.
/// Distinct patterns are assumed disjoint unless a sample title says
/// otherwise; the dispatcher catches the rest.
fn conflicts(a: &RuleFix, b: &RuleFix) -> bool {
    if a.is_catch_all() || b.is_catch_all() || a.pattern() == b.pattern() {
        return true;
    }
    a.samples().iter().any(|sample| b.can_fix(sample))
        || b.samples().iter().any(|sample| a.can_fix(sample))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EpisodeInfo, EpisodeTags};
    use crate::workflows::processor::process;

    fn rule(name: &str, channels: &[&str], pattern: Option<&str>) -> RuleSpec {
        RuleSpec {
            name: name.to_string(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            title_pattern: pattern.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_fixes_for_narrows_by_channel() {
        let registry = Registry::build([
            rule("econtalk", &["EconTalk"], None),
            rule("quiet", &["Security Now!", "Reply All"], None),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        let names: Vec<_> = registry
            .fixes_for("Reply All")
            .into_iter()
            .map(|fix| fix.name())
            .collect();
        assert_eq!(names, vec!["quiet"]);
        assert!(registry.fixes_for("Unknown Show").is_empty());
    }

    #[test]
    fn test_patterned_fixes_share_a_channel() {
        let registry = Registry::build([
            rule("interviews", &["Show"], Some("^Interview")),
            rule("news", &["Show"], Some("^News")),
        ])
        .unwrap();
        assert_eq!(registry.fixes_for("Show").len(), 2);
    }

    #[test]
    fn test_catch_all_overlaps_any_other_fix() {
        let err = Registry::build([
            rule("interviews", &["Show"], Some("^Interview")),
            rule("everything", &["Other", "Show"], None),
        ])
        .unwrap_err();
        match err {
            RegistryError::Overlap {
                channel,
                first,
                second,
            } => {
                assert_eq!(channel, "Show");
                assert_eq!(first, "interviews");
                assert_eq!(second, "everything");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_identical_patterns_overlap() {
        let err = Registry::build([
            rule("a", &["Show"], Some("^A")),
            rule("b", &["Show"], Some("^A")),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::Overlap { .. }));
    }

    #[test]
    fn test_fixes_for_matches_prefixes_and_substrings() {
        let registry = Registry::build([
            RuleSpec {
                name: "esl".to_string(),
                channel_prefixes: vec!["English as a Second Language".to_string()],
                ..Default::default()
            },
            RuleSpec {
                name: "quick-and-dirty".to_string(),
                channel_contains: vec!["Quick and Dirty Tips".to_string()],
                ..Default::default()
            },
            rule("grammar-girl", &["Grammar Girl"], None),
        ])
        .unwrap();

        let names = |channel: &str| -> Vec<String> {
            registry
                .fixes_for(channel)
                .into_iter()
                .map(|fix| fix.name().to_string())
                .collect()
        };
        assert_eq!(names("English as a Second Language Podcast"), vec!["esl"]);
        assert_eq!(
            names("Grammar Girl Quick and Dirty Tips for Better Writing"),
            vec!["quick-and-dirty"]
        );
        assert_eq!(names("Grammar Girl"), vec!["grammar-girl"]);
        assert!(names("Learning English as a Second Language").is_empty());
    }

    #[test]
    fn test_loose_channels_overlap_exact_ones() {
        let err = Registry::build([
            rule("science", &["60-Second Science"], None),
            RuleSpec {
                name: "sixty-seconds".to_string(),
                channel_prefixes: vec!["60-Second ".to_string()],
                ..Default::default()
            },
        ])
        .unwrap_err();
        match err {
            RegistryError::Overlap { channel, first, .. } => {
                assert_eq!(channel, "60-Second Science");
                assert_eq!(first, "science");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = Registry::build([
            RuleSpec {
                name: "tips".to_string(),
                channel_contains: vec!["Dirty Tips".to_string()],
                ..Default::default()
            },
            RuleSpec {
                name: "quick-tips".to_string(),
                channel_contains: vec!["Quick and Dirty Tips".to_string()],
                ..Default::default()
            },
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::Overlap { ref channel, .. } if channel == "Quick and Dirty Tips"));
    }

    #[test]
    fn test_loose_channels_without_witness_coexist() {
        let registry = Registry::build([
            RuleSpec {
                name: "sixty-seconds".to_string(),
                channel_prefixes: vec!["60-Second ".to_string()],
                ..Default::default()
            },
            rule("econtalk", &["EconTalk"], None),
        ])
        .unwrap();
        assert_eq!(registry.fixes_for("60-Second Earth").len(), 1);
        assert!(registry.shared_channels().is_empty());
    }

    #[test]
    fn test_samples_reveal_overlapping_patterns() {
        let err = Registry::build([
            rule("interviews", &["Show"], Some("^Interview: (.+)$")),
            RuleSpec {
                samples: vec!["Interview: Jane".to_string()],
                ..rule("interviews-again", &["Show"], Some("^Interview"))
            },
        ])
        .unwrap_err();
        match err {
            RegistryError::Overlap { first, second, .. } => {
                assert_eq!(first, "interviews");
                assert_eq!(second, "interviews-again");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shared_channels_lists_unproven_pairs() {
        let registry = Registry::build([
            rule("interviews", &["Show"], Some("^Interview: (.+)$")),
            rule("interviews-again", &["Show"], Some("^Interview")),
            rule("elsewhere", &["Other"], Some("^Interview")),
        ])
        .unwrap();

        let shared = registry.shared_channels();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].channel, "Show");
        assert_eq!(shared[0].first.name(), "interviews");
        assert_eq!(shared[0].second.name(), "interviews-again");
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Registry::build([
            rule("same", &["One"], None),
            rule("same", &["Two"], None),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref name) if name == "same"));
    }

    #[test]
    fn test_from_toml() {
        let registry = Registry::from_toml(
            r#"
            [[fix]]
            name = "stack-exchange"
            channels = ["The Stack Exchange Podcast"]
            title_trim_prefixes = ["Podcast "]

            [[fix]]
            name = "debug"
            channels = ["Debug"]
            base = "existing"
            clear_pictures = true
            "#,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.fixes_for("Debug")[0].name(), "debug");
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let result = Registry::from_toml(
            r#"
            [[fix]]
            name = "typo"
            channels = ["Show"]
            artsit = "Someone"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_sample_fixes_file_loads() {
        let registry = Registry::from_toml(include_str!("../../config/fixes.toml")).unwrap();
        assert!(!registry.is_empty());
        assert_eq!(registry.fixes_for("EconTalk").len(), 1);

        let info = EpisodeInfo::new(
            "Erlang (Иван Петров на AD Days)",
            "/podcasts/addays.mp3",
            "Application Developer Days",
            1434369600,
        )
        .unwrap();
        let fixes = registry.fixes_for(info.channel_title());
        let tags = process(&fixes, &info, &EpisodeTags::default()).unwrap();
        assert_eq!(tags.title.as_deref(), Some("Erlang"));
        assert_eq!(tags.artist.as_deref(), Some("Иван Петров"));
        assert_eq!(tags.album.as_deref(), Some("Application Developer Days"));

        let science = registry.fixes_for("60-Second Science");
        assert_eq!(science.len(), 1);
        assert_eq!(science[0].name(), "sixty-second");
        let tips = registry.fixes_for("Grammar Girl Quick and Dirty Tips for Better Writing");
        assert_eq!(tips[0].name(), "quick-and-dirty-tips");
        assert!(registry.shared_channels().is_empty());
    }
}
