use crate::domain::models::{EpisodeInfo, EpisodeTags};

/// A correction that applies to some episodes.
///
/// Implementations hold no mutable state. `can_fix` must be total for any
/// title and `fix` must not touch the file; writing happens afterwards
/// through a [`TagSink`](crate::media::tags::TagSink). What the file held
/// when it was read arrives in `EpisodeTags::current`.
pub trait Fix {
    fn name(&self) -> &str;

    fn can_fix(&self, episode_title: &str) -> bool;

    fn fix(&self, episode_info: &EpisodeInfo, episode_tags: &EpisodeTags) -> EpisodeTags;
}

impl<F: Fix + ?Sized> Fix for &F {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn can_fix(&self, episode_title: &str) -> bool {
        (**self).can_fix(episode_title)
    }

    fn fix(&self, episode_info: &EpisodeInfo, episode_tags: &EpisodeTags) -> EpisodeTags {
        (**self).fix(episode_info, episode_tags)
    }
}

impl<F: Fix + ?Sized> Fix for Box<F> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn can_fix(&self, episode_title: &str) -> bool {
        (**self).can_fix(episode_title)
    }

    fn fix(&self, episode_info: &EpisodeInfo, episode_tags: &EpisodeTags) -> EpisodeTags {
        (**self).fix(episode_info, episode_tags)
    }
}

pub mod rule;
