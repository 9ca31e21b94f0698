use chrono::{Local, TimeZone};

use super::fixes::Fix;
use crate::domain::models::{EpisodeInfo, EpisodeTags};

pub const PODCAST_GENRE: &str = "Podcast";

/// Outcome of looking for the fix that claims an episode.
#[derive(Debug)]
pub enum Selection<'a, F> {
    Unique(&'a F),
    NoMatch,
    Ambiguous(Vec<&'a F>),
}

pub fn select<'a, F: Fix>(fixes: &'a [F], episode_title: &str) -> Selection<'a, F> {
    let mut claiming: Vec<&F> = fixes
        .iter()
        .filter(|fix| fix.can_fix(episode_title))
        .collect();

    match claiming.len() {
        0 => Selection::NoMatch,
        1 => Selection::Unique(claiming.remove(0)),
        _ => Selection::Ambiguous(claiming),
    }
}

/// Runs the single fix that claims the episode. Returns `None` when no fix
/// or more than one fix claims it; order never breaks a tie.
pub fn process<F: Fix>(
    fixes: &[F],
    episode_info: &EpisodeInfo,
    episode_tags: &EpisodeTags,
) -> Option<EpisodeTags> {
    match select(fixes, episode_info.episode_title()) {
        Selection::Unique(fix) => Some(fix.fix(episode_info, episode_tags)),
        Selection::NoMatch | Selection::Ambiguous(_) => None,
    }
}

/// Normalization shared by every podcast: genre and publication year.
pub fn post_process(episode_info: &EpisodeInfo, episode_tags: &EpisodeTags) -> EpisodeTags {
    post_process_in(episode_info, episode_tags, &Local)
}

pub fn post_process_in<Tz: TimeZone>(
    episode_info: &EpisodeInfo,
    episode_tags: &EpisodeTags,
    tz: &Tz,
) -> EpisodeTags {
    EpisodeTags {
        genre: Some(PODCAST_GENRE.to_string()),
        year: Some(format!("{:04}", episode_info.episode_year_in(tz))),
        ..episode_tags.clone()
    }
}
