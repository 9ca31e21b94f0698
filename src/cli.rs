use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::error::EpisodeError;
use crate::domain::models::EpisodeInfo;

#[derive(Parser)]
#[command(name = "podcast-tagfix")]
#[command(about = "Fix the tags of downloaded podcast episodes, one show at a time")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/podcast-tagfix/config.toml)
    #[arg(long, global = true, env = "PODCAST_TAGFIX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply the matching fix to a downloaded episode
    Fix {
        #[command(flatten)]
        episode: EpisodeArgs,

        /// Compute the tags without writing the file
        #[arg(long)]
        dry_run: bool,

        /// Print the resulting tags as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the fix registry and list its fixes
    Check,
    /// Run the configured command for a downloaded episode
    Hook {
        #[command(flatten)]
        episode: EpisodeArgs,
    },
}

/// Episode fields, taken from gPodder's post-download environment unless
/// given explicitly.
#[derive(Args, Debug)]
pub struct EpisodeArgs {
    /// Episode title
    #[arg(long, env = "GPODDER_EPISODE_TITLE")]
    pub title: Option<String>,

    /// Downloaded episode file
    #[arg(long, env = "GPODDER_EPISODE_FILENAME")]
    pub filename: Option<PathBuf>,

    /// Channel (show) title
    #[arg(long, env = "GPODDER_CHANNEL_TITLE")]
    pub channel: Option<String>,

    /// Publish date as a unix timestamp
    #[arg(long, env = "GPODDER_EPISODE_PUBDATE")]
    pub pubdate: Option<String>,
}

impl EpisodeArgs {
    pub fn into_episode(self) -> Result<EpisodeInfo, EpisodeError> {
        EpisodeInfo::parse(self.title, self.filename, self.channel, self.pubdate)
    }
}
