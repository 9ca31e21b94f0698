use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use podcast_tagfix::cli::{Cli, Command, EpisodeArgs};
use podcast_tagfix::config::Config;
use podcast_tagfix::domain::models::{EpisodeInfo, EpisodeTags, TagFields};
use podcast_tagfix::infra::hook;
use podcast_tagfix::logging;
use podcast_tagfix::media::tags::{self, LoftySink, TagSink};
use podcast_tagfix::workflows::fixes::Fix;
use podcast_tagfix::workflows::processor::{self, Selection};
use podcast_tagfix::workflows::registry::Registry;

const INVOCATION_HINT: &str = "This command is meant to be run by gPodder. Set it as the \
'cmd_download_complete' option, or pass --title, --filename, --channel and --pubdate.";

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.log)?;

    match cli.command {
        Command::Fix {
            episode,
            dry_run,
            json,
        } => {
            let info = episode_info(episode)?;
            let registry = config.registry()?;
            fix_episode(&registry, &info, dry_run, json)
        }
        Command::Check => check_registry(&config),
        Command::Hook { episode } => {
            let info = episode_info(episode)?;
            hook::run(config.command.as_deref(), &info)
        }
    }
}

fn episode_info(args: EpisodeArgs) -> Result<EpisodeInfo> {
    let info = args.into_episode().context(INVOCATION_HINT)?;
    info!(
        filename = ?info.episode_filename(),
        episode_title = info.episode_title(),
        channel_title = info.channel_title(),
        episode_pubdate = info.episode_pubdate(),
        "Episode downloaded"
    );
    Ok(info)
}

/// Tags an episode should end up with: the claiming fix, if any, then the
/// common normalization. `current` is what the file's tag holds now.
fn resolve_tags(
    registry: &Registry,
    info: &EpisodeInfo,
    current: Option<TagFields>,
) -> EpisodeTags {
    let fixes = registry.fixes_for(info.channel_title());
    let tags = EpisodeTags::with_current(current);

    let fixed = match processor::select(&fixes, info.episode_title()) {
        Selection::Unique(fix) => {
            info!(fix = fix.name(), "Applying fix");
            fix.fix(info, &tags)
        }
        Selection::NoMatch => {
            info!(
                channel_title = info.channel_title(),
                episode_title = info.episode_title(),
                "No fixes for the episode"
            );
            tags
        }
        Selection::Ambiguous(claiming) => {
            let names: Vec<&str> = claiming.iter().map(|fix| fix.name()).collect();
            warn!(
                channel_title = info.channel_title(),
                episode_title = info.episode_title(),
                fixes = ?names,
                "Several fixes claim the episode, applying none"
            );
            tags
        }
    };

    processor::post_process(info, &fixed)
}

fn fix_episode(registry: &Registry, info: &EpisodeInfo, dry_run: bool, json: bool) -> Result<()> {
    let path = info.episode_filename();
    let state = LoftySink
        .read(path)
        .with_context(|| format!("An error occurred with file {path:?}"))?;
    let tags = resolve_tags(registry, info, state.fields());

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    }

    if dry_run {
        info!("Dry run, leaving {path:?} untouched");
        return Ok(());
    }

    tags::apply(&LoftySink, path, state, &tags)
        .with_context(|| format!("An error occurred with file {path:?}"))?;
    info!("Tags written to {path:?}");
    Ok(())
}

fn check_registry(config: &Config) -> Result<()> {
    let registry = config.registry()?;

    println!("{} fix(es) loaded", registry.len());
    for fix in registry.fixes() {
        let channels: Vec<String> = fix.channels().iter().map(ToString::to_string).collect();
        let claims = match fix.pattern() {
            Some(pattern) if !fix.is_catch_all() => pattern,
            _ => "every episode",
        };
        println!("  {}: {} [{}]", fix.name(), channels.join(", "), claims);
    }

    let shared = registry.shared_channels();
    if !shared.is_empty() {
        println!(
            "{} pair(s) of fixes share a channel; their patterns are only compared \
             through sample titles, so check they cannot both match:",
            shared.len()
        );
        for pair in shared {
            println!(
                "  {} and {} on '{}'",
                pair.first.name(),
                pair.second.name(),
                pair.channel
            );
        }
    }

    Ok(())
}
