use anyhow::{bail, Context, Result};
use std::env;
use std::process::Command;
use tracing::{info, warn};

use crate::domain::models::EpisodeInfo;

pub const FILENAME_VAR: &str = "GPODDER_EPISODE_FILENAME";
pub const EPISODE_TITLE_VAR: &str = "GPODDER_EPISODE_TITLE";
pub const CHANNEL_TITLE_VAR: &str = "GPODDER_CHANNEL_TITLE";
pub const EPISODE_PUBDATE_VAR: &str = "GPODDER_EPISODE_PUBDATE";

/// The variables gPodder 2 exported to post-download scripts.
pub fn episode_env(info: &EpisodeInfo) -> Vec<(&'static str, String)> {
    vec![
        (
            FILENAME_VAR,
            info.episode_filename().to_string_lossy().into_owned(),
        ),
        (EPISODE_TITLE_VAR, info.episode_title().to_string()),
        (CHANNEL_TITLE_VAR, info.channel_title().to_string()),
        (EPISODE_PUBDATE_VAR, info.episode_pubdate().to_string()),
    ]
}

/// Runs the configured post-download command for an episode.
///
/// Succeeds only when the command exits with status 0 and writes nothing
/// to stderr. An unset command is not an error.
pub fn run(command_template: Option<&str>, info: &EpisodeInfo) -> Result<()> {
    let Some(template) = command_template.map(str::trim).filter(|c| !c.is_empty()) else {
        warn!("No hook command configured, nothing to run");
        return Ok(());
    };
    let home = env::var("HOME").ok();
    let cmd = expand_home(template, home.as_deref());

    let mut command = Command::new("sh");
    command.arg("-c").arg(&cmd);
    // Interpreter settings of a bundled client must not reach the child.
    for (key, _) in env::vars_os() {
        if key.to_string_lossy().starts_with("PYTHON") {
            command.env_remove(key);
        }
    }
    command.envs(episode_env(info));

    info!(command = %cmd, "Starting hook command");
    let output = command
        .output()
        .with_context(|| format!("Failed to run hook command {cmd:?}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    info!(stdout = %stdout.trim_end(), "Hook command finished");

    if !output.status.success() || !stderr.trim().is_empty() {
        bail!(
            "Hook command {cmd:?} failed ({}): {}",
            output.status,
            stderr.trim_end()
        );
    }

    Ok(())
}

fn expand_home(command: &str, home: Option<&str>) -> String {
    let home = home.filter(|home| !home.is_empty());
    match (command.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{home}{rest}")
        }
        _ => command.to_string(),
    }
}
