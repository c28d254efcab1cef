//! # Bot Detection
//!
//! User-agent matching against a built-in list of crawler, preview, and
//! scripted-client signatures.

use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

const BOT_SIGNATURES: &[&str] = &[
    r"bot\b",
    r"bot/",
    r"crawl",
    r"spider",
    r"slurp",
    r"archiver",
    r"facebookexternalhit",
    r"embedly",
    r"quora link preview",
    r"outbrain",
    r"pinterest",
    r"vkshare",
    r"w3c_validator",
    r"whatsapp",
    r"mediapartners",
    r"feedfetcher",
    r"google-read-aloud",
    r"headlesschrome",
    r"phantomjs",
    r"lighthouse",
    r"^curl",
    r"^wget",
    r"python-requests",
    r"python-urllib",
    r"go-http-client",
    r"^java/",
    r"okhttp",
    r"httpclient",
    r"postmanruntime",
];

/// Device and browser names that contain a bot signature but are not bots
const BROWSER_EXCEPTIONS: &[&str] = &[r"cubot"];

static BOT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let pattern = format!("(?i)(?:{})", BOT_SIGNATURES.join("|"));
    Regex::new(&pattern)
        .inspect_err(|e| tracing::error!(error = %e, "Failed to compile bot signature pattern"))
        .ok()
});

static EXCEPTION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let pattern = format!("(?i)(?:{})", BROWSER_EXCEPTIONS.join("|"));
    Regex::new(&pattern)
        .inspect_err(|e| tracing::error!(error = %e, "Failed to compile browser exception pattern"))
        .ok()
});

/// Check if a user-agent belongs to a known bot
///
/// Missing or blank user-agents are not treated as bots. Known device names
/// that happen to end in `bot` are removed before matching.
pub fn is_bot(user_agent: Option<&str>) -> bool {
    let Some(user_agent) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return false;
    };

    let candidate = match EXCEPTION_PATTERN.as_ref() {
        Some(exceptions) => exceptions.replace_all(user_agent, " "),
        None => Cow::Borrowed(user_agent),
    };

    BOT_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(&candidate))
}

#[cfg(test)]
#[path = "bot_tests.rs"]
mod tests;
