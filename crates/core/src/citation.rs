//! Correlates bracketed time markers in an answer with the provider's timestamp list.
//!
//! With a provider list, a marker becomes a jump link only when the list has an entry with
//! the exact same `time` text. Without one (or with an empty one), the marker's own digits
//! are parsed instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
    format::parse_timestamp,
    types::{Citation, ProviderTimestamp},
};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{1,2}:\d{2}(?::\d{2})?)\]").expect("marker pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Jump(Citation),
    /// A marker that could not be resolved; rendered verbatim, not clickable.
    Inert(String),
}

fn resolve(label: &str, provider: Option<&[ProviderTimestamp]>) -> Option<Citation> {
    let seconds = match provider {
        Some(list) => list
            .iter()
            .find(|entry| entry.time == label)
            .and_then(|entry| parse_timestamp(&entry.time))?,
        None => parse_timestamp(label)?,
    };

    Some(Citation {
        label: label.to_string(),
        seconds,
    })
}

fn provider_list(provider: Option<&[ProviderTimestamp]>) -> Option<&[ProviderTimestamp]> {
    provider.filter(|list| !list.is_empty())
}

/// Split `text` into plain text, jump links and inert markers, in order.
pub fn fragments(text: &str, provider: Option<&[ProviderTimestamp]>) -> Vec<Fragment> {
    let provider = provider_list(provider);
    let mut out = Vec::new();
    let mut cursor = 0;

    for caps in MARKER.captures_iter(text) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > cursor {
            out.push(Fragment::Text(text[cursor..whole.start()].to_string()));
        }
        match resolve(label.as_str(), provider) {
            Some(citation) => out.push(Fragment::Jump(citation)),
            None => out.push(Fragment::Inert(whole.as_str().to_string())),
        }
        cursor = whole.end();
    }

    if cursor < text.len() {
        out.push(Fragment::Text(text[cursor..].to_string()));
    }
    out
}

/// Resolved citations in order of appearance.
pub fn correlate(text: &str, provider: Option<&[ProviderTimestamp]>) -> Vec<Citation> {
    fragments(text, provider)
        .into_iter()
        .filter_map(|f| match f {
            Fragment::Jump(c) => Some(c),
            _ => None,
        })
        .collect()
}
