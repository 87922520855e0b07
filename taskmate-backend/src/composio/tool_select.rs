//! Picking a concrete tool slug out of a toolkit listing.

use super::ToolInfo;

pub const CALENDAR_LIST_EXACT: &[&str] = &[
    "GOOGLECALENDAR_FIND_EVENT",
    "GOOGLECALENDAR_LIST_EVENTS",
    "GOOGLECALENDAR_EVENTS_LIST",
    "GOOGLECALENDAR_LISTCALENDAREVENTS",
];
pub const CALENDAR_LIST_KEYWORDS: &[(&str, &str)] = &[("find", "event"), ("list", "event")];

pub const GMAIL_LIST_EXACT: &[&str] = &["GMAIL_LIST_MESSAGES", "GMAIL_LIST_SENT_MESSAGES"];
pub const GMAIL_LIST_KEYWORDS: &[(&str, &str)] = &[("list", "message")];

pub const GMAIL_GET_EXACT: &[&str] = &["GMAIL_GET_MESSAGE", "GMAIL_READ_MESSAGE"];
pub const GMAIL_GET_KEYWORDS: &[(&str, &str)] = &[("get", "message")];

fn matches_keywords(name: &str, keyword_pairs: &[(&str, &str)]) -> bool {
    let lower = name.to_lowercase();
    keyword_pairs
        .iter()
        .any(|(a, b)| lower.contains(a) && lower.contains(b))
}

/// First tool whose name is listed in `exact_names`; failing that, the first
/// whose lower-cased name contains both words of any keyword pair.
pub fn select_tool<'a>(
    tools: &'a [ToolInfo],
    exact_names: &[&str],
    keyword_pairs: &[(&str, &str)],
) -> Option<&'a ToolInfo> {
    tools
        .iter()
        .find(|t| exact_names.contains(&t.name.as_str()))
        .or_else(|| {
            tools
                .iter()
                .find(|t| matches_keywords(&t.name, keyword_pairs))
        })
}

/// Single pass where an exact name and a keyword match rank equally, so the
/// earliest matching tool wins. Used on search results.
pub fn select_tool_in_order<'a>(
    tools: &'a [ToolInfo],
    exact_names: &[&str],
    keyword_pairs: &[(&str, &str)],
) -> Option<&'a ToolInfo> {
    tools.iter().find(|t| {
        exact_names.contains(&t.name.as_str()) || matches_keywords(&t.name, keyword_pairs)
    })
}
