use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::database::AnalysisResult;

/// Section headers the fallback text parser recognizes, with the field
/// each one feeds. Matched case-insensitively, first spelling wins.
const SECTION_HEADERS: [(&str, Field); 10] = [
    ("child profile", Field::ChildProfile),
    ("parent profile", Field::ParentProfile),
    ("child question", Field::ChildQuestion),
    ("question for child", Field::ChildQuestion),
    ("parent question", Field::ParentQuestion),
    ("question for parent", Field::ParentQuestion),
    ("child conclusion", Field::ChildConclusion),
    ("conclusion for child", Field::ChildConclusion),
    ("parent conclusion", Field::ParentConclusion),
    ("conclusion for parent", Field::ParentConclusion),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    ChildProfile,
    ParentProfile,
    ChildQuestion,
    ParentQuestion,
    ChildConclusion,
    ParentConclusion,
}

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = SECTION_HEADERS
        .iter()
        .map(|(header, _)| regex::escape(header))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)({})\s*[:\-]?\s*", alternatives)).unwrap()
});

/// Parse a raw model reply into an `AnalysisResult`, best effort:
/// 1. strict JSON parse of the whole (fence-stripped) reply;
/// 2. JSON parse of the first-`{` .. last-`}` substring;
/// 3. labeled-section text parsing.
/// Fields missing after all three are simply omitted; an empty result is
/// still a successful parse.
pub fn parse_reply(raw: &str) -> AnalysisResult {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        if let Some(result) = accept_json(&value) {
            debug!("Analysis reply parsed as strict JSON");
            return result;
        }
    }

    if let Some(result) = extract_json(cleaned) {
        debug!("Analysis reply parsed from embedded JSON object");
        return result;
    }

    debug!("Falling back to labeled-section parsing");
    parse_sections(raw)
}

/// Accept a parsed JSON object only if it carries at minimum the two
/// profile keys; otherwise the reply is treated as free text.
fn accept_json(value: &Value) -> Option<AnalysisResult> {
    let object = value.as_object()?;
    if !object.contains_key("childProfile") || !object.contains_key("parentProfile") {
        return None;
    }

    let field = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    Some(AnalysisResult {
        child_profile: field("childProfile"),
        parent_profile: field("parentProfile"),
        child_question: field("childQuestion"),
        parent_question: field("parentQuestion"),
        child_conclusion: field("childConclusion"),
        parent_conclusion: field("parentConclusion"),
        error: None,
    })
}

fn extract_json(text: &str) -> Option<AnalysisResult> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    let value = serde_json::from_str::<Value>(&text[start..=end]).ok()?;
    accept_json(&value)
}

fn parse_sections(text: &str) -> AnalysisResult {
    let mut result = AnalysisResult::default();

    let matches: Vec<(usize, usize, Field)> = HEADER_RE
        .find_iter(text)
        .filter_map(|m| {
            let header = text[m.start()..m.end()].to_lowercase();
            SECTION_HEADERS
                .iter()
                .find(|(name, _)| header.starts_with(name))
                .map(|(_, field)| (m.start(), m.end(), *field))
        })
        .collect();

    for (index, (_, content_start, field)) in matches.iter().enumerate() {
        let content_end = matches
            .get(index + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(text.len());

        let content = clean_section(&text[*content_start..content_end]);
        if content.is_empty() {
            continue;
        }

        let slot = match field {
            Field::ChildProfile => &mut result.child_profile,
            Field::ParentProfile => &mut result.parent_profile,
            Field::ChildQuestion => &mut result.child_question,
            Field::ParentQuestion => &mut result.parent_question,
            Field::ChildConclusion => &mut result.child_conclusion,
            Field::ParentConclusion => &mut result.parent_conclusion,
        };
        if slot.is_none() {
            *slot = Some(content);
        }
    }

    result
}

/// Strip the decoration models like to wrap sections in: surrounding
/// quotes, a leading `- ` bullet, and `*` emphasis markers.
fn clean_section(content: &str) -> String {
    let mut value = content.trim();

    value = value
        .strip_prefix('"')
        .or_else(|| value.strip_prefix('\''))
        .unwrap_or(value);
    value = value
        .strip_suffix('"')
        .or_else(|| value.strip_suffix('\''))
        .unwrap_or(value);

    let value = value.trim().strip_prefix("- ").unwrap_or(value).trim();

    value.replace('*', "").trim().to_string()
}
