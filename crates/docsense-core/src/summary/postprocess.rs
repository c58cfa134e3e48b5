//! Cleanup and length capping of summary text.

const ELLIPSIS: &str = "...";

/// Labels models like to prefix their answer with.
const ANSWER_PREFIXES: &[&str] = &["summary:", "ringkasan:", "deskripsi:"];

/// Normalize generated output: strip wrapping quotes and answer labels,
/// collapse whitespace, then cap at `max_chars`.
pub fn clean_generated(text: &str, max_chars: usize) -> String {
    let mut cleaned = collapse_whitespace(text);

    for prefix in ANSWER_PREFIXES {
        let labeled = cleaned
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if labeled {
            cleaned = cleaned[prefix.len()..].trim_start().to_string();
            break;
        }
    }

    let cleaned = strip_quotes(&cleaned);
    truncate(cleaned, max_chars)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_quotes(text: &str) -> &str {
    let mut text = text.trim();
    loop {
        let stripped = [('"', '"'), ('\'', '\''), ('“', '”'), ('`', '`')]
            .iter()
            .find_map(|(open, close)| {
                text.strip_prefix(*open)
                    .and_then(|t| t.strip_suffix(*close))
            });
        match stripped {
            Some(inner) => text = inner.trim(),
            None => return text,
        }
    }
}

/// Cap `text` at `max_chars` characters, ellipsis included.
///
/// Cuts at the last word boundary when it lies in the second half of the
/// budget; otherwise cuts mid-word.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let ellipsis_len = ELLIPSIS.chars().count();
    if max_chars <= ellipsis_len {
        return text.chars().take(max_chars).collect();
    }

    let budget = max_chars - ellipsis_len;
    let head: String = text.chars().take(budget).collect();

    let cut = match head.rfind(' ') {
        Some(index) if head[..index].chars().count() > budget / 2 => &head[..index],
        _ => head.as_str(),
    };

    format!("{}{}", cut.trim_end_matches([' ', ',', ';', ':', '-']), ELLIPSIS)
}
