//! Cosmetic cleanup of raw model replies.

/// Role labels models sometimes echo at the start of a reply.
const ROLE_PREFIXES: &[&str] = &["primary_agent:", "secondary_agent:", "assistant:"];

/// Trim the reply and strip any leading role labels (case-insensitive).
///
/// Stripping repeats until no label matches, so applying this to its own
/// output is a no-op.
pub fn strip_role_prefixes(raw: &str) -> String {
    let mut text = raw.trim();

    'outer: loop {
        for prefix in ROLE_PREFIXES {
            let matches = text
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                text = text[prefix.len()..].trim_start();
                continue 'outer;
            }
        }
        break;
    }

    text.trim_end().to_string()
}
