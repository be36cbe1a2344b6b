//! Etymology text cleanup before segmentation.
//!
//! One pass runs these steps in order:
//! 1. whitespace normalization (`\xa0`, newlines)
//! 2. bullet marker removal
//! 3. parenthetical aside removal, leaving fragments untouched
//! 4. lone fragments that carry no word become `__wiki__`
//! 5. a leading `Cf.` becomes `Compare`
//! 6. leading descriptive clauses are dropped (`1670s: variant of ` -> `variant of `)
//! 7. punctuation spacing repair
//!
//! [`preprocess_etymology`] repeats the pass until nothing changes.

use crate::wikitext::find_matching_braces;
use lazy_static::lazy_static;
use regex::Regex;

/// Placeholder left where a fragment that names no word used to be.
pub const LONE_FRAGMENT_PLACEHOLDER: &str = "__wiki__";

const MAX_PASSES: usize = 16;
const MAX_PAREN_ROUNDS: usize = 100;

lazy_static! {
    static ref BULLET: Regex = Regex::new(r"[^ ]*BULLET::::- ?").unwrap();
    static ref UNCLOSED_PAREN: Regex = Regex::new(r"\([^)]*$").unwrap();
    static ref LONE_FRAGMENT: Regex = Regex::new(
        r"\{\{etyl\|\S+?\|\S+?\}\}|\{\{(?:inh|der|bor)\|[^|]+?\|[^|]+?(?:\||\|-)?\}\}|\{\{(?:qualifier|circa|glossary|unk)\|[^{}]*?\}\}"
    ).unwrap();
    static ref STARTING_YEAR: Regex = Regex::new(r"^\d{2,4}, ").unwrap();
    static ref STARTING_CLAUSE: Regex = Regex::new(r"^[^{}\n]+ ?[:;.] ").unwrap();
    static ref EXTRA_SPACES: Regex = Regex::new(r" {2,}").unwrap();
    static ref ADJACENT_PUNCTUATION: Regex = Regex::new(r"([,.!?;:])([^ ])").unwrap();
    static ref STRANDED_PUNCTUATION: Regex = Regex::new(r" ([,.!?;:] )").unwrap();
}

/// Clean an etymology until a further pass would not change it.
pub fn preprocess_etymology(text: &str) -> String {
    let mut current = preprocess_pass(text);
    for _ in 1..MAX_PASSES {
        let next = preprocess_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn preprocess_pass(text: &str) -> String {
    let text = text.replace('\u{a0}', " ").replace('\n', " ");
    let text = BULLET.replace_all(&text, "");
    let text = remove_matching_parens(&text);
    let text = remove_lone_fragments(&text);
    let text = replace_confer(&text);
    let text = remove_starting_clauses(&text);
    fix_broken_punctuation(&text)
}

// ─────────────────────────────────────────────────────────────────────────────
// Parenthetical asides
// ─────────────────────────────────────────────────────────────────────────────

/// Remove parenthetical asides and unclosed parens, leaving text inside
/// fragments alone. Trims the result.
pub fn remove_matching_parens(text: &str) -> String {
    // hide fragments behind numbered placeholders
    let mut originals: Vec<&str> = Vec::new();
    let mut masked = String::with_capacity(text.len());
    let mut cur = 0;
    for (start, end) in find_matching_braces(text, 0) {
        masked.push_str(&text[cur..start]);
        masked.push_str(&format!("{{{{{}}}}}", originals.len()));
        originals.push(&text[start..end]);
        cur = end;
    }
    masked.push_str(&text[cur..]);

    let mut last = masked;
    let mut rounds = 0;
    let result = loop {
        let stripped = strip_innermost_parens(&last);
        let next = UNCLOSED_PAREN
            .replace(&stripped, " ")
            .replace("  ", " ")
            .trim()
            .to_string();
        if next == last || rounds > MAX_PAREN_ROUNDS {
            break next;
        }
        rounds += 1;
        last = next;
    };

    originals
        .iter()
        .enumerate()
        .fold(result, |acc, (i, original)| {
            acc.replace(&format!("{{{{{}}}}}", i), original)
        })
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace every innermost `( ... )` that stands apart from surrounding words
/// with a space. A group is skipped when it is glued to a word (`test(test)`)
/// or when a `}` follows before any `{`.
fn strip_innermost_parens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cur = 0;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('(') {
        let open = search_from + offset;
        search_from = open + 1;

        let starts_clear = text[..open].chars().next_back().map_or(true, |c| !is_word_char(c));
        if !starts_clear {
            continue;
        }

        let Some(close_offset) = text[open + 1..].find(['(', ')']) else {
            break;
        };
        let close = open + 1 + close_offset;
        if text.as_bytes()[close] == b'(' {
            continue;
        }

        let after = &text[close + 1..];
        let ends_clear = after.chars().next().map_or(true, |c| !is_word_char(c));
        let inside_fragment = after
            .find(['{', '}'])
            .map_or(false, |i| after.as_bytes()[i] == b'}');
        if !ends_clear || inside_fragment {
            continue;
        }

        out.push_str(&text[cur..open]);
        out.push(' ');
        cur = close + 1;
        search_from = cur;
    }

    out.push_str(&text[cur..]);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Other steps
// ─────────────────────────────────────────────────────────────────────────────

/// `{{etyl|..}}`, two-argument `{{inh|..}}`-style fragments and qualifiers
/// name no word, so they become a placeholder the connective patterns know.
pub fn remove_lone_fragments(text: &str) -> String {
    LONE_FRAGMENT
        .replace_all(text, LONE_FRAGMENT_PLACEHOLDER)
        .into_owned()
}

pub fn replace_confer(text: &str) -> String {
    match text.strip_prefix("Cf. ") {
        Some(rest) => format!("Compare {}", rest),
        None => text.to_string(),
    }
}

pub fn remove_starting_clauses(text: &str) -> String {
    let text = STARTING_YEAR.replace(text, "");
    STARTING_CLAUSE.replace(&text, "").into_owned()
}

/// `" , "` -> `", "`, and a space after punctuation glued to the next character.
pub fn fix_broken_punctuation(text: &str) -> String {
    let text = EXTRA_SPACES.replace_all(text, " ");
    let text = ADJACENT_PUNCTUATION.replace_all(&text, "${1} ${2}");
    STRANDED_PUNCTUATION.replace_all(&text, "${1}").into_owned()
}

#[cfg(test)]
mod preprocess_tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────
    // Punctuation and leading clauses
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn broken_punctuation() {
        assert_eq!(
            fix_broken_punctuation("Probably {{m|mkh}} , from {{m|mkh}}"),
            "Probably {{m|mkh}}, from {{m|mkh}}"
        );
        assert_eq!(
            fix_broken_punctuation("Probably {{m|mkh}}, from {{m|mkh}}"),
            "Probably {{m|mkh}}, from {{m|mkh}}"
        );
        assert_eq!(
            fix_broken_punctuation("{{cog|crh|kim}} ,{{cog|krc|ким|tr=kim}}"),
            "{{cog|crh|kim}}, {{cog|krc|ким|tr=kim}}"
        );
        assert_eq!(fix_broken_punctuation("{{inh|ca|VL.|*sequio}}"), "{{inh|ca|VL. |*sequio}}");
    }

    #[test]
    fn starting_clauses() {
        let cases = [
            ("1581, first mention is the derivative ", "first mention is the derivative "),
            ("1670s: variant of ", "variant of "),
            ("UK C16. blag blag. Probably from ", "Probably from "),
            ("UK C16. blag __language__ blag. Probably from ", "Probably from "),
            ("UK C16. Probably from ", "Probably from "),
            ("Recorded since 1413; ", ""),
            ("Echoic; compare Greek ", "compare Greek "),
            ("compare Greek ", "compare Greek "),
            ("variant of ", "variant of "),
            ("1615-25 ; from ", "from "),
            ("From {{inh|ang|gem-pro|*fehu}}. Germanic", "From {{inh|ang|gem-pro|*fehu}}. Germanic"),
        ];
        for (input, expected) in cases {
            assert_eq!(remove_starting_clauses(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn confer() {
        assert_eq!(replace_confer("Cf. banana"), "Compare banana");
        assert_eq!(replace_confer("Cf.banana"), "Cf.banana");
        assert_eq!(replace_confer("see Cf. banana"), "see Cf. banana");
    }

    // ─────────────────────────────────────────────────────────────
    // Lone fragments
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn lone_fragments() {
        let cases = [
            ("{{etyl|test|test}} variant of ", "__wiki__ variant of "),
            ("banana {{etyl|test|test}} variant of ", "banana __wiki__ variant of "),
            ("{{inh|test|test|-}} variant of ", "__wiki__ variant of "),
            ("banana {{inh|test|test|-}} variant of ", "banana __wiki__ variant of "),
            (
                "From {{inh|it|la|Genua}}, possibly from the {{der|it|xlg|-}} word for knee.",
                "From {{inh|it|la|Genua}}, possibly from the __wiki__ word for knee.",
            ),
            ("From {{etyl|NL.|en}} test ", "From __wiki__ test "),
            ("{{inh|one|too|many|-}} variant of ", "{{inh|one|too|many|-}} variant of "),
            ("test {{qualifier|Ikavian}} test", "test __wiki__ test"),
            ("test {{circa|1881}} test", "test __wiki__ test"),
            ("test {{glossary|adjective}} test", "test __wiki__ test"),
            ("test {{unk|en|title=unknown}} test", "test __wiki__ test"),
            ("{{bor|hu|de|-}}", "__wiki__"),
            ("{{inh|hu|de|}}", "__wiki__"),
            ("{{inh|hu|de}}", "__wiki__"),
            ("{{inh|hu|de|a}}", "{{inh|hu|de|a}}"),
        ];
        for (input, expected) in cases {
            assert_eq!(remove_lone_fragments(input), expected, "input: {:?}", input);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Parentheses
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn matching_parens() {
        let cases = [
            ("test", "test"),
            ("test(test)", "test(test)"),
            ("test (test)", "test"),
            ("test (test) test", "test test"),
            ("(test) test", "test"),
            ("test ((test) test (test)) test", "test test"),
            ("test {{((test) test (test))}} test", "test {{((test) test (test))}} test"),
            ("wine (possibly {{der|(a wine)}}) {{test}}", "wine {{test}}"),
            ("Probably {{m|mkh}}, from {{m|mkh}}", "Probably {{m|mkh}}, from {{m|mkh}}"),
            ("Probably {{m|mkh}} ({{test}}), from {{m|mkh}}", "Probably {{m|mkh}} , from {{m|mkh}}"),
        ];
        for (input, expected) in cases {
            assert_eq!(remove_matching_parens(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn unclosed_paren_dropped() {
        assert_eq!(remove_matching_parens("from {{m|la|x}} (see below"), "from {{m|la|x}}");
    }

    #[test]
    fn paren_inside_fragment_word_kept() {
        let text = "From {{inh|sq|sqj-pro|*a)uaϑā}}, from {{inh|sq|ine-pro|*h₂wes-}}";
        assert_eq!(remove_matching_parens(text), text);
    }

    // ─────────────────────────────────────────────────────────────
    // Full pipeline
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn full_preprocess() {
        let cases = [
            ("BULLET::::- from {{inh|en|enm|kit}},", "from {{inh|en|enm|kit}},"),
            ("BULLET::::-Cf. banana", "Compare banana"),
            ("(1835) super info. from\u{a0}banana ", "from banana"),
            (" : From the Interlingua-English Dictionary.\nFrom ", "From"),
            ("Probably {{m|mkh}} ({{test}}), from {{m|mkh}}", "Probably {{m|mkh}}, from {{m|mkh}}"),
        ];
        for (input, expected) in cases {
            assert_eq!(preprocess_etymology(input), expected, "input: {:?}", input);
        }
    }

    #[test]
    fn preprocess_is_idempotent() {
        let inputs = [
            "From {{inh|en|enm|peche}}, borrowed from {{der|en|fro|pesche}} ({{cog|fr|pêche}}), \
             {{der|en|VL.|*pessica}} (cf. Medieval Latin {{m|la|pesca}}) from {{der|en|LL.|persica}}.",
            "From {{inh|ca|pro|}} (compare {{cog|oc|seguir}}), from {{inh|ca|VL.|*sequio|*sequīre}}.",
            "1670s: variant of {{m|en|x}} ,{{m|en|y}}",
            "BULLET::::-Cf. banana",
            "(1835) super info. from\u{a0}banana ",
        ];
        for input in inputs {
            let once = preprocess_etymology(input);
            assert_eq!(preprocess_etymology(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn catalan_entry_cleanup() {
        let text = "From {{inh|ca|pro|}} (compare {{cog|oc|seguir}}), from {{inh|ca|VL.|*sequio|*sequīre}}.";
        assert_eq!(
            preprocess_etymology(text),
            "From __wiki__, from {{inh|ca|VL. |*sequio|*sequīre}}."
        );
    }

    #[test]
    fn unclosed_link_with_template_closer() {
        let text = "From [[éx}} {{m|la|x}}";
        assert_eq!(preprocess_etymology(text), text);
    }
}
