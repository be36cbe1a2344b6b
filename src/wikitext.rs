//! Low-level wikitext scanning shared by the decoder, segmenter and preprocessor.
//!
//! Two tools live here:
//! - [`find_matching_braces`]: a brace-run matcher that locates balanced
//!   `{{...}}` spans (and `[[...]]` links when `ldelim == 0`) in free text.
//! - [`WikitextParser`]: a recursive descent splitter for the inside of one
//!   fragment, separating arguments at `|` only when not nested.

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    // "{{_inh|..." / "{{__inh|..." -> "{{inh|..."
    static ref DEDUP_MARKER_PATTERN: Regex = Regex::new(r"\{\{_+(\w)").unwrap();
}

/// Character inserted after the opening `{{` to make a repeated fragment key unique.
pub const DEDUP_MARKER: char = '_';

// ─────────────────────────────────────────────────────────────────────────────
// Balanced span scanning
// ─────────────────────────────────────────────────────────────────────────────

/// Find the next run of one of `delims` that is at least `min` bytes long.
/// Returns `(start, end, delimiter)`.
fn next_run(bytes: &[u8], from: usize, delims: &[u8], min: usize) -> Option<(usize, usize, u8)> {
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        if delims.contains(&b) {
            let mut j = i;
            while j < bytes.len() && bytes[j] == b {
                j += 1;
            }
            if j - i >= min {
                return Some((i, j, b));
            }
            i = j;
        } else {
            i += 1;
        }
    }
    None
}

/// Record a span only when both ends fall on character boundaries.
fn push_span(text: &str, spans: &mut Vec<(usize, usize)>, start: usize, end: usize) {
    if start < end && text.is_char_boundary(start) && text.is_char_boundary(end) {
        spans.push((start, end));
    }
}

/// Locate top-level balanced spans, returned as byte ranges `(start, end)`.
///
/// With `ldelim > 0` only template braces are considered and an opening run
/// must be at least `ldelim` braces long; a span that closes with a single
/// leftover opener shorter than `ldelim` is ambiguous (`{{{{{ }}} }}`) and is
/// skipped. With `ldelim == 0`, `[[...]]` links are matched as spans too.
///
/// Scanning stops at the first unbalanced opener; spans found before it are
/// still returned.
pub fn find_matching_braces(text: &str, ldelim: usize) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let (open_delims, next_delims): (&[u8], &[u8]) = if ldelim > 0 {
        (b"{", b"{}")
    } else {
        (b"{[", b"{}[]")
    };
    let open_min = if ldelim > 0 { ldelim } else { 2 };

    let mut spans = Vec::new();
    let mut cur = 0;

    while let Some((start, open_end, brac)) = next_run(bytes, cur, open_delims, open_min) {
        let open_len = (open_end - start) as isize;
        // positive entries are '{' runs, negative entries are '[' runs
        let mut stack: Vec<isize> = vec![if brac == b'{' { open_len } else { -open_len }];
        let mut end = open_end;

        loop {
            let Some((run_start, run_end, run_brac)) = next_run(bytes, end, next_delims, 2) else {
                return spans;
            };
            end = run_end;
            let mut lmatch = (run_end - run_start) as isize;

            match run_brac {
                b'{' => stack.push(lmatch),
                b'}' => {
                    while let Some(open_count) = stack.pop() {
                        if open_count == 0 {
                            continue;
                        }
                        if open_count < 0 {
                            // `}}` cannot close a `[[` link
                            stack.push(open_count);
                            break;
                        }
                        if lmatch >= open_count {
                            lmatch -= open_count;
                            if lmatch <= 1 {
                                break;
                            }
                        } else {
                            stack.push(open_count - lmatch);
                            break;
                        }
                    }
                    if stack.is_empty() {
                        push_span(text, &mut spans, start, end - lmatch as usize);
                        cur = end;
                        break;
                    } else if stack.len() == 1 && stack[0] > 0 && (stack[0] as usize) < ldelim {
                        cur = end;
                        break;
                    }
                }
                b'[' => stack.push(-lmatch),
                _ => {
                    while let Some(&top) = stack.last() {
                        if top >= 0 {
                            break;
                        }
                        stack.pop();
                        let open_count = -top;
                        if lmatch >= open_count {
                            lmatch -= open_count;
                            if lmatch <= 1 {
                                break;
                            }
                        } else {
                            stack.push(lmatch - open_count);
                            break;
                        }
                    }
                    if stack.is_empty() {
                        push_span(text, &mut spans, start, end - lmatch as usize);
                        cur = end;
                        break;
                    }
                    // unmatched ]] are discarded
                    cur = end;
                }
            }
        }
    }

    spans
}

/// Every top-level fragment (template or link) of `text`, in order.
pub fn top_level_fragments(text: &str) -> Vec<&str> {
    find_matching_braces(text, 0)
        .into_iter()
        .map(|(s, e)| &text[s..e])
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Duplicate-key markers
// ─────────────────────────────────────────────────────────────────────────────

/// Insert one more marker after the opening delimiter: `{{m|..}}` -> `{{_m|..}}`.
pub fn add_dedup_marker(key: &str) -> String {
    match key.strip_prefix("{{") {
        Some(rest) => format!("{{{{{}{}", DEDUP_MARKER, rest),
        None => format!("{}{}", DEDUP_MARKER, key),
    }
}

/// Remove every marker run that follows a `{{` and precedes a word character.
pub fn strip_dedup_marker(text: &str) -> Cow<'_, str> {
    DEDUP_MARKER_PATTERN.replace_all(text, "{{$1")
}

// ─────────────────────────────────────────────────────────────────────────────
// Fragment argument splitting (recursive descent)
// ─────────────────────────────────────────────────────────────────────────────

/// Recursive descent splitter for the inside of a fragment.
/// Nested templates and links are kept verbatim inside the argument that
/// contains them; nesting depth lives on the call stack.
pub struct WikitextParser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> WikitextParser<'a> {
    pub fn new(text: &'a str) -> Self {
        WikitextParser { text, pos: 0 }
    }

    fn peek(&self, n: usize) -> &str {
        // n is character count, not byte count
        let remaining = &self.text[self.pos..];
        let end_offset: usize = remaining.chars().take(n).map(|c| c.len_utf8()).sum();
        &remaining[..end_offset]
    }

    fn consume(&mut self, n: usize) -> &str {
        let remaining = &self.text[self.pos..];
        let byte_len: usize = remaining.chars().take(n).map(|c| c.len_utf8()).sum();
        let result = &self.text[self.pos..self.pos + byte_len];
        self.pos += byte_len;
        result
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.text[self.pos..].chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    // ─────────────────────────────────────────────────────────────
    // params ::= param ("|" param)*
    // ─────────────────────────────────────────────────────────────
    pub fn parse_params(&mut self) -> Vec<String> {
        let mut params = vec![self.parse_param()];
        while self.peek(1) == "|" {
            self.consume(1);
            params.push(self.parse_param());
        }
        params
    }

    // ─────────────────────────────────────────────────────────────
    // param ::= (template | wikilink | char)*   (terminated by | or end)
    // ─────────────────────────────────────────────────────────────
    fn parse_param(&mut self) -> String {
        let mut result = String::new();
        while !self.at_end() && self.peek(1) != "|" {
            self.parse_element(&mut result);
        }
        result
    }

    fn parse_element(&mut self, out: &mut String) {
        if self.peek(2) == "{{" {
            self.parse_template(out);
        } else if self.peek(2) == "[[" {
            self.parse_wikilink(out);
        } else if let Some(c) = self.consume_char() {
            out.push(c);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // template ::= "{{" element* "}}"
    // ─────────────────────────────────────────────────────────────
    fn parse_template(&mut self, out: &mut String) {
        out.push_str(self.consume(2));
        while !self.at_end() {
            if self.peek(2) == "}}" {
                out.push_str(self.consume(2));
                return;
            }
            self.parse_element(out);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // wikilink ::= "[[" element* "]]"
    // ─────────────────────────────────────────────────────────────
    fn parse_wikilink(&mut self, out: &mut String) {
        out.push_str(self.consume(2));
        while !self.at_end() {
            if self.peek(2) == "]]" {
                out.push_str(self.consume(2));
                return;
            }
            self.parse_element(out);
        }
    }
}

/// Split a fragment's inner text (without the outer `{{ }}`) into its arguments.
pub fn split_parts(inner: &str) -> Vec<String> {
    WikitextParser::new(inner).parse_params()
}

/// The inside of a `{{...}}` fragment, or the text unchanged when it is not wrapped.
pub fn fragment_inner(fragment: &str) -> &str {
    fragment
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(fragment)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod wikitext_tests {
    use super::*;

    fn spans<'a>(text: &'a str, ldelim: usize) -> Vec<&'a str> {
        find_matching_braces(text, ldelim)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Brace matching
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn finds_sequential_templates() {
        let text = "From {{inh|en|enm|peche}}, borrowed from {{der|en|fro|pesche}}.";
        assert_eq!(spans(text, 2), vec!["{{inh|en|enm|peche}}", "{{der|en|fro|pesche}}"]);
    }

    #[test]
    fn nested_template_is_one_span() {
        let text = "a {{m|la|{{l|la|x}}|t=y}} b";
        assert_eq!(spans(text, 2), vec!["{{m|la|{{l|la|x}}|t=y}}"]);
    }

    #[test]
    fn links_ignored_with_depth_two() {
        let text = "[[word]] and {{m|en|word}}";
        assert_eq!(spans(text, 2), vec!["{{m|en|word}}"]);
    }

    #[test]
    fn template_closer_does_not_close_link() {
        let text = "[[éx}} from {{m|la|x}}";
        // the unclosed link ends the scan; no span may split a character
        assert!(find_matching_braces(text, 0).is_empty());
        assert_eq!(spans(text, 2), vec!["{{m|la|x}}"]);

        let mixed = "{{m|é}} [[é}} {{l|x}}]]";
        assert_eq!(spans(mixed, 0), vec!["{{m|é}}", "[[é}} {{l|x}}]]"]);
    }

    #[test]
    fn links_matched_with_depth_zero() {
        let text = "[[word|Word]] and {{m|en|word}}";
        assert_eq!(spans(text, 0), vec!["[[word|Word]]", "{{m|en|word}}"]);
    }

    #[test]
    fn unbalanced_stops_scanning() {
        let text = "{{a}} {{b|c";
        assert_eq!(spans(text, 2), vec!["{{a}}"]);
    }

    #[test]
    fn lone_braces_ignored() {
        let text = "x { y } {{z}}";
        assert_eq!(spans(text, 2), vec!["{{z}}"]);
    }

    #[test]
    fn multibyte_text_offsets() {
        let text = "μᾶλον {{der|en|grc|μᾶλον περσικόν}} ok";
        assert_eq!(spans(text, 2), vec!["{{der|en|grc|μᾶλον περσικόν}}"]);
    }

    #[test]
    fn parens_inside_template_span() {
        let text = "From {{inh|sq|sqj-pro|*a)uaϑā}}, from {{inh|sq|ine-pro|*h₂wes-}}";
        assert_eq!(spans(text, 2).len(), 2);
    }

    // ─────────────────────────────────────────────────────────────
    // Argument splitting
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn simple_params() {
        assert_eq!(split_parts("suffix|en|teach|er"), vec!["suffix", "en", "teach", "er"]);
    }

    #[test]
    fn empty_params_kept() {
        assert_eq!(split_parts("l|ine-pro|*dʰer-||to hold"), vec!["l", "ine-pro", "*dʰer-", "", "to hold"]);
    }

    #[test]
    fn nested_template_kept_verbatim() {
        assert_eq!(
            split_parts("m|la|{{l|la|a|b}}|t=c"),
            vec!["m", "la", "{{l|la|a|b}}", "t=c"]
        );
    }

    #[test]
    fn wikilink_kept_verbatim() {
        assert_eq!(
            split_parts("af|en|[[isle|Isle]]|of"),
            vec!["af", "en", "[[isle|Isle]]", "of"]
        );
    }

    #[test]
    fn whitespace_not_trimmed() {
        assert_eq!(split_parts("der|en|VL. |*pessica"), vec!["der", "en", "VL. ", "*pessica"]);
    }

    #[test]
    fn empty_input_is_one_empty_part() {
        assert_eq!(split_parts(""), vec![""]);
    }

    #[test]
    fn unclosed_nested_template_consumes_rest() {
        assert_eq!(split_parts("m|{{x|y"), vec!["m", "{{x|y"]);
    }

    #[test]
    fn fragment_inner_strips_delimiters() {
        assert_eq!(fragment_inner("{{m|en|x}}"), "m|en|x");
        assert_eq!(fragment_inner("plain"), "plain");
    }

    // ─────────────────────────────────────────────────────────────
    // Duplicate markers
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn marker_round_trip() {
        let key = "{{m|mkh-okm|hvat}}";
        let once = add_dedup_marker(key);
        let twice = add_dedup_marker(&once);
        assert_eq!(once, "{{_m|mkh-okm|hvat}}");
        assert_eq!(twice, "{{__m|mkh-okm|hvat}}");
        assert_eq!(strip_dedup_marker(&twice), key);
    }

    #[test]
    fn strip_leaves_plain_text() {
        assert_eq!(strip_dedup_marker("{{inh|en|x}}"), "{{inh|en|x}}");
        assert_eq!(strip_dedup_marker("__wiki__"), "__wiki__");
    }
}
