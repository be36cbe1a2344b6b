//! Word cleaning shared by id assignment and connective matching.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip reconstruction asterisks and typographic punctuation so a word
/// matches the form stored in the word table.
pub fn clean_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for ch in word.chars() {
        match ch {
            '*' => {}
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{2013}' => out.push('-'),
            '\u{FF0F}' => out.push_str(" / "),
            _ => out.push(ch),
        }
    }
    out
}

/// Decompose and drop combining marks: `sagēn` -> `sagen`.
pub fn remove_diacritics(word: &str) -> String {
    word.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Fold connective text before pattern matching, so `Ren'yōkei` and
/// curly quotes match the plain-ASCII patterns.
pub fn fold_for_matching(text: &str) -> String {
    remove_diacritics(text)
        .chars()
        .map(|ch| match ch {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            '\u{00A0}' | '\u{2002}'..='\u{200A}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod normalize_tests {
    use super::*;

    #[test]
    fn removes_diacritics() {
        assert_eq!(remove_diacritics("самизда́т"), "самиздат");
        assert_eq!(remove_diacritics("pâr"), "par");
        assert_eq!(remove_diacritics("sagēn"), "sagen");
        assert_eq!(remove_diacritics("изда́т"), "издат");
    }

    #[test]
    fn plain_ascii_unchanged() {
        assert_eq!(remove_diacritics("baker"), "baker");
        assert_eq!(clean_word("baker"), "baker");
    }

    #[test]
    fn clean_word_replacements() {
        assert_eq!(clean_word("*pessica"), "pessica");
        assert_eq!(clean_word("\u{201C}hi\u{201D}"), "\"hi\"");
        assert_eq!(clean_word("rock\u{2019}n\u{2018}roll"), "rock'n'roll");
        assert_eq!(clean_word("a\u{2013}b"), "a-b");
        assert_eq!(clean_word("and\u{FF0F}or"), "and / or");
    }

    #[test]
    fn folding_for_patterns() {
        assert_eq!(fold_for_matching(" : Ren\u{2019}yōkei of "), " : Ren'yokei of ");
        assert_eq!(fold_for_matching(" : Vṛddhi form of "), " : Vrddhi form of ");
    }

    #[test]
    fn folding_covers_dashes_quotes_and_spaces() {
        assert_eq!(fold_for_matching("back\u{2010}formation"), "back-formation");
        assert_eq!(fold_for_matching("a\u{2011}b\u{2012}c\u{2015}d\u{2212}e"), "a-b-c-d-e");
        assert_eq!(fold_for_matching("\u{201E}x\u{201F} \u{00AB}y\u{00BB}"), "\"x\" \"y\"");
        assert_eq!(fold_for_matching("\u{201A}a\u{201B} b\u{2032}"), "'a' b'");
        assert_eq!(fold_for_matching("a\u{2009}b\u{202F}c"), "a b c");
    }
}
