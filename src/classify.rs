//! Connective text classification.
//!
//! Each predicate looks at the free text immediately preceding a fragment,
//! e.g. `" : From "`, `", "`, `" + "` or `". Compare "`.

use crate::normalize::fold_for_matching;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Phrases that introduce a direct lineage step but escape the FROM pattern.
pub const FROM_TEXTS: &[&str] = &[
    " : Earlier",
    " : Back-formation from ",
    " : Backslang for ",
    " : Verbal noun to ",
    " : Short for ",
    " : A reduplication of ",
    " : Deverbal ",
    " : After ",
    " : Coined based on ",
    " : A ",
    " : ",
    " : Morphologically ",
    " : Originally ",
    " : Short form for ",
    " from root ",
    " : From __wiki__, from ",
    " : In second person verb conjugation, from ",
    " : According to LIV, the root is an example of Siebs's law, probably from ",
];

pub const BRANCH_TEXTS: &[&str] = &[" and ", " + ", " or ", ", + noun of action suffix "];

/// Two fragments side by side with nothing between them.
pub const COMPOUND_TEXTS: &[&str] = &[" "];

pub const COGNATE_TEXTS: &[&str] = &[" (compare ", "*.Compare ", " : Formed after "];

pub const EQUIVALENT_TEXTS: &[&str] = &[", "];

pub const RESTART_TEXTS: &[&str] = &[
    ", equivalent to ",
    ". ",
    ".\nSurface analysis: ",
    ". Alternatively from ",
    ", alternatively from ",
    ". Alternatively from an unattested *vartë, from ",
];

lazy_static! {
    static ref RESTART_PATTERN: Regex = Regex::new(r"\. ").unwrap();

    // anchored at the start only
    static ref COGNATE_PATTERN: Regex = Regex::new(
        r"^(?: :|,|^|\.)(?: \w+)*(?: [Cc]ognates?| [Cc]ompare| [Ss]ee| [Rr]elated| [Mm]ore at| [Ee]quivalent to)(?: \w+)* "
    ).unwrap();

    // anchored at both ends, applied to folded text
    static ref FROM_PATTERN: Regex = Regex::new(
        r"^(?: :|,|^)(?: (?:\w|-|')+)*(?: [Ff]rom| of| [Aa]ttested| [Dd]erivative| [Pp]robably| [Pp]erhaps)(?: (?:\w|-)+)*,? ?\*?$"
    ).unwrap();
}

pub fn is_cognate(text: &str) -> bool {
    COGNATE_PATTERN.is_match(text) || COGNATE_TEXTS.contains(&text)
}

pub fn is_from(text: &str) -> bool {
    let folded = fold_for_matching(text);
    FROM_PATTERN.is_match(&folded) || FROM_TEXTS.contains(&folded.as_str())
}

pub fn is_branch(text: &str) -> bool {
    BRANCH_TEXTS.contains(&text)
}

pub fn is_restart(text: &str) -> bool {
    RESTART_PATTERN.is_match(text) || RESTART_TEXTS.contains(&text)
}

pub fn is_equivalent(text: &str) -> bool {
    EQUIVALENT_TEXTS.contains(&text)
}

pub fn is_compound_text(text: &str) -> bool {
    COMPOUND_TEXTS.contains(&text)
}

/// Verdict on one connective, in the precedence the state machine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connective {
    Cognate,
    Restart,
    Equivalent,
    Branch,
    From,
    Compound,
    Unrecognized,
}

pub fn classify(text: &str) -> Connective {
    if is_cognate(text) {
        Connective::Cognate
    } else if is_restart(text) {
        Connective::Restart
    } else if is_equivalent(text) {
        Connective::Equivalent
    } else if is_branch(text) {
        Connective::Branch
    } else if is_from(text) {
        Connective::From
    } else if is_compound_text(text) {
        Connective::Compound
    } else {
        Connective::Unrecognized
    }
}

/// Coarse label for diagnostics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Cognate,
    Branch,
    Equivalent,
    Restart,
    From,
    Other,
}

pub fn sentiment(text: &str) -> Sentiment {
    if is_cognate(text) {
        Sentiment::Cognate
    } else if BRANCH_TEXTS.contains(&text) {
        Sentiment::Branch
    } else if EQUIVALENT_TEXTS.contains(&text) {
        Sentiment::Equivalent
    } else if RESTART_TEXTS.contains(&text) {
        Sentiment::Restart
    } else if is_from(text) {
        Sentiment::From
    } else {
        Sentiment::Other
    }
}
