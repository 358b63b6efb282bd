use crate::models::common::BackendKind;

/// Mutually exclusive predicate pairs recognized in conclusions
const COMPLEMENTARY_PREDICATES: &[(&str, &str)] = &[
    ("even", "odd"),
    ("prime", "composite"),
    ("finite", "infinite"),
    ("rational", "irrational"),
    ("convergent", "divergent"),
    ("bounded", "unbounded"),
];

/// Isabelle symbol escapes rewritten to their Unicode form before matching
const SYMBOL_ESCAPES: &[(&str, &str)] = &[
    ("\\<not>", "¬"),
    ("\\<noteq>", "≠"),
    ("\\<le>", "≤"),
    ("\\<ge>", "≥"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn complement(self) -> Self {
        match self {
            Relation::Eq => Relation::Ne,
            Relation::Ne => Relation::Eq,
            Relation::Lt => Relation::Ge,
            Relation::Ge => Relation::Lt,
            Relation::Gt => Relation::Le,
            Relation::Le => Relation::Gt,
        }
    }
}

/// Decides whether two conclusions negate each other under one backend's dialect.
///
/// Recognition is purely syntactic: explicit negation prefixes of the dialect,
/// complementary relations over identical operands, and complementary
/// predicates applied to identical arguments. Anything subtler is left to the
/// backends themselves.
#[derive(Debug, Clone, Default)]
pub struct NegationRecognizer;

impl NegationRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Symmetric in `a` and `b`
    pub fn negates(&self, backend: &BackendKind, a: &str, b: &str) -> bool {
        let a = normalize(a);
        let b = normalize(b);
        if a.is_empty() || b.is_empty() {
            return false;
        }

        self.is_explicit_negation(backend, &a, &b) ||
            self.is_explicit_negation(backend, &b, &a) ||
            complementary_relations(&a, &b) ||
            complementary_predicates(&a, &b) ||
            complementary_predicates(&b, &a)
    }

    /// Negation prefixes understood by a dialect, already lower-cased
    fn negation_prefixes(&self, backend: &BackendKind) -> &'static [&'static str] {
        match backend {
            BackendKind::Lean => &["¬", "not "],
            BackendKind::Coq => &["~", "not "],
            BackendKind::Isabelle => &["¬", "~"],
            BackendKind::Agda => &["¬"],
            BackendKind::Z3 => &["not "],
            BackendKind::Vampire => &["~"],
            BackendKind::Custom(_) => &["¬", "~", "!", "not "],
        }
    }

    /// `negated` is `¬ plain` in the dialect of `backend`
    fn is_explicit_negation(&self, backend: &BackendKind, negated: &str, plain: &str) -> bool {
        self.negation_prefixes(backend)
            .iter()
            .filter_map(|prefix| negated.strip_prefix(prefix))
            .any(|rest| normalize(rest) == plain)
    }
}

/// Lower-case, collapse whitespace, unescape symbols and strip redundant outer parentheses
fn normalize(text: &str) -> String {
    let mut text = text.to_string();
    for (escape, symbol) in SYMBOL_ESCAPES {
        text = text.replace(escape, symbol);
    }
    let mut text = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    while wrapped_in_parens(&text) {
        text = text[1..text.len() - 1].trim().to_string();
    }
    text
}

/// The opening parenthesis at the start closes at the very end
fn wrapped_in_parens(text: &str) -> bool {
    if !text.starts_with('(') || !text.ends_with(')') {
        return false;
    }
    let mut depth = 0i32;
    for (index, c) in text.char_indices() {
        match c {
            '(' => {
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return index == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Split `lhs op rhs` on the first top-level comparison operator
fn split_relation(text: &str) -> Option<(String, Relation, String)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut depth = 0i32;
    for (i, &(offset, c)) in chars.iter().enumerate() {
        let prev = if i > 0 { Some(chars[i - 1].1) } else { None };
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let (relation, width) = match c {
            '(' | '[' | '{' => {
                depth += 1;
                continue;
            }
            ')' | ']' | '}' => {
                depth -= 1;
                continue;
            }
            _ if depth != 0 => {
                continue;
            }
            '≠' => (Relation::Ne, c.len_utf8()),
            '≤' => (Relation::Le, c.len_utf8()),
            '≥' => (Relation::Ge, c.len_utf8()),
            '!' if next == Some('=') => (Relation::Ne, 2),
            '<' if next == Some('>') => (Relation::Ne, 2),
            '<' if next == Some('=') => (Relation::Le, 2),
            '>' if next == Some('=') => (Relation::Ge, 2),
            // Arrows are not relations
            '<' if next == Some('-') => {
                continue;
            }
            '=' if next == Some('>') || next == Some('=') => {
                continue;
            }
            '>' if prev == Some('-') || prev == Some('=') => {
                continue;
            }
            '=' if matches!(prev, Some('<' | '>' | '!' | ':' | '=')) => {
                continue;
            }
            '=' => (Relation::Eq, 1),
            '<' => (Relation::Lt, 1),
            '>' => (Relation::Gt, 1),
            _ => {
                continue;
            }
        };
        let lhs = text[..offset].trim();
        let rhs = text[offset + width..].trim();
        if lhs.is_empty() || rhs.is_empty() {
            return None;
        }
        return Some((normalize(lhs), relation, normalize(rhs)));
    }
    None
}

fn complementary_relations(a: &str, b: &str) -> bool {
    match (split_relation(a), split_relation(b)) {
        (Some((lhs_a, rel_a, rhs_a)), Some((lhs_b, rel_b, rhs_b))) =>
            lhs_a == lhs_b && rhs_a == rhs_b && rel_a.complement() == rel_b,
        _ => false,
    }
}

/// `b` is `a` with one predicate swapped for its complement, or with one `not` removed
fn complementary_predicates(a: &str, b: &str) -> bool {
    let tokens_a: Vec<&str> = a.split_whitespace().collect();
    let tokens_b: Vec<&str> = b.split_whitespace().collect();

    if tokens_a.len() == tokens_b.len() + 1 {
        for (index, token) in tokens_a.iter().enumerate() {
            if *token == "not" {
                let mut without = tokens_a.clone();
                without.remove(index);
                if without == tokens_b {
                    return true;
                }
            }
        }
    }

    if tokens_a.len() != tokens_b.len() {
        return false;
    }
    let differing: Vec<usize> = (0..tokens_a.len()).filter(|&i| tokens_a[i] != tokens_b[i]).collect();
    if differing.len() != 1 {
        return false;
    }
    let index = differing[0];
    let (word_a, word_b) = (trim_punctuation(tokens_a[index]), trim_punctuation(tokens_b[index]));
    COMPLEMENTARY_PREDICATES.iter().any(|&(p, q)| (word_a == p && word_b == q) || (word_a == q && word_b == p))
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| !c.is_alphanumeric())
}
