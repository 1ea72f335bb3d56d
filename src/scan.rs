//! Text primitives shared by the SQL passes.
//!
//! None of this understands SQL grammar. It finds keywords, reads the
//! token that follows them, and slices the original text between two
//! matches. Every pass is written against these helpers so the heuristics
//! live in one place.
//!
//! Keyword search runs over a *folded* copy of the input: ASCII-lowercased,
//! with the contents of single-quoted literals masked out. Folding never
//! changes byte length, so offsets found in the folded copy slice the
//! original text directly.

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{multispace0, multispace1},
    IResult,
};

/// Byte range of a match inside the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A SQL string paired with its folded search view.
#[derive(Debug, Clone)]
pub struct SqlText<'a> {
    raw: &'a str,
    folded: String,
}

impl<'a> SqlText<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            folded: fold(raw),
        }
    }

    /// The text as given.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// First occurrence of `keyword` at word boundaries.
    ///
    /// `keyword` must be lowercase. Multi-word keywords (`"order by"`)
    /// match any run of whitespace between their words.
    pub fn find(&self, keyword: &str) -> Option<Span> {
        self.find_from(keyword, 0)
    }

    /// Like [`find`](Self::find), starting the search at byte `from`.
    pub fn find_from(&self, keyword: &str, from: usize) -> Option<Span> {
        let words: Vec<&str> = keyword.split_whitespace().collect();
        let first = *words.first()?;
        let mut offset = from;

        while let Some(rel) = self.folded.get(offset..)?.find(first) {
            let start = offset + rel;
            if let Ok((rest, ())) = keyword_words(&self.folded[start..], &words) {
                let end = self.folded.len() - rest.len();
                if self.boundary_before(start) && self.boundary_after(end) {
                    return Some(Span { start, end });
                }
            }
            offset = start + first.len();
        }
        None
    }

    /// Every non-overlapping occurrence of `keyword`, left to right.
    pub fn find_all(&self, keyword: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut from = 0;
        while let Some(span) = self.find_from(keyword, from) {
            from = span.end;
            spans.push(span);
        }
        spans
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.find(keyword).is_some()
    }

    /// Earliest match among `keywords` at or after `from`.
    pub fn find_first_of(&self, keywords: &[&str], from: usize) -> Option<Span> {
        keywords
            .iter()
            .filter_map(|kw| self.find_from(kw, from))
            .min_by_key(|span| span.start)
    }

    /// True when the text (ignoring leading whitespace) opens with `keyword`.
    pub fn starts_with(&self, keyword: &str) -> bool {
        let lead = self.raw.len() - self.raw.trim_start().len();
        self.find(keyword).is_some_and(|span| span.start == lead)
    }

    /// The first whitespace-delimited token at or after byte `from`.
    pub fn token_after(&self, from: usize) -> Option<Span> {
        let input = self.folded.get(from..)?;
        let (rest, tok) = token(input).ok()?;
        let end = self.folded.len() - rest.len();
        Some(Span {
            start: end - tok.len(),
            end,
        })
    }

    /// Byte offset of the first `c` outside single-quoted literals.
    pub fn find_char(&self, c: char) -> Option<usize> {
        self.folded.find(c)
    }

    /// The original text covered by `span`.
    pub fn slice(&self, span: Span) -> &'a str {
        self.raw.get(span.start..span.end).unwrap_or_default()
    }

    /// The original text between two byte offsets.
    pub fn between(&self, start: usize, end: usize) -> &'a str {
        self.raw.get(start..end).unwrap_or_default()
    }

    fn boundary_before(&self, at: usize) -> bool {
        at == 0 || !is_ident_byte(self.folded.as_bytes()[at - 1])
    }

    fn boundary_after(&self, at: usize) -> bool {
        self.folded
            .as_bytes()
            .get(at)
            .is_none_or(|b| !is_ident_byte(*b))
    }
}

/// Match the words of a keyword separated by at least one whitespace char.
fn keyword_words<'i>(input: &'i str, words: &[&str]) -> IResult<&'i str, ()> {
    let (mut rest, _) = tag(words[0])(input)?;
    for word in &words[1..] {
        let (r, _) = multispace1(rest)?;
        let (r, _) = tag(*word)(r)?;
        rest = r;
    }
    Ok((rest, ()))
}

/// Skip leading whitespace, then take everything up to the next whitespace.
fn token(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn fold(raw: &str) -> String {
    let mut in_literal = false;
    let bytes: Vec<u8> = raw
        .bytes()
        .map(|b| {
            if b == b'\'' {
                in_literal = !in_literal;
                b
            } else if in_literal {
                b'_'
            } else {
                b.to_ascii_lowercase()
            }
        })
        .collect();
    String::from_utf8(bytes).unwrap_or_else(|_| raw.to_ascii_lowercase())
}

/// Strip quoting and trailing punctuation from a token read out of SQL text.
///
/// `"employees";` → `employees`
pub fn bare_identifier(token: &str) -> &str {
    token
        .trim_end_matches([',', ';', ')'])
        .trim_matches(['"', '`', '[', ']'])
}

/// True for a bare or quoted identifier, optionally `qualifier.`-prefixed.
///
/// `e.salary` and `"hire_date"` qualify; `COUNT(*` and `*` do not.
pub fn is_identifier(token: &str) -> bool {
    let inner = token.trim_matches(['"', '`', '[', ']']);
    !inner.is_empty()
        && inner
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replace every occurrence of `keyword` (word-bounded, case-insensitive)
/// with `replacement`. Returns the new text and the number of replacements.
pub fn replace_keyword(sql: &str, keyword: &str, replacement: &str) -> (String, usize) {
    let text = SqlText::new(sql);
    let spans = text.find_all(keyword);
    if spans.is_empty() {
        return (sql.to_string(), 0);
    }

    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for span in &spans {
        out.push_str(text.between(cursor, span.start));
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(text.between(cursor, sql.len()));
    (out, spans.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_is_case_insensitive() {
        let text = SqlText::new("select id FROM employees");
        assert_eq!(text.find("from"), Some(Span { start: 10, end: 14 }));
    }

    #[test]
    fn test_find_respects_word_boundaries() {
        let text = SqlText::new("SELECT from_date, selected FROM t");
        assert_eq!(text.find("from").map(|s| s.start), Some(27));
        assert_eq!(text.find_all("select").len(), 1);
    }

    #[test]
    fn test_multi_word_keyword_spans_whitespace() {
        let text = SqlText::new("SELECT a FROM t ORDER\n   BY a");
        let span = text.find("order by").unwrap();
        assert_eq!(text.slice(span), "ORDER\n   BY");
    }

    #[test]
    fn test_literals_are_masked() {
        let text = SqlText::new("SELECT a FROM t WHERE note = 'from here'");
        assert_eq!(text.find_all("from").len(), 1);
        assert!(!text.contains("here"));
    }

    #[test]
    fn test_token_after() {
        let text = SqlText::new("SELECT * FROM   employees WHERE x = 1");
        let from = text.find("from").unwrap();
        let tok = text.token_after(from.end).unwrap();
        assert_eq!(text.slice(tok), "employees");
        assert_eq!(text.token_after(text.raw().len()), None);
    }

    #[test]
    fn test_starts_with() {
        assert!(SqlText::new("  Select 1").starts_with("select"));
        assert!(!SqlText::new("WITH x AS (SELECT 1) SELECT * FROM x").starts_with("select"));
    }

    #[test]
    fn test_bare_identifier() {
        assert_eq!(bare_identifier("\"employees\";"), "employees");
        assert_eq!(bare_identifier("name,"), "name");
        assert_eq!(bare_identifier("`t`"), "t");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("e.salary"));
        assert!(is_identifier("\"hire_date\""));
        assert!(!is_identifier("COUNT(*"));
        assert!(!is_identifier("*"));
        assert!(!is_identifier("/"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_find_char_skips_literals() {
        let text = SqlText::new("SELECT 'a;b' FROM t; DROP");
        assert_eq!(text.find_char(';'), Some(19));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  SELECT   a,\n\tb  FROM t "), "SELECT a, b FROM t");
    }

    #[test]
    fn test_replace_keyword() {
        let (out, n) = replace_keyword("select a from t where selected = 1", "select", "SELECT");
        assert_eq!(out, "SELECT a from t where selected = 1");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_non_ascii_text_is_safe() {
        let text = SqlText::new("SELECT naïve FROM café WHERE nom = 'Zoë from'");
        let from = text.find("from").unwrap();
        assert_eq!(text.slice(text.token_after(from.end).unwrap()), "café");
        assert_eq!(text.find_all("from").len(), 1);
    }
}
