//! RFC 4515 filter grammar, hand-written as a recursive-descent parser
//! over `&str` rather than nom combinators: threading strict/non-strict
//! whitespace tolerance through nom's uniform `Fn(Input) -> IResult`
//! signature is more awkward than just carrying a `strict` flag on a
//! cursor.

use super::{ExtensibleMatch, Filter, FilterValue, Spaced, SubstringAssertion};
use crate::error::LdapError;

fn err(what: impl Into<String>) -> LdapError {
    LdapError::FilterError(what.into())
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
    strict: bool,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_char(&mut self, c: char) -> Result<(), LdapError> {
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(err(format!("expected '{c}' at offset {}", self.pos)))
        }
    }

    fn eat_str(&mut self, s: &str) -> Result<(), LdapError> {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            Ok(())
        } else {
            Err(err(format!("expected '{s}' at offset {}", self.pos)))
        }
    }

    /// Consumes whitespace in non-strict mode; rejects any in strict mode.
    fn ws(&mut self) -> Result<String, LdapError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            if self.strict {
                return Err(err("whitespace is not permitted in strict mode"));
            }
            self.bump();
        }
        Ok(self.s[start..self.pos].to_owned())
    }
}

fn hex_val(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

pub(super) fn parse(input: &str, strict: bool) -> Result<Filter, LdapError> {
    let mut cur = Cursor { s: input, pos: 0, strict };
    let f = parse_filtexpr(&mut cur)?;
    cur.ws()?;
    if cur.pos != cur.s.len() {
        return Err(err(format!("trailing input at offset {}", cur.pos)));
    }
    Ok(f)
}

fn parse_filtexpr(cur: &mut Cursor) -> Result<Filter, LdapError> {
    if cur.peek() == Some('(') {
        parse_filter(cur)
    } else {
        parse_item(cur)
    }
}

fn parse_filter(cur: &mut Cursor) -> Result<Filter, LdapError> {
    cur.eat_char('(')?;
    let f = parse_filtercomp(cur)?;
    cur.eat_char(')')?;
    Ok(f)
}

fn parse_filtercomp(cur: &mut Cursor) -> Result<Filter, LdapError> {
    match cur.peek() {
        Some('&') => {
            cur.bump();
            Ok(Filter::And(parse_filterlist(cur)?))
        }
        Some('|') => {
            cur.bump();
            Ok(Filter::Or(parse_filterlist(cur)?))
        }
        Some('!') => {
            cur.bump();
            let ws_before = cur.ws()?;
            let filter = parse_filter(cur)?;
            Ok(Filter::Not(Box::new(Spaced { ws_before, filter })))
        }
        _ => parse_item(cur),
    }
}

fn parse_filterlist(cur: &mut Cursor) -> Result<Vec<Spaced>, LdapError> {
    let mut out = Vec::new();
    loop {
        let ws_before = cur.ws()?;
        if cur.peek() != Some('(') {
            if out.is_empty() {
                return Err(err("expected at least one filter in and/or list"));
            }
            break;
        }
        let filter = parse_filter(cur)?;
        out.push(Spaced { ws_before, filter });
    }
    Ok(out)
}

fn parse_item(cur: &mut Cursor) -> Result<Filter, LdapError> {
    if cur.peek() == Some(':') {
        return parse_dn_mrule(cur, None);
    }
    let attr = parse_attributedescription(cur)?;
    if cur.peek() == Some(':') {
        return parse_dn_mrule(cur, Some(attr));
    }
    match cur.peek() {
        Some('=') => {
            cur.bump();
            parse_eq_or_substr_or_presence(cur, attr)
        }
        Some('>') if cur.rest().starts_with(">=") => {
            cur.pos += 2;
            let value = parse_unescaped_value(cur)?;
            Ok(Filter::GreaterOrEqual(attr, value))
        }
        Some('<') if cur.rest().starts_with("<=") => {
            cur.pos += 2;
            let value = parse_unescaped_value(cur)?;
            Ok(Filter::LessOrEqual(attr, value))
        }
        Some('~') if cur.rest().starts_with("~=") => {
            cur.pos += 2;
            let value = parse_unescaped_value(cur)?;
            Ok(Filter::Approximate(attr, value))
        }
        _ => Err(err(format!("expected a comparison operator at offset {}", cur.pos))),
    }
}

/// `[attr] [":dn"] [":" rule] ":=" value` — covers both the attr-qualified
/// and bare (rule-only) extensible-match forms.
fn parse_dn_mrule(cur: &mut Cursor, attr: Option<String>) -> Result<Filter, LdapError> {
    let dn = if cur.rest().starts_with(":dn") {
        cur.pos += 3;
        true
    } else {
        false
    };
    let rule = if cur.rest().starts_with(":=") {
        None
    } else {
        cur.eat_char(':')?;
        Some(parse_attributetype(cur)?)
    };
    if attr.is_none() && rule.is_none() {
        return Err(err("extensible match requires an attribute or a matching rule"));
    }
    cur.eat_str(":=")?;
    let value = parse_unescaped_value(cur)?;
    Ok(Filter::Extensible(ExtensibleMatch { attr, dn, rule, value }))
}

fn parse_eq_or_substr_or_presence(cur: &mut Cursor, attr: String) -> Result<Filter, LdapError> {
    let initial = parse_unescaped_value(cur)?;
    let mut mid_final = Vec::new();
    while cur.peek() == Some('*') {
        cur.bump();
        mid_final.push(parse_unescaped_value(cur)?);
    }
    if mid_final.is_empty() {
        return Ok(Filter::Equality(attr, initial));
    }
    if initial.decoded.is_empty() && mid_final.len() == 1 && mid_final[0].decoded.is_empty() {
        return Ok(Filter::Presence(attr));
    }
    let n = mid_final.len();
    for (i, v) in mid_final.iter().enumerate() {
        if v.decoded.is_empty() && i + 1 != n {
            return Err(err("adjacent '*' not allowed in substring assertion"));
        }
    }
    let initial_opt = if initial.decoded.is_empty() { None } else { Some(initial) };
    let mut any = Vec::new();
    let mut final_ = None;
    for (i, v) in mid_final.into_iter().enumerate() {
        if v.decoded.is_empty() {
            break;
        }
        if i + 1 == n {
            final_ = Some(v);
        } else {
            any.push(v);
        }
    }
    Ok(Filter::Substring(attr, SubstringAssertion { initial: initial_opt, any, final_ }))
}

/// Reads an assertion value up to the next unescaped `(`, `)` or `*`,
/// decoding `\XX` hex escapes as it goes.
fn parse_unescaped_value(cur: &mut Cursor) -> Result<FilterValue, LdapError> {
    let start = cur.pos;
    let mut decoded = Vec::new();
    loop {
        match cur.peek() {
            None | Some('(') | Some(')') | Some('*') => break,
            Some('\\') => {
                cur.bump();
                let hi = cur.bump().and_then(hex_val).ok_or_else(|| err("invalid \\XX escape"))?;
                let lo = cur.bump().and_then(hex_val).ok_or_else(|| err("invalid \\XX escape"))?;
                decoded.push((hi << 4) | lo);
            }
            Some(c) => {
                cur.bump();
                let mut buf = [0u8; 4];
                decoded.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Ok(FilterValue { raw: cur.s[start..cur.pos].to_owned(), decoded })
}

fn parse_attributedescription(cur: &mut Cursor) -> Result<String, LdapError> {
    let start = cur.pos;
    parse_attributetype(cur)?;
    while cur.peek() == Some(';') {
        cur.bump();
        parse_option(cur)?;
    }
    Ok(cur.s[start..cur.pos].to_owned())
}

fn parse_attributetype(cur: &mut Cursor) -> Result<String, LdapError> {
    let start = cur.pos;
    match cur.peek() {
        Some(c) if c.is_ascii_digit() => parse_numericoid(cur)?,
        Some(c) if c.is_ascii_alphabetic() => parse_descr(cur)?,
        _ => return Err(err(format!("expected an attribute type at offset {}", cur.pos))),
    }
    Ok(cur.s[start..cur.pos].to_owned())
}

fn parse_numericoid(cur: &mut Cursor) -> Result<(), LdapError> {
    parse_number(cur)?;
    while cur.peek() == Some('.') {
        cur.bump();
        parse_number(cur)?;
    }
    Ok(())
}

fn parse_number(cur: &mut Cursor) -> Result<(), LdapError> {
    let start = cur.pos;
    while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
        cur.bump();
    }
    let digits = &cur.s[start..cur.pos];
    if digits.is_empty() {
        return Err(err("expected a number"));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(err("superfluous leading zero in numeric OID component"));
    }
    Ok(())
}

fn parse_descr(cur: &mut Cursor) -> Result<(), LdapError> {
    if !matches!(cur.peek(), Some(c) if c.is_ascii_alphabetic()) {
        return Err(err("attribute descr must start with a letter"));
    }
    cur.bump();
    while matches!(cur.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '-') {
        cur.bump();
    }
    Ok(())
}

fn parse_option(cur: &mut Cursor) -> Result<(), LdapError> {
    let start = cur.pos;
    while matches!(cur.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '-') {
        cur.bump();
    }
    if cur.pos == start {
        return Err(err("empty attribute option"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Filter {
        parse(s, false).unwrap_or_else(|e| panic!("failed to parse {s:?}: {e}"))
    }

    #[test]
    fn parses_simple_equality() {
        assert!(matches!(p("(cn=John)"), Filter::Equality(a, v) if a == "cn" && v.decoded == b"John"));
    }

    #[test]
    fn parses_bare_item_at_top_level() {
        assert!(matches!(p("cn=John"), Filter::Equality(..)));
    }

    #[test]
    fn parses_presence() {
        assert!(matches!(p("(cn=*)"), Filter::Presence(a) if a == "cn"));
    }

    #[test]
    fn parses_substring_all_parts() {
        match p("(cn=fo*ba*r)") {
            Filter::Substring(attr, sub) => {
                assert_eq!(attr, "cn");
                assert_eq!(sub.initial.unwrap().decoded, b"fo");
                assert_eq!(sub.any.len(), 1);
                assert_eq!(sub.any[0].decoded, b"ba");
                assert_eq!(sub.final_.unwrap().decoded, b"r");
            }
            other => panic!("expected substring, got {other:?}"),
        }
    }

    #[test]
    fn parses_trailing_wildcard_substring() {
        match p("(cn=foo*)") {
            Filter::Substring(_, sub) => {
                assert_eq!(sub.initial.unwrap().decoded, b"foo");
                assert!(sub.final_.is_none());
            }
            other => panic!("expected substring, got {other:?}"),
        }
    }

    #[test]
    fn rejects_adjacent_asterisks() {
        assert!(parse("(cn=foo**bar)", false).is_err());
    }

    #[test]
    fn parses_and_or_not() {
        assert!(matches!(p("(&(cn=a)(sn=b))"), Filter::And(c) if c.len() == 2));
        assert!(matches!(p("(|(cn=a)(sn=b))"), Filter::Or(c) if c.len() == 2));
        assert!(matches!(p("(!(cn=a))"), Filter::Not(_)));
    }

    #[test]
    fn preserves_whitespace_after_operator_in_nonstrict_mode() {
        match p("(& (cn=John))") {
            Filter::And(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].ws_before, " ");
            }
            other => panic!("expected and, got {other:?}"),
        }
    }

    #[test]
    fn strict_mode_rejects_whitespace() {
        assert!(parse("(& (cn=John))", true).is_err());
        assert!(parse("(&(cn=John))", true).is_ok());
    }

    #[test]
    fn parses_extensible_match_forms() {
        assert!(matches!(p("(cn:caseExactMatch:=John)"), Filter::Extensible(e) if e.attr.as_deref() == Some("cn") && e.rule.as_deref() == Some("caseExactMatch") && !e.dn));
        assert!(matches!(p("(cn:dn:=John)"), Filter::Extensible(e) if e.attr.as_deref() == Some("cn") && e.dn && e.rule.is_none()));
        assert!(matches!(p("(:caseExactMatch:=John)"), Filter::Extensible(e) if e.attr.is_none() && e.rule.as_deref() == Some("caseExactMatch")));
    }

    #[test]
    fn decodes_hex_escapes_in_values() {
        assert!(matches!(p(r"(cn=foo\28bar\29)"), Filter::Equality(_, v) if v.decoded == b"foo(bar)"));
    }

    #[test]
    fn numeric_oid_attribute_type() {
        assert!(matches!(p("(1.2.840.113556.1.4.473=x)"), Filter::Equality(a, _) if a == "1.2.840.113556.1.4.473"));
    }

    #[test]
    fn rejects_leading_zero_in_numeric_oid() {
        assert!(parse("(1.02.3=x)", false).is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("(cn=a)garbage", false).is_err());
    }
}
