//! Search filter grammar (RFC 4515), expression tree, symbolic builder
//! and BER encoding (RFC 4511 §4.5.1.7).
//!
//! A [`Filter`] is either a comparison leaf or a logical container
//! (`And`/`Or`/`Not`). Filters are built three ways: parsed from text
//! with [`Filter::parse`], constructed programmatically via [`Attribute`],
//! or combined from existing filters with `&`, `|` and `!`.

mod parser;

use std::fmt;

use lber::common::TagClass;
use lber::structure::StructureTag;
use lber::structures::{ASNTag, Boolean, ExplicitTag, OctetString, Sequence, Tag};

use crate::error::LdapError;

const AND_FILT: u64 = 0;
const OR_FILT: u64 = 1;
const NOT_FILT: u64 = 2;
const EQ_MATCH: u64 = 3;
const SUBSTR_MATCH: u64 = 4;
const GTE_MATCH: u64 = 5;
const LTE_MATCH: u64 = 6;
const PRES_MATCH: u64 = 7;
const APPROX_MATCH: u64 = 8;
const EXT_MATCH: u64 = 9;

const SUB_INITIAL: u64 = 0;
const SUB_ANY: u64 = 1;
const SUB_FINAL: u64 = 2;

fn filter_error(what: impl Into<String>) -> LdapError {
    LdapError::FilterError(what.into())
}

/// An assertion value, carrying both the decoded bytes and the escaped
/// text form it was parsed from or would print as.
#[derive(Clone, Debug, Eq)]
pub struct FilterValue {
    pub raw: String,
    pub decoded: Vec<u8>,
}

impl FilterValue {
    /// Builds a value from raw bytes, escaping only the RFC 4515
    /// mandatory metacharacters for the text form.
    pub fn new(decoded: impl Into<Vec<u8>>) -> FilterValue {
        let decoded = decoded.into();
        let mode = if needs_restricted(&decoded) { EscapeMode::Restricted } else { EscapeMode::Special };
        let raw = escape(&decoded, mode);
        FilterValue { raw, decoded }
    }

}

impl PartialEq for FilterValue {
    fn eq(&self, other: &FilterValue) -> bool {
        self.decoded == other.decoded
    }
}

/// `initial*any*...*final` assertion (RFC 4515 `substring`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubstringAssertion {
    pub initial: Option<FilterValue>,
    pub any: Vec<FilterValue>,
    pub final_: Option<FilterValue>,
}

/// Extensible match assertion (RFC 4515 `extensible`). At least one of
/// `attr`/`rule` is always present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensibleMatch {
    pub attr: Option<String>,
    pub dn: bool,
    pub rule: Option<String>,
    pub value: FilterValue,
}

/// One child of an `And`/`Or`/`Not` container, carrying the whitespace
/// that preceded it in the source text (empty when built
/// programmatically).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spaced {
    pub ws_before: String,
    pub filter: Filter,
}

impl Spaced {
    fn bare(filter: Filter) -> Spaced {
        Spaced { ws_before: String::new(), filter }
    }
}

/// The search filter expression tree (RFC 4515 §3, RFC 4511 §4.5.1.7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Presence(String),
    Equality(String, FilterValue),
    Substring(String, SubstringAssertion),
    GreaterOrEqual(String, FilterValue),
    LessOrEqual(String, FilterValue),
    Approximate(String, FilterValue),
    Extensible(ExtensibleMatch),
    And(Vec<Spaced>),
    Or(Vec<Spaced>),
    Not(Box<Spaced>),
}

/// Escaping modes for assertion values (§4.C).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeMode {
    /// Only the four characters RFC 4515 requires escaping everywhere:
    /// `\`, `*`, `(`, `)` and NUL.
    Special,
    /// Everything except safe alphanumerics and `-._@`; the default for
    /// values with leading/trailing whitespace or non-ASCII content.
    Restricted,
    /// Every byte, hex-escaped.
    All,
}

/// Hex-escapes `bytes` per `mode`, producing RFC 4515 assertion-value text.
pub fn escape(bytes: &[u8], mode: EscapeMode) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        let must_escape = match mode {
            EscapeMode::All => true,
            EscapeMode::Special => matches!(b, b'\\' | b'*' | b'(' | b')' | 0u8) || b >= 0x80,
            EscapeMode::Restricted => {
                !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'@'))
            }
        };
        if must_escape {
            out.push('\\');
            out.push_str(&format!("{b:02x}"));
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Whether a value needs [`EscapeMode::Restricted`] rather than
/// [`EscapeMode::Special`]: leading/trailing whitespace or any non-ASCII
/// byte, mirroring the original's `Comparison.escaped` property.
fn needs_restricted(decoded: &[u8]) -> bool {
    let leading_or_trailing_ws = decoded.first().is_some_and(u8::is_ascii_whitespace)
        || decoded.last().is_some_and(u8::is_ascii_whitespace);
    leading_or_trailing_ws || decoded.iter().any(|&b| b >= 0x80)
}

fn unescape(raw: &str) -> Result<Vec<u8>, LdapError> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if i + 3 > bytes.len() {
                return Err(filter_error("truncated \\XX escape"));
            }
            let hi = (bytes[i + 1] as char).to_digit(16).ok_or_else(|| filter_error("invalid \\XX escape"))?;
            let lo = (bytes[i + 2] as char).to_digit(16).ok_or_else(|| filter_error("invalid \\XX escape"))?;
            out.push(((hi << 4) | lo) as u8);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

impl Filter {
    /// Parses `s` in non-strict mode (whitespace tolerated around tokens
    /// and values, but not preserved beyond the and/or operator case).
    pub fn parse(s: &str) -> Result<Filter, LdapError> {
        parser::parse(s, false)
    }

    /// Parses `s` in strict mode: any whitespace around separators or
    /// values is a `FilterError`.
    pub fn parse_strict(s: &str) -> Result<Filter, LdapError> {
        parser::parse(s, true)
    }

    /// Escapes `s` for use as an assertion value in filter text.
    pub fn escape(s: &str, mode: EscapeMode) -> String {
        escape(s.as_bytes(), mode)
    }

    /// Encodes this filter as the BER `Filter` CHOICE (RFC 4511 §4.5.1.7).
    pub fn to_tag(&self) -> StructureTag {
        self.to_inner_tag().into_structure()
    }

    fn to_inner_tag(&self) -> Tag {
        match self {
            Filter::And(children) => seq_of_children(AND_FILT, children),
            Filter::Or(children) => seq_of_children(OR_FILT, children),
            Filter::Not(child) => Tag::ExplicitTag(ExplicitTag {
                class: TagClass::Context,
                id: NOT_FILT,
                inner: Box::new(child.filter.to_inner_tag()),
            }),
            Filter::Equality(attr, val) => comparison_tag(EQ_MATCH, attr, val),
            Filter::GreaterOrEqual(attr, val) => comparison_tag(GTE_MATCH, attr, val),
            Filter::LessOrEqual(attr, val) => comparison_tag(LTE_MATCH, attr, val),
            Filter::Approximate(attr, val) => comparison_tag(APPROX_MATCH, attr, val),
            Filter::Presence(attr) => Tag::OctetString(OctetString {
                class: TagClass::Context,
                id: PRES_MATCH,
                inner: attr.clone().into_bytes(),
            }),
            Filter::Substring(attr, sub) => substring_tag(attr, sub),
            Filter::Extensible(ext) => extensible_tag(ext),
        }
    }

    /// Visits this filter's nodes iteratively (no recursion, no parent
    /// pointers): `on_comparison` fires once per leaf, `on_operator`
    /// fires for `And`/`Or`/`Not` nodes according to `strategy`.
    pub fn walk<FC, FO>(&self, mut on_comparison: FC, mut on_operator: FO, strategy: WalkStrategy)
    where
        FC: FnMut(&Filter),
        FO: FnMut(&Filter),
    {
        enum Work<'a> {
            Enter(&'a Filter),
            Leave(&'a Filter),
        }

        let mut stack = vec![Work::Enter(self)];
        while let Some(work) = stack.pop() {
            match work {
                Work::Enter(node) => {
                    let is_operator = matches!(node, Filter::And(_) | Filter::Or(_) | Filter::Not(_));
                    if is_operator {
                        if matches!(strategy, WalkStrategy::Pre | WalkStrategy::Both) {
                            on_operator(node);
                        }
                        if matches!(strategy, WalkStrategy::Post | WalkStrategy::Both) {
                            stack.push(Work::Leave(node));
                        }
                    } else {
                        on_comparison(node);
                    }
                    match node {
                        Filter::And(children) | Filter::Or(children) => {
                            for c in children.iter().rev() {
                                stack.push(Work::Enter(&c.filter));
                            }
                        }
                        Filter::Not(child) => stack.push(Work::Enter(&child.filter)),
                        _ => {}
                    }
                }
                Work::Leave(node) => on_operator(node),
            }
        }
    }

    /// Structural equality ignoring captured whitespace and case of
    /// attribute/rule names.
    pub fn semantically_eq(&self, other: &Filter) -> bool {
        fn ci(a: &str, b: &str) -> bool {
            a.eq_ignore_ascii_case(b)
        }
        match (self, other) {
            (Filter::Presence(a), Filter::Presence(b)) => ci(a, b),
            (Filter::Equality(a, v1), Filter::Equality(b, v2))
            | (Filter::GreaterOrEqual(a, v1), Filter::GreaterOrEqual(b, v2))
            | (Filter::LessOrEqual(a, v1), Filter::LessOrEqual(b, v2))
            | (Filter::Approximate(a, v1), Filter::Approximate(b, v2)) => ci(a, b) && v1 == v2,
            (Filter::Substring(a, s1), Filter::Substring(b, s2)) => ci(a, b) && s1 == s2,
            (Filter::Extensible(e1), Filter::Extensible(e2)) => {
                e1.attr.as_deref().map(str::to_ascii_lowercase) == e2.attr.as_deref().map(str::to_ascii_lowercase)
                    && e1.dn == e2.dn
                    && e1.rule.as_deref().map(str::to_ascii_lowercase) == e2.rule.as_deref().map(str::to_ascii_lowercase)
                    && e1.value == e2.value
            }
            (Filter::And(c1), Filter::And(c2)) | (Filter::Or(c1), Filter::Or(c2)) => {
                c1.len() == c2.len() && c1.iter().zip(c2).all(|(x, y)| x.filter.semantically_eq(&y.filter))
            }
            (Filter::Not(c1), Filter::Not(c2)) => c1.filter.semantically_eq(&c2.filter),
            _ => false,
        }
    }

    /// Negates this filter, reusing an existing `Not` rather than
    /// double-wrapping.
    pub fn negate(self) -> Filter {
        !self
    }

    /// Appends `child` to an `And`/`Or` container.
    pub fn append(&mut self, child: Filter) -> Result<(), LdapError> {
        match self {
            Filter::And(c) | Filter::Or(c) => {
                c.push(Spaced::bare(child));
                Ok(())
            }
            _ => Err(filter_error("append is only valid on and/or filters")),
        }
    }

    /// Inserts `child` at `index` in an `And`/`Or` container.
    pub fn insert(&mut self, index: usize, child: Filter) -> Result<(), LdapError> {
        match self {
            Filter::And(c) | Filter::Or(c) => {
                if index > c.len() {
                    return Err(filter_error("insert index out of bounds"));
                }
                c.insert(index, Spaced::bare(child));
                Ok(())
            }
            _ => Err(filter_error("insert is only valid on and/or filters")),
        }
    }

    /// Replaces the first child structurally equal to `old` with `new`.
    /// Returns whether a replacement happened.
    pub fn replace(&mut self, old: &Filter, new: Filter) -> bool {
        match self {
            Filter::And(c) | Filter::Or(c) => {
                for sp in c.iter_mut() {
                    if sp.filter.semantically_eq(old) {
                        sp.filter = new;
                        return true;
                    }
                }
                false
            }
            Filter::Not(child) if child.filter.semantically_eq(old) => {
                child.filter = new;
                true
            }
            _ => false,
        }
    }

    /// Removes the first child structurally equal to `target`. Returns
    /// whether anything was removed.
    pub fn remove(&mut self, target: &Filter) -> bool {
        match self {
            Filter::And(c) | Filter::Or(c) => {
                let before = c.len();
                c.retain(|sp| !sp.filter.semantically_eq(target));
                c.len() != before
            }
            _ => false,
        }
    }

    /// Multi-line indented presentation with operator parentheses stacked.
    pub fn pretty(&self, indent: usize) -> String {
        let mut out = String::new();
        self.pretty_into(&mut out, 0, indent);
        out
    }

    fn pretty_into(&self, out: &mut String, level: usize, indent: usize) {
        let pad = " ".repeat(level * indent);
        match self {
            Filter::And(children) => pretty_container(out, &pad, level, indent, "(&", children),
            Filter::Or(children) => pretty_container(out, &pad, level, indent, "(|", children),
            Filter::Not(child) => {
                out.push_str(&pad);
                out.push_str("(!\n");
                child.filter.pretty_into(out, level + 1, indent);
                out.push('\n');
                out.push_str(&pad);
                out.push(')');
            }
            leaf => {
                out.push_str(&pad);
                out.push_str(&leaf.to_string());
            }
        }
    }
}

fn pretty_container(out: &mut String, pad: &str, level: usize, indent: usize, open: &str, children: &[Spaced]) {
    out.push_str(pad);
    out.push_str(open);
    out.push('\n');
    for (i, c) in children.iter().enumerate() {
        c.filter.pretty_into(out, level + 1, indent);
        if i + 1 != children.len() {
            out.push('\n');
        }
    }
    out.push('\n');
    out.push_str(pad);
    out.push(')');
}

/// Traversal order for [`Filter::walk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkStrategy {
    Pre,
    Post,
    Both,
}

impl std::ops::BitAnd for Filter {
    type Output = Filter;
    fn bitand(self, rhs: Filter) -> Filter {
        let mut children = match self {
            Filter::And(c) => c,
            other => vec![Spaced::bare(other)],
        };
        match rhs {
            Filter::And(c2) => children.extend(c2),
            other => children.push(Spaced::bare(other)),
        }
        Filter::And(children)
    }
}

impl std::ops::BitOr for Filter {
    type Output = Filter;
    fn bitor(self, rhs: Filter) -> Filter {
        let mut children = match self {
            Filter::Or(c) => c,
            other => vec![Spaced::bare(other)],
        };
        match rhs {
            Filter::Or(c2) => children.extend(c2),
            other => children.push(Spaced::bare(other)),
        }
        Filter::Or(children)
    }
}

impl std::ops::Not for Filter {
    type Output = Filter;
    fn not(self) -> Filter {
        match self {
            Filter::Not(child) => child.filter,
            other => Filter::Not(Box::new(Spaced::bare(other))),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(children) => write_container(f, "&", children),
            Filter::Or(children) => write_container(f, "|", children),
            Filter::Not(child) => write!(f, "(!{}{})", child.ws_before, child.filter),
            Filter::Presence(attr) => write!(f, "({attr}=*)"),
            Filter::Equality(attr, val) => write!(f, "({attr}={})", val.raw),
            Filter::GreaterOrEqual(attr, val) => write!(f, "({attr}>={})", val.raw),
            Filter::LessOrEqual(attr, val) => write!(f, "({attr}<={})", val.raw),
            Filter::Approximate(attr, val) => write!(f, "({attr}~={})", val.raw),
            Filter::Substring(attr, sub) => {
                let mut segments = vec![sub.initial.as_ref().map(|v| v.raw.clone()).unwrap_or_default()];
                segments.extend(sub.any.iter().map(|v| v.raw.clone()));
                segments.push(sub.final_.as_ref().map(|v| v.raw.clone()).unwrap_or_default());
                write!(f, "({attr}={})", segments.join("*"))
            }
            Filter::Extensible(ext) => {
                write!(f, "(")?;
                if let Some(attr) = &ext.attr {
                    write!(f, "{attr}")?;
                }
                if ext.dn {
                    write!(f, ":dn")?;
                }
                if let Some(rule) = &ext.rule {
                    write!(f, ":{rule}")?;
                }
                write!(f, ":={})", ext.value.raw)
            }
        }
    }
}

fn write_container(f: &mut fmt::Formatter<'_>, op: &str, children: &[Spaced]) -> fmt::Result {
    write!(f, "({op}")?;
    for c in children {
        write!(f, "{}{}", c.ws_before, c.filter)?;
    }
    write!(f, ")")
}

fn seq_of_children(id: u64, children: &[Spaced]) -> Tag {
    Tag::Sequence(Sequence {
        class: TagClass::Context,
        id,
        inner: children.iter().map(|c| c.filter.to_inner_tag()).collect(),
    })
}

fn comparison_tag(id: u64, attr: &str, val: &FilterValue) -> Tag {
    Tag::Sequence(Sequence {
        class: TagClass::Context,
        id,
        inner: vec![
            Tag::OctetString(OctetString { inner: attr.as_bytes().to_vec(), ..Default::default() }),
            Tag::OctetString(OctetString { inner: val.decoded.clone(), ..Default::default() }),
        ],
    })
}

fn substring_tag(attr: &str, sub: &SubstringAssertion) -> Tag {
    let mut inner = Vec::new();
    if let Some(initial) = &sub.initial {
        inner.push(Tag::OctetString(OctetString { class: TagClass::Context, id: SUB_INITIAL, inner: initial.decoded.clone() }));
    }
    for any in &sub.any {
        inner.push(Tag::OctetString(OctetString { class: TagClass::Context, id: SUB_ANY, inner: any.decoded.clone() }));
    }
    if let Some(final_) = &sub.final_ {
        inner.push(Tag::OctetString(OctetString { class: TagClass::Context, id: SUB_FINAL, inner: final_.decoded.clone() }));
    }
    Tag::Sequence(Sequence {
        class: TagClass::Context,
        id: SUBSTR_MATCH,
        inner: vec![
            Tag::OctetString(OctetString { inner: attr.as_bytes().to_vec(), ..Default::default() }),
            Tag::Sequence(Sequence { inner, ..Default::default() }),
        ],
    })
}

fn extensible_tag(ext: &ExtensibleMatch) -> Tag {
    let mut inner = Vec::new();
    if let Some(rule) = &ext.rule {
        inner.push(Tag::OctetString(OctetString { class: TagClass::Context, id: 1, inner: rule.clone().into_bytes() }));
    }
    if let Some(attr) = &ext.attr {
        inner.push(Tag::OctetString(OctetString { class: TagClass::Context, id: 2, inner: attr.clone().into_bytes() }));
    }
    inner.push(Tag::OctetString(OctetString { class: TagClass::Context, id: 3, inner: ext.value.decoded.clone() }));
    if ext.dn {
        inner.push(Tag::Boolean(Boolean { class: TagClass::Context, id: 4, inner: true }));
    }
    Tag::Sequence(Sequence { class: TagClass::Context, id: EXT_MATCH, inner })
}

/// `printf`-style filter-text builder: each `%s` in `fmt` is replaced by
/// the corresponding entry of `values`, escaped with [`EscapeMode::Restricted`].
pub fn from_format(fmt: &str, values: &[&[u8]]) -> Result<Filter, LdapError> {
    let mut out = String::new();
    let mut vi = 0;
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' && chars.peek() == Some(&'s') {
            chars.next();
            let v = values.get(vi).ok_or_else(|| filter_error("not enough values for format string"))?;
            out.push_str(&escape(v, EscapeMode::Restricted));
            vi += 1;
        } else {
            out.push(c);
        }
    }
    Filter::parse(&out)
}

/// Composes `(&(attr>=from)(!(attr>=to)))`, a half-open time range.
/// `to == None` yields the bare lower bound.
pub fn time_span_filter(attr: &str, from: &str, to: Option<&str>) -> Result<Filter, LdapError> {
    let attribute = Attribute::new(attr)?;
    let lower = attribute.ge(from.as_bytes());
    match to {
        Some(t) => Ok(lower & !attribute.ge(t.as_bytes())),
        None => Ok(lower),
    }
}

fn validate_attribute_name(name: &str) -> Result<(), LdapError> {
    if name.is_empty() {
        return Err(filter_error("attribute name must not be empty"));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if first.is_ascii_digit() {
        if !name.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(filter_error("numeric OID attribute name contains invalid characters"));
        }
    } else if !first.is_ascii_alphabetic() {
        return Err(filter_error("attribute name must start with a letter or digit"));
    } else if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ';') {
        return Err(filter_error("attribute name contains invalid characters"));
    }
    Ok(())
}

/// Fluent, symbolic filter builder bound to one attribute (and,
/// optionally, a `:dn` flag and matching rule for extensible matches).
///
/// Named methods stand in for operator overloading (`==`, `>=`, ...)
/// since Rust's comparison operators must return `bool`: `eq`, `ne`,
/// `ge`, `le`, `gt`, `lt`, `approx`, `present`, `extensible`. Filters
/// built from different attributes combine with `&`/`|`/`!`.
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    dn: bool,
    rule: Option<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Result<Attribute, LdapError> {
        let name = name.into();
        validate_attribute_name(&name)?;
        Ok(Attribute { name, dn: false, rule: None })
    }

    /// Marks this attribute's extensible-match assertions as `:dn`.
    pub fn dn(mut self) -> Self {
        self.dn = true;
        self
    }

    /// Sets the matching rule used by `extensible()`.
    pub fn rule(mut self, rule: impl Into<String>) -> Result<Self, LdapError> {
        let rule = rule.into();
        validate_attribute_name(&rule)?;
        self.rule = Some(rule);
        Ok(self)
    }

    /// `attr = value`, detecting substring (`*` anchors) and presence
    /// (`*` alone) forms the way the filter grammar itself does.
    pub fn eq(&self, value: impl AsRef<[u8]>) -> Filter {
        let bytes = value.as_ref();
        if bytes == b"*" {
            return Filter::Presence(self.name.clone());
        }
        if bytes.contains(&b'*') {
            let parts: Vec<&[u8]> = bytes.split(|&b| b == b'*').collect();
            let n = parts.len();
            let initial = (!parts[0].is_empty()).then(|| FilterValue::new(parts[0].to_vec()));
            let final_ = (!parts[n - 1].is_empty()).then(|| FilterValue::new(parts[n - 1].to_vec()));
            let any = parts[1..n - 1].iter().filter(|p| !p.is_empty()).map(|p| FilterValue::new(p.to_vec())).collect();
            return Filter::Substring(self.name.clone(), SubstringAssertion { initial, any, final_ });
        }
        Filter::Equality(self.name.clone(), FilterValue::new(bytes.to_vec()))
    }

    /// `!(attr = value)`.
    pub fn ne(&self, value: impl AsRef<[u8]>) -> Filter {
        !self.eq(value)
    }

    pub fn ge(&self, value: impl AsRef<[u8]>) -> Filter {
        Filter::GreaterOrEqual(self.name.clone(), FilterValue::new(value.as_ref().to_vec()))
    }

    pub fn le(&self, value: impl AsRef<[u8]>) -> Filter {
        Filter::LessOrEqual(self.name.clone(), FilterValue::new(value.as_ref().to_vec()))
    }

    /// Strict `>`, expressed as `!(attr <= value)` since RFC 4511 has no
    /// dedicated greater-than match.
    pub fn gt(&self, value: impl AsRef<[u8]>) -> Filter {
        !self.le(value)
    }

    /// Strict `<`, expressed as `!(attr >= value)`.
    pub fn lt(&self, value: impl AsRef<[u8]>) -> Filter {
        !self.ge(value)
    }

    /// `attr >= value + 1`, preserving integer semantics for `>` where
    /// a plain `!(attr <= value)` would also match non-integer servers'
    /// collation quirks at the boundary.
    pub fn gt_int(&self, value: i64) -> Filter {
        self.ge((value + 1).to_string())
    }

    /// `attr <= value - 1`.
    pub fn lt_int(&self, value: i64) -> Filter {
        self.le((value - 1).to_string())
    }

    pub fn approx(&self, value: impl AsRef<[u8]>) -> Filter {
        Filter::Approximate(self.name.clone(), FilterValue::new(value.as_ref().to_vec()))
    }

    pub fn present(&self) -> Filter {
        Filter::Presence(self.name.clone())
    }

    /// `attr:[dn:][rule:]= value`, using this attribute's configured
    /// `dn`/`rule` settings.
    pub fn extensible(&self, value: impl AsRef<[u8]>) -> Filter {
        Filter::Extensible(ExtensibleMatch {
            attr: Some(self.name.clone()),
            dn: self.dn,
            rule: self.rule.clone(),
            value: FilterValue::new(value.as_ref().to_vec()),
        })
    }

    pub fn substring(&self, initial: Option<&[u8]>, any: &[&[u8]], final_: Option<&[u8]>) -> Filter {
        Filter::Substring(
            self.name.clone(),
            SubstringAssertion {
                initial: initial.map(|v| FilterValue::new(v.to_vec())),
                any: any.iter().map(|v| FilterValue::new(v.to_vec())).collect(),
                final_: final_.map(|v| FilterValue::new(v.to_vec())),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_matches_concrete_example() {
        assert_eq!(escape(b" hello (my friend)*", EscapeMode::Restricted), "\\20hello\\20\\28my\\20friend\\29\\2a");
    }

    #[test]
    fn unescape_round_trips_escape() {
        let raw = escape(b"a(b)c*d\\e", EscapeMode::All);
        assert_eq!(unescape(&raw).unwrap(), b"a(b)c*d\\e");
    }

    #[test]
    fn whitespace_round_trip_for_and() {
        let printed = Filter::parse("(& (cn=John))").unwrap().to_string();
        assert_eq!(printed, "(& (cn=John))");
    }

    #[test]
    fn structural_round_trip_after_reparse() {
        let f1 = Filter::parse("(&(cn=a)(|(sn=b)(sn=c)))").unwrap();
        let printed = f1.to_string();
        let f2 = Filter::parse(&printed).unwrap();
        assert!(f1.semantically_eq(&f2));
    }

    #[test]
    fn builder_eq_matches_classic_equality() {
        let attr = Attribute::new("cn").unwrap();
        let built = attr.eq("x");
        let parsed = Filter::parse("(cn=x)").unwrap();
        assert!(built.semantically_eq(&parsed));
    }

    #[test]
    fn builder_eq_detects_presence_and_substring() {
        let attr = Attribute::new("cn").unwrap();
        assert!(matches!(attr.eq("*"), Filter::Presence(_)));
        assert!(matches!(attr.eq("a*b"), Filter::Substring(..)));
    }

    #[test]
    fn and_or_operators_flatten() {
        let attr = Attribute::new("cn").unwrap();
        let combined = attr.eq("a") & attr.eq("b") & attr.eq("c");
        assert!(matches!(combined, Filter::And(c) if c.len() == 3));
    }

    #[test]
    fn not_operator_unwraps_double_negation() {
        let attr = Attribute::new("cn").unwrap();
        let f = attr.eq("a");
        let double = !!(f.clone());
        assert!(double.semantically_eq(&f));
    }

    #[test]
    fn append_and_remove_on_and() {
        let attr = Attribute::new("cn").unwrap();
        let mut f = attr.eq("a") & attr.eq("b");
        f.append(attr.eq("c")).unwrap();
        assert!(matches!(&f, Filter::And(c) if c.len() == 3));
        assert!(f.remove(&attr.eq("b")));
        assert!(matches!(&f, Filter::And(c) if c.len() == 2));
    }

    #[test]
    fn time_span_filter_builds_expected_shape() {
        let f = time_span_filter("modifyTimestamp", "20240101000000Z", Some("20240201000000Z")).unwrap();
        assert_eq!(f.to_string(), "(&(modifyTimestamp>=20240101000000Z)(!(modifyTimestamp>=20240201000000Z)))");
    }

    #[test]
    fn non_ascii_value_round_trips_through_text() {
        let attr = Attribute::new("cn").unwrap();
        let f = attr.eq("héllo".as_bytes());
        let printed = f.to_string();
        let reparsed = Filter::parse(&printed).unwrap();
        assert!(f.semantically_eq(&reparsed));
        match reparsed {
            Filter::Equality(_, v) => assert_eq!(v.decoded, "héllo".as_bytes()),
            _ => panic!("expected equality filter"),
        }
    }

    #[test]
    fn leading_whitespace_value_uses_restricted_escaping() {
        let v = FilterValue::new(b" hi".to_vec());
        assert_eq!(v.raw, "\\20hi");
    }

    #[test]
    fn from_format_substitutes_and_escapes() {
        let f = from_format("(cn=%s)", &[b"a b"]).unwrap();
        assert!(matches!(f, Filter::Equality(_, v) if v.raw == "a\\20b"));
    }

    #[test]
    fn pretty_indents_nested_operators() {
        let f = Filter::parse("(&(cn=a)(sn=b))").unwrap();
        let pretty = f.pretty(2);
        assert_eq!(pretty, "(&\n  (cn=a)\n  (sn=b)\n)");
    }

    #[test]
    fn walk_visits_comparisons_and_operators() {
        let f = Filter::parse("(&(cn=a)(sn=b))").unwrap();
        let mut comparisons = 0;
        let mut operators = 0;
        f.walk(|_| comparisons += 1, |_| operators += 1, WalkStrategy::Pre);
        assert_eq!(comparisons, 2);
        assert_eq!(operators, 1);
    }
}
