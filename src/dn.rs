//! Distinguished Name model (RFC 4514).
//!
//! A [`Dn`] is an ordered sequence of RDNs, most-significant (the entry
//! itself) first, root last — the same order the RFC 4514 string form
//! lists them in, read left to right. Each RDN is a non-empty, ordered
//! set of [`Ava`]s. Parsing tolerates the liberalizations real directories
//! produce in the wild: arbitrary whitespace around `=`, `+` and `,`, and
//! Samba-style superfluous backslash escapes (`\?`) which are resolved to
//! the literal character.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::LdapError;

/// Whether an AVA's value was written as plain (possibly escaped) text or
/// as an RFC 4514 hex-encoded binary value (`attr=#0403666f6f`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AvaEncoding {
    Str,
    Hex,
}

/// One attribute-value assertion inside an RDN.
#[derive(Clone, Debug)]
pub struct Ava {
    attribute: String,
    value: Vec<u8>,
    encoding: AvaEncoding,
}

impl Ava {
    fn new_str(attribute: impl Into<String>, value: Vec<u8>) -> Self {
        Ava { attribute: attribute.into(), value, encoding: AvaEncoding::Str }
    }

    fn new_hex(attribute: impl Into<String>, value: Vec<u8>) -> Self {
        Ava { attribute: attribute.into(), value, encoding: AvaEncoding::Hex }
    }

    /// Attribute name, in the case it was written in the source text.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Decoded value, as UTF-8 (lossily, for hex-encoded binary values
    /// that don't happen to decode to valid UTF-8).
    pub fn value(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// Raw decoded value bytes.
    pub fn value_bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn encoding(&self) -> AvaEncoding {
        self.encoding
    }

    fn key(&self) -> (String, Vec<u8>) {
        (self.attribute.to_ascii_lowercase(), self.value.to_ascii_lowercase())
    }

    fn fmt_canonical(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attr = self.attribute.to_ascii_lowercase();
        match self.encoding {
            AvaEncoding::Str => write!(f, "{}={}", attr, escape_rfc4514(&self.value()))
                .and(Ok(())),
            AvaEncoding::Hex => {
                write!(f, "{attr}#")?;
                for b in &self.value {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single relative distinguished name: a non-empty, ordered set of AVAs.
pub type Rdn = Vec<Ava>;

fn rdn_key(rdn: &[Ava]) -> Vec<(String, Vec<u8>)> {
    let mut key: Vec<_> = rdn.iter().map(Ava::key).collect();
    key.sort();
    key
}

fn rdn_eq(a: &[Ava], b: &[Ava]) -> bool {
    rdn_key(a) == rdn_key(b)
}

/// A parsed, immutable Distinguished Name.
#[derive(Clone, Debug)]
pub struct Dn {
    rdns: Vec<Rdn>,
}

/// A component that can be fed to [`Dn::compose`].
pub enum DnComponent {
    /// An `(attribute, value)` pair; the value is escaped automatically.
    Ava(String, String),
    /// An already-parsed or canonical-string DN, spliced in as-is.
    Dn(Dn),
}

impl DnComponent {
    pub fn ava(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        DnComponent::Ava(attribute.into(), value.into())
    }
}

impl From<(&str, &str)> for DnComponent {
    fn from((attr, value): (&str, &str)) -> Self {
        DnComponent::ava(attr, value)
    }
}

impl From<Dn> for DnComponent {
    fn from(dn: Dn) -> Self {
        DnComponent::Dn(dn)
    }
}

impl From<&Dn> for DnComponent {
    fn from(dn: &Dn) -> Self {
        DnComponent::Dn(dn.clone())
    }
}

impl TryFrom<&str> for DnComponent {
    type Error = LdapError;

    fn try_from(s: &str) -> Result<Self, LdapError> {
        Ok(DnComponent::Dn(Dn::parse(s)?))
    }
}

impl Dn {
    /// Parse a DN string, per RFC 4514, tolerating optional whitespace
    /// around separators and Samba-style superfluous escapes.
    pub fn parse(s: &str) -> Result<Dn, LdapError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Dn { rdns: Vec::new() });
        }
        let mut rdns = Vec::new();
        for rdn_str in split_top_level(s, ',') {
            rdns.push(parse_rdn(&rdn_str)?);
        }
        Ok(Dn { rdns })
    }

    /// Idempotent canonical-form normalization of a DN string.
    pub fn normalize(s: &str) -> Result<String, LdapError> {
        Ok(Dn::parse(s)?.to_string())
    }

    /// Accept either an owned `Dn` or a string to parse, mirroring the
    /// ergonomic `DN.get()` constructor of the original library.
    pub fn get(value: impl TryInto<Dn, Error = LdapError>) -> Result<Dn, LdapError> {
        value.try_into()
    }

    /// Deduplicate a collection of DN strings by canonical equality.
    pub fn get_unique<I, S>(dns: I) -> Result<HashSet<Dn>, LdapError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        dns.into_iter().map(|s| Dn::parse(s.as_ref())).collect()
    }

    /// Render a set of DNs back to their (first-seen) string forms.
    pub fn get_unique_str(dns: &HashSet<Dn>) -> HashSet<String> {
        dns.iter().map(Dn::to_string).collect()
    }

    /// Join DN components left to right; the first component is the
    /// child (closest to the leaf), the last is the outermost suffix.
    pub fn compose(parts: &[DnComponent]) -> Result<Dn, LdapError> {
        let mut rdns = Vec::new();
        for part in parts {
            match part {
                DnComponent::Ava(attr, value) => {
                    rdns.push(vec![Ava::new_str(attr.clone(), value.clone().into_bytes())]);
                }
                DnComponent::Dn(dn) => rdns.extend(dn.rdns.iter().cloned()),
            }
        }
        Ok(Dn { rdns })
    }

    /// RFC 4514 value-escaping for safe embedding in a DN string. Escapes
    /// every structurally significant character (including `=`, which is
    /// not strictly mandated by RFC 4514 but is escaped defensively so the
    /// result is safe regardless of which side of an AVA it ends up on).
    pub fn escape(s: &str) -> String {
        escape_value(s, true)
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// The parent DN (this DN without its leaf RDN), or `None` for the
    /// empty DN or a single-RDN DN.
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.len() <= 1 {
            return None;
        }
        Some(Dn { rdns: self.rdns[1..].to_vec() })
    }

    /// Like [`Dn::parent`], but returns `None` if `self` is already at or
    /// above `base` (fewer or equal RDNs), rather than walking further up.
    pub fn get_parent(&self, base: &Dn) -> Option<Dn> {
        if self.len() <= base.len() {
            return None;
        }
        self.parent()
    }

    /// Yield DNs from `base` down to `self`, inclusive, one RDN at a time.
    pub fn walk(&self, base: &Dn) -> Result<Vec<Dn>, LdapError> {
        if !self.endswith(base) {
            return Err(LdapError::Other(crate::error::ErrorInfo::new(
                80,
                "DN does not end with given base",
            )));
        }
        let extra = self.len() - base.len();
        let mut out = Vec::with_capacity(extra + 1);
        for l in 0..=extra {
            let start = self.len() - base.len() - l;
            out.push(Dn { rdns: self.rdns[start..].to_vec() });
        }
        Ok(out)
    }

    pub fn endswith(&self, other: &Dn) -> bool {
        if other.len() > self.len() {
            return false;
        }
        let start = self.len() - other.len();
        self.rdns[start..]
            .iter()
            .zip(other.rdns.iter())
            .all(|(a, b)| rdn_eq(a, b))
    }

    pub fn startswith(&self, other: &Dn) -> bool {
        if other.len() > self.len() {
            return false;
        }
        self.rdns[..other.len()]
            .iter()
            .zip(other.rdns.iter())
            .all(|(a, b)| rdn_eq(a, b))
    }

    /// Whether `rdn` (a single-RDN DN, possibly multi-valued) is one of
    /// this DN's own RDNs (canonical, set-wise comparison).
    pub fn contains_rdn(&self, rdn: &Dn) -> bool {
        rdn.len() == 1 && self.rdns.iter().any(|r| rdn_eq(r, &rdn.rdns[0]))
    }

    /// The leaf RDN's first AVA as `(attribute, value)`.
    pub fn rdn(&self) -> Option<(&str, std::borrow::Cow<'_, str>)> {
        self.rdns.first()?.first().map(|a| (a.attribute(), a.value()))
    }

    /// All AVAs of the leaf RDN, as `(attribute, value)` pairs.
    pub fn multi_rdn(&self) -> Vec<(&str, std::borrow::Cow<'_, str>)> {
        self.rdns
            .first()
            .map(|rdn| rdn.iter().map(|a| (a.attribute(), a.value())).collect())
            .unwrap_or_default()
    }

    pub fn attribute(&self) -> Option<&str> {
        self.rdn().map(|(a, _)| a)
    }

    pub fn attributes(&self) -> Vec<&str> {
        self.multi_rdn().into_iter().map(|(a, _)| a).collect()
    }

    pub fn value(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.rdn().map(|(_, v)| v)
    }

    pub fn values(&self) -> Vec<std::borrow::Cow<'_, str>> {
        self.multi_rdn().into_iter().map(|(_, v)| v).collect()
    }

    /// Full structured decomposition: one entry per RDN, each a vector of
    /// `(attribute, value, encoding)`.
    pub fn rdns(&self) -> Vec<Vec<(&str, std::borrow::Cow<'_, str>, AvaEncoding)>> {
        self.rdns
            .iter()
            .map(|rdn| rdn.iter().map(|a| (a.attribute(), a.value(), a.encoding())).collect())
            .collect()
    }

    /// The DN consisting of RDNs `range`.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Dn {
        Dn { rdns: self.rdns[range].to_vec() }
    }

    /// The single-RDN DN at position `i`.
    pub fn nth(&self, i: usize) -> Dn {
        self.slice(i..i + 1)
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            for (j, ava) in rdn.iter().enumerate() {
                if j > 0 {
                    write!(f, "+")?;
                }
                ava.fmt_canonical(f)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Ava {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ava")
            .field("attribute", &self.attribute)
            .field("value", &self.value())
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.rdns.len() == other.rdns.len()
            && self.rdns.iter().zip(other.rdns.iter()).all(|(a, b)| rdn_eq(a, b))
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for rdn in &self.rdns {
            rdn_key(rdn).hash(state);
        }
    }
}

impl PartialEq<str> for Dn {
    fn eq(&self, other: &str) -> bool {
        Dn::parse(other).map(|d| *self == d).unwrap_or(false)
    }
}

impl PartialEq<&str> for Dn {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl FromStr for Dn {
    type Err = LdapError;

    fn from_str(s: &str) -> Result<Self, LdapError> {
        Dn::parse(s)
    }
}

impl TryFrom<&str> for Dn {
    type Error = LdapError;

    fn try_from(s: &str) -> Result<Self, LdapError> {
        Dn::parse(s)
    }
}

impl TryFrom<Dn> for Dn {
    type Error = LdapError;

    fn try_from(dn: Dn) -> Result<Self, LdapError> {
        Ok(dn)
    }
}

impl std::ops::Add<&Dn> for Dn {
    type Output = Dn;

    /// `self + suffix`: append `suffix`'s RDNs as the (more significant)
    /// continuation of `self`.
    fn add(self, suffix: &Dn) -> Dn {
        let mut rdns = self.rdns;
        rdns.extend(suffix.rdns.iter().cloned());
        Dn { rdns }
    }
}

// --- parsing helpers ---

/// Split `s` on unescaped occurrences of `delim`, preserving backslash
/// escape sequences intact in each resulting fragment.
fn split_top_level(s: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut cur = String::new();
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            cur.push(c);
            escaped = false;
        } else if c == '\\' {
            cur.push(c);
            escaped = true;
        } else if c == delim {
            parts.push(std::mem::take(&mut cur));
        } else {
            cur.push(c);
        }
    }
    parts.push(cur);
    parts
}

fn find_unescaped(s: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(i);
        }
    }
    None
}

fn parse_rdn(s: &str) -> Result<Rdn, LdapError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(LdapError::InvalidDN(format!("Malformed DN syntax: {s:?}")));
    }
    split_top_level(s, '+').iter().map(|ava| parse_ava(ava)).collect()
}

fn parse_ava(s: &str) -> Result<Ava, LdapError> {
    let s = s.trim();
    let eq = find_unescaped(s, '=')
        .ok_or_else(|| LdapError::InvalidDN(format!("Malformed DN syntax: {s:?}")))?;
    let attr = s[..eq].trim();
    let value = s[eq + 1..].trim();
    if attr.is_empty() || !is_valid_attr_type(attr) {
        return Err(LdapError::InvalidDN(format!("Malformed DN syntax: {s:?}")));
    }
    if let Some(hex) = value.strip_prefix('#') {
        let bytes = decode_hex(hex)
            .ok_or_else(|| LdapError::InvalidDN(format!("Malformed DN syntax: {s:?}")))?;
        return Ok(Ava::new_hex(attr, bytes));
    }
    let bytes = decode_value(value)?;
    Ok(Ava::new_str(attr, bytes))
}

fn is_valid_attr_type(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    let first = s.chars().next().unwrap();
    if first.is_ascii_digit() {
        // numeric OID: digits and dots only
        s.chars().all(|c| c.is_ascii_digit() || c == '.')
    } else {
        first.is_ascii_alphabetic()
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let chars: Vec<char> = s.chars().collect();
    let mut out = Vec::with_capacity(chars.len() / 2);
    for pair in chars.chunks(2) {
        let hi = pair[0].to_digit(16)?;
        let lo = pair[1].to_digit(16)?;
        out.push((hi * 16 + lo) as u8);
    }
    Some(out)
}

enum Atom {
    Plain(char),
    Byte(u8),
    Char(char),
}

fn atomize(s: &str) -> Result<Vec<Atom>, LdapError> {
    let chars: Vec<char> = s.chars().collect();
    let mut atoms = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            if i + 2 < chars.len() && chars[i + 1].is_ascii_hexdigit() && chars[i + 2].is_ascii_hexdigit() {
                let hi = chars[i + 1].to_digit(16).unwrap();
                let lo = chars[i + 2].to_digit(16).unwrap();
                atoms.push(Atom::Byte((hi * 16 + lo) as u8));
                i += 3;
            } else if i + 1 < chars.len() {
                // Samba-style superfluous escape, or a standard single-char escape:
                // both resolve to the literal following character.
                atoms.push(Atom::Char(chars[i + 1]));
                i += 2;
            } else {
                return Err(LdapError::InvalidDN("trailing backslash".into()));
            }
        } else {
            atoms.push(Atom::Plain(c));
            i += 1;
        }
    }
    Ok(atoms)
}

fn decode_value(s: &str) -> Result<Vec<u8>, LdapError> {
    let mut atoms = atomize(s)?;
    while matches!(atoms.first(), Some(Atom::Plain(' '))) {
        atoms.remove(0);
    }
    while matches!(atoms.last(), Some(Atom::Plain(' '))) {
        atoms.pop();
    }
    let mut out = Vec::new();
    let mut buf = [0u8; 4];
    for atom in atoms {
        match atom {
            Atom::Plain(c) | Atom::Char(c) => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
            Atom::Byte(b) => out.push(b),
        }
    }
    Ok(out)
}

fn escape_rfc4514(s: &str) -> String {
    escape_value(s, false)
}

fn escape_value(s: &str, include_equals: bool) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let reserved = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') || (include_equals && c == '=');
        let edge = (c == '#' && i == 0) || (c == ' ' && (i == 0 || i == n - 1));
        if reserved || edge {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_dn_rejected() {
        let err = Dn::parse("foo").unwrap_err();
        assert!(matches!(err, LdapError::InvalidDN(_)));
    }

    #[test]
    fn broken_samba_escape_resolves_to_literal() {
        assert_eq!(Dn::parse(r"uid=foo\?bar,cn=users").unwrap().to_string(), "uid=foo?bar,cn=users");
    }

    #[test]
    fn empty_dn_roundtrips() {
        let empty = Dn::parse("").unwrap();
        assert_eq!(empty.to_string(), "");
        assert!(empty.is_empty());
        assert!(empty.rdn().is_none());
        assert!(empty.parent().is_none());
        assert!(empty.startswith(&Dn::parse("").unwrap()));
        assert!(empty.endswith(&Dn::parse("").unwrap()));
    }

    #[test]
    fn rdn_accessors() {
        let dn = Dn::parse("uid=Max.Mustermann,cn=users,dc=freeiam,dc=org").unwrap();
        assert_eq!(dn.rdn().unwrap(), ("uid", std::borrow::Cow::Borrowed("Max.Mustermann")));
        assert_eq!(dn.attribute(), Some("uid"));
        assert_eq!(dn.value().unwrap(), "Max.Mustermann");
        assert_eq!(dn.len(), 4);
    }

    #[test]
    fn multi_valued_rdn_accessors() {
        let dn = Dn::parse("uid=1+cn=2,dc=3").unwrap();
        assert_eq!(dn.attributes(), vec!["uid", "cn"]);
        assert_eq!(dn.values(), vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn parent_and_get_parent() {
        let base = Dn::parse("dc=freeiam,dc=org").unwrap();
        let container = Dn::parse("cn=users,dc=freeiam,dc=org").unwrap();
        let user = Dn::parse("uid=Max.Mustermann,cn=users,dc=freeiam,dc=org").unwrap();
        assert_eq!(user.parent().unwrap(), container);
        assert!(base.parent().unwrap().parent().is_none());
        assert_eq!(user.get_parent(&container).unwrap(), container);
        assert!(container.get_parent(&container).is_none());
        assert!(base.get_parent(&container).is_none());
    }

    #[test]
    fn endswith_startswith() {
        let user = Dn::parse("uid=Max.Mustermann,cn=users,dc=freeiam,dc=org").unwrap();
        let base = Dn::parse("dc=freeiam,dc=org").unwrap();
        let container = Dn::parse("cn=users,dc=freeiam,dc=org").unwrap();
        assert!(user.endswith(&user));
        assert!(user.endswith(&container));
        assert!(user.endswith(&base));
        assert!(user.endswith(&Dn::parse("").unwrap()));
        assert!(user.startswith(&user.slice(0..1)));
        assert!(user.startswith(&user.slice(0..2)));
        assert!(!user.startswith(&container));
    }

    #[test]
    fn walk_from_base() {
        let base = Dn::parse("dc=freeiam,dc=org").unwrap();
        let container = Dn::parse("cn=users,dc=freeiam,dc=org").unwrap();
        let user = Dn::parse("uid=Max.Mustermann,cn=users,dc=freeiam,dc=org").unwrap();
        let steps: Vec<String> = user.walk(&base).unwrap().iter().map(Dn::to_string).collect();
        assert_eq!(steps, vec![base.to_string(), container.to_string(), user.to_string()]);
        assert!(user.walk(&Dn::parse("cn=foo").unwrap()).is_err());
    }

    #[test]
    fn equality_is_case_insensitive_and_set_wise_within_rdn() {
        assert_eq!(Dn::parse("foo=1").unwrap(), Dn::parse("foo=1").unwrap());
        assert_ne!(Dn::parse("foo=1").unwrap(), Dn::parse("foo=2").unwrap());
        assert_eq!(Dn::parse("Foo=1").unwrap(), Dn::parse("foo=1").unwrap());
        assert_eq!(Dn::parse("uid=Administrator").unwrap(), Dn::parse("uid=administrator").unwrap());
        assert_eq!(Dn::parse("foo=1,bar=2").unwrap(), Dn::parse("foo=1,bar=2").unwrap());
        assert_ne!(Dn::parse("bar=2,foo=1").unwrap(), Dn::parse("foo=1,bar=2").unwrap());
        assert_eq!(Dn::parse("foo=1+bar=2").unwrap(), Dn::parse("foo=1+bar=2").unwrap());
        assert_eq!(Dn::parse("bar=2+foo=1").unwrap(), Dn::parse("foo=1+bar=2").unwrap());
        assert_eq!(Dn::parse("bar=2+Foo=1").unwrap(), Dn::parse("foo=1+Bar=2").unwrap());
        assert_eq!(Dn::parse(r"foo=\31").unwrap(), Dn::parse("foo=1").unwrap());
    }

    #[test]
    fn contains_rdn_is_single_component_only() {
        let user = Dn::parse("uid=Max.Mustermann,cn=users,dc=freeiam,dc=org").unwrap();
        assert!(user.contains_rdn(&Dn::parse("cn=users").unwrap()));
        assert!(!user.contains_rdn(&Dn::parse("cn=users,dc=freeiam").unwrap()));
    }

    #[test]
    fn escape_matches_reference_cases() {
        assert_eq!(Dn::escape("+"), r"\+");
        assert_eq!(Dn::escape(","), r"\,");
        assert_eq!(Dn::escape("="), r"\=");
        assert_eq!(
            Dn::escape("#foo <+  ,=>\"; bar#"),
            "\\#foo \\<\\+  \\,\\=\\>\\\"\\; bar#"
        );
    }

    #[test]
    fn compose_concatenates_children_first() {
        let base = Dn::parse("dc=freeiam,dc=org").unwrap();
        let dn = Dn::compose(&[
            DnComponent::ava("cn", "admin"),
            DnComponent::try_from("ou=foo,ou=bar").unwrap(),
            DnComponent::from(base),
        ])
        .unwrap();
        assert_eq!(dn.to_string(), "cn=admin,ou=foo,ou=bar,dc=freeiam,dc=org");
    }

    #[test]
    fn add_appends_suffix() {
        let dn = Dn::parse("cn=foo,cn=bar").unwrap();
        let suffix = Dn::parse("dc=freeiam,dc=org").unwrap();
        assert_eq!((dn + &suffix).to_string(), "cn=foo,cn=bar,dc=freeiam,dc=org");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = Dn::normalize("uid = Max.Mustermann , cn = users , dc = freeiam, dc = org").unwrap();
        assert_eq!(once, "uid=Max.Mustermann,cn=users,dc=freeiam,dc=org");
        let twice = Dn::normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn get_unique_deduplicates_by_canonical_form() {
        let set = Dn::get_unique([
            "CN=users,dc=freeiam,dc=org",
            "cn=users,dc=freeiam,dc=org",
            "cn = users,dc=freeiam,dc=org",
            "CN=Users,dc=freeiam,dc=org",
        ])
        .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn hash_matches_equality() {
        use std::collections::hash_map::DefaultHasher;
        fn h(dn: &Dn) -> u64 {
            let mut s = DefaultHasher::new();
            dn.hash(&mut s);
            s.finish()
        }
        let a = Dn::parse("uid = Max.Mustermann , cn = users , dc = freeiam, dc = org").unwrap();
        let b = Dn::parse("uid=Max.Mustermann,cn=users,dc=freeiam,dc=org").unwrap();
        assert_eq!(a, b);
        assert_eq!(h(&a), h(&b));
    }
}
