//! Attribute map: case-insensitive, alias-aware storage of an entry's
//! LDAP attributes, each a multi-valued list of raw octet strings.

use crate::error::LdapError;

/// Short/long attribute name pairs from RFC 4519's standard schema that
/// `Attributes` resolves transparently (`cn` <-> `commonName`, and so on).
const ALIASES: &[(&str, &str)] = &[
    ("cn", "commonname"),
    ("sn", "surname"),
    ("l", "localityname"),
    ("st", "stateorprovincename"),
    ("o", "organizationname"),
    ("ou", "organizationalunitname"),
    ("c", "countryname"),
    ("street", "streetaddress"),
    ("uid", "userid"),
    ("dc", "domaincomponent"),
];

fn canonical_key(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    for (short, long) in ALIASES {
        if lower == *short || lower == *long {
            return (*short).to_string();
        }
    }
    lower
}

/// An entry's attributes: a case-insensitive, alias-resolving, multi-valued
/// map from attribute name to a list of raw octet-string values. Keys
/// preserve the case they were first seen in for display purposes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, Vec<Vec<u8>>)>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes { entries: Vec::new() }
    }

    fn find(&self, name: &str) -> Option<usize> {
        let key = canonical_key(name);
        self.entries.iter().position(|(k, _)| canonical_key(k) == key)
    }

    /// Replace or insert the values for `name`, preserving the case of an
    /// existing key or adopting the case `name` is given in for a new one.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Vec<u8>>) {
        let name = name.into();
        if let Some(i) = self.find(&name) {
            self.entries[i].1 = values;
        } else {
            self.entries.push((name, values));
        }
    }

    /// All values for `name`, resolving case and known aliases.
    pub fn get(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.find(name).map(|i| self.entries[i].1.as_slice())
    }

    /// Like [`Attributes::get`], but an absent attribute is an error
    /// rather than `None`, mirroring a `KeyError` lookup on the original.
    pub fn get_attr(&self, name: &str) -> Result<&[Vec<u8>], LdapError> {
        self.get(name).ok_or_else(|| LdapError::AttributeNotFound(name.to_string()))
    }

    /// The first value for `name`, if any value is present.
    pub fn get_one(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(|v| v.first()).map(Vec::as_slice)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<u8>])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<Vec<u8>>)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, Vec<Vec<u8>>)>>(iter: T) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl std::ops::Index<&str> for Attributes {
    type Output = [Vec<u8>];

    fn index(&self, name: &str) -> &[Vec<u8>] {
        self.get(name).unwrap_or_else(|| panic!("attribute not found: {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attributes {
        Attributes::from_iter([
            ("uid".to_string(), vec![b"max".to_vec()]),
            ("cn".to_string(), vec![b"Max Mustermann".to_vec()]),
        ])
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let attrs = sample();
        assert_eq!(attrs.get("UID"), Some(&[b"max".to_vec()][..]));
        assert_eq!(attrs.get("Uid"), Some(&[b"max".to_vec()][..]));
    }

    #[test]
    fn lookup_resolves_known_aliases() {
        let attrs = sample();
        assert_eq!(attrs.get("commonName"), Some(&[b"Max Mustermann".to_vec()][..]));
        assert_eq!(attrs.get("COMMONNAME"), attrs.get("cn"));
    }

    #[test]
    fn missing_attribute_is_attribute_not_found() {
        let attrs = sample();
        assert!(matches!(attrs.get_attr("foo"), Err(LdapError::AttributeNotFound(_))));
        assert_eq!(attrs.get_attr("uid").unwrap(), &[b"max".to_vec()]);
    }

    #[test]
    fn insert_preserves_first_seen_case() {
        let mut attrs = Attributes::new();
        attrs.insert("Uid", vec![b"max".to_vec()]);
        attrs.insert("UID", vec![b"max2".to_vec()]);
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["Uid"]);
        assert_eq!(attrs.get("uid"), Some(&[b"max2".to_vec()][..]));
    }
}
