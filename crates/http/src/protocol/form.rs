//! Decoded `application/x-www-form-urlencoded` bodies.
//!
//! Values keep the exact bytes the client escaped, so `%E4` stays the single byte `0xE4`
//! whatever encoding the page was submitted in. Field names must decode to UTF-8.

use std::borrow::Cow;

use percent_encoding::percent_decode;

use crate::protocol::ParseError;

/// Ordered form fields.
///
/// Field order follows the body. Inserting a name that is already present replaces its value
/// in place, so `a=1&b=2&a=3` yields `[("a", "3"), ("b", "2")]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, Vec<u8>)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a url-encoded body: `+` becomes a space, `%XY` the byte it encodes.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let mut form = FormData::new();
        for pair in body.split(|&b| b == b'&').filter(|pair| !pair.is_empty()) {
            let (name, value) = match pair.iter().position(|&b| b == b'=') {
                Some(index) => (&pair[..index], &pair[index + 1..]),
                None => (pair, &[][..]),
            };

            let name = String::from_utf8(decode(name)).map_err(ParseError::invalid_form)?;
            form.insert(name, decode(value));
        }
        Ok(form)
    }

    /// The raw decoded value of `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_slice())
    }

    /// The value of `name` if it is valid UTF-8.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn insert<K: Into<String>, V: Into<Vec<u8>>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value.as_slice()))
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for FormData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut form = FormData::new();
        for (name, value) in iter {
            form.insert(name, value);
        }
        form
    }
}

fn decode(raw: &[u8]) -> Vec<u8> {
    let raw: Cow<'_, [u8]> = if raw.contains(&b'+') {
        Cow::Owned(raw.iter().map(|&b| if b == b'+' { b' ' } else { b }).collect())
    } else {
        Cow::Borrowed(raw)
    };
    percent_decode(&raw).collect()
}
