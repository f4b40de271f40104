//! Request parameter sets.
//!
//! A [`Params`] value is the set of fields of a provider request. It serves
//! both as the input of the signature and as the request body, which is why
//! it knows how to produce the canonical signing string as well as the
//! provider’s XML body.

use std::io;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::FromIterator;
use crate::xml::decode::Name;
use crate::xml::encode::Writer;

/// The name of the parameter carrying the signature itself.
pub const SIGN_FIELD: &str = "sign";

const ROOT: Name = Name::unqualified(b"xml");


//------------ Params --------------------------------------------------------

/// A set of request parameters.
///
/// Parameters are kept sorted by name, which is the canonical order used
/// for signing and for the XML body. Setting a parameter that already
/// exists replaces its value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Params {
    map: BTreeMap<String, String>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Params::default()
    }

    /// Sets a parameter, replacing any previous value.
    pub fn set(
        &mut self, name: impl Into<String>, value: impl Into<String>
    ) -> &mut Self {
        self.map.insert(name.into(), value.into());
        self
    }

    /// Returns the value of a parameter if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Removes a parameter and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.map.remove(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns an iterator over the parameters in canonical order.
    pub fn iter(&self) -> Iter {
        Iter(self.map.iter())
    }
}

/// # Signing
///
impl Params {
    /// Returns the canonical signing string for the given key.
    ///
    /// The string consists of `name=value` terms for every parameter in
    /// canonical order, leaving out parameters with empty values and the
    /// signature parameter, followed by the term `key=<key>`. All terms are
    /// separated by `&`. Neither names nor values are escaped.
    pub fn signing_string(&self, key: &str) -> String {
        let mut res = String::new();
        for (name, value) in self.iter() {
            if value.is_empty() || name == SIGN_FIELD {
                continue
            }
            res.push_str(name);
            res.push('=');
            res.push_str(value);
            res.push('&');
        }
        res.push_str("key=");
        res.push_str(key);
        res
    }
}

/// # XML Support
///
impl Params {
    /// Writes the parameters as a provider XML document.
    ///
    /// Each parameter becomes a child element of a `<xml>` root element,
    /// named after the parameter and holding its value as text. Parameter
    /// names that aren’t valid element names result in an error.
    pub fn write_xml(
        &self, writer: &mut impl io::Write
    ) -> Result<(), io::Error> {
        let mut writer = Writer::new(writer);
        writer.element(ROOT)?.content(|content| {
            for (name, value) in self.iter() {
                content.text_element(name, value)?;
            }
            Ok(())
        })?;
        writer.done()
    }

    /// Writes the parameters as a provider XML document into a new vec.
    pub fn to_xml_vec(&self) -> Result<Vec<u8>, io::Error> {
        let mut res = Vec::new();
        self.write_xml(&mut res)?;
        Ok(res)
    }
}


//--- FromIterator and Extend

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut res = Params::new();
        res.extend(iter);
        res
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Params {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


//------------ Iter ----------------------------------------------------------

/// An iterator over the parameters of a [`Params`] in canonical order.
#[derive(Clone, Debug)]
pub struct Iter<'a>(btree_map::Iter<'a, String, String>);

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signing_string_is_sorted() {
        let params: Params = vec![
            ("nonce_str", "abc"), ("body", "test"), ("appid", "wx1"),
        ].into_iter().collect();
        assert_eq!(
            params.signing_string("k"),
            "appid=wx1&body=test&nonce_str=abc&key=k"
        );
    }

    #[test]
    fn signing_string_skips_empty_and_sign() {
        let mut params = Params::new();
        params.set("a", "1").set("empty", "").set(SIGN_FIELD, "XYZ");
        assert_eq!(params.signing_string("k"), "a=1&key=k");
    }

    #[test]
    fn signing_string_of_nothing() {
        assert_eq!(Params::new().signing_string("k"), "key=k");
    }

    #[test]
    fn set_replaces() {
        let mut params = Params::new();
        params.set("a", "1").set("a", "2");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("a"), Some("2"));
        assert_eq!(params.remove("a"), Some("2".into()));
        assert!(params.is_empty());
    }

    #[test]
    fn xml_body() {
        let mut params = Params::new();
        params.set("nonce_str", "n<1>").set("mch_id", "100");
        assert_eq!(
            String::from_utf8(params.to_xml_vec().unwrap()).unwrap(),
            "<xml><mch_id>100</mch_id><nonce_str>n&lt;1&gt;</nonce_str></xml>"
        );
    }

    #[test]
    fn xml_body_rejects_bad_names() {
        let mut params = Params::new();
        params.set("not a name", "1");
        assert!(params.to_xml_vec().is_err());
    }
}
