//! Request signatures.
//!
//! Every request to the provider carries a signature over its parameters.
//! The signature is a digest of the canonical signing string (see
//! [`Params::signing_string`]) rendered as uppercase hex. Two digest
//! algorithms are available, chosen per request by the caller.

use std::{error, fmt, str};
use md5::{Digest as _, Md5};
use ring::hmac;
use crate::params::Params;
use crate::util::hex;


//------------ SignatureAlgorithm --------------------------------------------

/// The algorithm used for signing a request.
///
/// The provider announces the algorithm in the `sign_type` request field
/// using the strings returned by [`as_str`][Self::as_str].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SignatureAlgorithm {
    /// Plain MD5 over the signing string.
    #[cfg_attr(feature = "serde", serde(rename = "MD5"))]
    Md5,

    /// HMAC-SHA256 over the signing string, keyed with the signing key.
    #[cfg_attr(feature = "serde", serde(rename = "HMAC-SHA256"))]
    HmacSha256,
}

impl SignatureAlgorithm {
    /// Returns the provider’s name for the algorithm.
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::Md5 => "MD5",
            SignatureAlgorithm::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Returns the uppercase hex digest of `data`.
    ///
    /// The key is only used by HMAC-SHA256. For MD5, the key is expected to
    /// be part of `data` already.
    pub fn digest(self, key: &str, data: &[u8]) -> String {
        match self {
            SignatureAlgorithm::Md5 => {
                hex::encode_upper(Md5::digest(data).as_slice())
            }
            SignatureAlgorithm::HmacSha256 => {
                let key = hmac::Key::new(hmac::HMAC_SHA256, key.as_bytes());
                hex::encode_upper(hmac::sign(&key, data).as_ref())
            }
        }
    }
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        SignatureAlgorithm::Md5
    }
}

impl str::FromStr for SignatureAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MD5" => Ok(SignatureAlgorithm::Md5),
            "HMAC-SHA256" => Ok(SignatureAlgorithm::HmacSha256),
            _ => Err(UnknownAlgorithm)
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ sign ----------------------------------------------------------

/// Computes the signature of a parameter set.
///
/// The signature is the digest of the canonical signing string for `key`
/// using `algorithm`, as uppercase hex.
pub fn sign(
    algorithm: SignatureAlgorithm, key: &str, params: &Params
) -> String {
    algorithm.digest(key, params.signing_string(key).as_bytes())
}


//------------ UnknownAlgorithm ----------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownAlgorithm;

impl fmt::Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("unknown signature algorithm")
    }
}

impl error::Error for UnknownAlgorithm { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn ab() -> Params {
        vec![("a", "1"), ("b", "2")].into_iter().collect()
    }

    #[test]
    fn md5_vector() {
        assert_eq!(
            sign(SignatureAlgorithm::Md5, "testkey", &ab()),
            "FAAF9091334BED31687428A632D1A014"
        );
    }

    #[test]
    fn hmac_sha256_vector() {
        assert_eq!(
            sign(SignatureAlgorithm::HmacSha256, "testkey", &ab()),
            "327C830DEED04ED4F26B1676F0605E16\
             D4C01C5D6EE5FB145D1F3A9E3B7C6184"
        );
    }

    #[test]
    fn md5_is_deterministic_and_value_sensitive() {
        let first = sign(SignatureAlgorithm::Md5, "testkey", &ab());
        assert_eq!(first, sign(SignatureAlgorithm::Md5, "testkey", &ab()));

        let mut changed = ab();
        changed.set("b", "3");
        let second = sign(SignatureAlgorithm::Md5, "testkey", &changed);
        assert_eq!(second, "AF0953945FDE7CA9511780531FF0CB7F");
        assert_ne!(first, second);
    }

    #[test]
    fn existing_signature_is_ignored() {
        let mut params = ab();
        params.set("sign", "FAAF9091334BED31687428A632D1A014");
        assert_eq!(
            sign(SignatureAlgorithm::Md5, "testkey", &params),
            "FAAF9091334BED31687428A632D1A014"
        );
    }

    #[test]
    fn output_is_uppercase_hex() {
        for alg in &[SignatureAlgorithm::Md5, SignatureAlgorithm::HmacSha256] {
            let res = sign(*alg, "other", &ab());
            assert!(res.chars().all(|ch| {
                ch.is_ascii_digit() || ('A'..='F').contains(&ch)
            }));
        }
        assert_eq!(sign(SignatureAlgorithm::Md5, "k", &ab()).len(), 32);
        assert_eq!(sign(SignatureAlgorithm::HmacSha256, "k", &ab()).len(), 64);
    }

    #[test]
    fn algorithm_names() {
        assert_eq!(
            "MD5".parse::<SignatureAlgorithm>(), Ok(SignatureAlgorithm::Md5)
        );
        assert_eq!(
            "HMAC-SHA256".parse::<SignatureAlgorithm>(),
            Ok(SignatureAlgorithm::HmacSha256)
        );
        assert_eq!(
            "SHA1".parse::<SignatureAlgorithm>(), Err(UnknownAlgorithm)
        );
        assert_eq!(SignatureAlgorithm::HmacSha256.to_string(), "HMAC-SHA256");
        assert_eq!(SignatureAlgorithm::default(), SignatureAlgorithm::Md5);
    }
}
