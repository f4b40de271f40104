//! The sandbox key exchange.
//!
//! Requests against the provider’s sandbox environment are not signed with
//! the merchant’s API key but with a derived sandbox key. The key is
//! obtained from a dedicated endpoint: the client posts its merchant ID and
//! a random nonce signed with the real API key and receives the sandbox key
//! in return.
//!
//! The module doesn’t contain an HTTP client. Rather, the exchange goes
//! through the [`Transport`] trait. With the `http` feature enabled,
//! [`HttpTransport`] provides an implementation atop `reqwest`.
//!
//! Sandbox keys are not cached. Every call to [`sandbox_sign`] performs a
//! full round trip.

use std::{fmt, io};
use std::str::from_utf8;
use std::sync::Arc;
use log::{debug, warn};
use uuid::Uuid;
use crate::config::MerchantId;
use crate::error::{DecodeError, Error, TransportError};
use crate::params::{Params, SIGN_FIELD};
use crate::sign::{sign, SignatureAlgorithm};
use crate::xml;
use crate::xml::decode::{Error as XmlError, Name};

/// The endpoint handing out sandbox sign keys.
pub const SANDBOX_SIGN_KEY_URL: &str =
    "https://api.mch.weixin.qq.com/sandboxnew/pay/getsignkey";

/// The status the provider uses to signal success.
const SUCCESS: &str = "SUCCESS";

const MCH_ID: &str = "mch_id";
const NONCE_STR: &str = "nonce_str";

const ROOT: Name = Name::unqualified(b"xml");
const RETURN_CODE: Name = Name::unqualified(b"return_code");
const RETURN_MSG: Name = Name::unqualified(b"return_msg");
const SANDBOX_SIGNKEY: Name = Name::unqualified(b"sandbox_signkey");


//------------ Transport -----------------------------------------------------

/// A type that can post an XML document to the provider.
///
/// Implementations are expected to block until the response has been
/// received. Timeouts and retries are their business.
pub trait Transport {
    /// Posts `body` to `url` and returns the response body.
    fn post_xml(
        &self, url: &str, body: Vec<u8>
    ) -> Result<Vec<u8>, TransportError>;
}

impl<'a, T: Transport + ?Sized> Transport for &'a T {
    fn post_xml(
        &self, url: &str, body: Vec<u8>
    ) -> Result<Vec<u8>, TransportError> {
        T::post_xml(*self, url, body)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn post_xml(
        &self, url: &str, body: Vec<u8>
    ) -> Result<Vec<u8>, TransportError> {
        T::post_xml(&**self, url, body)
    }
}


//------------ HttpTransport -------------------------------------------------

/// A transport using a blocking `reqwest` client.
#[cfg(feature = "http")]
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport from a preconfigured client.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        HttpTransport { client }
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn post_xml(
        &self, url: &str, body: Vec<u8>
    ) -> Result<Vec<u8>, TransportError> {
        let response = self.client.post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(TransportError::new)?;
        response.bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(TransportError::new)
    }
}


//------------ SandboxSignKey ------------------------------------------------

/// A sandbox signing key derived by the provider.
#[derive(Clone, Eq, PartialEq)]
pub struct SandboxSignKey(String);

impl SandboxSignKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SandboxSignKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SandboxSignKey(<redacted>)")
    }
}


//------------ SignKeyRequest ------------------------------------------------

/// A request for a sandbox sign key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignKeyRequest {
    merchant_id: MerchantId,
    nonce_str: String,

    /// The request fields including the signature.
    params: Params,
}

impl SignKeyRequest {
    /// Creates a new request with a fresh nonce.
    ///
    /// The request is always signed using MD5 with the real API key.
    pub fn new(merchant_id: &MerchantId, api_key: &str) -> Self {
        Self::with_nonce(merchant_id, api_key, Self::generate_nonce())
    }

    /// Creates a new request with the given nonce.
    pub fn with_nonce(
        merchant_id: &MerchantId, api_key: &str, nonce_str: String
    ) -> Self {
        let mut params = Params::new();
        params.set(MCH_ID, merchant_id.as_str());
        params.set(NONCE_STR, nonce_str.as_str());
        let signature = sign(SignatureAlgorithm::Md5, api_key, &params);
        params.set(SIGN_FIELD, signature);
        SignKeyRequest {
            merchant_id: merchant_id.clone(),
            nonce_str,
            params,
        }
    }

    /// Returns a random nonce of 32 characters.
    fn generate_nonce() -> String {
        Uuid::new_v4().to_simple().to_string()
    }

    pub fn merchant_id(&self) -> &MerchantId {
        &self.merchant_id
    }

    pub fn nonce_str(&self) -> &str {
        &self.nonce_str
    }

    pub fn sign(&self) -> &str {
        self.params.get(SIGN_FIELD).unwrap_or_default()
    }

    /// Returns the signed parameters making up the request body.
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// # XML Support
///
impl SignKeyRequest {
    /// Writes the request’s XML representation.
    pub fn write_xml(
        &self, writer: &mut impl io::Write
    ) -> Result<(), io::Error> {
        self.params.write_xml(writer)
    }

    /// Writes the request’s XML representation to a new Vec<u8>.
    pub fn to_xml_vec(&self) -> Vec<u8> {
        let mut vec = vec![];
        self.write_xml(&mut vec).unwrap(); // safe
        vec
    }

    /// Writes the request’s XML representation to a new String.
    pub fn to_xml_string(&self) -> String {
        let vec = self.to_xml_vec();
        let xml = from_utf8(vec.as_slice()).unwrap(); // safe

        xml.to_string()
    }
}


//------------ SignKeyResponse -----------------------------------------------

/// The provider’s reply to a [`SignKeyRequest`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SignKeyResponse {
    return_code: String,
    return_msg: Option<String>,
    sandbox_signkey: Option<String>,
}

impl SignKeyResponse {
    pub fn return_code(&self) -> &str {
        &self.return_code
    }

    pub fn return_msg(&self) -> Option<&str> {
        self.return_msg.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.return_code == SUCCESS
    }

    /// Converts the response into the sandbox key.
    ///
    /// Fails with [`Error::RemoteProtocol`] carrying the provider’s message
    /// if the response signals failure and with [`Error::Decode`] if a
    /// successful response lacks the key.
    pub fn into_key(self) -> Result<SandboxSignKey, Error> {
        if !self.is_success() {
            let msg = self.return_msg.unwrap_or_default();
            warn!(
                "Sandbox sign key request failed with {}: {}",
                self.return_code, msg
            );
            return Err(Error::RemoteProtocol(msg))
        }
        match self.sandbox_signkey {
            Some(key) if !key.is_empty() => Ok(SandboxSignKey(key)),
            _ => Err(DecodeError::MissingField("sandbox_signkey").into())
        }
    }
}

/// # XML Support
///
impl SignKeyResponse {
    /// Parses the response from its XML representation.
    ///
    /// Fields other than the ones we need are ignored.
    pub fn parse<R: io::BufRead>(reader: R) -> Result<Self, DecodeError> {
        let mut reader = xml::decode::Reader::new(reader);

        let mut outer = reader.start(|element| {
            if element.name() != ROOT {
                return Err(XmlError::Malformed)
            }
            Ok(())
        })?;

        let mut return_code = None;
        let mut return_msg = None;
        let mut sandbox_signkey = None;

        loop {
            let mut field = None;
            let content = outer.take_opt_element(&mut reader, |element| {
                field = match element.name() {
                    RETURN_CODE => Some(Field::ReturnCode),
                    RETURN_MSG => Some(Field::ReturnMsg),
                    SANDBOX_SIGNKEY => Some(Field::SandboxSignkey),
                    _ => None
                };
                Ok::<_, XmlError>(())
            })?;
            let mut content = match content {
                Some(content) => content,
                None => break
            };
            let target = match field {
                Some(Field::ReturnCode) => &mut return_code,
                Some(Field::ReturnMsg) => &mut return_msg,
                Some(Field::SandboxSignkey) => &mut sandbox_signkey,
                None => {
                    content.skip(&mut reader)?;
                    continue
                }
            };
            if target.is_some() {
                return Err(XmlError::Malformed.into())
            }
            *target = Some(content.take_text(&mut reader)?);
        }

        outer.take_end(&mut reader)?;
        reader.end()?;

        Ok(SignKeyResponse {
            return_code: return_code.ok_or(
                DecodeError::MissingField("return_code")
            )?,
            return_msg,
            sandbox_signkey,
        })
    }
}


/// The response fields we are interested in.
#[derive(Clone, Copy, Debug)]
enum Field {
    ReturnCode,
    ReturnMsg,
    SandboxSignkey,
}


//------------ Functions -----------------------------------------------------

/// Retrieves a sandbox sign key from the provider.
pub fn get_sandbox_key<T: Transport + ?Sized>(
    transport: &T, merchant_id: &MerchantId, api_key: &str,
) -> Result<SandboxSignKey, Error> {
    let request = SignKeyRequest::new(merchant_id, api_key);
    debug!("Requesting sandbox sign key for merchant {}", merchant_id);
    let body = transport.post_xml(SANDBOX_SIGN_KEY_URL, request.to_xml_vec())?;
    let key = SignKeyResponse::parse(body.as_slice())?.into_key()?;
    debug!("Received sandbox sign key for merchant {}", merchant_id);
    Ok(key)
}

/// Computes the sandbox signature of a parameter set.
///
/// This retrieves a fresh sandbox key and signs the parameters with it
/// using MD5.
pub fn sandbox_sign<T: Transport + ?Sized>(
    transport: &T, merchant_id: &MerchantId, api_key: &str, params: &Params,
) -> Result<String, Error> {
    let key = get_sandbox_key(transport, merchant_id, api_key)?;
    Ok(sign(SignatureAlgorithm::Md5, key.as_str(), params))
}


//============ Tests =========================================================
