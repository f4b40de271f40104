//! Error handling.
//!
//! All fallible operations of the crate return [`Error`]. Its variants are
//! the error kinds a caller needs to tell apart: configuration mistakes that
//! need fixing, I/O and credential format problems that need new material,
//! and the three ways a sandbox key exchange can fail.

use std::{error, fmt, io};
use std::path::PathBuf;
use openssl::error::ErrorStack;
use crate::xml;


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// Invalid or incomplete arguments.
    Configuration(ConfigError),

    /// Reading a credential file failed.
    Io { path: PathBuf, err: io::Error },

    /// Certificate material could not be parsed.
    CredentialFormat(FormatError),

    /// The transport failed during the sandbox key exchange.
    Transport(TransportError),

    /// The sandbox key response could not be decoded.
    Decode(DecodeError),

    /// The provider reported a failure.
    ///
    /// Contains the provider’s message verbatim.
    RemoteProtocol(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        Error::Io { path: path.into(), err }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Configuration(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::CredentialFormat(err)
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Transport(err)
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<xml::decode::Error> for Error {
    fn from(err: xml::decode::Error) -> Self {
        Error::Decode(err.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Configuration(err) => {
                write!(f, "invalid configuration: {}", err)
            }
            Error::Io { path, err } => {
                write!(f, "cannot read {}: {}", path.display(), err)
            }
            Error::CredentialFormat(err) => err.fmt(f),
            Error::Transport(err) => {
                write!(f, "sandbox key request failed: {}", err)
            }
            Error::Decode(err) => {
                write!(f, "invalid sandbox key response: {}", err)
            }
            Error::RemoteProtocol(msg) => {
                write!(f, "provider reported failure: {}", msg)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::CredentialFormat(err) => err.source(),
            Error::Transport(err) => err.source(),
            Error::Decode(err) => err.source(),
            _ => None
        }
    }
}


//------------ ConfigError ---------------------------------------------------

/// A problem with the arguments given to the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The named input was given but is empty.
    Empty(&'static str),

    /// Only one of certificate and private key was given.
    Incomplete,

    /// A PKCS#12 archive was given together with PEM material.
    Conflicting,

    /// No credential was given and none is registered.
    NoCredential,

    /// Sandbox signing was requested but the client has no transport.
    NoTransport,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::Empty(name) => write!(f, "{} is empty", name),
            ConfigError::Incomplete => {
                f.write_str("cert and key must both be given or both omitted")
            }
            ConfigError::Conflicting => {
                f.write_str("pkcs12 cannot be combined with cert or key")
            }
            ConfigError::NoCredential => {
                f.write_str("no credential registered")
            }
            ConfigError::NoTransport => {
                f.write_str("no transport for the sandbox key exchange")
            }
        }
    }
}

impl error::Error for ConfigError { }


//------------ FormatError ---------------------------------------------------

/// Certificate material that could not be turned into a credential.
#[derive(Debug)]
pub struct FormatError {
    /// The name of the offending input.
    input: &'static str,
    kind: FormatErrorKind,
}

#[derive(Debug)]
enum FormatErrorKind {
    Openssl(ErrorStack),
    NoCertificate,
    NoKey,
    KeyMismatch,
}

impl FormatError {
    pub(crate) fn openssl(input: &'static str, err: ErrorStack) -> Self {
        FormatError { input, kind: FormatErrorKind::Openssl(err) }
    }

    pub(crate) fn no_certificate(input: &'static str) -> Self {
        FormatError { input, kind: FormatErrorKind::NoCertificate }
    }

    pub(crate) fn no_key(input: &'static str) -> Self {
        FormatError { input, kind: FormatErrorKind::NoKey }
    }

    pub(crate) fn key_mismatch(input: &'static str) -> Self {
        FormatError { input, kind: FormatErrorKind::KeyMismatch }
    }

    /// Returns the name of the input that failed to parse.
    pub fn input(&self) -> &'static str {
        self.input
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            FormatErrorKind::Openssl(ref err) => {
                write!(f, "invalid {}: {}", self.input, err)
            }
            FormatErrorKind::NoCertificate => {
                write!(f, "invalid {}: no certificate found", self.input)
            }
            FormatErrorKind::NoKey => {
                write!(f, "invalid {}: no private key found", self.input)
            }
            FormatErrorKind::KeyMismatch => {
                write!(
                    f, "invalid {}: private key does not match certificate",
                    self.input
                )
            }
        }
    }
}

impl error::Error for FormatError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind {
            FormatErrorKind::Openssl(ref err) => Some(err),
            _ => None
        }
    }
}


//------------ TransportError ------------------------------------------------

/// A failure of the transport collaborator.
///
/// Transports wrap whatever error their HTTP client produces.
#[derive(Debug)]
pub struct TransportError(Box<dyn error::Error + Send + Sync>);

impl TransportError {
    pub fn new(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
        TransportError(err.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl error::Error for TransportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&*self.0)
    }
}


//------------ DecodeError ---------------------------------------------------

/// A sandbox key response that could not be decoded.
#[derive(Debug)]
pub enum DecodeError {
    /// The body is not a well-formed provider document.
    Xml(xml::decode::Error),

    /// A required field is missing.
    MissingField(&'static str),
}

impl From<xml::decode::Error> for DecodeError {
    fn from(err: xml::decode::Error) -> Self {
        DecodeError::Xml(err)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Xml(err) => err.fmt(f),
            DecodeError::MissingField(name) => {
                write!(f, "missing field '{}'", name)
            }
        }
    }
}

impl error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DecodeError::Xml(err) => err.source(),
            DecodeError::MissingField(_) => None,
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn decode_source_is_parser_error() {
        let err = crate::sandbox::SignKeyResponse::parse(
            &b"<xml><return_code>SUCCESS</return_msg></xml>"[..]
        ).unwrap_err();
        assert!(matches!(err, DecodeError::Xml(xml::decode::Error::Xml(_))));
        assert!(err.source().is_some());

        let err = Error::from(err);
        let source = err.source().unwrap();
        assert!(source.downcast_ref::<quick_xml::Error>().is_some());
    }

    #[test]
    fn missing_field_has_no_source() {
        let err = Error::from(DecodeError::MissingField("return_code"));
        assert!(err.source().is_none());
    }
}
