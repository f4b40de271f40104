//! TLS client credentials.
//!
//! Some provider APIs require the client to authenticate itself with a
//! certificate issued to the merchant. The certificate and its private key
//! are distributed either as a pair of PEM files or as a PKCS#12 archive
//! protected with the merchant ID as the passphrase.
//!
//! [`CredentialSources`] collects the certificate material given by the
//! user, checks that it forms one of the accepted combinations and loads it
//! into a [`TlsCredential`]. A [`TlsConfig`] wraps a loaded credential for
//! use with an HTTP client.

use std::{fmt, fs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use bytes::Bytes;
use log::debug;
use openssl::error::ErrorStack;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::{X509, X509Ref};
use crate::error::{ConfigError, Error, FormatError};


//------------ CertSource ----------------------------------------------------

/// Where to find a piece of certificate material.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CertSource {
    /// The material is in the file at the given path.
    Path(PathBuf),

    /// The material itself.
    Bytes(Bytes),
}

impl CertSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        CertSource::Path(path.into())
    }

    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        CertSource::Bytes(bytes.into())
    }

    /// Returns whether the source is an empty path or empty content.
    pub fn is_empty(&self) -> bool {
        match self {
            CertSource::Path(path) => path.as_os_str().is_empty(),
            CertSource::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Returns the content, reading it from disk if necessary.
    pub fn read(&self) -> Result<Bytes, Error> {
        match self {
            CertSource::Path(path) => {
                debug!("Reading certificate material from {}", path.display());
                fs::read(path).map(Bytes::from).map_err(|err| {
                    Error::io(path.clone(), err)
                })
            }
            CertSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<PathBuf> for CertSource {
    fn from(path: PathBuf) -> Self {
        CertSource::Path(path)
    }
}

impl<'a> From<&'a Path> for CertSource {
    fn from(path: &'a Path) -> Self {
        CertSource::Path(path.into())
    }
}

impl From<Bytes> for CertSource {
    fn from(bytes: Bytes) -> Self {
        CertSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for CertSource {
    fn from(bytes: Vec<u8>) -> Self {
        CertSource::Bytes(bytes.into())
    }
}


//------------ CredentialSources ---------------------------------------------

/// The certificate material for a client credential.
///
/// Exactly two combinations are accepted: a certificate together with its
/// private key, both PEM encoded, or a PKCS#12 archive on its own. If
/// nothing at all is given, loading results in no credential, which the
/// client takes as a request to keep using the credential it already has.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CredentialSources {
    cert: Option<CertSource>,
    key: Option<CertSource>,
    pkcs12: Option<CertSource>,
}

impl CredentialSources {
    /// Creates an empty set of sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates sources for a PEM certificate and private key.
    pub fn pem(cert: impl Into<CertSource>, key: impl Into<CertSource>) -> Self {
        Self::new().with_cert(cert).with_key(key)
    }

    /// Creates sources for a PKCS#12 archive.
    pub fn pkcs12(archive: impl Into<CertSource>) -> Self {
        Self::new().with_pkcs12(archive)
    }

    pub fn with_cert(mut self, cert: impl Into<CertSource>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<CertSource>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_pkcs12(mut self, archive: impl Into<CertSource>) -> Self {
        self.pkcs12 = Some(archive.into());
        self
    }

    /// Returns whether no source at all has been given.
    pub fn is_empty(&self) -> bool {
        self.cert.is_none() && self.key.is_none() && self.pkcs12.is_none()
    }

    /// Checks that the sources form an accepted combination.
    ///
    /// This does not touch the file system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.select().map(|_| ())
    }

    /// Loads the credential.
    ///
    /// The merchant ID is used as the passphrase of a PKCS#12 archive.
    /// Returns `Ok(None)` if no sources were given at all.
    pub fn load(
        &self, merchant_id: &str
    ) -> Result<Option<TlsCredential>, Error> {
        match self.select()? {
            None => Ok(None),
            Some(Selection::Pem(cert, key)) => {
                debug!("Loading PEM credential");
                let cert = cert.read()?;
                let key = key.read()?;
                TlsCredential::from_pem(&cert, &key)
                    .map(Some).map_err(Into::into)
            }
            Some(Selection::Pkcs12(archive)) => {
                debug!("Loading PKCS#12 credential");
                let archive = archive.read()?;
                TlsCredential::from_pkcs12(&archive, merchant_id)
                    .map(Some).map_err(Into::into)
            }
        }
    }

    fn select(&self) -> Result<Option<Selection>, ConfigError> {
        let named = [
            ("cert", &self.cert), ("key", &self.key), ("pkcs12", &self.pkcs12)
        ];
        for &(name, source) in named.iter() {
            if let Some(source) = source {
                if source.is_empty() {
                    return Err(ConfigError::Empty(name))
                }
            }
        }

        match (&self.cert, &self.key, &self.pkcs12) {
            (None, None, None) => Ok(None),
            (Some(cert), Some(key), None) => {
                Ok(Some(Selection::Pem(cert, key)))
            }
            (None, None, Some(archive)) => {
                Ok(Some(Selection::Pkcs12(archive)))
            }
            (_, _, Some(_)) => Err(ConfigError::Conflicting),
            _ => Err(ConfigError::Incomplete),
        }
    }
}

/// The accepted combinations of sources.
enum Selection<'a> {
    Pem(&'a CertSource, &'a CertSource),
    Pkcs12(&'a CertSource),
}


//------------ TlsCredential -------------------------------------------------

/// A client certificate together with its private key.
///
/// The certificate may come with intermediate certificates to send along
/// during the handshake. A credential is immutable once loaded.
pub struct TlsCredential {
    cert: X509,
    chain: Vec<X509>,
    key: PKey<Private>,
}

impl TlsCredential {
    /// Loads a credential from a PEM certificate and a PEM private key.
    ///
    /// The certificate input may contain further certificates after the
    /// client certificate. These are kept as the chain.
    pub fn from_pem(cert: &[u8], key: &[u8]) -> Result<Self, FormatError> {
        let mut certs = X509::stack_from_pem(cert).map_err(|err| {
            FormatError::openssl("cert", err)
        })?.into_iter();
        let leaf = certs.next().ok_or_else(|| {
            FormatError::no_certificate("cert")
        })?;
        let key = PKey::private_key_from_pem(key).map_err(|err| {
            FormatError::openssl("key", err)
        })?;
        Self::new(leaf, certs.collect(), key, "key")
    }

    /// Loads a credential from a DER encoded PKCS#12 archive.
    ///
    /// Certificate, private key and CA certificates are taken from the
    /// archive separately.
    pub fn from_pkcs12(
        der: &[u8], passphrase: &str
    ) -> Result<Self, FormatError> {
        let parsed = Pkcs12::from_der(der).and_then(|archive| {
            archive.parse2(passphrase)
        }).map_err(|err| FormatError::openssl("pkcs12", err))?;
        let cert = parsed.cert.ok_or_else(|| {
            FormatError::no_certificate("pkcs12")
        })?;
        let key = parsed.pkey.ok_or_else(|| FormatError::no_key("pkcs12"))?;
        let chain = match parsed.ca {
            Some(ca) => ca.into_iter().collect(),
            None => Vec::new(),
        };
        Self::new(cert, chain, key, "pkcs12")
    }

    fn new(
        cert: X509, chain: Vec<X509>, key: PKey<Private>, input: &'static str
    ) -> Result<Self, FormatError> {
        let public = cert.public_key().map_err(|err| {
            FormatError::openssl(input, err)
        })?;
        if !public.public_eq(&key) {
            return Err(FormatError::key_mismatch(input))
        }
        Ok(TlsCredential { cert, chain, key })
    }

    /// Returns the client certificate.
    pub fn certificate(&self) -> &X509Ref {
        &self.cert
    }

    /// Returns the intermediate certificates.
    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    pub fn private_key(&self) -> &PKeyRef<Private> {
        &self.key
    }

    /// Returns the credential as a PEM bundle.
    ///
    /// The bundle contains the client certificate, the chain and the
    /// private key in PKCS#8 format, which is what HTTP clients taking a
    /// PEM identity expect.
    pub fn to_pem(&self) -> Result<Vec<u8>, ErrorStack> {
        let mut res = self.cert.to_pem()?;
        for cert in &self.chain {
            res.extend_from_slice(&cert.to_pem()?);
        }
        res.extend_from_slice(&self.key.private_key_to_pem_pkcs8()?);
        Ok(res)
    }
}

impl fmt::Debug for TlsCredential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TlsCredential")
            .field("serial", &self.cert.serial_number().to_bn().ok()
                .and_then(|bn| bn.to_hex_str().ok()).map(|s| s.to_string()))
            .field("chain", &self.chain.len())
            .finish()
    }
}


//------------ TlsConfig -----------------------------------------------------

/// The TLS configuration for requests that need a client certificate.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    credential: Arc<TlsCredential>,
    verify_peer: bool,
}

impl TlsConfig {
    pub fn new(credential: Arc<TlsCredential>, verify_peer: bool) -> Self {
        TlsConfig { credential, verify_peer }
    }

    pub fn credential(&self) -> &Arc<TlsCredential> {
        &self.credential
    }

    /// Returns whether the server certificate is verified.
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// Creates an OpenSSL connector presenting the credential.
    pub fn connector(&self) -> Result<SslConnector, ErrorStack> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;
        builder.set_certificate(&self.credential.cert)?;
        for cert in &self.credential.chain {
            builder.add_extra_chain_cert(cert.clone())?;
        }
        builder.set_private_key(&self.credential.key)?;
        builder.check_private_key()?;
        if !self.verify_peer {
            builder.set_verify(SslVerifyMode::NONE);
        }
        Ok(builder.build())
    }
}


//============ Tests =========================================================
