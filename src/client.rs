//! The payment client core.
//!
//! A [`Client`] holds the configuration for one merchant account together
//! with its TLS credential, if one has been registered. It provides what
//! every outbound request needs: the signature over the request parameters
//! and, for APIs requiring it, the TLS configuration presenting the
//! merchant’s certificate.
//!
//! Clients are independent of each other. Several clients for different
//! merchant accounts can be used side by side in one process.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use log::{debug, info};
use crate::config::{ClientConfig, MerchantId};
use crate::credential::{
    CertSource, CredentialSources, TlsConfig, TlsCredential
};
use crate::error::{ConfigError, Error};
use crate::params::Params;
use crate::sandbox::{self, Transport};
use crate::sign::{self, SignatureAlgorithm};


//------------ Client --------------------------------------------------------

pub struct Client {
    config: ClientConfig,

    /// The currently registered credential.
    ///
    /// A registered credential is never modified. Registering a new one
    /// replaces the `Arc` while holding the write lock.
    credential: RwLock<Option<Arc<TlsCredential>>>,

    /// The transport for the sandbox key exchange.
    transport: Option<Box<dyn Transport + Send + Sync>>,
}

impl Client {
    /// Creates a new client from its configuration.
    ///
    /// If the `http` feature is enabled, the client uses an
    /// [`HttpTransport`][crate::sandbox::HttpTransport] for the sandbox key
    /// exchange. Otherwise, a transport needs to be provided via
    /// [`with_transport`][Self::with_transport] before sandbox requests can
    /// be signed.
    pub fn new(config: ClientConfig) -> Self {
        Client {
            config,
            credential: RwLock::new(None),
            transport: Self::default_transport(),
        }
    }

    #[cfg(feature = "http")]
    fn default_transport() -> Option<Box<dyn Transport + Send + Sync>> {
        Some(Box::new(sandbox::HttpTransport::new()))
    }

    #[cfg(not(feature = "http"))]
    fn default_transport() -> Option<Box<dyn Transport + Send + Sync>> {
        None
    }

    /// Replaces the transport used for the sandbox key exchange.
    pub fn with_transport(
        mut self, transport: impl Transport + Send + Sync + 'static
    ) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn merchant_id(&self) -> &MerchantId {
        &self.config.merchant_id
    }
}

/// # Credentials
///
impl Client {
    /// Registers a new TLS credential.
    ///
    /// The credential is loaded from `sources` and replaces any previously
    /// registered credential. If `sources` is empty, the current credential
    /// is kept. In this case, it is an error if there is none.
    ///
    /// If loading fails, the current credential stays in place.
    pub fn register_credential(
        &self, sources: &CredentialSources
    ) -> Result<(), Error> {
        match sources.load(self.merchant_id().as_str())? {
            Some(credential) => {
                *self.write_credential() = Some(Arc::new(credential));
                info!(
                    "Registered TLS credential for merchant {}",
                    self.merchant_id()
                );
                Ok(())
            }
            None => {
                if self.read_credential().is_none() {
                    return Err(ConfigError::NoCredential.into())
                }
                debug!(
                    "Keeping TLS credential for merchant {}",
                    self.merchant_id()
                );
                Ok(())
            }
        }
    }

    /// Registers a credential from a PEM certificate and private key.
    pub fn register_pem(
        &self, cert: impl Into<CertSource>, key: impl Into<CertSource>
    ) -> Result<(), Error> {
        self.register_credential(&CredentialSources::pem(cert, key))
    }

    /// Registers a credential from a PKCS#12 archive.
    ///
    /// The archive is decrypted with the merchant ID.
    pub fn register_pkcs12(
        &self, archive: impl Into<CertSource>
    ) -> Result<(), Error> {
        self.register_credential(&CredentialSources::pkcs12(archive))
    }

    /// Returns the currently registered credential.
    pub fn credential(&self) -> Option<Arc<TlsCredential>> {
        self.read_credential().clone()
    }

    /// Returns the TLS configuration for the registered credential.
    pub fn tls_config(&self) -> Result<TlsConfig, Error> {
        match self.credential() {
            Some(credential) => {
                Ok(TlsConfig::new(credential, self.config.verify_peer))
            }
            None => Err(ConfigError::NoCredential.into())
        }
    }

    // The lock only ever guards a swap of the whole `Arc`, so a poisoned
    // lock still holds a complete value.

    fn read_credential(
        &self
    ) -> RwLockReadGuard<Option<Arc<TlsCredential>>> {
        self.credential.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_credential(
        &self
    ) -> RwLockWriteGuard<Option<Arc<TlsCredential>>> {
        self.credential.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// # Signing
///
impl Client {
    /// Signs a parameter set for the configured environment.
    ///
    /// In production, the configured algorithm and the API key are used.
    /// In the sandbox, a sandbox key is retrieved first and the parameters
    /// are signed with it using MD5.
    pub fn sign(&self, params: &Params) -> Result<String, Error> {
        if self.config.environment.is_sandbox() {
            self.sandbox_sign(params)
        }
        else {
            Ok(self.sign_with(self.config.sign_type, params))
        }
    }

    /// Signs a parameter set with the API key using the given algorithm.
    pub fn sign_with(
        &self, algorithm: SignatureAlgorithm, params: &Params
    ) -> String {
        sign::sign(algorithm, &self.config.api_key, params)
    }

    /// Signs a parameter set with a freshly retrieved sandbox key.
    pub fn sandbox_sign(&self, params: &Params) -> Result<String, Error> {
        let transport = self.transport.as_ref().ok_or(
            ConfigError::NoTransport
        )?;
        sandbox::sandbox_sign(
            &**transport, self.merchant_id(), &self.config.api_key,
            params
        )
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("credential", &*self.read_credential())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;
    use crate::config::Environment;
    use crate::error::TransportError;

    struct Canned {
        response: &'static str,
        requests: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(response: &'static str) -> Arc<Self> {
            Arc::new(Canned { response, requests: Mutex::new(Vec::new()) })
        }
    }

    impl Transport for Canned {
        fn post_xml(
            &self, url: &str, body: Vec<u8>
        ) -> Result<Vec<u8>, TransportError> {
            assert_eq!(url, sandbox::SANDBOX_SIGN_KEY_URL);
            self.requests.lock().unwrap().push(
                String::from_utf8(body).unwrap()
            );
            Ok(self.response.as_bytes().to_vec())
        }
    }

    fn ab() -> Params {
        vec![("a", "1"), ("b", "2")].into_iter().collect()
    }

    #[test]
    fn production_signing() {
        let client = Client::new(ClientConfig::new("100", "testkey"));
        assert_eq!(
            client.sign(&ab()).unwrap(), "FAAF9091334BED31687428A632D1A014"
        );

        let client = Client::new(
            ClientConfig::new("100", "testkey")
                .with_sign_type(SignatureAlgorithm::HmacSha256)
        );
        assert_eq!(
            client.sign(&ab()).unwrap(),
            "327C830DEED04ED4F26B1676F0605E16D4C01C5D6EE5FB145D1F3A9E3B7C6184"
        );
        assert_eq!(
            client.sign_with(SignatureAlgorithm::Md5, &ab()),
            "FAAF9091334BED31687428A632D1A014"
        );
    }

    #[test]
    fn sandbox_signing() {
        let transport = Canned::new(
            "<xml><return_code>SUCCESS</return_code>\
             <sandbox_signkey>sandboxkey</sandbox_signkey></xml>"
        );
        let client = Client::new(
            ClientConfig::new("100", "testkey")
                .with_environment(Environment::Sandbox)
                .with_sign_type(SignatureAlgorithm::HmacSha256)
        ).with_transport(transport.clone());

        // Always MD5 with the sandbox key.
        assert_eq!(
            client.sign(&ab()).unwrap(), "C3B340DBDCD528696078F39DF86AED66"
        );
        assert_eq!(
            client.sign(&ab()).unwrap(), "C3B340DBDCD528696078F39DF86AED66"
        );

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("<xml><mch_id>100</mch_id>"));
        assert_ne!(requests[0], requests[1]);
    }

    #[test]
    fn sandbox_without_transport() {
        let mut client = Client::new(
            ClientConfig::new("100", "testkey")
                .with_environment(Environment::Sandbox)
        );
        client.transport = None;
        assert!(matches!(
            client.sign(&ab()),
            Err(Error::Configuration(ConfigError::NoTransport))
        ));
    }

    #[test]
    fn no_credential() {
        let client = Client::new(ClientConfig::new("100", "testkey"));
        assert!(client.credential().is_none());
        assert!(matches!(
            client.tls_config(),
            Err(Error::Configuration(ConfigError::NoCredential))
        ));
        assert!(matches!(
            client.register_credential(&CredentialSources::new()),
            Err(Error::Configuration(ConfigError::NoCredential))
        ));
    }
}
