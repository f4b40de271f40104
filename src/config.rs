//! Client configuration.

use std::fmt;
use std::sync::Arc;
use crate::sign::SignatureAlgorithm;


//------------ MerchantId ----------------------------------------------------

/// The merchant account number issued by the provider.
///
/// It is sent with every request and doubles as the passphrase of the
/// merchant’s PKCS#12 certificate archive.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct MerchantId(Arc<str>);

impl MerchantId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        MerchantId(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<&str> for MerchantId {
    fn from(id: &str) -> Self {
        MerchantId(id.into())
    }
}

impl From<String> for MerchantId {
    fn from(id: String) -> Self {
        MerchantId(id.into())
    }
}

impl From<MerchantId> for String {
    fn from(id: MerchantId) -> Self {
        id.as_str().into()
    }
}

impl AsRef<str> for MerchantId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ Environment ---------------------------------------------------

/// The provider environment a client talks to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Environment {
    /// The live environment, signing with the API key.
    Production,

    /// The test environment, signing with a derived sandbox key.
    Sandbox,
}

impl Environment {
    pub fn is_sandbox(self) -> bool {
        matches!(self, Environment::Sandbox)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Production
    }
}


//------------ ClientConfig --------------------------------------------------

/// Everything needed to create a client.
#[derive(Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ClientConfig {
    /// The merchant account number.
    pub merchant_id: MerchantId,

    /// The API key used for signing.
    pub api_key: String,

    /// The environment to talk to.
    #[cfg_attr(feature = "serde", serde(default))]
    pub environment: Environment,

    /// The signature algorithm used in production.
    ///
    /// The sandbox environment always uses MD5.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sign_type: SignatureAlgorithm,

    /// Whether to verify the provider’s server certificate.
    #[cfg_attr(feature = "serde", serde(default = "default_verify_peer"))]
    pub verify_peer: bool,
}

impl ClientConfig {
    /// Creates a production configuration with default settings.
    pub fn new(
        merchant_id: impl Into<MerchantId>, api_key: impl Into<String>
    ) -> Self {
        ClientConfig {
            merchant_id: merchant_id.into(),
            api_key: api_key.into(),
            environment: Environment::default(),
            sign_type: SignatureAlgorithm::default(),
            verify_peer: true,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_sign_type(mut self, sign_type: SignatureAlgorithm) -> Self {
        self.sign_type = sign_type;
        self
    }

    pub fn with_verify_peer(mut self, verify_peer: bool) -> Self {
        self.verify_peer = verify_peer;
        self
    }
}

#[cfg(feature = "serde")]
fn default_verify_peer() -> bool {
    true
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("merchant_id", &self.merchant_id)
            .field("api_key", &"<redacted>")
            .field("environment", &self.environment)
            .field("sign_type", &self.sign_type)
            .field("verify_peer", &self.verify_peer)
            .finish()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("1230000109", "secret");
        assert_eq!(config.merchant_id.as_str(), "1230000109");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.sign_type, SignatureAlgorithm::Md5);
        assert!(config.verify_peer);
    }

    #[test]
    fn debug_hides_api_key() {
        let config = ClientConfig::new("1230000109", "secret");
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "merchant_id": "1230000109",
                "api_key": "secret",
                "environment": "sandbox",
                "sign_type": "HMAC-SHA256"
            }"#
        ).unwrap();
        assert_eq!(
            config,
            ClientConfig::new("1230000109", "secret")
                .with_environment(Environment::Sandbox)
                .with_sign_type(SignatureAlgorithm::HmacSha256)
        );
    }
}
