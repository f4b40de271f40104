//! Credential loading and request signing for payment gateway clients.
//!
//! Payment gateways of the kind supported here authenticate a merchant in
//! two ways. Every request carries a signature over its parameters, keyed
//! with the merchant’s API key. Some APIs additionally require mutual TLS
//! where the client presents a certificate issued to the merchant.
//!
//! This crate provides the building blocks for both:
//!
//! * [`credential`] loads the merchant certificate and private key either
//!   from a PEM pair or from a PKCS#12 archive,
//! * [`sign`] and [`params`] produce the request signature using MD5 or
//!   HMAC-SHA256,
//! * [`sandbox`] performs the key exchange required for signing requests
//!   in the provider’s sandbox environment, and
//! * [`client`] ties these together for one merchant account, keeping the
//!   registered credential in a cache that can be replaced at runtime.
//!
//! The crate does not send payment requests itself. The HTTP client used
//! for the sandbox key exchange is only available with the `http` feature.
//! Without it, a [`Transport`] has to be provided.

pub use self::client::Client;
pub use self::config::{ClientConfig, Environment, MerchantId};
pub use self::credential::{
    CertSource, CredentialSources, TlsConfig, TlsCredential
};
pub use self::error::Error;
pub use self::params::Params;
pub use self::sandbox::{sandbox_sign, Transport};
pub use self::sign::{sign, SignatureAlgorithm};

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod params;
pub mod sandbox;
pub mod sign;
pub mod xml;

mod util;
