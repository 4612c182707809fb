//! EIP-712 signing for forward requests.
//!
//! Forward requests must be signed using EIP-712 typed data before the
//! forwarder contract will execute them. The relayer only verifies; signing
//! lives here so clients and tests produce byte-identical digests.

pub mod domain;
pub mod forward_request;
pub mod signer;
pub mod verifier;

pub use domain::{DomainDescriptor, EIP712_DOMAIN_TYPE};
pub use forward_request::{
    digest, parse_hex_bytes, serialize_decimal, typed_data_hash, ForwardRequest, ForwardRequestMessage,
    IntegerField, SignedRequest, DEFAULT_MAX_DATA_BYTES, FORWARD_REQUEST_TYPE,
};
pub use signer::{ForwardRequestSigner, DEFAULT_INNER_GAS, DEFAULT_VALIDITY_SECS};
pub use verifier::{recover_signer, verify, SIGNATURE_LENGTH};
