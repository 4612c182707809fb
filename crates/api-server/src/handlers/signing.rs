//! Wallet-facing helpers: the typed-data template to sign and the current
//! forwarder nonce of a signer.

use alloy_primitives::Address;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use utoipa::ToSchema;

use relay_core::signing::DomainDescriptor;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// One member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedField {
    fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Template for `eth_signTypedData_v4`. Wallets fill in `message`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataTemplate {
    #[schema(value_type = Object)]
    pub domain: DomainDescriptor,
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
}

impl TypedDataTemplate {
    pub fn for_domain(domain: &DomainDescriptor) -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "EIP712Domain".to_string(),
            vec![
                TypedField::new("name", "string"),
                TypedField::new("version", "string"),
                TypedField::new("chainId", "uint256"),
                TypedField::new("verifyingContract", "address"),
            ],
        );
        types.insert(
            "ForwardRequest".to_string(),
            vec![
                TypedField::new("from", "address"),
                TypedField::new("to", "address"),
                TypedField::new("value", "uint256"),
                TypedField::new("gas", "uint256"),
                TypedField::new("nonce", "uint256"),
                TypedField::new("data", "bytes"),
                TypedField::new("validUntil", "uint256"),
            ],
        );

        Self {
            domain: domain.clone(),
            types,
            primary_type: "ForwardRequest".to_string(),
        }
    }
}

/// Nonce lookup response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NonceResponse {
    pub address: String,
    /// Decimal string.
    pub nonce: String,
}

/// EIP-712 typed-data template for forward requests.
#[utoipa::path(
    get,
    path = "/api/domain",
    tag = "signing",
    responses(
        (status = 200, description = "Typed-data template", body = TypedDataTemplate)
    )
)]
pub async fn get_domain(State(state): State<Arc<AppState>>) -> Json<TypedDataTemplate> {
    Json(TypedDataTemplate::for_domain(state.orchestrator.domain()))
}

/// Current forwarder nonce of a signer.
#[utoipa::path(
    get,
    path = "/api/nonce/{address}",
    tag = "signing",
    params(
        ("address" = String, Path, description = "Signer address")
    ),
    responses(
        (status = 200, description = "Current nonce", body = NonceResponse),
        (status = 400, description = "Invalid address", body = crate::error::ErrorResponse),
        (status = 502, description = "RPC failure", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_nonce(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<NonceResponse>> {
    let signer = Address::from_str(address.trim())
        .map_err(|_| ApiError::BadRequest(format!("invalid address: {}", address)))?;

    let nonce = state.orchestrator.forwarder().nonce_of(signer).await?;

    Ok(Json(NonceResponse {
        address: signer.to_checksum(None),
        nonce: nonce.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::signing::{EIP712_DOMAIN_TYPE, FORWARD_REQUEST_TYPE};

    fn encode_type(name: &str, fields: &[TypedField]) -> String {
        let members: Vec<String> = fields
            .iter()
            .map(|f| format!("{} {}", f.kind, f.name))
            .collect();
        format!("{}({})", name, members.join(","))
    }

    #[test]
    fn test_template_matches_signed_types() {
        let domain = DomainDescriptor::new(137, Address::repeat_byte(0xf0));
        let template = TypedDataTemplate::for_domain(&domain);

        assert_eq!(template.primary_type, "ForwardRequest");
        assert_eq!(
            encode_type("ForwardRequest", &template.types["ForwardRequest"]),
            FORWARD_REQUEST_TYPE
        );
        assert_eq!(
            encode_type("EIP712Domain", &template.types["EIP712Domain"]),
            EIP712_DOMAIN_TYPE
        );
    }

    #[test]
    fn test_template_json_shape() {
        let domain = DomainDescriptor::new(137, Address::repeat_byte(0xf0));
        let json = serde_json::to_value(TypedDataTemplate::for_domain(&domain)).unwrap();

        assert_eq!(json["primaryType"], "ForwardRequest");
        assert_eq!(json["domain"]["chainId"], 137);
        assert_eq!(json["types"]["ForwardRequest"][6]["type"], "uint256");
    }
}
