use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// CFDI invoice payload as received from the client.
///
/// Only the fields the generator relies on are typed; everything else is
/// carried through to the template untouched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceRecord {
    #[serde(deserialize_with = "deserialize_total")]
    pub total: f64,
    pub emisor: Party,
    pub receptor: Party,
    pub complemento: Complemento,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

/// Issuer or recipient of the invoice.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Party {
    pub rfc: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

/// Timbre fiscal digital.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Complemento {
    /// Folio fiscal; also the key of the stored artifact.
    pub uuid: String,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTotal {
    Number(f64),
    Text(String),
}

/// Accept `total` as a JSON number or a numeric string.
fn deserialize_total<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTotal::deserialize(deserializer)? {
        RawTotal::Number(value) => Ok(value),
        RawTotal::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("invalid total '{}': {}", text, e))),
    }
}
