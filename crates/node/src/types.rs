use aptwatch_types::{ChainId, Sequence};
use serde::{Deserialize, Deserializer, Serialize};

// Sequences arrive as strings from most tooling (JSON numbers lose precision past 2^53)
fn deserialize_u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, Visitor};
    use std::fmt;

    struct U64Visitor;

    impl<'de> Visitor<'de> for U64Visitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number representing u64")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            v.parse().map_err(Error::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u64::try_from(v).map_err(|_| Error::custom("u64 cannot be negative"))
        }
    }

    deserializer.deserialize_any(U64Visitor)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub chain_id: ChainId,
    pub ready: bool,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainStatsEntry {
    pub chain_id: ChainId,
    pub height: i64,
    pub contract_address: String,
    pub error_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub chains: Vec<ChainStatsEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ObservationRequestBody {
    pub chain_id: ChainId,
    #[serde(deserialize_with = "deserialize_u64_from_string")]
    pub sequence: Sequence,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObservationAccepted {
    pub chain_id: ChainId,
    pub sequence: Sequence,
    pub tx_hash: String,
}
