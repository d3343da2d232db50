//! `EntityFingerprint` — the stable 256-bit identifier keyed off a normalized
//! identity. The derivation itself (normalization + hashing) lives in the
//! root crate's `fingerprint` module, which owns the EKD algorithm; this type
//! is just the value that flows through every store, queue, and wire shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 32-byte stable identifier for a screened identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityFingerprint(pub [u8; 32]);

impl EntityFingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid fingerprint hex: {0}")]
pub struct FingerprintParseError(String);

impl FromStr for EntityFingerprint {
    type Err = FingerprintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| FingerprintParseError(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| FingerprintParseError(format!("expected 32 bytes, got {} chars", s.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for EntityFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for EntityFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityFingerprint({})", self.to_hex())
    }
}

impl Serialize for EntityFingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EntityFingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "database")]
impl sqlx::Type<sqlx::Postgres> for EntityFingerprint {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "database")]
impl sqlx::Encode<'_, sqlx::Postgres> for EntityFingerprint {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode(self.to_hex(), buf)
    }
}

#[cfg(feature = "database")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for EntityFingerprint {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hex() {
        let fp = EntityFingerprint([7u8; 32]);
        let hex = fp.to_hex();
        let parsed: EntityFingerprint = hex.parse().unwrap();
        assert_eq!(fp, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("deadbeef".parse::<EntityFingerprint>().is_err());
    }

    #[test]
    fn serde_round_trip() {
        let fp = EntityFingerprint([1u8; 32]);
        let json = serde_json::to_string(&fp).unwrap();
        let back: EntityFingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, back);
    }
}
