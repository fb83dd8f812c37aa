#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which ingest is currently authoritative for a channel.
///
/// Spec §9 calls out "dynamic dispatch on runtime type should be replaced
/// by tagged variants" — this and [`crate::channel::ChannelPhase`] are
/// those variants; the wire boundary is the only place this gets encoded
/// as a string (`"PRIMARY"` / `"LOOP"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Source {
    Primary,
    Loop,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Primary => "PRIMARY",
            Source::Loop => "LOOP",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::Type<sqlx::Postgres> for Source {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::Encode<'_, sqlx::Postgres> for Source {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str().to_string(), buf)
    }
}

#[cfg(feature = "sqlx")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Source {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let raw = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match raw.as_str() {
            "PRIMARY" => Ok(Source::Primary),
            "LOOP" => Ok(Source::Loop),
            other => Err(format!("unrecognized source {other:?}").into()),
        }
    }
}

/// Observed health status reported by the admin surface (spec §3,
/// "Observed ... `status`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum ChannelStatus {
    Live,
    Loop,
    Down,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Live => "LIVE",
            ChannelStatus::Loop => "LOOP",
            ChannelStatus::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
