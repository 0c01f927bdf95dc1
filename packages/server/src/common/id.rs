//! Typed UUID ids.
//!
//! `Id<Organization>` and `Id<AdAnalysis>` share one representation but are
//! different types. Stored as a Postgres `UUID`, serialized as a bare UUID
//! string, generated as time-ordered v7.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef, Postgres};
use sqlx::{Decode, Encode, Type};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;
use uuid::Uuid;

#[repr(transparent)]
pub struct Id<T>(Uuid, PhantomData<fn() -> T>);

impl<T> Id<T> {
    pub fn new() -> Self {
        Self(Uuid::now_v7(), PhantomData)
    }

    /// Parse a path segment, CLI flag or JSON string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(|uuid| Self(uuid, PhantomData))
    }

    /// The all-zero id. Never assigned to a stored entity.
    pub fn nil() -> Self {
        Self(Uuid::nil(), PhantomData)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: derives would demand the same traits of the marker `T`.

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = std::any::type_name::<T>().rsplit("::").next().unwrap_or("Id");
        write!(f, "{}Id({})", entity, self.0)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl<T> FromStr for Id<T> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(|uuid| Self(uuid, PhantomData))
    }
}

impl<T> Type<Postgres> for Id<T> {
    fn type_info() -> PgTypeInfo {
        <Uuid as Type<Postgres>>::type_info()
    }
}

impl<T> Encode<'_, Postgres> for Id<T> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <Uuid as Encode<Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<T> Decode<'_, Postgres> for Id<T> {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        <Uuid as Decode<Postgres>>::decode(value).map(|uuid| Self(uuid, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    type WidgetId = Id<Widget>;

    #[test]
    fn parses_what_it_displays() {
        let id = WidgetId::new();
        assert_ne!(id, WidgetId::new());
        assert_eq!(WidgetId::parse(&id.to_string()).unwrap(), id);
        assert!(WidgetId::parse("default-org").is_err());
        assert!("".parse::<WidgetId>().is_err());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = WidgetId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: WidgetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn nil_is_detected() {
        assert!(WidgetId::nil().is_nil());
        assert!(!WidgetId::new().is_nil());
        assert!(format!("{:?}", WidgetId::nil()).starts_with("WidgetId("));
    }
}
