use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

define_id!(EventId, "Unique identifier for a photographed event.");
define_id!(PhotoId, "Unique identifier for an uploaded photo.");
define_id!(
    FaceId,
    "Unique identifier for one detected face in a photo."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_id_generation() {
        let id1 = PhotoId::new();
        let id2 = PhotoId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_event_id_parse_round_trip() {
        let id = EventId::new();
        let parsed: EventId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not-a-uuid".parse::<PhotoId>().is_err());
    }

    #[test]
    fn test_ids_order_by_uuid() {
        let low = PhotoId::from_uuid(Uuid::from_u128(1));
        let high = PhotoId::from_uuid(Uuid::from_u128(2));
        assert!(low < high);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = EventId::from_uuid(Uuid::from_u128(7));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
