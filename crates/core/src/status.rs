//! Status enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each variant's discriminant matches the seed order (1-based) of the
//! corresponding `*_statuses` table, and its name matches the `name` column.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID. Returns `None` for unknown ids.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// The lookup-table `name` of this status.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }

            /// Parse a lookup-table `name`.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $label => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                $name::from_name(&raw).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        raw
                    ))
                })
            }
        }
    };
}

define_status_enum! {
    /// Room occupancy status.
    RoomStatus {
        Available = 1 => "available",
        Used = 2 => "used",
        Maintenance = 3 => "maintenance",
    }
}

define_status_enum! {
    /// Contract lifecycle status.
    ContractStatus {
        Draft = 1 => "draft",
        Active = 2 => "active",
        Terminated = 3 => "terminated",
        Expired = 4 => "expired",
    }
}

define_status_enum! {
    /// Invoice payment status.
    PaymentStatus {
        Pending = 1 => "pending",
        Waiting = 2 => "waiting",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        Refunded = 5 => "refunded",
    }
}
