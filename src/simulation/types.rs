//! Core types for the traffic simulation
//!
//! Identifier wrappers and the constants shared by the entity model,
//! the event parsers and the report writer.

use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// A wrapper type for junction IDs
    JunctionId
);

string_id!(
    /// A wrapper type for road IDs
    RoadId
);

string_id!(
    /// A wrapper type for vehicle IDs
    VehicleId
);

/// Simulated time, in ticks
pub type Tick = u32;

/// Ticks run by the command line when none are given
pub const DEFAULT_TICKS: u32 = 10;

/// Ticks run per file in regression check mode
pub const CHECK_TICKS: u32 = 10;

/// Pattern every entity id must match. The digit `0` is not part of it.
pub const ID_PATTERN: &str = "^[a-zA-Z1-9_]+$";

/// Report section tags
pub const VEHICLE_REPORT: &str = "vehicle_report";
pub const ROAD_REPORT: &str = "road_report";
pub const JUNCTION_REPORT: &str = "junction_report";
