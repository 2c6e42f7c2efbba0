//! Discrete-event road traffic simulation
//!
//! Junctions, roads and vehicles are created by scheduled events and then
//! advanced once per tick: every road first, then every junction, in
//! registration order.

mod error;
mod events;
mod junction;
mod multimap;
mod notify;
mod road;
mod road_map;
mod simulator;
mod stats;
mod stepper;
mod types;
mod vehicle;

pub use error::{ParseError, SimError, SimResult};
pub use events::{parse_section, Event, EventKind, EventParser, VehicleModel, EVENT_PARSERS};
pub use junction::{IncomingRoad, Junction, LightPolicy, TimeSlice};
pub use multimap::{InnerValues, MultiTreeMap, ValuesList};
pub use notify::{Notification, Subscribers};
pub use road::{PositionIndex, Road, RoadKind};
pub use road_map::{Registry, RoadMap, SimObject};
pub use simulator::TrafficSimulator;
pub use stats::SimulationStats;
pub use stepper::{Sink, Stepper};
pub use types::{
    JunctionId, RoadId, Tick, VehicleId, CHECK_TICKS, DEFAULT_TICKS, ID_PATTERN,
    JUNCTION_REPORT, ROAD_REPORT, VEHICLE_REPORT,
};
pub use vehicle::{CarState, Vehicle, VehicleKind, VehicleStep};
