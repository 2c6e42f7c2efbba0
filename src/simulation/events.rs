//! Scheduled events and their section parsers
//!
//! Each event kind has a parser bound to a section tag and an optional
//! `type` value. Parsers are tried in a fixed order and the first one whose
//! tag and type match decides the outcome, so an untyped parser never
//! claims a typed section and vice versa.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use log::debug;
use ordered_float::OrderedFloat;
use regex::Regex;

use super::error::{ParseError, SimResult};
use super::junction::{Junction, LightPolicy};
use super::road::{Road, RoadKind};
use super::road_map::RoadMap;
use super::types::{JunctionId, RoadId, Tick, VehicleId, ID_PATTERN};
use super::vehicle::Vehicle;
use crate::ini::IniSection;

lazy_static! {
    static ref VALID_ID: Regex = Regex::new(ID_PATTERN).unwrap();
    static ref ID_SEPARATOR: Regex = Regex::new("[, ]+").unwrap();
}

/// Variant-specific parameters of a new vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VehicleModel {
    Plain,
    Car {
        resistance: u32,
        fault_probability: OrderedFloat<f64>,
        max_fault_duration: u32,
        seed: u64,
    },
    Bicycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NewVehicle {
        id: VehicleId,
        max_speed: u32,
        itinerary: Vec<JunctionId>,
        model: VehicleModel,
    },
    NewRoad {
        id: RoadId,
        source: JunctionId,
        destination: JunctionId,
        max_speed: u32,
        length: u32,
        kind: RoadKind,
    },
    NewJunction {
        id: JunctionId,
        policy: LightPolicy,
    },
    MakeVehicleFaulty {
        vehicles: Vec<VehicleId>,
        duration: u32,
    },
}

/// Something that happens at a given tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    time: Tick,
    kind: EventKind,
}

impl Event {
    pub fn new(time: Tick, kind: EventKind) -> Self {
        Self { time, kind }
    }

    pub fn time(&self) -> Tick {
        self.time
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Id of the object the event creates; empty for faults
    pub fn id(&self) -> &str {
        match &self.kind {
            EventKind::NewVehicle { id, .. } => id.as_str(),
            EventKind::NewRoad { id, .. } => id.as_str(),
            EventKind::NewJunction { id, .. } => id.as_str(),
            EventKind::MakeVehicleFaulty { .. } => "",
        }
    }

    /// Applies the event to the road map
    pub fn execute(&self, map: &mut RoadMap) -> SimResult<()> {
        debug!("Executing {} at tick {}", self, self.time);
        match &self.kind {
            EventKind::NewVehicle {
                id,
                max_speed,
                itinerary,
                model,
            } => {
                let path = map.get_path(itinerary)?;
                let vehicle = match model {
                    VehicleModel::Plain => Vehicle::new(id.clone(), *max_speed, path),
                    VehicleModel::Bicycle => Vehicle::bicycle(id.clone(), *max_speed, path),
                    VehicleModel::Car {
                        resistance,
                        fault_probability,
                        max_fault_duration,
                        seed,
                    } => Vehicle::car(
                        id.clone(),
                        *max_speed,
                        path,
                        *resistance,
                        fault_probability.into_inner(),
                        *max_fault_duration,
                        *seed,
                    ),
                };
                map.add_simulated_object(vehicle)
            }
            EventKind::NewRoad {
                id,
                source,
                destination,
                max_speed,
                length,
                kind,
            } => map.add_simulated_object(
                Road::new(
                    id.clone(),
                    *length,
                    *max_speed,
                    source.clone(),
                    destination.clone(),
                )
                .with_kind(*kind),
            ),
            EventKind::NewJunction { id, policy } => {
                map.add_simulated_object(Junction::with_policy(id.clone(), *policy))
            }
            EventKind::MakeVehicleFaulty { vehicles, duration } => {
                for vehicle in vehicles {
                    map.make_vehicle_faulty(vehicle, *duration)?;
                }
                Ok(())
            }
        }
    }

    /// Writes the event back as a section that parses to an equal event
    pub fn to_section(&self) -> IniSection {
        let mut section;
        match &self.kind {
            EventKind::NewVehicle {
                id,
                max_speed,
                itinerary,
                model,
            } => {
                section = IniSection::new(NEW_VEHICLE);
                section.set_value("time", self.time.to_string());
                section.set_value("id", id.as_str());
                section.set_value("max_speed", max_speed.to_string());
                let itinerary: Vec<&str> = itinerary.iter().map(JunctionId::as_str).collect();
                section.set_value("itinerary", itinerary.join(","));
                match model {
                    VehicleModel::Plain => {}
                    VehicleModel::Bicycle => section.set_value("type", "bike"),
                    VehicleModel::Car {
                        resistance,
                        fault_probability,
                        max_fault_duration,
                        seed,
                    } => {
                        section.set_value("type", "car");
                        section.set_value("resistance", resistance.to_string());
                        section.set_value("fault_probability", fault_probability.to_string());
                        section.set_value("max_fault_duration", max_fault_duration.to_string());
                        section.set_value("seed", seed.to_string());
                    }
                }
            }
            EventKind::NewRoad {
                id,
                source,
                destination,
                max_speed,
                length,
                kind,
            } => {
                section = IniSection::new(NEW_ROAD);
                section.set_value("time", self.time.to_string());
                section.set_value("id", id.as_str());
                section.set_value("src", source.as_str());
                section.set_value("dest", destination.as_str());
                section.set_value("max_speed", max_speed.to_string());
                section.set_value("length", length.to_string());
                if let Some(tag) = kind.type_tag() {
                    section.set_value("type", tag);
                }
                if let RoadKind::Lanes(lanes) = kind {
                    section.set_value("lanes", lanes.to_string());
                }
            }
            EventKind::NewJunction { id, policy } => {
                section = IniSection::new(NEW_JUNCTION);
                section.set_value("time", self.time.to_string());
                section.set_value("id", id.as_str());
                if let Some(tag) = policy.type_tag() {
                    section.set_value("type", tag);
                }
                if let LightPolicy::RoundRobin {
                    min_slice,
                    max_slice,
                } = policy
                {
                    section.set_value("min_time_slice", min_slice.to_string());
                    section.set_value("max_time_slice", max_slice.to_string());
                }
            }
            EventKind::MakeVehicleFaulty { vehicles, duration } => {
                section = IniSection::new(MAKE_VEHICLE_FAULTY);
                section.set_value("time", self.time.to_string());
                let vehicles: Vec<&str> = vehicles.iter().map(VehicleId::as_str).collect();
                section.set_value("vehicles", vehicles.join(","));
                section.set_value("duration", duration.to_string());
            }
        }
        section
    }

    /// Columns shown in the event table
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![("Time", self.time.to_string()), ("Type", self.to_string())]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            EventKind::NewVehicle { model, .. } => match model {
                VehicleModel::Plain => "New Vehicle",
                VehicleModel::Car { .. } => "New Car",
                VehicleModel::Bicycle => "New Bicycle",
            },
            EventKind::NewRoad { kind, .. } => match kind {
                RoadKind::Plain => "New Road",
                RoadKind::Dirt => "New Dirt Road",
                RoadKind::Lanes(_) => "New Lane Road",
            },
            EventKind::NewJunction { policy, .. } => match policy {
                LightPolicy::Cyclic => "New Junction",
                LightPolicy::RoundRobin { .. } => "New RR Junction",
                LightPolicy::MostCrowded => "New MC Junction",
            },
            EventKind::MakeVehicleFaulty { vehicles, .. } => {
                let vehicles: Vec<&str> = vehicles.iter().map(VehicleId::as_str).collect();
                return write!(f, "Break Vehicles [{}]", vehicles.join(","));
            }
        };
        write!(f, "{} {}", name, self.id())
    }
}

const NEW_VEHICLE: &str = "new_vehicle";
const NEW_ROAD: &str = "new_road";
const NEW_JUNCTION: &str = "new_junction";
const MAKE_VEHICLE_FAULTY: &str = "make_vehicle_faulty";

const VEHICLE_ATTRIBUTES: &[&str] = &["time", "id", "max_speed", "itinerary"];
const ROAD_ATTRIBUTES: &[&str] = &["time", "id", "src", "dest", "max_speed", "length"];
const JUNCTION_ATTRIBUTES: &[&str] = &["time", "id"];
const FAULT_ATTRIBUTES: &[&str] = &["time", "vehicles", "duration"];

/// Builds an event kind from a matched section
type BuildFn = fn(&Fields<'_>) -> Result<EventKind, String>;

/// Recognises one event kind
pub struct EventParser {
    name: &'static str,
    tag: &'static str,
    /// Required value of `type`; `None` matches only sections without one
    type_tag: Option<&'static str>,
    attributes: &'static [&'static str],
    extra_attributes: &'static [&'static str],
    build: BuildFn,
}

impl EventParser {
    /// Friendly name of the event kind
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, section: &IniSection) -> bool {
        section.tag() == self.tag && section.get("type") == self.type_tag
    }

    /// `None` when the section is not for this parser
    pub fn parse(&self, section: &IniSection) -> Option<Result<Event, ParseError>> {
        if !self.matches(section) {
            return None;
        }
        let fields = Fields(section);
        let parsed = fields
            .optional_int("time", 0)
            .and_then(|time| Ok(Event::new(time, (self.build)(&fields)?)));
        Some(parsed.map_err(|reason| ParseError::new(section.tag(), reason)))
    }

    /// Empty section showing every key the event kind reads
    pub fn template(&self) -> String {
        let mut template = format!("[{}]\n", self.tag);
        for attribute in self.attributes {
            template.push_str(&format!("{} = \n", attribute));
        }
        if let Some(type_tag) = self.type_tag {
            template.push_str(&format!("type = {}\n", type_tag));
        }
        for attribute in self.extra_attributes {
            template.push_str(&format!("{} = \n", attribute));
        }
        template
    }
}

/// Every supported event kind, in matching order
pub static EVENT_PARSERS: &[EventParser] = &[
    EventParser {
        name: "New Car",
        tag: NEW_VEHICLE,
        type_tag: Some("car"),
        attributes: VEHICLE_ATTRIBUTES,
        extra_attributes: &["resistance", "fault_probability", "max_fault_duration", "seed"],
        build: build_car,
    },
    EventParser {
        name: "New Bicycle",
        tag: NEW_VEHICLE,
        type_tag: Some("bike"),
        attributes: VEHICLE_ATTRIBUTES,
        extra_attributes: &[],
        build: build_bicycle,
    },
    EventParser {
        name: "New Vehicle",
        tag: NEW_VEHICLE,
        type_tag: None,
        attributes: VEHICLE_ATTRIBUTES,
        extra_attributes: &[],
        build: build_vehicle,
    },
    EventParser {
        name: "New Lane Road",
        tag: NEW_ROAD,
        type_tag: Some("lanes"),
        attributes: ROAD_ATTRIBUTES,
        extra_attributes: &["lanes"],
        build: build_lane_road,
    },
    EventParser {
        name: "New Dirt Road",
        tag: NEW_ROAD,
        type_tag: Some("dirt"),
        attributes: ROAD_ATTRIBUTES,
        extra_attributes: &[],
        build: build_dirt_road,
    },
    EventParser {
        name: "New Road",
        tag: NEW_ROAD,
        type_tag: None,
        attributes: ROAD_ATTRIBUTES,
        extra_attributes: &[],
        build: build_road,
    },
    EventParser {
        name: "New RR Junction",
        tag: NEW_JUNCTION,
        type_tag: Some("rr"),
        attributes: JUNCTION_ATTRIBUTES,
        extra_attributes: &["min_time_slice", "max_time_slice"],
        build: build_round_robin_junction,
    },
    EventParser {
        name: "New MC Junction",
        tag: NEW_JUNCTION,
        type_tag: Some("mc"),
        attributes: JUNCTION_ATTRIBUTES,
        extra_attributes: &[],
        build: build_most_crowded_junction,
    },
    EventParser {
        name: "New Junction",
        tag: NEW_JUNCTION,
        type_tag: None,
        attributes: JUNCTION_ATTRIBUTES,
        extra_attributes: &[],
        build: build_junction,
    },
    EventParser {
        name: "Make Vehicle Faulty",
        tag: MAKE_VEHICLE_FAULTY,
        type_tag: None,
        attributes: FAULT_ATTRIBUTES,
        extra_attributes: &[],
        build: build_fault,
    },
];

/// Parses a section with the first parser that claims it
pub fn parse_section(section: &IniSection) -> Result<Event, ParseError> {
    EVENT_PARSERS
        .iter()
        .find_map(|parser| parser.parse(section))
        .unwrap_or_else(|| {
            Err(ParseError::new(
                section.tag(),
                "Unrecognised event section",
            ))
        })
}

/// Typed access to the values of a section. Errors are the reason text.
struct Fields<'a>(&'a IniSection);

impl Fields<'_> {
    fn string(&self, key: &str) -> Result<&str, String> {
        self.0.get(key).ok_or_else(|| format!("Missing {}", key))
    }

    fn number<T: std::str::FromStr>(&self, key: &str, value: &str) -> Result<T, String> {
        value
            .parse()
            .map_err(|_| format!("{} must be a number", key))
    }

    /// Positive or zero, with a default used only when the key is absent
    fn optional_int(&self, key: &str, default: u32) -> Result<u32, String> {
        let Some(value) = self.0.get(key) else {
            return Ok(default);
        };
        let value: i32 = self.number(key, value)?;
        u32::try_from(value).map_err(|_| format!("{} must be positive or zero", key))
    }

    /// Strictly positive, required
    fn positive_int(&self, key: &str) -> Result<u32, String> {
        let value: i32 = self.number(key, self.string(key)?)?;
        match u32::try_from(value) {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(format!("{} must be positive", key)),
        }
    }

    fn optional_positive_long(&self, key: &str, default: impl FnOnce() -> u64) -> Result<u64, String> {
        let Some(value) = self.0.get(key) else {
            return Ok(default());
        };
        let value: i64 = self.number(key, value)?;
        match u64::try_from(value) {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(format!("{} must be positive", key)),
        }
    }

    /// Within `[0, max]`
    fn fraction(&self, key: &str, max: f64) -> Result<f64, String> {
        let value: f64 = self.number(key, self.string(key)?)?;
        if !(0.0..=max).contains(&value) {
            return Err(format!("{} has to be between 0 and {}", key, max));
        }
        Ok(value)
    }

    fn id(&self) -> Result<String, String> {
        let id = self.string("id")?;
        if !VALID_ID.is_match(id) {
            return Err(format!("Id \"{}\" is not a valid id", id));
        }
        Ok(id.to_string())
    }

    /// Splits on runs of commas and spaces. A leading separator yields an
    /// empty first id; trailing empty pieces are dropped unless the whole
    /// value is empty.
    fn id_list(&self, key: &str, min_elements: usize) -> Result<Vec<String>, String> {
        let value = self.string(key)?;
        let mut ids: Vec<String> = ID_SEPARATOR.split(value).map(str::to_string).collect();
        if !value.is_empty() {
            while ids.last().is_some_and(String::is_empty) {
                ids.pop();
            }
        }
        if ids.len() < min_elements {
            return Err(format!(
                "The id list for {} must contain at least {} elements",
                key, min_elements
            ));
        }
        Ok(ids)
    }
}

fn build_vehicle_with(fields: &Fields<'_>, model: VehicleModel) -> Result<EventKind, String> {
    let id = fields.id()?;
    let max_speed = fields.positive_int("max_speed")?;
    let itinerary = fields.id_list("itinerary", 2)?;
    Ok(EventKind::NewVehicle {
        id: id.into(),
        max_speed,
        itinerary: itinerary.into_iter().map(JunctionId::from).collect(),
        model,
    })
}

fn build_vehicle(fields: &Fields<'_>) -> Result<EventKind, String> {
    build_vehicle_with(fields, VehicleModel::Plain)
}

fn build_bicycle(fields: &Fields<'_>) -> Result<EventKind, String> {
    build_vehicle_with(fields, VehicleModel::Bicycle)
}

fn build_car(fields: &Fields<'_>) -> Result<EventKind, String> {
    // Base fields are validated first so their errors win
    let mut kind = build_vehicle_with(fields, VehicleModel::Plain)?;
    let car = VehicleModel::Car {
        resistance: fields.positive_int("resistance")?,
        fault_probability: OrderedFloat(fields.fraction("fault_probability", 1.0)?),
        max_fault_duration: fields.positive_int("max_fault_duration")?,
        seed: fields.optional_positive_long("seed", wall_clock_millis)?,
    };
    if let EventKind::NewVehicle { model, .. } = &mut kind {
        *model = car;
    }
    Ok(kind)
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(1)
        .max(1)
}

fn build_road_with(fields: &Fields<'_>, kind: RoadKind) -> Result<EventKind, String> {
    let id = fields.id()?;
    let source = fields.string("src")?;
    let destination = fields.string("dest")?;
    let max_speed = fields.positive_int("max_speed")?;
    let length = fields.positive_int("length")?;
    Ok(EventKind::NewRoad {
        id: id.into(),
        source: source.into(),
        destination: destination.into(),
        max_speed,
        length,
        kind,
    })
}

fn build_road(fields: &Fields<'_>) -> Result<EventKind, String> {
    build_road_with(fields, RoadKind::Plain)
}

fn build_dirt_road(fields: &Fields<'_>) -> Result<EventKind, String> {
    build_road_with(fields, RoadKind::Dirt)
}

fn build_lane_road(fields: &Fields<'_>) -> Result<EventKind, String> {
    let mut kind = build_road_with(fields, RoadKind::Plain)?;
    let lanes = fields.positive_int("lanes")?;
    if let EventKind::NewRoad { kind: road_kind, .. } = &mut kind {
        *road_kind = RoadKind::Lanes(lanes);
    }
    Ok(kind)
}

fn build_junction_with(fields: &Fields<'_>, policy: LightPolicy) -> Result<EventKind, String> {
    Ok(EventKind::NewJunction {
        id: fields.id()?.into(),
        policy,
    })
}

fn build_junction(fields: &Fields<'_>) -> Result<EventKind, String> {
    build_junction_with(fields, LightPolicy::Cyclic)
}

fn build_most_crowded_junction(fields: &Fields<'_>) -> Result<EventKind, String> {
    build_junction_with(fields, LightPolicy::MostCrowded)
}

fn build_round_robin_junction(fields: &Fields<'_>) -> Result<EventKind, String> {
    let id = fields.id()?;
    let policy = LightPolicy::RoundRobin {
        min_slice: fields.positive_int("min_time_slice")?,
        max_slice: fields.positive_int("max_time_slice")?,
    };
    Ok(EventKind::NewJunction {
        id: id.into(),
        policy,
    })
}

fn build_fault(fields: &Fields<'_>) -> Result<EventKind, String> {
    let vehicles = fields.id_list("vehicles", 1)?;
    let duration = fields.positive_int("duration")?;
    Ok(EventKind::MakeVehicleFaulty {
        vehicles: vehicles.into_iter().map(VehicleId::from).collect(),
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(tag: &str, entries: &[(&str, &str)]) -> IniSection {
        let mut section = IniSection::new(tag);
        for (key, value) in entries {
            section.set_value(*key, *value);
        }
        section
    }

    #[test]
    fn test_id_list_splitting() {
        let s = section("x", &[("a", "j1, j2,,j3,"), ("b", ",j1"), ("c", "")]);
        let fields = Fields(&s);
        assert_eq!(fields.id_list("a", 1).unwrap(), vec!["j1", "j2", "j3"]);
        assert_eq!(fields.id_list("b", 1).unwrap(), vec!["", "j1"]);
        assert_eq!(fields.id_list("c", 1).unwrap(), vec![""]);
        assert!(fields.id_list("c", 2).is_err());
    }

    #[test]
    fn test_optional_int_rules() {
        let s = section("x", &[("neg", "-1"), ("bad", "x1"), ("zero", "0")]);
        let fields = Fields(&s);
        assert_eq!(fields.optional_int("missing", 7), Ok(7));
        assert_eq!(fields.optional_int("zero", 7), Ok(0));
        assert_eq!(
            fields.optional_int("neg", 7),
            Err("neg must be positive or zero".to_string())
        );
        assert_eq!(
            fields.optional_int("bad", 7),
            Err("bad must be a number".to_string())
        );
        assert_eq!(
            fields.positive_int("zero"),
            Err("zero must be positive".to_string())
        );
    }
}
