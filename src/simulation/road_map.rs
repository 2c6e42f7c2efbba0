//! The road map owns every simulated entity
//!
//! Vehicles, roads and junctions live in registries keyed by id and refer to
//! each other by id only. A petgraph graph mirrors the junction/road topology
//! for connectivity queries.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};

use super::error::{SimError, SimResult};
use super::junction::Junction;
use super::road::Road;
use super::types::{JunctionId, RoadId, Tick, VehicleId};
use super::vehicle::Vehicle;
use crate::ini::IniSection;

/// Entities kept in registration order with lookup by id
#[derive(Debug, Clone)]
pub struct Registry<K, T> {
    entries: Vec<T>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash, T> Default for Registry<K, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, T> Registry<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, leaving the registry untouched, if `key` is taken
    pub fn insert(&mut self, key: K, value: T) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(value);
        true
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut T> {
        let idx = *self.index.get(key)?;
        self.entries.get_mut(idx)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Entries in registration order
    pub fn values(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn values_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Anything that can be registered in the road map
#[derive(Debug, Clone)]
pub enum SimObject {
    Vehicle(Vehicle),
    Road(Road),
    Junction(Junction),
}

impl SimObject {
    pub fn id(&self) -> &str {
        match self {
            SimObject::Vehicle(vehicle) => vehicle.id().as_str(),
            SimObject::Road(road) => road.id().as_str(),
            SimObject::Junction(junction) => junction.id().as_str(),
        }
    }
}

impl From<Vehicle> for SimObject {
    fn from(vehicle: Vehicle) -> Self {
        SimObject::Vehicle(vehicle)
    }
}

impl From<Road> for SimObject {
    fn from(road: Road) -> Self {
        SimObject::Road(road)
    }
}

impl From<Junction> for SimObject {
    fn from(junction: Junction) -> Self {
        SimObject::Junction(junction)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoadMap {
    vehicles: Registry<VehicleId, Vehicle>,
    roads: Registry<RoadId, Road>,
    junctions: Registry<JunctionId, Junction>,

    /// Junctions as nodes, roads as edges from source to destination
    graph: DiGraph<JunctionId, RoadId>,
    junction_to_node: HashMap<JunctionId, NodeIndex>,
}

impl RoadMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` names a registered vehicle, road or junction
    pub fn contains(&self, id: &str) -> bool {
        self.vehicles.contains(&VehicleId::from(id))
            || self.roads.contains(&RoadId::from(id))
            || self.junctions.contains(&JunctionId::from(id))
    }

    /// Registers an entity. Every check runs before anything is modified, so
    /// a failed registration leaves the map as it was.
    ///
    /// A new vehicle needs a road between every consecutive pair of its
    /// itinerary and is placed straight onto the first one.
    /// A new road is registered as incoming at its destination junction.
    pub fn add_simulated_object(&mut self, object: impl Into<SimObject>) -> SimResult<()> {
        let object = object.into();
        if self.contains(object.id()) {
            return Err(SimError::DuplicateId(object.id().to_string()));
        }

        match object {
            SimObject::Junction(junction) => {
                let id = junction.id().clone();
                let node = self.graph.add_node(id.clone());
                self.junction_to_node.insert(id.clone(), node);
                self.junctions.insert(id.clone(), junction);
                debug!("Registered junction {}", id);
            }
            SimObject::Road(road) => {
                let source = self.node(road.source())?;
                let destination = self.node(road.destination())?;
                let id = road.id().clone();
                if let Some(junction) = self.junctions.get_mut(road.destination()) {
                    junction.add_road(id.clone(), road.source().clone());
                }
                self.graph.add_edge(source, destination, id.clone());
                self.roads.insert(id.clone(), road);
                debug!("Registered road {}", id);
            }
            SimObject::Vehicle(vehicle) => {
                let itinerary: Vec<JunctionId> = vehicle.itinerary().cloned().collect();
                self.get_path(&itinerary)?;
                let id = vehicle.id().clone();
                self.vehicles.insert(id.clone(), vehicle);
                self.move_to_next_road(&id)?;
                debug!("Registered vehicle {}", id);
            }
        }
        Ok(())
    }

    fn node(&self, junction: &JunctionId) -> SimResult<NodeIndex> {
        self.junction_to_node
            .get(junction)
            .copied()
            .ok_or_else(|| SimError::UnknownJunction(junction.to_string()))
    }

    /// The road a vehicle takes from `from` to `to`: the first one registered
    /// at `to` that starts at `from`
    pub fn find_road_between(&self, from: &JunctionId, to: &JunctionId) -> SimResult<&RoadId> {
        self.junctions
            .get(to)
            .ok_or_else(|| SimError::UnknownJunction(to.to_string()))?
            .straight_road(from)
            .ok_or_else(|| SimError::Disconnected {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    /// Resolves an itinerary, checking that every junction exists and every
    /// consecutive pair is joined by a road
    pub fn get_path(&self, junctions: &[JunctionId]) -> SimResult<Vec<JunctionId>> {
        let nodes = junctions
            .iter()
            .map(|junction| self.node(junction))
            .collect::<SimResult<Vec<_>>>()?;

        for (pair, ids) in nodes.windows(2).zip(junctions.windows(2)) {
            if self.graph.find_edge(pair[0], pair[1]).is_none() {
                return Err(SimError::Disconnected {
                    from: ids[0].to_string(),
                    to: ids[1].to_string(),
                });
            }
        }
        Ok(junctions.to_vec())
    }

    /// Roads that currently have a green light at their destination
    pub fn green_roads(&self) -> BTreeSet<RoadId> {
        self.junctions
            .values()
            .filter_map(|junction| junction.green_road().cloned())
            .collect()
    }

    /// Takes a vehicle off its current road and puts it at the start of the
    /// road leading to the next junction of its itinerary, or marks it
    /// arrived when there is none. The next road is resolved first, so a
    /// failure leaves the vehicle where it was.
    pub fn move_to_next_road(&mut self, id: &VehicleId) -> SimResult<()> {
        let next_road = self.next_road_of(id)?;

        let vehicle = self
            .vehicles
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownVehicle(id.to_string()))?;
        if let Some(road) = vehicle.road() {
            if let Some(road) = self.roads.get_mut(road) {
                road.vehicle_out(id, vehicle.location());
            }
        }
        vehicle.pop_junction();

        match next_road {
            Some(road_id) => {
                if let Some(road) = self.roads.get_mut(&road_id) {
                    road.vehicle_in(id.clone());
                }
                vehicle.enter_road(road_id);
            }
            None => {
                vehicle.arrive();
                debug!("Vehicle {} arrived", id);
            }
        }
        Ok(())
    }

    /// Road from the junction a vehicle is at to the one after it; `None`
    /// when the vehicle is about to arrive
    fn next_road_of(&self, id: &VehicleId) -> SimResult<Option<RoadId>> {
        let vehicle = self
            .vehicles
            .get(id)
            .ok_or_else(|| SimError::UnknownVehicle(id.to_string()))?;
        let mut remaining = vehicle.itinerary();
        let (Some(crossed), Some(next)) = (remaining.next(), remaining.next()) else {
            return Ok(None);
        };
        let road_id = self.find_road_between(crossed, next)?;
        if !self.roads.contains(road_id) {
            return Err(SimError::UnknownRoad(road_id.to_string()));
        }
        Ok(Some(road_id.clone()))
    }

    /// Advances every road in registration order, queueing the vehicles
    /// that reach a junction
    pub fn advance_roads(&mut self) -> SimResult<()> {
        for road in self.roads.values_mut() {
            for (vehicle, junction) in road.advance(&mut self.vehicles)? {
                self.junctions
                    .get_mut(&junction)
                    .ok_or_else(|| SimError::UnknownJunction(junction.to_string()))?
                    .vehicle_in(road.id(), vehicle)?;
            }
        }
        Ok(())
    }

    /// Advances every junction in registration order, moving the vehicles
    /// that cross onto their next road
    pub fn advance_junctions(&mut self) -> SimResult<()> {
        for idx in 0..self.junctions.len() {
            let crossed = match self.junctions.entries.get_mut(idx) {
                Some(junction) => junction.advance(),
                None => None,
            };
            if let Some(vehicle) = crossed {
                self.move_to_next_road(&vehicle)?;
            }
        }
        Ok(())
    }

    pub fn make_vehicle_faulty(&mut self, id: &VehicleId, duration: u32) -> SimResult<()> {
        self.vehicles
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownVehicle(id.to_string()))?
            .set_faulty(duration)
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn road(&self, id: &RoadId) -> Option<&Road> {
        self.roads.get(id)
    }

    pub fn junction(&self, id: &JunctionId) -> Option<&Junction> {
        self.junctions.get(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    /// Snapshot of every entity: junctions, then roads, then vehicles
    pub fn reports(&self, time: Tick) -> Vec<IniSection> {
        self.junctions
            .values()
            .map(|junction| junction.report(time))
            .chain(self.roads.values().map(|road| road.report(time)))
            .chain(self.vehicles.values().map(|vehicle| vehicle.report(time)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_keeps_insertion_order() {
        let mut registry = Registry::new();
        assert!(registry.insert("b", 2));
        assert!(registry.insert("a", 1));
        assert!(!registry.insert("b", 3));
        let values: Vec<_> = registry.values().copied().collect();
        assert_eq!(values, vec![2, 1]);
        assert_eq!(registry.get(&"b"), Some(&2));
    }
}
