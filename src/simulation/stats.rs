//! End-of-run statistics

use log::info;

use super::simulator::TrafficSimulator;
use super::types::Tick;

/// Counters gathered from a simulator after a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub ticks: Tick,
    pub total_vehicles: usize,
    pub arrived_vehicles: usize,
    pub faulty_vehicles: usize,
    pub total_roads: usize,
    pub total_junctions: usize,
    pub pending_events: usize,
}

impl SimulationStats {
    pub fn collect(simulator: &TrafficSimulator) -> Self {
        let map = simulator.road_map();
        let now = simulator.time();
        Self {
            ticks: now,
            total_vehicles: map.vehicles().count(),
            arrived_vehicles: map.vehicles().filter(|v| v.has_arrived()).count(),
            faulty_vehicles: map.vehicles().filter(|v| v.is_faulty()).count(),
            total_roads: map.roads().count(),
            total_junctions: map.junctions().count(),
            pending_events: simulator
                .events()
                .iter()
                .filter(|event| event.time() >= now)
                .count(),
        }
    }

    /// Share of vehicles that reached the end of their itinerary, in percent
    pub fn arrival_rate(&self) -> f64 {
        if self.total_vehicles == 0 {
            return 0.0;
        }
        self.arrived_vehicles as f64 / self.total_vehicles as f64 * 100.0
    }

    pub fn log(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks run: {}", self.ticks);
        info!("Total vehicles: {}", self.total_vehicles);
        info!("Arrived vehicles: {}", self.arrived_vehicles);
        info!("Faulty vehicles: {}", self.faulty_vehicles);
        info!("Total junctions: {}", self.total_junctions);
        info!("Total roads: {}", self.total_roads);
        info!("Pending events: {}", self.pending_events);
        info!("Arrival rate: {:.1}%", self.arrival_rate());
    }
}
