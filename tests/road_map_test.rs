use road_traffic_sim::simulation::{
    Junction, JunctionId, Road, RoadId, RoadMap, SimError, Vehicle,
};

fn ids(list: &[&str]) -> Vec<JunctionId> {
    list.iter().map(|id| JunctionId::from(*id)).collect()
}

fn triangle() -> RoadMap {
    let mut map = RoadMap::new();
    for id in ["j1", "j2", "j3"] {
        map.add_simulated_object(Junction::new(id)).unwrap();
    }
    map.add_simulated_object(Road::new("r1", 50, 10, "j1", "j2")).unwrap();
    map.add_simulated_object(Road::new("r2", 50, 10, "j2", "j3")).unwrap();
    map
}

#[test]
fn test_ids_are_unique_across_families() {
    let mut map = triangle();
    assert!(matches!(
        map.add_simulated_object(Junction::new("r1")),
        Err(SimError::DuplicateId(id)) if id == "r1"
    ));
    assert!(matches!(
        map.add_simulated_object(Vehicle::new("j2", 10, ids(&["j1", "j2"]))),
        Err(SimError::DuplicateId(_))
    ));
    assert!(matches!(
        map.add_simulated_object(Road::new("j1", 5, 5, "j1", "j2")),
        Err(SimError::DuplicateId(_))
    ));
}

#[test]
fn test_road_with_unknown_endpoint_leaves_map_unchanged() {
    let mut map = triangle();
    let result = map.add_simulated_object(Road::new("r9", 10, 10, "j1", "nowhere"));
    assert!(matches!(result, Err(SimError::UnknownJunction(id)) if id == "nowhere"));

    assert!(!map.contains("r9"));
    assert_eq!(map.roads().count(), 2);
    let j1 = map.junction(&"j1".into()).unwrap();
    assert!(j1.incoming_roads().is_empty());
    assert!(matches!(
        map.get_path(&ids(&["j1", "nowhere"])),
        Err(SimError::UnknownJunction(_))
    ));
}

#[test]
fn test_vehicle_with_bad_itinerary_is_not_registered() {
    let mut map = triangle();
    assert!(matches!(
        map.add_simulated_object(Vehicle::new("v1", 10, ids(&["j1", "j9"]))),
        Err(SimError::UnknownJunction(_))
    ));
    assert!(matches!(
        map.add_simulated_object(Vehicle::new("v1", 10, ids(&["j3", "j1"]))),
        Err(SimError::Disconnected { .. })
    ));
    assert!(!map.contains("v1"));
    assert_eq!(map.vehicles().count(), 0);
}

#[test]
fn test_vehicle_with_disconnected_later_leg_is_not_registered() {
    let mut map = RoadMap::new();
    for id in ["j1", "j2", "j3"] {
        map.add_simulated_object(Junction::new(id)).unwrap();
    }
    map.add_simulated_object(Road::new("r1", 10, 10, "j1", "j2")).unwrap();

    assert!(matches!(
        map.add_simulated_object(Vehicle::new("v1", 10, ids(&["j1", "j2", "j3"]))),
        Err(SimError::Disconnected { from, to }) if from == "j2" && to == "j3"
    ));
    assert!(!map.contains("v1"));
    assert_eq!(map.road(&"r1".into()).unwrap().occupancy(), 0);

    // The map keeps advancing without the rejected vehicle
    map.advance_roads().unwrap();
    map.advance_junctions().unwrap();
}

#[test]
fn test_vehicle_crosses_every_leg_of_its_itinerary() {
    let mut map = triangle();
    map.add_simulated_object(Vehicle::new("v1", 50, ids(&["j1", "j2", "j3"])))
        .unwrap();

    // Road speed is 10 on a road of length 50
    for _ in 0..5 {
        map.advance_roads().unwrap();
    }
    let j2 = map.junction(&"j2".into()).unwrap();
    assert_eq!(j2.incoming_roads()[0].queue_len(), 1);

    // Green, then through
    map.advance_junctions().unwrap();
    map.advance_junctions().unwrap();
    let vehicle = map.vehicle(&"v1".into()).unwrap();
    assert_eq!(vehicle.road(), Some(&RoadId::from("r2")));
    assert!(!vehicle.in_junction());
    let remaining: Vec<&JunctionId> = vehicle.itinerary().collect();
    assert_eq!(remaining, vec![&JunctionId::from("j3")]);
    assert_eq!(map.road(&"r1".into()).unwrap().occupancy(), 0);
    assert_eq!(map.road(&"r2".into()).unwrap().occupancy(), 1);
}

#[test]
fn test_new_vehicle_starts_on_first_road() {
    let mut map = triangle();
    map.add_simulated_object(Vehicle::new("v1", 10, ids(&["j1", "j2", "j3"])))
        .unwrap();

    let vehicle = map.vehicle(&"v1".into()).unwrap();
    assert_eq!(vehicle.road(), Some(&RoadId::from("r1")));
    assert_eq!(vehicle.location(), 0);
    let remaining: Vec<&JunctionId> = vehicle.itinerary().collect();
    assert_eq!(remaining, vec![&JunctionId::from("j2"), &JunctionId::from("j3")]);

    let r1 = map.road(&"r1".into()).unwrap();
    assert_eq!(r1.vehicles().count(), 1);
}

#[test]
fn test_get_path() {
    let map = triangle();
    assert_eq!(map.get_path(&ids(&["j1", "j2", "j3"])).unwrap(), ids(&["j1", "j2", "j3"]));

    match map.get_path(&ids(&["j1", "j3"])) {
        Err(SimError::Disconnected { from, to }) => {
            assert_eq!(from, "j1");
            assert_eq!(to, "j3");
        }
        other => panic!("expected a disconnected path, got {:?}", other),
    }
    assert!(matches!(
        map.get_path(&ids(&["j1", "j7"])),
        Err(SimError::UnknownJunction(id)) if id == "j7"
    ));
}

#[test]
fn test_parallel_roads_use_the_first_registered() {
    let mut map = triangle();
    map.add_simulated_object(Road::new("r1b", 10, 10, "j1", "j2")).unwrap();
    assert_eq!(
        map.find_road_between(&"j1".into(), &"j2".into()).unwrap(),
        &RoadId::from("r1")
    );

    map.add_simulated_object(Vehicle::new("v1", 10, ids(&["j1", "j2"])))
        .unwrap();
    assert_eq!(
        map.vehicle(&"v1".into()).unwrap().road(),
        Some(&RoadId::from("r1"))
    );
}

#[test]
fn test_reports_order() {
    let mut map = triangle();
    map.add_simulated_object(Vehicle::new("v1", 10, ids(&["j1", "j2"])))
        .unwrap();
    let tags: Vec<(String, String)> = map
        .reports(0)
        .iter()
        .map(|s| (s.tag().to_string(), s.get("id").unwrap().to_string()))
        .collect();
    let expected: Vec<(String, String)> = [
        ("junction_report", "j1"),
        ("junction_report", "j2"),
        ("junction_report", "j3"),
        ("road_report", "r1"),
        ("road_report", "r2"),
        ("vehicle_report", "v1"),
    ]
    .iter()
    .map(|(t, i)| (t.to_string(), i.to_string()))
    .collect();
    assert_eq!(tags, expected);
}
