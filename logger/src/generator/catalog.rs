use radarcore::host_interface::Blueprint;

const BLUEPRINT_IDS: &[&str] = &[
    "vehicle.audi.a2",
    "vehicle.audi.tt",
    "vehicle.bmw.grandtourer",
    "vehicle.chevrolet.impala",
    "vehicle.citroen.c3",
    "vehicle.dodge.charger_police",
    "vehicle.ford.mustang",
    "vehicle.lincoln.mkz_2017",
    "vehicle.mercedes.coupe",
    "vehicle.mini.cooper_s",
    "vehicle.nissan.micra",
    "vehicle.seat.leon",
    "vehicle.tesla.model3",
    "vehicle.toyota.prius",
    "vehicle.volkswagen.t2",
    "sensor.other.radar",
    "sensor.camera.rgb",
    "static.prop.trafficcone01",
];

pub const KNOWN_WORLDS: &[&str] = &["Town01", "Town02", "Town03", "Town04", "Town05", "Town10HD"];

/// Blueprints whose id matches `pattern`, in catalog order.
pub fn filter(pattern: &str) -> Vec<Blueprint> {
    BLUEPRINT_IDS
        .iter()
        .map(|&id| Blueprint::new(id))
        .filter(|blueprint| blueprint.matches(pattern))
        .collect()
}
