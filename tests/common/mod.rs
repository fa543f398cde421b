use parkgate::application::gate::ParkingGate;
use parkgate::application::settlement::SettlementEngine;
use parkgate::application::tracker::SessionTracker;
use parkgate::domain::fees::FeeSchedule;
use parkgate::infrastructure::in_memory::InMemoryParkingStore;
use parkgate::infrastructure::recognition::FixedPlateRecognizer;

/// Wires a gate over a shared in-memory store with the default fee
/// schedule and the stub recognizer.
pub fn gate_with(store: &InMemoryParkingStore) -> ParkingGate {
    let tracker = SessionTracker::new(Box::new(store.clone()), Box::new(store.clone()));
    let settlement = SettlementEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        FeeSchedule::default(),
    );
    ParkingGate::new(
        Box::new(store.clone()),
        tracker,
        settlement,
        Box::new(FixedPlateRecognizer::demo()),
        Box::new(store.clone()),
    )
}
