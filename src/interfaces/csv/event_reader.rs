use crate::domain::session::RecognitionMethod;
use crate::error::{ParkingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Register,
    Remove,
    Topup,
    Entry,
    Exit,
    Capture,
}

/// One simulated gate event. Columns not relevant to the action are
/// left blank in the CSV and deserialize to `None`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct GateEvent {
    pub action: EventAction,
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub user: Option<u32>,
    #[serde(default)]
    pub lot: Option<u32>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub method: Option<RecognitionMethod>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Reads gate events from a CSV source.
///
/// Wraps `csv::Reader` and provides an iterator over
/// `Result<GateEvent>`, with whitespace trimming and flexible record
/// lengths, so large event files stream without loading into memory.
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn events(self) -> impl Iterator<Item = Result<GateEvent>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ParkingError::from))
    }
}
