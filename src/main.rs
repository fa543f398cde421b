use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, miette};
use parkgate::application::gate::ParkingGate;
use parkgate::application::settlement::SettlementEngine;
use parkgate::application::tracker::SessionTracker;
use parkgate::domain::fees::FeeSchedule;
use parkgate::domain::money::Amount;
use parkgate::domain::ports::{
    AuditLog, LedgerStore, SessionStore, SettlementStore, VehicleStore, WalletStore,
};
use parkgate::domain::vehicle::{LotId, PlateNumber, UserId, VehicleId};
use parkgate::error::ParkingError;
use parkgate::infrastructure::in_memory::InMemoryParkingStore;
use parkgate::infrastructure::recognition::RecognizerConfig;
use parkgate::interfaces::csv::event_reader::{EventAction, EventReader, GateEvent};
use parkgate::interfaces::csv::report_writer::{LedgerRow, ReportWriter, SessionRow, WalletRow};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input gate events CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Default flat fee per completed session (VND)
    #[arg(long, default_value = "2000")]
    default_fee: Decimal,

    /// Per-lot fee override as LOT=FEE (repeatable)
    #[arg(long = "lot-fee", value_parser = parse_lot_fee)]
    lot_fee: Vec<(u32, Decimal)>,

    /// Which report to print to stdout after processing
    #[arg(long, value_enum, default_value = "sessions")]
    report: Report,

    /// Run plate recognition through an external inference command
    /// instead of the fixed-response stub
    #[arg(long)]
    use_ml: bool,

    /// Inference program to spawn (with --use-ml)
    #[arg(long, default_value = "python")]
    ml_program: String,

    /// Argument for the inference program (repeatable)
    #[arg(long = "ml-arg")]
    ml_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Report {
    Sessions,
    Wallets,
    Ledger,
}

fn parse_lot_fee(s: &str) -> Result<(u32, Decimal), String> {
    let (lot, fee) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LOT=FEE, got '{s}'"))?;
    let lot = lot.trim().parse().map_err(|e| format!("invalid lot: {e}"))?;
    let fee = fee.trim().parse().map_err(|e| format!("invalid fee: {e}"))?;
    Ok((lot, fee))
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(db_path) = cli.db_path.clone() {
        #[cfg(feature = "storage-rocksdb")]
        {
            let store =
                parkgate::infrastructure::rocksdb::RocksDbParkingStore::open(db_path)
                    .into_diagnostic()?;
            return run(store, cli).await;
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        {
            let _ = db_path;
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
        }
    }

    run(InMemoryParkingStore::new(), cli).await
}

async fn run<S>(store: S, cli: Cli) -> miette::Result<()>
where
    S: VehicleStore
        + SessionStore
        + WalletStore
        + LedgerStore
        + SettlementStore
        + AuditLog
        + Clone
        + 'static,
{
    let default_fee = Amount::new(cli.default_fee)
        .map_err(|e| miette!("invalid --default-fee: {e}"))?;
    let mut fees = FeeSchedule::new(default_fee);
    for (lot, fee) in &cli.lot_fee {
        let fee = Amount::new(*fee).map_err(|e| miette!("invalid --lot-fee: {e}"))?;
        fees.set_lot_fee(LotId(*lot), fee);
    }

    let recognizer = if cli.use_ml {
        RecognizerConfig::Command {
            program: cli.ml_program.clone(),
            args: cli.ml_args.clone(),
        }
    } else {
        RecognizerConfig::Stub
    }
    .into_recognizer();

    let tracker = SessionTracker::new(Box::new(store.clone()), Box::new(store.clone()));
    let settlement = SettlementEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store.clone()),
        fees,
    );
    let gate = ParkingGate::new(
        Box::new(store.clone()),
        tracker,
        settlement,
        recognizer,
        Box::new(store.clone()),
    );

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    for event in reader.events() {
        match event {
            Ok(event) => {
                if let Err(e) = apply_event(&gate, event).await {
                    // Expected negative outcomes (duplicate camera
                    // triggers, exits without entry) are routine.
                    match e {
                        ParkingError::AlreadyCheckedIn
                        | ParkingError::NoOpenSession
                        | ParkingError::VehicleNotFound(_)
                        | ParkingError::VehicleInUse(_) => {
                            tracing::warn!(error = %e, "event rejected");
                        }
                        _ => tracing::error!(error = %e, "error processing event"),
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "error reading event"),
        }
    }

    write_report(&store, cli.report).await.into_diagnostic()
}

async fn apply_event(gate: &ParkingGate, event: GateEvent) -> parkgate::error::Result<()> {
    let lot = event.lot.map(LotId);
    match event.action {
        EventAction::Register => {
            let plate = required_plate(&event)?;
            let user = required_user(&event)?;
            gate.register_vehicle(plate, user).await?;
        }
        EventAction::Remove => {
            let plate = required_plate(&event)?;
            gate.remove_vehicle(&plate).await?;
        }
        EventAction::Topup => {
            let user = required_user(&event)?;
            let amount = event.amount.ok_or_else(|| {
                ParkingError::ValidationError("topup event requires an amount".to_string())
            })?;
            gate.top_up(user, Amount::new(amount)?).await?;
        }
        EventAction::Entry => {
            let plate = required_plate(&event)?;
            let method = event.method.unwrap_or_default();
            gate.report_entry(&plate, lot, method).await?;
        }
        EventAction::Exit => {
            let plate = required_plate(&event)?;
            gate.report_exit(&plate, lot).await?;
        }
        EventAction::Capture => {
            let image_path = event.image.as_deref().ok_or_else(|| {
                ParkingError::ValidationError("capture event requires an image path".to_string())
            })?;
            let image = std::fs::read(image_path)?;
            gate.report_capture(&image, lot).await?;
        }
    }
    Ok(())
}

fn required_plate(event: &GateEvent) -> parkgate::error::Result<PlateNumber> {
    let plate = event.plate.as_deref().ok_or_else(|| {
        ParkingError::ValidationError("event requires a license plate".to_string())
    })?;
    PlateNumber::new(plate)
}

fn required_user(event: &GateEvent) -> parkgate::error::Result<UserId> {
    event.user.map(UserId).ok_or_else(|| {
        ParkingError::ValidationError("event requires a user id".to_string())
    })
}

async fn write_report<S>(store: &S, report: Report) -> parkgate::error::Result<()>
where
    S: VehicleStore + SessionStore + WalletStore + LedgerStore,
{
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());

    match report {
        Report::Sessions => {
            let plates: HashMap<VehicleId, PlateNumber> = VehicleStore::all(store)
                .await?
                .into_iter()
                .map(|v| (v.id, v.plate))
                .collect();
            let sessions = SessionStore::all(store).await?;
            let rows = sessions.iter().map(|s| {
                let plate = plates.get(&s.vehicle_id).map(|p| p.as_str()).unwrap_or("-");
                SessionRow::new(s, plate)
            });
            writer.write_sessions(rows)?;
        }
        Report::Wallets => {
            let wallets = WalletStore::all(store).await?;
            writer.write_wallets(wallets.iter().map(WalletRow::from))?;
        }
        Report::Ledger => {
            let entries = LedgerStore::all(store).await?;
            writer.write_ledger(entries.iter().map(LedgerRow::from))?;
        }
    }
    Ok(())
}
