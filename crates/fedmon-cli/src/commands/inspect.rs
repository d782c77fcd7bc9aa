//! `fedmon inspect` — summarize the local store.

use serde::Serialize;

use fedmon_core::store::{Batch, Epoch, LocalStore, StoreCounts};
use fedmon_core::{MonitorConfig, StoreError};

#[derive(Serialize)]
struct EpochView {
    #[serde(flatten)]
    epoch: Epoch,
    batches: Vec<Batch>,
}

#[derive(Serialize)]
struct StoreView {
    counts: StoreCounts,
    first_measurement: Option<String>,
    last_measurement: Option<String>,
    epochs: Vec<EpochView>,
}

pub fn run(config: &MonitorConfig, json: bool) {
    let rt = super::runtime();
    let store = super::open_store(&rt, config);
    let view = match rt.block_on(collect(&store)) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error reading {}: {e}", config.local_db.display());
            std::process::exit(1);
        }
    };
    rt.block_on(store.close());

    if json {
        match serde_json::to_string_pretty(&view) {
            Ok(j) => println!("{j}"),
            Err(e) => {
                eprintln!("Error serializing store contents: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("Local store: {}", config.local_db.display());
    println!("  Measurements: {}", view.counts.measurements);
    if let (Some(first), Some(last)) = (&view.first_measurement, &view.last_measurement) {
        println!("    from {first}");
        println!("    to   {last}");
    }
    println!("  Epochs:       {}", view.counts.epochs);
    println!("  Batches:      {}", view.counts.batches);
    if view.epochs.is_empty() {
        return;
    }
    println!();
    println!(
        "  {:>5} {:>6} {:>6} {:>8}  {:<23}  {:<23}",
        "id", "epoch", "round", "batches", "start", "end"
    );
    for e in &view.epochs {
        println!(
            "  {:>5} {:>6} {:>6} {:>8}  {:<23}  {:<23}",
            e.epoch.id,
            e.epoch.epoch_number,
            e.epoch.cir_id,
            e.batches.len(),
            e.epoch.start_time,
            e.epoch.end_time
        );
    }
}

async fn collect(store: &LocalStore) -> Result<StoreView, StoreError> {
    let counts = store.counts().await?;
    let span = store.measurement_span().await?;
    let mut epochs = Vec::new();
    for epoch in store.epochs().await? {
        let batches = store.batches_for_epoch(epoch.id).await?;
        epochs.push(EpochView { epoch, batches });
    }
    let (first_measurement, last_measurement) = match span {
        Some((first, last)) => (Some(first), Some(last)),
        None => (None, None),
    };
    Ok(StoreView {
        counts,
        first_measurement,
        last_measurement,
        epochs,
    })
}
