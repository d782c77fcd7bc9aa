//! `fedmon sync` — transfer the local store to the remote database.

use fedmon_core::upload::{self, TransferReport};
use fedmon_core::{MemoryRemote, MonitorConfig, PurgePolicy, TransferError};

pub fn run(config: &MonitorConfig, client_id: i32, dry_run: bool) {
    let rt = super::runtime();
    let store = super::open_store(&rt, config);

    let result: Result<TransferReport, TransferError> = if dry_run {
        let remote = MemoryRemote::new();
        let report = rt.block_on(upload::transfer(&store, remote.clone(), client_id));
        if report.is_ok() {
            match serde_json::to_string_pretty(&remote.tables()) {
                Ok(j) => println!("{j}"),
                Err(e) => eprintln!("Warning: cannot render dry-run rows: {e}"),
            }
        }
        report
    } else {
        println!("Syncing to {} as client {client_id}", config.remote.endpoint());
        rt.block_on(upload::transfer_to_postgres(&store, &config.remote, client_id))
    };

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: transfer failed: {e}");
            eprintln!("Local records were kept.");
            std::process::exit(1);
        }
    };

    println!("Transferred");
    println!("  Epochs:       {}", report.epochs);
    println!("  Batches:      {}", report.batches);
    println!("  Measurements: {}", report.measurements);
    if report.null_timestamps > 0 {
        println!("  NULL times:   {}", report.null_timestamps);
    }

    if !dry_run && config.purge_policy == PurgePolicy::OnConfirmedSync {
        match rt.block_on(store.purge_through(&report.through)) {
            Ok(purged) => println!(
                "Purged sent records ({} measurements, {} epochs, {} batches)",
                purged.measurements, purged.epochs, purged.batches
            ),
            Err(e) => {
                eprintln!("Error purging after sync: {e}");
                std::process::exit(1);
            }
        }
    }
    rt.block_on(store.close());
}
