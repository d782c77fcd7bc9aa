//! `fedmon purge` — empty the local store.

use fedmon_core::MonitorConfig;

pub fn run(config: &MonitorConfig) {
    let rt = super::runtime();
    let store = super::open_store(&rt, config);
    match rt.block_on(store.purge()) {
        Ok(purged) if purged.is_empty() => println!("Local store already empty."),
        Ok(purged) => println!(
            "Deleted {} measurements, {} epochs, {} batches from {}",
            purged.measurements,
            purged.epochs,
            purged.batches,
            config.local_db.display()
        ),
        Err(e) => {
            eprintln!("Error purging {}: {e}", config.local_db.display());
            std::process::exit(1);
        }
    }
    rt.block_on(store.close());
}
