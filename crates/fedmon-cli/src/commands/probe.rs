//! `fedmon probe` — read the counters once and show the derived sample.

use fedmon_core::probe::{PlatformSnapshot, ResourceProbe, SysfsProbe};
use fedmon_core::sampler::SamplerState;
use fedmon_core::timestamp::now_local;
use fedmon_core::MonitorConfig;

pub fn run(config: &MonitorConfig, output: Option<&str>) {
    let mut probe = SysfsProbe::new(&config.probe);
    let mut state = SamplerState::new();

    // Utilization needs two sweeps one period apart.
    let first = probe.read();
    state.step(&first, now_local());
    std::thread::sleep(config.sample_interval());
    let snapshot = probe.read();
    let sample = state.step(&snapshot, now_local());

    print_snapshot(&snapshot);
    println!();
    match &sample {
        Some(m) => {
            println!("Sample ({}):", m.time);
            println!("  CPU:      {:.1}% (sum over cores)", m.cpu_util);
            println!("  Memory:   {:.1}%", m.mem_util);
            println!("  GPU:      {:.1}%", m.gpu_util);
            println!("  Battery:  {:.1}%", m.battery_state);
            println!("  Power:    {:.3} W", m.power_consumption);
        }
        None => println!("No sample: battery level unreadable, nothing would be recorded."),
    }

    if let Some(path) = output {
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("Error serializing snapshot: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("Error writing {path}: {e}");
            std::process::exit(1);
        }
        println!("\nSnapshot written to {path}");
    }
}

fn print_snapshot(snap: &PlatformSnapshot) {
    println!("Cores: {}", snap.cores.len());
    for core in &snap.cores {
        let freq = core
            .freq
            .cur_freq
            .map_or_else(|| "-".to_string(), |f| format!("{f} kHz"));
        let governor = core.freq.governor.as_deref().unwrap_or("-");
        println!("  cpu{:<3} {:>14}  {governor}", core.cpu, freq);
    }

    match snap.memory {
        Some(m) => println!(
            "Memory: {} MiB available of {} MiB",
            m.available / (1024 * 1024),
            m.total / (1024 * 1024)
        ),
        None => println!("Memory: unavailable"),
    }

    match &snap.gpu.busy {
        Some(busy) => println!(
            "GPU:    busy {busy}, clock {}",
            snap.gpu
                .cur_clock
                .map_or_else(|| "-".to_string(), |c| c.to_string())
        ),
        None => println!("GPU:    unavailable"),
    }

    match (snap.battery.level, snap.battery.scale) {
        (Some(level), Some(scale)) => println!("Battery: {level}/{scale}"),
        _ => println!("Battery: unavailable"),
    }
}
