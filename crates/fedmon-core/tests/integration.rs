//! Integration tests for fedmon-core.
//!
//! These tests drive the whole pipeline:
//! fixture sysfs tree → sampler → writer → local store → upload → remote.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use fedmon_core::{
    BatchTiming, MemoryRemote, Monitor, MonitorConfig, ProbeConfig, PurgePolicy, format_stored,
};

fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_milli_opt(h, m, s, ms)
        .unwrap()
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A two-core device with a battery at 64% and an Adreno-style GPU node.
fn fixture_tree(root: &Path) -> ProbeConfig {
    let proc_root = root.join("proc");
    let sys_root = root.join("sys");
    write(
        &proc_root.join("stat"),
        "cpu  200 0 100 700 0 0 0 0 0 0\n\
         cpu0 100 0 50 350 0 0 0 0 0 0\n\
         cpu1 100 0 50 350 0 0 0 0 0 0\n\
         intr 12345\n",
    );
    write(
        &proc_root.join("meminfo"),
        "MemTotal:        4000000 kB\nMemFree:          500000 kB\nMemAvailable:    1000000 kB\n",
    );
    let cpu0 = sys_root.join("devices/system/cpu/cpu0/cpufreq");
    write(&cpu0.join("scaling_cur_freq"), "1804800\n");
    write(&cpu0.join("scaling_governor"), "schedutil\n");
    let gpu = sys_root.join("kernel/gpu");
    write(&gpu.join("gpu_busy"), "37 %\n");
    write(&gpu.join("gpu_clock"), "585\n");
    let bat = sys_root.join("class/power_supply/battery");
    write(&bat.join("type"), "Battery\n");
    write(&bat.join("capacity"), "64\n");
    write(&bat.join("power_now"), "2500000\n");
    ProbeConfig {
        proc_root,
        sys_root,
    }
}

fn config(root: &Path, policy: PurgePolicy) -> MonitorConfig {
    MonitorConfig {
        local_db: root.join("fedmon.sqlite3"),
        sample_interval_ms: 10,
        purge_policy: policy,
        probe: fixture_tree(root),
        ..MonitorConfig::default()
    }
}

fn wait_for_measurements(monitor: &Monitor, n: i64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        monitor.settle().unwrap();
        if monitor.counts().unwrap().measurements >= n {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("fewer than {n} measurements after 10s");
}

#[test]
fn training_round_reaches_remote_with_remote_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = Monitor::start(config(dir.path(), PurgePolicy::OnStart)).unwrap();

    let recorder = monitor.recorder();
    recorder.start_epoch(at(10, 0, 0, 0), 1, 7);
    recorder.write_batch(
        BatchTiming {
            start: at(10, 0, 1, 0),
            end: at(10, 0, 2, 0),
            forward_pass: at(10, 0, 1, 250),
            backward_pass: at(10, 0, 1, 600),
            optimizer_step: at(10, 0, 1, 900),
        },
        0.42,
        1,
    );
    recorder.end_epoch(at(10, 0, 3, 0));

    wait_for_measurements(&monitor, 2);
    monitor.stop();

    let remote = MemoryRemote::new();
    let report = monitor.transfer_with(remote.clone(), 3).unwrap();
    assert_eq!(report.epochs, 1);
    assert_eq!(report.batches, 1);
    assert!(report.measurements >= 2);
    assert_eq!(report.null_timestamps, 0);

    let tables = remote.tables();
    assert_eq!(tables.epochs.len(), 1);
    let (remote_epoch_id, epoch) = &tables.epochs[0];
    assert_eq!(epoch.epoch_number, 1);
    assert_eq!(epoch.cir_id, 7);
    assert_eq!(epoch.start_time, Some(at(10, 0, 0, 0)));
    assert_eq!(epoch.end_time, Some(at(10, 0, 3, 0)));

    assert_eq!(tables.batches.len(), 1);
    let batch = &tables.batches[0];
    assert_eq!(batch.epoch_id, *remote_epoch_id);
    assert_eq!(batch.loss, 0.42);
    assert_eq!(batch.batch_number, 1);
    assert_eq!(batch.frwd_pass_time, Some(at(10, 0, 1, 250)));

    assert!(tables.measurements.iter().all(|m| m.client_id == 3));
    let m = &tables.measurements[0];
    assert_eq!(m.battery_state, 64.0);
    assert_eq!(m.gpu_util, 37.0);
    assert_eq!(m.power_consumption, 2.5);
    assert_eq!(m.mem_util, 75.0);
    // Static tick counters: no time elapsed on any core.
    assert_eq!(m.cpu_util, 0.0);
}

#[test]
fn json_blobs_are_byte_identical_after_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = Monitor::start(config(dir.path(), PurgePolicy::OnStart)).unwrap();
    wait_for_measurements(&monitor, 1);
    monitor.stop();

    let remote = MemoryRemote::new();
    monitor.transfer_with(remote.clone(), 1).unwrap();
    let sent = remote.tables().measurements;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let local = rt.block_on(async {
        let store = fedmon_core::LocalStore::open(&dir.path().join("fedmon.sqlite3"))
            .await
            .unwrap();
        store.measurements().await.unwrap()
    });
    assert_eq!(local.len(), sent.len());
    for (l, r) in local.iter().zip(&sent) {
        assert_eq!(l.cpu_info, r.cpu_info);
        assert_eq!(l.gpu_info, r.gpu_info);
        assert_eq!(r.time.map(format_stored).as_deref(), Some(l.time.as_str()));
    }

    let cpu: serde_json::Value = serde_json::from_str(&sent[0].cpu_info).unwrap();
    assert_eq!(cpu[0]["cpu_cur_freq"], 1804800);
    assert_eq!(cpu[0]["cpu_cur_govern"], "schedutil");
    assert_eq!(cpu[1]["cpu_cur_freq"], 0);
    let gpu: serde_json::Value = serde_json::from_str(&sent[0].gpu_info).unwrap();
    assert_eq!(gpu["gpu_cur_clock"], 585);
}

#[test]
fn no_battery_means_no_measurements() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), PurgePolicy::OnStart);
    fs::remove_dir_all(cfg.probe.sys_root.join("class/power_supply")).unwrap();

    let mut monitor = Monitor::start(cfg).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    monitor.stop();
    assert_eq!(monitor.counts().unwrap().measurements, 0);
}

#[test]
fn residue_survives_restart_only_under_confirmed_sync() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = Monitor::start(config(dir.path(), PurgePolicy::OnConfirmedSync)).unwrap();
    wait_for_measurements(&first, 1);
    first.stop();
    let left = first.counts().unwrap().measurements;
    drop(first);

    // A long period means these runs never get past the baseline sweep.
    let mut keep = config(dir.path(), PurgePolicy::OnConfirmedSync);
    keep.sample_interval_ms = 60_000;
    let mut second = Monitor::start(keep).unwrap();
    second.stop();
    assert_eq!(second.counts().unwrap().measurements, left);
    drop(second);

    let mut purge = config(dir.path(), PurgePolicy::OnStart);
    purge.sample_interval_ms = 60_000;
    let mut third = Monitor::start(purge).unwrap();
    third.stop();
    assert!(third.counts().unwrap().is_empty());
}

#[test]
#[ignore] // Needs a live PostgreSQL. Run with: FEDMON_TEST_PG=1 cargo test -- --ignored
fn transfer_to_live_postgres() {
    if std::env::var("FEDMON_TEST_PG").is_err() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), PurgePolicy::OnStart);
    cfg.remote.password = std::env::var("FEDMON_REMOTE_PASSWORD").unwrap_or_default();
    cfg.remote.connect_timeout_secs = Some(10);

    let mut monitor = Monitor::start(cfg).unwrap();
    monitor.recorder().start_epoch(at(9, 0, 0, 0), 1, 1);
    monitor.recorder().end_epoch(at(9, 1, 0, 0));
    wait_for_measurements(&monitor, 1);
    monitor.stop();

    let report = monitor.transfer(1).unwrap();
    assert_eq!(report.epochs, 1);
    assert!(report.measurements >= 1);
}
