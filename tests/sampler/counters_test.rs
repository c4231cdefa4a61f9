/*!
 * Counter Sampling Tests
 * Config-driven samplers over fixture counter files
 */

use mempressure::core::limits::{ENV_GPU_BASELINE, ENV_GPU_SOURCE, MB};
use mempressure::{
    GpuCounter, GpuReader, MapSource, MemoryDiagnostics, MemoryLimits, MonitorConfig,
    ProcfsSampler, Threshold, UsageSource,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_gpu_source_and_baseline_from_config() {
    let dir = TempDir::new().unwrap();
    let gpu = write(&dir, "gpu_mem", &format!("{}\n", 48 * MB));

    let config = MonitorConfig::from_source(
        &MapSource::new()
            .with(ENV_GPU_SOURCE, gpu.to_string_lossy())
            .with(ENV_GPU_BASELINE, "16M"),
    );
    assert_eq!(config.gpu_counter, GpuCounter::Scalar(gpu.clone()));
    assert_eq!(config.gpu_baseline, Some(16 * MB));

    let sampler = ProcfsSampler::new(&config);
    assert_eq!(sampler.sample_gpu_memory(), 32 * MB);

    fs::write(&gpu, format!("{}\n", 80 * MB)).unwrap();
    assert_eq!(sampler.sample_gpu_memory(), 64 * MB);
}

#[test]
fn test_launch_baseline_captured_when_unset() {
    let dir = TempDir::new().unwrap();
    let gpu = write(&dir, "gpu_mem", &format!("{}\n", 20 * MB));
    let status = write(&dir, "status", "VmRSS:\t10240 kB\nVmSwap:\t0 kB\n");
    let statm = write(&dir, "statm", "0 0 0\n");

    let reader = GpuReader::new(GpuCounter::Scalar(gpu.clone()), None);
    let sampler = ProcfsSampler::with_paths(&status, &statm, reader);
    assert_eq!(sampler.sample_gpu_memory(), 0);

    fs::write(&gpu, format!("{}\n", 25 * MB)).unwrap();
    assert_eq!(sampler.sample_gpu_memory(), 5 * MB);
}

#[test]
fn test_vendor_table_through_diagnostics() {
    let dir = TempDir::new().unwrap();
    let table = write(
        &dir,
        "core",
        "idx name  MB   used peak\n\
         0   MAIN  128  40   41\n\
         1   GFX   400  50   60\n",
    );
    let status = write(&dir, "status", "Name:\tWPEWebProcess\nVmRSS:\t 81920 kB\nVmSwap:\t 20480 kB\n");
    let statm = write(&dir, "statm", "30000 20480 512 10 0 9000 0\n");

    let reader = GpuReader::new(GpuCounter::Table(table), Some(0));
    let sampler = Arc::new(ProcfsSampler::with_paths(&status, &statm, reader));
    assert_eq!(sampler.sample_gpu_memory(), 200 * MB);
    assert_eq!(sampler.gpu_total_bytes(), Some(400 * MB));

    let diagnostics = MemoryDiagnostics::new(
        sampler,
        MemoryLimits {
            process: Some(Threshold::from_critical(200 * MB)),
            gpu: Some(Threshold::from_critical(250 * MB)),
        },
    );
    let snapshot = diagnostics.snapshot();
    assert_eq!(snapshot.used_ram_mb, 100);
    assert_eq!(snapshot.used_gfx_mb, 200);
    assert_eq!(snapshot.used_ram_percent, Some(50));
    assert_eq!(snapshot.used_gfx_percent, Some(80));
    assert_eq!(snapshot.total_gfx_mb, Some(400));
}

#[test]
fn test_missing_counters_read_as_zero() {
    let config = MonitorConfig::from_source(
        &MapSource::new().with(ENV_GPU_SOURCE, "/nonexistent/brcm/core"),
    );
    let sampler = ProcfsSampler::new(&config);
    assert_eq!(sampler.sample_gpu_memory(), 0);
    assert_eq!(sampler.gpu_total_bytes(), None);
}
