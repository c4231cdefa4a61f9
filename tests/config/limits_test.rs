/*!
 * Limit Resolution Tests
 * Budget lists, pattern matching and the resolve-once latch
 */

use mempressure::config::parse::match_process_limit;
use mempressure::config::{parse_byte_value, parse_limit_list};
use mempressure::core::limits::{ENV_GPU_LIMIT, ENV_PROCESS_LIMITS, KB, MB};
use mempressure::{ConfigSource, LimitConfigurator, MapSource, Threshold};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

struct CountingSource {
    inner: MapSource,
    lookups: AtomicUsize,
}

impl ConfigSource for CountingSource {
    fn get(&self, key: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }
}

fn configurator(limits: &str, gpu: Option<&str>, name: &str) -> LimitConfigurator {
    let mut source = MapSource::new().with(ENV_PROCESS_LIMITS, limits);
    if let Some(gpu) = gpu {
        source = source.with(ENV_GPU_LIMIT, gpu);
    }
    LimitConfigurator::with_process_name(Arc::new(source), name)
}

#[test]
fn test_first_matching_entry_wins() {
    let entries = parse_limit_list("Web*:200M,WebProcess:100M");
    assert_eq!(match_process_limit(&entries, "webprocess"), Some(200 * MB));

    let entries = parse_limit_list("WebProcess:100M,Web*:200M");
    assert_eq!(match_process_limit(&entries, "webprocess"), Some(100 * MB));
}

#[test]
fn test_full_path_argv_matches_basename_pattern() {
    let c = configurator(
        "WPENetworkProcess:50M,WPEWebProcess:300M",
        None,
        "/usr/libexec/wpe-webkit-1.1/WPEWebProcess",
    );
    assert_eq!(c.resolve_process_limits(), Some(Threshold::from_critical(300 * MB)));
}

#[test]
fn test_malformed_entries_skipped() {
    let c = configurator("Broken:12Q,A:1:2,WPEWebProcess:64k", None, "WPEWebProcess");
    assert_eq!(c.resolve_process_limits().unwrap().critical_bytes, 64 * KB);
}

#[test]
fn test_no_match_disables_process_polling() {
    let c = configurator("WPENetworkProcess:50M", None, "WPEWebProcess");
    assert_eq!(c.resolve_process_limits(), None);
}

#[test]
fn test_gpu_limit_only_for_web_process() {
    let web = configurator("x:1M", Some("128M"), "/usr/bin/WPEWebProcess");
    assert_eq!(web.resolve_gpu_limits(), Some(Threshold::from_critical(128 * MB)));

    let network = configurator("x:1M", Some("128M"), "/usr/bin/WPENetworkProcess");
    assert_eq!(network.resolve_gpu_limits(), None);
}

#[test]
fn test_invalid_gpu_value_disables_gpu() {
    let c = configurator("x:1M", Some("lots"), "WPEWebProcess");
    assert_eq!(c.resolve_gpu_limits(), None);
}

#[test]
fn test_concurrent_first_resolution_evaluates_once() {
    let source = Arc::new(CountingSource {
        inner: MapSource::new()
            .with(ENV_PROCESS_LIMITS, "WPEWebProcess:100M")
            .with(ENV_GPU_LIMIT, "32M"),
        lookups: AtomicUsize::new(0),
    });
    let configurator = Arc::new(LimitConfigurator::with_process_name(
        source.clone(),
        "WPEWebProcess",
    ));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let configurator = Arc::clone(&configurator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                configurator.resolve()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));

    // One lookup per key, regardless of how many callers raced
    assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
    configurator.resolve();
    assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
}

proptest! {
    #[test]
    fn prop_non_critical_is_95_percent(critical in 0u64..(1u64 << 48)) {
        let threshold = Threshold::from_critical(critical);
        prop_assert_eq!(threshold.non_critical_bytes, (critical as f64 * 0.95) as u64);
        prop_assert!(threshold.non_critical_bytes <= threshold.critical_bytes);
        prop_assert!(threshold.synchronous_bytes() >= threshold.critical_bytes);
    }

    #[test]
    fn prop_suffixes_scale(value in 0u64..(1u64 << 30)) {
        prop_assert_eq!(parse_byte_value(&value.to_string()).unwrap(), value);
        prop_assert_eq!(parse_byte_value(&format!("{value}k")).unwrap(), value * KB);
        prop_assert_eq!(parse_byte_value(&format!("{value}M")).unwrap(), value * MB);
    }
}
