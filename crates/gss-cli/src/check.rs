//! Conformance battery: write every supported kind, read it back, expect
//! one `Changed` per write, and expect an unknown key to fault.

use std::collections::BTreeMap;
use std::time::Duration;

use gss_sdk::{GameStateClient, SdkResult, TypedValue};

/// Key that must never be set by the battery.
pub const MISSING_KEY: &str = "SAMPLE_NOTFOUND";

pub fn samples() -> Vec<(&'static str, TypedValue)> {
    vec![
        ("SAMPLE_001", TypedValue::Bool(true)),
        ("SAMPLE_002", TypedValue::Int64(10)),
        ("SAMPLE_003", TypedValue::Double(0.10)),
        ("SAMPLE_004", TypedValue::String("STRING".into())),
        ("SAMPLE_005", TypedValue::IntSequence(vec![1, 2, 3])),
        (
            "SAMPLE_006",
            TypedValue::StringSequence(vec!["1".into(), "2".into(), "3".into()]),
        ),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Probe {
    /// Set followed by Get.
    RoundTrip,
    /// Get on a key that was never set.
    Missing,
    /// The Changed signal for a Set.
    Signal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckLine {
    pub key: String,
    pub probe: Probe,
    pub passed: bool,
    pub detail: String,
}

#[derive(Clone, Debug, Default)]
pub struct CheckReport {
    pub lines: Vec<CheckLine>,
}

impl CheckReport {
    pub fn failures(&self) -> usize {
        self.lines.iter().filter(|l| !l.passed).count()
    }

    pub fn passed(&self) -> bool {
        self.failures() == 0
    }

    fn record(&mut self, key: &str, probe: Probe, passed: bool, detail: String) {
        self.lines.push(CheckLine {
            key: key.to_string(),
            probe,
            passed,
            detail,
        });
    }
}

/// Run the battery. Transport failures abort with an error; every
/// behavioural mismatch is recorded as a failed line instead.
pub async fn run_check(client: &GameStateClient, signal_timeout: Duration) -> SdkResult<CheckReport> {
    let mut report = CheckReport::default();
    let samples = samples();
    let keys: Vec<String> = samples.iter().map(|(k, _)| k.to_string()).collect();
    let mut changes = client.subscribe(Some(keys)).await?;

    for (key, value) in &samples {
        client.set(key, value).await?;
        match client.get(key).await {
            Ok(read) if read == *value => report.record(key, Probe::RoundTrip, true, read.to_string()),
            Ok(read) => report.record(key, Probe::RoundTrip, false, format!("expected {value}, got {read}")),
            Err(e) => report.record(key, Probe::RoundTrip, false, e.to_string()),
        }
    }

    match client.get(MISSING_KEY).await {
        Err(e) if e.is_key_not_found() => report.record(MISSING_KEY, Probe::Missing, true, e.to_string()),
        Err(e) => report.record(MISSING_KEY, Probe::Missing, false, e.to_string()),
        Ok(value) => report.record(MISSING_KEY, Probe::Missing, false, format!("unexpected value {value}")),
    }

    let mut outstanding: BTreeMap<&str, &TypedValue> =
        samples.iter().map(|(k, v)| (*k, v)).collect();
    while !outstanding.is_empty() {
        let change = match tokio::time::timeout(signal_timeout, changes.recv()).await {
            Ok(Some(change)) => change,
            Ok(None) | Err(_) => break,
        };
        if let Some(expected) = outstanding.remove(change.key.as_str()) {
            let passed = change.value == *expected;
            let detail = if passed {
                format!("#{}", change.sequence)
            } else {
                format!("expected {expected}, got {}", change.value)
            };
            report.record(&change.key, Probe::Signal, passed, detail);
        }
    }
    for key in outstanding.keys() {
        report.record(key, Probe::Signal, false, "no Changed signal".into());
    }

    client.unsubscribe().await?;
    Ok(report)
}
