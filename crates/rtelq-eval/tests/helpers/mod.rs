//! Shared fixtures for integration tests.

use serde_json::{json, Value};

use rtelq_eval::{CorrelationOptions, FuzzyConfig};

pub fn sample_flows() -> Vec<Value> {
    vec![
        json!({
            "source": {"ip": "10.0.0.1"},
            "destination": {"ip": "93.184.216.34", "port": 443, "country": "US"},
            "protocol": "tcp",
            "bytes": 2_500_000,
            "block": false,
            "ts": 1_705_312_200,
            "device": {"id": "dev-1", "name": "office-laptop", "ip": "10.0.0.1"}
        }),
        json!({
            "source": {"ip": "10.0.0.2"},
            "destination": {"ip": "203.0.113.9", "port": 53, "country": "DE"},
            "protocol": "udp",
            "bytes": 1_200,
            "block": true,
            "ts": 1_705_312_260,
            "device": {"id": "dev-2", "name": "phone", "ip": "10.0.0.2"}
        }),
        json!({
            "source": {"ip": "192.168.1.50"},
            "destination": {"ip": "198.51.100.7", "port": 22, "country": "US"},
            "protocol": "tcp",
            "bytes": 48_000,
            "block": false,
            "ts": 1_705_315_800,
            "device": {"id": "dev-3", "name": "nas", "ip": "192.168.1.50"}
        }),
    ]
}

pub fn sample_alarms() -> Vec<Value> {
    vec![
        json!({
            "device": {"ip": "10.0.0.1", "name": "office-laptop"},
            "remote": {"ip": "93.184.216.34", "country": "US"},
            "severity": "high",
            "type": "intrusion",
            "resolved": false,
            "ts": 1_705_312_230
        }),
        json!({
            "device": {"ip": "10.0.0.77", "name": "guest"},
            "remote": {"ip": "203.0.113.50", "country": "CN"},
            "severity": "low",
            "type": "activity",
            "resolved": true,
            "ts": 1_705_390_000
        }),
    ]
}

pub fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn fuzzy_options() -> CorrelationOptions {
    CorrelationOptions {
        fuzzy: FuzzyConfig {
            enabled: true,
            ..FuzzyConfig::default()
        },
        ..CorrelationOptions::default()
    }
}
