#![no_main]

//! Builds connection strings from known keys with arbitrary values, so the
//! fuzzer spends its time on value parsing rather than on finding key names.

use arbitrary::Arbitrary;
use connmgr_driver::ConnectionConfig;
use libfuzzer_sys::fuzz_target;

const KEYS: &[&str] = &[
    "Host",
    "Server",
    "Port",
    "User",
    "Uid",
    "Password",
    "Database",
    "Initial Catalog",
    "Charset",
    "Time Zone",
    "Autocommit",
    "Connect Timeout",
];

#[derive(Debug, Arbitrary)]
struct Field {
    key: u8,
    value: String,
}

fuzz_target!(|fields: Vec<Field>| {
    let conn_str: String = fields
        .iter()
        .map(|f| format!("{}={};", KEYS[f.key as usize % KEYS.len()], f.value))
        .collect();

    if let Ok(config) = ConnectionConfig::from_connection_string(&conn_str) {
        assert!(format!("{config:?}").contains("password: \"[REDACTED]\""));
    }
});
