#![no_main]

use connmgr_driver::ConnectionConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = ConnectionConfig::from_connection_string(s) {
            // Anything that parses must produce usable session set-up
            let statements = config.session_statements();
            assert!(statements.last().is_some_and(|s| s.starts_with("SET autocommit")));
            let _ = config.endpoint();
        }
    }
});
