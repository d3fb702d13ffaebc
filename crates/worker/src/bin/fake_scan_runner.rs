//! Test-only fixture: stands in for a compiled `scan-runner` so
//! `tests/integration.rs` can drive every child outcome (`ok`, `err`,
//! timeout, crash) without a real scanning engine. Selected by the
//! `FAKE_SCAN_RUNNER_MODE` env var; never spawned outside the test suite.

use std::io::Read;

fn main() {
    // Drain the sub-job off stdin so the worker's write doesn't block on a
    // full pipe; the fixture doesn't need to look at its contents.
    let mut input = String::new();
    let _ = std::io::stdin().read_to_string(&mut input);

    match std::env::var("FAKE_SCAN_RUNNER_MODE").as_deref() {
        Ok("ok") => {
            let messages =
                std::env::var("FAKE_SCAN_RUNNER_MESSAGES").unwrap_or_else(|_| "[]".to_string());
            println!("{{\"ok\":true,\"messages\":{messages}}}");
        }
        Ok("err") => {
            let message = std::env::var("FAKE_SCAN_RUNNER_ERROR")
                .unwrap_or_else(|_| "engine failed".to_string());
            let escaped = message.replace('\\', "\\\\").replace('"', "\\\"");
            println!("{{\"ok\":false,\"error\":{{\"message\":\"{escaped}\"}}}}");
        }
        Ok("crash") => {
            std::process::exit(7);
        }
        Ok("hang") => loop {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        },
        _ => std::process::exit(1),
    }
}
