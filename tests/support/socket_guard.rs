//! Skips wiremock integration tests in sandboxes that forbid binding localhost.
//!
//! Set `MEDIABOT_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "MEDIABOT_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` when localhost sockets are unavailable.
#[allow(dead_code)]
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let location = Location::caller();
    let can_bind = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if can_bind {
            return Some(MockServer::start().await);
        }
        let message = format!(
            "[socket-bound-test] cannot bind localhost at {}:{}",
            location.file(),
            location.line()
        );
        assert!(!sockets_required(), "{message}; unset {REQUIRE_ENV} to allow skipping");
        eprintln!("{message}; skipping");
        None
    }
}
