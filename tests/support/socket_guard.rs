use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "SPEC_FETCH_REQUIRE_SOCKET_TESTS";

/// Whether a missing loopback socket should fail the run instead of skipping.
#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a wiremock server, or returns `None` (after logging why) in sandboxes
/// that forbid binding 127.0.0.1.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    let loopback_available = TcpListener::bind("127.0.0.1:0").is_ok();

    async move {
        if loopback_available {
            return Some(MockServer::start().await);
        }

        let message = format!(
            "no loopback socket for mock upstream ({}:{})",
            caller.file(),
            caller.line()
        );
        assert!(
            !socket_tests_required(),
            "{message}; unset {REQUIRE_ENV} to skip instead"
        );
        eprintln!("{message}; skipping. Set {REQUIRE_ENV}=1 to fail instead.");
        None
    }
}
