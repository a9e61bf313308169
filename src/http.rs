use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Process-wide HTTP client shared by the TON data client and the reasoning
/// provider client. `Client::clone()` is an `Arc` increment, so handing out
/// clones is free and every caller reuses one connection pool.
///
/// Auth headers differ between upstreams and are attached per-request; the
/// per-call timeouts configured in `Config` override the outer cap here.
static SHARED_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(120))
        .build()
        .expect("Failed to create shared HTTP client")
});

pub fn shared_client() -> &'static Client {
    &SHARED_CLIENT
}
