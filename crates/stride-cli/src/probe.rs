//! Backend reachability probes.
//!
//! Run before the interactive session starts to decide
//! whether the live HTTP clients or the offline simulators are used.

use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Probe `GET {base_url}{path}`.
///
/// Returns `Ok(())` for a 2xx answer, or `Err(reason)` when the service is
/// unreachable or unhealthy.
pub fn check(base_url: &str, path: &str) -> Result<(), String> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    let client = reqwest::blocking::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| format!("HTTP client unavailable: {}", e))?;
    let response = client
        .get(&url)
        .send()
        .map_err(|e| format!("unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("{} returned HTTP {}", url, response.status()));
    }
    Ok(())
}

/// `true` if the routing backend answers its health check.
pub fn routing_online(base_url: &str) -> bool {
    check(base_url, "/v2/health").is_ok()
}
