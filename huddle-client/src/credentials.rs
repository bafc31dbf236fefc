use huddle_core::IceServerConfig;

/// Fetch time-limited relay connection parameters. The response is opaque
/// configuration for the connection backend; nothing here interprets how
/// the credentials were derived.
pub async fn fetch_ice_servers(base_url: &str) -> Result<Vec<IceServerConfig>, reqwest::Error> {
    let url = format!("{}/ice-servers", base_url.trim_end_matches('/'));
    reqwest::get(url).await?.error_for_status()?.json().await
}
