/// Window key for one client within one limit tier.
pub fn rate_window_key(tier: &str, client: &str) -> String {
    format!("{}:{}", tier, client)
}
