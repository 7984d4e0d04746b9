use crate::server::FloodGuardConfig;
use crate::server::session::PeerIpKeyExtractor;
use tower_governor::governor::GovernorConfigBuilder;

/// Transport-level flood guard: roughly `burst_per_minute` requests per
/// peer IP per minute, independent of the per-session analysis quota.
/// Returns `None` for a zero burst.
pub fn get_governor_conf(burst_per_minute: u32) -> Option<FloodGuardConfig> {
    if burst_per_minute == 0 {
        return None;
    }

    GovernorConfigBuilder::default()
        .per_millisecond((60_000 / burst_per_minute as u64).max(1))
        .burst_size(burst_per_minute)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_governor_conf() {
        assert!(get_governor_conf(0).is_none());
        assert!(get_governor_conf(120).is_some());
        assert!(get_governor_conf(1_000_000).is_some());
    }
}
