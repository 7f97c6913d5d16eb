//! Per-ticket-kind expiration policies.
//!
//! The policy set is built once from [`OAuthConfig`] at startup and is
//! read-only afterwards. Every ticket's `expires_at` is computed here and
//! nowhere else.

use std::time::Duration;

use time::OffsetDateTime;

use crate::config::OAuthConfig;
use crate::types::{SsoSession, TicketKind};

/// Lifetime rules for one ticket kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    time_to_kill: Duration,
    max_time_to_live: Option<Duration>,
    sovereign: bool,
}

impl ExpirationPolicy {
    /// A fixed lifetime.
    #[must_use]
    pub fn fixed(time_to_live: Duration) -> Self {
        Self {
            time_to_kill: time_to_live,
            max_time_to_live: None,
            sovereign: false,
        }
    }

    /// A lifetime capped by `max_time_to_live`.
    #[must_use]
    pub fn bounded(time_to_kill: Duration, max_time_to_live: Duration) -> Self {
        Self {
            time_to_kill,
            max_time_to_live: Some(max_time_to_live),
            sovereign: false,
        }
    }

    /// Pins the lifetime to the remaining life of the backing SSO session.
    #[must_use]
    pub fn sovereign(mut self, sovereign: bool) -> Self {
        self.sovereign = sovereign;
        self
    }

    /// Returns `true` if this policy is bounded by the SSO session.
    #[must_use]
    pub fn is_sovereign(&self) -> bool {
        self.sovereign
    }

    /// Nominal lifetime, ignoring any session.
    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        match self.max_time_to_live {
            Some(max) => self.time_to_kill.min(max),
            None => self.time_to_kill,
        }
    }

    /// Effective lifetime for a ticket derived from `session` at `now`.
    ///
    /// A sovereign policy never outlives the session.
    #[must_use]
    pub fn time_to_live_for(&self, session: Option<&SsoSession>, now: OffsetDateTime) -> Duration {
        let nominal = self.time_to_live();
        match session {
            Some(session) if self.sovereign => nominal.min(session.remaining(now)),
            _ => nominal,
        }
    }

    /// The absolute expiry for a ticket created at `now`.
    #[must_use]
    pub fn expires_at(&self, session: Option<&SsoSession>, now: OffsetDateTime) -> OffsetDateTime {
        now + self.time_to_live_for(session, now)
    }
}

/// The mapping from ticket kind to policy, plus device flow timing.
#[derive(Debug, Clone)]
pub struct ExpirationPolicySet {
    authorization_code: ExpirationPolicy,
    access_token: ExpirationPolicy,
    refresh_token: ExpirationPolicy,
    device_token: ExpirationPolicy,
    device_refresh_interval: Duration,
    user_code_length: usize,
}

impl ExpirationPolicySet {
    /// Builds the policy set from configuration.
    #[must_use]
    pub fn from_config(config: &OAuthConfig) -> Self {
        Self {
            authorization_code: ExpirationPolicy::fixed(config.code.time_to_kill),
            access_token: ExpirationPolicy::bounded(
                config.access_token.time_to_kill,
                config.access_token.max_time_to_live,
            )
            .sovereign(config.access_token.sovereign),
            refresh_token: ExpirationPolicy::fixed(config.refresh_token.time_to_kill)
                .sovereign(config.refresh_token.sovereign),
            device_token: ExpirationPolicy::fixed(config.device_token.time_to_kill),
            device_refresh_interval: config.device_token.refresh_interval,
            user_code_length: config.device_user_code.user_code_length,
        }
    }

    /// The policy for a ticket kind.
    ///
    /// User codes live exactly as long as their device code.
    #[must_use]
    pub fn policy(&self, kind: TicketKind) -> &ExpirationPolicy {
        match kind {
            TicketKind::AuthorizationCode => &self.authorization_code,
            TicketKind::AccessToken => &self.access_token,
            TicketKind::RefreshToken => &self.refresh_token,
            TicketKind::DeviceToken | TicketKind::DeviceUserCode => &self.device_token,
        }
    }

    /// Minimum spacing between device polls.
    #[must_use]
    pub fn device_refresh_interval(&self) -> Duration {
        self.device_refresh_interval
    }

    /// Length of generated user codes.
    #[must_use]
    pub fn user_code_length(&self) -> usize {
        self.user_code_length
    }
}

impl Default for ExpirationPolicySet {
    fn default() -> Self {
        Self::from_config(&OAuthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_ending_in(now: OffsetDateTime, secs: i64) -> SsoSession {
        SsoSession {
            id: "TGT-1".into(),
            expires_at: now + time::Duration::seconds(secs),
        }
    }

    #[test]
    fn test_bounded_policy_takes_minimum() {
        let policy = ExpirationPolicy::bounded(Duration::from_secs(7200), Duration::from_secs(3600));
        assert_eq!(policy.time_to_live(), Duration::from_secs(3600));

        let policy = ExpirationPolicy::bounded(Duration::from_secs(60), Duration::from_secs(3600));
        assert_eq!(policy.time_to_live(), Duration::from_secs(60));
    }

    #[test]
    fn test_sovereign_policy_never_outlives_session() {
        let now = OffsetDateTime::now_utc();
        let session = session_ending_in(now, 600);
        let policy = ExpirationPolicy::fixed(Duration::from_secs(7200)).sovereign(true);

        assert_eq!(
            policy.time_to_live_for(Some(&session), now),
            Duration::from_secs(600)
        );
        assert!(policy.expires_at(Some(&session), now) <= session.expires_at);
    }

    #[test]
    fn test_sovereign_policy_keeps_shorter_nominal_ttl() {
        let now = OffsetDateTime::now_utc();
        let session = session_ending_in(now, 86_400);
        let policy = ExpirationPolicy::fixed(Duration::from_secs(60)).sovereign(true);
        assert_eq!(
            policy.time_to_live_for(Some(&session), now),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_sovereign_policy_with_ended_session_is_zero() {
        let now = OffsetDateTime::now_utc();
        let session = session_ending_in(now, -5);
        let policy = ExpirationPolicy::fixed(Duration::from_secs(60)).sovereign(true);
        assert_eq!(policy.time_to_live_for(Some(&session), now), Duration::ZERO);
    }

    #[test]
    fn test_non_sovereign_policy_ignores_session() {
        let now = OffsetDateTime::now_utc();
        let session = session_ending_in(now, 10);
        let policy = ExpirationPolicy::fixed(Duration::from_secs(60));
        assert_eq!(
            policy.time_to_live_for(Some(&session), now),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_policy_set_from_config() {
        let set = ExpirationPolicySet::default();
        assert_eq!(
            set.policy(TicketKind::AuthorizationCode).time_to_live(),
            Duration::from_secs(30)
        );
        assert_eq!(
            set.policy(TicketKind::AccessToken).time_to_live(),
            Duration::from_secs(7200)
        );
        assert!(set.policy(TicketKind::AccessToken).is_sovereign());
        assert!(!set.policy(TicketKind::RefreshToken).is_sovereign());
        assert_eq!(
            set.policy(TicketKind::DeviceUserCode),
            set.policy(TicketKind::DeviceToken)
        );
        assert_eq!(set.device_refresh_interval(), Duration::from_secs(15));
        assert_eq!(set.user_code_length(), 8);
    }
}
