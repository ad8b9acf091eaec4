//! The refresh state machine.
//!
//! One [`Orchestrator`] owns every piece of mutable monitor state and is the
//! only writer to it. Callers trigger [`Orchestrator::refresh`] from a timer or
//! a user command; the orchestrator debounces, resolves a token, fetches,
//! fans the snapshot out to the sinks, and runs the bounded auth recovery.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::auth::{CredentialError, CredentialResolver};
use crate::core::client::{UsageApi, UsageError};
use crate::core::config::AppConfig;
use crate::core::history::{HistoryPoint, PANEL_HISTORY_POINTS};
use crate::core::models::usage::{StoredToken, UsageSnapshot};
use crate::core::notifier::{CrossingEvent, ThresholdNotifier};

/// Minimum spacing between two non-forced refreshes.
pub const DEBOUNCE: Duration = Duration::from_millis(2000);
/// Extra attempts allowed after an auth failure recovered a new token.
pub const AUTH_RETRY_MAX: u32 = 1;
/// Minimum spacing between two "please sign in again" prompts.
pub const AUTH_PROMPT_COOLDOWN: Duration = Duration::from_secs(5 * 60);
/// Status line error text is cut to this many characters.
pub const STATUS_ERROR_LEN: usize = 80;

/// Persistent one-line indicator.
pub trait StatusSink {
    /// Pick up display settings. Called at startup and on every config change.
    fn configure(&mut self, _config: &AppConfig) {}
    fn show_loading(&mut self);
    fn show_sign_in(&mut self);
    fn show_error(&mut self, message: &str);
    fn update(&mut self, snapshot: &UsageSnapshot);
}

/// Detailed view with both windows and recent history.
pub trait PanelSink {
    fn update(&mut self, snapshot: &UsageSnapshot, history: &[HistoryPoint]);
    fn show_error(&mut self, message: &str, is_auth: bool);
}

/// Bounded trend history.
pub trait HistorySink {
    fn add(&mut self, snapshot: &UsageSnapshot);
    fn get_last(&self, n: usize) -> Vec<HistoryPoint>;
}

/// Out-of-band messages that need the user's attention.
pub trait UserNotifier {
    fn threshold_crossed(&mut self, event: &CrossingEvent);
    /// Auto-detection found nothing. Sent at most once per process.
    fn credentials_not_found(&mut self);
    /// The held token was rejected and could not be recovered.
    fn sign_in_required(&mut self);
}

pub struct Sinks {
    pub status: Box<dyn StatusSink>,
    pub panel: Box<dyn PanelSink>,
    pub history: Box<dyn HistorySink>,
    pub user: Box<dyn UserNotifier>,
}

/// Result of one `refresh` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Rejected by the debounce gate; nothing happened.
    Debounced,
    /// No token could be found; the status shows a sign-in hint.
    AwaitingSignIn,
    Updated(UsageSnapshot),
    /// The token was rejected and recovery failed.
    SignInRequired,
    /// A transient failure; the token is kept for the next tick.
    Failed(String),
}

/// Everything that changes between refreshes.
#[derive(Debug, Default)]
pub struct RefreshState {
    pub current_token: Option<StoredToken>,
    pub last_refresh: Option<Instant>,
    pub announced_missing_credentials: bool,
    pub last_auth_prompt: Option<Instant>,
    pub has_published: bool,
    pub loading_shown: bool,
}

pub struct Orchestrator {
    config: AppConfig,
    resolver: CredentialResolver,
    client: Box<dyn UsageApi>,
    notifier: ThresholdNotifier,
    sinks: Sinks,
    state: RefreshState,
}

impl Orchestrator {
    pub fn new(
        config: AppConfig,
        resolver: CredentialResolver,
        mut client: Box<dyn UsageApi>,
        mut sinks: Sinks,
    ) -> Self {
        client.set_debug(config.monitor.debug_logging);
        sinks.status.configure(&config);
        let notifier = ThresholdNotifier::new(
            &config.notifications.thresholds,
            config.notifications.primary_metric,
        );
        Self {
            config,
            resolver,
            client,
            notifier,
            sinks,
            state: RefreshState::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    /// Run one refresh cycle. `force` skips the debounce gate.
    pub async fn refresh(&mut self, force: bool) -> RefreshOutcome {
        let now = Instant::now();
        if !force {
            if let Some(last) = self.state.last_refresh {
                if now.duration_since(last) < DEBOUNCE {
                    debug!("Refresh skipped (debounce)");
                    return RefreshOutcome::Debounced;
                }
            }
        }
        self.state.last_refresh = Some(now);

        if !self.state.has_published && !self.state.loading_shown {
            self.state.loading_shown = true;
            self.sinks.status.show_loading();
        }

        let mut auth_error = None;
        for attempt in 0..=AUTH_RETRY_MAX {
            if self.state.current_token.is_none() {
                let auto_detect = self.config.monitor.auto_detect_credentials;
                debug!(auto_detect, "Looking for credentials");
                if let Some(token) = self.resolver.get_token(auto_detect).await {
                    self.adopt(token);
                }
            }

            let Some(token) = self.state.current_token.clone() else {
                return self.await_sign_in();
            };

            match self.client.get_usage(&token).await {
                Ok(snapshot) => {
                    self.publish(&snapshot);
                    return RefreshOutcome::Updated(snapshot);
                }
                Err(e) if e.is_auth() => {
                    warn!(attempt, error = %e, "Usage request rejected");
                    let retry = attempt < AUTH_RETRY_MAX && self.recover().await;
                    auth_error = Some(e);
                    if !retry {
                        break;
                    }
                }
                Err(e) => return self.fail(e),
            }
        }

        self.require_sign_in(auth_error)
    }

    /// Adopt a token the user just entered and fetch with it right away.
    pub async fn sign_in(&mut self, token: StoredToken) -> RefreshOutcome {
        info!(token = %format!("…{}", token.suffix()), "Signed in");
        self.adopt(token);
        self.refresh(true).await
    }

    /// Forget the held token and wipe the cache.
    pub fn sign_out(&mut self) -> Result<(), CredentialError> {
        self.resolver.clear_token()?;
        self.state.current_token = None;
        self.notifier.reset();
        self.sinks.status.show_sign_in();
        info!("Signed out");
        Ok(())
    }

    /// Swap in new settings without losing session state.
    pub fn apply_config(&mut self, config: AppConfig) {
        self.client.set_debug(config.monitor.debug_logging);
        self.notifier.reconfigure(
            &config.notifications.thresholds,
            config.notifications.primary_metric,
        );
        self.sinks.status.configure(&config);
        self.config = config;
    }

    fn adopt(&mut self, token: StoredToken) {
        if self.state.current_token.as_ref() != Some(&token) {
            self.notifier.reset();
        }
        self.state.current_token = Some(token);
    }

    async fn recover(&mut self) -> bool {
        if !self.config.monitor.auto_detect_credentials {
            return false;
        }
        let Some(token) = self.resolver.refresh_from_auto_detect().await else {
            debug!("Auto-detect found nothing to recover with");
            return false;
        };
        let old = self
            .state
            .current_token
            .as_ref()
            .map(|t| t.suffix().to_string())
            .unwrap_or_else(|| "none".to_string());
        info!(
            old = %format!("…{}", old),
            new = %format!("…{}", token.suffix()),
            "Recovered credentials from auto-detect"
        );
        self.adopt(token);
        true
    }

    fn publish(&mut self, snapshot: &UsageSnapshot) {
        self.sinks.history.add(snapshot);
        self.sinks.status.update(snapshot);
        let recent = self.sinks.history.get_last(PANEL_HISTORY_POINTS);
        self.sinks.panel.update(snapshot, &recent);

        if self.config.notifications.enabled {
            for event in self.notifier.check(snapshot) {
                self.sinks.user.threshold_crossed(&event);
            }
        }

        self.state.has_published = true;
        info!(
            five_hour = %format!("{:.1}%", snapshot.five_hour.percent),
            weekly = %format!("{:.1}%", snapshot.weekly.percent),
            "Usage updated"
        );
    }

    fn await_sign_in(&mut self) -> RefreshOutcome {
        self.sinks.status.show_sign_in();
        if !self.state.announced_missing_credentials {
            self.state.announced_missing_credentials = true;
            info!("No credentials found, waiting for sign-in");
            self.sinks.user.credentials_not_found();
        }
        RefreshOutcome::AwaitingSignIn
    }

    fn require_sign_in(&mut self, error: Option<UsageError>) -> RefreshOutcome {
        self.state.current_token = None;
        if let Err(e) = self.resolver.clear_token() {
            warn!(error = %e, "Could not clear rejected token");
        }

        let message = error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Authentication failed".to_string());
        self.sinks.status.show_sign_in();
        self.sinks.panel.show_error(&message, true);

        let now = Instant::now();
        let due = self
            .state
            .last_auth_prompt
            .map_or(true, |last| now.duration_since(last) >= AUTH_PROMPT_COOLDOWN);
        if due {
            self.state.last_auth_prompt = Some(now);
            self.sinks.user.sign_in_required();
        } else {
            debug!("Sign-in prompt suppressed (cooldown)");
        }
        RefreshOutcome::SignInRequired
    }

    fn fail(&mut self, error: UsageError) -> RefreshOutcome {
        let message = error.to_string();
        warn!(error = %message, "Usage refresh failed");
        let short: String = message.chars().take(STATUS_ERROR_LEN).collect();
        self.sinks.status.show_error(&short);
        self.sinks.panel.show_error(&message, false);
        RefreshOutcome::Failed(message)
    }
}
