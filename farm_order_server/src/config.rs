use std::{env, path::PathBuf, str::FromStr, time::Duration};

use farm_common::{
    helpers::{parse_boolean_flag, parse_int_list},
    Secret,
};
use farm_order_engine::{db_types::ProductLine, DecreasePolicy, LifecyclePolicy};
use log::*;

const DEFAULT_FARM_HOST: &str = "127.0.0.1";
const DEFAULT_FARM_PORT: u16 = 8370;
const DEFAULT_PRICING_CONFIG: &str = "pricing.json";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
pub const WEBHOOK_HMAC_HEADER: &str = "X-Farm-Hmac-SHA256";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The JSON pricing file. It is read on every pricing call, so edits take effect immediately.
    pub pricing_config_path: PathBuf,
    /// Time between scheduled forfeiture and reminder sweeps
    pub sweep_interval: Duration,
    pub webhook: WebhookConfig,
    pub policy: LifecyclePolicy,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    /// If false, webhook signatures are not checked at all. **DANGER**
    pub hmac_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { hmac_secret: Secret::default(), hmac_checks: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FARM_HOST.to_string(),
            port: DEFAULT_FARM_PORT,
            database_url: String::default(),
            pricing_config_path: PathBuf::from(DEFAULT_PRICING_CONFIG),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            webhook: WebhookConfig::default(),
            policy: LifecyclePolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FARM_HOST").ok().unwrap_or_else(|| DEFAULT_FARM_HOST.into());
        let port = env::var("FARM_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FARM_PORT. {e} Using the default, {DEFAULT_FARM_PORT}, instead."
                    );
                    DEFAULT_FARM_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FARM_PORT);
        let database_url = env::var("FARM_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ FARM_DATABASE_URL is not set. Please set it to the URL for the farm orders database.");
            String::default()
        });
        let pricing_config_path = env::var("FARM_PRICING_CONFIG").map(PathBuf::from).unwrap_or_else(|_| {
            warn!("🪛️ FARM_PRICING_CONFIG is not set. Using {DEFAULT_PRICING_CONFIG} in the working directory.");
            PathBuf::from(DEFAULT_PRICING_CONFIG)
        });
        let sweep_interval = parse_var("FARM_SWEEP_INTERVAL_SECS", env::var("FARM_SWEEP_INTERVAL_SECS").ok())
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);
        let webhook = WebhookConfig::from_env_or_default();
        let policy = policy_from_vars(|name| env::var(name).ok());
        Self { host, port, database_url, pricing_config_path, sweep_interval, webhook, policy }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = env::var("FARM_WEBHOOK_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FARM_WEBHOOK_HMAC_SECRET is not set. Please set it to the key your payment provider signs webhooks \
                 with."
            );
            String::default()
        });
        let hmac_checks = parse_boolean_flag(env::var("FARM_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Anyone can mark payments as completed.");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}

/// Builds the lifecycle policy from configuration variables, starting from the defaults. `var` looks up a variable by
/// name. Invalid values are logged and ignored.
pub fn policy_from_vars<F>(var: F) -> LifecyclePolicy
where F: Fn(&str) -> Option<String> {
    let mut policy = LifecyclePolicy::default();
    if let Some(ms) = parse_var::<u64>("FARM_PROVIDER_TIMEOUT_MS", var("FARM_PROVIDER_TIMEOUT_MS")) {
        policy.provider_timeout = Duration::from_millis(ms);
    }
    let day_counts = [
        ("FARM_FULL_PAYMENT_CUTOFF_DAYS", &mut policy.full_payment_cutoff_days),
        ("FARM_REMAINDER_DUE_DAYS", &mut policy.remainder_due_days),
        ("FARM_LATE_ADDITION_WINDOW_DAYS", &mut policy.late_addition_window_days),
        ("FARM_LATE_ADDITION_MULTIPLIER_PCT", &mut policy.late_addition_multiplier_pct),
    ];
    for (name, field) in day_counts {
        match parse_var::<i64>(name, var(name)) {
            Some(v) if v >= 0 => *field = v,
            Some(v) => warn!("🪛️ {name} cannot be negative ({v}). Using the default, {field}, instead."),
            None => {},
        }
    }
    if let Some(s) = var("FARM_REMINDER_OFFSETS") {
        let offsets = parse_int_list(&s);
        if offsets.is_empty() {
            warn!("🪛️ FARM_REMINDER_OFFSETS ({s}) contains no valid day counts. Using the defaults.");
        } else {
            policy.reminder_offsets = offsets;
        }
    }
    for line in [ProductLine::PigBox, ProductLine::HatchingEggs, ProductLine::LiveChickens] {
        let name = format!("FARM_DECREASE_POLICY_{}", line.to_string().to_ascii_uppercase());
        if let Some(p) = parse_var::<DecreasePolicy>(&name, var(&name)) {
            policy.decrease_policies.insert(line, p);
        }
    }
    info!(
        "🪛️ Lifecycle policy: full payment within {} days, remainder due {} days before fulfillment, reminders at {:?}",
        policy.full_payment_cutoff_days,
        policy.remainder_due_days,
        policy.sorted_reminder_offsets()
    );
    policy
}

fn parse_var<T>(name: &str, value: Option<String>) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = value?;
    value
        .trim()
        .parse::<T>()
        .map_err(|e| warn!("🪛️ {value} is not a valid value for {name}. {e} Using the default instead."))
        .ok()
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_gives_default_policy() {
        assert_eq!(policy_from_vars(vars(&[])), LifecyclePolicy::default());
    }

    #[test]
    fn policy_overrides() {
        let policy = policy_from_vars(vars(&[
            ("FARM_PROVIDER_TIMEOUT_MS", "2500"),
            ("FARM_FULL_PAYMENT_CUTOFF_DAYS", "21"),
            ("FARM_REMAINDER_DUE_DAYS", "7"),
            ("FARM_REMINDER_OFFSETS", "3, 10,x"),
            ("FARM_LATE_ADDITION_MULTIPLIER_PCT", "100"),
            ("FARM_DECREASE_POLICY_PIG_BOX", "allow"),
            ("FARM_DECREASE_POLICY_LIVE_CHICKENS", "block_within:2"),
        ]));
        assert_eq!(policy.provider_timeout, Duration::from_millis(2500));
        assert_eq!(policy.full_payment_cutoff_days, 21);
        assert_eq!(policy.remainder_due_days, 7);
        assert_eq!(policy.sorted_reminder_offsets(), vec![10, 3]);
        assert_eq!(policy.late_addition_multiplier_pct, 100);
        assert_eq!(policy.late_addition_window_days, 1);
        assert_eq!(policy.decrease_policy(ProductLine::PigBox), DecreasePolicy::Allow);
        assert_eq!(policy.decrease_policy(ProductLine::HatchingEggs), DecreasePolicy::BlockWhenFullyPaid);
        assert_eq!(policy.decrease_policy(ProductLine::LiveChickens), DecreasePolicy::BlockWithin(2));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let policy = policy_from_vars(vars(&[
            ("FARM_REMAINDER_DUE_DAYS", "-3"),
            ("FARM_FULL_PAYMENT_CUTOFF_DAYS", "two weeks"),
            ("FARM_REMINDER_OFFSETS", "soon"),
            ("FARM_DECREASE_POLICY_HATCHING_EGGS", "never"),
        ]));
        assert_eq!(policy, LifecyclePolicy::default());
    }
}
