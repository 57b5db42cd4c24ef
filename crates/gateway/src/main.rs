use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use sark_adapters::{AdapterRegistry, CircuitBreakerConfig as AdapterCircuitBreakerConfig, GovernedAdapter, GrpcAdapter, HttpAdapter, McpAdapter, RetryConfig as AdapterRetryConfig};
use sark_audit::{build_sink, run_batch_worker, AuditRecorder, AuditWal, SiemOutbox, SiemQueue, SiemSinkHandle};
use sark_cache::DecisionCache;
use sark_cost::{BudgetController, CostEstimator, FixedCostEstimator, FreeEstimator, TokenBasedEstimator, TokenPricingTable};
use sark_domain::config::{Config, ConfigSeverity};
use sark_domain::{Principal, PrincipalKind, PrincipalType, TrustLevel};
use sark_policy::{BusinessHoursPlugin, CostAwarePlugin, PolicyEngine, RoleBasedPlugin};
use sark_ratelimit::RateLimiter;
use sha2::{Digest, Sha256};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use sark_gateway::api;
use sark_gateway::cli::{Cli, Command};
use sark_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = sark_gateway::cli::load_config(&cli.config)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::ConfigValidate) => {
            let config = sark_gateway::cli::load_config(&cli.config)?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::ConfigShow) => {
            let config = sark_gateway::cli::load_config(&cli.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("sark-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sark_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("SARK gateway starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Policy Decision Engine ───────────────────────────────────────
    let decision_cache = Arc::new(DecisionCache::new(config.cache.max_entries));
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let policy_engine = Arc::new(PolicyEngine::new(config.policy.sandbox.clone()));
    register_plugins(&policy_engine, &config)?;

    // ── Protocol Adapter Layer ────────────────────────────────────────
    let adapters = Arc::new(build_adapter_registry(&config));
    let failures = adapters.initialize().await;
    for (name, err) in &failures {
        tracing::warn!(adapter = name, error = %err, "adapter failed initial health check");
    }

    // ── Cost / Budget Controller ──────────────────────────────────────
    let cost_estimators: Arc<Vec<Arc<dyn CostEstimator>>> = Arc::new(build_cost_estimators(&config)?);
    let budget = Arc::new(BudgetController::new(config.budget.clone()));

    // ── Audit Pipeline ────────────────────────────────────────────────
    let siem_queue = if config.audit.siem.sinks.is_empty() {
        None
    } else {
        Some(Arc::new(SiemQueue::new(config.audit.siem.queue_capacity)))
    };

    let mut shutdown_tx = None;
    if let Some(queue) = &siem_queue {
        let client = reqwest::Client::new();
        let sinks: Vec<_> = config
            .audit
            .siem
            .sinks
            .iter()
            .filter_map(|sink_config| match build_sink(client.clone(), sink_config) {
                Ok(sink) => Some(Arc::new(SiemSinkHandle::new(sink))),
                Err(err) => {
                    tracing::error!(error = %err, "failed to build SIEM sink, skipping");
                    None
                }
            })
            .collect();

        let outbox = Arc::new(
            SiemOutbox::new(&config.audit.siem.outbox_dir)
                .context("failed to open SIEM durable outbox directory")?,
        );

        let (tx, rx) = tokio::sync::oneshot::channel();
        shutdown_tx = Some(tx);
        let worker_queue = queue.clone();
        let batch_size = config.audit.siem.batch_size;
        let batch_timeout = Duration::from_secs_f64(config.audit.siem.batch_timeout_secs);
        let retry_attempts = config.audit.siem.retry_attempts;
        tokio::spawn(async move {
            run_batch_worker(worker_queue, sinks, batch_size, batch_timeout, retry_attempts, outbox, rx).await;
        });
        tracing::info!(sinks = config.audit.siem.sinks.len(), "SIEM batch worker started");
    }

    let audit_wal = AuditWal::new(&config.audit.wal_dir).context("failed to open audit WAL directory")?;
    let audit = Arc::new(AuditRecorder::new(config.audit.history_capacity, audit_wal, siem_queue.clone()));

    // ── Security (startup-computed) ───────────────────────────────────
    let admin_token_hash = std::env::var(&config.admin.token_env)
        .ok()
        .map(|token| Sha256::digest(token.as_bytes()).to_vec());
    if admin_token_hash.is_none() {
        tracing::warn!(env = %config.admin.token_env, "admin token not set; admin endpoints disabled");
    }

    let trusted_principals = Arc::new(load_trusted_principals());

    let state = AppState {
        config: config.clone(),
        decision_cache: decision_cache.clone(),
        rate_limiter,
        policy_engine,
        adapters,
        cost_estimators,
        budget,
        audit,
        siem_queue,
        admin_token_hash,
        trusted_principals,
    };

    // ── Background sweeper ───────────────────────────────────────────
    {
        let cache = decision_cache.clone();
        let interval = Duration::from_secs(config.cache.sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let metrics = cache.cleanup_expired();
                tracing::debug!(?metrics, "decision cache swept");
            }
        });
    }

    {
        let audit = state.audit.clone();
        let retention_days = config.audit.retention_days;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
            loop {
                ticker.tick().await;
                match audit.enforce_retention(retention_days) {
                    Ok(removed) => tracing::info!(removed, retention_days, "audit WAL retention swept"),
                    Err(err) => tracing::error!(error = %err, "audit WAL retention sweep failed"),
                }
            }
        });
    }

    // ── CORS + per-IP rate limiting ───────────────────────────────────
    let cors_layer = build_cors_layer(&config.server.cors);

    let governor_layer = config.server.rate_limit.as_ref().map(|rl| {
        use tower_governor::governor::GovernorConfigBuilder;
        use tower_governor::GovernorLayer;

        let gov_config = GovernorConfigBuilder::default()
            .per_second(rl.requests_per_second)
            .burst_size(rl.burst_size)
            .finish()
            .expect("rate_limit: requests_per_second and burst_size must be > 0");

        tracing::info!(
            requests_per_second = rl.requests_per_second,
            burst_size = rl.burst_size,
            "per-IP rate limiting enabled"
        );
        GovernorLayer { config: std::sync::Arc::new(gov_config) }
    });

    let router = api::router().layer(cors_layer);
    let app = if let Some(gov) = governor_layer {
        router.layer(gov).with_state(state)
    } else {
        router.with_state(state)
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "SARK gateway listening");

    axum::serve(listener, app).await.context("axum server error")?;

    if let Some(tx) = shutdown_tx {
        let _ = tx.send(());
    }
    Ok(())
}

fn register_plugins(engine: &PolicyEngine, config: &Config) -> anyhow::Result<()> {
    for plugin_config in &config.policy.plugins {
        match plugin_config.name.as_str() {
            "business_hours" => {
                let settings = &plugin_config.settings;
                let timezone = settings
                    .get("timezone")
                    .and_then(|v| v.as_str())
                    .unwrap_or("UTC")
                    .parse::<chrono_tz::Tz>()
                    .unwrap_or(chrono_tz::UTC);
                engine.register(Box::new(BusinessHoursPlugin {
                    timezone,
                    open_hour: settings.get("open_hour").and_then(|v| v.as_u64()).unwrap_or(9) as u32,
                    close_hour: settings.get("close_hour").and_then(|v| v.as_u64()).unwrap_or(17) as u32,
                    weekdays_only: settings.get("weekdays_only").and_then(|v| v.as_bool()).unwrap_or(true),
                    restricted_capabilities: settings
                        .get("restricted_capabilities")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default(),
                }))?;
            }
            "cost_aware" => {
                let settings = &plugin_config.settings;
                engine.register(Box::new(CostAwarePlugin {
                    max_cost_usd: settings.get("max_cost_usd").and_then(|v| v.as_f64()).unwrap_or(1.0),
                    unrestricted_principals: settings
                        .get("unrestricted_principals")
                        .and_then(|v| v.as_array())
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                        .unwrap_or_default(),
                }))?;
            }
            "role_based" => {
                let settings = &plugin_config.settings;
                let required_permissions = settings
                    .get("required_permissions")
                    .and_then(|v| v.as_object())
                    .map(|obj| {
                        obj.iter()
                            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                            .collect()
                    })
                    .unwrap_or_default();
                engine.register(Box::new(RoleBasedPlugin { required_permissions }))?;
            }
            other => {
                tracing::warn!(plugin = other, "unknown policy plugin in config, skipping");
            }
        }
    }
    Ok(())
}

fn build_adapter_registry(config: &Config) -> AdapterRegistry {
    let registry = AdapterRegistry::new();
    let circuit_config = AdapterCircuitBreakerConfig {
        failure_threshold: config.adapters.circuit_breaker.failure_threshold,
        success_threshold: config.adapters.circuit_breaker.success_threshold,
        cooldown: Duration::from_secs(config.adapters.circuit_breaker.cooldown_secs),
    };
    let retry_config = AdapterRetryConfig {
        max_attempts: config.adapters.retry.max_attempts,
        backoff_base: config.adapters.retry.backoff_base,
        backoff_max: Duration::from_secs_f64(config.adapters.retry.backoff_max_secs),
    };
    let per_adapter_rate_limit = config.adapters.per_adapter_rate_limit;

    for protocol in &config.adapters.enabled_protocols {
        let inner: Arc<dyn sark_adapters::ProtocolAdapter> = match protocol.as_str() {
            // Resources are registered empty at startup; operators add
            // them through the (not-yet-built) adapter provisioning
            // surface. An adapter with zero resources passes its health
            // check trivially and simply has nothing to discover.
            "mcp" => Arc::new(McpAdapter::new(Vec::new())),
            "http" => Arc::new(HttpAdapter::new(Vec::new(), Duration::from_secs(30))),
            "grpc" => Arc::new(GrpcAdapter::new(Vec::new(), Duration::from_secs(10))),
            other => {
                tracing::warn!(protocol = other, "unknown protocol in enabled_protocols, skipping");
                continue;
            }
        };
        let governed = GovernedAdapter::new(inner, circuit_config.clone(), retry_config.clone(), per_adapter_rate_limit);
        if let Err(err) = registry.register(governed) {
            tracing::error!(error = %err, protocol, "failed to register adapter");
        }
    }
    registry
}

fn build_cost_estimators(config: &Config) -> anyhow::Result<Vec<Arc<dyn CostEstimator>>> {
    let mut estimators: Vec<Arc<dyn CostEstimator>> = Vec::new();
    let mut kinds: std::collections::HashSet<&str> = config.cost.estimator_by_resource.values().map(String::as_str).collect();
    if kinds.is_empty() {
        kinds.insert("free");
    }

    for kind in kinds {
        match kind {
            "free" => estimators.push(Arc::new(FreeEstimator)),
            "fixed" => {
                let cost_per_call = config
                    .cost
                    .fixed_cost_usd
                    .as_deref()
                    .unwrap_or("0.00")
                    .parse()
                    .context("cost.fixed_cost_usd is not a valid decimal")?;
                estimators.push(Arc::new(FixedCostEstimator { cost_per_call }));
            }
            "token_based" => {
                let mut prices = HashMap::new();
                for (model, (input, output)) in &config.cost.pricing_table {
                    prices.insert(
                        model.clone(),
                        (
                            input.parse().context("invalid input price in pricing_table")?,
                            output.parse().context("invalid output price in pricing_table")?,
                        ),
                    );
                }
                estimators.push(Arc::new(TokenBasedEstimator {
                    provider: "token_based".to_string(),
                    pricing: TokenPricingTable { prices },
                }));
            }
            other => tracing::warn!(kind = other, "unknown cost estimator kind in config, skipping"),
        }
    }
    Ok(estimators)
}

/// Loads the bearer-token -> principal table from `SARK_TRUSTED_PRINCIPALS`:
/// `;`-separated entries of the form
/// `token=principal_id[:attr=value,attr=value,...]`. Recognized attributes:
/// `kind` (`api_key`|`user`|`service`, default `api_key`), `type`
/// (`human`|`service`|`agent`|`device`), `role`, `team`, `permission`,
/// `capability` (each repeatable), `trust` (`trusted`|`limited`|`untrusted`),
/// `env`, `mfa` and `revoked` (RFC 3339 instants). Issuing or rotating these
/// tokens is out of scope; this only validates tokens handed to the gateway
/// out of band.
fn load_trusted_principals() -> HashMap<Vec<u8>, Principal> {
    let mut table = HashMap::new();
    if let Ok(raw) = std::env::var("SARK_TRUSTED_PRINCIPALS") {
        for entry in raw.split(';').filter(|p| !p.is_empty()) {
            let Some((token, rest)) = entry.split_once('=') else { continue };
            let (principal_id, attrs) = match rest.split_once(':') {
                Some((id, attrs)) => (id, Some(attrs)),
                None => (rest, None),
            };
            let principal = parse_trusted_principal(principal_id, attrs);
            table.insert(Sha256::digest(token.as_bytes()).to_vec(), principal);
        }
    }
    table
}

fn parse_trusted_principal(principal_id: &str, attrs: Option<&str>) -> Principal {
    let mut principal = Principal::new(principal_id, PrincipalKind::ApiKey);
    for attr in attrs.into_iter().flat_map(|a| a.split(',')).filter(|a| !a.is_empty()) {
        let Some((key, value)) = attr.split_once('=') else { continue };
        match key {
            "kind" => {
                principal.kind = match value {
                    "user" => PrincipalKind::User,
                    "service" => PrincipalKind::Service,
                    _ => PrincipalKind::ApiKey,
                }
            }
            "type" => {
                principal.principal_type = match value {
                    "service" => PrincipalType::Service,
                    "agent" => PrincipalType::Agent,
                    "device" => PrincipalType::Device,
                    _ => PrincipalType::Human,
                }
            }
            "role" => principal.roles.push(value.to_string()),
            "team" => principal.teams.push(value.to_string()),
            "permission" => principal.permissions.push(value.to_string()),
            "capability" => principal.capability_labels.push(value.to_string()),
            "trust" => {
                principal.trust_level = match value {
                    "trusted" => TrustLevel::Trusted,
                    "untrusted" => TrustLevel::Untrusted,
                    _ => TrustLevel::Limited,
                }
            }
            "env" => principal.environment = value.to_string(),
            "mfa" => {
                if let Ok(at) = chrono::DateTime::parse_from_rfc3339(value) {
                    principal.mfa_verified_at = Some(at.with_timezone(&chrono::Utc));
                }
            }
            "revoked" => {
                if let Ok(at) = chrono::DateTime::parse_from_rfc3339(value) {
                    principal.revoked_at = Some(at.with_timezone(&chrono::Utc));
                }
            }
            other => tracing::warn!(attr = other, "unknown trusted-principal attribute, skipping"),
        }
    }
    principal
}

/// Builds a [`CorsLayer`] from the configured allowed origins. Origins may
/// contain a trailing `*` wildcard for the port segment (e.g.
/// `http://localhost:*`), expanded into a predicate that matches any port
/// on that host. A literal `"*"` allows all origins.
fn build_cors_layer(cors: &sark_domain::config::CorsConfig) -> CorsLayer {
    use axum::http::header;

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
