//! Application state.

use std::sync::Arc;
use std::time::Duration;

use topup_core::CurrencyCatalog;
use topup_store::{MemoryStore, SnapshotStore, StoreError};

use crate::audit::{AuditError, AuditLog, HttpAuditLog, TracingAuditLog};
use crate::checkout::{ChargeOrchestrator, CheckoutSettings};
use crate::config::ServiceConfig;
use crate::context::CallerContext;
use crate::ledger::{Ledger, LedgerClient, LedgerError};
use crate::provider::PaymentProvider;
use crate::rates::{ExchangeRateApi, RateCache, RateCacheConfig, RateSource, RateSourceError};
use crate::stripe::{StripeClient, StripeError};
use crate::wallet::WalletService;
use crate::webhook::{AuditLogHook, CustomerLinkHook, PostCommitHook, WebhookProcessor};

/// Errors that prevent the service from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// A required setting is missing.
    #[error("{0} is not configured")]
    MissingConfig(&'static str),

    /// Ledger client setup or the currency load failed.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    /// Snapshot cache connection failed.
    #[error("snapshot store: {0}")]
    Store(#[from] StoreError),

    /// Stripe client setup failed.
    #[error("stripe: {0}")]
    Stripe(#[from] StripeError),

    /// Rate source setup failed.
    #[error("rates: {0}")]
    Rates(#[from] RateSourceError),

    /// Audit client setup failed.
    #[error("audit: {0}")]
    Audit(#[from] AuditError),
}

/// Collaborators the service is wired from.
pub struct Dependencies {
    /// The ledger.
    pub ledger: Arc<dyn Ledger>,
    /// Shared snapshot cache.
    pub store: Arc<dyn SnapshotStore>,
    /// Audit sink.
    pub audit: Arc<dyn AuditLog>,
    /// Payment provider.
    pub provider: Arc<dyn PaymentProvider>,
    /// Exchange-rate source.
    pub rate_source: Arc<dyn RateSource>,
    /// Supported currencies.
    pub catalog: CurrencyCatalog,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// Supported currencies, loaded at startup.
    pub catalog: Arc<CurrencyCatalog>,

    /// Exchange-rate cache.
    pub rates: Arc<RateCache>,

    /// Charge lifecycle.
    pub orchestrator: Arc<ChargeOrchestrator>,

    /// Webhook verification and settlement.
    pub webhooks: Arc<WebhookProcessor>,

    /// Wallet reads and sponsorship.
    pub wallets: Arc<WalletService>,
}

impl AppState {
    /// Wire the components from already-built collaborators.
    #[must_use]
    pub fn new(config: ServiceConfig, deps: Dependencies) -> Self {
        let catalog = Arc::new(deps.catalog);

        let rates = Arc::new(RateCache::new(
            deps.rate_source,
            deps.store,
            RateCacheConfig {
                jitter_max_secs: config.rates_jitter_max_secs,
                refresh_timeout: Duration::from_secs(config.upstream_timeout_seconds),
            },
        ));

        let wallets = Arc::new(WalletService::new(
            Arc::clone(&deps.ledger),
            Arc::clone(&deps.audit),
        ));

        let orchestrator = Arc::new(ChargeOrchestrator::new(
            deps.ledger,
            Arc::clone(&deps.provider),
            Arc::clone(&catalog),
            CheckoutSettings {
                price_id: config.stripe_price_id.clone(),
                publishable_key: config.stripe_publishable_key.clone(),
                success_url: config.stripe_success_url.clone(),
            },
        ));

        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("Stripe webhook secret not configured - webhooks will be rejected");
        }

        let hooks: Vec<Arc<dyn PostCommitHook>> = vec![
            Arc::new(CustomerLinkHook::new(
                orchestrator.customers().clone(),
                deps.provider.name(),
            )),
            Arc::new(AuditLogHook::new(deps.audit)),
        ];

        let webhooks = Arc::new(WebhookProcessor::new(
            config.stripe_webhook_secret.clone(),
            Duration::from_secs(config.webhook_tolerance_secs),
            Arc::clone(&orchestrator),
            hooks,
        ));

        Self {
            config,
            catalog,
            rates,
            orchestrator,
            webhooks,
            wallets,
        }
    }

    /// Build the real HTTP clients from configuration and load the
    /// currency table from the ledger.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` if a required setting is missing, a client
    /// cannot be built, Redis is unreachable or the currencies cannot be
    /// loaded.
    pub async fn from_config(config: ServiceConfig) -> Result<Self, StartupError> {
        let timeout = Duration::from_secs(config.upstream_timeout_seconds);

        let ledger_url = config
            .ledger_url
            .as_deref()
            .ok_or(StartupError::MissingConfig("LEDGER_URL"))?;
        let ledger: Arc<dyn Ledger> = Arc::new(LedgerClient::new(ledger_url, timeout)?);
        tracing::info!(ledger_url = %ledger_url, "Ledger client configured");

        let store = connect_store(&config).await?;

        let audit: Arc<dyn AuditLog> = match &config.audit_url {
            Some(url) => {
                tracing::info!(audit_url = %url, "Audit log enabled");
                Arc::new(HttpAuditLog::new(url, timeout)?)
            }
            None => {
                tracing::warn!("Audit log not configured - top-ups will only be logged locally");
                Arc::new(TracingAuditLog)
            }
        };

        let stripe_key = config
            .stripe_api_key
            .as_deref()
            .ok_or(StartupError::MissingConfig("STRIPE_API_KEY"))?;
        let provider: Arc<dyn PaymentProvider> = Arc::new(StripeClient::new(
            stripe_key,
            &config.stripe_api_base,
            timeout,
        )?);
        tracing::info!("Stripe integration enabled");
        if config.stripe_price_id.is_empty() {
            tracing::warn!("Stripe price not configured - checkout will fail");
        }

        let rates_key = config
            .rates_api_key
            .as_deref()
            .ok_or(StartupError::MissingConfig("RATES_API_KEY"))?;
        let rate_source: Arc<dyn RateSource> = Arc::new(ExchangeRateApi::new(
            &config.rates_api_url,
            rates_key,
            config.rates_base_currency.clone(),
            timeout,
        )?);

        let currencies = ledger.list_currencies(&CallerContext::default()).await?;
        tracing::info!(count = %currencies.len(), "Currencies loaded");

        Ok(Self::new(
            config,
            Dependencies {
                ledger,
                store,
                audit,
                provider,
                rate_source,
                catalog: CurrencyCatalog::new(currencies),
            },
        ))
    }
}

async fn connect_store(config: &ServiceConfig) -> Result<Arc<dyn SnapshotStore>, StartupError> {
    let Some(url) = &config.redis_url else {
        tracing::warn!("Redis not configured - exchange rates cached in-process only");
        return Ok(Arc::new(MemoryStore::new()));
    };

    #[cfg(feature = "redis-backend")]
    {
        let store = topup_store::RedisStore::connect(url, config.redis_prefix.clone()).await?;
        tracing::info!("Redis snapshot cache enabled");
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis-backend"))]
    {
        tracing::warn!(
            redis_url = %url,
            "Built without redis-backend - exchange rates cached in-process only"
        );
        Ok(Arc::new(MemoryStore::new()))
    }
}
