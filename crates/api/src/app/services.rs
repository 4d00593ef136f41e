use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use loanops_auth::{Argon2Hasher, CredentialHasher, Hs256TokenCodec, RoleCatalog, TokenCodec};
use loanops_infra::{
    AgencyDirectory, Authenticator, AuthorizationGate, CaseWorkflow, InMemoryStore, PostgresStore,
    RoleAdmin, ServiceError, Store, TrailLog, UserAdmin,
};

use crate::config::{AppConfig, BootstrapAdmin};

/// Every service the handlers call, sharing one store.
#[derive(Clone)]
pub struct AppServices {
    pub gate: AuthorizationGate,
    pub authn: Authenticator,
    pub users: UserAdmin,
    pub roles: RoleAdmin,
    pub agencies: AgencyDirectory,
    pub workflow: CaseWorkflow,
    pub trails: TrailLog,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pg = PostgresStore::connect(url, config.database_max_connections)
                .await
                .context("connecting to postgres")?;
            info!("using postgres store");
            Arc::new(pg)
        }
        None => {
            info!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let catalog = Arc::new(RoleCatalog::builtin());
    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new());
    let tokens: Arc<dyn TokenCodec> =
        Arc::new(Hs256TokenCodec::new(config.jwt_secret.as_bytes()).context("building token codec")?);

    let authn = Authenticator::new(store.clone(), hasher, tokens.clone());
    let roles = RoleAdmin::new(store.clone(), catalog.clone());
    roles
        .seed_builtin_roles(Utc::now())
        .await
        .context("seeding built-in roles")?;

    let services = AppServices {
        gate: AuthorizationGate::new(store.clone(), tokens, catalog),
        users: UserAdmin::new(store.clone(), authn.clone()),
        agencies: AgencyDirectory::new(store.clone()),
        workflow: CaseWorkflow::new(store.clone()),
        trails: TrailLog::new(store.clone(), config.payment_link_base.as_str()),
        authn,
        roles,
    };

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&services, store.as_ref(), admin)
            .await
            .context("bootstrapping admin")?;
    }

    Ok(services)
}

/// Create the configured administrator if missing and make sure it holds `admin`.
async fn bootstrap_admin(services: &AppServices, store: &dyn Store, admin: &BootstrapAdmin) -> Result<(), ServiceError> {
    let now = Utc::now();
    let user = match store.user_by_username(admin.username.trim()).await? {
        Some(user) => user,
        None => {
            services
                .authn
                .register_user(&admin.username, &admin.password, None, now)
                .await?
        }
    };
    services.roles.bootstrap_admin(&user, now).await?;
    info!(user_id = %user.id, "bootstrap admin ready");
    Ok(())
}
