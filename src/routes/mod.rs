use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::auth::RequestContext;
use crate::error::{CoreError, CoreResult};
use crate::schemas::Member;
use crate::store::Store;

pub mod account;
pub mod availability;
pub mod balance;
pub mod expenses;
pub mod members;
pub mod payments;

/// The caller's membership in the organization named by their context.
/// Members with a pending deletion lose access until they recover.
pub(crate) async fn current_member(store: &dyn Store, context: &RequestContext) -> CoreResult<Member> {
    let member = store
        .find_member(&context.org_id, &context.user_id)
        .await?
        .ok_or_else(|| {
            CoreError::Forbidden(format!(
                "{} is not a member of {}",
                context.user_id, context.org_id
            ))
        })?;
    if member.disabled {
        return Err(CoreError::Forbidden(format!(
            "account {} is pending deletion",
            member.id
        )));
    }
    Ok(member)
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health);
    members::init_routes(cfg);
    availability::init_routes(cfg);
    expenses::init_routes(cfg);
    payments::init_routes(cfg);
    balance::init_routes(cfg);
    account::init_routes(cfg);
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use actix_web::{web, App};
    use chrono::Utc;

    use crate::auth::{sign_context, RequestContext};
    use crate::config::{tests::test_config, AppConfig};
    use crate::notify::{LogNotifier, Notifier};
    use crate::schemas::{Member, Role};
    use crate::store::{MemoryStore, Store};

    pub const ORG: &str = "flat";

    pub fn bearer(user_id: &str) -> (&'static str, String) {
        bearer_in(user_id, ORG)
    }

    pub fn bearer_in(user_id: &str, org_id: &str) -> (&'static str, String) {
        let context = RequestContext {
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        };
        let token = sign_context(&context, &test_config().auth_secret).unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    pub async fn seeded_store(members: &[(&str, Role)]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (id, role) in members {
            store
                .save_member(&Member {
                    id: id.to_string(),
                    org_id: ORG.to_string(),
                    name: id.to_string(),
                    email: format!("{id}@example.org"),
                    role: *role,
                    disabled: false,
                    joined_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        store
    }

    pub fn app_with(
        store: Arc<MemoryStore>,
        config: AppConfig,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let store: Arc<dyn Store> = store;
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        App::new()
            .app_data(web::Data::new(config))
            .app_data(web::Data::from(store))
            .app_data(web::Data::from(notifier))
            .configure(super::init_routes)
    }
}
