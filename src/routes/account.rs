use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::auth::RequestContext;
use crate::config::AppConfig;
use crate::deletion::{account_state, cancel_deletion, recover_account, request_deletion};
use crate::error::{CoreError, CoreResult};
use crate::notify::Notifier;
use crate::schemas::{DeletionRequest, Member};
use crate::store::Store;

#[derive(Deserialize, Default)]
struct DeletionJson {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Clone, Copy)]
enum EntryPoint {
    Recovery,
    Settings,
}

// Disabled members still reach these routes, they are the way back in
async fn own_membership(store: &dyn Store, context: &RequestContext) -> CoreResult<Member> {
    store
        .find_member(&context.org_id, &context.user_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("member {}", context.user_id)))
}

// A deletion covers the whole account, so every membership follows it
async fn set_disabled(store: &dyn Store, memberships: &[Member], disabled: bool) -> CoreResult<()> {
    for member in memberships {
        let mut member = member.clone();
        member.disabled = disabled;
        store.save_member(&member).await?;
    }
    Ok(())
}

#[post("/account/deletion")]
async fn schedule_deletion(
    store: web::Data<dyn Store>,
    notifier: web::Data<dyn Notifier>,
    config: web::Data<AppConfig>,
    context: RequestContext,
    json: Option<web::Json<DeletionJson>>,
) -> Result<HttpResponse, CoreError> {
    own_membership(store.get_ref(), &context).await?;
    let existing = store.find_deletion(&context.user_id).await?;
    let reason = json.map(|j| j.into_inner()).unwrap_or_default().reason;

    let request = request_deletion(
        existing.as_ref(),
        context.user_id.clone(),
        context.org_id.clone(),
        reason,
        Utc::now(),
        config.deletion_grace(),
    )
    .map_err(|err| {
        warn!("Deletion request for {} refused: {}", context.user_id, err);
        err
    })?;

    let memberships = store.memberships_of(&context.user_id).await?;
    let stored = match set_disabled(store.get_ref(), &memberships, true).await {
        Ok(()) => store.save_deletion(&request).await,
        Err(err) => Err(err),
    };
    if let Err(err) = stored {
        warn!("Deletion request for {} not stored, re-enabling memberships", context.user_id);
        if let Err(rollback) = set_disabled(store.get_ref(), &memberships, false).await {
            error!("Could not re-enable {}: {}", context.user_id, rollback);
        }
        return Err(err);
    }
    notifier.deletion_requested(&request);

    info!(
        "Account {} scheduled for deletion at {}",
        request.user_id, request.scheduled_deletion_at
    );
    Ok(HttpResponse::Accepted().json(deletion_body(&request)))
}

async fn restore(
    store: &dyn Store,
    notifier: &dyn Notifier,
    context: &RequestContext,
    entry: EntryPoint,
) -> CoreResult<DeletionRequest> {
    own_membership(store, context).await?;
    let mut request = store
        .find_deletion(&context.user_id)
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("no pending deletion for {}", context.user_id)))?;

    let now = Utc::now();
    let restored = match entry {
        EntryPoint::Recovery => recover_account(&mut request, now),
        EntryPoint::Settings => cancel_deletion(&mut request, now),
    };
    if let Err(err) = restored {
        warn!("Could not restore {}: {}", context.user_id, err);
        return Err(err);
    }

    // Members first, a failed save leaves the request pending
    let memberships = store.memberships_of(&request.user_id).await?;
    set_disabled(store, &memberships, false).await?;
    store.save_deletion(&request).await?;
    notifier.account_recovered(&request);
    info!(
        "Account {} restored in {} organizations, requested from {}",
        request.user_id,
        memberships.len(),
        request.org_id
    );
    Ok(request)
}

#[post("/account/recover")]
async fn recover(
    store: web::Data<dyn Store>,
    notifier: web::Data<dyn Notifier>,
    context: RequestContext,
) -> Result<HttpResponse, CoreError> {
    let request = restore(store.get_ref(), notifier.get_ref(), &context, EntryPoint::Recovery).await?;
    Ok(HttpResponse::Ok().json(deletion_body(&request)))
}

#[delete("/account/deletion")]
async fn cancel(
    store: web::Data<dyn Store>,
    notifier: web::Data<dyn Notifier>,
    context: RequestContext,
) -> Result<HttpResponse, CoreError> {
    let request = restore(store.get_ref(), notifier.get_ref(), &context, EntryPoint::Settings).await?;
    Ok(HttpResponse::Ok().json(deletion_body(&request)))
}

#[get("/account/deletion")]
async fn status(
    store: web::Data<dyn Store>,
    context: RequestContext,
) -> Result<HttpResponse, CoreError> {
    let request = store.find_deletion(&context.user_id).await?;
    let now = Utc::now();
    Ok(HttpResponse::Ok().json(json!({
        "state": account_state(request.as_ref(), now),
        "request": request,
        "can_recover": request.as_ref().map_or(false, |r| r.can_recover(now)),
    })))
}

fn deletion_body(request: &DeletionRequest) -> serde_json::Value {
    json!({
        "request": request,
        "can_recover": request.can_recover(Utc::now()),
    })
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(schedule_deletion)
        .service(recover)
        .service(cancel)
        .service(status);
}
