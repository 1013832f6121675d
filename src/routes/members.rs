use actix_web::{get, post, put, web, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{sign_context, RequestContext};
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::membership::{accept_invitation, change_role, create_invitation};
use crate::routes::current_member;
use crate::schemas::{DeletionStatus, Role};
use crate::store::Store;

#[derive(Deserialize)]
struct RoleJson {
    role: Role,
}

#[derive(Deserialize)]
struct InvitationJson {
    email: String,
    role: Role,
}

#[derive(Deserialize)]
struct AcceptJson {
    name: String,
    email: String,
}

#[get("/members")]
async fn list_members(
    store: web::Data<dyn Store>,
    context: RequestContext,
) -> Result<HttpResponse, CoreError> {
    current_member(store.get_ref(), &context).await?;
    let members = store.list_members(&context.org_id).await?;
    Ok(HttpResponse::Ok().json(members))
}

#[get("/members/{id}")]
async fn get_member(
    store: web::Data<dyn Store>,
    context: RequestContext,
    id: web::Path<String>,
) -> Result<HttpResponse, CoreError> {
    current_member(store.get_ref(), &context).await?;
    let id = id.into_inner();
    match store.find_member(&context.org_id, &id).await? {
        Some(member) => Ok(HttpResponse::Ok().json(member)),
        None => Err(CoreError::NotFound(format!("member {id}"))),
    }
}

#[put("/members/{id}/role")]
async fn update_role(
    store: web::Data<dyn Store>,
    context: RequestContext,
    id: web::Path<String>,
    json: web::Json<RoleJson>,
) -> Result<HttpResponse, CoreError> {
    let actor = current_member(store.get_ref(), &context).await?;
    let id = id.into_inner();
    let mut target = store
        .find_member(&context.org_id, &id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("member {id}")))?;

    change_role(&actor, &mut target, json.role).map_err(|err| {
        warn!("{} could not change role of {}: {}", actor.id, id, err);
        err
    })?;
    store.save_member(&target).await?;

    info!("{} is now {:?} in {}", target.id, target.role, target.org_id);
    Ok(HttpResponse::Ok().json(target))
}

#[post("/invitations")]
async fn invite(
    store: web::Data<dyn Store>,
    context: RequestContext,
    json: web::Json<InvitationJson>,
) -> Result<HttpResponse, CoreError> {
    let actor = current_member(store.get_ref(), &context).await?;
    let json = json.into_inner();
    let existing = store.list_invitations(&context.org_id).await?;

    let invitation = create_invitation(&actor, &json.email, json.role, &existing, Utc::now())?;
    store.save_invitation(&invitation).await?;

    info!("{} invited {} to {}", actor.id, invitation.email, invitation.org_id);
    Ok(HttpResponse::Created().json(invitation))
}

/// The caller joins the inviting organization; their own token's organization
/// is irrelevant here, the response carries a token for the new one.
#[post("/invitations/{id}/accept")]
async fn accept(
    store: web::Data<dyn Store>,
    config: web::Data<AppConfig>,
    context: RequestContext,
    id: web::Path<String>,
    json: web::Json<AcceptJson>,
) -> Result<HttpResponse, CoreError> {
    let id = id.into_inner();
    let mut invitation = store
        .find_invitation(&id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("invitation {id}")))?;

    if store
        .find_member(&invitation.org_id, &context.user_id)
        .await?
        .is_some()
    {
        return Err(CoreError::Conflict(format!(
            "{} already belongs to {}",
            context.user_id, invitation.org_id
        )));
    }

    if let Some(deletion) = store.find_deletion(&context.user_id).await? {
        if deletion.status == DeletionStatus::PendingDeletion {
            warn!("{} tried to join {} while pending deletion", context.user_id, invitation.org_id);
            return Err(CoreError::Forbidden(format!(
                "account {} is pending deletion",
                context.user_id
            )));
        }
    }

    let json = json.into_inner();
    let accepted = accept_invitation(
        &mut invitation,
        context.user_id.clone(),
        json.name,
        &json.email,
        Utc::now(),
    );
    // Expiry is recorded even though the acceptance fails
    store.save_invitation(&invitation).await?;
    let member = accepted?;
    store.save_member(&member).await?;

    let joined = RequestContext {
        user_id: member.id.clone(),
        org_id: member.org_id.clone(),
    };
    let token = sign_context(&joined, &config.auth_secret)
        .ok_or_else(|| CoreError::Storage("could not sign context".to_string()))?;

    info!("{} joined {} as {:?}", member.id, member.org_id, member.role);
    Ok(HttpResponse::Ok().json(json!({ "member": member, "token": token })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_members)
        .service(get_member)
        .service(update_role)
        .service(invite)
        .service(accept);
}
