use actix_web::{post, web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::RequestContext;
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::ledger::{create_payment, review_payment, PaymentDraft};
use crate::membership::ensure_manager;
use crate::routes::current_member;
use crate::store::Store;

#[derive(Deserialize)]
struct PaymentJson {
    paid_to: String,
    amount: Decimal,
    currency: Option<String>,
    payment_date: NaiveDate,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Deserialize)]
struct ReviewJson {
    approve: bool,
}

#[post("/payments")]
async fn add_payment(
    store: web::Data<dyn Store>,
    config: web::Data<AppConfig>,
    context: RequestContext,
    json: web::Json<PaymentJson>,
) -> Result<HttpResponse, CoreError> {
    let member = current_member(store.get_ref(), &context).await?;
    let json = json.into_inner();
    if store
        .find_member(&context.org_id, &json.paid_to)
        .await?
        .is_none()
    {
        return Err(CoreError::NotFound(format!("member {}", json.paid_to)));
    }

    let draft = PaymentDraft {
        paid_to: json.paid_to,
        amount: json.amount,
        currency: json
            .currency
            .unwrap_or_else(|| config.default_currency.clone()),
        payment_date: json.payment_date,
        note: json.note,
    };
    let payment = create_payment(
        context.org_id.clone(),
        &member.id,
        draft,
        config.payment_policy(),
        Utc::now(),
    )?;
    store.insert_payment(&payment).await?;

    info!(
        "{} paid {} {} in advance to {} ({:?})",
        payment.user_id, payment.amount, payment.currency, payment.paid_to, payment.status
    );
    Ok(HttpResponse::Created().json(payment))
}

#[post("/payments/{id}/review")]
async fn review(
    store: web::Data<dyn Store>,
    context: RequestContext,
    id: web::Path<String>,
    json: web::Json<ReviewJson>,
) -> Result<HttpResponse, CoreError> {
    let reviewer = current_member(store.get_ref(), &context).await?;
    ensure_manager(&reviewer)?;
    let id = id.into_inner();
    let mut payment = store
        .find_payment(&context.org_id, &id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("payment {id}")))?;

    review_payment(&mut payment, json.approve)?;
    store.update_payment(&payment).await?;

    info!("{} reviewed payment {}: {:?}", reviewer.id, payment.id, payment.status);
    Ok(HttpResponse::Ok().json(payment))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(add_payment).service(review);
}
