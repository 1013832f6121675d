use actix_web::{get, post, web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::auth::RequestContext;
use crate::config::AppConfig;
use crate::error::CoreError;
use crate::ledger::{create_expense, mark_split_paid, ExpenseDraft};
use crate::routes::current_member;
use crate::store::Store;

#[derive(Deserialize)]
struct ExpenseJson {
    #[serde(default)]
    description: String,
    amount: Decimal,
    currency: Option<String>,
    expense_date: NaiveDate,
}

#[post("/expenses")]
async fn add_expense(
    store: web::Data<dyn Store>,
    config: web::Data<AppConfig>,
    context: RequestContext,
    json: web::Json<ExpenseJson>,
) -> Result<HttpResponse, CoreError> {
    let payer = current_member(store.get_ref(), &context).await?;
    let json = json.into_inner();
    let draft = ExpenseDraft {
        description: json.description,
        amount: json.amount,
        currency: json
            .currency
            .unwrap_or_else(|| config.default_currency.clone()),
        expense_date: json.expense_date,
    };

    // One snapshot of who is around; the split is frozen from it
    let members = store.list_members(&context.org_id).await?;
    let records = store.list_availability(&context.org_id).await?;
    let (expense, warning) = create_expense(
        context.org_id.clone(),
        draft,
        &payer.id,
        &members,
        &records,
        Utc::now(),
    )?;
    store.insert_expense(&expense).await?;

    if let Some(warning) = warning {
        warn!(
            "Expense {} on {}: {:?}",
            expense.id, expense.expense_date, warning
        );
    }
    info!(
        "{} added expense {} of {} {} split {} ways",
        payer.id,
        expense.id,
        expense.amount,
        expense.currency,
        expense.split_between.len()
    );
    Ok(HttpResponse::Created().json(json!({ "expense": expense, "warning": warning })))
}

#[get("/expenses/{id}")]
async fn get_expense(
    store: web::Data<dyn Store>,
    context: RequestContext,
    id: web::Path<String>,
) -> Result<HttpResponse, CoreError> {
    current_member(store.get_ref(), &context).await?;
    let id = id.into_inner();
    match store.find_expense(&context.org_id, &id).await? {
        Some(expense) => Ok(HttpResponse::Ok().json(expense)),
        None => Err(CoreError::NotFound(format!("expense {id}"))),
    }
}

#[post("/expenses/{id}/splits/{user_id}/paid")]
async fn split_paid(
    store: web::Data<dyn Store>,
    context: RequestContext,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, CoreError> {
    let member = current_member(store.get_ref(), &context).await?;
    let (id, user_id) = path.into_inner();
    let mut expense = store
        .find_expense(&context.org_id, &id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("expense {id}")))?;

    let allowed = member.id == user_id || member.id == expense.payer_id || member.role.can_manage();
    if !allowed {
        return Err(CoreError::Forbidden(
            "only the debtor, the payer or a manager can settle a split".to_string(),
        ));
    }

    mark_split_paid(&mut expense, &user_id, Utc::now())?;
    store.update_expense(&expense).await?;

    info!("Split of {} on expense {} marked paid", user_id, expense.id);
    Ok(HttpResponse::Ok().json(expense))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(add_expense)
        .service(get_expense)
        .service(split_paid);
}
