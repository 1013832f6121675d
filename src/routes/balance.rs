use actix_web::{get, web, HttpResponse};
use log::info;

use crate::auth::RequestContext;
use crate::balance::MonthRange;
use crate::error::CoreError;
use crate::exchange::get_statement_for_month;
use crate::routes::current_member;
use crate::store::Store;

#[get("/balance/{year}/{month}")]
async fn get_balance(
    store: web::Data<dyn Store>,
    context: RequestContext,
    path: web::Path<(i32, u32)>,
) -> Result<HttpResponse, CoreError> {
    current_member(store.get_ref(), &context).await?;
    let (year, month) = path.into_inner();
    let range = MonthRange::new(year, month)?;

    let members = store.list_members(&context.org_id).await?;
    let expenses = store
        .expenses_between(&context.org_id, range.first, range.last)
        .await?;
    let payments = store
        .payments_between(&context.org_id, range.first, range.last)
        .await?;

    let statement = get_statement_for_month(&range, &members, &expenses, &payments)?;
    info!(
        "Balance {}-{:02} for {}: {} transfers",
        year,
        month,
        context.org_id,
        statement.transfers.len()
    );
    Ok(HttpResponse::Ok().json(statement))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_balance);
}
