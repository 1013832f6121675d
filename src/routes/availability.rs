use actix_web::{delete, get, post, web, HttpResponse};
use chrono::NaiveDate;
use log::info;
use serde::Deserialize;
use serde_json::json;

use crate::auth::RequestContext;
use crate::availability::is_available;
use crate::error::CoreError;
use crate::routes::current_member;
use crate::schemas::AvailabilityRecord;
use crate::store::Store;

#[derive(Deserialize)]
struct AwayJson {
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Deserialize)]
struct ListQuery {
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct CheckQuery {
    user_id: String,
    date: NaiveDate,
}

#[get("/availability")]
async fn list_records(
    store: web::Data<dyn Store>,
    context: RequestContext,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, CoreError> {
    current_member(store.get_ref(), &context).await?;
    let mut records = store.list_availability(&context.org_id).await?;
    if let Some(user_id) = &query.user_id {
        records.retain(|r| &r.user_id == user_id);
    }
    records.sort_by_key(|r| r.start_date);
    Ok(HttpResponse::Ok().json(records))
}

#[post("/availability")]
async fn mark_away(
    store: web::Data<dyn Store>,
    context: RequestContext,
    json: web::Json<AwayJson>,
) -> Result<HttpResponse, CoreError> {
    let member = current_member(store.get_ref(), &context).await?;
    let json = json.into_inner();
    let record = AvailabilityRecord::new(
        member.org_id,
        member.id,
        json.start_date,
        json.end_date,
        json.note,
    )?;
    store.insert_availability(&record).await?;

    info!(
        "{} is away from {} to {}",
        record.user_id, record.start_date, record.end_date
    );
    Ok(HttpResponse::Created().json(record))
}

#[delete("/availability/{id}")]
async fn remove_record(
    store: web::Data<dyn Store>,
    context: RequestContext,
    id: web::Path<String>,
) -> Result<HttpResponse, CoreError> {
    let member = current_member(store.get_ref(), &context).await?;
    let id = id.into_inner();
    let record = store
        .list_availability(&context.org_id)
        .await?
        .into_iter()
        .find(|r| r.id == id)
        .ok_or_else(|| CoreError::NotFound(format!("availability record {id}")))?;

    if record.user_id != member.id && !member.role.can_manage() {
        return Err(CoreError::Forbidden(
            "only the member or a manager can remove an away period".to_string(),
        ));
    }
    store.delete_availability(&context.org_id, &id).await?;

    info!("Removed away period {} of {}", id, record.user_id);
    Ok(HttpResponse::NoContent().finish())
}

#[get("/availability/check")]
async fn check(
    store: web::Data<dyn Store>,
    context: RequestContext,
    query: web::Query<CheckQuery>,
) -> Result<HttpResponse, CoreError> {
    current_member(store.get_ref(), &context).await?;
    let records = store.list_availability(&context.org_id).await?;
    let available = is_available(&records, &query.user_id, query.date);
    Ok(HttpResponse::Ok().json(json!({
        "user_id": query.user_id,
        "date": query.date,
        "available": available,
    })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(check)
        .service(list_records)
        .service(mark_away)
        .service(remove_record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::routes::test_support::{app_with, bearer, seeded_store};
    use crate::schemas::Role;
    use actix_web::test;

    #[actix_rt::test]
    async fn away_period_shows_up_in_checks() {
        let store = seeded_store(&[("ana", Role::Member), ("ben", Role::Member)]).await;
        let app = test::init_service(app_with(store, test_config())).await;

        let request = test::TestRequest::post()
            .uri("/availability")
            .insert_header(bearer("ana"))
            .set_json(json!({ "start_date": "2024-07-01", "end_date": "2024-07-14" }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 201);

        for (date, expected) in [("2024-06-30", true), ("2024-07-01", false), ("2024-07-14", false), ("2024-07-15", true)] {
            let request = test::TestRequest::get()
                .uri(&format!("/availability/check?user_id=ana&date={date}"))
                .insert_header(bearer("ben"))
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
            assert_eq!(body["available"], expected, "{date}");
        }
    }

    #[actix_rt::test]
    async fn inverted_period_is_bad_request() {
        let store = seeded_store(&[("ana", Role::Member)]).await;
        let app = test::init_service(app_with(store, test_config())).await;

        let request = test::TestRequest::post()
            .uri("/availability")
            .insert_header(bearer("ana"))
            .set_json(json!({ "start_date": "2024-07-14", "end_date": "2024-07-01" }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 400);
    }

    #[actix_rt::test]
    async fn only_owner_of_record_or_manager_removes_it() {
        let store = seeded_store(&[("ana", Role::Member), ("ben", Role::Member)]).await;
        let app = test::init_service(app_with(store, test_config())).await;

        let request = test::TestRequest::post()
            .uri("/availability")
            .insert_header(bearer("ana"))
            .set_json(json!({ "start_date": "2024-07-01", "end_date": "2024-07-02" }))
            .to_request();
        let record: AvailabilityRecord = test::call_and_read_body_json(&app, request).await;

        let request = test::TestRequest::delete()
            .uri(&format!("/availability/{}", record.id))
            .insert_header(bearer("ben"))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status().as_u16(), 403);

        let request = test::TestRequest::delete()
            .uri(&format!("/availability/{}", record.id))
            .insert_header(bearer("ana"))
            .to_request();
        assert_eq!(test::call_service(&app, request).await.status().as_u16(), 204);
    }
}
