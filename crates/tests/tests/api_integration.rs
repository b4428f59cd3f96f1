use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use tripsmith_api::{build_router, ApiConfig, ApiState};
use tripsmith_planner::{FixedGenerator, Generator};
use tripsmith_storage::Store;
use uuid::Uuid;

const GENERATED: &str = r#"Here is your plan:
```json
{
  "currency": "INR",
  "plan": [
    {
      "day": 1,
      "date": "2024-11-02",
      "slots": [
        { "time": "09:00 - 10:00", "title": "Hotel check-in", "category": "Hotel" },
        { "start": "10:30", "end": "13:00", "title": "Baga Beach", "cost_min": "₹0" },
        { "start": "13:00", "end": "14:00", "title": "Lunch at Britto's", "category": "Restaurant", "cost_min": "₹600 - ₹800" },
        { "start": "19:30", "end": "21:00", "title": "Dinner at Thalassa", "category": "Restaurant", "cost_min": 1500 },
        { "start": "09:30", "end": "12:00", "title": "Fort Aguada", "cost_min": 100 },
        { "start": "12:30", "end": "14:00", "title": "Candolim market" }
      ]
    }
  ]
}
```"#;

fn app_with(response: &str, config: ApiConfig) -> Router {
    let generator = Generator::Fixed(FixedGenerator::new(response));
    build_router(ApiState::new(Store::memory(), generator, config))
}

fn app(response: &str) -> Router {
    app_with(response, ApiConfig::default())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_reports_generator_and_store() {
    let response = app(GENERATED)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["generator"], "fixed");
    assert_eq!(parsed["store"], "memory");
}

#[tokio::test]
async fn day_plan_has_exactly_the_requested_days() {
    let request = post_json(
        "/query/day-plan",
        json!({ "trip": { "destination": "Goa", "days": "2 days", "people": 2 } }),
    );

    let response = app(GENERATED).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    let days = parsed["json"]["plan"].as_array().expect("plan array");
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["day"], 1);
    assert_eq!(days[1]["day"], 2);
    assert_eq!(days[1]["date"], "2024-11-03");
    assert_eq!(days[0]["slots"][3]["title"], "Dinner at Thalassa");
    assert_eq!(days[1]["slots"][0]["title"], "Fort Aguada");
    assert_eq!(days[0]["slots"][0]["time"], "09:00 - 10:00");
    assert_eq!(days[0]["slots"][2]["cost_min"], 700);
    assert_eq!(parsed["json"]["total_min_cost"], 2300);
}

#[tokio::test]
async fn day_plan_pads_with_night_stays_when_nothing_was_scheduled() {
    let request = post_json(
        "/query/day-plan",
        json!({ "trip": { "destination": "Goa", "days": 3 } }),
    );

    let response = app(r#"{"plan": [{"day": 1, "date": "2024-11-02", "slots": []}]}"#)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    let days = parsed["json"]["plan"].as_array().expect("plan array");
    assert_eq!(days.len(), 3);
    for day in days {
        assert_eq!(day["slots"][0]["title"], "Night stay in Goa");
        assert_eq!(day["slots"][0]["category"], "Hotel");
    }
    assert_eq!(days[2]["date"], "2024-11-04");
}

#[tokio::test]
async fn day_plan_requires_a_trip() {
    let response = app(GENERATED)
        .oneshot(post_json("/query/day-plan", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "missing_trip");
    assert_eq!(parsed["message"], "Missing 'trip'.");
}

#[tokio::test]
async fn day_plan_rejects_bad_day_counts() {
    for days in [json!("0"), json!(-2), json!("many"), json!(61)] {
        let request = post_json("/query/day-plan", json!({ "trip": { "days": days } }));
        let response = app(GENERATED).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["error"], "invalid_day_count");
    }
}

#[tokio::test]
async fn generator_without_plan_is_a_bad_request() {
    let request = post_json("/query/day-plan", json!({ "trip": { "days": "2" } }));
    let response = app(r#"{"currency": "INR", "itinerary": "none"}"#)
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let parsed = read_json(response).await;
    assert_eq!(parsed["error"], "no_plan_generated");
    assert_eq!(parsed["message"], "No plan generated.");
}

#[tokio::test]
async fn generator_without_json_is_unavailable() {
    let request = post_json("/query/day-plan", json!({ "trip": { "days": "2" } }));
    let response = app("I could not plan that trip.").oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["error"], "upstream_generation_failed");
}

#[tokio::test]
async fn normalize_accepts_days_alias_and_bare_arrays() {
    let request = post_json(
        "/query/normalize",
        json!({
            "raw": [
                { "day": 1, "slots": [{ "time": "18:00-20:00", "title": "Sunset cruise", "cost": "₹500" }] }
            ]
        }),
    );

    let response = app(GENERATED).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = read_json(response).await;
    let slot = &parsed["json"]["plan"][0]["slots"][0];
    assert_eq!(slot["start"], "18:00");
    assert_eq!(slot["end"], "20:00");
    assert_eq!(slot["cost_min"], 500);
    assert_eq!(parsed["json"]["currency"], "INR");

    let missing = post_json("/query/normalize", json!({ "raw": { "currency": "INR" } }));
    let response = app(GENERATED).oneshot(missing).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn saved_itineraries_round_trip_plan_and_choice() {
    let app = app(GENERATED);
    let key = Uuid::new_v4().to_string();

    let save = Request::builder()
        .method("PUT")
        .uri(format!("/itineraries/{key}"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "itineraries": [{
                    "name": "Goa",
                    "tripDetails": { "destination": "Goa", "days": "2" },
                    "planner": [{ "id": 1, "type": "Restaurant", "name": "Gunpowder", "location": "Assagao" }]
                }]
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(save).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let plan_request = post_json(&format!("/itineraries/{key}/Goa/day-plan"), json!({}));
    let response = app.clone().oneshot(plan_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_json(response).await;
    assert_eq!(
        parsed["itinerary"]["dayPlan"]["plan"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );

    let choice = post_json(
        &format!("/itineraries/{key}/Goa/choice"),
        json!({
            "day_index": 0,
            "slot_index": 3,
            "option": { "name": "Gunpowder", "area": "Assagao", "approx_cost_for_two": 2000 }
        }),
    );
    let response = app.clone().oneshot(choice).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_json(response).await;
    let slot = &parsed["json"]["plan"][0]["slots"][3];
    assert_eq!(slot["title"], "Dinner at Gunpowder");
    assert_eq!(slot["cost_min"], 1000);

    let list = Request::builder()
        .uri(format!("/itineraries/{key}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(list).await.unwrap();
    let parsed = read_json(response).await;
    assert_eq!(
        parsed["itineraries"][0]["dayPlan"]["plan"][0]["slots"][3]["place"],
        "Gunpowder"
    );
}

#[tokio::test]
async fn unknown_itinerary_is_not_found() {
    let request = post_json("/itineraries/nobody/Goa/day-plan", json!({}));
    let response = app(GENERATED).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(response).await["error"], "itinerary_not_found");
}

#[tokio::test]
async fn duplicate_itinerary_names_are_rejected() {
    let save = Request::builder()
        .method("PUT")
        .uri("/itineraries/alice")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "itineraries": [{ "name": "Goa" }, { "name": "Goa" }] }).to_string(),
        ))
        .unwrap();

    let response = app(GENERATED).oneshot(save).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "duplicate_itinerary_name");
}

#[tokio::test]
async fn generation_endpoints_are_rate_limited() {
    let config = ApiConfig {
        rate_limit_max: 1,
        ..ApiConfig::default()
    };
    let app = app_with(GENERATED, config);

    let first = app
        .clone()
        .oneshot(post_json("/query/day-plan", json!({ "trip": { "days": "1" } })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(post_json("/query/day-plan", json!({ "trip": { "days": "1" } })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(read_json(second).await["error"], "rate_limited");

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}
