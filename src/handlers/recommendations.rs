use crate::{
    error::ApiError,
    models::{
        ReadyResponse, RecommendationRequest, RecommendationsResponse, TopRecommendationsRequest,
    },
    services::RecommendationService,
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use log::error;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/recommendations")
            .app_data(json_config())
            .route("/recommend", web::post().to(recommend))
            .route("/top", web::post().to(top_recommendations))
            .route("/ready", web::get().to(ready)),
    );
}

/// Unreadable bodies get the same JSON error shape as every other failure.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::InvalidInput(err.to_string()).into())
}

fn required_input(user_input: Option<&str>) -> Result<&str, ApiError> {
    user_input
        .filter(|input| !input.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidInput("User input is required".to_string()))
}

/// Best matching destination for the user's free-text preferences.
pub async fn recommend(
    request: Json<RecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    let user_input = required_input(request.user_input.as_deref())?;

    let recommendation = recommendation_service
        .recommend_best(user_input)
        .await
        .map_err(|e| {
            error!("Error getting recommendation: {}", e);
            e
        })?;

    Ok(HttpResponse::Ok().json(recommendation))
}

/// Ranked list of destinations, most similar first.
pub async fn top_recommendations(
    request: Json<TopRecommendationsRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    let user_input = required_input(request.user_input.as_deref())?;

    let recommendations = recommendation_service
        .recommend(user_input, request.limit)
        .await
        .map_err(|e| {
            error!("Error getting recommendations: {}", e);
            e
        })?;

    Ok(HttpResponse::Ok().json(RecommendationsResponse { recommendations }))
}

/// Whether the service can talk to the embedding provider.
pub async fn ready(recommendation_service: web::Data<RecommendationService>) -> HttpResponse {
    HttpResponse::Ok().json(ReadyResponse {
        ready: recommendation_service.is_ready(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{
        test_support::{client_with, FnTransport},
        ConcurrencyGate, EmbeddingCache, EmbeddingClient, RetryPolicy,
    };
    use crate::models::test_destination;
    use crate::services::{DestinationStore, EmbeddingTable};
    use actix_web::{
        http::{header::ContentType, StatusCode},
        test, App,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn service(client: EmbeddingClient) -> RecommendationService {
        let destinations = DestinationStore::new(vec![
            test_destination("alps", "Zermatt"),
            test_destination("maldives", "Male"),
        ]);
        let table = EmbeddingTable::from_entries(vec![
            ("alps".to_string(), vec![0.0, 1.0]),
            ("maldives".to_string(), vec![1.0, 0.1]),
        ]);
        RecommendationService::new(
            Arc::new(client),
            Arc::new(destinations),
            Arc::new(table),
            5,
        )
    }

    fn configured_service() -> RecommendationService {
        service(client_with(
            FnTransport::new(|_: &str| Ok(vec![1.0, 0.0])),
            0,
        ))
    }

    fn unconfigured_service() -> RecommendationService {
        service(EmbeddingClient::new(
            FnTransport::new(|_: &str| Ok(vec![1.0, 0.0])),
            None,
            EmbeddingCache::new(10),
            ConcurrencyGate::new(1),
            RetryPolicy::new(0, Duration::ZERO, Duration::ZERO),
            Duration::from_secs(1),
        ))
    }

    macro_rules! app {
        ($service:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($service))
                    .service(web::scope("/api").configure(recommendations_config)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_recommend_returns_flattened_destination() {
        let app = app!(configured_service());

        let req = test::TestRequest::post()
            .uri("/api/recommendations/recommend")
            .set_json(json!({ "userInput": "relaxing beach vacation" }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], "maldives");
        assert_eq!(body["city"], "Male");
        assert!(body["matchPercentage"].as_i64().unwrap() > 90);
    }

    #[actix_web::test]
    async fn test_blank_input_is_bad_request() {
        let app = app!(configured_service());

        for payload in [json!({ "userInput": "  " }), json!({})] {
            let req = test::TestRequest::post()
                .uri("/api/recommendations/recommend")
                .set_json(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "invalid_input");
        }
    }

    #[actix_web::test]
    async fn test_top_returns_ranked_list() {
        let app = app!(configured_service());

        let req = test::TestRequest::post()
            .uri("/api/recommendations/top")
            .set_json(json!({ "userInput": "snow", "limit": 2 }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let ids: Vec<&str> = body["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["maldives", "alps"]);
    }

    #[actix_web::test]
    async fn test_ready_reflects_auth_configuration() {
        let app = app!(unconfigured_service());

        let req = test::TestRequest::get()
            .uri("/api/recommendations/ready")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "ready": false }));

        let req = test::TestRequest::post()
            .uri("/api/recommendations/recommend")
            .set_json(json!({ "userInput": "beach" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_unreadable_body_gets_structured_error() {
        let app = app!(configured_service());

        let wrong_type = test::TestRequest::post()
            .uri("/api/recommendations/recommend")
            .set_json(json!({ "userInput": 42 }))
            .to_request();
        let malformed = test::TestRequest::post()
            .uri("/api/recommendations/top")
            .insert_header(ContentType::json())
            .set_payload("{\"userInput\": ")
            .to_request();

        for req in [wrong_type, malformed] {
            let resp = test::call_service(&app, req).await;

            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "invalid_input");
            assert!(body["message"].as_str().is_some());
        }
    }
}
