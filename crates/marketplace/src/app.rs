use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    handlers::{
        health::livez,
        listings::{
            add_picture, add_tag, batch_get_listings, get_listing, list_listings, mark_sold,
            remove_picture, remove_tag, search_listings,
        },
        users::{
            add_listing_to_rate, delete_listing, get_profile, make_listing, rate_user,
            remove_listing_to_rate, save_listing, search_users, signup, unsave_listing,
            update_profile,
        },
    },
    state::AppState,
};

fn allowed_origin(origin: &str) -> AllowOrigin {
    match origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            tracing::error!(%origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::new())
        }
    }
}

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.config.cors_allowed_origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ]);

    let user_routes = Router::new()
        .route("/profile", get(get_profile))
        .route("/rate-user", post(rate_user))
        .route("/search", get(search_users))
        .route("/update", put(update_profile))
        .route("/signup", post(signup))
        .route("/save-listing", post(save_listing))
        .route("/unsave-listing", delete(unsave_listing))
        .route("/add-listing-to-rate", post(add_listing_to_rate))
        .route("/remove-listing-to-rate", delete(remove_listing_to_rate))
        .route("/make-listing", post(make_listing))
        .route("/delete-listing", delete(delete_listing));

    let listing_routes = Router::new()
        .route("/", get(list_listings))
        .route("/listing", get(get_listing))
        .route("/search", get(search_listings))
        .route("/batch", post(batch_get_listings))
        .route("/mark-sold", put(mark_sold))
        .route("/add-tag", post(add_tag))
        .route("/remove-tag", delete(remove_tag))
        .route("/add-picture", post(add_picture))
        .route("/remove-picture", delete(remove_picture));

    let api_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/listings", listing_routes)
        .layer(cors);

    let timeout = state.config.request_timeout();

    Router::new()
        .route("/livez", get(livez))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .with_state(state)
}

#[cfg(all(test, feature = "inmemory"))]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, response::Response};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use marketplace_core::marketplace::ListingKey;
    use marketplace_core::storage::{TagRepository, UserRepository};

    use crate::{config::Config, storage::InMemoryRepository};

    fn test_config() -> Config {
        Config {
            users_table: "users".to_string(),
            listings_table: "listings".to_string(),
            tags_table: "tags".to_string(),
            dynamodb_endpoint: None,
            cors_allowed_origin: "https://cse110.thepaulpan.com".to_string(),
            request_timeout_seconds: 10,
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    fn test_app() -> (Router, InMemoryRepository) {
        let repo = InMemoryRepository::new();
        let app = create_app(AppState::new(repo.clone(), test_config()));
        (app, repo)
    }

    fn json_request(method: &str, uri: &str, user_id: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-user-id", user_id)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str, user_id: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-user-id", user_id)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn signup_user(app: &Router, user_id: &str) {
        let response = send(
            app,
            json_request(
                "POST",
                "/api/users/signup",
                user_id,
                json!({
                    "customName": format!("User {user_id}"),
                    "customEmail": format!("{user_id}@example.com"),
                    "customPicture": "pic.png"
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn listing_body(id: &str, tags: &[&str]) -> Value {
        json!({
            "listingId": id,
            "creationTime": "1000",
            "title": " Sofa ",
            "price": 50,
            "description": "Comfy",
            "location": "Campus",
            "tags": tags,
            "pictures": ["sofa.png"]
        })
    }

    async fn make_listing(app: &Router, owner: &str, id: &str, tags: &[&str]) -> Response {
        send(
            app,
            json_request(
                "POST",
                "/api/users/make-listing",
                owner,
                listing_body(id, tags),
            ),
        )
        .await
    }

    async fn fetch_listing(app: &Router, id: &str) -> Value {
        let response = send(
            app,
            get_request(
                &format!("/api/listings/listing?listingId={id}&creationTime=1000"),
                "anyone",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_livez() {
        let (app, _) = test_app();

        let response = send(
            &app,
            Request::builder().uri("/livez").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (app, _) = test_app();

        let response = send(
            &app,
            Request::builder()
                .uri("/api/users/profile")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signup_without_name_creates_nothing() {
        let (app, repo) = test_app();

        let response = send(
            &app,
            json_request("POST", "/api/users/signup", "u1", json!({})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Missing name");
        assert!(repo.get_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_uses_provider_profile_and_rejects_duplicates() {
        let (app, _) = test_app();
        let request = || {
            Request::builder()
                .method("POST")
                .uri("/api/users/signup")
                .header("x-user-id", "u1")
                .header("x-user-name", "Alice")
                .header("x-user-email", "alice@example.com")
                .header("x-user-picture", "alice.png")
                .header("Content-Type", "application/json")
                .body(Body::from(json!({"phone": "555"}).to_string()))
                .unwrap()
        };

        let response = send(&app, request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Success");

        let response = send(&app, request()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let profile = body_json(send(&app, get_request("/api/users/profile", "u1")).await).await;
        assert_eq!(profile["name"], "Alice");
        assert_eq!(profile["phone"], "555");
    }

    #[tokio::test]
    async fn test_missing_content_type_is_missing_body() {
        let (app, _) = test_app();

        let response = send(
            &app,
            Request::builder()
                .method("POST")
                .uri("/api/users/rate-user")
                .header("x-user-id", "u1")
                .body(Body::from("rating=5"))
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Missing body");
    }

    #[tokio::test]
    async fn test_profile_of_unknown_user_is_not_found() {
        let (app, _) = test_app();

        let response = send(
            &app,
            get_request("/api/users/profile?targetUserId=ghost", "u1"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "User Not Found.");
    }

    #[tokio::test]
    async fn test_rate_user_averages_ratings() {
        let (app, _) = test_app();
        signup_user(&app, "seller").await;

        let missing = send(
            &app,
            json_request(
                "POST",
                "/api/users/rate-user",
                "b",
                json!({"toRateUserId": "seller"}),
            ),
        )
        .await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(missing).await["message"], "Missing rating");

        for rating in [4, 5] {
            let response = send(
                &app,
                json_request(
                    "POST",
                    "/api/users/rate-user",
                    "b",
                    json!({"rating": rating, "toRateUserId": "seller"}),
                ),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let profile = body_json(
            send(&app, get_request("/api/users/profile", "seller")).await,
        )
        .await;
        assert_eq!(profile["rating"]["average"], 4.5);
        assert_eq!(profile["rating"]["count"], 2);
    }

    #[tokio::test]
    async fn test_search_users() {
        let (app, _) = test_app();
        signup_user(&app, "alice").await;

        let response = send(&app, get_request("/api/users/search", "alice")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Missing query params.");

        let by_name = body_json(
            send(&app, get_request("/api/users/search?name=USER%20ALI", "alice")).await,
        )
        .await;
        assert_eq!(by_name.as_array().unwrap().len(), 1);

        let by_email = body_json(
            send(
                &app,
                get_request("/api/users/search?email=alice@example.com", "alice"),
            )
            .await,
        )
        .await;
        assert_eq!(by_email[0]["userId"], "alice");
    }

    #[tokio::test]
    async fn test_update_profile_fields() {
        let (app, _) = test_app();
        signup_user(&app, "u1").await;

        let response = send(
            &app,
            json_request(
                "PUT",
                "/api/users/update",
                "u1",
                json!({"name": "New Name", "phone": "123"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let profile = body_json(send(&app, get_request("/api/users/profile", "u1")).await).await;
        assert_eq!(profile["name"], "New Name");
        assert_eq!(profile["searchName"], "new name");
        assert_eq!(profile["phone"], "123");
    }

    #[tokio::test]
    async fn test_make_listing_creates_listing_and_tag_index() {
        let (app, repo) = test_app();
        signup_user(&app, "owner").await;

        let response = make_listing(&app, "owner", "L1", &["furniture"]).await;
        assert_eq!(response.status(), StatusCode::OK);

        let listing = fetch_listing(&app, "L1").await;
        assert_eq!(listing["title"], " Sofa ");
        assert_eq!(listing["searchTitle"], "sofa");
        assert_eq!(listing["savedCount"], 0);
        assert_eq!(listing["sold"], false);
        assert_eq!(listing["userId"], "owner");

        let tag = repo.get_tag("furniture").await.unwrap().unwrap();
        assert_eq!(tag.listings, vec![ListingKey::new("L1", "1000")]);
        let owner = repo.get_user("owner").await.unwrap().unwrap();
        assert_eq!(owner.active_listings, vec![ListingKey::new("L1", "1000")]);
    }

    #[tokio::test]
    async fn test_make_listing_reports_first_missing_field() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        let mut body = listing_body("L1", &[]);
        body.as_object_mut().unwrap().remove("description");

        let response = send(
            &app,
            json_request("POST", "/api/users/make-listing", "owner", body),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Missing description");
    }

    #[tokio::test]
    async fn test_make_listing_twice_conflicts() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;

        make_listing(&app, "owner", "L1", &[]).await;
        let response = make_listing(&app, "owner", "L1", &[]).await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_failed_step_leaves_listing_in_place() {
        let (app, repo) = test_app();
        signup_user(&app, "owner").await;
        repo.fail_operation("add_active_listing");

        let response = make_listing(&app, "owner", "L1", &["furniture"]).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        repo.clear_failures();
        fetch_listing(&app, "L1").await;
        assert!(repo.get_tag("furniture").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_unsave_restores_count() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        signup_user(&app, "fan").await;
        make_listing(&app, "owner", "L1", &[]).await;
        let key = json!({"listingId": "L1", "creationTime": 1000});

        let response = send(
            &app,
            json_request("POST", "/api/users/save-listing", "fan", key.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetch_listing(&app, "L1").await["savedCount"], 1);

        let response = send(
            &app,
            json_request("DELETE", "/api/users/unsave-listing", "fan", key),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetch_listing(&app, "L1").await["savedCount"], 0);
    }

    #[tokio::test]
    async fn test_unsave_after_owner_deletes_listing() {
        let (app, repo) = test_app();
        signup_user(&app, "owner").await;
        signup_user(&app, "fan").await;
        make_listing(&app, "owner", "L1", &[]).await;
        let key = json!({"listingId": "L1", "creationTime": "1000"});
        send(
            &app,
            json_request("POST", "/api/users/save-listing", "fan", key.clone()),
        )
        .await;
        let response = send(
            &app,
            json_request(
                "DELETE",
                "/api/users/delete-listing",
                "owner",
                json!({"listingId": "L1", "creationTime": "1000", "tags": []}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            json_request("DELETE", "/api/users/unsave-listing", "fan", key),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let fan = repo.get_user("fan").await.unwrap().unwrap();
        assert!(fan.saved_listings.is_empty());
    }

    #[tokio::test]
    async fn test_save_unknown_listing_is_not_found() {
        let (app, repo) = test_app();
        signup_user(&app, "fan").await;

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/users/save-listing",
                "fan",
                json!({"listingId": "ghost", "creationTime": "1"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let fan = repo.get_user("fan").await.unwrap().unwrap();
        assert!(fan.saved_listings.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_count_every_user() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &[]).await;
        let savers: Vec<String> = (0..10).map(|i| format!("fan{i}")).collect();
        for saver in &savers {
            signup_user(&app, saver).await;
        }

        let handles: Vec<_> = savers
            .into_iter()
            .map(|saver| {
                let app = app.clone();
                tokio::spawn(async move {
                    app.oneshot(json_request(
                        "POST",
                        "/api/users/save-listing",
                        &saver,
                        json!({"listingId": "L1", "creationTime": "1000"}),
                    ))
                    .await
                    .unwrap()
                    .status()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }

        assert_eq!(fetch_listing(&app, "L1").await["savedCount"], 10);
    }

    #[tokio::test]
    async fn test_delete_listing_cleans_up_unique_tag_only() {
        let (app, repo) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &["unique", "shared"]).await;
        make_listing(&app, "owner", "L2", &["shared"]).await;

        let response = send(
            &app,
            json_request(
                "DELETE",
                "/api/users/delete-listing",
                "owner",
                json!({"listingId": "L1", "creationTime": "1000", "tags": ["unique", "shared"]}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(repo.get_tag("unique").await.unwrap().is_none());
        let shared = repo.get_tag("shared").await.unwrap().unwrap();
        assert_eq!(shared.listings, vec![ListingKey::new("L2", "1000")]);
    }

    #[tokio::test]
    async fn test_delete_listing_of_other_user_is_forbidden() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &[]).await;

        let response = send(
            &app,
            json_request(
                "DELETE",
                "/api/users/delete-listing",
                "intruder",
                json!({"listingId": "L1", "creationTime": "1000", "tags": []}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        fetch_listing(&app, "L1").await;
    }

    #[tokio::test]
    async fn test_listings_to_rate_round_trip() {
        let (app, repo) = test_app();
        signup_user(&app, "buyer").await;

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/users/add-listing-to-rate",
                "seller",
                json!({"buyerId": "buyer", "listingId": "L1", "creationTime": "1000"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let buyer = repo.get_user("buyer").await.unwrap().unwrap();
        assert_eq!(buyer.listings_to_rate[0].seller_id, "seller");

        let response = send(
            &app,
            json_request(
                "DELETE",
                "/api/users/remove-listing-to-rate",
                "buyer",
                json!({"listingId": "L1", "creationTime": "1000"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let buyer = repo.get_user("buyer").await.unwrap().unwrap();
        assert!(buyer.listings_to_rate.is_empty());
    }

    #[tokio::test]
    async fn test_list_listings_paginates() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        for id in ["L1", "L2", "L3"] {
            make_listing(&app, "owner", id, &[]).await;
        }

        let first = body_json(send(&app, get_request("/api/listings?limit=2", "owner")).await).await;
        assert_eq!(first["items"].as_array().unwrap().len(), 2);
        let token = first["nextKey"].as_str().unwrap().to_string();

        let second = body_json(
            send(
                &app,
                get_request(&format!("/api/listings?limit=2&startKey={token}"), "owner"),
            )
            .await,
        )
        .await;
        assert_eq!(second["items"][0]["listingId"], "L3");
        assert!(second.get("nextKey").is_none());
    }

    #[tokio::test]
    async fn test_search_and_batch_listings() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &[]).await;

        let found = body_json(
            send(&app, get_request("/api/listings/search?searchTerm=SOF", "owner")).await,
        )
        .await;
        assert_eq!(found.as_array().unwrap().len(), 1);

        let response = send(&app, get_request("/api/listings/search", "owner")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let batch = body_json(
            send(
                &app,
                json_request(
                    "POST",
                    "/api/listings/batch",
                    "owner",
                    json!({"listings": [
                        {"listingId": "L1", "creationTime": "1000"},
                        {"listingId": "ghost", "creationTime": "1000"}
                    ]}),
                ),
            )
            .await,
        )
        .await;
        assert_eq!(batch.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_sold_requires_owner() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &[]).await;
        let body = json!({"listingId": "L1", "creationTime": "1000", "buyerId": "b"});

        let response = send(
            &app,
            json_request("PUT", "/api/listings/mark-sold", "b", body.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &app,
            json_request("PUT", "/api/listings/mark-sold", "owner", body),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let listing = fetch_listing(&app, "L1").await;
        assert_eq!(listing["sold"], true);
        assert_eq!(listing["soldTo"], "b");
    }

    #[tokio::test]
    async fn test_tag_edits_keep_index_in_sync() {
        let (app, repo) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &[]).await;
        let body = json!({"listingId": "L1", "creationTime": "1000", "tag": " lamp "});

        let response = send(
            &app,
            json_request("POST", "/api/listings/add-tag", "owner", body.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetch_listing(&app, "L1").await["tags"], json!(["lamp"]));
        assert!(repo.get_tag("lamp").await.unwrap().is_some());

        let response = send(
            &app,
            json_request("DELETE", "/api/listings/remove-tag", "owner", body),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetch_listing(&app, "L1").await["tags"], json!([]));
        assert!(repo.get_tag("lamp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_picture_edits() {
        let (app, _) = test_app();
        signup_user(&app, "owner").await;
        make_listing(&app, "owner", "L1", &[]).await;

        send(
            &app,
            json_request(
                "POST",
                "/api/listings/add-picture",
                "owner",
                json!({"listingId": "L1", "creationTime": "1000", "picture": "b.png"}),
            ),
        )
        .await;
        let response = send(
            &app,
            json_request(
                "DELETE",
                "/api/listings/remove-picture",
                "owner",
                json!({"listingId": "L1", "creationTime": "1000", "picture": "sofa.png"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetch_listing(&app, "L1").await["pictures"], json!(["b.png"]));
    }
}
