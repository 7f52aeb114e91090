use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header as JwtHeader};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::{Client, LocalResponse};
use serde_json::{json, Value};
use std::path::PathBuf;
use sublease_market::build_rocket;
use sublease_market::core::{ConfigManager, Database};
use sublease_market::facebook_extraction::FacebookExtractor;

const SECRET: &str = "integration-test-secret";

const CONFIG: &str = r#"
local:
  server:
    port: 8123
    upload_path: uploads
    log_file: test.log
  database:
    path: sublease.db
  auth:
    jwt_secret: integration-test-secret
    audience: authenticated
    student_email_domains: [psu.edu]
    admin_emails: [admin@psu.edu]
  llm:
    max_images: 2
"#;

struct TestApp {
    client: Client,
    dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

async fn app() -> TestApp {
    let dir = std::env::temp_dir().join(format!("sublease-api-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let config = ConfigManager::from_yaml(CONFIG, "local", &dir).unwrap();
    let db = Database::new(&config.database.path).await.unwrap();
    let extractor = FacebookExtractor::new(None, config.llm.max_images);

    let client = Client::tracked(build_rocket(&config, db, extractor))
        .await
        .expect("valid rocket instance");
    TestApp { client, dir }
}

fn token(sub: &str, email: &str) -> String {
    let claims = json!({
        "sub": sub,
        "email": email,
        "aud": "authenticated",
        "exp": chrono::Utc::now().timestamp() + 3600,
        "user_metadata": { "full_name": "Test User" }
    });
    encode(
        &JwtHeader::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn bearer(sub: &str, email: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token(sub, email)))
}

async fn body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.expect("json body")
}

fn listing_body(rent: i64) -> Value {
    json!({
        "title": "Room at The Rise",
        "description": "Spring sublease, furnished",
        "property_name": "The Rise",
        "address": "532 E College Ave",
        "area": "Downtown",
        "monthly_rent": rent,
        "start_date": "2031-01-10",
        "end_date": "2031-05-10",
        "bedrooms": 4,
        "bathrooms": 4.0,
        "furnished": true,
        "amenities": ["Gym"]
    })
}

async fn create_listing(app: &TestApp, sub: &str, email: &str, rent: i64) -> i64 {
    let response = app
        .client
        .post("/api/sublease-listings")
        .header(bearer(sub, email))
        .json(&listing_body(rent))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    body(response).await["data"]["id"].as_i64().unwrap()
}

#[rocket::async_test]
async fn health_reports_ok() {
    let app = app().await;
    let response = app.client.get("/api/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);

    let json = body(response).await;
    assert_eq!(json["type"], "text");
    assert_eq!(json["message"], "OK");
}

#[rocket::async_test]
async fn missing_or_bad_token_is_rejected_with_envelope() {
    let app = app().await;

    let response = app.client.get("/api/me").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);
    let json = body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error_code"], "MISSING_TOKEN");

    let response = app
        .client
        .get("/api/me")
        .header(Header::new("Authorization", "Bearer not-a-jwt"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(body(response).await["error_code"], "TOKEN_VERIFICATION_FAILED");
}

#[rocket::async_test]
async fn me_creates_user_and_updates_profile() {
    let app = app().await;

    let response = app
        .client
        .get("/api/me")
        .header(bearer("student-1", "abc123@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let json = body(response).await;
    assert_eq!(json["data"]["email"], "abc123@psu.edu");
    assert_eq!(json["data"]["role"], "student");
    assert_eq!(json["data"]["is_student"], true);
    assert_eq!(json["data"]["full_name"], "Test User");

    let response = app
        .client
        .put("/api/me")
        .header(bearer("student-1", "abc123@psu.edu"))
        .json(&json!({ "full_name": "Nittany Lion", "phone": "814-555-0100", "conversation_id": "c-1" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let json = body(response).await;
    assert_eq!(json["data"]["full_name"], "Nittany Lion");
    assert_eq!(json["conversation_id"], "c-1");

    let response = app
        .client
        .get("/api/me")
        .header(bearer("admin-1", "admin@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(body(response).await["data"]["role"], "admin");
}

#[rocket::async_test]
async fn sublease_listing_lifecycle() {
    let app = app().await;
    let id = create_listing(&app, "s1", "s1@psu.edu", 850).await;

    // Non-students cannot post
    let response = app
        .client
        .post("/api/sublease-listings")
        .header(bearer("g1", "someone@gmail.com"))
        .json(&listing_body(700))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    // Invalid input lists every problem
    let mut invalid = listing_body(0);
    invalid["end_date"] = json!("2031-01-01");
    let response = app
        .client
        .post("/api/sublease-listings")
        .header(bearer("s1", "s1@psu.edu"))
        .json(&invalid)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let json = body(response).await;
    assert_eq!(json["error_code"], "VALIDATION_ERROR");
    assert_eq!(json["suggestions"].as_array().unwrap().len(), 2);

    // Public browse with filters
    let json = body(app.client.get("/api/sublease-listings").dispatch().await).await;
    assert_eq!(json["data"]["count"], 1);
    let json = body(
        app.client
            .get("/api/sublease-listings?max_price=800")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 0);
    let json = body(
        app.client
            .get("/api/sublease-listings?available_from=2031-05-01&amenities=gym&area=down")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);

    let response = app
        .client
        .get("/api/sublease-listings?sort=cheapest")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);

    // Mark as taken: hidden from browse, still in my listings
    let response = app
        .client
        .post(format!("/api/sublease-listings/{}/status", id))
        .header(bearer("s1", "s1@psu.edu"))
        .json(&json!({ "is_active": false }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["action"], "listing_taken");

    let json = body(app.client.get("/api/sublease-listings").dispatch().await).await;
    assert_eq!(json["data"]["count"], 0);
    let json = body(
        app.client
            .get("/api/me/sublease-listings")
            .header(bearer("s1", "s1@psu.edu"))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);

    // Only the owner or an admin may delete
    let response = app
        .client
        .delete(format!("/api/sublease-listings/{}", id))
        .header(bearer("s2", "s2@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .delete(format!("/api/sublease-listings/{}", id))
        .header(bearer("admin-1", "admin@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = app
        .client
        .get(format!("/api/sublease-listings/{}", id))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(body(response).await["error_code"], "NOT_FOUND");
}

#[rocket::async_test]
async fn agency_registration_verification_and_listings() {
    let app = app().await;
    let manager = || bearer("m1", "manager@nittany.com");
    let admin = || bearer("admin-1", "admin@psu.edu");

    let response = app
        .client
        .post("/api/agencies")
        .header(manager())
        .json(&json!({
            "name": "Nittany Property Management",
            "email": "leasing@nittany.com",
            "website": "https://nittany.com"
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let json = body(response).await;
    assert_eq!(json["data"]["status"], "pending");
    let agency_id = json["data"]["id"].as_i64().unwrap();

    // The owner's role switched to agency
    let json = body(app.client.get("/api/me").header(manager()).dispatch().await).await;
    assert_eq!(json["data"]["role"], "agency");

    // Names are unique regardless of case
    let response = app
        .client
        .post("/api/agencies")
        .header(bearer("m2", "other@gmail.com"))
        .json(&json!({ "name": "nittany property management", "email": "x@y.com" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    // Pending agencies are hidden from the public list
    let json = body(app.client.get("/api/agencies").dispatch().await).await;
    assert_eq!(json["data"]["count"], 0);

    let listing = json!({
        "property_name": "The Metropolitan",
        "address": "400 W College Ave",
        "area": "Downtown",
        "pet_friendly": true,
        "floor_plans": [
            { "name": "2x2", "bedrooms": 2, "bathrooms": 2.0, "monthly_rent": 1100 },
            { "name": "Studio", "bedrooms": 0, "bathrooms": 1.0, "monthly_rent": 900 }
        ]
    });
    let response = app
        .client
        .post(format!("/api/agencies/{}/listings", agency_id))
        .header(manager())
        .json(&listing)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(body(response).await["error_code"], "AGENCY_NOT_VERIFIED");

    // Verification is admin only
    let response = app
        .client
        .post(format!("/api/admin/agencies/{}/verify", agency_id))
        .header(manager())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let json = body(
        app.client
            .get("/api/admin/agencies?status=pending")
            .header(admin())
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);

    let response = app
        .client
        .post(format!("/api/admin/agencies/{}/verify", agency_id))
        .header(admin())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["data"]["status"], "verified");

    let response = app
        .client
        .post(format!("/api/agencies/{}/listings", agency_id))
        .header(manager())
        .json(&listing)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let json = body(response).await;
    assert_eq!(json["data"]["price_range"], json!({ "min": 900, "max": 1100 }));
    assert_eq!(json["data"]["agency_name"], "Nittany Property Management");
    let listing_id = json["data"]["id"].as_i64().unwrap();

    let json = body(
        app.client
            .get("/api/agency-listings?min_price=1000&pet_friendly=true")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);
    let json = body(
        app.client
            .get("/api/agency-listings?max_price=800")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 0);

    // Replacing floor plans updates the price range
    let mut update = listing.clone();
    update["floor_plans"] = json!([
        { "name": "4x4", "bedrooms": 4, "bathrooms": 4.0, "monthly_rent": 750 }
    ]);
    let response = app
        .client
        .put(format!("/api/agency-listings/{}", listing_id))
        .header(manager())
        .json(&update)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let json = body(response).await;
    assert_eq!(json["data"]["floor_plans"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["price_range"], json!({ "min": 750, "max": 750 }));

    let response = app
        .client
        .delete(format!("/api/agency-listings/{}", listing_id))
        .header(bearer("s1", "s1@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    let response = app
        .client
        .delete(format!("/api/agency-listings/{}", listing_id))
        .header(manager())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn agency_listing_hidden_unless_active_and_verified() {
    let app = app().await;
    let manager = || bearer("m3", "rentals@happyvalley.com");
    let admin = || bearer("admin-1", "admin@psu.edu");

    let response = app
        .client
        .post("/api/agencies")
        .header(manager())
        .json(&json!({ "name": "Happy Valley Rentals", "email": "rentals@happyvalley.com" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let agency_id = body(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .client
        .post(format!("/api/admin/agencies/{}/verify", agency_id))
        .header(admin())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let mut ids = Vec::new();
    for active in [true, false] {
        let response = app
            .client
            .post(format!("/api/agencies/{}/listings", agency_id))
            .header(manager())
            .json(&json!({
                "property_name": "Beaver Terrace",
                "address": "300 E Beaver Ave",
                "is_active": active,
                "floor_plans": [
                    { "name": "1x1", "bedrooms": 1, "bathrooms": 1.0, "monthly_rent": 950 }
                ]
            }))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        ids.push(body(response).await["data"]["id"].as_i64().unwrap());
    }
    let (active_id, inactive_id) = (ids[0], ids[1]);

    let get = |id: i64| format!("/api/agency-listings/{}", id);

    assert_eq!(app.client.get(get(active_id)).dispatch().await.status(), Status::Ok);
    let response = app.client.get(get(inactive_id)).dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(body(response).await["error_code"], "NOT_FOUND");
    let response = app.client.get(get(inactive_id)).header(manager()).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["data"]["is_active"], false);

    let response = app
        .client
        .post(format!("/api/admin/agencies/{}/reject", agency_id))
        .header(admin())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    // A rejected agency hides even its active listings from other users
    assert_eq!(app.client.get(get(active_id)).dispatch().await.status(), Status::NotFound);
    let response = app
        .client
        .get(get(active_id))
        .header(bearer("s9", "s9@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
    let response = app.client.get(get(active_id)).header(manager()).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let response = app.client.get(get(inactive_id)).header(admin()).dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn sublease_requests_and_matches() {
    let app = app().await;
    create_listing(&app, "s1", "s1@psu.edu", 850).await;
    create_listing(&app, "s3", "s3@psu.edu", 1200).await;

    let response = app
        .client
        .post("/api/sublease-requests")
        .header(bearer("s2", "s2@psu.edu"))
        .json(&json!({
            "title": "Need a spring place",
            "min_budget": 500,
            "max_budget": 900,
            "preferred_areas": ["downtown"],
            "move_in_date": "2031-02-01",
            "move_out_date": "2031-04-30"
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let request_id = body(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .client
        .post("/api/sublease-requests")
        .header(bearer("s2", "s2@psu.edu"))
        .json(&json!({
            "title": "Backwards",
            "min_budget": 1000,
            "max_budget": 900,
            "move_in_date": "2031-02-01",
            "move_out_date": "2031-01-01"
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let json = body(
        app.client
            .get("/api/sublease-requests?budget=700")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);
    let json = body(
        app.client
            .get("/api/sublease-requests?budget=400")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 0);

    let json = body(
        app.client
            .get(format!("/api/sublease-requests/{}/matches", request_id))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);
    assert_eq!(json["data"]["items"][0]["monthly_rent"], 850);

    let json = body(
        app.client
            .get("/api/me/sublease-requests")
            .header(bearer("s2", "s2@psu.edu"))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);
}

#[rocket::async_test]
async fn facebook_preview_extract_and_delete() {
    let app = app().await;
    let post = "Subleasing my room in a 4b4b at The Rise for $850/month, spring semester 2031. Female only, furnished!";

    let response = app
        .client
        .post("/api/facebook-listings/preview")
        .header(bearer("s1", "s1@psu.edu"))
        .json(&json!({ "post_text": post, "reference_date": "2030-11-01" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let json = body(response).await;
    assert_eq!(json["data"]["method"], "heuristics");
    assert_eq!(json["data"]["fields"]["monthly_rent"], 850);
    assert_eq!(json["data"]["fields"]["gender_preference"], "female");

    let response = app
        .client
        .post("/api/facebook-listings/extract")
        .header(bearer("s1", "s1@psu.edu"))
        .json(&json!({ "post_text": "", "images": [] }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    let image = json!({ "media_type": "image/png", "data": BASE64.encode(b"png") });
    let response = app
        .client
        .post("/api/facebook-listings/extract")
        .header(bearer("s1", "s1@psu.edu"))
        .json(&json!({ "post_text": post, "images": [image.clone(), image.clone(), image] }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = app
        .client
        .post("/api/facebook-listings/extract")
        .header(bearer("s1", "s1@psu.edu"))
        .json(&json!({
            "post_text": post,
            "post_url": "https://facebook.com/groups/psu/posts/1",
            "author_name": "Jane"
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let json = body(response).await;
    assert_eq!(json["data"]["extraction_method"], "heuristics");
    assert_eq!(json["data"]["submitted_by"], "s1");
    assert_eq!(json["data"]["monthly_rent"], 850);
    assert!(json["data"].get("raw_llm_response").is_none());
    let id = json["data"]["id"].as_i64().unwrap();

    let json = body(
        app.client
            .get("/api/facebook-listings?min_price=800&max_price=900")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 1);

    let response = app
        .client
        .delete(format!("/api/facebook-listings/{}", id))
        .header(bearer("s2", "s2@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .delete(format!("/api/facebook-listings/{}", id))
        .header(bearer("s1", "s1@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let response = app
        .client
        .get(format!("/api/facebook-listings/{}", id))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}

#[rocket::async_test]
async fn facebook_multipart_upload_stores_screenshots() {
    let app = app().await;
    let boundary = "X-SUBLEASE-BOUNDARY";
    let form = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"post_text\"\r\n\r\n\
         Summer sublease 2b2b $700/month\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"screenshots\"; filename=\"post.png\"\r\n\
         Content-Type: image/png\r\n\r\nfakepng\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let response = app
        .client
        .post("/api/facebook-listings/upload")
        .header(bearer("s1", "s1@psu.edu"))
        .header(ContentType::new("multipart", "form-data").with_params(("boundary", boundary)))
        .body(form)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);

    let json = body(response).await;
    let paths = json["data"]["image_paths"].as_array().unwrap();
    assert_eq!(paths.len(), 1);
    assert!(PathBuf::from(paths[0].as_str().unwrap()).exists());
    assert_eq!(json["data"]["bedrooms"], 2);
}

#[rocket::async_test]
async fn admin_routes_require_admin() {
    let app = app().await;
    create_listing(&app, "s1", "s1@psu.edu", 850).await;

    let response = app
        .client
        .get("/api/admin/stats")
        .header(bearer("s1", "s1@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(body(response).await["error_code"], "FORBIDDEN");

    let response = app
        .client
        .get("/api/admin/stats")
        .header(bearer("admin-1", "admin@psu.edu"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let json = body(response).await;
    assert_eq!(json["data"]["users"], 2);
    assert_eq!(json["data"]["sublease_listings_active"], 1);
    assert_eq!(json["data"]["listings_last_7_days"], 1);

    let response = app
        .client
        .put("/api/admin/users/s1/role")
        .header(bearer("admin-1", "admin@psu.edu"))
        .json(&json!({ "role": "agency" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response).await["data"]["role"], "agency");

    let response = app
        .client
        .put("/api/admin/users/nobody/role")
        .header(bearer("admin-1", "admin@psu.edu"))
        .json(&json!({ "role": "admin" }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    let json = body(
        app.client
            .get("/api/admin/users?limit=10")
            .header(bearer("admin-1", "admin@psu.edu"))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(json["data"]["count"], 2);
}
