use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use doctrack_api::app::services::AppServices;
use doctrack_auth::{CreateUser, SessionClaims};
use doctrack_core::UserId;
use doctrack_infra::UserStore;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";
const PASSWORD: &str = "secret";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    http: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory stores, bound to an ephemeral port.
        let services = Arc::new(AppServices::in_memory(JWT_SECRET, ChronoDuration::days(1)));
        let app = doctrack_api::app::build_app(services.clone(), "http://localhost:3000");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            http: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Seed a user straight through the services; returns its id.
    async fn seed_user(&self, email: &str, rol: &str) -> i64 {
        self.seed_user_with(email, rol, None).await
    }

    async fn seed_user_with(&self, email: &str, rol: &str, activo: Option<bool>) -> i64 {
        let user = self
            .services
            .create_user(CreateUser {
                nombre_completo: format!("Usuario {rol}"),
                email: email.to_string(),
                telefono: None,
                password: PASSWORD.to_string(),
                rol: rol.to_string(),
                foto_url: None,
                activo,
            })
            .await
            .expect("seed user");
        user.id.get()
    }

    async fn login(&self, email: &str) -> String {
        let res = self
            .http
            .post(self.url("/usuarios/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "login for {email}");
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let res = self.http.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        decode(res).await
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        decode(res).await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .http
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        decode(res).await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let res = self.http.delete(self.url(path)).bearer_auth(token).send().await.unwrap();
        decode(res).await
    }

    async fn stored_session(&self, id: i64) -> String {
        self.services
            .users
            .get_user(UserId::new(id))
            .await
            .unwrap()
            .and_then(|u| u.session_token)
            .expect("user has a live session")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn decode(res: reqwest::Response) -> (StatusCode, Value) {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    (status, body)
}

fn mint_jwt(sub: i64, jti: &str) -> String {
    let now = Utc::now();
    mint_jwt_window(sub, jti, now, now + ChronoDuration::minutes(10))
}

fn mint_jwt_window(sub: i64, jti: &str, iat: chrono::DateTime<Utc>, exp: chrono::DateTime<Utc>) -> String {
    let claims = SessionClaims {
        sub: sub.to_string(),
        email: "a@x.com".to_string(),
        rol: "administrador".to_string(),
        jti: jti.to_string(),
        iat: iat.timestamp(),
        exp: exp.timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public_and_protected_routes_require_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.http.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.http.get(srv.url("/usuarios/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn a_new_login_invalidates_the_previous_token() {
    let srv = TestServer::spawn().await;
    let id = srv.seed_user("a@x.com", "administrador").await;

    let res = srv
        .http
        .post(srv.url("/usuarios/login"))
        .json(&json!({ "email": "a@x.com", "password": "secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let t1 = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["usuario"]["email"], "a@x.com");
    assert!(body["usuario"].get("password_hash").is_none());
    assert!(body["usuario"].get("token").is_none());

    let (status, me) = srv.get("/usuarios/me", &t1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id);
    assert_eq!(me["rol"], "administrador");

    let t2 = srv.login("a@x.com").await;
    assert_ne!(t1, t2);

    let (status, _) = srv.get("/usuarios/me", &t1).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = srv.get("/usuarios/me", &t2).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_invalidates_the_current_token() {
    let srv = TestServer::spawn().await;
    srv.seed_user("a@x.com", "preparador").await;
    let token = srv.login("a@x.com").await;

    let (status, body) = srv.post("/usuarios/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mensaje"], "Logout exitoso");

    let (status, _) = srv.get("/usuarios/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let srv = TestServer::spawn().await;
    srv.seed_user("a@x.com", "administrador").await;

    let res = srv
        .http
        .post(srv.url("/usuarios/login"))
        .json(&json!({ "email": "a@x.com", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    let (status, body) = decode(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Contraseña incorrecta");

    let res = srv
        .http
        .post(srv.url("/usuarios/login"))
        .json(&json!({ "email": "nobody@x.com", "password": "secret" }))
        .send()
        .await
        .unwrap();
    let (status, body) = decode(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Usuario no encontrado");
}

#[tokio::test]
async fn validly_signed_token_with_a_stale_session_id_is_rejected() {
    let srv = TestServer::spawn().await;
    let id = srv.seed_user("a@x.com", "administrador").await;
    srv.login("a@x.com").await;

    let forged = mint_jwt(id, "not-the-stored-session");
    let (status, _) = srv.get("/usuarios/me", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_for_the_live_session_is_rejected() {
    let srv = TestServer::spawn().await;
    let id = srv.seed_user("a@x.com", "administrador").await;
    srv.login("a@x.com").await;
    let jti = srv.stored_session(id).await;

    let fresh = mint_jwt(id, &jti);
    let (status, _) = srv.get("/usuarios/me", &fresh).await;
    assert_eq!(status, StatusCode::OK);

    let now = Utc::now();
    let expired = mint_jwt_window(id, &jti, now - ChronoDuration::minutes(10), now - ChronoDuration::minutes(1));
    let (status, body) = srv.get("/usuarios/me", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token inválido o expirado");
}

#[tokio::test]
async fn inactive_users_cannot_log_in() {
    let srv = TestServer::spawn().await;
    srv.seed_user_with("off@x.com", "preparador", Some(false)).await;

    let res = srv
        .http
        .post(srv.url("/usuarios/login"))
        .json(&json!({ "email": "off@x.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    let (status, body) = decode(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Usuario inactivo");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn deactivating_a_user_ends_their_session() {
    let srv = TestServer::spawn().await;
    srv.seed_user("admin@x.com", "administrador").await;
    let prep = srv.seed_user("p@x.com", "preparador").await;
    let admin = srv.login("admin@x.com").await;
    let token = srv.login("p@x.com").await;

    let (status, _) = srv.get("/usuarios/me", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, user) = srv.put(&format!("/usuarios/{prep}"), &admin, json!({ "activo": false })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["activo"], false);

    let (status, body) = srv.get("/usuarios/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn client_role_cannot_create_clients() {
    let srv = TestServer::spawn().await;
    srv.seed_user("c@x.com", "cliente").await;
    let token = srv.login("c@x.com").await;

    let (status, body) = srv
        .post("/clientes", &token, json!({ "nombre_completo": "Ana", "estado_cliente": "nuevo" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn creating_a_client_assigns_the_creator_as_default_preparer() {
    let srv = TestServer::spawn().await;
    let prep = srv.seed_user("p@x.com", "preparador").await;
    let other = srv.seed_user("p2@x.com", "preparador").await;
    let token = srv.login("p@x.com").await;

    let (status, body) = srv
        .post("/clientes", &token, json!({ "nombre_completo": "Ana", "estado_cliente": "nuevo" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["preparador_id"], prep);
    assert_eq!(body["usuario_id"], prep);
    assert_eq!(body["preparador"]["id"], prep);

    let (status, body) = srv
        .post(
            "/clientes",
            &token,
            json!({ "nombre_completo": "Luis", "estado_cliente": "evaluando", "preparador_id": other }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["preparador_id"], other);

    let (status, body) = srv.get("/clientes/mios", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = srv
        .post(
            "/clientes",
            &token,
            json!({ "nombre_completo": "Eva", "estado_cliente": "nuevo", "preparador_id": 999 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn client_role_is_scoped_to_its_own_contracts() {
    let srv = TestServer::spawn().await;
    srv.seed_user("admin@x.com", "administrador").await;
    let me = srv.seed_user("me@x.com", "cliente").await;
    let them = srv.seed_user("them@x.com", "cliente").await;
    let admin = srv.login("admin@x.com").await;
    let mine = srv.login("me@x.com").await;

    let (status, my_client) = srv
        .put("/clientes/mi-perfil", &mine, json!({ "nombre_completo": "Mía Pérez" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(my_client["usuario_id"], me);
    let my_client_id = my_client["id"].as_i64().unwrap();

    let (status, their_client) = srv
        .post(
            &format!("/clientes/de-usuario/{them}"),
            &admin,
            json!({ "nombre_completo": "Otro", "estado_cliente": "activo" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let their_client_id = their_client["id"].as_i64().unwrap();

    let (status, theirs) = srv
        .post("/contratos", &admin, json!({ "cliente_id": their_client_id, "monto_total": "1500.00" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let their_contract = theirs["id"].as_i64().unwrap();
    assert_eq!(theirs["cliente"]["id"], their_client_id);

    let (status, own) = srv
        .post("/contratos", &mine, json!({ "cliente_id": my_client_id, "fecha_firma": "2024-05-01" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let own_contract = own["id"].as_i64().unwrap();

    let (status, _) = srv.post("/contratos", &mine, json!({ "cliente_id": their_client_id })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) = srv.get(&format!("/contratos?cliente_id={their_client_id}"), &mine).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
    assert_eq!(page["data"], json!([]));

    let (status, page) = srv.get("/contratos", &mine).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["id"], own_contract);

    let (status, _) = srv.get(&format!("/contratos/{their_contract}"), &mine).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = srv.put(&format!("/contratos/{their_contract}"), &mine, json!({ "firma": "x" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = srv
        .put(&format!("/contratos/{own_contract}"), &mine, json!({ "cliente_id": their_client_id }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = srv.delete(&format!("/contratos/{own_contract}"), &mine).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, page) = srv.get("/contratos", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn contract_list_validates_and_filters() {
    let srv = TestServer::spawn().await;
    srv.seed_user("admin@x.com", "administrador").await;
    let admin = srv.login("admin@x.com").await;

    let (_, client) = srv
        .post("/clientes", &admin, json!({ "nombre_completo": "José Núñez", "estado_cliente": "nuevo" }))
        .await;
    let client_id = client["id"].as_i64().unwrap();
    for (firma, monto) in [(Some("sig"), "100.00"), (None, "250.50"), (Some("sig2"), "900")] {
        let (status, _) = srv
            .post(
                "/contratos",
                &admin,
                json!({ "cliente_id": client_id, "firma": firma, "monto_total": monto }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = srv.get("/contratos?page=0", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, page) = srv.get("/contratos?firmado=si&order=monto_total&dir=asc", &admin).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 10);

    let (_, page) = srv.get("/contratos?q=nunez&monto_min=200", &admin).await;
    assert_eq!(page["total"], 2);

    let (_, page) = srv.get(&format!("/contratos/cliente/{client_id}"), &admin).await;
    assert_eq!(page["limit"], 50);
    assert_eq!(page["total"], 3);
}

#[tokio::test]
async fn email_conflict_on_update_changes_nothing() {
    let srv = TestServer::spawn().await;
    srv.seed_user("admin@x.com", "administrador").await;
    srv.seed_user("taken@x.com", "preparador").await;
    let target = srv.seed_user("target@x.com", "preparador").await;
    let admin = srv.login("admin@x.com").await;

    let (status, body) = srv
        .put(
            &format!("/usuarios/{target}"),
            &admin,
            json!({ "email": "taken@x.com", "nombre_completo": "Nuevo Nombre" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "El email ya está en uso por otro usuario");

    let (status, user) = srv.get(&format!("/usuarios/{target}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "target@x.com");
    assert_eq!(user["nombre_completo"], "Usuario preparador");
    assert!(user.get("password_hash").is_none());
}

#[tokio::test]
async fn referenced_rows_are_protected_from_deletion() {
    let srv = TestServer::spawn().await;
    srv.seed_user("admin@x.com", "administrador").await;
    let owner = srv.seed_user("c@x.com", "cliente").await;
    let spare = srv.seed_user("spare@x.com", "preparador").await;
    let admin = srv.login("admin@x.com").await;

    let (_, client) = srv
        .post(
            &format!("/clientes/de-usuario/{owner}"),
            &admin,
            json!({ "nombre_completo": "Ana", "estado_cliente": "nuevo" }),
        )
        .await;
    let client_id = client["id"].as_i64().unwrap();
    let (_, contract) = srv.post("/contratos", &admin, json!({ "cliente_id": client_id })).await;
    let contract_id = contract["id"].as_i64().unwrap();

    let (status, _) = srv.delete(&format!("/clientes/{client_id}"), &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = srv.delete(&format!("/usuarios/{owner}"), &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = srv.delete(&format!("/contratos/{contract_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (status, _) = srv.delete(&format!("/clientes/{client_id}"), &admin).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = srv.delete(&format!("/usuarios/{spare}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true, "deletedId": spare }));
    let (status, _) = srv.delete(&format!("/usuarios/{spare}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn own_profile_rules() {
    let srv = TestServer::spawn().await;
    srv.seed_user("c@x.com", "cliente").await;
    let token = srv.login("c@x.com").await;

    let (status, body) = srv.get("/clientes/mi-perfil", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No se encontró perfil de cliente asociado");

    let (status, _) = srv.put("/clientes/mi-perfil", &token, json!({ "preparador_id": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = srv
        .put("/clientes/mi-perfil", &token, json!({ "telefono": "555-0101" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["estado_cliente"], "nuevo");
    assert!(created["preparador_id"].is_null());

    let (status, updated) = srv
        .put("/clientes/mi-perfil", &token, json!({ "pasaporte": "X123" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["telefono"], "555-0101");
    assert_eq!(updated["pasaporte"], "X123");
}

#[tokio::test]
async fn preparer_search_is_staff_only() {
    let srv = TestServer::spawn().await;
    srv.seed_user("admin@x.com", "administrador").await;
    srv.seed_user("maria.prep@x.com", "preparador").await;
    srv.seed_user("c@x.com", "cliente").await;
    let admin = srv.login("admin@x.com").await;
    let client = srv.login("c@x.com").await;

    let (status, body) = srv.get("/usuarios/buscar?rol=preparador&q=MARIA", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = srv.get("/usuarios/buscar?q=maria", &client).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = srv.get("/usuarios/buscar?q=maria&q=jose", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].is_string());
}
