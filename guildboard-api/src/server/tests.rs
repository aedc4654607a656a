use crate::{
    config::BoardSettings,
    mail::testing::RecordingMailer,
    media::MediaStore,
    server::{ServerState, notify::Notifier, routes},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use guildboard_common::{
    model::{
        Id,
        auth::{Session, SessionTokenHash},
        comment::CommentStatus,
        user::EmailAddress,
        verification::EmailVerification,
    },
    util::PositiveDuration,
};
use guildboard_db::{memory::MemoryStore, store::Store};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

const PUBLIC_URL: &str = "http://board.test";
const PASSWORD: &str = "correct horse battery";
const BOUNDARY: &str = "guildboard-form-boundary";

struct Board {
    router: Router,
    store: Arc<MemoryStore>,
    mailer: RecordingMailer,
    media: TempDir,
}

impl Board {
    fn new() -> Self {
        Self::with_approval_restricted(false)
    }

    fn with_approval_restricted(approval_requires_post_author: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = RecordingMailer::default();
        let media = tempfile::tempdir().unwrap();
        let settings = BoardSettings {
            public_url: PUBLIC_URL.to_owned(),
            verification_ttl: PositiveDuration::hours(48).unwrap(),
            session_ttl: PositiveDuration::hours(1).unwrap(),
            approval_requires_post_author,
            media_dir: media.path().to_owned(),
        };
        let state = ServerState {
            store: store.clone(),
            notifier: Arc::new(Notifier::new(
                Arc::new(mailer.clone()),
                PUBLIC_URL.to_owned(),
            )),
            media: Arc::new(MediaStore::new(settings.media_dir.clone())),
            settings: Arc::new(settings),
        };

        Self {
            router: routes().with_state(state),
            store,
            mailer,
            media,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => request.body(Body::empty()),
        };

        self.router.clone().oneshot(request.unwrap()).await.unwrap()
    }

    /// Posts `multipart/form-data` with text `fields` and an optional `(file name, contents)`.
    async fn send_form(
        &self,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Response {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\n\
                    Content-Disposition: form-data; name=\"{name}\"\r\n\r\n\
                    {value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, contents)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\n\
                    Content-Disposition: form-data; name=\"attachment\"; \
                    filename=\"{file_name}\"\r\n\
                    Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(contents);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn register(&self, name: &str) -> Value {
        let response = self
            .send(
                Method::POST,
                "/posts/register",
                None,
                Some(json!({
                    "username": name,
                    "email": email_of(name),
                    "first_name": name,
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    async fn login(&self, name: &str) -> String {
        let response = self
            .send(
                Method::POST,
                "/posts/login",
                None,
                Some(json!({ "username": name, "password": PASSWORD })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    async fn create_post(&self, token: &str, title: &str) -> Value {
        let response = self
            .send(
                Method::POST,
                "/posts/create",
                Some(token),
                Some(json!({
                    "title": title,
                    "category": "tanks",
                    "description": "Ищем танка на рейд",
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    async fn comment(&self, token: &str, post_id: u64, body: &str) -> Value {
        let response = self
            .send(
                Method::POST,
                &format!("/posts/{post_id}/comments"),
                Some(token),
                Some(json!({ "body": body })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    /// Path of the verification link most recently mailed to `name`.
    fn verification_path(&self, name: &str) -> String {
        let email = self
            .mailer
            .sent_to(&email_of(name))
            .into_iter()
            .rev()
            .find(|email| email.body.contains("/posts/verify/"))
            .unwrap();
        let start = email.body.find(PUBLIC_URL).unwrap() + PUBLIC_URL.len();
        email.body[start..].to_owned()
    }

    fn subjects_sent_to(&self, name: &str) -> Vec<String> {
        self.mailer
            .sent_to(&email_of(name))
            .into_iter()
            .map(|email| email.subject)
            .collect()
    }
}

fn email_of(name: &str) -> String {
    format!("{name}@guild.example")
}

fn id_of(value: &Value) -> u64 {
    value["id"].as_u64().unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn index_lists_posts_newest_first() {
    let board = Board::new();
    board.register("raider").await;
    let token = board.login("raider").await;
    board.create_post(&token, "Первый").await;
    board.create_post(&token, "Второй").await;

    let response = board.send(Method::GET, "/", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_json(response).await;
    assert_eq!(page["title"], "Главная страница");
    let titles: Vec<_> = page["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["content"]["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Второй", "Первый"]);
}

#[tokio::test]
async fn comment_mails_the_post_author_once() {
    let board = Board::new();
    board.register("leader").await;
    board.register("healer").await;
    let leader = board.login("leader").await;
    let healer = board.login("healer").await;
    let post = board.create_post(&leader, "Нужен хил").await;

    let comment = board.comment(&healer, id_of(&post), "Я хил").await;

    assert_eq!(comment["status"], false);
    let responses = board
        .subjects_sent_to("leader")
        .into_iter()
        .filter(|subject| subject == "У вас новый отклик на объявление!")
        .count();
    assert_eq!(responses, 1);
}

#[tokio::test]
async fn register_login_post_comment_approve() {
    let board = Board::new();
    board.register("alice").await;
    board.register("bob").await;
    let alice = board.login("alice").await;
    let bob = board.login("bob").await;

    let post = board.create_post(&alice, "X").await;
    let comment = board.comment(&bob, id_of(&post), "hello").await;
    assert!(
        board
            .subjects_sent_to("alice")
            .contains(&"У вас новый отклик на объявление!".to_owned())
    );

    let response = board
        .send(
            Method::POST,
            &format!("/posts/comments/{}/approve", id_of(&comment)),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], true);

    assert!(
        board
            .subjects_sent_to("bob")
            .contains(&"Форум MMORPG: Ваш отклик принят!".to_owned())
    );

    let stored = board
        .store
        .fetch_comment(Id::new(id_of(&comment)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, CommentStatus::Approved);
}

#[tokio::test]
async fn approving_twice_keeps_approved_and_mails_again() {
    let board = Board::new();
    board.register("alice").await;
    board.register("bob").await;
    let alice = board.login("alice").await;
    let bob = board.login("bob").await;
    let post = board.create_post(&alice, "X").await;
    let comment = board.comment(&bob, id_of(&post), "hello").await;
    let uri = format!("/posts/comments/{}/approve", id_of(&comment));

    for _ in 0..2 {
        let response = board.send(Method::POST, &uri, Some(&alice), None).await;
        assert_eq!(body_json(response).await["status"], true);
    }

    let accepted = board
        .subjects_sent_to("bob")
        .into_iter()
        .filter(|subject| subject.contains("Ваш отклик принят"))
        .count();
    assert_eq!(accepted, 2);
}

#[tokio::test]
async fn restricted_approval_needs_the_post_author() {
    let board = Board::with_approval_restricted(true);
    board.register("alice").await;
    board.register("bob").await;
    let alice = board.login("alice").await;
    let bob = board.login("bob").await;
    let post = board.create_post(&alice, "X").await;
    let comment = board.comment(&bob, id_of(&post), "hello").await;
    let uri = format!("/posts/comments/{}/approve", id_of(&comment));

    let response = board.send(Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = board.send(Method::POST, &uri, Some(&alice), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unauthenticated_comment_redirects_to_login() {
    let board = Board::new();
    board.register("alice").await;
    let alice = board.login("alice").await;
    let post = board.create_post(&alice, "X").await;

    let response = board
        .send(
            Method::POST,
            &format!("/posts/{}/comments", id_of(&post)),
            None,
            Some(json!({ "body": "hello" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/posts/login");
    let comments = board
        .store
        .fetch_post_comments(Id::new(id_of(&post)))
        .await
        .unwrap();
    assert!(comments.is_empty());
    assert_eq!(board.subjects_sent_to("alice").len(), 1);
}

#[tokio::test]
async fn garbage_token_redirects_to_login() {
    let board = Board::new();

    let response = board
        .send(Method::GET, "/posts/comments", Some("not-a-token"), None)
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/posts/login");
}

#[tokio::test]
async fn comment_on_unknown_post_is_not_found() {
    let board = Board::new();
    board.register("bob").await;
    let bob = board.login("bob").await;

    let response = board
        .send(
            Method::POST,
            "/posts/404/comments",
            Some(&bob),
            Some(json!({ "body": "hello" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "status": 404 }));
}

#[tokio::test]
async fn verification_link_verifies_once() {
    let board = Board::new();
    let user = board.register("newbie").await;
    assert_eq!(user["is_verified_email"], false);
    let path = board.verification_path("newbie");

    let response = board.send(Method::GET, &path, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["is_verified_email"], true);

    let response = board.send(Method::GET, &path, None, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn expired_verification_redirects_to_index() {
    let board = Board::new();
    let user = board.register("latecomer").await;
    let now = OffsetDateTime::now_utc();
    let verification = EmailVerification::issue(
        Id::new(id_of(&user)),
        EmailAddress::new(email_of("latecomer")).unwrap(),
        PositiveDuration::hours(48).unwrap(),
        now - Duration::hours(49),
    );
    assert!(verification.is_expired_at(now));
    board
        .store
        .create_email_verification(&verification)
        .await
        .unwrap();

    let path = format!(
        "/posts/verify/{}/{}",
        email_of("latecomer"),
        verification.code
    );
    let response = board.send(Method::GET, &path, None, None).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let stored = board
        .store
        .fetch_user(Id::new(id_of(&user)))
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_verified_email);
}

#[tokio::test]
async fn verification_for_unknown_email_is_not_found() {
    let board = Board::new();

    let response = board
        .send(
            Method::GET,
            "/posts/verify/ghost@guild.example/AAAAAAAAAAAAAAAAAAAAAA",
            None,
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_edits_a_post() {
    let board = Board::new();
    board.register("alice").await;
    board.register("mallory").await;
    let alice = board.login("alice").await;
    let mallory = board.login("mallory").await;
    let post = board.create_post(&alice, "X").await;
    let uri = format!("/posts/{}", id_of(&post));
    let changes = json!({
        "title": "Y",
        "category": "healers",
        "description": "Ищем хила",
    });

    let response = board
        .send(Method::PUT, &uri, Some(&mallory), Some(changes.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = board.send(Method::DELETE, &uri, Some(&mallory), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = board
        .send(Method::PUT, &uri, Some(&alice), Some(changes))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let post = body_json(response).await;
    assert_eq!(post["content"]["title"], "Y");
    assert_eq!(post["content"]["category"], "healers");

    let response = board.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = board.send(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_comments_are_for_the_post_author() {
    let board = Board::new();
    board.register("alice").await;
    board.register("bob").await;
    let alice = board.login("alice").await;
    let bob = board.login("bob").await;
    let post = board.create_post(&alice, "X").await;
    board.comment(&bob, id_of(&post), "hello").await;
    let uri = format!("/posts/{}/comments", id_of(&post));

    let response = board.send(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = board.send(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = board
        .send(Method::GET, "/posts/comments", Some(&bob), None)
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let board = Board::new();
    board.register("twin").await;

    let response = board
        .send(
            Method::POST,
            "/posts/register",
            None,
            Some(json!({
                "username": "twin",
                "email": "other@guild.example",
                "password": PASSWORD,
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn short_password_is_a_bad_request() {
    let board = Board::new();

    let response = board
        .send(
            Method::POST,
            "/posts/register",
            None,
            Some(json!({
                "username": "hasty",
                "email": email_of("hasty"),
                "password": "short",
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let board = Board::new();
    board.register("alice").await;

    let response = board
        .send(
            Method::POST,
            "/posts/login",
            None,
            Some(json!({ "username": "alice", "password": "not the password" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let board = Board::new();
    board.register("alice").await;
    let alice = board.login("alice").await;

    let response = board
        .send(Method::POST, "/posts/logout", Some(&alice), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = board
        .send(Method::GET, "/posts/comments", Some(&alice), None)
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn profile_is_private_and_editable() {
    let board = Board::new();
    let alice_user = board.register("alice").await;
    let bob_user = board.register("bob").await;
    let alice = board.login("alice").await;
    let own = format!("/posts/profile/{}", id_of(&alice_user));

    let response = board
        .send(
            Method::GET,
            &format!("/posts/profile/{}", id_of(&bob_user)),
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = board
        .send(
            Method::PUT,
            &own,
            Some(&alice),
            Some(json!({ "username": "alice_the_tank", "last_name": "Smith" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = board.send(Method::GET, &own, Some(&alice), None).await;
    let page = body_json(response).await;
    assert_eq!(page["title"], "Личный кабинет");
    assert_eq!(page["user"]["username"], "alice_the_tank");
    assert_eq!(page["user"]["first_name"], "alice");
    assert_eq!(page["user"]["last_name"], "Smith");
    assert_eq!(page["posts"], json!([]));
    assert_eq!(page["my_comments"], json!([]));

    let response = board
        .send(
            Method::PUT,
            &own,
            Some(&alice),
            Some(json!({ "username": "bob" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let board = Board::new();

    let response = board.send(Method::GET, "/guild/hall", None, None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "status": 404 }));
}

const RAID_MAP: &[u8] = b"\x89PNG\r\n\x1a\nraid map";

fn raid_form() -> [(&'static str, &'static str); 3] {
    [
        ("title", "Продам карту рейда"),
        ("category", "traders"),
        ("description", "Карта нижних ярусов"),
    ]
}

#[tokio::test]
async fn uploaded_attachment_is_stored_and_served() {
    let board = Board::new();
    board.register("cartographer").await;
    let token = board.login("cartographer").await;

    let response = board
        .send_form(
            "/posts/create",
            &token,
            &raid_form(),
            Some(("карта рейда.png", RAID_MAP)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let post = body_json(response).await;
    assert_eq!(post["content"]["title"], "Продам карту рейда");
    assert_eq!(post["content"]["category"], "traders");

    let attachment = post["content"]["attachment"].as_str().unwrap().to_owned();
    assert!(attachment.starts_with("posts/"));
    assert!(attachment.ends_with(".png"));
    let stored = board.media.path().join(&attachment);
    assert_eq!(std::fs::read(&stored).unwrap(), RAID_MAP);

    let post_path = format!("/posts/{}", id_of(&post));
    let response = board.send(Method::GET, &post_path, None, None).await;
    assert_eq!(
        body_json(response).await["content"]["attachment"],
        attachment.as_str()
    );

    let media_path = format!("/media/{attachment}");
    let response = board.send(Method::GET, &media_path, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, RAID_MAP);

    let response = board
        .send(Method::DELETE, &post_path, Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!stored.exists());

    let response = board.send(Method::GET, &media_path, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn form_without_file_has_no_attachment() {
    let board = Board::new();
    board.register("cartographer").await;
    let token = board.login("cartographer").await;

    let response = board
        .send_form("/posts/create", &token, &raid_form(), None)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["content"]["attachment"], Value::Null);

    let response = board
        .send_form("/posts/create", &token, &raid_form(), Some(("empty.png", &b""[..])))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["content"]["attachment"], Value::Null);
}

#[tokio::test]
async fn json_post_cannot_name_an_attachment() {
    let board = Board::new();
    board.register("cartographer").await;
    let token = board.login("cartographer").await;

    let response = board
        .send(
            Method::POST,
            "/posts/create",
            Some(&token),
            Some(json!({
                "title": "Чужой файл",
                "category": "traders",
                "description": "",
                "attachment": "posts/0000000000000000-secret.txt",
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["content"]["attachment"], Value::Null);
}

#[tokio::test]
async fn invalid_post_form_is_a_bad_request() {
    let board = Board::new();
    board.register("cartographer").await;
    let token = board.login("cartographer").await;

    let unknown_category = [
        ("title", "Продам карту"),
        ("category", "wizards"),
        ("description", ""),
    ];
    let response = board
        .send_form("/posts/create", &token, &unknown_category, Some(("a.png", RAID_MAP)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing_title = [("category", "traders"), ("description", "")];
    let response = board
        .send_form("/posts/create", &token, &missing_title, None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(board.store.fetch_posts().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_media_is_not_found() {
    let board = Board::new();

    for path in ["/media/posts/missing.png", "/media/posts/.env"] {
        let response = board.send(Method::GET, path, None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn login_drops_expired_sessions() {
    let board = Board::new();
    let user = board.register("alice").await;
    let stale_hash = SessionTokenHash(Box::new([7; 32]));
    board
        .store
        .create_session(&Session {
            user: Id::new(id_of(&user)),
            token_hash: stale_hash.clone(),
            created_at: OffsetDateTime::now_utc() - Duration::hours(2),
            expires_after: Some(PositiveDuration::hours(1).unwrap()),
        })
        .await
        .unwrap();

    board.login("alice").await;

    assert_eq!(board.store.fetch_session(&stale_hash).await.unwrap(), None);
}

#[tokio::test]
async fn registration_drops_expired_verifications() {
    let board = Board::new();
    let user = board.register("latecomer").await;
    let stale = EmailVerification::issue(
        Id::new(id_of(&user)),
        EmailAddress::new(email_of("latecomer")).unwrap(),
        PositiveDuration::hours(48).unwrap(),
        OffsetDateTime::now_utc() - Duration::hours(49),
    );
    board.store.create_email_verification(&stale).await.unwrap();

    board.register("newcomer").await;

    let found = board
        .store
        .fetch_email_verification(Id::new(id_of(&user)), &stale.code)
        .await
        .unwrap();
    assert_eq!(found, None);
}
