//! The board's emails. Texts are in Russian, like the rest of the board.

use crate::mail::{Email, MailError, Mailer};
use guildboard_common::model::{
    comment::Comment,
    post::Post,
    user::{EmailAddress, User},
    verification::{EmailVerification, VerificationCode},
};
use std::sync::Arc;
use tracing::debug;

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    public_url: String,
}

impl Notifier {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, public_url: String) -> Self {
        Self { mailer, public_url }
    }

    /// Tells the post's author that someone responded to it.
    pub async fn new_response(&self, post: &Post, comment: &Comment) -> Result<(), MailError> {
        let author = &post.author;
        let link = format!("{}/posts/comments/{}", self.public_url, comment.id);

        self.send(Email {
            to: author.email.clone(),
            subject: "У вас новый отклик на объявление!".to_owned(),
            body: format!(
                "Здравствуйте, {}. На ваше объявление «{}» оставили отклик! \
                Посмотреть отклик: {link}",
                author.username, post.content.title
            ),
        })
        .await
    }

    /// Tells the comment's author that the post's author accepted their response.
    pub async fn response_accepted(&self, comment: &Comment, post: &Post) -> Result<(), MailError> {
        let link = format!("{}/posts/comments", self.public_url);

        self.send(Email {
            to: comment.author.email.clone(),
            subject: "Форум MMORPG: Ваш отклик принят!".to_owned(),
            body: format!(
                "Здравствуйте, {}! Автор объявления «{}» принял Ваш отклик! \
                Зайдите в личный кабинет: {link}",
                comment.author.username, post.content.title
            ),
        })
        .await
    }

    pub async fn verification(
        &self,
        user: &User,
        verification: &EmailVerification,
    ) -> Result<(), MailError> {
        let link = self.verification_link(&verification.email, &verification.code);

        self.send(Email {
            to: verification.email.clone(),
            subject: format!("Подтверждение учётной записи {}", user.username),
            body: format!(
                "Здравствуйте, {}! Для подтверждения адреса {} перейдите по ссылке: {link}",
                user.username, verification.email
            ),
        })
        .await
    }

    #[must_use]
    pub fn verification_link(&self, email: &EmailAddress, code: &VerificationCode) -> String {
        format!("{}/posts/verify/{email}/{code}", self.public_url)
    }

    async fn send(&self, email: Email) -> Result<(), MailError> {
        debug!(to = %email.to, subject = %email.subject, "Sending notification");
        self.mailer.send(email).await
    }
}
