//! Transactional email.
//!
//! Templates render to plain text and HTML. Delivery is fire-and-forget: a
//! failed send is logged and never fails the request that triggered it.

use std::sync::Arc;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use rust_decimal::Decimal;

use crate::config::{SmtpConfig, SmtpTls};
use crate::error::{Error, Result};
use crate::models::application::{ApplicationStatus, Interview, Offer};
use crate::models::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[cfg_attr(test, mockall::automock)]
pub trait Mailer: Send + Sync {
    /// Queues a message for delivery and returns without waiting for it.
    fn send(&self, email: Email) -> Result<()>;
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| Error::Config(format!("Invalid MAIL_FROM: {}", e)))?;

        let builder = match config.tls {
            SmtpTls::StartTls => SmtpTransport::starttls_relay(&config.host),
            SmtpTls::Wrapper => SmtpTransport::relay(&config.host),
            SmtpTls::None => {
                tracing::warn!(host = %config.host, "SMTP_TLS=none, mail is sent unencrypted");
                Ok(SmtpTransport::builder_dangerous(&config.host))
            }
        }
        .map_err(|e| Error::Config(format!("Invalid SMTP host {}: {}", config.host, e)))?;
        let mut builder = builder.port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: Email) -> Result<()> {
        let display = email.to_name.replace(['<', '>', '"'], "");
        let to = format!("{} <{}>", display.trim(), email.to)
            .parse::<Mailbox>()
            .or_else(|_| email.to.parse::<Mailbox>())
            .map_err(|e| Error::BadRequest(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|e| Error::Internal(format!("Failed to build email: {}", e)))?;

        let transport = self.transport.clone();
        let subject = email.subject;
        let recipient = email.to;
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || transport.send(&message)).await;
            match result {
                Ok(Ok(_)) => tracing::info!(to = %recipient, subject = %subject, "email sent"),
                Ok(Err(e)) => {
                    tracing::warn!(to = %recipient, subject = %subject, error = %e, "email delivery failed")
                }
                Err(e) => tracing::error!(error = %e, "email task panicked"),
            }
        });
        Ok(())
    }
}

/// Used when SMTP is not configured.
pub struct NoopMailer;

impl Mailer for NoopMailer {
    fn send(&self, email: Email) -> Result<()> {
        tracing::debug!(to = %email.to, subject = %email.subject, "mail disabled, dropping email");
        Ok(())
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            mailer,
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(smtp: Option<&SmtpConfig>, frontend_url: &str) -> Result<Self> {
        let mailer: Arc<dyn Mailer> = match smtp {
            Some(cfg) => Arc::new(SmtpMailer::new(cfg)?),
            None => {
                tracing::warn!("SMTP_HOST not set, outgoing email is disabled");
                Arc::new(NoopMailer)
            }
        };
        Ok(Self::new(mailer, frontend_url))
    }

    fn deliver(&self, user: &User, rendered: Rendered) {
        let email = Email {
            to: user.email.clone(),
            to_name: user.profile.full_name(),
            subject: rendered.subject,
            text: rendered.text,
            html: rendered.html,
        };
        if let Err(e) = self.mailer.send(email) {
            tracing::warn!(user_id = %user.id, error = %e, "could not queue email");
        }
    }

    pub fn welcome(&self, user: &User) {
        let rendered = templates::welcome(&user.profile.first_name, &self.frontend_url);
        self.deliver(user, rendered);
    }

    pub fn application_received(&self, candidate: &User, job_title: &str) {
        let rendered = templates::application_received(
            &candidate.profile.first_name,
            job_title,
            &self.frontend_url,
        );
        self.deliver(candidate, rendered);
    }

    pub fn new_application(
        &self,
        recruiter: &User,
        candidate: &User,
        job_title: &str,
        application_id: uuid::Uuid,
    ) {
        let link = format!("{}/dashboard/applications/{}", self.frontend_url, application_id);
        let rendered =
            templates::new_application(&candidate.profile.full_name(), job_title, &link);
        self.deliver(recruiter, rendered);
    }

    pub fn status_changed(&self, candidate: &User, job_title: &str, status: ApplicationStatus) {
        let rendered =
            templates::status_changed(&candidate.profile.first_name, job_title, status);
        self.deliver(candidate, rendered);
    }

    pub fn interview_scheduled(&self, candidate: &User, job_title: &str, interview: &Interview) {
        let rendered =
            templates::interview_scheduled(&candidate.profile.first_name, job_title, interview);
        self.deliver(candidate, rendered);
    }

    pub fn offer_extended(&self, candidate: &User, job_title: &str, offer: &Offer) {
        let rendered = templates::offer_extended(
            &candidate.profile.first_name,
            job_title,
            offer,
            &self.frontend_url,
        );
        self.deliver(candidate, rendered);
    }

    pub fn password_reset(&self, user: &User, token: &str, ttl_minutes: i64) {
        let link = format!("{}/reset-password?token={}", self.frontend_url, token);
        let rendered = templates::password_reset(&user.profile.first_name, &link, ttl_minutes);
        self.deliver(user, rendered);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub mod templates {
    use super::*;

    const SIGNATURE: &str = "The Careers Team";

    pub fn escape_html(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }

    fn greeting(first_name: &str) -> String {
        let name = first_name.trim();
        if name.is_empty() {
            "Hello,".to_string()
        } else {
            format!("Hi {},", name)
        }
    }

    /// Wraps paragraphs into both bodies. Paragraph text is escaped for HTML.
    fn compose(subject: String, first_name: &str, paragraphs: &[String]) -> Rendered {
        let greeting = greeting(first_name);
        let mut text = format!("{}\n\n", greeting);
        let mut html = format!("<p>{}</p>", escape_html(&greeting));
        for p in paragraphs {
            text.push_str(p);
            text.push_str("\n\n");
            html.push_str(&format!("<p>{}</p>", escape_html(p)));
        }
        text.push_str(SIGNATURE);
        html.push_str(&format!("<p>{}</p>", SIGNATURE));
        Rendered {
            subject,
            text,
            html,
        }
    }

    pub fn welcome(first_name: &str, frontend_url: &str) -> Rendered {
        compose(
            "Welcome to our careers portal".to_string(),
            first_name,
            &[
                "Your account is ready. You can now browse open positions and track your applications.".to_string(),
                format!("Get started: {}/jobs", frontend_url),
            ],
        )
    }

    pub fn application_received(first_name: &str, job_title: &str, frontend_url: &str) -> Rendered {
        compose(
            format!("We received your application for {}", job_title),
            first_name,
            &[
                format!("Thank you for applying for the {} position. Our team will review your application shortly.", job_title),
                format!("You can follow its progress at {}/applications", frontend_url),
            ],
        )
    }

    pub fn new_application(candidate_name: &str, job_title: &str, link: &str) -> Rendered {
        compose(
            format!("New application for {}", job_title),
            "",
            &[
                format!("{} applied for {}.", candidate_name, job_title),
                format!("Review the application: {}", link),
            ],
        )
    }

    pub fn status_label(status: ApplicationStatus) -> &'static str {
        match status {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under review",
            ApplicationStatus::Shortlisted => "shortlisted",
            ApplicationStatus::InterviewScheduled => "interview scheduled",
            ApplicationStatus::Interviewed => "interviewed",
            ApplicationStatus::OfferExtended => "offer extended",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Rejected => "not selected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn status_changed(first_name: &str, job_title: &str, status: ApplicationStatus) -> Rendered {
        let detail = match status {
            ApplicationStatus::Hired => format!("Congratulations! You have been hired for the {} position.", job_title),
            ApplicationStatus::Rejected => format!(
                "Thank you for your interest in the {} position. We have decided to move forward with other candidates.",
                job_title
            ),
            other => format!(
                "Your application for {} is now: {}.",
                job_title,
                status_label(other)
            ),
        };
        compose(
            format!("Update on your application for {}", job_title),
            first_name,
            &[detail],
        )
    }

    pub fn interview_scheduled(first_name: &str, job_title: &str, interview: &Interview) -> Rendered {
        let mut paragraphs = vec![format!(
            "An interview for the {} position has been scheduled on {} ({} minutes, {}).",
            job_title,
            interview.scheduled_at.format("%A, %B %-d %Y at %H:%M UTC"),
            interview.duration_minutes,
            interview.kind
        )];
        if let Some(location) = interview.location.as_deref().filter(|l| !l.trim().is_empty()) {
            paragraphs.push(format!("Location: {}", location));
        }
        compose(format!("Interview scheduled: {}", job_title), first_name, &paragraphs)
    }

    fn money(amount: Decimal, currency: &str) -> String {
        format!("{} {}", amount.round_dp(2), currency)
    }

    pub fn offer_extended(first_name: &str, job_title: &str, offer: &Offer, frontend_url: &str) -> Rendered {
        let mut paragraphs = vec![format!(
            "We are delighted to offer you the {} position with a salary of {}.",
            job_title,
            money(offer.salary, &offer.currency)
        )];
        if let Some(start) = offer.start_date {
            paragraphs.push(format!("Proposed start date: {}", start.format("%B %-d, %Y")));
        }
        if let Some(expires) = offer.expires_at {
            paragraphs.push(format!(
                "Please respond before {}.",
                expires.format("%B %-d, %Y %H:%M UTC")
            ));
        }
        paragraphs.push(format!("Respond to the offer at {}/applications", frontend_url));
        compose(format!("Job offer: {}", job_title), first_name, &paragraphs)
    }

    pub fn password_reset(first_name: &str, link: &str, ttl_minutes: i64) -> Rendered {
        compose(
            "Reset your password".to_string(),
            first_name,
            &[
                format!("Use the link below to choose a new password. It expires in {} minutes.", ttl_minutes),
                link.to_string(),
                "If you did not request a reset you can ignore this email.".to_string(),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::templates::*;
    use super::*;
    use crate::models::application::{InterviewKind, InterviewStatus, OfferStatus};
    use crate::models::fixtures;
    use chrono::{TimeZone, Utc};
    use mockall::predicate;
    use uuid::Uuid;

    fn smtp(tls: SmtpTls) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: tls.default_port(),
            tls,
            username: Some("mailer".into()),
            password: Some("secret".into()),
            from: "Careers <careers@example.com>".into(),
        }
    }

    #[test]
    fn smtp_transport_builds_for_every_tls_mode() {
        for tls in [SmtpTls::StartTls, SmtpTls::Wrapper, SmtpTls::None] {
            assert!(SmtpMailer::new(&smtp(tls)).is_ok());
        }
        let mut bad_from = smtp(SmtpTls::StartTls);
        bad_from.from = "not an address".into();
        assert!(matches!(SmtpMailer::new(&bad_from), Err(Error::Config(_))));
    }

    #[test]
    fn escapes_markup_in_html_body_only() {
        let rendered = new_application("<b>Eve</b>", "Cook & Helper", "http://x/1");
        assert!(rendered.text.contains("<b>Eve</b> applied for Cook & Helper."));
        assert!(rendered.html.contains("&lt;b&gt;Eve&lt;/b&gt; applied for Cook &amp; Helper."));
        assert_eq!(rendered.subject, "New application for Cook & Helper");
    }

    #[test]
    fn status_templates_vary_by_outcome() {
        let hired = status_changed("Ana", "Teacher", ApplicationStatus::Hired);
        assert!(hired.text.starts_with("Hi Ana,"));
        assert!(hired.text.contains("Congratulations"));

        let review = status_changed("", "Teacher", ApplicationStatus::UnderReview);
        assert!(review.text.starts_with("Hello,"));
        assert!(review.text.contains("is now: under review."));
    }

    #[test]
    fn interview_template_formats_schedule() {
        let interview = Interview {
            id: Uuid::new_v4(),
            scheduled_at: Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap(),
            duration_minutes: 45,
            kind: InterviewKind::Video,
            location: Some("https://meet.example.com/abc".into()),
            interviewer_ids: vec![],
            status: InterviewStatus::Scheduled,
            feedback: None,
            rating: None,
            created_by: Uuid::new_v4(),
        };
        let rendered = interview_scheduled("Ana", "Teacher", &interview);
        assert!(rendered.text.contains("Monday, March 2 2026 at 14:30 UTC (45 minutes, video)"));
        assert!(rendered.text.contains("Location: https://meet.example.com/abc"));
    }

    #[test]
    fn offer_template_includes_salary_and_deadline() {
        let offer = Offer {
            salary: Decimal::new(4850000, 2),
            currency: "USD".into(),
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1),
            expires_at: None,
            notes: None,
            status: OfferStatus::Pending,
            extended_by: Uuid::new_v4(),
            extended_at: Utc::now(),
            responded_at: None,
        };
        let rendered = offer_extended("Ana", "Teacher", &offer, "https://jobs.example.com");
        assert!(rendered.text.contains("salary of 48500.00 USD"));
        assert!(rendered.text.contains("Proposed start date: September 1, 2026"));
        assert!(!rendered.text.contains("Please respond before"));
    }

    #[test]
    fn reset_email_goes_to_user_with_link() {
        let user = fixtures::user("candidate");
        let expected_to = user.email.clone();

        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .with(predicate::function(move |e: &Email| {
                e.to == expected_to
                    && e.to_name == "Sam Rivera"
                    && e.text.contains("https://jobs.example.com/reset-password?token=abc123")
                    && e.text.contains("expires in 60 minutes")
            }))
            .times(1)
            .returning(|_| Ok(()));

        let service = EmailService::new(Arc::new(mailer), "https://jobs.example.com/");
        service.password_reset(&user, "abc123", 60);
    }

    #[test]
    fn send_failures_are_swallowed() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(Error::Internal("smtp down".into())));

        let service = EmailService::new(Arc::new(mailer), "http://localhost:3000");
        service.welcome(&fixtures::user("candidate"));
    }
}
