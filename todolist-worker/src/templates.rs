/// HTML email templates
///
/// Templates are compiled into the binary and use `{{key}}` placeholders.

use todolist_shared::mail::{EmailJob, EmailKind};

const WELCOME: &str = include_str!("../templates/welcome.html");
const OTP_VERIFY: &str = include_str!("../templates/otp_verify.html");
const RESET_PASSWORD_OTP: &str = include_str!("../templates/reset_password_otp.html");

/// A fully rendered message ready for a [`crate::mailer::Mailer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Replaces every `{{key}}` in `template`; unknown placeholders are left as is
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |html, (key, value)| {
        html.replace(&format!("{{{{{key}}}}}"), value)
    })
}

pub fn render(job: &EmailJob) -> RenderedEmail {
    let (subject, html) = match &job.kind {
        EmailKind::Welcome { first_name } => (
            "Welcome to To Do App",
            fill(WELCOME, &[("first_name", first_name)]),
        ),
        EmailKind::VerifyOtp { name, otp } => (
            "Verify your account - To Do App",
            fill(OTP_VERIFY, &[("name", name), ("email", &job.to), ("otp", otp)]),
        ),
        EmailKind::ResetOtp { name, otp } => (
            "Reset your password - To Do App",
            fill(
                RESET_PASSWORD_OTP,
                &[("name", name), ("email", &job.to), ("otp", otp)],
            ),
        ),
    };

    RenderedEmail {
        to: job.to.clone(),
        subject: subject.to_string(),
        html,
    }
}
