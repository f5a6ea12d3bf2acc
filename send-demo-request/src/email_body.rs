use chrono::{DateTime, FixedOffset, Utc};
use demo_request_form::Submission;
use serde::Serialize;
use tinytemplate::TinyTemplate;

const NOTIFICATION_TEMPLATE_NAME: &str = "notification-email";
const NOTIFICATION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/notification-email.html"
));

// The recipient reads the notification in Bogotá time, which has no DST.
const BOGOTA_UTC_OFFSET_SECONDS: i32 = -5 * 3600;

#[derive(Serialize)]
struct Context<'a> {
    given_name: &'a str,
    family_name: &'a str,
    email: &'a str,
    organization: &'a str,
    category: &'a str,
    message: &'a str,
    timestamp: &'a str,
}

pub fn subject(submission: &Submission) -> String {
    format!("📋 Nueva solicitud de demo - {}", submission.organization)
}

pub fn render_html_body(submission: &Submission, timestamp: &str) -> String {
    let mut tt = TinyTemplate::new();
    tt.add_template(NOTIFICATION_TEMPLATE_NAME, NOTIFICATION_TEMPLATE)
        .unwrap();
    tt.render(
        NOTIFICATION_TEMPLATE_NAME,
        &Context {
            given_name: &submission.given_name,
            family_name: &submission.family_name,
            email: &submission.email,
            organization: &submission.organization,
            category: &submission.category,
            message: &submission.message,
            timestamp,
        },
    )
    .unwrap()
}

pub fn render_text_body(submission: &Submission, timestamp: &str) -> String {
    format!(
        "Nueva Solicitud de Demo - Stora\n\
         ================================\n\
         \n\
         Nombre: {} {}\n\
         Email: {}\n\
         Empresa: {}\n\
         Rubro: {}\n\
         \n\
         Mensaje:\n\
         {}\n\
         \n\
         ---\n\
         Enviado desde: storaapp.com\n\
         Fecha: {}",
        submission.given_name,
        submission.family_name,
        submission.email,
        submission.organization,
        submission.category,
        submission.message,
        timestamp,
    )
}

pub fn current_timestamp() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    let local = instant.with_timezone(&FixedOffset::east_opt(BOGOTA_UTC_OFFSET_SECONDS).unwrap());
    local.format("%-d/%-m/%Y, %H:%M:%S").to_string()
}
