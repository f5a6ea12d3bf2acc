//! The submission side of the demo-request form.
//!
//! The host page owns the DOM; this crate owns everything behind it: the
//! localized texts, the shared validation, the single POST to the configured
//! endpoint and the interpretation of its result. The endpoint and the
//! analytics callback are injected at construction, so there is no ambient
//! configuration lookup at submit time.

use demo_request_form::{ApiResponse, SubmissionPayload, ValidationError};
use std::time::Duration;
use tracing::{info, warn};

pub const SUBMIT_LABEL: &str = "Solicitar demo";
pub const SENDING_LABEL: &str = "Enviando...";

pub const SUCCESS_MESSAGE: &str =
    "¡Gracias por contactarnos! Nos pondremos en contacto pronto.";
pub const SIMULATED_MESSAGE: &str =
    "Formulario de prueba: los datos fueron validados pero no enviados.";
pub const MISSING_FIELDS_MESSAGE: &str = "Por favor, complete todos los campos.";
pub const INVALID_EMAIL_MESSAGE: &str = "Por favor, ingrese un email válido.";
pub const GENERIC_ERROR_MESSAGE: &str = "Hubo un error al enviar el formulario. \
     Por favor, intente de nuevo o contáctenos directamente a info@storaapp.com";

/// How long the host page should keep the success message on screen.
pub const SUCCESS_MESSAGE_DURATION: Duration = Duration::from_secs(5);

/// Where submissions go. `Unconfigured` is a first-class mode: submissions
/// are validated and logged but never leave the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Configured(String),
    Unconfigured,
}

impl Endpoint {
    pub fn from_config(value: Option<String>) -> Self {
        match value {
            Some(url) if !url.trim().is_empty() => Endpoint::Configured(url),
            _ => Endpoint::Unconfigured,
        }
    }
}

/// The conversion event emitted when a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    pub category: &'static str,
    pub label: &'static str,
}

impl AnalyticsEvent {
    fn form_submission() -> Self {
        Self {
            name: "form_submission",
            category: "Contact",
            label: "Demo Request",
        }
    }
}

type AnalyticsHook = Box<dyn Fn(&AnalyticsEvent) + Send + Sync>;

pub struct DemoRequestClient {
    endpoint: Endpoint,
    http: reqwest::Client,
    analytics: AnalyticsHook,
}

impl DemoRequestClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
            analytics: Box::new(|_| {}),
        }
    }

    pub fn with_analytics(
        self,
        hook: impl Fn(&AnalyticsEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            analytics: Box::new(hook),
            ..self
        }
    }

    /// Validates and submits one form's worth of field values. A rejected
    /// payload never produces a network call; a failed call is reported, not
    /// retried.
    pub async fn submit(&self, payload: &SubmissionPayload) -> SubmissionOutcome {
        let submission = match payload.validate() {
            Ok(submission) => submission,
            Err(error) => return SubmissionOutcome::Rejected(error),
        };
        let Endpoint::Configured(url) = &self.endpoint else {
            info!("Demo-request endpoint not configured; submission stays local");
            info!(
                "Validated submission: {}",
                serde_json::to_string(&submission).unwrap_or_default()
            );
            return SubmissionOutcome::Simulated;
        };
        let response = match self.http.post(url).json(&submission).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!("Error submitting demo request: {error}");
                return SubmissionOutcome::Failed {
                    detail: error.to_string(),
                };
            }
        };
        let status = response.status();
        let body: ApiResponse = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                warn!("Error reading demo-request response: {error}");
                return SubmissionOutcome::Failed {
                    detail: error.to_string(),
                };
            }
        };
        if status.is_success() && body.success {
            (self.analytics)(&AnalyticsEvent::form_submission());
            SubmissionOutcome::Accepted {
                message_id: body.message_id.unwrap_or_default(),
            }
        } else {
            warn!("Demo request not accepted by server: {}", body.message);
            SubmissionOutcome::Failed {
                detail: body.message,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted { message_id: String },
    Simulated,
    Rejected(ValidationError),
    Failed { detail: String },
}

impl SubmissionOutcome {
    /// The message the host page shows the user, in the form's locale.
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted { .. } => SUCCESS_MESSAGE,
            SubmissionOutcome::Simulated => SIMULATED_MESSAGE,
            SubmissionOutcome::Rejected(ValidationError::MissingField(_)) => {
                MISSING_FIELDS_MESSAGE
            }
            SubmissionOutcome::Rejected(ValidationError::InvalidEmail) => INVALID_EMAIL_MESSAGE,
            SubmissionOutcome::Failed { .. } => GENERIC_ERROR_MESSAGE,
        }
    }
}

/// The blur-validation rule for the email field: mark it only when the user
/// has typed something that fails the shape check.
pub fn email_field_marked_invalid(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !demo_request_form::is_valid_email(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use demo_request_form::Field;
    use googletest::prelude::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use test_support::fake_api::FakeApiGateway;

    fn complete_payload() -> SubmissionPayload {
        SubmissionPayload {
            given_name: "Ana".into(),
            family_name: "Gomez".into(),
            email: "ana@example.com".into(),
            organization: "Acme".into(),
            category: "Retail".into(),
            message: "Quiero una demo".into(),
        }
    }

    #[googletest::test]
    #[tokio::test]
    async fn accepted_submission_returns_the_message_id() {
        let fake_api = FakeApiGateway::accepting("ses-0001");
        let endpoint = Endpoint::Configured(fake_api.start().await);
        let client = DemoRequestClient::new(endpoint);

        let outcome = client.submit(&complete_payload()).await;

        expect_that!(
            outcome,
            eq(&SubmissionOutcome::Accepted {
                message_id: "ses-0001".into()
            })
        );
        expect_that!(outcome.user_message(), eq(SUCCESS_MESSAGE));
        expect_that!(fake_api.hits(), eq(1));
    }

    #[googletest::test]
    #[tokio::test]
    async fn accepted_submission_fires_the_analytics_hook() {
        let fake_api = FakeApiGateway::accepting("ses-0002");
        let endpoint = Endpoint::Configured(fake_api.start().await);
        let events = Arc::new(AtomicUsize::new(0));
        let recorded_events = events.clone();
        let client = DemoRequestClient::new(endpoint).with_analytics(move |event| {
            assert_eq!(event, &AnalyticsEvent::form_submission());
            recorded_events.fetch_add(1, Ordering::SeqCst);
        });

        client.submit(&complete_payload()).await;

        expect_that!(events.load(Ordering::SeqCst), eq(1));
    }

    #[googletest::test]
    #[tokio::test]
    async fn rejected_submission_makes_no_network_call() {
        let fake_api = FakeApiGateway::accepting("unused");
        let endpoint = Endpoint::Configured(fake_api.start().await);
        let client = DemoRequestClient::new(endpoint);
        let payload = SubmissionPayload {
            email: "not-an-email".into(),
            ..complete_payload()
        };

        let outcome = client.submit(&payload).await;

        expect_that!(
            outcome,
            eq(&SubmissionOutcome::Rejected(ValidationError::InvalidEmail))
        );
        expect_that!(outcome.user_message(), eq(INVALID_EMAIL_MESSAGE));
        expect_that!(fake_api.hits(), eq(0));
    }

    #[googletest::test]
    #[tokio::test]
    async fn missing_field_maps_to_the_generic_client_message() {
        let client = DemoRequestClient::new(Endpoint::Unconfigured);
        let payload = SubmissionPayload {
            organization: "  ".into(),
            ..complete_payload()
        };

        let outcome = client.submit(&payload).await;

        expect_that!(
            outcome,
            eq(&SubmissionOutcome::Rejected(ValidationError::MissingField(
                Field::Organization
            )))
        );
        expect_that!(outcome.user_message(), eq(MISSING_FIELDS_MESSAGE));
    }

    #[googletest::test]
    #[tokio::test]
    async fn unconfigured_endpoint_simulates_without_network_calls() {
        let fake_api = FakeApiGateway::accepting("unused");
        fake_api.start().await;
        let client = DemoRequestClient::new(Endpoint::Unconfigured);

        let outcome = client.submit(&complete_payload()).await;

        expect_that!(outcome, eq(&SubmissionOutcome::Simulated));
        expect_that!(outcome.user_message(), eq(SIMULATED_MESSAGE));
        expect_that!(fake_api.hits(), eq(0));
    }

    #[googletest::test]
    #[tokio::test]
    async fn server_rejection_surfaces_the_generic_error_message() {
        let fake_api = FakeApiGateway::rejecting("Email inválido");
        let endpoint = Endpoint::Configured(fake_api.start().await);
        let events = Arc::new(AtomicUsize::new(0));
        let recorded_events = events.clone();
        let client = DemoRequestClient::new(endpoint)
            .with_analytics(move |_| {
                recorded_events.fetch_add(1, Ordering::SeqCst);
            });

        let outcome = client.submit(&complete_payload()).await;

        expect_that!(
            outcome,
            eq(&SubmissionOutcome::Failed {
                detail: "Email inválido".into()
            })
        );
        expect_that!(outcome.user_message(), eq(GENERIC_ERROR_MESSAGE));
        expect_that!(events.load(Ordering::SeqCst), eq(0));
    }

    #[googletest::test]
    #[tokio::test]
    async fn server_failure_surfaces_the_generic_error_message() {
        let fake_api = FakeApiGateway::failing();
        let endpoint = Endpoint::Configured(fake_api.start().await);
        let client = DemoRequestClient::new(endpoint);

        let outcome = client.submit(&complete_payload()).await;

        expect_that!(
            outcome,
            eq(&SubmissionOutcome::Failed {
                detail: "Error al procesar la solicitud".into()
            })
        );
        expect_that!(outcome.user_message(), eq(GENERIC_ERROR_MESSAGE));
    }

    #[googletest::test]
    #[tokio::test]
    async fn network_error_surfaces_the_generic_error_message() {
        // Port 9 (discard) is never listening in the test environment.
        let client =
            DemoRequestClient::new(Endpoint::Configured("http://127.0.0.1:9/contact".into()));

        let outcome = client.submit(&complete_payload()).await;

        expect_that!(
            outcome,
            matches_pattern!(SubmissionOutcome::Failed {
                detail: anything()
            })
        );
        expect_that!(outcome.user_message(), eq(GENERIC_ERROR_MESSAGE));
    }

    #[test]
    fn endpoint_from_config_treats_blank_values_as_unconfigured() -> Result<()> {
        verify_that!(Endpoint::from_config(None), eq(&Endpoint::Unconfigured))?;
        verify_that!(
            Endpoint::from_config(Some("   ".into())),
            eq(&Endpoint::Unconfigured)
        )?;
        verify_that!(
            Endpoint::from_config(Some("https://api.example.com/contact".into())),
            eq(&Endpoint::Configured("https://api.example.com/contact".into()))
        )
    }

    #[test]
    fn email_field_is_marked_only_when_nonempty_and_invalid() -> Result<()> {
        verify_that!(email_field_marked_invalid(""), is_false())?;
        verify_that!(email_field_marked_invalid("   "), is_false())?;
        verify_that!(email_field_marked_invalid("ana@example.com"), is_false())?;
        verify_that!(email_field_marked_invalid("not-an-email"), is_true())
    }
}
