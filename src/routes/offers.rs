use actix_web::{
    error::JsonPayloadError,
    http::StatusCode,
    web::{self, Query},
    HttpRequest, HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::Instrument;

use crate::{
    domain::{
        coupon_code::CouponCode,
        new_claim::{NewClaim, SubscribeBody},
        offer_policy::OfferPolicy,
        subscriber_email::SubscriberEmail,
    },
    email_client::EmailClient,
    ledger::{self, OfferError},
};

const COUPON_EMAIL_SUBJECT: &str = "10% OFF your next order";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeResponse {
    message: &'static str,
    coupon_code: String,
    remaining_offers: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemainingResponse {
    remaining_offers: i64,
    total_offers: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    claimed: bool,
    remaining_offers: i64,
}

#[derive(Serialize)]
struct SubscribersResponse {
    count: usize,
    emails: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimResponse {
    success: bool,
    remaining_offers: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_offers: Option<i64>,
}

#[derive(Deserialize, Debug)]
pub struct CheckParameters {
    pub email: Option<String>,
}

#[tracing::instrument(
    name = "Subscribing to the offer handler",
    skip(body, db_pool, email_client, policy),
    fields(subscriber_email = ?body.email)
)]
pub async fn handle_subscribe(
    body: web::Json<SubscribeBody>,
    db_pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    policy: web::Data<OfferPolicy>,
) -> Result<HttpResponse, OfferError> {
    let new_claim = NewClaim::try_from(body).map_err(|err| {
        tracing::error!("Validation error: {:?}", err);
        OfferError::InvalidInput(err)
    })?;

    let claimed = ledger::subscribe(&db_pool, &policy, &new_claim.email).await?;
    let coupon_code = claimed.subscriber.coupon_code.clone();

    // The claim is already committed, the email must not delay nor undo it.
    actix_web::rt::spawn(
        send_coupon_email(
            email_client.into_inner(),
            new_claim.email,
            policy.coupon_code().clone(),
        )
        .in_current_span(),
    );

    Ok(HttpResponse::Ok().json(SubscribeResponse {
        message: "Successfully subscribed",
        coupon_code,
        remaining_offers: claimed.remaining_offers,
    }))
}

#[tracing::instrument(name = "Listing offer subscribers handler", skip(db_pool))]
pub async fn handle_list_subscribers(
    db_pool: web::Data<PgPool>,
) -> Result<HttpResponse, OfferError> {
    let emails: Vec<String> = ledger::list_subscribers(&db_pool)
        .await?
        .into_iter()
        .map(|subscriber| subscriber.email)
        .collect();

    Ok(HttpResponse::Ok().json(SubscribersResponse {
        count: emails.len(),
        emails,
    }))
}

#[tracing::instrument(name = "Remaining offers handler", skip(db_pool, policy))]
pub async fn handle_remaining(
    db_pool: web::Data<PgPool>,
    policy: web::Data<OfferPolicy>,
) -> Result<HttpResponse, OfferError> {
    let remaining = ledger::get_remaining(&db_pool, &policy).await?;

    Ok(HttpResponse::Ok().json(RemainingResponse {
        remaining_offers: remaining.remaining_offers,
        total_offers: remaining.total_offers,
    }))
}

#[tracing::instrument(
    name = "Check claimed offer handler",
    skip(db_pool, policy),
    fields(subscriber_email = ?parameters.email)
)]
pub async fn handle_check_claimed(
    db_pool: web::Data<PgPool>,
    policy: web::Data<OfferPolicy>,
    parameters: Query<CheckParameters>,
) -> Result<HttpResponse, OfferError> {
    let email = parameters
        .into_inner()
        .email
        .ok_or_else(|| OfferError::InvalidInput(String::from("Email is required")))?;
    let check = ledger::check_claimed(&db_pool, &policy, &email).await?;

    Ok(HttpResponse::Ok().json(CheckResponse {
        claimed: check.status.is_claimed(),
        remaining_offers: check.remaining_offers,
    }))
}

/// A missing or unreadable body is a claim without email, it still reports the remaining offers.
#[tracing::instrument(
    name = "Legacy claim offer handler",
    skip(body, db_pool, policy),
    fields(subscriber_email = ?body.as_ref().map(|body| &body.email))
)]
pub async fn handle_claim(
    body: Option<web::Json<SubscribeBody>>,
    db_pool: web::Data<PgPool>,
    policy: web::Data<OfferPolicy>,
) -> Result<HttpResponse, OfferError> {
    let email = match body.and_then(|body| body.into_inner().email) {
        Some(email) if !email.trim().is_empty() => match SubscriberEmail::parse(email) {
            Ok(email) => Some(email),
            Err(err) => {
                tracing::warn!("Ignoring claim for an invalid email: {:?}", err);
                None
            }
        },
        _ => None,
    };
    let remaining_offers = ledger::claim(&db_pool, &policy, email.as_ref()).await?;

    Ok(HttpResponse::Ok().json(ClaimResponse {
        success: true,
        remaining_offers,
    }))
}

/// Error handler of the JSON extractor, so rejected bodies get the same `{message}` shape as any
/// other invalid input.
pub fn reject_json_payload(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::warn!("Rejected request body: {}", err);

    let message = match &err {
        JsonPayloadError::ContentType => "Email is required",
        JsonPayloadError::Deserialize(err) if err.is_eof() => "Email is required",
        JsonPayloadError::Deserialize(_) => "Invalid email format",
        _ => "Invalid request body",
    };

    OfferError::InvalidInput(String::from(message)).into()
}

#[tracing::instrument(
    name = "Send the coupon email to a new offer subscriber",
    skip(email_client, coupon_code),
    fields(subscriber_email = %recipient)
)]
async fn send_coupon_email(
    email_client: std::sync::Arc<EmailClient>,
    recipient: SubscriberEmail,
    coupon_code: CouponCode,
) {
    let html_body = format!(
        r#"
            <div>
                <h2>Thank you for subscribing!</h2>
                <p>As promised, here is your coupon code:</p>
                <p><strong>{}</strong></p>
                <p>Use it at checkout to get <strong>10% off</strong> your next order.</p>
            </div>
        "#,
        coupon_code.as_ref()
    );

    match email_client
        .send_email(&recipient, COUPON_EMAIL_SUBJECT, html_body.as_str())
        .await
    {
        Ok(delivery_id) => tracing::info!(?delivery_id, "Coupon email sent"),
        Err(err) => tracing::error!("Failed to send the coupon email to {}: {:?}", recipient, err),
    }
}

impl ResponseError for OfferError {
    fn status_code(&self) -> StatusCode {
        match self {
            OfferError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OfferError::AlreadyClaimed { .. } => StatusCode::BAD_REQUEST,
            OfferError::QuotaExhausted => StatusCode::BAD_REQUEST,
            OfferError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = self.to_string();
        let body = match self {
            OfferError::InvalidInput(_) => ErrorResponse {
                message: &message,
                coupon_code: None,
                remaining_offers: None,
            },
            OfferError::AlreadyClaimed {
                coupon_code,
                remaining_offers,
            } => ErrorResponse {
                message: &message,
                coupon_code: Some(coupon_code.as_str()),
                remaining_offers: Some(*remaining_offers),
            },
            OfferError::QuotaExhausted => ErrorResponse {
                message: &message,
                coupon_code: None,
                remaining_offers: Some(0),
            },
            OfferError::StoreUnavailable(_) => {
                tracing::error!("Offer ledger store failure: {:?}", self);

                ErrorResponse {
                    message: "Internal server error",
                    coupon_code: None,
                    remaining_offers: None,
                }
            }
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
