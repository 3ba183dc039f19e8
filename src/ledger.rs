//! Offer subscription ledger.
//!
//! Every claim is a row in `offer_subscribers`. The `UNIQUE (email)` constraint guarantees a
//! single claim per email and the remaining supply is `total_offers - COUNT(*)`, so there is no
//! counter that could drift from the stored claims.
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{
    claim_status::ClaimStatus,
    offer_policy::OfferPolicy,
    offer_subscriber::OfferSubscriber,
    subscriber_email::{normalize_email, SubscriberEmail},
};

// Key of the transaction scoped advisory lock serializing claims across every instance.
const CLAIM_LOCK_KEY: i64 = 0x6f66_6665_7273;
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Debug)]
pub struct Claimed {
    pub subscriber: OfferSubscriber,
    pub remaining_offers: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemainingOffers {
    pub remaining_offers: i64,
    pub total_offers: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimCheck {
    pub status: ClaimStatus,
    pub remaining_offers: i64,
}

#[derive(thiserror::Error)]
pub enum OfferError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("This email has already claimed the offer")]
    AlreadyClaimed {
        coupon_code: String,
        remaining_offers: i64,
    },
    #[error("Sorry, all offers have been claimed")]
    QuotaExhausted,
    #[error("Failed to reach the offer subscribers store.")]
    StoreUnavailable(#[source] sqlx::Error),
}

impl std::fmt::Debug for OfferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;

        if let Some(source) = std::error::Error::source(self) {
            write!(f, "\nCaused by:\n\t{}", source)?;
        }

        Ok(())
    }
}

/// Registers a claim for `email` unless it already claimed or the quota is gone.
///
/// The existence check, the count and the insert run in one transaction holding
/// the claim advisory lock, so two instances cannot both take the last offer.
#[tracing::instrument(
    name = "Claiming an offer",
    skip(db_pool, policy, email),
    fields(subscriber_email = %email)
)]
pub async fn subscribe(
    db_pool: &PgPool,
    policy: &OfferPolicy,
    email: &SubscriberEmail,
) -> Result<Claimed, OfferError> {
    let mut transaction = db_pool
        .begin()
        .await
        .map_err(OfferError::StoreUnavailable)?;

    lock_claims(&mut transaction).await?;

    let claimed = count_subscribers(&mut transaction).await?;

    if let Some(coupon_code) = find_coupon_code(&mut transaction, email.as_ref()).await? {
        return Err(OfferError::AlreadyClaimed {
            coupon_code,
            remaining_offers: policy.remaining(claimed),
        });
    }

    if policy.is_exhausted(claimed) {
        return Err(OfferError::QuotaExhausted);
    }

    let subscriber = match insert_subscriber(&mut transaction, email, policy).await? {
        Some(subscriber) => subscriber,
        None => {
            tracing::warn!("Claim lost against a concurrent insert for the same email");

            return Err(OfferError::AlreadyClaimed {
                coupon_code: String::from(policy.coupon_code().as_ref()),
                remaining_offers: policy.remaining(claimed),
            });
        }
    };
    let remaining_offers = policy.remaining(count_subscribers(&mut transaction).await?);

    transaction
        .commit()
        .await
        .map_err(OfferError::StoreUnavailable)?;

    Ok(Claimed {
        subscriber,
        remaining_offers,
    })
}

/// Legacy claim: records the email when possible and always reports the remaining supply.
#[tracing::instrument(name = "Claiming an offer through the legacy alias", skip(db_pool, policy))]
pub async fn claim(
    db_pool: &PgPool,
    policy: &OfferPolicy,
    email: Option<&SubscriberEmail>,
) -> Result<i64, OfferError> {
    if let Some(email) = email {
        match subscribe(db_pool, policy, email).await {
            Ok(_) | Err(OfferError::AlreadyClaimed { .. }) | Err(OfferError::QuotaExhausted) => {}
            Err(err) => return Err(err),
        }
    }

    let remaining = get_remaining(db_pool, policy).await?;

    Ok(remaining.remaining_offers)
}

#[tracing::instrument(name = "Getting remaining offers", skip(db_pool, policy))]
pub async fn get_remaining(
    db_pool: &PgPool,
    policy: &OfferPolicy,
) -> Result<RemainingOffers, OfferError> {
    let claimed = sqlx::query("SELECT COUNT(*) AS claimed FROM offer_subscribers")
        .map(|row: PgRow| row.get::<i64, _>("claimed"))
        .fetch_one(db_pool)
        .await
        .map_err(OfferError::StoreUnavailable)?;

    Ok(RemainingOffers {
        remaining_offers: policy.remaining(claimed),
        total_offers: policy.total_offers(),
    })
}

/// Emails are only normalized here, an address that was never valid is just not claimed.
#[tracing::instrument(name = "Checking if an email claimed the offer", skip(db_pool, policy))]
pub async fn check_claimed(
    db_pool: &PgPool,
    policy: &OfferPolicy,
    email: &str,
) -> Result<ClaimCheck, OfferError> {
    let email = normalize_email(email);

    if email.is_empty() {
        return Err(OfferError::InvalidInput(String::from("Email is required")));
    }

    let (claimed, subscribers) = sqlx::query(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM offer_subscribers WHERE email = $1) AS claimed,
            (SELECT COUNT(*) FROM offer_subscribers) AS subscribers
        "#,
    )
    .bind(&email)
    .map(|row: PgRow| (row.get::<bool, _>("claimed"), row.get::<i64, _>("subscribers")))
    .fetch_one(db_pool)
    .await
    .map_err(OfferError::StoreUnavailable)?;

    Ok(ClaimCheck {
        status: ClaimStatus::from(claimed),
        remaining_offers: policy.remaining(subscribers),
    })
}

#[tracing::instrument(name = "Listing offer subscribers", skip(db_pool))]
pub async fn list_subscribers(db_pool: &PgPool) -> Result<Vec<OfferSubscriber>, OfferError> {
    sqlx::query(
        r#"
        SELECT id, email, coupon_code, created_at
        FROM offer_subscribers
        ORDER BY created_at DESC, id
        "#,
    )
    .try_map(|row: PgRow| subscriber_from_row(&row))
    .fetch_all(db_pool)
    .await
    .map_err(|err| {
        tracing::error!("Failed to fetch offer subscribers: {:?}", err);
        OfferError::StoreUnavailable(err)
    })
}

async fn lock_claims(transaction: &mut Transaction<'_, Postgres>) -> Result<(), OfferError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(CLAIM_LOCK_KEY)
        .execute(&mut *transaction)
        .await
        .map_err(OfferError::StoreUnavailable)?;

    Ok(())
}

async fn count_subscribers(transaction: &mut Transaction<'_, Postgres>) -> Result<i64, OfferError> {
    sqlx::query("SELECT COUNT(*) AS claimed FROM offer_subscribers")
        .map(|row: PgRow| row.get::<i64, _>("claimed"))
        .fetch_one(&mut *transaction)
        .await
        .map_err(OfferError::StoreUnavailable)
}

async fn find_coupon_code(
    transaction: &mut Transaction<'_, Postgres>,
    email: &str,
) -> Result<Option<String>, OfferError> {
    sqlx::query("SELECT coupon_code FROM offer_subscribers WHERE email = $1")
        .bind(email)
        .map(|row: PgRow| row.get::<String, _>("coupon_code"))
        .fetch_optional(&mut *transaction)
        .await
        .map_err(OfferError::StoreUnavailable)
}

#[tracing::instrument(
    name = "Insert a new offer subscriber into the database",
    skip(transaction, email, policy)
)]
async fn insert_subscriber(
    transaction: &mut Transaction<'_, Postgres>,
    email: &SubscriberEmail,
    policy: &OfferPolicy,
) -> Result<Option<OfferSubscriber>, OfferError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO offer_subscribers (id, email, coupon_code, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO NOTHING
        RETURNING id, coupon_code, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.as_ref())
    .bind(policy.coupon_code().as_ref())
    .bind(Utc::now())
    .map(|row: PgRow| OfferSubscriber {
        id: row.get("id"),
        email: String::from(email.as_ref()),
        coupon_code: row.get("coupon_code"),
        created_at: row.get("created_at"),
    })
    .fetch_optional(&mut *transaction)
    .await;

    match inserted {
        Ok(subscriber) => Ok(subscriber),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => {
            tracing::error!("Failed to execute query: {:?}", err);
            Err(OfferError::StoreUnavailable(err))
        }
    }
}

// Stored emails are listed as they are, rows written by other tools are not re-validated.
fn subscriber_from_row(row: &PgRow) -> Result<OfferSubscriber, sqlx::Error> {
    Ok(OfferSubscriber {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        coupon_code: row.try_get("coupon_code")?,
        created_at: row.try_get("created_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION_CODE),
        _ => false,
    }
}
