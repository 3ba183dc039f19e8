use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug)]
pub struct OfferSubscriber {
    pub id: Uuid,
    pub email: String,
    pub coupon_code: String,
    pub created_at: DateTime<Utc>,
}
