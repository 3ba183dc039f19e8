pub mod claim_status;
pub mod coupon_code;
pub mod new_claim;
pub mod offer_policy;
pub mod offer_subscriber;
pub mod subscriber_email;
