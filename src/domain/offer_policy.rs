use crate::domain::coupon_code::CouponCode;

/// Quota and coupon for the offer. Remaining supply is always derived from the number of
/// stored claims, never kept as a counter of its own.
#[derive(Debug, Clone)]
pub struct OfferPolicy {
    total_offers: i64,
    coupon_code: CouponCode,
}

impl OfferPolicy {
    pub fn new(total_offers: u32, coupon_code: CouponCode) -> OfferPolicy {
        OfferPolicy {
            total_offers: i64::from(total_offers),
            coupon_code,
        }
    }

    pub fn total_offers(&self) -> i64 {
        self.total_offers
    }

    pub fn coupon_code(&self) -> &CouponCode {
        &self.coupon_code
    }

    pub fn remaining(&self, claimed: i64) -> i64 {
        (self.total_offers - claimed).max(0)
    }

    pub fn is_exhausted(&self, claimed: i64) -> bool {
        self.remaining(claimed) == 0
    }
}
