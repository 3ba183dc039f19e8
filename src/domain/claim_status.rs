/// An email can move from `Unclaimed` to `Claimed` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Unclaimed,
    Claimed,
}

impl ClaimStatus {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimStatus::Claimed)
    }
}

impl From<bool> for ClaimStatus {
    fn from(claimed: bool) -> Self {
        if claimed {
            ClaimStatus::Claimed
        } else {
            ClaimStatus::Unclaimed
        }
    }
}
