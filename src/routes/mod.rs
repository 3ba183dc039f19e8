mod health_check;
mod offers;

pub use health_check::health_check;
pub use offers::{
    handle_check_claimed, handle_claim, handle_list_subscribers, handle_remaining,
    handle_subscribe, reject_json_payload,
};
