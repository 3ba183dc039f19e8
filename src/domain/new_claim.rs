use actix_web::web;
use serde::Deserialize;

use crate::domain::subscriber_email::SubscriberEmail;

pub struct NewClaim {
    pub email: SubscriberEmail,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub email: Option<String>,
}

impl TryFrom<web::Json<SubscribeBody>> for NewClaim {
    type Error = String;

    fn try_from(body: web::Json<SubscribeBody>) -> Result<Self, Self::Error> {
        let email = match body.into_inner().email {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(String::from("Email is required")),
        };
        let email =
            SubscriberEmail::parse(email).map_err(|_| String::from("Invalid email format"))?;

        Ok(NewClaim { email })
    }
}
