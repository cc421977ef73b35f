// src/notification.rs
//
// Challan (violation notice) rendering and WhatsApp dispatch through a
// Twilio-style messaging API. The pipeline only supplies the data; sending
// is a side effect owned entirely by this collaborator. Without configured
// credentials the send is simulated and logged, so local runs still produce
// a full report.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::violations::{ViolationKind, ViolationTable};

#[derive(Debug, Clone)]
pub struct ChallanDetails {
    pub violation: ViolationKind,
    pub fine_amount: u32,
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub delivered: bool,
    /// Provider message SID; None when the send was simulated.
    pub message_sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

/// Credentials and sender identity, read from the environment the same way
/// the rest of the service picks up collaborator endpoints.
#[derive(Debug, Clone)]
struct TwilioCredentials {
    account_sid: String,
    auth_token: String,
    from_number: String,
}

pub struct ChallanNotifier {
    http_client: reqwest::Client,
    credentials: Option<TwilioCredentials>,
}

impl ChallanNotifier {
    pub fn from_env() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build notification HTTP client")?;

        let credentials = match (
            std::env::var("TWILIO_ACCOUNT_SID"),
            std::env::var("TWILIO_AUTH_TOKEN"),
        ) {
            (Ok(account_sid), Ok(auth_token)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from_number: std::env::var("TWILIO_WHATSAPP_NUMBER")
                    .unwrap_or_else(|_| "whatsapp:+14155238886".to_string()),
            }),
            _ => {
                warn!("📱 Twilio credentials not configured, challan sends will be simulated");
                None
            }
        };

        Ok(Self {
            http_client,
            credentials,
        })
    }

    /// Render the human-readable challan message.
    pub fn render_message(details: &ChallanDetails, table: &ViolationTable) -> String {
        format!(
            "🚔 TRAFFIC CHALLAN GENERATED\n\n\
             🚨 Violation: {}\n\
             💰 Fine Amount: ₹{}\n\
             📍 Location: {}\n\
             ⏰ Time: {}\n\n\
             ⚖️ Please pay your challan within 15 days to avoid additional penalties.\n\n\
             🔗 Pay online: https://parivahan.gov.in\n\
             📞 Helpline: 1800-XXX-XXXX\n\n\
             This is an automated message from the Traffic Monitoring System.",
            table.description_for(details.violation),
            details.fine_amount,
            details.location,
            details.timestamp.format("%d/%m/%Y %H:%M"),
        )
    }

    /// Send a challan to `phone_number` (E.164, with or without the
    /// `whatsapp:` prefix). Returns the provider delivery SID on a real send.
    pub async fn send_challan(
        &self,
        phone_number: &str,
        details: &ChallanDetails,
        table: &ViolationTable,
    ) -> Result<DeliveryReceipt> {
        let to = if phone_number.starts_with("whatsapp:") {
            phone_number.to_string()
        } else {
            format!("whatsapp:{}", phone_number)
        };

        let body = Self::render_message(details, table);

        let Some(creds) = &self.credentials else {
            info!("📱 Simulated challan send to {} (₹{})", to, details.fine_amount);
            return Ok(DeliveryReceipt {
                delivered: true,
                message_sid: None,
            });
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            creds.account_sid,
        );

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&[
                ("From", creds.from_number.as_str()),
                ("To", to.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await
            .context("Challan send request failed")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Messaging API returned {}: {}",
                response.status(),
                response.text().await.unwrap_or_else(|_| "<no body>".to_string()),
            );
        }

        let message: TwilioMessageResponse = response
            .json()
            .await
            .context("Failed to parse messaging API response")?;

        info!("📱 WhatsApp challan sent, SID: {}", message.sid);
        Ok(DeliveryReceipt {
            delivered: true,
            message_sid: Some(message.sid),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_challan_message_contains_core_fields() {
        let table = ViolationTable::standard();
        let details = ChallanDetails {
            violation: ViolationKind::NoHelmet,
            fine_amount: 500,
            location: "MG Road".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap(),
        };
        let message = ChallanNotifier::render_message(&details, &table);

        assert!(message.contains("Riding without helmet"));
        assert!(message.contains("₹500"));
        assert!(message.contains("MG Road"));
        assert!(message.contains("15/03/2024 09:30"));
        assert!(message.contains("TRAFFIC CHALLAN"));
    }
}
