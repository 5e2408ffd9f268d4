//! Scannable payment instructions.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use serde::{Deserialize, Serialize};

use crate::money::Money;

use super::PaymentError;

/// Label and lifetime applied to every generated instruction.
#[derive(Debug, Clone)]
pub struct QrSettings {
    pub clinic_label: String,
    pub validity: Duration,
}

impl QrSettings {
    /// Longest lifetime an instruction may be given: one year.
    pub const MAX_VALIDITY_HOURS: i64 = 24 * 366;

    /// `validity_hours` is clamped to `1..=MAX_VALIDITY_HOURS`.
    pub fn new(clinic_label: impl Into<String>, validity_hours: i64) -> Self {
        Self {
            clinic_label: clinic_label.into(),
            validity: Duration::hours(validity_hours.clamp(1, Self::MAX_VALIDITY_HOURS)),
        }
    }
}

impl Default for QrSettings {
    fn default() -> Self {
        Self::new("Veterinary Clinic", 24)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StandardPayload<'a> {
    code: &'a str,
    amount: String,
    description: &'a str,
    clinic_label: &'a str,
    timestamp: DateTime<Utc>,
}

/// A QR payload, its PNG rendering and when it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrInstruction {
    pub payload: String,
    /// Base64 of the PNG image.
    pub image_png: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QrInstruction {
    /// Encodes `payload` and stamps the expiry from `settings`.
    pub fn generate(
        payload: String,
        settings: &QrSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, PaymentError> {
        let expires_at = now.checked_add_signed(settings.validity).ok_or_else(|| {
            PaymentError::Validation(format!(
                "QR validity of {}h is out of range",
                settings.validity.num_hours()
            ))
        })?;
        let png = render_png(&payload)?;
        Ok(Self {
            payload,
            image_png: STANDARD.encode(png),
            generated_at: now,
            expires_at,
        })
    }

    /// JSON object `{code, amount, description, clinicLabel, timestamp}`.
    pub fn standard_payload(
        code: &str,
        amount: Money,
        description: &str,
        settings: &QrSettings,
        now: DateTime<Utc>,
    ) -> Result<String, PaymentError> {
        let payload = StandardPayload {
            code,
            amount: amount.to_string(),
            description,
            clinic_label: &settings.clinic_label,
            timestamp: now,
        };
        serde_json::to_string(&payload).map_err(|e| PaymentError::QrEncoding(e.to_string()))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn png_bytes(&self) -> Result<Vec<u8>, PaymentError> {
        STANDARD
            .decode(&self.image_png)
            .map_err(|e| PaymentError::QrEncoding(e.to_string()))
    }
}

fn render_png(payload: &str) -> Result<Vec<u8>, PaymentError> {
    let code =
        QrCode::new(payload.as_bytes()).map_err(|e| PaymentError::QrEncoding(e.to_string()))?;
    let image = code.render::<Luma<u8>>().build();

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| PaymentError::QrEncoding(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn standard_payload_fields() {
        let now = Utc::now();
        let payload = QrInstruction::standard_payload(
            "PAG-20250110-0001",
            Money::from_major(35),
            "Veterinary services payment",
            &QrSettings::default(),
            now,
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["code"], "PAG-20250110-0001");
        assert_eq!(json["amount"], "35.00");
        assert_eq!(json["clinicLabel"], "Veterinary Clinic");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn generate_renders_png_with_expiry() {
        let now = Utc::now();
        let qr = QrInstruction::generate("hello".to_string(), &QrSettings::default(), now).unwrap();

        assert_eq!(qr.expires_at, now + Duration::hours(24));
        assert!(qr.png_bytes().unwrap().starts_with(&PNG_MAGIC));
        assert!(!qr.is_expired(now + Duration::hours(23)));
        assert!(qr.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn validity_is_clamped_to_a_year() {
        let settings = QrSettings::new("Clinic", 100_000_000_000);
        assert_eq!(
            settings.validity,
            Duration::hours(QrSettings::MAX_VALIDITY_HOURS)
        );
        assert_eq!(QrSettings::new("Clinic", 0).validity, Duration::hours(1));
    }

    #[test]
    fn expiry_past_the_calendar_is_a_validation_error() {
        let settings = QrSettings {
            clinic_label: "Clinic".to_string(),
            validity: Duration::MAX,
        };
        let result = QrInstruction::generate("hello".to_string(), &settings, Utc::now());
        assert!(matches!(result, Err(PaymentError::Validation(_))));
    }

    #[test]
    fn oversized_payload_is_an_encoding_error() {
        let payload = "x".repeat(8_000);
        let result = QrInstruction::generate(payload, &QrSettings::default(), Utc::now());
        assert!(matches!(result, Err(PaymentError::QrEncoding(_))));
    }
}
