//! Payment methods and the payment state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PaymentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    BankTransfer,
    QrSimple,
    QrProviderA,
    QrProviderB,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 7] = [
        PaymentMethod::Cash,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::BankTransfer,
        PaymentMethod::QrSimple,
        PaymentMethod::QrProviderA,
        PaymentMethod::QrProviderB,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::QrSimple => "qr_simple",
            PaymentMethod::QrProviderA => "qr_provider_a",
            PaymentMethod::QrProviderB => "qr_provider_b",
        }
    }

    /// Human-readable name for receipts and listings.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::CreditCard => "Credit Card",
            PaymentMethod::DebitCard => "Debit Card",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::QrSimple => "Simple QR",
            PaymentMethod::QrProviderA => "Provider A QR",
            PaymentMethod::QrProviderB => "Provider B QR",
        }
    }

    /// QR methods get a scannable instruction at creation.
    pub fn is_qr(&self) -> bool {
        matches!(
            self,
            PaymentMethod::QrSimple | PaymentMethod::QrProviderA | PaymentMethod::QrProviderB
        )
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| PaymentError::Validation(format!("unknown payment method: {s:?}")))
    }
}

/// ```text
/// Pending ──partial──► Processing ──partial/complete──► Completed ──refund──► Refunded
/// Pending | Processing ──fail──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    /// Terminal.
    Refunded,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Processing => "processing",
            PaymentState::Completed => "completed",
            PaymentState::Failed => "failed",
            PaymentState::Refunded => "refunded",
        }
    }

    /// Still collecting money.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentState::Pending | PaymentState::Processing)
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
