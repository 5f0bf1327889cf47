//! Example conversation shown to new accounts.

use chrono::{Duration, Utc};

use crate::models::{Message, Sender};

pub const EXAMPLE_QUESTION: &str = "What is PM-KISAN scheme and am I eligible?";

pub const EXAMPLE_ANSWER: &str = "# PM-KISAN Scheme

**Pradhan Mantri Kisan Samman Nidhi (PM-KISAN)** is a central government scheme that gives income support to farmer families.

## Key Benefits
- **Rs 6,000 per year** paid to eligible farmer families
- Paid in three equal instalments of **Rs 2,000** every four months
- Money is sent directly to your bank account (DBT)

## Eligibility Criteria
- You belong to a farmer family that owns cultivable land
- Your land records are in your name in the state land records
- Your bank account is linked with Aadhaar
- You are **not** an income tax payer
- You do **not** hold a constitutional post or receive a monthly pension of Rs 10,000 or more

## How to Apply
1. **Visit the portal**: Go to pmkisan.gov.in and choose New Farmer Registration
2. **Enter details**: Provide your Aadhaar number, bank details and land records
3. **Complete e-KYC**: Finish OTP or biometric e-KYC
4. **Track status**: Use the Beneficiary Status page to follow your payments

## Important Notes
- You can also apply at your nearest Common Service Centre (CSC)
- Never pay a middleman to register for this scheme";

/// The user question followed by the AI answer, one second apart.
pub fn example_conversation() -> Vec<Message> {
    let asked_at = Utc::now();
    let mut question = Message::new(Sender::User, EXAMPLE_QUESTION);
    question.created_at = asked_at;
    let mut answer = Message::new(Sender::Ai, EXAMPLE_ANSWER);
    answer.created_at = asked_at + Duration::seconds(1);
    vec![question, answer]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_message_is_the_pm_kisan_answer() {
        let conversation = example_conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].content, EXAMPLE_QUESTION);
        assert_eq!(conversation[1].sender, Sender::Ai);
        assert!(conversation[1].content.starts_with("# PM-KISAN Scheme"));
        assert!(conversation[0].created_at < conversation[1].created_at);
    }
}
