//! Invoices and checkout validation.
//!
//! ```text
//!  send_invoice ──▶ user pays ──▶ PreCheckoutQuery ──▶ process_pre_checkout_query
//!                                                        │ answers ok / error
//!                                                        ▼
//!                            Message.successful_payment ──▶ process_successful_payment
//! ```

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ExtensionError, ExtensionResult};
use gramkit_core::{
    Bot, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InvoiceRequest, LabeledPrice, Message,
    PreCheckoutQuery, SendOptions, SuccessfulPayment,
};

/// Fields a payment record must carry.
const REQUIRED_PAYMENT_FIELDS: [&str; 3] = ["currency", "total_amount", "invoice_payload"];

/// Invoice template: provider, currency, price list and checkout options.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentHandler {
    provider_token: String,
    currency: String,
    prices: Vec<LabeledPrice>,
    start_parameter: String,
    need_name: bool,
    need_phone_number: bool,
    need_email: bool,
    need_shipping_address: bool,
    is_flexible: bool,
    send_phone_number_to_provider: bool,
    send_email_to_provider: bool,
}

impl PaymentHandler {
    pub fn new(provider_token: impl Into<String>) -> Self {
        Self {
            provider_token: provider_token.into(),
            currency: "USD".to_string(),
            prices: Vec::new(),
            start_parameter: "payment".to_string(),
            need_name: false,
            need_phone_number: false,
            need_email: false,
            need_shipping_address: false,
            is_flexible: false,
            send_phone_number_to_provider: false,
            send_email_to_provider: false,
        }
    }

    /// Three-letter ISO 4217 code.
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn start_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.start_parameter = parameter.into();
        self
    }

    pub fn need_name(mut self, yes: bool) -> Self {
        self.need_name = yes;
        self
    }

    pub fn need_phone_number(mut self, yes: bool) -> Self {
        self.need_phone_number = yes;
        self
    }

    pub fn need_email(mut self, yes: bool) -> Self {
        self.need_email = yes;
        self
    }

    pub fn need_shipping_address(mut self, yes: bool) -> Self {
        self.need_shipping_address = yes;
        self
    }

    /// Final price depends on the shipping method.
    pub fn flexible(mut self, yes: bool) -> Self {
        self.is_flexible = yes;
        self
    }

    pub fn send_phone_number_to_provider(mut self, yes: bool) -> Self {
        self.send_phone_number_to_provider = yes;
        self
    }

    pub fn send_email_to_provider(mut self, yes: bool) -> Self {
        self.send_email_to_provider = yes;
        self
    }

    /// Appends a price component, in the smallest unit of the currency.
    pub fn add_price(&mut self, label: impl Into<String>, amount: i64) {
        self.prices.push(LabeledPrice::new(label, amount));
    }

    pub fn prices(&self) -> &[LabeledPrice] {
        &self.prices
    }

    pub fn total_amount(&self) -> i64 {
        self.prices.iter().map(|p| p.amount).sum()
    }

    pub fn create_invoice(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        payload: impl Into<String>,
    ) -> InvoiceRequest {
        InvoiceRequest {
            title: title.into(),
            description: description.into(),
            payload: payload.into(),
            provider_token: self.provider_token.clone(),
            currency: self.currency.clone(),
            prices: self.prices.clone(),
            start_parameter: Some(self.start_parameter.clone()),
            photo_url: None,
            need_name: self.need_name,
            need_phone_number: self.need_phone_number,
            need_email: self.need_email,
            need_shipping_address: self.need_shipping_address,
            send_phone_number_to_provider: self.send_phone_number_to_provider,
            send_email_to_provider: self.send_email_to_provider,
            is_flexible: self.is_flexible,
        }
    }

    /// Markup with a single pay button, for use as the invoice's keyboard.
    pub fn payment_button(&self, text: impl Into<String>) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::pay(text)]])
    }

    /// Sends an invoice built from this template.
    ///
    /// Fails with [`ExtensionError::Invalid`] when no price was added.
    pub async fn send_invoice(
        &self,
        bot: &dyn Bot,
        chat_id: impl Into<ChatId>,
        invoice: &InvoiceRequest,
        options: SendOptions,
    ) -> ExtensionResult<Message> {
        if invoice.prices.is_empty() {
            return Err(ExtensionError::invalid("invoice has no prices"));
        }
        let message = bot.send_invoice(chat_id.into(), invoice, options).await?;
        info!(
            payload = %invoice.payload,
            total = invoice.total_amount(),
            currency = %invoice.currency,
            "Invoice sent"
        );
        Ok(message)
    }

    /// Why a checkout should be refused, if it should.
    ///
    /// The currency must match. For fixed-price templates the total must
    /// equal the sum of the configured prices; flexible ones only need a
    /// positive total.
    pub fn check_pre_checkout(&self, query: &PreCheckoutQuery) -> Option<String> {
        if query.currency != self.currency {
            return Some(format!(
                "Unsupported currency {}, expected {}",
                query.currency, self.currency
            ));
        }
        if query.total_amount <= 0 {
            return Some("Invalid amount".to_string());
        }
        if !self.is_flexible && !self.prices.is_empty() && query.total_amount != self.total_amount() {
            return Some("Price has changed, please try again".to_string());
        }
        None
    }

    /// Validates and answers a pre-checkout query. Returns whether the
    /// checkout was accepted.
    pub async fn process_pre_checkout_query(
        &self,
        bot: &dyn Bot,
        query: &PreCheckoutQuery,
    ) -> ExtensionResult<bool> {
        let refusal = self.check_pre_checkout(query);
        bot.answer_pre_checkout_query(&query.id, refusal.is_none(), refusal.as_deref())
            .await?;

        match refusal {
            None => {
                info!(user_id = query.from.id, payload = %query.invoice_payload, "Checkout accepted");
                Ok(true)
            }
            Some(reason) => {
                warn!(user_id = query.from.id, %reason, "Checkout refused");
                Ok(false)
            }
        }
    }

    /// The payment confirmation carried by `message`, logged once found.
    pub fn process_successful_payment<'m>(&self, message: &'m Message) -> Option<&'m SuccessfulPayment> {
        let payment = message.successful_payment.as_ref()?;
        info!(
            user_id = message.sender_id(),
            total = payment.total_amount,
            currency = %payment.currency,
            payload = %payment.invoice_payload,
            charge_id = %payment.telegram_payment_charge_id,
            "Payment received"
        );
        Some(payment)
    }

    /// Whether a raw payment object has the fields needed to reconcile it.
    pub fn validate_payment_data(&self, data: &Value) -> bool {
        data.as_object()
            .is_some_and(|obj| REQUIRED_PAYMENT_FIELDS.iter().all(|f| obj.contains_key(*f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gramkit_core::ApiResult;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockBot {
        calls: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Bot for MockBot {
        async fn call_api(&self, method: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().unwrap().push((method.to_string(), params));
            if method == "sendInvoice" {
                Ok(json!({"message_id": 3, "date": 0, "chat": {"id": 1, "type": "private"}}))
            } else {
                Ok(json!(true))
            }
        }
    }

    fn shop() -> PaymentHandler {
        let mut shop = PaymentHandler::new("provider").currency("EUR").need_email(true);
        shop.add_price("Book", 1500);
        shop.add_price("Shipping", 500);
        shop
    }

    fn query(currency: &str, total: i64) -> PreCheckoutQuery {
        serde_json::from_value(json!({
            "id": "q1",
            "from": {"id": 9, "is_bot": false, "first_name": "B"},
            "currency": currency,
            "total_amount": total,
            "invoice_payload": "order-1"
        }))
        .unwrap()
    }

    #[test]
    fn test_create_invoice() {
        let invoice = shop().create_invoice("Book", "A good one", "order-1");
        assert_eq!(invoice.total_amount(), 2000);
        assert_eq!(invoice.currency, "EUR");
        assert_eq!(invoice.start_parameter.as_deref(), Some("payment"));
        assert!(invoice.need_email);
        assert!(!invoice.need_name);

        let button = &shop().payment_button("Pay 20 EUR").inline_keyboard[0][0];
        assert!(button.pay);
    }

    #[tokio::test]
    async fn test_send_invoice_requires_prices() {
        let bot = MockBot::default();
        let empty = PaymentHandler::new("provider");
        let invoice = empty.create_invoice("t", "d", "p");
        let err = empty
            .send_invoice(&bot, 1_i64, &invoice, SendOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtensionError::Invalid(_)));

        let shop = shop();
        let invoice = shop.create_invoice("t", "d", "p");
        shop.send_invoice(&bot, 1_i64, &invoice, SendOptions::new())
            .await
            .unwrap();
        let calls = bot.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["prices"][1]["amount"], 500);
    }

    #[tokio::test]
    async fn test_pre_checkout_answers() {
        let bot = MockBot::default();
        let shop = shop();

        assert!(shop.process_pre_checkout_query(&bot, &query("EUR", 2000)).await.unwrap());
        assert!(!shop.process_pre_checkout_query(&bot, &query("USD", 2000)).await.unwrap());
        assert!(!shop.process_pre_checkout_query(&bot, &query("EUR", 1999)).await.unwrap());

        let calls = bot.calls.lock().unwrap();
        assert_eq!(calls[0].1["ok"], true);
        assert!(calls[0].1.get("error_message").is_none());
        assert_eq!(calls[1].1["ok"], false);
        assert_eq!(calls[1].1["error_message"], "Unsupported currency USD, expected EUR");
    }

    #[test]
    fn test_flexible_accepts_other_totals() {
        let shop = shop().flexible(true);
        assert_eq!(shop.check_pre_checkout(&query("EUR", 2750)), None);
        assert!(shop.check_pre_checkout(&query("EUR", 0)).is_some());
    }

    #[test]
    fn test_validate_payment_data() {
        let shop = shop();
        assert!(shop.validate_payment_data(&json!({
            "currency": "EUR",
            "total_amount": 100,
            "invoice_payload": "x"
        })));
        assert!(!shop.validate_payment_data(&json!({"currency": "EUR"})));
        assert!(!shop.validate_payment_data(&json!([1, 2])));
    }

    #[test]
    fn test_successful_payment() {
        let message: Message = serde_json::from_value(json!({
            "message_id": 1,
            "date": 0,
            "chat": {"id": 1, "type": "private"},
            "successful_payment": {
                "currency": "EUR",
                "total_amount": 2000,
                "invoice_payload": "order-1",
                "telegram_payment_charge_id": "t",
                "provider_payment_charge_id": "p"
            }
        }))
        .unwrap();
        let payment = shop().process_successful_payment(&message).unwrap();
        assert_eq!(payment.invoice_payload, "order-1");
    }
}
