use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::config::config_model::Smtp;
use crate::notifications::{
    BookingCancellationNotification, NotificationDispatcher, NotificationError,
    PaymentNotification,
};

pub struct SmtpNotificationDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    send_timeout: Duration,
}

impl SmtpNotificationDispatcher {
    pub fn new(config: &Smtp) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            sender: config.sender.parse()?,
            send_timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: String,
    ) -> Result<(), NotificationError> {
        let recipient: Mailbox = recipient
            .parse()
            .map_err(|_| NotificationError::Send("invalid recipient address".to_string()))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .body(body)
            .map_err(|err| NotificationError::Send(err.to_string()))?;

        let send = self.transport.send(message);
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(_)) => {
                info!(subject, "notifications: email sent");
                Ok(())
            }
            Ok(Err(err)) => {
                error!(subject, error = %err, "notifications: smtp send failed");
                Err(NotificationError::Send(err.to_string()))
            }
            Err(_) => {
                error!(subject, "notifications: smtp send timed out");
                Err(NotificationError::Timeout)
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for SmtpNotificationDispatcher {
    async fn booking_confirmed(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), NotificationError> {
        let receipt_line = match &notification.receipt_url {
            Some(url) => format!("Your receipt: {url}\n"),
            None => String::new(),
        };
        let body = format!(
            "Your booking #{} is confirmed.\n\n\
             We received your payment of {} {} via {}.\n\
             {receipt_line}\nThank you for booking with us.",
            notification.booking_id,
            notification.amount,
            notification.currency,
            notification.gateway,
        );

        self.send(&notification.recipient, "Booking confirmed", body)
            .await
    }

    async fn payment_failed(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), NotificationError> {
        let body = format!(
            "Your payment of {} {} for booking #{} could not be processed.\n\n\
             No charge was applied. Please try again or choose another payment method.",
            notification.amount, notification.currency, notification.booking_id,
        );

        self.send(&notification.recipient, "Payment failed", body)
            .await
    }

    async fn payment_refunded(
        &self,
        notification: &PaymentNotification,
    ) -> Result<(), NotificationError> {
        let body = format!(
            "Your payment of {} {} for booking #{} has been refunded.\n\n\
             Depending on your bank, the refund may take a few business days to appear.",
            notification.amount, notification.currency, notification.booking_id,
        );

        self.send(&notification.recipient, "Payment refunded", body)
            .await
    }

    async fn booking_cancelled(
        &self,
        notification: &BookingCancellationNotification,
    ) -> Result<(), NotificationError> {
        let body = format!(
            "Your booking #{} on {} at {} has been cancelled.\n\n\
             If this was a mistake, you can rebook subject to availability.",
            notification.booking_id, notification.date, notification.start_time,
        );

        self.send(&notification.recipient, "Booking cancelled", body)
            .await
    }
}
