use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

async fn send(ses: &SesClient, from: &str, to: &str, subject: &str, body_text: String) -> Result<(), BoxError> {
    let subject = Content::builder().data(subject).build()?;

    let body = Body::builder()
        .text(Content::builder().data(body_text).build()?)
        .build();

    let message = Message::builder().subject(subject).body(body).build();

    ses.send_email()
        .from_email_address(from)
        .destination(Destination::builder().to_addresses(to).build())
        .content(EmailContent::builder().simple(message).build())
        .send()
        .await?;

    Ok(())
}

pub async fn send_password_reset_code(
    ses: &SesClient,
    from: &str,
    to: &str,
    code: &str,
) -> Result<(), BoxError> {
    let body = format!(
        "Your password reset code is: {code}\n\
         Valid for 5 minutes.\n\n\
         If you did not request this, you can ignore this email."
    );
    send(ses, from, to, "Reset your password", body).await?;
    tracing::info!(to = to, "Password reset code sent");
    Ok(())
}

pub async fn send_order_confirmation(
    ses: &SesClient,
    from: &str,
    to: &str,
    order_number: &str,
    total: f64,
) -> Result<(), BoxError> {
    let body = format!(
        "Thank you for your order {order_number}!\n\
         Total charged: ${total:.2}\n\n\
         Every purchase keeps surplus goods out of the landfill."
    );
    send(ses, from, to, "Order confirmed", body).await?;
    tracing::info!(to = to, order_number = order_number, "Order confirmation sent");
    Ok(())
}

pub async fn send_payment_failed(ses: &SesClient, from: &str, to: &str) -> Result<(), BoxError> {
    let body = "We were unable to process your payment.\n\
         Please check your payment method and try again."
        .to_string();
    send(ses, from, to, "Payment failed", body).await?;
    tracing::info!(to = to, "Payment failed email sent");
    Ok(())
}

pub async fn send_refund_processed(ses: &SesClient, from: &str, to: &str) -> Result<(), BoxError> {
    let body = "Your refund has been processed.\n\
         The amount will be returned to your original payment method."
        .to_string();
    send(ses, from, to, "Refund processed", body).await?;
    tracing::info!(to = to, "Refund processed email sent");
    Ok(())
}

pub async fn send_subscription_activated(
    ses: &SesClient,
    from: &str,
    to: &str,
    plan: &str,
) -> Result<(), BoxError> {
    let body = format!(
        "Your \"{plan}\" subscription has been activated.\n\
         Thank you for selling with the Zero Waste Marketplace!"
    );
    send(ses, from, to, "Subscription activated", body).await?;
    tracing::info!(to = to, plan = plan, "Subscription activated email sent");
    Ok(())
}

pub async fn send_subscription_canceled(
    ses: &SesClient,
    from: &str,
    to: &str,
) -> Result<(), BoxError> {
    let body = "Your subscription has been cancelled.\n\
         If this was a mistake, you can resubscribe at any time."
        .to_string();
    send(ses, from, to, "Subscription cancelled", body).await?;
    tracing::info!(to = to, "Subscription cancelled email sent");
    Ok(())
}
