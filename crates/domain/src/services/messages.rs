//! Email bodies for attendance notifications.

use crate::models::{Event, User};
use crate::services::notification::EmailMessage;

/// Links embedded in an attendance email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLinks {
    pub event_url: String,
    /// Cancel link for bookings and reminders, book link for cancellations.
    pub action_url: String,
}

/// Confirmation sent after a booking, with a link to cancel.
pub fn booking_confirmation(user: &User, event: &Event, links: &MessageLinks) -> EmailMessage {
    let subject = format!("Your booking for {}: {}", event_date(event), event.title);
    let intro = format!(
        "Your seat for \"{}\" on {} is booked.",
        event.title,
        event_datetime(event)
    );
    let outro = "Can't make it after all? Please free your seat for someone else:";

    compose(
        user,
        subject,
        &intro,
        outro,
        ("Cancel my booking", &links.action_url),
        &links.event_url,
    )
}

/// Confirmation sent after a cancellation, with a link to book again.
pub fn cancellation_confirmation(
    user: &User,
    event: &Event,
    links: &MessageLinks,
) -> EmailMessage {
    let subject = format!("Booking cancelled: {}", event.title);
    let intro = format!(
        "Your booking for \"{}\" on {} has been cancelled.",
        event.title,
        event_datetime(event)
    );
    let outro = "Changed your mind? You can book again while seats remain:";

    compose(
        user,
        subject,
        &intro,
        outro,
        ("Book again", &links.action_url),
        &links.event_url,
    )
}

/// Day-before reminder for registered users.
pub fn event_reminder(user: &User, event: &Event, links: &MessageLinks) -> EmailMessage {
    let subject = format!("Reminder: {} on {}", event.title, event_date(event));
    let intro = format!(
        "This is a reminder that \"{}\" starts on {}.",
        event.title,
        event_datetime(event)
    );
    let outro = "If you can no longer attend, please cancel your booking:";

    compose(
        user,
        subject,
        &intro,
        outro,
        ("Cancel my booking", &links.action_url),
        &links.event_url,
    )
}

fn event_date(event: &Event) -> String {
    event.starts_at.format("%d %B").to_string()
}

fn event_datetime(event: &Event) -> String {
    event.starts_at.format("%d %B %Y at %H:%M UTC").to_string()
}

fn compose(
    user: &User,
    subject: String,
    intro: &str,
    outro: &str,
    (button_label, button_url): (&str, &str),
    event_url: &str,
) -> EmailMessage {
    let name = user.display_name();
    let greeting = name.as_ref().map(|n| format!(" {}", n)).unwrap_or_default();

    let body_text = format!(
        r#"Hi{greeting},

{intro}

Event page: {event_url}

{outro}
{button_url}

See you soon,
The Atelier team"#
    );

    let body_html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, Helvetica, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <p>Hi{greeting},</p>
    <p>{intro}</p>
    <p><a href="{event_url}" style="color: #c0392b;">View the event</a></p>
    <p>{outro}</p>
    <div style="text-align: center; margin: 30px 0;">
        <a href="{button_url}" style="background: #c0392b; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; font-weight: bold; display: inline-block;">{button_label}</a>
    </div>
    <p style="color: #999; font-size: 12px;">The Atelier team</p>
</body>
</html>"#,
        title = escape_html(&subject),
        greeting = escape_html(&greeting),
        intro = escape_html(intro),
        event_url = escape_html(event_url),
        outro = escape_html(outro),
        button_url = escape_html(button_url),
        button_label = escape_html(button_label),
    );

    EmailMessage {
        to: user.email.clone(),
        to_name: name,
        subject,
        body_text,
        body_html: Some(body_html),
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
