//! Built-in notification templates with `{variable}` substitution.

use std::collections::HashMap;

use super::notification::{NotificationKind, Priority};

/// A reusable notification text with placeholders.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    /// Registry key.
    pub name: &'static str,
    /// Kind assigned to notifications rendered from this template.
    pub kind: NotificationKind,
    /// Priority assigned to notifications rendered from this template.
    pub priority: Priority,
    /// Title with `{variable}` placeholders.
    pub title: &'static str,
    /// Message with `{variable}` placeholders.
    pub message: &'static str,
}

/// Payment nudge for an unpaid booking.
pub const BOOKING_REMINDER: Template = Template {
    name: "booking_reminder",
    kind: NotificationKind::PaymentReminder,
    priority: Priority::High,
    title: "Payment reminder for {booking_number}",
    message: "Your booking {booking_number} has been awaiting payment for {days} days. \
              Complete the payment to start your coral's journey.",
};

/// Heads-up before a scheduled session.
pub const EXPERIENCE_REMINDER: Template = Template {
    name: "experience_reminder",
    kind: NotificationKind::ExperienceReminder,
    priority: Priority::High,
    title: "Upcoming experience: {title}",
    message: "Your experience {title} at {location} starts in {hours} hours. \
              Please arrive 15 minutes early for check-in.",
};

/// Adverse weather at an experience site.
pub const WEATHER_WARNING: Template = Template {
    name: "weather_warning",
    kind: NotificationKind::WeatherAlert,
    priority: Priority::Urgent,
    title: "Weather warning for {location}",
    message: "Adverse weather ({conditions}) is expected at {location}. \
              Your experience {title} may be rescheduled; we will keep you posted.",
};

/// Marketing promotion shell.
pub const PROMOTION: Template = Template {
    name: "promotion",
    kind: NotificationKind::Promotion,
    priority: Priority::Low,
    title: "{headline}",
    message: "{body}",
};

/// Planned downtime announcement.
pub const MAINTENANCE: Template = Template {
    name: "maintenance",
    kind: NotificationKind::Announcement,
    priority: Priority::Normal,
    title: "Scheduled maintenance",
    message: "Reefbook will be unavailable on {date} from {start} to {end} for maintenance.",
};

/// The built-in template registry.
pub const BUILT_IN: &[Template] = &[
    BOOKING_REMINDER,
    EXPERIENCE_REMINDER,
    WEATHER_WARNING,
    PROMOTION,
    MAINTENANCE,
];

/// Look up a built-in template by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Template> {
    BUILT_IN.iter().find(|t| t.name == name)
}

/// Substitute `{variable}` placeholders. Placeholders without a matching
/// variable are left intact.
#[must_use]
pub fn render(text: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = text.to_owned();
    for (name, value) in variables {
        rendered = rendered.replace(&format!("{{{name}}}"), value);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_variables() {
        // Arrange
        let variables = HashMap::from([
            ("booking_number".to_owned(), "CR17370042".to_owned()),
            ("days".to_owned(), "3".to_owned()),
        ]);

        // Act
        let rendered = render("Booking {booking_number}: {days} days", &variables);

        // Assert
        assert_eq!(rendered, "Booking CR17370042: 3 days");
    }

    #[test]
    fn test_render_leaves_unknown_variables_intact() {
        // Arrange
        let variables = HashMap::from([("known".to_owned(), "yes".to_owned())]);

        // Act
        let rendered = render("{known} and {unknown}", &variables);

        // Assert
        assert_eq!(rendered, "yes and {unknown}");
    }

    #[test]
    fn test_find_returns_registered_templates() {
        // Arrange / Act / Assert
        assert!(find("weather_warning").is_some());
        assert!(find("booking_reminder").is_some());
        assert!(find("no_such_template").is_none());
    }
}
