//! Console formatting for discussion output

use colored::{Color, Colorize};
use roundtable_domain::{AgentProfile, AgentRole, DiscussionSettings, truncate};

const PALETTE: [Color; 5] = [
    Color::Cyan,
    Color::Magenta,
    Color::Blue,
    Color::Green,
    Color::BrightYellow,
];

/// Formats discussion elements for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Turn colours off for the rest of the process (`[output] color = false`)
    pub fn disable_color() {
        colored::control::set_override(false);
    }

    /// Banner printed before the discussion starts
    pub fn banner(
        title: &str,
        topic: &str,
        cast: &[AgentProfile],
        settings: &DiscussionSettings,
    ) -> String {
        let mut output = String::new();
        output.push_str(&Self::header(title));
        output.push('\n');
        output.push_str(&format!("{} {}\n", "Topic:".cyan().bold(), topic));

        let names: Vec<String> = cast
            .iter()
            .map(|profile| match profile.role {
                AgentRole::Moderator => format!("{} (moderator)", profile.name),
                AgentRole::Participant => profile.name.clone(),
            })
            .collect();
        output.push_str(&format!("{} {}\n", "Seats:".cyan().bold(), names.join(", ")));
        output.push_str(&format!(
            "{} {} messages\n",
            "Budget:".cyan().bold(),
            settings.round_limit
        ));
        output
    }

    /// Colour assigned to the seat at `index`
    pub fn speaker_color(index: usize) -> Color {
        PALETTE[index % PALETTE.len()]
    }

    /// Label that opens a message line, e.g. "Theo: "
    pub fn speaker_label(name: &str, color: Color) -> String {
        format!("{} ", format!("{}:", name).color(color).bold())
    }

    pub fn user_label() -> String {
        format!("{} ", "You:".white().bold())
    }

    /// A notice written by the discussion itself
    pub fn notice(content: &str) -> String {
        format!("{} {}", "!".yellow().bold(), content.yellow())
    }

    /// Pause/resume marker
    pub fn status(text: &str) -> String {
        format!("── {} ──", text).dimmed().to_string()
    }

    pub fn failure(name: &str, error: &str) -> String {
        format!(
            "{} {}",
            format!("{} could not answer:", name).red().bold(),
            truncate(error, 200).red()
        )
    }

    /// Thinking spinner message
    pub fn thinking(name: &str) -> String {
        format!("{} is thinking...", name)
    }

    pub fn header(title: &str) -> String {
        let line = "═".repeat(60);
        format!(
            "\n{}\n{}\n{}\n",
            line.cyan(),
            format!("  {}", title).cyan().bold(),
            line.cyan()
        )
    }

    pub fn footer(messages: usize) -> String {
        format!("\n{}\n", format!("{} messages", messages).dimmed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_banner_lists_seats() {
        plain();
        let cast = vec![
            AgentProfile::new("mod", "Mira", AgentRole::Moderator),
            AgentProfile::new("theo", "Theo", AgentRole::Participant),
        ];
        let banner = ConsoleFormatter::banner(
            "Roundtable",
            "Tabs or spaces",
            &cast,
            &DiscussionSettings::default(),
        );

        assert!(banner.contains("Roundtable"));
        assert!(banner.contains("Topic: Tabs or spaces"));
        assert!(banner.contains("Mira (moderator), Theo"));
    }

    #[test]
    fn test_labels_and_notices() {
        plain();
        assert_eq!(ConsoleFormatter::speaker_label("Theo", Color::Cyan), "Theo: ");
        assert_eq!(ConsoleFormatter::user_label(), "You: ");
        assert_eq!(ConsoleFormatter::notice("paused"), "! paused");
        assert_eq!(ConsoleFormatter::status("paused"), "── paused ──");
        assert_eq!(
            ConsoleFormatter::failure("Sana", "backend down"),
            "Sana could not answer: backend down"
        );
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(
            ConsoleFormatter::speaker_color(0),
            ConsoleFormatter::speaker_color(PALETTE.len())
        );
    }
}
