use colored::Color;
use once_cell::sync::Lazy;

/// CLI color theme
pub struct ColorTheme {
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub primary: Color,
    pub secondary: Color,
    pub key: Color,
    pub value: Color,
    /// Membership added by a toggle
    pub added: Color,
    /// Membership removed by a toggle
    pub removed: Color,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            info: Color::Blue,
            highlight: Color::Cyan,
            muted: Color::BrightBlack,
            primary: Color::TrueColor { r: 255, g: 0, b: 81 },
            secondary: Color::Magenta,
            key: Color::BrightCyan,
            value: Color::White,
            added: Color::BrightGreen,
            removed: Color::BrightRed,
        }
    }
}

pub static THEME: Lazy<ColorTheme> = Lazy::new(ColorTheme::default);

pub struct Icons {
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
    pub arrow: &'static str,
    pub bullet: &'static str,
    pub loading: &'static str,
    pub added: &'static str,
    pub removed: &'static str,
    pub unread: &'static str,
}

pub const ICONS: Icons = Icons {
    success: "✓",
    error: "✗",
    warning: "⚠",
    info: "ℹ",
    arrow: "→",
    bullet: "•",
    loading: "⟳",
    added: "+",
    removed: "-",
    unread: "●",
};
