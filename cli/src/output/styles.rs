//! owo-colors stylesheet. The default is plain text.

use owo_colors::Style;

#[derive(Default, Clone, Copy)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    /// `→` progress markers.
    pub step: Style,
    pub dim: Style,
    pub header: Style,
}

impl Styles {
    #[must_use]
    pub fn colored() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            step: Style::new().cyan(),
            dim: Style::new().dimmed(),
            header: Style::new().bold().cyan(),
        }
    }
}
