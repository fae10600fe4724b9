//! Status icons shared by every output surface.

use super::theme::CascadeTheme;

/// Canonical status kinds used across all Cascade output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Pipeline succeeded.
    Success,
    /// Pipeline failed or could not be observed.
    Failed,
    /// Pipeline is running.
    Running,
    /// Not started because a dependency's level failed.
    Blocked,
}

impl StatusKind {
    /// Unicode icon for TTY output.
    pub fn icon(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Failed => "✗",
            Self::Running => "◆",
            Self::Blocked => "⊘",
        }
    }

    /// Bracketed text for non-TTY output.
    pub fn bracketed(self) -> &'static str {
        match self {
            Self::Success => "[ok]",
            Self::Failed => "[FAIL]",
            Self::Running => "[run]",
            Self::Blocked => "[blocked]",
        }
    }

    /// Styled icon string using the given theme.
    pub fn styled(self, theme: &CascadeTheme) -> String {
        let icon = self.icon();
        match self {
            Self::Success => theme.success.apply_to(icon).to_string(),
            Self::Failed => theme.error.apply_to(icon).to_string(),
            Self::Running => theme.info.apply_to(icon).to_string(),
            Self::Blocked => theme.warning.apply_to(icon).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_are_distinct() {
        let kinds = [
            StatusKind::Success,
            StatusKind::Failed,
            StatusKind::Running,
            StatusKind::Blocked,
        ];
        let mut icons: Vec<_> = kinds.iter().map(|k| k.icon()).collect();
        icons.dedup();
        assert_eq!(icons.len(), kinds.len());
    }

    #[test]
    fn bracketed_failure_is_loud() {
        assert_eq!(StatusKind::Failed.bracketed(), "[FAIL]");
    }

    #[test]
    fn styled_plain_is_icon() {
        let theme = CascadeTheme::plain();
        assert_eq!(StatusKind::Blocked.styled(&theme), "⊘");
    }
}
