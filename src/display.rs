//! Text composition for the front-end: title-casing, name + surname, and the
//! shortlist share flow with its clipboard fallback.

use tracing::{debug, error, warn};

use crate::error::{MatchError, Result};

/// Title used when handing the shortlist to a share target.
pub const SHARE_TITLE: &str = "Moje oblíbená jména";

/// Upper-case the first character and lower-case the rest.
pub fn to_title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    }
}

/// Card heading: both name and label title-cased, e.g. `"Eliška Nováková"`.
pub fn full_name(name: &str, label: &str) -> String {
    format!("{} {}", to_title_case(name), to_title_case(label))
        .trim_end()
        .to_string()
}

/// One shortlist line: the name as stored followed by the title-cased label.
pub fn shortlist_entry(name: &str, label: &str) -> String {
    format!("{} {}", name, to_title_case(label)).trim_end().to_string()
}

/// The whole shortlist as newline-separated entries.
pub fn share_text(kept: &[String], label: &str) -> String {
    kept.iter()
        .map(|name| shortlist_entry(name, label))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Share / clipboard collaborators
// ---------------------------------------------------------------------------

/// A system share sheet or equivalent.
///
/// Implementations return [`MatchError::ShareCancelled`] when the user
/// dismisses the sheet and [`MatchError::ShareUnavailable`] when sharing is
/// not possible on this platform.
pub trait ShareTarget {
    fn share(&self, title: &str, text: &str) -> Result<()>;
}

pub trait Clipboard {
    fn copy(&self, text: &str) -> Result<()>;
}

/// What [`share_list`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    /// No share target; the text went to the clipboard instead.
    Copied,
    Cancelled,
    Failed,
}

/// Share `text`, falling back to the clipboard when no share target exists.
pub fn share_list(
    target: Option<&dyn ShareTarget>,
    clipboard: &dyn Clipboard,
    text: &str,
) -> ShareOutcome {
    let Some(target) = target else {
        return copy_fallback(clipboard, text);
    };
    match target.share(SHARE_TITLE, text) {
        Ok(()) => ShareOutcome::Shared,
        Err(MatchError::ShareCancelled) => {
            debug!("share cancelled by user");
            ShareOutcome::Cancelled
        }
        Err(MatchError::ShareUnavailable) => copy_fallback(clipboard, text),
        Err(e) => {
            error!(error = %e, "sharing failed");
            ShareOutcome::Failed
        }
    }
}

fn copy_fallback(clipboard: &dyn Clipboard, text: &str) -> ShareOutcome {
    match clipboard.copy(text) {
        Ok(()) => ShareOutcome::Copied,
        Err(e) => {
            warn!(error = %e, "clipboard copy failed");
            ShareOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_title_case_basic() {
        assert_eq!(to_title_case("novák"), "Novák");
        assert_eq!(to_title_case("NOVÁK"), "Novák");
        assert_eq!(to_title_case(""), "");
    }

    #[test]
    fn test_title_case_non_ascii_first_letter() {
        assert_eq!(to_title_case("šimon"), "Šimon");
        assert_eq!(to_title_case("čERNÁ"), "Černá");
    }

    #[test]
    fn test_full_name_with_and_without_label() {
        assert_eq!(full_name("eliška", "nováková"), "Eliška Nováková");
        assert_eq!(full_name("Jan", ""), "Jan");
    }

    #[test]
    fn test_share_text_joins_lines() {
        let kept = vec!["Eva".to_string(), "Sam".to_string()];
        assert_eq!(share_text(&kept, "novák"), "Eva Novák\nSam Novák");
        assert_eq!(share_text(&[], "novák"), "");
    }

    struct RecordingClipboard(RefCell<Vec<String>>);

    impl Clipboard for RecordingClipboard {
        fn copy(&self, text: &str) -> Result<()> {
            self.0.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    struct FixedShare(fn() -> Result<()>);

    impl ShareTarget for FixedShare {
        fn share(&self, _title: &str, _text: &str) -> Result<()> {
            (self.0)()
        }
    }

    fn clipboard() -> RecordingClipboard {
        RecordingClipboard(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_share_without_target_copies() {
        let cb = clipboard();
        assert_eq!(share_list(None, &cb, "Eva"), ShareOutcome::Copied);
        assert_eq!(cb.0.borrow().as_slice(), ["Eva".to_string()]);
    }

    #[test]
    fn test_share_success_does_not_copy() {
        let cb = clipboard();
        let target = FixedShare(|| Ok(()));
        assert_eq!(share_list(Some(&target as &dyn ShareTarget), &cb, "Eva"), ShareOutcome::Shared);
        assert!(cb.0.borrow().is_empty());
    }

    #[test]
    fn test_share_cancel_is_silent() {
        let cb = clipboard();
        let target = FixedShare(|| Err(MatchError::ShareCancelled));
        assert_eq!(share_list(Some(&target as &dyn ShareTarget), &cb, "Eva"), ShareOutcome::Cancelled);
        assert!(cb.0.borrow().is_empty());
    }

    #[test]
    fn test_share_unavailable_falls_back_to_copy() {
        let cb = clipboard();
        let target = FixedShare(|| Err(MatchError::ShareUnavailable));
        assert_eq!(share_list(Some(&target as &dyn ShareTarget), &cb, "Eva"), ShareOutcome::Copied);
    }

    #[test]
    fn test_share_failure_reported() {
        let cb = clipboard();
        let target = FixedShare(|| Err(MatchError::Share("boom".into())));
        assert_eq!(share_list(Some(&target as &dyn ShareTarget), &cb, "Eva"), ShareOutcome::Failed);
    }
}
