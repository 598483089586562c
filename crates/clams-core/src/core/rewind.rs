//! Rewinding
//!
//! Drops the most recent views of a document, counted either in views or in
//! producing apps. The input document is never modified; a rewound copy is
//! returned.

use tracing::info;

use crate::core::mmif::Mmif;

/// How the rewind count is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindUnit {
    /// Count single views
    Views,
    /// Count runs of consecutive views by the same app
    Apps,
}

/// Number of trailing views covered by `count` units
fn views_to_drop(mmif: &Mmif, count: usize, unit: RewindUnit) -> usize {
    let views = mmif.views();
    match unit {
        RewindUnit::Views => count.min(views.len()),
        RewindUnit::Apps => {
            let mut runs = 0;
            let mut dropped = 0;
            let mut current = None;
            for view in views.iter().rev() {
                if current != Some(&view.metadata.app) {
                    if runs == count {
                        break;
                    }
                    runs += 1;
                    current = Some(&view.metadata.app);
                }
                dropped += 1;
            }
            dropped
        }
    }
}

/// Returns a copy of `mmif` without its last `count` views or apps
pub fn rewind(mmif: &Mmif, count: usize, unit: RewindUnit) -> Mmif {
    let drop = views_to_drop(mmif, count, unit);
    let keep = mmif.views().len() - drop;
    info!("Rewinding {} of {} views", drop, mmif.views().len());
    mmif.truncated(keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mmif::Annotation;
    use crate::core::{AppIdentity, MediaKind, ViewId};

    fn app(name: &str) -> AppIdentity {
        AppIdentity::parse(&format!("{}/v1", name)).unwrap()
    }

    /// Views by apps: a, b, b, c
    fn pipeline() -> Mmif {
        let mut mmif = Mmif::new();
        mmif.prime("http://mmif.clams.ai/1.0.5").unwrap();
        mmif.add_document(MediaKind::Video, "file:///a.mp4").unwrap();
        for (name, id) in [("a", "x1"), ("b", "x2"), ("b", "x3"), ("c", "x4")] {
            mmif.produce(&app(name), vec![Annotation::new("TimeFrame", id)])
                .unwrap();
        }
        mmif
    }

    #[test]
    fn test_rewind_views() {
        let mmif = pipeline();
        let rewound = rewind(&mmif, 2, RewindUnit::Views);
        assert_eq!(rewound.views().len(), 2);
        assert_eq!(mmif.views().len(), 4);
        assert_eq!(rewound.next_view_id(), ViewId::new(2));
    }

    #[test]
    fn test_rewind_apps_groups_consecutive_views() {
        let mmif = pipeline();
        assert_eq!(rewind(&mmif, 1, RewindUnit::Apps).views().len(), 3);
        assert_eq!(rewind(&mmif, 2, RewindUnit::Apps).views().len(), 1);
        assert_eq!(rewind(&mmif, 3, RewindUnit::Apps).views().len(), 0);
    }

    #[test]
    fn test_rewind_more_than_available() {
        let mmif = pipeline();
        let rewound = rewind(&mmif, 10, RewindUnit::Views);
        assert!(rewound.views().is_empty());
        assert_eq!(rewound.documents().len(), 1);
        assert_eq!(rewind(&mmif, 0, RewindUnit::Apps).views().len(), 4);
    }

    #[test]
    fn test_rewound_document_accepts_new_views() {
        let mut rewound = rewind(&pipeline(), 1, RewindUnit::Views);
        let id = rewound
            .produce(
                &app("d"),
                vec![Annotation::new("Alignment", "al1").with_property("source", "v_2:x3")],
            )
            .unwrap();
        assert_eq!(id, ViewId::new(3));
        assert!(rewound
            .produce(
                &app("e"),
                vec![Annotation::new("Alignment", "al2").with_property("source", "v_3:x4")],
            )
            .is_err());
    }
}
