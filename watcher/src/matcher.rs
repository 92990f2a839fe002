//! Gitignore-style exclusion matching.
//!
//! Patterns come from a single `.ragignore`-style file and follow gitignore
//! semantics: `#` comments, blank lines, trailing `/` for directory-only
//! patterns, leading `!` negation and `**` multi-segment globs. A missing or
//! unreadable pattern file yields an empty spec that matches nothing.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

/// Classification seam between the pattern engine and its consumers.
///
/// The watch loop and the reconciler only ever ask this one question, so a
/// different engine can be substituted without touching either.
pub trait ExclusionPolicy: Send + Sync {
    /// Whether a root-relative POSIX path is excluded from observation.
    fn is_excluded(&self, relative_path: &str, is_dir: bool) -> bool;
}

/// A compiled set of gitignore-style exclusion patterns.
///
/// Specs are immutable once built; a pattern-file change produces a whole
/// new spec rather than mutating the current one.
pub struct IgnoreSpec {
    matcher: Gitignore,
    pattern_count: usize,
}

impl IgnoreSpec {
    /// Compile the pattern file at `ignore_path`, anchoring patterns at
    /// `root`. A missing or unreadable file is not an error and produces an
    /// empty spec.
    pub fn load(root: &Path, ignore_path: &Path) -> Self {
        if !ignore_path.is_file() {
            debug!("no ignore file at {}", ignore_path.display());
            return Self::empty();
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(ignore_path) {
            warn!(
                "could not read ignore file {}: {err}",
                ignore_path.display()
            );
            return Self::empty();
        }

        match builder.build() {
            Ok(matcher) => {
                let pattern_count = (matcher.num_ignores() + matcher.num_whitelists()) as usize;
                debug!(
                    "loaded {pattern_count} pattern(s) from {}",
                    ignore_path.display()
                );
                Self {
                    matcher,
                    pattern_count,
                }
            }
            Err(err) => {
                warn!("could not compile ignore patterns: {err}");
                Self::empty()
            }
        }
    }

    /// A spec that matches nothing.
    pub fn empty() -> Self {
        Self {
            matcher: Gitignore::empty(),
            pattern_count: 0,
        }
    }

    /// Number of compiled patterns, negations included.
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }
}

impl ExclusionPolicy for IgnoreSpec {
    fn is_excluded(&self, relative_path: &str, is_dir: bool) -> bool {
        // Parent-directory exclusion propagates to everything beneath it.
        self.matcher
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }
}
