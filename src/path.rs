/*!
 * Cross-platform path decomposition
 *
 * Paths reach the auditor from several places: the scan root typed by the
 * user, paths produced by the walker, and file-server mount prefixes that may
 * describe a Windows share while the tool runs on Linux. Splitting is done on
 * the string form so a Windows path can be decomposed on any host.
 */

use std::path::MAIN_SEPARATOR;

use once_cell::sync::Lazy;
use regex::Regex;

/// `C:\` followed by at least one character
static DRIVE_LETTER_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]:\\(.+)$").expect("valid drive letter regex"));

/// Marker segment for UNC paths
pub const UNC_PREFIX: &str = r"\\";

/// Where a split path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOrigin {
    /// `C:\dir\file`
    AbsoluteDriveLetter,
    /// `\\server\share\file`
    Unc,
    /// `/dir/file`
    AbsolutePosix,
    /// Anything else, split with the host separator
    Relative,
}

impl PathOrigin {
    /// Separator used when rejoining segments of this origin
    pub fn separator(&self) -> char {
        match self {
            Self::AbsoluteDriveLetter | Self::Unc => '\\',
            Self::AbsolutePosix => '/',
            Self::Relative => MAIN_SEPARATOR,
        }
    }
}

/// Ordered components of a path plus its detected origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegments {
    /// Detected path form
    pub origin: PathOrigin,
    /// Components, never empty
    pub segments: Vec<String>,
}

impl PathSegments {
    /// Rebuild a path string equivalent to the one that was split
    pub fn join(&self) -> String {
        let sep = self.origin.separator().to_string();
        match self.origin {
            PathOrigin::AbsolutePosix => format!("/{}", self.segments.join(&sep)),
            PathOrigin::AbsoluteDriveLetter => match self.segments.split_first() {
                Some((drive, rest)) => format!("{}\\{}", drive, rest.join(&sep)),
                None => String::new(),
            },
            PathOrigin::Unc => {
                let rest = self.segments.get(1..).unwrap_or_default();
                format!("{}{}", UNC_PREFIX, rest.join(&sep))
            }
            PathOrigin::Relative => self.segments.join(&sep),
        }
    }
}

fn is_windows_separator(c: char) -> bool {
    c == '\\' || c == '/'
}

fn split_on(rest: &str, is_sep: fn(char) -> bool) -> impl Iterator<Item = String> + '_ {
    rest.split(is_sep)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
}

/// Decompose a path string into its segments.
///
/// Drive-letter paths keep `C:` as the first segment and UNC paths keep the
/// leading `\\` as the first segment. Repeated and trailing separators never
/// produce empty segments. Input that yields nothing else is returned whole
/// as a single relative segment.
pub fn split_path(path: &str) -> PathSegments {
    let (origin, segments) = detect(path);
    if segments.is_empty() {
        return PathSegments {
            origin: PathOrigin::Relative,
            segments: vec![path.to_string()],
        };
    }

    PathSegments { origin, segments }
}

fn detect(path: &str) -> (PathOrigin, Vec<String>) {
    if DRIVE_LETTER_PATH.is_match(path) {
        let mut segments = vec![path[..2].to_string()];
        segments.extend(split_on(&path[2..], is_windows_separator));
        (PathOrigin::AbsoluteDriveLetter, segments)
    } else if let Some(rest) = path.strip_prefix(UNC_PREFIX) {
        let mut segments = vec![UNC_PREFIX.to_string()];
        segments.extend(split_on(rest, is_windows_separator));
        (PathOrigin::Unc, segments)
    } else if let Some(rest) = path.strip_prefix('/') {
        (PathOrigin::AbsolutePosix, split_on(rest, |c| c == '/').collect())
    } else {
        (
            PathOrigin::Relative,
            split_on(path, std::path::is_separator).collect(),
        )
    }
}

/// Map a server-relative location onto a file-server mount prefix.
///
/// Locations are always forward-slash separated; the result uses the
/// separator of the mount's own form, so a `\\server\share` mount produces a
/// Windows path even when the auditor runs on Linux. A blank mount leaves the
/// location as it is and a `/` mount anchors it at the filesystem root.
pub fn server_path(mount: &str, location: &str) -> String {
    let mount = mount.trim();
    if mount.is_empty() {
        return location.to_string();
    }

    let (origin, mut segments) = detect(mount);
    segments.extend(split_on(location, is_windows_separator));
    PathSegments { origin, segments }.join()
}
