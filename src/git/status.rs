//! Repository status model and porcelain parsing
//!
//! A [`RepositorySummary`] is derived on demand from
//! `git status --porcelain=v1 -z --branch` and is never cached: the working
//! tree may change out-of-band at any time.

use serde::Serialize;

/// Semantic state of one changed path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Untracked,
    Ignored,
    Conflicted,
}

impl FileState {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            b'A' => Some(FileState::Added),
            b'M' => Some(FileState::Modified),
            b'D' => Some(FileState::Deleted),
            b'R' => Some(FileState::Renamed),
            b'C' => Some(FileState::Copied),
            b'T' => Some(FileState::TypeChanged),
            _ => None,
        }
    }

    /// Returns the emoji symbol for this state
    pub fn symbol(&self) -> &str {
        match self {
            FileState::Added | FileState::Untracked => "🟢",
            FileState::Modified
            | FileState::Renamed
            | FileState::Copied
            | FileState::TypeChanged => {
                "🟡"
            }
            FileState::Deleted | FileState::Conflicted => "🔴",
            FileState::Ignored => "⚪",
        }
    }

    /// Returns the text representation of this state
    pub fn text(&self) -> &str {
        match self {
            FileState::Added => "added",
            FileState::Modified => "modified",
            FileState::Deleted => "deleted",
            FileState::Renamed => "renamed",
            FileState::Copied => "copied",
            FileState::TypeChanged => "typechange",
            FileState::Untracked => "untracked",
            FileState::Ignored => "ignored",
            FileState::Conflicted => "conflicted",
        }
    }
}

/// One changed path, either in the index (`is_staged`) or in the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryStatusElement {
    pub path: String,
    pub state: FileState,
    pub is_staged: bool,
    /// Source path of a rename or copy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

/// Point-in-time view of a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RepositorySummary {
    pub elements: Vec<RepositoryStatusElement>,
    /// `None` when HEAD is detached
    pub branch: Option<String>,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
    pub remote_url: Option<String>,
}

impl RepositorySummary {
    pub fn is_clean(&self) -> bool {
        self.elements.is_empty()
    }

    /// True if any tracked file differs from HEAD (untracked/ignored files don't count)
    pub fn has_tracked_changes(&self) -> bool {
        self.elements
            .iter()
            .any(|e| !matches!(e.state, FileState::Untracked | FileState::Ignored))
    }

    pub fn has_staged_changes(&self) -> bool {
        self.elements.iter().any(|e| e.is_staged)
    }

    /// All elements for `path` (a path may appear once staged and once unstaged)
    pub fn elements_for<'a>(
        &'a self,
        path: &'a str,
    ) -> impl Iterator<Item = &'a RepositoryStatusElement> {
        self.elements.iter().filter(move |e| e.path == path)
    }
}

/// Branch header of porcelain v1 output (`## ...`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct BranchHeader {
    pub branch: Option<String>,
    pub upstream: Option<String>,
    pub ahead: u32,
    pub behind: u32,
}

pub(crate) fn parse_branch_header(line: &str) -> BranchHeader {
    let body = line.trim_start_matches("## ").trim();
    let mut header = BranchHeader::default();

    if body.starts_with("HEAD (no branch)") {
        return header;
    }
    for prefix in ["No commits yet on ", "Initial commit on "] {
        if let Some(branch) = body.strip_prefix(prefix) {
            header.branch = Some(branch.to_string());
            return header;
        }
    }

    let (refs, tracking) = match body.find(" [") {
        Some(idx) => (&body[..idx], Some(body[idx + 2..].trim_end_matches(']'))),
        None => (body, None),
    };

    match refs.split_once("...") {
        Some((local, upstream)) => {
            header.branch = Some(local.to_string());
            header.upstream = Some(upstream.to_string());
        }
        None => header.branch = Some(refs.to_string()),
    }

    if let Some(tracking) = tracking {
        for part in tracking.split(", ") {
            if let Some(n) = part.strip_prefix("ahead ") {
                header.ahead = n.trim().parse().unwrap_or(0);
            } else if let Some(n) = part.strip_prefix("behind ") {
                header.behind = n.trim().parse().unwrap_or(0);
            }
        }
    }

    header
}

fn is_conflict(x: u8, y: u8) -> bool {
    matches!(
        (x, y),
        (b'D', b'D')
            | (b'A', b'U')
            | (b'U', b'D')
            | (b'U', b'A')
            | (b'D', b'U')
            | (b'A', b'A')
            | (b'U', b'U')
    )
}

/// Parses `git status --porcelain=v1 -z --branch` output
pub(crate) fn parse_porcelain(output: &str) -> (BranchHeader, Vec<RepositoryStatusElement>) {
    let mut header = BranchHeader::default();
    let mut elements = Vec::new();
    let mut records = output.split('\0').filter(|r| !r.is_empty());

    while let Some(record) = records.next() {
        if record.starts_with("## ") {
            header = parse_branch_header(record);
            continue;
        }
        if record.len() < 4 {
            continue;
        }

        let bytes = record.as_bytes();
        let (x, y) = (bytes[0], bytes[1]);
        let path = record[3..].to_string();

        // Renames and copies carry the source path as the next record
        let original_path = if matches!(x, b'R' | b'C') || matches!(y, b'R' | b'C') {
            records.next().map(str::to_string)
        } else {
            None
        };

        match (x, y) {
            (b'?', b'?') => elements.push(RepositoryStatusElement {
                path,
                state: FileState::Untracked,
                is_staged: false,
                original_path: None,
            }),
            (b'!', b'!') => elements.push(RepositoryStatusElement {
                path,
                state: FileState::Ignored,
                is_staged: false,
                original_path: None,
            }),
            _ if is_conflict(x, y) => elements.push(RepositoryStatusElement {
                path,
                state: FileState::Conflicted,
                is_staged: false,
                original_path: None,
            }),
            _ => {
                if let Some(state) = FileState::from_code(x) {
                    elements.push(RepositoryStatusElement {
                        path: path.clone(),
                        state,
                        is_staged: true,
                        original_path: original_path.clone(),
                    });
                }
                if let Some(state) = FileState::from_code(y) {
                    elements.push(RepositoryStatusElement {
                        path,
                        state,
                        is_staged: false,
                        original_path: if matches!(y, b'R' | b'C') { original_path } else { None },
                    });
                }
            }
        }
    }

    (header, elements)
}
