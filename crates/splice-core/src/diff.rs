//! Parser for `git diff` patch text.
//!
//! Turns unified and combined (`diff --cc`) output into one
//! [`DiffFileChange`] per file. The parser is a small state machine:
//! a `diff` line opens a record, extended header lines refine its status,
//! `---`/`+++` name the sides, the first `@@` line gives the ranges, and
//! everything after that is kept verbatim as content.

/// Mode git uses for symbolic links.
pub const SYMLINK_MODE: u32 = 0o120_000;

/// Placeholder path for the missing side of an added or deleted file.
pub const DEV_NULL: &str = "/dev/null";

/// How a file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    New,
    Deleted,
    Modified,
    Renamed,
    RenamedModified,
    Copied,
    CopiedModified,
    /// Mode changed without content change.
    TypeChanged,
    /// Mode changed from or to a symbolic link.
    TypeChangedSymlink,
    Binary,
    Unknown,
}

/// `start[,count]` from a hunk header. An omitted count means one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkRange {
    pub start: u32,
    pub count: u32,
}

/// One file's worth of a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFileChange {
    /// Produced by `diff --cc` (several parents).
    pub combined: bool,
    pub status: DiffStatus,
    /// Path before the change, `/dev/null` for a new file.
    pub path_before: String,
    /// Path after the change, `/dev/null` for a deleted file.
    pub path_after: String,
    /// Blob ids before the change, one per parent.
    pub indices_before: Vec<String>,
    pub index_after: String,
    pub old_mode: Option<u32>,
    pub new_mode: Option<u32>,
    pub similarity: Option<u8>,
    /// One range per parent.
    pub before_ranges: Vec<HunkRange>,
    pub after_range: Option<HunkRange>,
    pub content: Vec<String>,
}

impl DiffFileChange {
    fn empty() -> Self {
        Self {
            combined: false,
            status: DiffStatus::Unknown,
            path_before: String::new(),
            path_after: String::new(),
            indices_before: Vec::new(),
            index_after: String::new(),
            old_mode: None,
            new_mode: None,
            similarity: None,
            before_ranges: Vec::new(),
            after_range: None,
            content: Vec::new(),
        }
    }

    /// Whether the "before" side names a real file (not `/dev/null`).
    #[must_use]
    pub fn has_before_path(&self) -> bool {
        !self.path_before.is_empty() && self.path_before != DEV_NULL
    }

    fn touches_symlink(&self) -> bool {
        self.old_mode == Some(SYMLINK_MODE) || self.new_mode == Some(SYMLINK_MODE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingForHeader,
    Header,
    HunkFileA,
    HunkFileB,
    HunkHeader,
    HunkContent,
    Binary,
}

/// Extended header lines, in the order git may emit them.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderToken {
    OldMode(u32),
    NewMode(u32),
    DeletedFile(u32),
    NewFile(u32),
    CopyFrom(String),
    CopyTo(String),
    RenameFrom(String),
    RenameTo(String),
    Similarity(u8),
    Index {
        before: Vec<String>,
        after: String,
        mode: Option<u32>,
    },
}

/// Parse diff text into per-file change records.
///
/// Unrecognized lines are skipped rather than rejected; the output of
/// `git diff`/`git diff-tree` is trusted.
#[must_use]
pub fn parse_diff(text: &str) -> Vec<DiffFileChange> {
    let lines: Vec<&str> = text.lines().collect();
    let mut files = Vec::new();
    let mut file = DiffFileChange::empty();
    let mut state = State::WaitingForHeader;
    let mut last_token: Option<HeaderToken> = None;

    for (i, line) in lines.iter().copied().enumerate() {
        let next = lines.get(i + 1).copied().unwrap_or("");

        match state {
            State::WaitingForHeader => {
                if let Some((combined, before, after)) = parse_diff_line(line) {
                    file.combined = combined;
                    file.path_before = before;
                    file.path_after = after;
                    last_token = None;
                    state = State::Header;
                }
            }
            State::Header => {
                let token = parse_header_line(line, last_token.as_ref());
                if let Some(token) = &token {
                    apply_header_token(&mut file, token);
                } else if is_binary_marker(line) {
                    file.status = DiffStatus::Binary;
                    state = State::Binary;
                }
                last_token = token;
            }
            State::HunkFileA => {
                file.path_before = parse_hunk_file_line(line, "--- ", "a/");
                state = State::HunkFileB;
            }
            State::HunkFileB => {
                file.path_after = parse_hunk_file_line(line, "+++ ", "b/");
                state = State::HunkHeader;
            }
            State::HunkHeader => {
                if let Some((before, after)) = parse_hunk_header(line) {
                    file.before_ranges = before;
                    file.after_range = Some(after);
                }
                state = State::HunkContent;
            }
            State::HunkContent => file.content.push(line.to_string()),
            State::Binary => {}
        }

        if state == State::Header {
            if is_binary_marker(next) {
                state = State::Binary;
                file.status = DiffStatus::Binary;
            } else if next.starts_with("---") {
                state = State::HunkFileA;
            }
        }

        if next.starts_with("diff ") {
            if file.status != DiffStatus::Unknown {
                files.push(std::mem::replace(&mut file, DiffFileChange::empty()));
            } else {
                file = DiffFileChange::empty();
            }
            state = State::WaitingForHeader;
        }
    }

    if file.status != DiffStatus::Unknown {
        files.push(file);
    }

    files
}

fn is_binary_marker(line: &str) -> bool {
    line == "GIT binary patch" || (line.starts_with("Binary files ") && line.ends_with(" differ"))
}

/// Parse `diff --git a/x b/y` or `diff --cc x`.
fn parse_diff_line(line: &str) -> Option<(bool, String, String)> {
    if let Some(paths) = line.strip_prefix("diff --git ") {
        let (before, after) = split_git_paths(paths);
        return Some((false, before, after));
    }

    let path = line
        .strip_prefix("diff --cc ")
        .or_else(|| line.strip_prefix("diff --combined "))?;
    Some((true, path.to_string(), path.to_string()))
}

/// Split `a/<path> b/<path>`.
///
/// Paths may themselves contain ` b/`, so the header is cut in half when both
/// sides agree. Renames and copies fall back to the first ` b/`; their real
/// paths come from the `rename`/`copy` and `---`/`+++` lines that follow.
fn split_git_paths(paths: &str) -> (String, String) {
    let middle = paths.len().saturating_sub(1) / 2;
    let before = paths.get(..middle).and_then(|left| left.strip_prefix("a/"));
    let after = paths.get(middle..).and_then(|right| right.strip_prefix(" b/"));
    if let Some(path) = before.filter(|before| Some(*before) == after) {
        return (path.to_string(), path.to_string());
    }

    match paths.split_once(" b/") {
        Some((before, after)) => (
            before.strip_prefix("a/").unwrap_or(before).to_string(),
            after.to_string(),
        ),
        None => {
            let path = paths.strip_prefix("a/").unwrap_or(paths).to_string();
            (path.clone(), path)
        }
    }
}

/// Recognize a header line given the one before it.
///
/// Each token only accepts certain successors; `index` may follow any of the
/// tokens that complete a header block.
fn parse_header_line(line: &str, previous: Option<&HeaderToken>) -> Option<HeaderToken> {
    match previous {
        None => {
            if line.starts_with("index ") {
                parse_index_line(line)
            } else if let Some(mode) = line.strip_prefix("new file mode ") {
                parse_mode(mode).map(HeaderToken::NewFile)
            } else if let Some(mode) = line.strip_prefix("deleted file mode ") {
                parse_mode(mode).map(HeaderToken::DeletedFile)
            } else if let Some(percent) = line.strip_prefix("similarity index ") {
                percent
                    .trim_end_matches('%')
                    .parse()
                    .ok()
                    .map(HeaderToken::Similarity)
            } else if let Some(mode) = line.strip_prefix("old mode ") {
                parse_mode(mode).map(HeaderToken::OldMode)
            } else {
                None
            }
        }
        Some(HeaderToken::Similarity(_)) => {
            if let Some(path) = line.strip_prefix("rename from ") {
                Some(HeaderToken::RenameFrom(path.to_string()))
            } else {
                line.strip_prefix("copy from ")
                    .map(|path| HeaderToken::CopyFrom(path.to_string()))
            }
        }
        Some(HeaderToken::RenameFrom(_)) => line
            .strip_prefix("rename to ")
            .map(|path| HeaderToken::RenameTo(path.to_string())),
        Some(HeaderToken::CopyFrom(_)) => line
            .strip_prefix("copy to ")
            .map(|path| HeaderToken::CopyTo(path.to_string())),
        Some(HeaderToken::OldMode(_)) => line
            .strip_prefix("new mode ")
            .and_then(parse_mode)
            .map(HeaderToken::NewMode),
        Some(
            HeaderToken::RenameTo(_)
            | HeaderToken::CopyTo(_)
            | HeaderToken::NewMode(_)
            | HeaderToken::NewFile(_)
            | HeaderToken::DeletedFile(_),
        ) => parse_index_line(line),
        Some(HeaderToken::Index { .. }) => None,
    }
}

/// `index <a>[,<b>...]..<c>[ <mode>]`
fn parse_index_line(line: &str) -> Option<HeaderToken> {
    let rest = line.strip_prefix("index ")?;
    let (ids, mode) = match rest.split_once(' ') {
        Some((ids, mode)) => (ids, parse_mode(mode)),
        None => (rest, None),
    };
    let (before, after) = ids.split_once("..")?;

    Some(HeaderToken::Index {
        before: before.split(',').map(String::from).collect(),
        after: after.to_string(),
        mode,
    })
}

fn parse_mode(text: &str) -> Option<u32> {
    u32::from_str_radix(text.trim(), 8).ok()
}

fn apply_header_token(file: &mut DiffFileChange, token: &HeaderToken) {
    match token {
        HeaderToken::Index {
            before,
            after,
            mode,
        } => {
            file.indices_before.clone_from(before);
            file.index_after.clone_from(after);
            if file.new_mode.is_none() {
                file.new_mode = *mode;
            }
            file.status = match file.status {
                DiffStatus::Unknown => DiffStatus::Modified,
                DiffStatus::Renamed => DiffStatus::RenamedModified,
                DiffStatus::Copied => DiffStatus::CopiedModified,
                other => other,
            };
        }
        HeaderToken::NewFile(mode) => {
            file.status = DiffStatus::New;
            file.path_before = DEV_NULL.to_string();
            file.new_mode = Some(*mode);
        }
        HeaderToken::DeletedFile(mode) => {
            file.status = DiffStatus::Deleted;
            file.path_after = DEV_NULL.to_string();
            file.old_mode = Some(*mode);
        }
        HeaderToken::RenameFrom(path) => {
            file.status = DiffStatus::Renamed;
            file.path_before.clone_from(path);
        }
        HeaderToken::CopyFrom(path) => {
            file.status = DiffStatus::Copied;
            file.path_before.clone_from(path);
        }
        HeaderToken::RenameTo(path) | HeaderToken::CopyTo(path) => {
            file.path_after.clone_from(path);
        }
        HeaderToken::OldMode(mode) => {
            file.status = DiffStatus::TypeChanged;
            file.old_mode = Some(*mode);
        }
        HeaderToken::NewMode(mode) => {
            file.new_mode = Some(*mode);
            if file.touches_symlink() {
                file.status = DiffStatus::TypeChangedSymlink;
            }
        }
        HeaderToken::Similarity(percent) => file.similarity = Some(*percent),
    }
}

fn parse_hunk_file_line(line: &str, marker: &str, prefix: &str) -> String {
    let path = line.strip_prefix(marker).unwrap_or(line).trim_end_matches('\t');
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

/// Parse `@@ -1,3 +1,4 @@` or the combined `@@@ -1,4 -1,4 +1,8 @@@` form.
fn parse_hunk_header(line: &str) -> Option<(Vec<HunkRange>, HunkRange)> {
    let marker_len = line.chars().take_while(|&c| c == '@').count();
    if marker_len < 2 {
        return None;
    }
    let marker = &line[..marker_len];

    // Trailing function context after the closing marker is ignored.
    let body = line[marker_len..].split(marker).next()?.trim();

    let mut before = Vec::new();
    let mut after = None;
    for part in body.split_whitespace() {
        if let Some(range) = part.strip_prefix('-') {
            before.push(parse_range(range)?);
        } else if let Some(range) = part.strip_prefix('+') {
            after = Some(parse_range(range)?);
        }
    }

    if before.is_empty() {
        return None;
    }
    Some((before, after?))
}

/// Parse a range like "1,3" or "1".
fn parse_range(s: &str) -> Option<HunkRange> {
    if let Some((start, count)) = s.split_once(',') {
        Some(HunkRange {
            start: start.parse().ok()?,
            count: count.parse().ok()?,
        })
    } else {
        Some(HunkRange {
            start: s.parse().ok()?,
            count: 1,
        })
    }
}
