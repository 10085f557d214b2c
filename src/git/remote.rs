//! Remote URL parsing

/// Owner and repository name extracted from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSlug {
    pub host: String,
    pub owner: String,
    pub name: String,
}

/// Parses `https://host/owner/name(.git)`, `git@host:owner/name(.git)` and
/// `ssh://git@host[:port]/owner/name(.git)`. Nested groups keep every
/// segment but the last as the owner (`group/subgroup`).
pub fn parse_remote_url(url: &str) -> Option<RemoteSlug> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let (host, path) = if let Some(rest) = url.split_once("://").map(|(_, rest)| rest) {
        let rest = rest.rsplit_once('@').map_or(rest, |(_, after)| after);
        let (host, path) = rest.split_once('/')?;
        let host = host.split(':').next().unwrap_or(host);
        (host, path)
    } else if let Some((user_host, path)) = url.split_once(':') {
        // scp-like syntax; reject Windows drive letters such as C:\repo
        if user_host.len() <= 1 || path.starts_with('\\') {
            return None;
        }
        let host = user_host.rsplit_once('@').map_or(user_host, |(_, h)| h);
        (host, path)
    } else {
        return None;
    };

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, name) = path.rsplit_once('/')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }

    Some(RemoteSlug {
        host: host.to_string(),
        owner: owner.to_string(),
        name: name.to_string(),
    })
}
