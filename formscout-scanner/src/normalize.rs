//! Canonical visit keys for URLs.
//!
//! Two URLs that reach the same server-side content should map to the same key:
//! redirect bookkeeping parameters are dropped, escapes are decoded and re-encoded
//! in one canonical form, and `localhost` is folded into `127.0.0.1`.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;
use url::form_urlencoded;

/// Query parameters that only carry "where to go next" and cause redirect loops.
pub const LOOP_PARAMS: &[&str] = &["back", "redirect"];

const CANONICAL_HOST: &str = "127.0.0.1";
const HOST_ALIASES: &[&str] = &["localhost"];

/// Characters re-escaped in a decoded path. `%` is included so that a decoded
/// literal percent sign survives a second pass unchanged.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Canonicalize `url` for visited-set membership. Idempotent.
pub fn normalize(url: &Url) -> Url {
    let mut out = url.clone();

    if let Some(host) = out.host_str()
        && HOST_ALIASES.contains(&host)
    {
        let _ = out.set_host(Some(CANONICAL_HOST));
    }

    if !out.cannot_be_a_base() {
        let path = canonical_path(out.path());
        out.set_path(&path);
    }

    let pairs: Vec<(String, String)> = out
        .query_pairs()
        .filter(|(key, _)| !LOOP_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if pairs.is_empty() {
        out.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&pairs)
            .finish();
        out.set_query(Some(&query));
    }

    let keep_fragment = out.fragment().is_some_and(is_route_fragment);
    if !keep_fragment {
        out.set_fragment(None);
    }

    out
}

/// Parse and normalize in one step. Unparsable input yields `None`.
pub fn normalize_str(raw: &str) -> Option<Url> {
    Url::parse(raw.trim()).ok().map(|url| normalize(&url))
}

/// `host[:port]` with host aliases folded, used for scope comparisons.
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let host = if HOST_ALIASES.contains(&host) {
        CANONICAL_HOST
    } else {
        host
    };
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// A fragment that addresses a client-side route (`#/users`, `#!/users`) rather
/// than an in-page anchor.
pub fn is_route_fragment(fragment: &str) -> bool {
    fragment.starts_with('/') || fragment.starts_with("!/")
}

/// Same document, ignoring fragments.
pub fn same_document(a: &Url, b: &Url) -> bool {
    without_fragment(a) == without_fragment(b)
}

pub fn without_fragment(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);
    out
}

fn canonical_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    utf8_percent_encode(&decoded, PATH_ESCAPES).to_string()
}
