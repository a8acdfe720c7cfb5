//! Bind DN and search filter templates.

/// Placeholder replaced by the login username.
pub const USERNAME_TOKEN: &str = "%u";

/// Placeholder replaced by the configured base DN.
pub const BASE_DN_TOKEN: &str = "%b";

/// Expands `%u` and `%b` in a template.
///
/// Substitution is a single left-to-right pass, so placeholder text inside
/// the username is inserted literally and never expanded again.
///
/// ## Security
///
/// Nothing is escaped. The result is directory input (a DN or a filter),
/// and a username containing `*`, `(`, `)`, `,` or `=` changes its meaning.
/// Hosts that accept arbitrary usernames must restrict them upstream.
#[must_use]
pub fn expand(template: &str, username: &str, base_dn: &str) -> String {
    let mut out = String::with_capacity(template.len() + username.len() + base_dn.len());
    let mut rest = template;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with(USERNAME_TOKEN) {
            out.push_str(username);
            rest = &tail[USERNAME_TOKEN.len()..];
        } else if tail.starts_with(BASE_DN_TOKEN) {
            out.push_str(base_dn);
            rest = &tail[BASE_DN_TOKEN.len()..];
        } else {
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    out
}
