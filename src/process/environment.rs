use crate::process::handle::MANAGED_MARKER;
use std::collections::HashSet;
use std::path::Path;

/// Variables whose component-prefixed form always replaces the base variable
const PROXY_VARS: [&str; 3] = ["HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY"];

#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

/// Environment block for a component's child process, read from the current
/// process environment.
pub fn child_env(data_dir: &Path, component: &str, keep_env_prefix: bool) -> Vec<(String, String)> {
    let base = std::env::vars_os().map(|(key, value)| {
        (
            key.to_string_lossy().into_owned(),
            value.to_string_lossy().into_owned(),
        )
    });
    compose_env(base, data_dir, component, keep_env_prefix)
}

/// Build a child environment from `base`.
///
/// `<COMPONENT>_<NAME>` entries override `<NAME>`. Proxy variables are always
/// demoted to their unprefixed name; everything else only when
/// `keep_env_prefix` is false. `PATH` gets `<data_dir>/bin` prepended and the
/// managed marker is always the first entry. Each key appears exactly once.
pub fn compose_env<I>(
    base: I,
    data_dir: &Path,
    component: &str,
    keep_env_prefix: bool,
) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let prefix = format!("{}_", component.to_uppercase());
    let (marker_key, marker_value) = split_entry(MANAGED_MARKER);
    let entries: Vec<(String, String)> = base.into_iter().collect();

    let demote = |key: &str| -> Option<String> {
        let stripped = key.strip_prefix(&prefix)?;
        if stripped.is_empty() {
            return None;
        }
        if PROXY_VARS.contains(&stripped) || !keep_env_prefix {
            Some(stripped.to_string())
        } else {
            None
        }
    };

    let overridden: HashSet<String> = entries.iter().filter_map(|(key, _)| demote(key)).collect();

    let mut seen = HashSet::new();
    seen.insert(marker_key.to_string());
    let mut env = vec![(marker_key.to_string(), marker_value.to_string())];

    for (key, value) in entries {
        let key = match demote(&key) {
            Some(stripped) => stripped,
            None if overridden.contains(&key) => continue,
            None => key,
        };
        if !seen.insert(key.clone()) {
            continue;
        }

        let value = if key == "PATH" {
            let bin_dir = data_dir.join("bin");
            format!("{}{PATH_LIST_SEPARATOR}{value}", bin_dir.display())
        } else {
            value
        };
        env.push((key, value));
    }

    env
}

/// Render an environment block as `KEY=VALUE` lines.
pub fn format_env(env: &[(String, String)]) -> Vec<String> {
    env.iter().map(|(key, value)| format!("{key}={value}")).collect()
}

fn split_entry(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_marker_is_always_present() {
        let env = compose_env(Vec::new(), Path::new("/data"), "foo", false);
        assert_eq!(env, vars(&[("_K0S_MANAGED", "yes")]));
    }

    #[test]
    fn test_proxy_override_ignores_keep_prefix() {
        for keep in [false, true] {
            let base = vars(&[("HTTP_PROXY", "a"), ("FOO_HTTP_PROXY", "b")]);
            let env = compose_env(base, Path::new("/data"), "foo", keep);

            assert_eq!(lookup(&env, "HTTP_PROXY"), Some("b"), "keep_prefix={keep}");
            assert_eq!(lookup(&env, "FOO_HTTP_PROXY"), None);
            assert_eq!(env.iter().filter(|(k, _)| k == "HTTP_PROXY").count(), 1);
        }
    }

    #[test]
    fn test_keep_prefix_passes_component_vars_through() {
        let base = vars(&[("BAR", "x"), ("FOO_BAR", "y")]);
        let env = compose_env(base, Path::new("/data"), "foo", true);

        assert_eq!(lookup(&env, "BAR"), Some("x"));
        assert_eq!(lookup(&env, "FOO_BAR"), Some("y"));
    }

    #[test]
    fn test_prefixed_vars_override_without_keep_prefix() {
        // Override listed before and after the base entry gives the same result.
        for base in [
            vars(&[("BAR", "x"), ("FOO_BAR", "y")]),
            vars(&[("FOO_BAR", "y"), ("BAR", "x")]),
        ] {
            let env = compose_env(base, Path::new("/data"), "foo", false);
            assert_eq!(lookup(&env, "BAR"), Some("y"));
            assert_eq!(lookup(&env, "FOO_BAR"), None);
            assert_eq!(env.len(), 2);
        }
    }

    #[test]
    fn test_path_is_prefixed_with_data_bin() {
        let base = vars(&[("PATH", "/usr/bin")]);
        let env = compose_env(base, Path::new("/data"), "foo", false);

        let expected = format!("/data/bin{PATH_LIST_SEPARATOR}/usr/bin");
        assert_eq!(lookup(&env, "PATH"), Some(expected.as_str()));
    }

    #[test]
    fn test_component_path_override_is_prefixed() {
        let base = vars(&[("PATH", "/usr/bin"), ("FOO_PATH", "/opt/foo")]);
        let env = compose_env(base, Path::new("/data"), "foo", false);

        let expected = format!("/data/bin{PATH_LIST_SEPARATOR}/opt/foo");
        assert_eq!(lookup(&env, "PATH"), Some(expected.as_str()));
    }

    #[test]
    fn test_inherited_marker_collapses() {
        let base = vars(&[("_K0S_MANAGED", "no"), ("HOME", "/root")]);
        let env = compose_env(base, Path::new("/data"), "foo", false);

        assert_eq!(env[0], ("_K0S_MANAGED".to_string(), "yes".to_string()));
        assert_eq!(env.iter().filter(|(k, _)| k == "_K0S_MANAGED").count(), 1);
        assert_eq!(lookup(&env, "HOME"), Some("/root"));
    }

    #[test]
    fn test_other_component_vars_untouched() {
        let base = vars(&[("ETCD_NAME", "node-1"), ("NAME", "x")]);
        let env = compose_env(base, Path::new("/data"), "kubelet", false);

        assert_eq!(lookup(&env, "ETCD_NAME"), Some("node-1"));
        assert_eq!(lookup(&env, "NAME"), Some("x"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let base = vars(&[
            ("PATH", "/usr/bin"),
            ("FOO_NO_PROXY", "local"),
            ("NO_PROXY", "remote"),
            ("FOO_LEVEL", "debug"),
        ]);
        let first = compose_env(base.clone(), Path::new("/data"), "foo", true);
        let second = compose_env(base, Path::new("/data"), "foo", true);
        assert_eq!(first, second);
        assert_eq!(
            format_env(&first),
            vec![
                "_K0S_MANAGED=yes".to_string(),
                format!("PATH=/data/bin{PATH_LIST_SEPARATOR}/usr/bin"),
                "NO_PROXY=local".to_string(),
                "FOO_LEVEL=debug".to_string(),
            ]
        );
    }
}
