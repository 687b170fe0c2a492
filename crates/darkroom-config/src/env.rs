use std::sync::OnceLock;

use regex::{Captures, Regex};

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `{{ env.NAME }}` or `{{ env.NAME | default("value") }}`
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("placeholder pattern is valid")
    })
}

/// Substitute `{{ env.VAR }}` placeholders in raw config text
///
/// A `| default("...")` suffix supplies the value when the variable is
/// unset. TOML comment lines are copied through untouched so commented-out
/// secrets never have to exist in the environment.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    let mut lines = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_owned());
            continue;
        }
        lines.push(expand_line(line)?);
    }

    let mut output = lines.join("\n");
    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn expand_line(line: &str) -> anyhow::Result<String> {
    let mut expanded = String::with_capacity(line.len());
    let mut cursor = 0;

    for captures in placeholder().captures_iter(line) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        expanded.push_str(&line[cursor..whole.start()]);
        expanded.push_str(&resolve(&captures)?);
        cursor = whole.end();
    }

    expanded.push_str(&line[cursor..]);
    Ok(expanded)
}

fn resolve(captures: &Captures<'_>) -> anyhow::Result<String> {
    let key = captures.get(1).map_or("", |m| m.as_str());
    let fallback = captures.get(2).map(|m| m.as_str());

    let Some(var_name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        anyhow::bail!("only variables scoped with 'env.' are supported: `{key}`");
    };

    match (std::env::var(var_name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => anyhow::bail!("environment variable not found: `{var_name}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let input = "public_url = \"http://localhost:3001\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn substitutes_token() {
        temp_env::with_var("DARKROOM_TEST_TOKEN", Some("r8_abc"), || {
            let result = expand_env("api_token = \"{{ env.DARKROOM_TEST_TOKEN }}\"").unwrap();
            assert_eq!(result, "api_token = \"r8_abc\"");
        });
    }

    #[test]
    fn substitutes_several_on_separate_lines() {
        let vars = [("DARKROOM_HOST", Some("0.0.0.0")), ("DARKROOM_PORT", Some("3001"))];
        temp_env::with_vars(vars, || {
            let result =
                expand_env("host = \"{{ env.DARKROOM_HOST }}\"\nport = \"{{ env.DARKROOM_PORT }}\"").unwrap();
            assert_eq!(result, "host = \"0.0.0.0\"\nport = \"3001\"");
        });
    }

    #[test]
    fn missing_variable_is_an_error() {
        temp_env::with_var_unset("DARKROOM_MISSING", || {
            let err = expand_env("api_token = \"{{ env.DARKROOM_MISSING }}\"").unwrap_err();
            assert!(err.to_string().contains("DARKROOM_MISSING"));
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("DARKROOM_OPTIONAL", || {
            let result = expand_env("v = \"{{ env.DARKROOM_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "v = \"fallback\"");
        });
        temp_env::with_var("DARKROOM_OPTIONAL", Some("actual"), || {
            let result = expand_env("v = \"{{ env.DARKROOM_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "v = \"actual\"");
        });
    }

    #[test]
    fn other_scopes_are_rejected() {
        let err = expand_env("v = \"{{ secrets.TOKEN }}\"").unwrap_err();
        assert!(err.to_string().contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comments_are_not_expanded() {
        temp_env::with_var_unset("DARKROOM_MISSING", || {
            let input = "  # api_token = \"{{ env.DARKROOM_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
