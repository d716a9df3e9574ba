/// Builds the `.bashrc` snippet that intercepts `touch`/`mkdir`/`rm`/`mv`/`cp`/`cd`
/// and POSTs each one to the intake endpoint before it runs.
///
/// `user_id` and the intake base URL are baked in at container-creation time,
/// matching the spec's "the `user_id` is baked in at container creation time".
pub fn build_snippet(user_id: &str, ide_api_base: &str) -> String {
    format!(
        r#"
# --- sandbox fs-event hook (installed by the terminal driver) ---
__sandbox_fs_hook() {{
    local cmd="$BASH_COMMAND"
    local verb="${{cmd%% *}}"
    case "$verb" in
        touch|mkdir|rm|mv|cp|cd)
            local escaped="${{cmd//\\/\\\\}}"
            escaped="${{escaped//\"/\\\"}}"
            curl -s -m 2 -X POST "{base}/api/fs-event" \
                -H 'Content-Type: application/json' \
                -d "{{\"user_id\":\"{user}\",\"cmd\":\"${{escaped}}\",\"cwd\":\"$PWD\"}}" \
                >/dev/null 2>&1 &
            ;;
    esac
}}
trap '__sandbox_fs_hook' DEBUG
export USER_ID="{user}"
export IDE_API="{base}"
# --- end sandbox fs-event hook ---
"#,
        base = ide_api_base,
        user = user_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_bakes_in_user_and_base() {
        let s = build_snippet("alice", "http://localhost:8000");
        assert!(s.contains("USER_ID=\"alice\""));
        assert!(s.contains("IDE_API=\"http://localhost:8000\""));
        assert!(s.contains("trap '__sandbox_fs_hook' DEBUG"));
    }
}
