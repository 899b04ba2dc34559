/// Escapes `value` so it can be placed between double quotes in a POSIX shell command and
/// still be read back literally.
///
/// Inside double quotes the shell only treats `\`, `"`, `$` and `` ` `` specially, so those
/// are the characters that get a backslash. Single pass, so `\"` becomes `\\\"`.
pub fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
