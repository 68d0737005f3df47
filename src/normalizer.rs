use crate::extractor::Pair;

const EMAIL_SUFFIX: &str = "_email";

/// Keys that also emit a copy under a canonical alias. The original key
/// is kept as well.
const KEY_ALIASES: &[(&str, &str)] = &[("task_title", "title")];

/// Canonicalize keys: strip the `_email` suffix and emit alias copies right
/// after the pair they come from.
pub fn normalize(pairs: Vec<Pair>) -> Vec<Pair> {
    let mut out = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let alias = KEY_ALIASES
            .iter()
            .find(|(key, _)| *key == pair.key)
            .map(|(_, alias)| Pair::new(*alias, pair.value.clone()));

        let key = match pair.key.strip_suffix(EMAIL_SUFFIX) {
            Some(stripped) => stripped.to_string(),
            None => pair.key,
        };
        out.push(Pair::new(key, pair.value));
        out.extend(alias);
    }

    out
}
