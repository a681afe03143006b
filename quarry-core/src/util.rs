/// Consume the longest prefix of `input` whose chars satisfy `predicate`.
pub fn consume_while<'s>(
    input: &mut &'s str,
    mut predicate: impl FnMut(char) -> bool,
) -> &'s str {
    let len = input
        .char_indices()
        .find(|(_, c)| !predicate(*c))
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    let result = &input[..len];
    *input = &input[len..];
    result
}

/// Split `value` at the last char boundary not past `max`, the tail is `"..."` when cut.
pub fn truncate_at(value: &str, max: usize) -> (&str, &'static str) {
    if value.len() <= max {
        return (value, "");
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    (value[..end].trim_end(), "...")
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {{
        let query = &$query;
        let (head, tail) = $crate::truncate_at(::std::convert::AsRef::<str>::as_ref(query), 497);
        format!("{}{}", head, tail)
    }};
}

/// Sends the value through the channel and logs in case of error.
#[macro_export]
macro_rules! send_value {
    ($tx:expr, $value:expr) => {{
        if let Err(e) = $tx.send($value) {
            log::error!("{:#}", e);
        }
    }};
}
