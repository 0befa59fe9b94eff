/// Returns every word over the given symbols with at most `max_length` symbols,
/// including the empty word.
pub fn enumerate_words(symbols: &[char], max_length: usize) -> Vec<String> {
    let mut words = vec![String::new()];
    let mut last = vec![String::new()];

    for _ in 0..max_length {
        last = last
            .iter()
            .flat_map(|word| symbols.iter().map(move |symbol| format!("{word}{symbol}")))
            .collect();
        words.extend(last.iter().cloned());
    }

    words
}
